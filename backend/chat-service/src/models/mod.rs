pub mod channel;
pub mod message;
pub mod user;

pub use channel::{Channel, ChannelMember, MemberRole};
pub use message::{Message, MessageFilter, MessageType, NewMessage, Reaction, SeenEntry};
pub use user::User;
