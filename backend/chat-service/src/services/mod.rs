pub mod blob_store;
pub mod channel_service;
pub mod identity_service;
pub mod message_cache;
pub mod message_service;
pub mod presence_service;
pub mod typing_service;
pub mod unread_service;
