use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical identity record. At most one row per distinct external
/// identifier; rows are created lazily on first reference and never
/// deleted by this service.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub privy_id: Option<String>,
    pub eth_address: Option<String>,
    pub display_name: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
}
