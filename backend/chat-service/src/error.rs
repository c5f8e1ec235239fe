use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(&'static str),

    #[error("edit window expired (max_edit_minutes: {max_edit_minutes})")]
    EditWindowExpired { max_edit_minutes: i64 },

    #[error("already a member of this channel")]
    DuplicateMembership,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("blob store error: {0}")]
    Blob(String),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    /// Message sent back to the originating connection on failure.
    /// Storage-level detail never crosses the event boundary.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_detail_never_crosses_the_boundary() {
        assert_eq!(AppError::Internal.client_message(), "internal server error");
        assert_eq!(
            AppError::Forbidden("you are not a member of this channel".into()).client_message(),
            "forbidden: you are not a member of this channel"
        );
        assert_eq!(
            AppError::EditWindowExpired {
                max_edit_minutes: 60
            }
            .client_message(),
            "edit window expired (max_edit_minutes: 60)"
        );
    }
}

/// True when the database rejected an insert because a unique constraint
/// already holds the value. The identity upsert recovers from this by
/// re-reading instead of surfacing the failure.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}
