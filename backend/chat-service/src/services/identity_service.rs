//! Canonical identity resolution.
//!
//! Every handler resolves the raw identifier it received into a [`User`]
//! row at its boundary and works with the canonical record from there.

use crate::error::{is_unique_violation, AppError, AppResult};
use crate::identity::Identity;
use crate::models::User;
use sqlx::{Pool, Postgres};

pub struct IdentityService;

impl IdentityService {
    /// Resolve an identifier to its canonical user record, creating the
    /// record on first reference.
    ///
    /// Idempotent: calling twice with the same identifier (including
    /// concurrently) yields the same user id. When two writers race on
    /// the first reference, the loser's unique-violation is recovered by
    /// re-reading the winner's row.
    pub async fn resolve_or_create(db: &Pool<Postgres>, raw: &str) -> AppResult<User> {
        let identity = Identity::parse(raw)?;
        Self::resolve_or_create_parsed(db, &identity).await
    }

    pub async fn resolve_or_create_parsed(
        db: &Pool<Postgres>,
        identity: &Identity,
    ) -> AppResult<User> {
        if let Some(user) = Self::find(db, identity).await? {
            return Ok(user);
        }

        let insert = match identity {
            // Internal ids are authoritative keys; an unknown one cannot
            // be lazily created.
            Identity::Internal(_) => return Err(AppError::NotFound("user")),
            Identity::Decentralized(id) => sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (privy_id, display_name)
                VALUES ($1, $2)
                RETURNING id, privy_id, eth_address, display_name, avatar_url, created_at
                "#,
            )
            .bind(id)
            .bind(identity.display_label()),
            Identity::Chain(addr) => sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (eth_address, display_name)
                VALUES ($1, $2)
                RETURNING id, privy_id, eth_address, display_name, avatar_url, created_at
                "#,
            )
            .bind(addr)
            .bind(identity.display_label()),
        };

        match insert.fetch_one(db).await {
            Ok(user) => {
                tracing::info!(identifier = %identity.as_raw(), user_id = %user.id, "created user");
                Ok(user)
            }
            Err(e) if is_unique_violation(&e) => {
                // Lost the ensure-exists race; the other writer's row is
                // the canonical one.
                Self::find(db, identity)
                    .await?
                    .ok_or(AppError::NotFound("user"))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find(db: &Pool<Postgres>, identity: &Identity) -> AppResult<Option<User>> {
        let query = match identity {
            Identity::Internal(id) => sqlx::query_as::<_, User>(
                "SELECT id, privy_id, eth_address, display_name, avatar_url, created_at \
                 FROM users WHERE id = $1",
            )
            .bind(*id),
            Identity::Decentralized(privy) => sqlx::query_as::<_, User>(
                "SELECT id, privy_id, eth_address, display_name, avatar_url, created_at \
                 FROM users WHERE privy_id = $1",
            )
            .bind(privy.clone()),
            Identity::Chain(addr) => sqlx::query_as::<_, User>(
                "SELECT id, privy_id, eth_address, display_name, avatar_url, created_at \
                 FROM users WHERE eth_address = $1",
            )
            .bind(addr.clone()),
        };
        Ok(query.fetch_optional(db).await?)
    }

    /// Backfill a chain address onto a user that lacks one (`user_online`
    /// may carry the wallet alongside a decentralized id).
    pub async fn attach_chain_address(
        db: &Pool<Postgres>,
        user: &User,
        eth_address: &str,
    ) -> AppResult<()> {
        if user.eth_address.is_some() || eth_address.trim().is_empty() {
            return Ok(());
        }
        let result = sqlx::query(
            "UPDATE users SET eth_address = $1 WHERE id = $2 AND eth_address IS NULL",
        )
        .bind(eth_address)
        .bind(user.id)
        .execute(db)
        .await;

        match result {
            Ok(_) => Ok(()),
            // Address already claimed by another record; presence must
            // not fail over it.
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!(%eth_address, user_id = %user.id, "chain address already bound");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
