//! Identifier classification.
//!
//! Users arrive under three shapes of identifier: the internal record id,
//! a decentralized identity string (`did:privy:...`) or a chain address
//! (`0x...`). Prefix detection happens here and nowhere else; the rest of
//! the service works with a parsed [`Identity`] or a canonical user row.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DID_PREFIX: &str = "did:privy:";
const CHAIN_PREFIX: &str = "0x";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Internal record id, authoritative key.
    Internal(Uuid),
    /// Decentralized identity string, kept verbatim.
    Decentralized(String),
    /// Chain address, kept verbatim.
    Chain(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Internal,
    Decentralized,
    Chain,
}

impl IdentifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierKind::Internal => "internal",
            IdentifierKind::Decentralized => "decentralized",
            IdentifierKind::Chain => "chain",
        }
    }
}

impl Identity {
    pub fn parse(raw: &str) -> Result<Self, crate::error::AppError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(crate::error::AppError::BadRequest(
                "user identifier is required".into(),
            ));
        }
        if let Some(rest) = raw.strip_prefix(DID_PREFIX) {
            if rest.is_empty() {
                return Err(crate::error::AppError::BadRequest(
                    "malformed decentralized identifier".into(),
                ));
            }
            return Ok(Identity::Decentralized(raw.to_string()));
        }
        if raw.starts_with(CHAIN_PREFIX) && raw.len() > CHAIN_PREFIX.len() {
            return Ok(Identity::Chain(raw.to_string()));
        }
        match Uuid::parse_str(raw) {
            Ok(id) => Ok(Identity::Internal(id)),
            Err(_) => Err(crate::error::AppError::BadRequest(format!(
                "unrecognized user identifier: {raw}"
            ))),
        }
    }

    pub fn kind(&self) -> IdentifierKind {
        match self {
            Identity::Internal(_) => IdentifierKind::Internal,
            Identity::Decentralized(_) => IdentifierKind::Decentralized,
            Identity::Chain(_) => IdentifierKind::Chain,
        }
    }

    pub fn as_raw(&self) -> String {
        match self {
            Identity::Internal(id) => id.to_string(),
            Identity::Decentralized(s) | Identity::Chain(s) => s.clone(),
        }
    }

    /// Short human-readable label derived from the identifier, used when a
    /// user record carries no display name of its own.
    pub fn display_label(&self) -> String {
        match self {
            Identity::Decentralized(s) => {
                let tail = &s[DID_PREFIX.len()..];
                let shown: String = tail.chars().take(6).collect();
                format!("User {shown}...")
            }
            // Char-based split: nothing stops a client sending multibyte
            // text after the 0x prefix.
            Identity::Chain(s) if s.chars().count() > 10 => {
                let head: String = s.chars().take(6).collect();
                let tail_start = s.chars().count() - 4;
                let tail: String = s.chars().skip(tail_start).collect();
                format!("{head}...{tail}")
            }
            Identity::Chain(s) => s.clone(),
            Identity::Internal(_) => "Unknown User".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decentralized_identifier() {
        let id = Identity::parse("did:privy:clxyz1234567").unwrap();
        assert_eq!(id.kind(), IdentifierKind::Decentralized);
        assert_eq!(id.as_raw(), "did:privy:clxyz1234567");
    }

    #[test]
    fn parses_chain_address() {
        let id = Identity::parse("0xAbCd000000000000000000000000000000001234").unwrap();
        assert_eq!(id.kind(), IdentifierKind::Chain);
    }

    #[test]
    fn parses_internal_uuid() {
        let raw = Uuid::new_v4().to_string();
        match Identity::parse(&raw).unwrap() {
            Identity::Internal(id) => assert_eq!(id.to_string(), raw),
            other => panic!("expected internal identity, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(Identity::parse("").is_err());
        assert!(Identity::parse("   ").is_err());
        assert!(Identity::parse("not-an-identifier").is_err());
        assert!(Identity::parse("did:privy:").is_err());
        assert!(Identity::parse("0x").is_err());
    }

    #[test]
    fn chain_label_is_shortened() {
        let id = Identity::parse("0xAbCd000000000000000000000000000000001234").unwrap();
        assert_eq!(id.display_label(), "0xAbCd...1234");
    }

    #[test]
    fn chain_label_survives_multibyte_identifiers() {
        let short = Identity::parse("0xa🦀🦀🦀").unwrap();
        assert_eq!(short.display_label(), "0xa🦀🦀🦀");

        let long = Identity::parse("0x🦀🦀🦀🦀🦀🦀🦀🦀🦀🦀🦀").unwrap();
        assert_eq!(long.display_label(), "0x🦀🦀🦀🦀...🦀🦀🦀🦀");
    }

    #[test]
    fn decentralized_label_uses_id_tail() {
        let id = Identity::parse("did:privy:clxyz1234567").unwrap();
        assert_eq!(id.display_label(), "User clxyz1...");
    }
}
