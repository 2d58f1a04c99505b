//! Bearer-credential capability.
//!
//! Auth provider integration is an external collaborator; the client only
//! needs "get bearer credential" (fields merged into outbound frames) and
//! the unauthorized signal, which travels as a [`crate::ClientEvent`].

use std::sync::Arc;

use serde_json::{Map, Value};

/// Supplies the credential fields merged into every outbound query frame.
pub trait CredentialProvider: Send + Sync {
    fn bearer_fields(&self) -> Map<String, Value>;
}

/// How outbound frames are authenticated
#[derive(Clone, Default)]
pub enum AuthMode {
    /// Deployment without an identity provider; no credential fields are
    /// sent and auth-gate frames are ignored.
    #[default]
    Disabled,
    /// Bearer credential injected into every outbound frame.
    Bearer(Arc<dyn CredentialProvider>),
}

impl AuthMode {
    pub fn is_required(&self) -> bool {
        matches!(self, AuthMode::Bearer(_))
    }

    /// Credential fields for the outbound frame; empty when disabled.
    pub fn bearer_fields(&self) -> Map<String, Value> {
        match self {
            AuthMode::Disabled => Map::new(),
            AuthMode::Bearer(provider) => provider.bearer_fields(),
        }
    }
}

impl std::fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMode::Disabled => f.write_str("AuthMode::Disabled"),
            AuthMode::Bearer(_) => f.write_str("AuthMode::Bearer(..)"),
        }
    }
}

/// Fixed-token provider (local deployments, tests).
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl CredentialProvider for StaticToken {
    fn bearer_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "authorization".to_string(),
            Value::String(format!("Bearer {}", self.token)),
        );
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_mode_sends_no_fields() {
        assert!(AuthMode::Disabled.bearer_fields().is_empty());
        assert!(!AuthMode::Disabled.is_required());
    }

    #[test]
    fn bearer_mode_injects_token() {
        let mode = AuthMode::Bearer(Arc::new(StaticToken::new("t0ken")));
        let fields = mode.bearer_fields();
        assert_eq!(
            fields.get("authorization").and_then(Value::as_str),
            Some("Bearer t0ken")
        );
        assert!(mode.is_required());
    }
}
