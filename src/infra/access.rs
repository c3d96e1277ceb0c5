use async_trait::async_trait;
use subtle::ConstantTimeEq;

use crate::application::repos::AccessGate;

/// Grants preview access to callers presenting the configured shared token.
///
/// Without a configured token every identity is rejected.
#[derive(Debug, Clone, Default)]
pub struct PreviewTokenGate {
    token: Option<String>,
}

impl PreviewTokenGate {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl AccessGate for PreviewTokenGate {
    async fn is_authenticated(&self, identity: Option<&str>) -> bool {
        let (Some(expected), Some(presented)) = (self.token.as_deref(), identity) else {
            return false;
        };
        expected
            .as_bytes()
            .ct_eq(presented.trim().as_bytes())
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matching_token_is_accepted() {
        let gate = PreviewTokenGate::new(Some("s3cret".to_string()));
        assert!(gate.is_authenticated(Some("s3cret")).await);
        assert!(!gate.is_authenticated(Some("s3cre")).await);
        assert!(!gate.is_authenticated(None).await);
    }

    #[tokio::test]
    async fn missing_token_rejects_everyone() {
        let gate = PreviewTokenGate::default();
        assert!(!gate.is_authenticated(Some("anything")).await);
    }
}
