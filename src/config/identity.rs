use std::fmt;

use crate::error::{BillingError, Result};

/// The operator on whose behalf a mutating call is made.
///
/// Every write to the backend takes an `&Actor`; it ends up in the audit
/// columns (`created_by`, `mode_changed_by`, `recorded_by`) or, where the
/// backend has no such column, in the request log.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Actor(String);

impl Actor {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(BillingError::MissingIdentity);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// First non-empty of: command-line flag, environment, config file.
    pub fn resolve(
        flag: Option<&str>,
        env: Option<&str>,
        configured: Option<&str>,
    ) -> Result<Self> {
        [flag, env, configured]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .map(Actor::new)
            .unwrap_or(Err(BillingError::MissingIdentity))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins_over_env_and_config() {
        let actor = Actor::resolve(Some("carol"), Some("env-user"), Some("config-user")).unwrap();
        assert_eq!(actor.as_str(), "carol");

        let actor = Actor::resolve(None, Some(" "), Some("config-user")).unwrap();
        assert_eq!(actor.as_str(), "config-user");
    }

    #[test]
    fn test_missing_identity_is_an_error() {
        assert!(matches!(
            Actor::resolve(None, None, None),
            Err(BillingError::MissingIdentity)
        ));
        assert!(matches!(Actor::new("   "), Err(BillingError::MissingIdentity)));
    }
}
