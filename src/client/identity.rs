//! Identity collaborator
//!
//! Identity issuance lives outside this crate; a session only asks whether
//! one is available.

use crate::presence::Identity;

/// Supplies the current participant's identity, if authenticated
pub trait IdentityProvider: Send + Sync {
    fn identity(&self) -> Option<Identity>;
}

/// Identity fixed at construction (CLI flag, tests)
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<Identity>);

impl StaticIdentity {
    /// Blank input yields an absent identity
    pub fn new(email: Option<&str>) -> Self {
        Self(email.and_then(|e| Identity::new(e).ok()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn identity(&self) -> Option<Identity> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_identity() {
        assert_eq!(
            StaticIdentity::new(Some("u1")).identity().unwrap().as_str(),
            "u1"
        );
        assert!(StaticIdentity::new(Some("  ")).identity().is_none());
        assert!(StaticIdentity::new(None).identity().is_none());
        assert!(StaticIdentity::anonymous().identity().is_none());
    }
}
