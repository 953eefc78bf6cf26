//! Admission and targeting decisions.
//!
//! Denials are ordinary values, not errors: each carries a reason suitable
//! for logs and operator display.

use serde::Serialize;

/// Answer to "may I send to this recipient now?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Admission {
    /// Whether the send may proceed
    pub allowed: bool,
    /// Human-readable explanation
    pub reason: String,
    /// Retry hint in seconds; `Some(0)` when allowed, `None` when the
    /// denial has no actionable wait
    pub wait_seconds: Option<u64>,
}

impl Admission {
    /// Sending may proceed.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: "OK".to_string(),
            wait_seconds: Some(0),
        }
    }

    /// Sending is denied.
    pub fn deny(reason: impl Into<String>, wait_seconds: Option<u64>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            wait_seconds,
        }
    }

    /// Check if the send may proceed.
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

/// Answer to "should this contact be approached for this campaign?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetingDecision {
    /// Whether the contact may be approached
    pub contact: bool,
    /// Human-readable explanation
    pub reason: String,
}

impl TargetingDecision {
    /// The contact may be approached.
    pub fn approve(reason: impl Into<String>) -> Self {
        Self {
            contact: true,
            reason: reason.into(),
        }
    }

    /// The contact must be left alone.
    pub fn suppress(reason: impl Into<String>) -> Self {
        Self {
            contact: false,
            reason: reason.into(),
        }
    }

    /// Check if the contact may be approached.
    pub fn should_contact(&self) -> bool {
        self.contact
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_constructors() {
        let ok = Admission::allow();
        assert!(ok.is_allowed());
        assert_eq!(ok.reason, "OK");
        assert_eq!(ok.wait_seconds, Some(0));

        let denied = Admission::deny("Daily limit reached (50)", None);
        assert!(!denied.is_allowed());
        assert_eq!(denied.wait_seconds, None);
    }

    #[test]
    fn test_targeting_constructors() {
        assert!(TargetingDecision::approve("New contact").should_contact());
        assert!(!TargetingDecision::suppress("Previous bounce").should_contact());
    }
}
