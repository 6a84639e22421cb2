// ============================================
// File: crates/wgdesk-server/src/access.rs
// ============================================
//! # Access Policy
//!
//! Decides whether an authenticated identity may own peers at all. An
//! identity passes if its full address is listed, or if the part after
//! its last `@` is a listed domain. Matching ignores ASCII case.
//!
//! The login flow that produces the identity lives outside this crate.
//!
//! ## Last Modified
//! v0.1.0 - Initial allowlist

use tracing::debug;

/// Email / domain allowlist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    allowed_emails: Vec<String>,
    allowed_domains: Vec<String>,
}

impl AccessPolicy {
    /// Creates a policy from explicit lists.
    #[must_use]
    pub fn new(allowed_emails: Vec<String>, allowed_domains: Vec<String>) -> Self {
        Self {
            allowed_emails: normalize(allowed_emails),
            allowed_domains: normalize(allowed_domains),
        }
    }

    /// Returns `true` if nothing is allowed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allowed_emails.is_empty() && self.allowed_domains.is_empty()
    }

    /// Returns `true` if `email` may use the service.
    #[must_use]
    pub fn is_allowed(&self, email: &str) -> bool {
        let email = email.trim();

        if self
            .allowed_emails
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(email))
        {
            return true;
        }

        let allowed = email
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
            .is_some_and(|domain| {
                self.allowed_domains
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(domain))
            });

        if !allowed {
            debug!("Access denied for '{}'", email);
        }
        allowed
    }
}

fn normalize(entries: Vec<String>) -> Vec<String> {
    entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}
