//! Shared-token authorization.
//!
//! The presented token and the secret are both reduced to SHA-256 digests
//! before comparison. The digests always have the same length, and the
//! comparison folds every byte, so neither the position of the first
//! mismatching byte nor the length of the presented token changes how much
//! work is done.

use std::fmt;

use sha2::{Digest, Sha256};
use tracing::warn;

use super::secret::SecretStore;

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed,
    Forbidden(DenyReason),
}

impl AuthDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Allowed)
    }
}

/// Why a request was refused. Safe to log; never carries token material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The request did not carry a token.
    MissingToken,
    /// No secret is configured, so nothing can be allowed.
    SecretUnset,
    /// A token was presented and did not match.
    Mismatch,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::MissingToken => write!(f, "missing_token"),
            DenyReason::SecretUnset => write!(f, "secret_unset"),
            DenyReason::Mismatch => write!(f, "mismatch"),
        }
    }
}

/// Compares presented tokens against the current secret.
#[derive(Debug, Clone)]
pub struct Authenticator {
    secrets: SecretStore,
}

impl Authenticator {
    pub fn new(secrets: SecretStore) -> Self {
        Self { secrets }
    }

    /// Handle to the underlying store, for reloads.
    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    /// Authorize a presented token.
    ///
    /// Fails closed: an unset or blank secret forbids every request. Each
    /// denial produces one `warn!` entry naming the reason.
    pub fn authorize(&self, presented: Option<&str>) -> AuthDecision {
        let secret = self.secrets.current();

        let decision = if secret.is_empty() {
            AuthDecision::Forbidden(DenyReason::SecretUnset)
        } else {
            match presented {
                None => AuthDecision::Forbidden(DenyReason::MissingToken),
                Some(token) => {
                    let expected = Sha256::digest(secret.expose().as_bytes());
                    let provided = Sha256::digest(token.as_bytes());
                    if constant_time_eq(&expected, &provided) {
                        AuthDecision::Allowed
                    } else {
                        AuthDecision::Forbidden(DenyReason::Mismatch)
                    }
                }
            }
        };

        if let AuthDecision::Forbidden(reason) = decision {
            warn!(
                reason = %reason,
                token_present = presented.is_some(),
                "webhook_auth_denied"
            );
        }

        decision
    }
}

/// Constant-time byte comparison.
///
/// Returns early only on a length mismatch; callers compare fixed-size
/// digests so that branch never depends on secret data.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    std::hint::black_box(result) == 0
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::auth::Secret;

    fn authenticator(secret: &str) -> Authenticator {
        Authenticator::new(SecretStore::new(Secret::new(secret)))
    }

    #[test]
    fn test_matching_token_allowed() {
        let auth = authenticator("abc123");
        assert_eq!(auth.authorize(Some("abc123")), AuthDecision::Allowed);
    }

    #[test]
    fn test_wrong_token_forbidden() {
        let auth = authenticator("abc123");
        assert_eq!(
            auth.authorize(Some("wrong")),
            AuthDecision::Forbidden(DenyReason::Mismatch)
        );
        assert_eq!(
            auth.authorize(Some("abc1234")),
            AuthDecision::Forbidden(DenyReason::Mismatch)
        );
        assert_eq!(
            auth.authorize(Some("ABC123")),
            AuthDecision::Forbidden(DenyReason::Mismatch)
        );
        assert_eq!(
            auth.authorize(Some("")),
            AuthDecision::Forbidden(DenyReason::Mismatch)
        );
    }

    #[test]
    fn test_missing_token_forbidden() {
        let auth = authenticator("abc123");
        assert_eq!(
            auth.authorize(None),
            AuthDecision::Forbidden(DenyReason::MissingToken)
        );
    }

    #[test]
    fn test_unset_secret_fails_closed() {
        for secret in ["", "   "] {
            let auth = authenticator(secret);
            assert_eq!(
                auth.authorize(Some(secret)),
                AuthDecision::Forbidden(DenyReason::SecretUnset)
            );
            assert_eq!(
                auth.authorize(None),
                AuthDecision::Forbidden(DenyReason::SecretUnset)
            );
        }
    }

    #[test]
    fn test_reload_takes_effect() {
        let auth = authenticator("old");
        auth.secrets().reload(Secret::new("new"));
        assert!(!auth.authorize(Some("old")).is_allowed());
        assert!(auth.authorize(Some("new")).is_allowed());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    fn median_batch_time(auth: &Authenticator, token: &str, batches: usize) -> Vec<Duration> {
        let mut samples = Vec::with_capacity(batches);
        for _ in 0..batches {
            let start = Instant::now();
            for _ in 0..50 {
                std::hint::black_box(auth.authorize(Some(std::hint::black_box(token))));
            }
            samples.push(start.elapsed());
        }
        samples
    }

    fn median(mut samples: Vec<Duration>) -> Duration {
        samples.sort();
        samples[samples.len() / 2]
    }

    /// A short-circuiting `==` returns sooner the earlier two strings differ.
    /// Here a token sharing a long prefix with the secret must cost about the
    /// same as one that differs at the first byte.
    #[test]
    fn test_comparison_time_independent_of_matching_prefix() {
        let secret = "s".repeat(4096);
        let auth = authenticator(&secret);

        let mut late_mismatch = "s".repeat(4095);
        late_mismatch.push('x');
        let mut early_mismatch = String::from("x");
        early_mismatch.push_str(&"s".repeat(4095));

        // Warm up caches and the allocator before sampling.
        median_batch_time(&auth, &late_mismatch, 20);
        median_batch_time(&auth, &early_mismatch, 20);

        let mut late = Vec::new();
        let mut early = Vec::new();
        for _ in 0..40 {
            late.extend(median_batch_time(&auth, &late_mismatch, 5));
            early.extend(median_batch_time(&auth, &early_mismatch, 5));
        }

        let late = median(late).as_nanos() as f64;
        let early = median(early).as_nanos() as f64;
        let ratio = late / early.max(1.0);

        assert!(
            (0.5..2.0).contains(&ratio),
            "prefix-dependent timing: late={late}ns early={early}ns ratio={ratio}"
        );
    }
}
