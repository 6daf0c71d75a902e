//! Authentication of inbound webhook requests.
//!
//! - [`SecretStore`] holds the shared token for the lifetime of the process
//!   and lets it be swapped on reload.
//! - [`Authenticator`] checks a presented token against it without leaking
//!   timing information.

pub mod authenticator;
pub mod secret;

pub use authenticator::{constant_time_eq, AuthDecision, Authenticator, DenyReason};
pub use secret::{Secret, SecretStore};
