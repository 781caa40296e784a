//! Secret types for protecting credentials from accidental logging.
//!
//! Bearer tokens travel from the transport layer through the gatekeeper to
//! the verifier. Wrapping them in [`SecretString`] keeps them out of every
//! `Debug` rendering (and therefore out of `tracing` fields) until the
//! verifier explicitly calls [`ExposeSecret::expose_secret`].
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct UpgradeCredentials {
//!     remote: String,
//!     authorization: SecretString,
//! }
//!
//! let creds = UpgradeCredentials {
//!     remote: "127.0.0.1:53211".to_string(),
//!     authorization: SecretString::from("Bearer eyJhbGciOi..."),
//! };
//!
//! assert!(!format!("{creds:?}").contains("eyJhbGciOi"));
//! assert!(creds.authorization.expose_secret().starts_with("Bearer "));
//! ```

pub use secrecy::{ExposeSecret, SecretString};
