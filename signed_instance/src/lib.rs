//! # Signed instance verification
//!
//! A signed instance is the credential a platform hands to an embedded application on every
//! request. It describes the current installation and the acting principal, and it is signed with
//! an HMAC so that the application can trust its contents without a callback to the platform.
//!
//! This crate implements the verification and decoding half of that contract. Issuing tokens is
//! the platform's job; we only check them.

mod errors;
mod instance;
mod secret;

pub use errors::InstanceError;
pub use instance::{SignedInstance, VerificationOptions, PERMISSIONS_OWNER};
pub use secret::Secret;
