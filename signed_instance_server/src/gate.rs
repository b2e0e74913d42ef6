//! The pure decision core of the request filter.
//!
//! Given a request path and the (optional) raw instance parameter, [`InstanceGate::evaluate`]
//! decides whether the request passes and what, if anything, gets attached to it. It holds no
//! mutable state and performs no I/O, so the actix adapter in [`crate::middleware`] can stay a
//! thin translation layer.

use log::debug;
use signed_instance::{Secret, SignedInstance, VerificationOptions};

use crate::matcher::PathMatcher;

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// A secured path was requested without any instance parameter.
    Unauthorized,
    /// An instance parameter was supplied but failed verification or decoding.
    Forbidden,
}

/// What the gate knows about the instance after evaluating a request.
///
/// `Absent` and `NotEvaluated` are deliberately distinct: a handler behind a checked path can
/// tell "nobody presented a token" apart from "this path is not gated at all".
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceSlot {
    /// The path is neither secured nor checked; no verification was attempted.
    NotEvaluated,
    /// The path is checked, but no instance parameter was supplied.
    Absent,
    /// The instance parameter was verified and decoded.
    Verified(SignedInstance),
}

impl InstanceSlot {
    pub fn instance(&self) -> Option<&SignedInstance> {
        match self {
            InstanceSlot::Verified(instance) => Some(instance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    PassThrough(InstanceSlot),
    Reject(Rejection),
}

/// Path-gated request filter configuration. Built once at startup, shared read-only across
/// requests.
#[derive(Clone, Default)]
pub struct InstanceGate {
    secured_paths: Vec<PathMatcher>,
    checked_paths: Vec<PathMatcher>,
    secret: Option<Secret>,
    options: VerificationOptions,
}

impl InstanceGate {
    pub fn new(
        secured_paths: Vec<PathMatcher>,
        checked_paths: Vec<PathMatcher>,
        secret: Option<Secret>,
        options: VerificationOptions,
    ) -> Self {
        Self { secured_paths, checked_paths, secret, options }
    }

    /// Decide what to do with a request. Pure function of the path, the parameter and the
    /// configuration.
    pub fn evaluate(&self, path: &str, instance_param: Option<&str>) -> GateOutcome {
        // Secured membership wins when a path is in both lists.
        let required = PathMatcher::matches_any(&self.secured_paths, path);
        let checked = PathMatcher::matches_any(&self.checked_paths, path);
        if !required && !checked {
            return GateOutcome::PassThrough(InstanceSlot::NotEvaluated);
        }
        match instance_param {
            None if required => GateOutcome::Reject(Rejection::Unauthorized),
            None => GateOutcome::PassThrough(InstanceSlot::Absent),
            Some(raw) => match SignedInstance::verify_and_decode(raw, self.secret.as_ref(), &self.options) {
                Ok(instance) => GateOutcome::PassThrough(InstanceSlot::Verified(instance)),
                Err(e) => {
                    // Log the real reason; the caller only ever sees a 403.
                    debug!("🔐️ Instance verification failed on {path}: {e}");
                    GateOutcome::Reject(Rejection::Forbidden)
                },
            },
        }
    }
}
