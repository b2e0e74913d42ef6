use thiserror::Error;

/// Everything that can go wrong while verifying and decoding a signed instance.
///
/// All of these are terminal for the decode attempt. Nothing is retried internally; if a caller
/// wants to recover, re-authentication is its own policy decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceError {
    #[error("No secret key was provided to verify the instance against.")]
    NoSecretKey,
    #[error("The signed instance is not in the expected <signature>.<payload> format.")]
    MalformedToken,
    #[error("The instance signature does not match the payload.")]
    InvalidSignature,
    #[error("The instance payload could not be decoded. {0}")]
    MalformedPayload(String),
    #[error("The instance payload is missing the required property '{0}'.")]
    MissingRequiredField(String),
    #[error("The instance sign date could not be parsed. {0}")]
    InvalidSignDate(String),
}
