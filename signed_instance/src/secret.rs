use std::fmt::{self, Debug, Display};

/// A secret key that must never end up in log output.
///
/// `Debug` and `Display` print a mask; the value is only reachable through [`Secret::reveal`] or
/// [`Secret::as_bytes`], so a stray `{:?}` on a config struct cannot leak key material.
#[derive(Clone, Default)]
pub struct Secret {
    value: String,
}

impl Secret {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self { value: value.into() }
    }

    pub fn reveal(&self) -> &str {
        &self.value
    }

    /// Key material view, for keying the HMAC.
    pub fn as_bytes(&self) -> &[u8] {
        self.value.as_bytes()
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}
