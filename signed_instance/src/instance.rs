//! # Signed instance token format
//!
//! The platform sends the instance as a single ASCII parameter:
//!
//! ```text
//!    base64url(HMAC-SHA256(secret, base64url(json))) + "." + base64url(json)
//! ```
//!
//! Both base64 segments use the URL-safe alphabet with the `=` padding stripped on the wire. The
//! HMAC is computed over the *still-encoded* payload string, not the decoded JSON, so the
//! signature can be checked before touching the payload at all.
//!
//! The payload is a JSON object with string-valued properties describing the installation
//! (`instanceId`, `aid`, `vendorProductId`, ...) and the acting principal (`uid`,
//! `permissions`, ...). See [`SignedInstance`] for the full set.

use base64::{URL_SAFE, URL_SAFE_NO_PAD};
use chrono::{DateTime, FixedOffset};
use hmac::{Hmac, Mac};
use log::debug;
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{errors::InstanceError, secret::Secret};

type HmacSha256 = Hmac<Sha256>;

/// The `permissions` value the platform assigns to the site owner (and site collaborators).
pub const PERMISSIONS_OWNER: &str = "OWNER";

/// Wire keys the decode loop looks for, and whether their absence is fatal in strict mode.
const INSTANCE_PROPERTIES: &[(&str, bool)] = &[
    ("instanceId", true),
    ("signDate", true),
    ("permissions", true),
    ("ipAndPort", true),
    ("vendorProductId", true),
    ("aid", true),
    ("siteOwnerId", true),
    ("uid", false),
    ("originInstanceId", false),
];

/// Decode policy for [`SignedInstance::verify_and_decode`].
#[derive(Debug, Clone, Copy)]
pub struct VerificationOptions {
    /// When true (the default), every required payload property must be present, or decoding
    /// fails. When false, missing required properties are left unset. A `signDate` that is
    /// present but unparsable fails the decode in either mode.
    pub strict_properties: bool,
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self { strict_properties: true }
    }
}

/// A verified, decoded signed instance.
///
/// Constructed exclusively by [`SignedInstance::verify_and_decode`]; you never get your hands on
/// one whose signature did not check out. Fields are `Option`-valued because non-strict decoding
/// tolerates absent properties, and because `uid` legitimately disappears for anonymous visitors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignedInstance {
    /// Opaque identifier of this app installation.
    pub instance_id: Option<String>,
    /// When the platform issued the token.
    pub sign_date: Option<DateTime<FixedOffset>>,
    /// Role label for the acting principal. Empty for ordinary visitors, `"OWNER"` for the site
    /// owner and collaborators. Other values are passed through uninterpreted.
    pub permissions: Option<String>,
    /// Caller network address as reported by the platform.
    pub ip_and_port: Option<String>,
    /// Product/plan identifier. May be empty on free plans.
    pub vendor_product_id: Option<String>,
    /// Application id.
    pub aid: Option<String>,
    /// Identifier of the principal that owns the site.
    pub site_owner_id: Option<String>,
    /// Identifier of the currently acting principal. Absent means logged out.
    pub uid: Option<String>,
    /// Identifier of the parent token, when this token was derived from another.
    pub origin_instance_id: Option<String>,
}

impl SignedInstance {
    /// Verify the signature on `raw` and decode its payload.
    ///
    /// The raw token may be arbitrarily malformed; every failure mode maps to a distinct
    /// [`InstanceError`] variant. On error, no partially populated instance escapes.
    pub fn verify_and_decode(
        raw: &str,
        secret: Option<&Secret>,
        options: &VerificationOptions,
    ) -> Result<Self, InstanceError> {
        let (signature, encoded_payload) = raw.split_once('.').ok_or(InstanceError::MalformedToken)?;
        if signature.is_empty() || encoded_payload.is_empty() {
            return Err(InstanceError::MalformedToken);
        }
        let secret = secret.filter(|s| !s.reveal().is_empty()).ok_or(InstanceError::NoSecretKey)?;
        if !signature_matches(signature, encoded_payload, secret) {
            return Err(InstanceError::InvalidSignature);
        }
        let payload = decode_payload(encoded_payload)?;
        let mut instance = SignedInstance::default();
        for &(key, required) in INSTANCE_PROPERTIES {
            match payload.get(key) {
                Some(Value::String(value)) => instance.set_property(key, value.clone())?,
                // JSON null, a non-string value and an absent key all count as "not present"
                _ if required && options.strict_properties => {
                    return Err(InstanceError::MissingRequiredField(key.to_string()));
                },
                _ => {},
            }
        }
        debug!("Verified signed instance for installation {:?}", instance.instance_id);
        Ok(instance)
    }

    /// Is the acting principal the site owner or one of its collaborators?
    pub fn owner_permissions(&self) -> bool {
        self.permissions.as_deref() == Some(PERMISSIONS_OWNER)
    }

    /// Did the one single site owner log in?
    ///
    /// This deliberately compares `site_owner_id` against `uid` instead of trusting the payload's
    /// `permissions` label, which also covers collaborators.
    pub fn owner_logged_in(&self) -> bool {
        match (&self.site_owner_id, &self.uid) {
            (Some(owner), Some(uid)) => owner == uid,
            _ => false,
        }
    }

    fn set_property(&mut self, key: &str, value: String) -> Result<(), InstanceError> {
        match key {
            "instanceId" => self.instance_id = Some(value),
            "signDate" => {
                let sign_date = DateTime::parse_from_rfc3339(&value)
                    .map_err(|e| InstanceError::InvalidSignDate(format!("{value}: {e}")))?;
                self.sign_date = Some(sign_date);
            },
            "permissions" => self.permissions = Some(value),
            "ipAndPort" => self.ip_and_port = Some(value),
            "vendorProductId" => self.vendor_product_id = Some(value),
            "aid" => self.aid = Some(value),
            "siteOwnerId" => self.site_owner_id = Some(value),
            "uid" => self.uid = Some(value),
            "originInstanceId" => self.origin_instance_id = Some(value),
            _ => unreachable!("key not in INSTANCE_PROPERTIES: {key}"),
        }
        Ok(())
    }
}

/// Constant-time comparison of the wire signature against a freshly computed one.
fn signature_matches(signature: &str, encoded_payload: &str, secret: &Secret) -> bool {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(encoded_payload.as_bytes());
    let expected = base64::encode_config(mac.finalize().into_bytes(), URL_SAFE_NO_PAD);
    bool::from(expected.as_bytes().ct_eq(signature.as_bytes()))
}

fn decode_payload(encoded_payload: &str) -> Result<serde_json::Map<String, Value>, InstanceError> {
    // The wire strips base64 padding; restore it before decoding.
    let padded = match encoded_payload.len() % 4 {
        0 => encoded_payload.to_string(),
        r => format!("{encoded_payload}{}", "=".repeat(4 - r)),
    };
    let json = base64::decode_config(padded, URL_SAFE)
        .map_err(|e| InstanceError::MalformedPayload(e.to_string()))?;
    let payload: Value =
        serde_json::from_slice(&json).map_err(|e| InstanceError::MalformedPayload(e.to_string()))?;
    match payload {
        Value::Object(map) => Ok(map),
        other => Err(InstanceError::MalformedPayload(format!("payload is not a JSON object: {other}"))),
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    const SECRET_KEY: &str = "d245bbf8-57eb-49d6-aeff-beff6d82cd39";

    fn secret() -> Secret {
        Secret::new(SECRET_KEY)
    }

    fn sign_string(payload: &str, secret: &Secret) -> String {
        let encoded = base64::encode_config(payload, URL_SAFE_NO_PAD);
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(encoded.as_bytes());
        let signature = base64::encode_config(mac.finalize().into_bytes(), URL_SAFE_NO_PAD);
        format!("{signature}.{encoded}")
    }

    fn sign(payload: &Value, secret: &Secret) -> String {
        sign_string(&payload.to_string(), secret)
    }

    fn params_required() -> Value {
        json!({
            "instanceId": "9f9c5c16-59c8-4708-8c25-855505daa954",
            "signDate": "2012-08-08T19:47:31.624Z",
            "permissions": "",
            "ipAndPort": "123.123.123.123:1234",
            "vendorProductId": "",
            "aid": "12645948-59c8-4708-8c25-855505dac8ca",
            "siteOwnerId": "92771668-366f-4ec6-be21-b32c78e7b734"
        })
    }

    fn decode(raw: &str) -> Result<SignedInstance, InstanceError> {
        SignedInstance::verify_and_decode(raw, Some(&secret()), &VerificationOptions::default())
    }

    #[test]
    fn round_trip() {
        let token = sign(&params_required(), &secret());
        let instance = decode(&token).unwrap();
        assert_eq!(instance.instance_id.as_deref(), Some("9f9c5c16-59c8-4708-8c25-855505daa954"));
        assert_eq!(
            instance.sign_date,
            Some(DateTime::parse_from_rfc3339("2012-08-08T19:47:31.624Z").unwrap())
        );
        assert_eq!(instance.permissions.as_deref(), Some(""));
        assert_eq!(instance.ip_and_port.as_deref(), Some("123.123.123.123:1234"));
        assert_eq!(instance.vendor_product_id.as_deref(), Some(""));
        assert_eq!(instance.aid.as_deref(), Some("12645948-59c8-4708-8c25-855505dac8ca"));
        assert_eq!(instance.site_owner_id.as_deref(), Some("92771668-366f-4ec6-be21-b32c78e7b734"));
        assert_eq!(instance.uid, None);
        assert_eq!(instance.origin_instance_id, None);
    }

    #[test]
    fn optional_properties_are_picked_up() {
        let mut payload = params_required();
        payload["uid"] = json!("29d8204a-3b82-4a98-8d86-2464a6b836da");
        payload["originInstanceId"] = json!("55d2cd6e-7b52-4bfb-98b6-73e1f4371c05");
        let token = sign(&payload, &secret());
        let instance = decode(&token).unwrap();
        assert_eq!(instance.uid.as_deref(), Some("29d8204a-3b82-4a98-8d86-2464a6b836da"));
        assert_eq!(instance.origin_instance_id.as_deref(), Some("55d2cd6e-7b52-4bfb-98b6-73e1f4371c05"));
    }

    #[test]
    fn decoding_twice_gives_identical_results() {
        let token = sign(&params_required(), &secret());
        let first = decode(&token).unwrap();
        let second = decode(&token).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn wrong_secret_is_an_invalid_signature() {
        let token = sign(&params_required(), &secret());
        let err = SignedInstance::verify_and_decode(
            &token,
            Some(&Secret::new("another-secret")),
            &VerificationOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, InstanceError::InvalidSignature);
    }

    #[test]
    fn tampered_payload_is_an_invalid_signature() {
        let token = sign(&params_required(), &secret());
        let (signature, _) = token.split_once('.').unwrap();
        let mut other = params_required();
        other["permissions"] = json!("OWNER");
        let forged_payload = base64::encode_config(other.to_string(), URL_SAFE_NO_PAD);
        let err = decode(&format!("{signature}.{forged_payload}")).unwrap_err();
        assert_eq!(err, InstanceError::InvalidSignature);
    }

    #[test]
    fn token_without_separator_is_malformed() {
        assert_eq!(decode("Incorect Raw Signed Instance").unwrap_err(), InstanceError::MalformedToken);
    }

    #[test]
    fn empty_token_halves_are_malformed() {
        assert_eq!(decode(".payload").unwrap_err(), InstanceError::MalformedToken);
        assert_eq!(decode("signature.").unwrap_err(), InstanceError::MalformedToken);
        assert_eq!(decode(".").unwrap_err(), InstanceError::MalformedToken);
        assert_eq!(decode("").unwrap_err(), InstanceError::MalformedToken);
    }

    #[test]
    fn missing_secret_is_reported_before_the_signature_check() {
        let token = sign(&params_required(), &secret());
        let err = SignedInstance::verify_and_decode(&token, None, &VerificationOptions::default()).unwrap_err();
        assert_eq!(err, InstanceError::NoSecretKey);
        // An empty secret is how an unset env var manifests; treat it the same way.
        let err = SignedInstance::verify_and_decode(&token, Some(&Secret::new("")), &VerificationOptions::default())
            .unwrap_err();
        assert_eq!(err, InstanceError::NoSecretKey);
    }

    #[test]
    fn non_json_payload_is_malformed() {
        let token = sign_string("this is not json", &secret());
        assert!(matches!(decode(&token).unwrap_err(), InstanceError::MalformedPayload(_)));
    }

    #[test]
    fn non_object_payload_is_malformed() {
        let token = sign(&json!(["a", "list"]), &secret());
        assert!(matches!(decode(&token).unwrap_err(), InstanceError::MalformedPayload(_)));
    }

    #[test]
    fn each_required_property_is_enforced_in_strict_mode() {
        for &(key, required) in INSTANCE_PROPERTIES {
            if !required {
                continue;
            }
            let mut payload = params_required();
            payload.as_object_mut().unwrap().remove(key);
            let token = sign(&payload, &secret());
            let err = decode(&token).unwrap_err();
            assert_eq!(err, InstanceError::MissingRequiredField(key.to_string()), "for key {key}");
        }
    }

    #[test]
    fn json_null_counts_as_missing() {
        let mut payload = params_required();
        payload["permissions"] = Value::Null;
        let token = sign(&payload, &secret());
        assert_eq!(decode(&token).unwrap_err(), InstanceError::MissingRequiredField("permissions".to_string()));
    }

    #[test]
    fn non_strict_mode_tolerates_missing_properties() {
        let mut payload = params_required();
        payload.as_object_mut().unwrap().remove("ipAndPort");
        payload["permissions"] = Value::Null;
        let token = sign(&payload, &secret());
        let options = VerificationOptions { strict_properties: false };
        let instance = SignedInstance::verify_and_decode(&token, Some(&secret()), &options).unwrap();
        assert_eq!(instance.ip_and_port, None);
        assert_eq!(instance.permissions, None);
        assert_eq!(instance.instance_id.as_deref(), Some("9f9c5c16-59c8-4708-8c25-855505daa954"));
    }

    #[test]
    fn unparsable_sign_date_fails_in_both_modes() {
        let mut payload = params_required();
        payload["signDate"] = json!("the eighth of August");
        let token = sign(&payload, &secret());
        assert!(matches!(decode(&token).unwrap_err(), InstanceError::InvalidSignDate(_)));
        let options = VerificationOptions { strict_properties: false };
        let err = SignedInstance::verify_and_decode(&token, Some(&secret()), &options).unwrap_err();
        assert!(matches!(err, InstanceError::InvalidSignDate(_)));
    }

    #[test]
    fn owner_permissions_matches_the_owner_label_only() {
        let mut payload = params_required();
        let token = sign(&payload, &secret());
        assert!(!decode(&token).unwrap().owner_permissions());

        payload["permissions"] = json!("OWNER");
        let token = sign(&payload, &secret());
        assert!(decode(&token).unwrap().owner_permissions());

        payload["permissions"] = json!("ADMIN");
        let token = sign(&payload, &secret());
        assert!(!decode(&token).unwrap().owner_permissions());
    }

    #[test]
    fn owner_logged_in_requires_matching_ids() {
        let mut payload = params_required();
        let token = sign(&payload, &secret());
        assert!(!decode(&token).unwrap().owner_logged_in(), "no uid at all");

        payload["uid"] = json!("c713982b-9161-49bc-9ff5-67502e4b705b");
        let token = sign(&payload, &secret());
        assert!(!decode(&token).unwrap().owner_logged_in(), "uid differs from site owner");

        payload["uid"] = payload["siteOwnerId"].clone();
        let token = sign(&payload, &secret());
        assert!(decode(&token).unwrap().owner_logged_in());
    }
}
