//! Token construction helpers for the gate and middleware tests. Signing is the platform's job
//! in production; here we play the platform.

use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use signed_instance::Secret;

pub const SECRET_KEY: &str = "d245bbf8-57eb-49d6-aeff-beff6d82cd39";

pub fn secret() -> Secret {
    Secret::new(SECRET_KEY)
}

pub fn sign(payload: &Value, secret: &Secret) -> String {
    let encoded = base64::encode_config(payload.to_string(), base64::URL_SAFE_NO_PAD);
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(encoded.as_bytes());
    let signature = base64::encode_config(mac.finalize().into_bytes(), base64::URL_SAFE_NO_PAD);
    format!("{signature}.{encoded}")
}

pub fn params_required() -> Value {
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

pub fn params_with_owner() -> Value {
    let mut params = params_required();
    params["uid"] = params["siteOwnerId"].clone();
    params["permissions"] = json!("OWNER");
    params
}
