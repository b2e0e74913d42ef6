//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two MUST go
//! into a separate module. Keep this module neat and tidy 🙏

use actix_web::{get, HttpMessage, HttpRequest, HttpResponse, Responder};
use log::*;
use serde_json::{json, Value};

use crate::gate::InstanceSlot;

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

/// Echoes the instance the gate middleware attached to this request. Handy for smoke-testing an
/// installation and for downstream dashboards.
#[get("/instance")]
pub async fn instance(req: HttpRequest) -> HttpResponse {
    let slot = req.extensions().get::<InstanceSlot>().cloned();
    match slot {
        Some(InstanceSlot::Verified(instance)) => HttpResponse::Ok().json(json!({
            "instance_id": instance.instance_id,
            "sign_date": instance.sign_date,
            "user_id": instance.uid,
            "permissions": instance.permissions,
            "vendor_product_id": instance.vendor_product_id,
            "owner_logged_in": instance.owner_logged_in(),
        })),
        _ => HttpResponse::Ok().json(json!({ "instance": Value::Null })),
    }
}
