//! Instance gate middleware for Actix Web.
//!
//! This is the thin HTTP adapter around [`InstanceGate`]: it pulls the request path and the
//! `instance` query parameter out of the request, asks the gate for a decision, and either
//! forwards the request (with the decision attached to the request extensions) or short-circuits
//! with a 401/403.
//!
//! Downstream handlers can read the [`InstanceSlot`] - and, on secured or checked paths with a
//! token, the [`signed_instance::SignedInstance`] itself - from the request extensions.

use std::{
    collections::HashMap,
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web::Query,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::trace;

use crate::{
    errors::ServerError,
    gate::{GateOutcome, InstanceGate, InstanceSlot},
};

/// The query parameter the platform puts the signed instance in.
const INSTANCE_PARAM: &str = "instance";

pub struct InstanceGateMiddlewareFactory {
    gate: Rc<InstanceGate>,
}

impl InstanceGateMiddlewareFactory {
    pub fn new(gate: InstanceGate) -> Self {
        InstanceGateMiddlewareFactory { gate: Rc::new(gate) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for InstanceGateMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = InstanceGateMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(InstanceGateMiddlewareService { gate: Rc::clone(&self.gate), service: Rc::new(service) }))
    }
}

pub struct InstanceGateMiddlewareService<S> {
    gate: Rc<InstanceGate>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for InstanceGateMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let gate = Rc::clone(&self.gate);
        Box::pin(async move {
            trace!("🔐️ Evaluating instance gate for {}", req.path());
            let instance_param = instance_param(&req);
            match gate.evaluate(req.path(), instance_param.as_deref()) {
                GateOutcome::PassThrough(slot) => {
                    trace!("🔐️ Instance gate for {} ✅️", req.path());
                    if let InstanceSlot::Verified(instance) = &slot {
                        req.extensions_mut().insert(instance.clone());
                    }
                    req.extensions_mut().insert(slot);
                    service.call(req).await
                },
                GateOutcome::Reject(rejection) => Err(ServerError::from(rejection).into()),
            }
        })
    }
}

fn instance_param(req: &ServiceRequest) -> Option<String> {
    Query::<HashMap<String, String>>::from_query(req.query_string())
        .ok()
        .and_then(|q| q.into_inner().remove(INSTANCE_PARAM))
}
