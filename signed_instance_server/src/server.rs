use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, App, HttpServer};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    middleware::InstanceGateMiddlewareFactory,
    routes::{health, instance},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let srv = create_server_instance(config)?;
    srv.await.map_err(ServerError::from)
}

pub fn create_server_instance(config: ServerConfig) -> Result<Server, ServerError> {
    config.validate()?;
    let bind_addr = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let gate = config.gate();
        App::new()
            .wrap(InstanceGateMiddlewareFactory::new(gate))
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sis::access_log"))
            .service(health)
            .service(instance)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind(bind_addr)?
    .run();
    Ok(srv)
}
