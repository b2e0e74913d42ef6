//! # Signed instance server
//! An HTTP gateway that gates requests on the presence of a valid signed app instance.
//!
//! Incoming requests carry the platform-issued instance token as an `instance` query parameter.
//! Paths fall into three classes:
//! * **secured** - a valid instance is mandatory; requests without one are turned away.
//! * **checked** - an instance is verified if supplied, but its absence is fine.
//! * everything else - passed through untouched.
//!
//! Verified instances are attached to the request for downstream handlers.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more
//! information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/instance`: Echoes the instance attached to the current request, if any.

pub mod config;
pub mod errors;
pub mod gate;
pub mod matcher;
pub mod middleware;
pub mod routes;
pub mod server;
