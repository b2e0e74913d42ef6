mod gate;

pub use gate::{InstanceGateMiddlewareFactory, InstanceGateMiddlewareService};
