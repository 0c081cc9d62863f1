// Domain layer: wire models and the ports (traits) the client is built around.

pub mod model;
pub mod ports;
