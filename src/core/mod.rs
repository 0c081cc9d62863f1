pub mod client;
pub mod host;
pub mod middleware;
pub mod session;
pub mod transport;

pub use crate::domain::model::ApiResponse;
pub use crate::domain::ports::{Middleware, OutgoingRequest, SessionConfig};
pub use crate::utils::error::Result;
