//! REST requester

mod endpoints;
mod http_client;
mod request;

pub use endpoints::{CreateMessage, GatewayBot, SessionStartLimit};
pub use http_client::HttpClient;
pub use request::{Request, RequestBody, Response};
