pub mod config;
pub mod http;
pub mod logging;
pub mod service;

pub use config::{ServerConfig, DEFAULT_HTTP_ADDR};
pub use http::HttpServer;
pub use logging::init_tracing;
pub use service::{FlightService, ServiceError};
