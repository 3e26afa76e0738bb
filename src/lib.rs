//! Live handler compilation server library.
//!
//! Accepts program source over HTTP, compiles it into a dynamic library,
//! loads it into the running process and serves it as a new route.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::abi::PLUGIN_PRELUDE;
