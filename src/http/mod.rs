//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, buffer body for native handlers)
//!     → POST /addhandler → pipeline → 302 / 500
//!     → registered path  → loaded handler → response.rs (collect output)
//!     → anything else    → listing.rs (render registry snapshot)
//!     → Send to client
//! ```

pub mod listing;
pub mod request;
pub mod response;
pub mod server;

pub use listing::ListingTemplate;
pub use request::{HandlerRequest, MakeRequestUuidV4, ProgramSource, X_REQUEST_ID};
pub use response::ResponseBuffer;
pub use server::{AppState, HttpServer};
