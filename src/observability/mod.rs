//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging with request IDs attached by the HTTP layer
//! - Metrics are cheap (atomic increments); recording without an installed
//!   exporter is a no-op, so tests need no setup

pub mod logging;
pub mod metrics;
