//! Metrics and instrumentation for agreement flows.
//!
//! The orchestrator records into an optional [`MetricsRegistry`]; binaries
//! decide how to expose it (the demo prints [`MetricsRegistry::gather_text`]).
//!
//! ```ignore
//! use squid::metrics::MetricsRegistry;
//!
//! let metrics = MetricsRegistry::new()?;
//! let ocean = Ocean::new(collaborators, config).with_metrics(metrics.clone());
//! // ...
//! println!("{}", metrics.gather_text());
//! ```

pub mod prometheus;

pub use self::prometheus::{AgreementMetrics, MetricsRegistry};
