//! Tower middleware layers wrapped around the [`Correlator`](crate::correlator::Correlator).
//!
//! - [`metrics`]: per-operation tracing span plus counters and a latency histogram
//! - [`load_shed`]: semaphore-based concurrency limiting
//! - [`pipeline`]: composes the layers into a single service stack

pub mod load_shed;
pub mod metrics;
pub mod pipeline;

pub use load_shed::{LoadShedLayer, LoadShedService};
pub use metrics::{MetricsLayer, MetricsService};
pub use pipeline::{build_pipeline, Pipeline};
