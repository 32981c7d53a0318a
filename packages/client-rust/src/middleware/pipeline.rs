//! Pipeline composition: wraps the correlator in the middleware stack.

use tower::ServiceBuilder;

use super::load_shed::{LoadShedLayer, LoadShedService};
use super::metrics::{MetricsLayer, MetricsService};
use crate::config::ClientConfig;
use crate::correlator::Correlator;

/// The full call stack the collection facade drives.
pub type Pipeline = LoadShedService<MetricsService<Correlator>>;

/// Builds the pipeline around `correlator`.
///
/// Layer order (outermost to innermost):
/// 1. `LoadShedLayer` -- reject when too many calls are in flight
/// 2. `MetricsLayer` -- record timing and outcome
///
/// Deadlines are not a layer: the correlator owns them so it can resolve the
/// reply slot itself when one elapses.
#[must_use]
pub fn build_pipeline(correlator: Correlator, config: &ClientConfig) -> Pipeline {
    ServiceBuilder::new()
        .layer(LoadShedLayer::new(config.max_concurrent_operations))
        .layer(MetricsLayer)
        .service(correlator)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kvwire_core::{OpCode, Status};
    use tower::ServiceExt;

    use super::*;
    use crate::config::ChannelTransportConfig;
    use crate::correlator::Call;
    use crate::error::KvError;
    use crate::operation::{ReplyEnvelope, Request};
    use crate::transport::ChannelTransport;

    #[tokio::test]
    async fn pipeline_routes_through_all_layers() {
        let (transport, mut rx) = ChannelTransport::new(&ChannelTransportConfig::default());
        let transport = Arc::new(transport);
        let config = ClientConfig::default();
        let pipeline = build_pipeline(Correlator::new(transport.clone(), &config), &config);

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                transport.deliver(ReplyEnvelope::new(request.opaque, Status::Success).with_cas(9));
            }
        });

        let reply = pipeline
            .oneshot(Call::new(Request::new(OpCode::Get, "doc")))
            .await
            .unwrap();
        assert_eq!(reply.cas, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn pipeline_sheds_beyond_limit() {
        let (transport, _rx) = ChannelTransport::new(&ChannelTransportConfig::default());
        let config = ClientConfig {
            max_concurrent_operations: 1,
            ..ClientConfig::default()
        };
        let mut pipeline = build_pipeline(Correlator::new(Arc::new(transport), &config), &config);

        let _ = ServiceExt::ready(&mut pipeline).await.unwrap();
        let pending = tower::Service::call(&mut pipeline, Call::new(Request::new(OpCode::Get, "a")));
        let err = pipeline
            .clone()
            .oneshot(Call::new(Request::new(OpCode::Get, "b")))
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::Overloaded));

        // Nothing answers the first call, so it runs into the default deadline.
        let err = pending.await.unwrap_err();
        assert!(matches!(err, KvError::Timeout { timeout_ms: 2500 }));
    }
}
