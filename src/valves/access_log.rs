//! Structured access log.
//!
//! Logs one `info` event per request after the rest of the pipeline has run,
//! and records the time spent below this valve as a histogram.

use std::time::Instant;

use crate::error::Result;
use crate::http::{Request, Response};
use crate::observability::DispatchMetrics;
use crate::pipeline::{Next, Valve};
use crate::registry::Params;

#[derive(Debug, Clone, Default)]
pub struct AccessLogValve {
    /// Skip logging when the request carries this attribute.
    condition: Option<String>,
    metrics: DispatchMetrics,
}

impl AccessLogValve {
    pub const ID: &'static str = "access-log";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition(attribute: impl Into<String>) -> Self {
        Self {
            condition: Some(attribute.into()),
            ..Self::default()
        }
    }

    /// Replace the metrics handle, normally the one of the tree the valve joins.
    pub fn with_metrics(mut self, metrics: DispatchMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Parameters: `condition` (optional request attribute name).
    pub fn from_params(params: &Params) -> Result<Self> {
        super::reject_unknown(Self::ID, params, &["condition"])?;
        Ok(Self {
            condition: params.get("condition").cloned(),
            ..Self::default()
        })
    }
}

impl Valve for AccessLogValve {
    fn name(&self) -> &str {
        "AccessLogValve"
    }

    fn invoke(&self, request: &mut Request, response: &mut Response, next: Next<'_>) -> Result<()> {
        let start = Instant::now();
        let result = next.invoke(request, response);
        self.metrics.record_request_duration(start);

        let skip = self
            .condition
            .as_deref()
            .is_some_and(|attribute| request.attribute(attribute).is_some());
        if !skip {
            tracing::info!(
                request_id = %request.id(),
                host = ?request.host(),
                path = %request.decoded_path(),
                remote_addr = ?request.remote_addr(),
                context = ?request.context_path(),
                handler = ?request.wrapper().map(|w| w.name().to_string()),
                status = response.status(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Request completed"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::metrics::testing::CountingRecorder;
    use crate::pipeline::Pipeline;
    use std::sync::Arc;

    struct Teapot;

    impl Valve for Teapot {
        fn invoke(&self, _: &mut Request, response: &mut Response, _: Next<'_>) -> Result<()> {
            response.set_status(418);
            Ok(())
        }
    }

    #[test]
    fn test_passes_through() {
        let pipeline = Pipeline::with_basic("Test[log]", Arc::new(Teapot));
        pipeline.add_valve(Arc::new(AccessLogValve::with_condition("quiet"))).unwrap();

        let mut response = Response::new();
        pipeline.invoke(&mut Request::new("/"), &mut response).unwrap();
        assert_eq!(response.status(), 418);
    }

    #[test]
    fn test_disabled_metrics_skip_duration() {
        let recorder = CountingRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            let quiet = AccessLogValve::new().with_metrics(DispatchMetrics::new(false));
            let pipeline = Pipeline::with_basic("Test[quiet]", Arc::new(Teapot));
            pipeline.add_valve(Arc::new(quiet)).unwrap();
            pipeline.invoke(&mut Request::new("/"), &mut Response::new()).unwrap();
        });
        assert_eq!(recorder.registered(), 0);

        metrics::with_local_recorder(&recorder, || {
            let pipeline = Pipeline::with_basic("Test[loud]", Arc::new(Teapot));
            pipeline.add_valve(Arc::new(AccessLogValve::new())).unwrap();
            pipeline.invoke(&mut Request::new("/"), &mut Response::new()).unwrap();
        });
        assert_eq!(recorder.registered(), 1);
    }

    #[test]
    fn test_from_params() {
        let mut params = Params::new();
        params.insert("condition".into(), "quiet".into());
        assert!(AccessLogValve::from_params(&params).is_ok());

        params.insert("pattern".into(), "combined".into());
        assert!(AccessLogValve::from_params(&params).is_err());
    }
}
