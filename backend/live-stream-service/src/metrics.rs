use std::time::Duration;

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, TextEncoder};

fn register_counter(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)
        .expect("failed to create live-stream counter");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live-stream counter");
    counter
}

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter(
        "live_stream_http_requests_total",
        "Total HTTP requests handled by live-stream-service",
        &["method", "path", "status"],
    )
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "live_stream_http_request_duration_seconds",
            "HTTP request latency for live-stream-service",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
        ]),
        &["method", "path", "status"],
    )
    .expect("failed to create live_stream_http_request_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register live_stream_http_request_duration_seconds");
    histogram
});

static STREAM_TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter(
        "live_stream_transitions_total",
        "Stream lifecycle transitions",
        &["transition"],
    )
});

static INTERACTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter(
        "live_stream_interactions_total",
        "Accepted chat messages and reactions",
        &["kind"],
    )
});

static RATE_LIMITED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter(
        "live_stream_rate_limited_total",
        "Requests rejected by the per-actor rate limiter",
        &["action"],
    )
});

static MODERATION_ACTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter(
        "live_stream_moderation_actions_total",
        "Chat moderation status changes",
        &["status"],
    )
});

static PRODUCT_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter(
        "live_stream_product_events_total",
        "Featured product view/click/purchase events",
        &["event"],
    )
});

static VIEWER_SESSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter(
        "live_stream_viewer_sessions_total",
        "Viewer session joins and leaves",
        &["action"],
    )
});

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let status_label = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status_label])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path, &status_label])
        .observe(elapsed.as_secs_f64());
}

pub fn record_stream_transition(transition: &str) {
    STREAM_TRANSITIONS_TOTAL
        .with_label_values(&[transition])
        .inc();
}

pub fn record_interaction(kind: &str) {
    INTERACTIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_rate_limited(action: &str) {
    RATE_LIMITED_TOTAL.with_label_values(&[action]).inc();
}

pub fn record_moderation(status: &str) {
    MODERATION_ACTIONS_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_product_event(event: &str) {
    PRODUCT_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

pub fn record_viewer_session(action: &str) {
    VIEWER_SESSIONS_TOTAL.with_label_values(&[action]).inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::time::Instant;

/// Records request count and latency, labelled by route pattern
pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        // route pattern keeps label cardinality bounded (ids stay out)
        let path = req
            .match_pattern()
            .unwrap_or_else(|| "unmatched".to_string());
        let method = req.method().to_string();
        let start = Instant::now();

        Box::pin(async move {
            let result = service.call(req).await;
            let elapsed = start.elapsed();
            match &result {
                Ok(response) => {
                    observe_http_request(&method, &path, response.status().as_u16(), elapsed);
                }
                Err(_) => {
                    observe_http_request(&method, &path, 500, elapsed);
                }
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_counters_are_exported() {
        record_stream_transition("started");
        record_rate_limited("chat");

        let families = prometheus::gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"live_stream_transitions_total"));
        assert!(names.contains(&"live_stream_rate_limited_total"));
    }
}
