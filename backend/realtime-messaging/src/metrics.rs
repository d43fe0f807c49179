use actix_web::{http::header::ContentType, HttpResponse};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder};

static ACTIVE_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "chat_active_connections",
        "Live WebSocket connections on this instance",
    )
    .expect("failed to create chat_active_connections");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register chat_active_connections");
    gauge
});

static ONLINE_USERS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "chat_online_users",
        "Users with at least one live connection",
    )
    .expect("failed to create chat_online_users");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register chat_online_users");
    gauge
});

static MESSAGES_SENT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new("chat_messages_sent_total", "Chat messages persisted")
        .expect("failed to create chat_messages_sent_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register chat_messages_sent_total");
    counter
});

static WS_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("chat_ws_events_total", "Client WebSocket events by outcome"),
        &["event", "outcome"],
    )
    .expect("failed to create chat_ws_events_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register chat_ws_events_total");
    counter
});

pub fn connection_opened() {
    ACTIVE_CONNECTIONS.inc();
}

pub fn connection_closed() {
    ACTIVE_CONNECTIONS.dec();
}

pub fn set_online_users(count: usize) {
    ONLINE_USERS.set(count as i64);
}

pub fn message_sent() {
    MESSAGES_SENT_TOTAL.inc();
}

/// `outcome` is one of `ok`, `rejected`, `error`
pub fn record_ws_event(event: &str, outcome: &str) {
    WS_EVENTS_TOTAL.with_label_values(&[event, outcome]).inc();
}

pub async fn metrics_handler() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %err, "failed to encode metrics");
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body(buffer)
}
