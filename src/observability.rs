use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("streamchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("streamchat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("streamchat.client.request_duration_seconds");
pub(crate) static HEALTH_CHECKS: Counter = Counter::new("streamchat.client.health_checks");
pub(crate) static HEALTH_CHECK_FAILURES: Counter =
    Counter::new("streamchat.client.health_check_failures");

pub(crate) static STREAM_BYTES: Counter = Counter::new("streamchat.stream.bytes");
pub(crate) static STREAM_FRAMES: Counter = Counter::new("streamchat.stream.frames");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("streamchat.stream.errors");
pub(crate) static STREAM_TTFB: Moments = Moments::new("streamchat.stream.ttfb_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("streamchat.stream.duration_seconds");

pub(crate) static DECODE_ANOMALIES: Counter = Counter::new("streamchat.decode.invalid_utf8");
pub(crate) static PAYLOAD_ANOMALIES: Counter = Counter::new("streamchat.decode.bad_payloads");
pub(crate) static TRUNCATED_FRAMES: Counter = Counter::new("streamchat.decode.truncated_frames");

pub(crate) static SNAPSHOTS: Counter = Counter::new("streamchat.session.snapshots");
pub(crate) static TURNS: Counter = Counter::new("streamchat.session.turns");
pub(crate) static TURNS_INTERRUPTED: Counter = Counter::new("streamchat.session.interrupted");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);
    collector.register_counter(&HEALTH_CHECKS);
    collector.register_counter(&HEALTH_CHECK_FAILURES);

    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_FRAMES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_moments(&STREAM_TTFB);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&DECODE_ANOMALIES);
    collector.register_counter(&PAYLOAD_ANOMALIES);
    collector.register_counter(&TRUNCATED_FRAMES);

    collector.register_counter(&SNAPSHOTS);
    collector.register_counter(&TURNS);
    collector.register_counter(&TURNS_INTERRUPTED);
}
