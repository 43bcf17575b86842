use biometrics::{Collector, Counter, Moments};
use tracing_subscriber::EnvFilter;

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("mdchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("mdchat.client.request_errors");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("mdchat.stream.chunks");
pub(crate) static STREAM_BYTES: Counter = Counter::new("mdchat.stream.bytes");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("mdchat.stream.errors");
pub(crate) static STREAM_INTERRUPTS: Counter = Counter::new("mdchat.stream.interrupts");
pub(crate) static STREAM_DURATION: Moments = Moments::new("mdchat.stream.duration_seconds");

pub(crate) static TRANSCRIPTS_SAVED: Counter = Counter::new("mdchat.transcript.saved");
pub(crate) static TRANSCRIPTS_LOADED: Counter = Counter::new("mdchat.transcript.loaded");
pub(crate) static SETTINGS_SAVED: Counter = Counter::new("mdchat.settings.saved");
pub(crate) static TRANSLATION_FALLBACKS: Counter = Counter::new("mdchat.i18n.fallbacks");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_INTERRUPTS);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&TRANSCRIPTS_SAVED);
    collector.register_counter(&TRANSCRIPTS_LOADED);
    collector.register_counter(&SETTINGS_SAVED);
    collector.register_counter(&TRANSLATION_FALLBACKS);
}

/// Install the stderr log subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`, which keeps the interactive terminal
/// quiet unless something is actually wrong.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A second initialization (e.g. from an embedding program) is not an error worth reporting.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
