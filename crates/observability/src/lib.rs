//! Process-wide logging setup shared by the binaries.

/// Install the global tracing subscriber.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    subscriber::init(subscriber::LogFormat::from_env());
}

/// Subscriber construction (filter, output format).
pub mod subscriber;
