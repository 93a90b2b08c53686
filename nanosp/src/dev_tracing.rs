/// Install a fmt subscriber filtered by `RUST_LOG`.
///
/// Demos and tests call `nanosp::dev_tracing::init_tracing()` to see the
/// socket and transport logs. This is a no-op when `RUST_LOG` is not set
/// or when a global subscriber is already installed.
pub fn init_tracing() {
    use std::env;

    if env::var("RUST_LOG").is_ok() {
        // Best-effort: another subscriber may already be installed.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_thread_names(true)
            .try_init();
    }
}
