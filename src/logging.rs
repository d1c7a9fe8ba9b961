//! Logger bootstrap shared by the binary and the integration tests.

/// Installs the `env_logger` backend, filtered by `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let mut log_builder = env_logger::Builder::new();
    let installed = log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init()
        .is_ok();

    if installed {
        log::info!("Logger initialized");
    }
}
