use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Install the stderr diagnostics subscriber. `RUST_LOG` wins when set;
/// otherwise warnings only, or crate-level debug output when `verbose`.
pub fn init(verbose: bool) {
    let default_directive = if verbose { "warn,aplcheck=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Wall-clock timer for request latency.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
