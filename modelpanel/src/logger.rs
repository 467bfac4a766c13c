use std::sync::OnceLock;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static INIT: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber once. `RUST_LOG` wins over `level`.
pub fn init(level: &str) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()));
        let _ = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
    });
}
