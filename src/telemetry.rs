use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::settings::AppEnvironment;

/// Installs the global subscriber. `RUST_LOG` overrides the default `info`
/// level; production emits JSON lines.
pub fn init_tracing(env: &AppEnvironment) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match env {
        AppEnvironment::Production => registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init(),
        _ => registry.with(fmt::layer().with_target(false)).try_init(),
    };

    if let Err(e) = result {
        eprintln!("Tracing subscriber already installed: {}", e);
    }
}
