// src/logging.rs
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Installs the global subscriber. `RUST_LOG` wins over `default_directives`;
/// `LOG_FORMAT=json` switches to JSON lines for log aggregation.
pub fn init_logging(default_directives: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_directives))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init()?;

    Ok(())
}

/// Default filter for the relay server by build profile.
pub fn server_directives() -> &'static str {
    if cfg!(debug_assertions) {
        "debug,vidscript=trace,reqwest=info,hyper=info,tower=info"
    } else {
        "info,vidscript=info,reqwest=warn,hyper=warn,tower=warn"
    }
}
