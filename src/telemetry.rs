use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log format selected by `ARB_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Plain,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::parse(std::env::var("ARB_LOG_FORMAT").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Plain,
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Logs go to stderr so the schedule report on stdout stays clean.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,arbitrage_planner=info".into());
    let format = LogFormat::from_env();

    let json = (format == LogFormat::Json).then(|| fmt::layer().json().with_writer(std::io::stderr));
    let plain = (format == LogFormat::Plain).then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .init();
}
