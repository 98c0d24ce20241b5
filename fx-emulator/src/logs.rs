use {
    tracing::Level,
    tracing_subscriber::FmtSubscriber,
    crate::config::LoggerConfig,
};

const DEFAULT_LEVEL: Level = Level::INFO;

/// Installs the global subscriber. Without logger config, logs go to stdout at `info`.
pub fn init_logging(config: Option<&LoggerConfig>) {
    let level = match config {
        None => DEFAULT_LEVEL,
        Some(LoggerConfig::Stdout { level }) => parse_level(level.as_deref()),
        Some(LoggerConfig::Noop) => return,
    };

    FmtSubscriber::builder().with_max_level(level).init();
}

fn parse_level(level: Option<&str>) -> Level {
    level.and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_LEVEL)
}
