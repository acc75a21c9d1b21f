use log::LevelFilter;
use simplelog::{ColorChoice, Config, ConfigBuilder, TermLogger, TerminalMode};

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .add_filter_allow_str("nlsub")
        .build()
}

/// Route `log` records to stderr so they never interleave with the run output on stdout.
pub fn initialize(level: LevelFilter) {
    if level == LevelFilter::Off {
        return;
    }
    let _ = TermLogger::init(level, build_config(), TerminalMode::Stderr, ColorChoice::Auto);
}
