use env_logger::{Builder, Target, WriteStyle};
use log::{Level, LevelFilter};
use omnidb::model::config::LoggingConfig;
use std::env;
use std::io::Write;

/// Log to stderr so stdout carries only command output.
///
/// `--verbose` forces debug; otherwise the configured level applies, and
/// `RUST_LOG` overrides both.
pub fn setup_logger(verbose: bool, logging: &LoggingConfig) {
    let filter = if verbose {
        LevelFilter::Debug
    } else {
        logging.level.parse().unwrap_or(LevelFilter::Info)
    };

    let mut builder = Builder::new();
    builder.filter(None, filter);
    builder.target(Target::Stderr);
    builder.write_style(if logging.colored {
        WriteStyle::Auto
    } else {
        WriteStyle::Never
    });

    builder.format(|buf, record| {
        let glyph = match record.level() {
            Level::Error => "❌ ",
            Level::Warn => "⚠️  ",
            Level::Info => "",
            Level::Debug => "",
            Level::Trace => "",
        };
        writeln!(buf, "{}{}", glyph, record.args())
    });

    if env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    }

    builder.init();
}
