// Audit log: `timestamp - LEVEL - message` entries appended to a file
use chrono::{DateTime, Local};
use env_logger::{Builder, Env, Target};
use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";
const DEFAULT_FILTER: &str = "pagemark=debug,warn";

/// Install the global logger. `RUST_LOG` overrides the default filter.
/// A path of `-` logs to stderr instead of a file.
pub fn init(log_file: &Path) -> io::Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER));
    builder.format(|buf, record| {
        writeln!(buf, "{}", format_entry(&Local::now(), record.level(), record.args()))
    });

    if log_file != Path::new("-") {
        let file = OpenOptions::new().create(true).append(true).open(log_file)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    // Already initialized (e.g. by a test harness) is fine
    let _ = builder.try_init();
    Ok(())
}

pub fn format_entry(time: &DateTime<Local>, level: log::Level, message: &dyn Display) -> String {
    format!("{} - {} - {}", time.format(TIMESTAMP_FORMAT), level, message)
}
