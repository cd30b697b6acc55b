// File: ./src/cli.rs
//! Command-line argument handling and help text.
use anyhow::{Result, bail};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub log_level: LevelFilter,
    pub help: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            config: None,
            root: None,
            log_level: LevelFilter::Warn,
            help: false,
        }
    }
}

impl CliArgs {
    /// Parses the arguments following the binary name.
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut parsed = Self::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-h" | "--help" | "help" => parsed.help = true,
                "-v" | "--verbose" => parsed.log_level = LevelFilter::Info,
                "-vv" => parsed.log_level = LevelFilter::Debug,
                "-q" | "--quiet" => parsed.log_level = LevelFilter::Error,
                "-c" | "--config" => match iter.next() {
                    Some(path) => parsed.config = Some(PathBuf::from(path)),
                    None => bail!("{} requires a path", arg),
                },
                "-r" | "--root" => match iter.next() {
                    Some(path) => parsed.root = Some(PathBuf::from(path)),
                    None => bail!("{} requires a path", arg),
                },
                other => bail!("Unknown argument '{}' (see --help)", other),
            }
        }
        Ok(parsed)
    }
}

pub fn print_help(binary_name: &str) {
    println!(
        "ical2org v{} - Convert iCalendar events and to-dos into an Org-mode outline",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!("    {} [OPTIONS] < calendar.ics > calendar.org", binary_name);
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <path>   Read settings from this TOML file.");
    println!("    -r, --root <path>     Look for config/config.toml under this directory.");
    println!("    -v, --verbose         Also log progress to stderr (-vv for debug output).");
    println!("    -q, --quiet           Only log errors to stderr.");
    println!("    -h, --help            Show this help message.");
    println!();
    println!("CONFIG KEYS:");
    println!("    default_timezone      Zone that gets no [tzid] hint (Europe/Berlin)");
    println!("    past_days             Window start, days before today (90)");
    println!("    future_days           Window end, days after today (400)");
    println!("    weekdays              7 abbreviations, Sunday first");
    println!("    max_occurrences       Expansion cap per recurring event (1000)");
}
