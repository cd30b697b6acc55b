// Binary entry point: iCalendar on stdin, Org outline on stdout.
use anyhow::{Context, Result};
use chrono::Local;
use ical2org::cli::{CliArgs, print_help};
use ical2org::config::Config;
use ical2org::context::StandardContext;
use ical2org::model::parse_calendars;
use ical2org::render::Renderer;
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::env;
use std::io::{self, Read, Write};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let binary_name = args.first().map(String::as_str).unwrap_or("ical2org");
    let cli = CliArgs::parse(args.get(1..).unwrap_or_default())?;

    if cli.help {
        print_help(binary_name);
        return Ok(());
    }

    // Diagnostics go to stderr so stdout carries nothing but the outline.
    let log_config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .build();
    TermLogger::init(
        cli.log_level,
        log_config,
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(&StandardContext::new(cli.root.clone()))?,
    };
    let window = config.window(Local::now().date_naive())?;
    log::info!("Filter window: {} .. {}", window.start, window.end);
    let renderer = Renderer::from_config(&config, window)?;

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read calendar from stdin")?;
    let calendars = parse_calendars(&input).context("Failed to parse calendar input")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let stats = renderer.render_all(&calendars, &mut out)?;
    out.flush()?;

    log::info!(
        "Wrote {} events and {} todos ({} outside the window, {} failed)",
        stats.events,
        stats.todos,
        stats.excluded,
        stats.failed
    );
    Ok(())
}
