mod app;
mod cli;
mod domain;
mod infra;
mod ui;

use crate::cli::CliInvocation;
use crate::domain::ShowFlag;
use std::io::{self, Write};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CLAUDELOG_LOG";

#[derive(Debug, Error)]
enum MainError {
    #[error(transparent)]
    Cli(#[from] crate::cli::CliRunError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn main() {
    init_tracing();
    if let Err(error) = run_main() {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "Error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run_main() -> Result<(), MainError> {
    let args = std::env::args().collect::<Vec<_>>();
    let invocation = match crate::cli::parse_invocation(&args) {
        Ok(invocation) => invocation,
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "{error}");
            let _ = writeln!(err);
            print_help();
            std::process::exit(2);
        }
    };

    match invocation {
        CliInvocation::PrintHelp => {
            print_help();
            Ok(())
        }
        CliInvocation::PrintVersion => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliInvocation::ListThemes => {
            let mut out = io::stdout().lock();
            crate::cli::print_themes(&mut out)?;
            Ok(())
        }
        CliInvocation::View(args) => Ok(crate::cli::run(args)?),
    }
}

fn print_help() {
    let mut toggles = String::new();
    for flag in ShowFlag::ALL {
        toggles.push_str(&format!(
            "  {}  {:<13} {}\n",
            flag.letter(),
            flag.name(),
            flag.description()
        ));
    }
    let text = format!(
        "{name} - view and live-tail Claude session logs\n\nUSAGE:\n  {name} [options]\n\nOPTIONS:\n  -n, --number N       Show the N most recent sessions (default: 1, 0 = all)\n  -l, --list           List session files with date and size\n  -f, --file ID        Show a session by list index (1 = newest) or file name\n  -t, --timestamp      Prefix messages with their time\n  -w, --watch          Follow the session as it grows (ESC or Ctrl+C to stop)\n  -p, --project PATH   Project directory (default: project root of the current folder)\n      --list-projects  List every project with session history\n  -s, --show FLAGS     Choose what to display (see SHOW FLAGS)\n      --aliases FILE   JSON file with extra field aliases and tool patterns\n      --theme NAME     Color theme; without a name, list the themes\n      --no-color       Disable colors (same as --theme mono)\n  -h, --help           Print help\n  -V, --version        Print version\n\nSHOW FLAGS:\n  Lowercase enables, uppercase disables, applied left to right on top of the defaults (q, w, o).\n{toggles}  a  Enable everything\n  A  Disable everything\n  ?  Print the resulting toggle state and exit\n\n  Examples: -s a (everything), -s Aq (user messages only), -s sm (add summaries and metadata)\n\nCONFIG:\n  ~/.claudelogrc  JSON with optional \"theme\", \"show\" and \"aliases\" keys\n\nENV:\n  CLAUDE_PROJECTS_DIR  Override Claude projects dir (default: ~/.claude/projects)\n  CLAUDELOG_THEME      Theme used when --theme is not given\n  CLAUDELOG_ALIASES    Alias table used when --aliases is not given\n  CLAUDELOG_LOG        Diagnostic log filter (default: warn)\n",
        name = env!("CARGO_PKG_NAME")
    );
    let mut out = io::stdout().lock();
    let _ = write!(out, "{text}");
}
