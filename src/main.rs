#![forbid(unsafe_code)]
mod backend;
mod diagnostics;
mod dispatch;
mod error;
mod negotiate;
mod resolution;

use backend::BackendKind;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use diagnostics::Diagnostics;
use dispatch::{Action, DisplaySelection, Outcome, Request, ResolutionChoice};
use error::{BackendError, Error};
use log::LevelFilter;
use std::io::{self, Write};
use std::process::ExitCode;

#[derive(Parser)]
#[command(author, version, about, override_usage = "disper [OPTIONS] <-l|-s|-c>")]
struct Args {
    /// Show what's happening.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// Be quiet and only show errors.
    #[arg(short, long)]
    quiet: bool,
    /// Resolution to use, or "auto" to pick the largest one all displays support.
    #[arg(short, long, default_value = "auto", value_name = "WxH|auto")]
    resolution: ResolutionChoice,
    /// Comma-separated list of displays to operate on, or "auto" to detect.
    #[arg(short, long, default_value = "auto", value_name = "ID,...|auto")]
    displays: DisplaySelection,
    /// Method to use for querying and configuring displays.
    /// Detected from the session when not given.
    #[arg(long, env = "DISPER_BACKEND")]
    backend: Option<BackendKind>,
    /// List the attached displays.
    #[arg(short, long, help_heading = "Actions")]
    list: bool,
    /// Only enable the primary display.
    #[arg(short, long, help_heading = "Actions")]
    single: bool,
    /// Clone displays.
    #[arg(short, long, help_heading = "Actions")]
    clone: bool,
}

impl Args {
    fn actions(&self) -> Vec<Action> {
        [
            (self.list, Action::List),
            (self.single, Action::Single),
            (self.clone, Action::Clone),
        ]
        .into_iter()
        .filter_map(|(selected, action)| selected.then_some(action))
        .collect()
    }

    fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Info
        } else if self.quiet {
            LevelFilter::Error
        } else {
            LevelFilter::Warn
        }
    }
}

fn init_logger(level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| match record.level() {
            log::Level::Error | log::Level::Warn => writeln!(
                buf,
                "{}: {}",
                record.level().as_str().to_lowercase(),
                record.args()
            ),
            _ => writeln!(buf, "{}", record.args()),
        })
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.log_level());

    let action = match select_action_or_help(&args, &mut io::stdout()) {
        Ok(action) => action,
        Err(exit_code) => return exit_code,
    };

    match run(&args, action) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(err),
    }
}

/// The action to run. Without one, writes help to `help_out` and yields the
/// exit code to stop with.
fn select_action_or_help(args: &Args, help_out: &mut impl Write) -> Result<Action, ExitCode> {
    match dispatch::select_action(&args.actions()) {
        Ok(Some(action)) => Ok(action),
        Ok(None) => {
            log::info!("no action specified");
            if let Err(err) = Args::command().write_help(help_out) {
                log::error!("unable to print help: {err}");
            }
            Err(ExitCode::SUCCESS)
        }
        Err(err) => Err(fail(err)),
    }
}

fn run(args: &Args, action: Action) -> Result<(), Error> {
    let request = Request {
        action,
        displays: args.displays.clone(),
        resolution: args.resolution,
    };
    log::trace!("request = {request:?}");

    let backend_kind = args
        .backend
        .or_else(|| BackendKind::detect(std::env::var("SWAYSOCK").ok().as_deref()))
        .ok_or(BackendError::NoBackend)?;
    let backend = backend_kind.connect()?;

    let mut diagnostics = Diagnostics::new();
    match dispatch::dispatch(&request, backend.as_ref(), &mut diagnostics)? {
        Outcome::Listed(listings) => {
            for listing in listings {
                println!("{listing}");
            }
        }
        Outcome::Cloned {
            resolution,
            displays,
        } => {
            log::info!("switched {} to {resolution}", displays.join(", "));
        }
    }
    Ok(())
}

/// Reports `err` once and maps it to the process exit code.
fn fail(err: Error) -> ExitCode {
    match &err {
        Error::Usage(message) => {
            let usage_error = Args::command().error(ErrorKind::ArgumentConflict, message);
            if let Err(print_err) = usage_error.print() {
                log::error!("{message} ({print_err})");
            }
        }
        Error::NoCommonResolution | Error::Backend(_) => log::error!("{err}"),
    }
    err.exit_code()
}
