//! console - a less surprising terminal
//!
//! Runs a shell under a pseudo-terminal and puts an editable scrollback and
//! command line in front of it. While the shell reads lines, commands are
//! composed in a real editor (mouse selection, cut and paste, search) and the
//! whole session transcript can be edited and saved. When a program switches
//! the terminal to raw mode (vim, top, less) the overlay steps aside and the
//! program gets the terminal to itself.
//!
//! # Quick Start
//!
//! ```text
//! console                # Start bash
//! console notes.txt      # Edit a file in the scrollback
//! console -d 2>trace.log # Debug logging
//! ```
//!
//! # Keybindings
//!
//! | Key | Action |
//! |-----|--------|
//! | ^W / ^E | Edit scrollback / back to the command line |
//! | ^X ^C ^V | Cut, copy, paste (^C interrupts when nothing is selected) |
//! | ^F / ^R | Search forward / backward |
//! | ^L | Go to line |
//! | ^S | Save the scrollback to FILE |
//! | ^Q | Exit (editing) or send EOF (empty command line) |

#[cfg(not(unix))]
compile_error!("console requires a Unix pseudo-terminal");

mod config;
mod core;
mod editor;
mod ui;

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::core::protocol::shell_environment;
use crate::core::pty::{Pty, ShellCommand, WindowSize};
use crate::core::session::Multiplexer;
use crate::core::signals::SelfPipe;
use crate::ui::{Console, Renderer};

/// Command line options
#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    /// Verbose logging to stderr
    debug: bool,
    /// Shell argv overriding the configuration file
    shell: Option<Vec<String>>,
    /// File loaded into the scrollback
    file: Option<PathBuf>,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("console {}", VERSION);
}

fn print_help() {
    eprintln!("console {} - a less surprising terminal", VERSION);
    eprintln!();
    eprintln!("Usage: console [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -d, --debug           Debug logging to stderr");
    eprintln!("  -s, --shell <CMD>     Shell command line (default: bash --noediting --noprofile --norc)");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("With FILE, the scrollback starts as an editable copy of FILE and ^S saves it.");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  Ctrl+W                Edit the scrollback");
    eprintln!("  Ctrl+E                Back to the command line");
    eprintln!("  Ctrl+X / Ctrl+C       Cut / copy the selection");
    eprintln!("  Ctrl+C                Interrupt (no selection)");
    eprintln!("  Ctrl+V                Paste");
    eprintln!("  Ctrl+F / Ctrl+R       Search forward / backward");
    eprintln!("  Ctrl+L                Go to line");
    eprintln!("  Ctrl+S                Save (editing a FILE)");
    eprintln!("  Ctrl+D                End of input (empty command line)");
    eprintln!("  Ctrl+Q                Exit (editing) or send EOF");
    eprintln!("  Esc                   Cancel a prompt");
    eprintln!();
    eprintln!("Configuration: ~/.console/config.toml");
    eprintln!("Log file:      ~/.console/console.log");
}

fn parse_args<I>(args: I) -> Result<Options, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-d" | "--debug" => {
                options.debug = true;
            }
            "-s" | "--shell" => {
                let shell = args.next().ok_or("Missing shell argument")?;
                let argv: Vec<String> = shell.split_whitespace().map(String::from).collect();
                if argv.is_empty() {
                    return Err("Empty shell argument".to_string());
                }
                options.shell = Some(argv);
            }
            arg if arg.starts_with('-') && arg.len() > 1 => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
            _ => {
                if options.file.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                options.file = Some(PathBuf::from(arg));
            }
        }
    }

    Ok(options)
}

/// Debug output goes to stderr; otherwise INFO and up are appended to the
/// log file, or dropped if it cannot be opened.
fn init_logging(debug: bool) {
    if debug {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
        return;
    }

    let log_file = Config::log_path().and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging(options.debug);
    info!("console {} starting", VERSION);

    let code = run(options)?;
    std::process::exit(code);
}

/// Run one session and return the child's translated exit status
fn run(options: Options) -> anyhow::Result<i32> {
    let mut config = Config::load();
    if let Some(shell) = options.shell {
        config.shell = shell;
    }
    info!("Shell: {:?}", config.shell);

    // Handlers go in before the child exists so an early exit is not missed.
    let pipe = SelfPipe::install()?;

    let (cols, rows) = Renderer::size().context("Failed to query terminal size")?;
    info!("Terminal size: {}x{}", cols, rows);

    let size = WindowSize::new(cols, rows);
    let command = shell_environment(ShellCommand::new(config.shell.clone()));
    let pty = Pty::spawn(&command, size)?;

    let mut console = Console::new(&config, options.file.as_deref())?;
    console.init()?;

    let mut mux = Multiplexer::new(pty, size);
    let result = mux.run(&pipe, &mut console);

    // Restore the terminal before anything is printed.
    let _ = console.cleanup();
    let reason = result?;

    let code = mux.close()?;
    info!("Exiting with status {} ({:?})", code, reason);
    Ok(code)
}
