//! lbtop entrypoint: argument validation, logging, signals and the
//! cooperative main loop.
//!
//! The loop paces time in 10 ms quanta. Per quantum it honors a pending
//! resize, runs the periodic refresh when the tick counter expires
//! (data refresh, line rebuild, repaint, in that order) and otherwise polls
//! one key. Painting failures trigger a terminal recover cycle instead of
//! aborting; protocol and parse errors unwind with distinct exit codes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use core_data::DataPlane;
use core_proto::{ProtoError, Socket};
use core_screen::{Outcome, Screen};
use core_terminal::{
    measure, poll_event, CrosstermBackend, Key, SizeLimits, TermEvent, TerminalGuard,
};
use core_view::{ModeId, SCREEN_XMAX, SCREEN_XMIN, SCREEN_YMAX, SCREEN_YMIN};

mod help_text;
use help_text::HELP_TEXT;

const LIMITS: SizeLimits = SizeLimits {
    min_cols: SCREEN_XMIN as u16,
    min_rows: SCREEN_YMIN as u16,
    max_cols: SCREEN_XMAX as u16,
    max_rows: SCREEN_YMAX as u16,
};

/// Sleep quantum of the cooperative loop.
const QUANTUM: Duration = Duration::from_millis(10);
/// Window for the second half of an ESC-prefixed key sequence.
const ESC_FOLLOW: Duration = Duration::from_millis(50);
/// Combined stat/proxy filter cap.
const MAX_FILTERS: usize = 50;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(
    name = "lbtop",
    version,
    about = "Interactive dashboard for a load-balancer admin socket"
)]
struct Args {
    /// Path to the admin unix socket.
    #[arg(short = 's', long = "unix-socket", value_name = "SOCKET")]
    socket: PathBuf,
    /// Update interval in seconds (1-30).
    #[arg(short = 'i', long = "update-interval", default_value_t = 3, value_name = "SECONDS")]
    interval: u64,
    /// Start in a specific mode (1-5).
    #[arg(short = 'm', long = "mode", default_value_t = 1, value_name = "MODE")]
    mode: usize,
    /// Disable the CLI and query for stats only.
    #[arg(short = 'n', long = "read-only")]
    read_only: bool,
    /// Stat filter in the form "<iid> <type> <sid>" (repeatable).
    #[arg(short = 'f', long = "filter", value_name = "FILTER")]
    stat_filter: Vec<String>,
    /// Proxy filter in the form "<pxname>" (repeatable).
    #[arg(short = 'p', long = "proxy", value_name = "PROXY")]
    proxy_filter: Vec<String>,
}

fn validate(args: &Args) -> Result<(), String> {
    if !(1..=30).contains(&args.interval) {
        return Err(format!("invalid update interval: {}", args.interval));
    }
    if !(1..=5).contains(&args.mode) {
        return Err(format!("invalid mode: {}", args.mode));
    }
    if args.stat_filter.len() + args.proxy_filter.len() > MAX_FILTERS {
        return Err(format!("filter limit exceeded ({MAX_FILTERS})"));
    }
    if args.read_only && args.mode == 5 {
        return Err("cli not available in read-only mode".to_string());
    }
    Ok(())
}

fn main() {
    // Map usage errors to exit 1 (help/version output stays 0).
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    if let Err(message) = validate(&args) {
        eprintln!("{message}");
        std::process::exit(1);
    }

    let code = match run(args) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err:#}");
            error!(target: "runtime", %err, "fatal");
            exit_code(&err)
        }
    };
    std::process::exit(code);
}

/// Socket and protocol failures exit 2, everything else 1.
fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if cause.downcast_ref::<ProtoError>().is_some()
            || cause.downcast_ref::<std::io::Error>().is_some()
        {
            return 2;
        }
    }
    1
}

fn configure_logging() -> Result<Option<WorkerGuard>> {
    let log_path = std::path::Path::new("lbtop.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(log_path);
    }
    let file_appender = tracing_appender::rolling::never(".", "lbtop.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .try_init()
    {
        Ok(()) => Ok(Some(guard)),
        // Subscriber already installed (tests); drop the guard.
        Err(_) => Ok(None),
    }
}

fn install_panic_hook() {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!(target: "runtime.panic", ?panic_info, "panic");
        default_panic(panic_info);
    }));
}

fn run(args: Args) -> Result<()> {
    let _log_guard = configure_logging()?;
    install_panic_hook();
    info!(target: "runtime", socket = %args.socket.display(), "startup");

    let socket = Socket::connect(&args.socket, args.read_only).map_err(|err| {
        let denied = matches!(
            &err,
            ProtoError::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied
        );
        if denied {
            anyhow::Error::new(err).context(format!(
                "insufficient permissions for socket path {}",
                args.socket.display()
            ))
        } else {
            anyhow::Error::new(err).context("socket error")
        }
    })?;

    let mut plane = DataPlane::new(socket)?;
    plane.register_stat_filter(&args.stat_filter)?;
    plane.register_proxy_filter(&args.proxy_filter)?;

    let initial = ModeId::from_index(args.mode).unwrap_or(ModeId::Status);
    let mut screen = Screen::new(plane, initial, HELP_TEXT)?;

    // SIGTERM and SIGINT both unwind the loop cleanly with exit code 0;
    // the handler only flips the flag, never touches the terminal.
    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGTERM, stop.clone())
        .context("signal handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, stop.clone())
        .context("signal handler")?;

    let mut backend = CrosstermBackend::new();
    let mut guard = backend.enter_guard()?;
    let result = event_loop(&mut screen, &mut guard, &args, &stop);
    drop(guard);
    info!(target: "runtime", "shutdown");
    result
}

fn event_loop(
    screen: &mut Screen<Socket>,
    guard: &mut TerminalGuard<'_>,
    args: &Args,
    stop: &AtomicBool,
) -> Result<()> {
    let interval_ticks = args.interval * 100;
    let mut tick: u64 = 0;
    let mut refresh_data = true;
    let mut rebuild_lines = true;
    let mut repaint = true;
    let mut resized = true;

    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }

        if resized {
            let (cols, rows) = measure(LIMITS)?;
            screen.resize(cols as usize, rows as usize);
            resized = false;
            repaint = true;
        }

        if tick >= interval_ticks {
            refresh_data = true;
            if screen.mode().is_stat() {
                rebuild_lines = true;
            }
            repaint = true;
            tick = 0;
        }

        if repaint {
            if refresh_data {
                screen.update_data()?;
                refresh_data = false;
            }
            if rebuild_lines {
                screen.update_lines();
                rebuild_lines = false;
            }
            if let Err(err) = screen.render().flush() {
                recover(guard, &err)?;
                continue;
            }
            repaint = false;
        }

        match poll_event(QUANTUM)? {
            None => {}
            Some(TermEvent::Resize(_, _)) => resized = true,
            Some(TermEvent::Key(Key::Esc)) => {
                let follow = match poll_event(ESC_FOLLOW)? {
                    Some(TermEvent::Key(key)) => Some(key),
                    Some(TermEvent::Resize(_, _)) => {
                        resized = true;
                        None
                    }
                    None => None,
                };
                match screen.handle_escape(follow) {
                    Outcome::Quit => return Ok(()),
                    Outcome::Redraw => repaint = true,
                    Outcome::Continue => {}
                }
            }
            Some(TermEvent::Key(key)) => match screen.handle_key(key)? {
                Outcome::Quit => return Ok(()),
                Outcome::Redraw => repaint = true,
                Outcome::Continue => {}
            },
        }
        tick += 1;
    }
}

/// Terminal recover cycle: leave the session, wait, re-enter and repaint.
fn recover(guard: &mut TerminalGuard<'_>, err: &anyhow::Error) -> Result<()> {
    warn!(target: "runtime", %err, "terminal error, restarting");
    guard.suspend()?;
    std::thread::sleep(Duration::from_secs(1));
    guard.resume()?;
    Ok(())
}
