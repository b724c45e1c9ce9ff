use std::env;
use std::io;
use std::path::Path;

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Install console and rolling file logging plus a panic hook.
///
/// `RUST_LOG` picks the filter (default `info`), `RUST_LOG_FILE` the log file
/// (default `logs/terrastream.log`). Calling it twice is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Console (stderr) layer with file/line
    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .compact();

    let log_path = env::var("RUST_LOG_FILE").unwrap_or_else(|_| "logs/terrastream.log".to_string());
    let log_path = Path::new(&log_path);
    let directory = log_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = log_path.file_name().unwrap_or(std::ffi::OsStr::new("terrastream.log"));
    let (nb_writer, guard) = tracing_appender::non_blocking(
        tracing_appender::rolling::daily(directory, file_name)
    );

    let file_layer = fmt::layer()
        .with_writer(nb_writer)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .with_ansi(false)
        .compact();

    if tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        // a subscriber is already installed, keep it and its writers
        return;
    }
    let _ = FILE_GUARD.set(guard);

    // Hook panics to log with backtrace, worker panics included
    std::panic::set_hook(Box::new(|info| {
        let mut msg = String::new();
        if let Some(thread) = std::thread::current().name() {
            msg.push_str(&format!("[{thread}] "));
        }
        if let Some(loc) = info.location() {
            msg.push_str(&format!("panic at {}:{}:{} ", loc.file(), loc.line(), loc.column()));
        }
        if let Some(s) = info.payload().downcast_ref::<&str>() { msg.push_str(s); }
        else if let Some(s) = info.payload().downcast_ref::<String>() { msg.push_str(s); }
        else { msg.push_str("<non-string panic>"); }
        let bt = std::backtrace::Backtrace::force_capture();
        tracing::error!("{}\nBacktrace:\n{:?}", msg, bt);
    }));
}
