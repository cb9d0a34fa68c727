mod config;
mod status;

use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};
use measuring_ring_buffer::MeasuringRingBuffer;
use tokio::time::{interval, MissedTickBehavior};

use config::{load_settings, Overrides, Settings};
use status::StatusLine;

/// Exit status for bad flags or config files.
const CONFIG_EXIT_CODE: i32 = 64;

/// Copy stdin to stdout and show how much time is spent reading vs writing.
/// Can be used instead of pv(1).
#[derive(Parser, Debug)]
#[command(name = "fv", version)]
struct Args {
    /// Number of megabytes of buffer [default: 8]
    #[arg(short, long)]
    size: Option<usize>,

    /// Exact buffer size in bytes, overrides --size
    #[arg(long)]
    size_bytes: Option<usize>,

    /// Milliseconds between status line updates [default: 500]
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// Do not print the status line
    #[arg(short, long)]
    quiet: bool,

    /// Config file [default: ~/.config/fv/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            size_mb: self.size,
            size_bytes: self.size_bytes,
            interval_ms: self.interval_ms,
            quiet: self.quiet,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let settings = match load_settings(args.config.as_deref(), &args.overrides()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            process::exit(CONFIG_EXIT_CODE);
        }
    };
    let buf = match MeasuringRingBuffer::new(settings.capacity) {
        Ok(buf) => Arc::new(buf),
        Err(e) => {
            error!("{}", e);
            process::exit(e.exit_code());
        }
    };

    let code = run(buf, &settings).await;
    // Exit right away; the producer thread may still be blocked on stdin.
    process::exit(code);
}

async fn run(buf: Arc<MeasuringRingBuffer>, settings: &Settings) -> i32 {
    // `copy` returns once stdout is done, even if the producer is still
    // parked in a read on stdin.
    let mut writer = {
        let buf = Arc::clone(&buf);
        tokio::task::spawn_blocking(move || buf.copy(io::stdout().lock(), io::stdin()))
    };

    let mut status = StatusLine::new();
    let mut show_status = settings.status_enabled;
    let mut ticker = interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    let joined = loop {
        tokio::select! {
            res = &mut writer => break res,
            _ = ticker.tick(), if show_status => {
                if let Err(e) = status.print(&mut io::stderr(), &buf.stats(), '\r') {
                    warn!("Status line disabled: {}", e);
                    show_status = false;
                }
            }
        }
    };

    if settings.status_enabled {
        // Best effort, the copy result matters more.
        let _ = status.print(&mut io::stderr(), &buf.stats(), '\n');
    }

    let transferred = match joined {
        Ok(transferred) => transferred,
        Err(e) => {
            error!("Writer task failed: {}", e);
            return 1;
        }
    };
    match transferred.result {
        Ok(()) => {
            info!("Copied {} bytes", transferred.bytes);
            0
        }
        Err(e) => {
            error!("{} (after {} bytes)", e, transferred.bytes);
            e.exit_code()
        }
    }
}
