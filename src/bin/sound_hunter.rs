use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sound_hunter::notify::NotificationReceiver;
use sound_hunter::sensitivity::SensitivityLevel;
use sound_hunter::{AppConfig, JsonResultStore, SoundHunter};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "sound_hunter",
    about = "Simulated acoustic anomaly scanner with synthetic screech events"
)]
struct Cli {
    /// Configuration file (defaults to config/sound_hunter.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the directory scan results are saved to
    #[arg(long, global = true)]
    results_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a timed scan, printing status lines as events arrive
    Scan {
        /// Scan length in seconds (defaults to the configured duration)
        #[arg(long)]
        duration: Option<u64>,
        /// Sensitivity level 1-10
        #[arg(long)]
        sensitivity: Option<i64>,
        /// Seed the random draws for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
        /// Do not write the scan to the results directory
        #[arg(long)]
        no_save: bool,
    },
    /// Run the calibration sequence
    Calibrate,
    /// Print the sensitivity table
    Profile,
    /// List saved scans
    Results,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };
    if let Some(dir) = cli.results_dir {
        config.storage.results_dir = dir;
    }

    match cli.command {
        Commands::Scan {
            duration,
            sensitivity,
            seed,
            no_save,
        } => {
            if seed.is_some() {
                config.scan.seed = seed;
            }
            if no_save {
                config.storage.persist = false;
            }
            let duration = duration.unwrap_or(config.scan.default_duration_secs);
            run_scan(config, duration, sensitivity)
        }
        Commands::Calibrate => run_calibrate(config),
        Commands::Profile => run_profile(),
        Commands::Results => run_results(&config),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building notification runtime")
}

fn run_scan(config: AppConfig, duration: u64, sensitivity: Option<i64>) -> Result<ExitCode> {
    let hunter = SoundHunter::new(config);
    if let Some(level) = sensitivity {
        if !hunter.set_sensitivity(level) {
            bail!("sensitivity must be between 1 and 10 (got {level})");
        }
    }
    let mut rx = hunter
        .take_notifications()
        .context("notification queue already taken")?;

    // The scan is reserved before spawn_scan returns.
    let handle = hunter.spawn_scan(duration);
    let done_rx = run_on_worker(move || handle.join());
    let stop = || hunter.stop_scan();

    let outcome =
        runtime()?.block_on(drain_until_done(&mut rx, done_rx, Some(&stop as &dyn Fn())))?;
    print_remaining(&mut rx);

    let summary = outcome.map_err(|_| anyhow::anyhow!("scan thread panicked"))??;
    if let Some(store) = hunter.store() {
        println!("Results saved under {}", store.dir().display());
    }
    if hunter.dropped_notifications() > 0 {
        eprintln!(
            "{} status lines were dropped",
            hunter.dropped_notifications()
        );
    }
    tracing::debug!(?summary, "scan complete");
    Ok(ExitCode::from(0))
}

/// Run `job` on its own thread and hand its result back over a oneshot
fn run_on_worker<T, F>(job: F) -> oneshot::Receiver<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (done_tx, done_rx) = oneshot::channel();
    std::thread::spawn(move || {
        let _ = done_tx.send(job());
    });
    done_rx
}

/// Print notifications until the worker reports back
///
/// With `on_interrupt` set, the first Ctrl-C calls it and draining goes on
/// until the worker finishes; without it Ctrl-C keeps its default effect.
async fn drain_until_done<T>(
    rx: &mut NotificationReceiver,
    mut done_rx: oneshot::Receiver<T>,
    on_interrupt: Option<&dyn Fn()>,
) -> Result<T> {
    let mut stopping = on_interrupt.is_none();
    loop {
        tokio::select! {
            Some(notification) = rx.recv() => println!("{notification}"),
            result = tokio::signal::ctrl_c(), if !stopping => {
                result.context("listening for Ctrl-C")?;
                println!("Stopping scan...");
                if let Some(stop) = on_interrupt {
                    stop();
                }
                stopping = true;
            }
            outcome = &mut done_rx => {
                return outcome.context("worker thread exited without a result");
            }
        }
    }
}

fn run_calibrate(config: AppConfig) -> Result<ExitCode> {
    let hunter = SoundHunter::new(config);
    let mut rx = hunter
        .take_notifications()
        .context("notification queue already taken")?;

    println!("Calibrating... ensure silence");
    let handle = hunter.spawn_calibration();
    let done_rx = run_on_worker(move || handle.join());

    let outcome = runtime()?.block_on(drain_until_done(&mut rx, done_rx, None))?;
    print_remaining(&mut rx);

    let constant = outcome.map_err(|_| anyhow::anyhow!("calibration thread panicked"))??;
    tracing::debug!(constant, "calibration complete");
    Ok(ExitCode::from(0))
}

fn run_profile() -> Result<ExitCode> {
    println!("level  threshold  min_db");
    for level in SensitivityLevel::all() {
        let params = level.parameters();
        println!(
            "{:>5}  {:>9.2}  {:>6.1}",
            level.get(),
            params.threshold,
            params.min_db
        );
    }
    Ok(ExitCode::from(0))
}

fn run_results(config: &AppConfig) -> Result<ExitCode> {
    let store = JsonResultStore::open(&config.storage.results_dir)
        .with_context(|| format!("opening {}", config.storage.results_dir.display()))?;
    let files = store.list()?;
    if files.is_empty() {
        println!("No saved scans under {}", store.dir().display());
        return Ok(ExitCode::from(0));
    }

    for path in files {
        match store.load(&path) {
            Ok(record) => println!(
                "{}  {} s  {} screeches  max {}  ({:?})",
                path.display(),
                record.duration_secs,
                record.summary.detections,
                record
                    .summary
                    .max_db
                    .map(|db| format!("{db:.1} dB"))
                    .unwrap_or_else(|| "-inf dB".to_string()),
                record.summary.end_reason
            ),
            Err(err) => eprintln!("{}: {}", path.display(), err),
        }
    }
    Ok(ExitCode::from(0))
}

fn print_remaining(rx: &mut NotificationReceiver) {
    for notification in rx.drain() {
        println!("{notification}");
    }
}
