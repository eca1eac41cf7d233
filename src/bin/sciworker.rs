//! sciworker CLI: headless controller for the bundled workers.

use std::time::Duration;

use clap::{Parser, Subcommand};
use sciworker::config::Config;
use sciworker::error::Error;
use sciworker::mandelbrot::{DEFAULT_ITERATION_CAP, Dive, MandelbrotWorker};
use sciworker::model::{Payload, ResultItem};
use sciworker::source::{SAMPLES_CATEGORY, SineSource};
use sciworker::telemetry::{TelemetryConfig, init_telemetry};
use sciworker::worker::{Specialization, WorkerHandle};
use serde::Serialize;

/// How often the controller drains result queues.
const TICK: Duration = Duration::from_millis(10);

/// How long to wait for a stopped worker to terminate.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "sciworker", about = "Drive interruptible background workers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dive into the Mandelbrot set, one worker-computed frame at a time
    Mandelbrot {
        /// Image width in cells
        #[arg(long, default_value_t = 300)]
        width: usize,
        /// Image height in cells
        #[arg(long, default_value_t = 250)]
        height: usize,
        /// Iteration count per cell
        #[arg(long, default_value_t = 200)]
        maxiter: u32,
        /// Number of frames to compute
        #[arg(long, default_value_t = 10)]
        frames: u32,
        /// Fraction of the distance to the anchor covered per frame
        #[arg(long, default_value_t = 0.1)]
        zoom_fraction: f64,
        /// Real part of the zoom anchor
        #[arg(long, default_value_t = -0.743_643_887_037_151, allow_hyphen_values = true)]
        anchor_x: f64,
        /// Imaginary part of the zoom anchor
        #[arg(long, default_value_t = 0.131_825_904_205_33, allow_hyphen_values = true)]
        anchor_y: f64,
        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Run a simulated acquisition channel
    Source {
        /// Signal frequency in Hz
        #[arg(long, default_value_t = 1.0)]
        frequency: f64,
        /// Signal amplitude
        #[arg(long, default_value_t = 1.0)]
        amplitude: f64,
        /// Sample period in milliseconds
        #[arg(long, default_value_t = 50)]
        period_ms: u64,
        /// How long to acquire, in milliseconds
        #[arg(long, default_value_t = 1000)]
        duration_ms: u64,
        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "sciworker".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    match cli.command {
        Command::Mandelbrot {
            width,
            height,
            maxiter,
            frames,
            zoom_fraction,
            anchor_x,
            anchor_y,
            json,
        } => {
            let dive = Dive::new(maxiter, frames, zoom_fraction, (anchor_x, anchor_y));
            cmd_mandelbrot(&config, width, height, dive, json).await
        }
        Command::Source {
            frequency,
            amplitude,
            period_ms,
            duration_ms,
            json,
        } => {
            cmd_source(
                &config,
                frequency,
                amplitude,
                Duration::from_millis(period_ms),
                Duration::from_millis(duration_ms),
                json,
            )
            .await
        }
    }
}

async fn cmd_mandelbrot(
    config: &Config,
    width: usize,
    height: usize,
    dive: Dive,
    json: bool,
) -> anyhow::Result<()> {
    let mut worker = MandelbrotWorker::new(width, height)?;
    if dive.maxiter > DEFAULT_ITERATION_CAP {
        worker = worker.with_iteration_cap(dive.maxiter);
    }
    let mut handle = worker
        .builder("mandelbrot")
        .config(config.worker_config()?)
        .spawn()?;
    handle.start()?;

    let interrupt = async {
        // Without a signal handler the dive simply runs to completion.
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let outcome = dive
        .with_tick(TICK)
        .run(&mut handle, interrupt, |n, item| {
            if json {
                return print_json(item).map_err(|e| Error::Other(e.to_string()));
            }
            if let Some(frame) = item.data() {
                let (lo, hi) = frame.image.min_max().unwrap_or((0.0, 0.0));
                let [xmin, xmax, ymin, ymax] = frame.bounds.extent();
                println!(
                    "frame {n:>3}  x [{xmin:.6}, {xmax:.6}]  y [{ymin:.6}, {ymax:.6}]  escape [{lo:.3}, {hi:.3}]"
                );
            }
            Ok(())
        })
        .await;

    // A panicked worker explains more than the dive that noticed it.
    shutdown(handle).await?;
    let outcome = outcome?;
    if outcome.interrupted {
        tracing::info!(frames = outcome.frames, "interrupted");
    }
    Ok(())
}

async fn cmd_source(
    config: &Config,
    frequency: f64,
    amplitude: f64,
    period: Duration,
    duration: Duration,
    json: bool,
) -> anyhow::Result<()> {
    let mut handle = SineSource::new(frequency, amplitude, period)?
        .builder("source")
        .config(config.worker_config()?)
        .spawn()?;
    handle.start()?;

    let mut tick = tokio::time::interval(TICK);
    let deadline = tokio::time::sleep(duration);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(deadline, ctrl_c);

    let mut died = None;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break;
            }
            _ = &mut deadline => break,
            _ = tick.tick() => {
                let alive = handle.check_alive();
                let batch: Vec<_> = handle.results().collect();
                for item in batch {
                    match &item.payload {
                        Payload::Data(sample) if item.category == SAMPLES_CATEGORY => {
                            if json {
                                print_json(&item)?;
                            } else {
                                println!(
                                    "{:>6}  t={:>8.3}s  {:>+9.4}",
                                    sample.index, sample.t, sample.value
                                );
                            }
                        }
                        Payload::Fault(fault) => {
                            eprintln!("{} fault in {}: {}", item.producer, fault.hook, fault.message);
                        }
                        Payload::Data(_) => {}
                    }
                }
                if let Err(e) = alive {
                    died = Some(e);
                    break;
                }
            }
        }
    }

    shutdown(handle).await?;
    match died {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn print_json<R: Serialize>(item: &ResultItem<R>) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(item)?);
    Ok(())
}

/// Stop the worker and join it off the async runtime.
async fn shutdown<S: Specialization>(mut handle: WorkerHandle<S>) -> anyhow::Result<()> {
    handle.stop()?;
    tokio::task::spawn_blocking(move || handle.join(JOIN_TIMEOUT)).await??;
    Ok(())
}
