//! # Ear Trainer - Command Line Front-End
//!
//! Shows a random target note, listens to the microphone until the note has
//! been sung or played steadily, then moves on to the next one.
//!
//! ## Architecture
//! - **Main Thread**: training loop, owns the `MatchEngine`
//! - **Audio Thread**: owns the CPAL input stream for the whole run
//! - **Communication**: Crossbeam channels for frames and shutdown

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser};
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use trainer_core::{MatchListener, Note, TrainerConfig, audio, tuning};

/// Frames buffered between the audio callback and the training loop.
const FRAME_QUEUE: usize = 16;

#[derive(Debug, Parser)]
#[command(name = "trainer", version, about = "Sing or play the note shown until it is recognised")]
struct Args {
    /// JSON configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Lowest target note, e.g. "G/3"
    #[arg(long)]
    min: Option<Note>,

    /// Highest target note, e.g. "A/5"
    #[arg(long)]
    max: Option<Note>,

    /// Stop after this many notes (default: keep going)
    #[arg(short, long)]
    rounds: Option<usize>,

    /// List audio input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Write the effective configuration to PATH and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// More log output (-v, -vv); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list_devices {
        for name in audio::list_input_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    let config = load_config(&args)?;

    if let Some(path) = &args.write_config {
        config.save(path)?;
        info!(target: "trainer", path = %path.display(), "configuration written");
        return Ok(());
    }

    run(&config, args.rounds)
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Reads the configuration file (if any) and applies command line overrides.
fn load_config(args: &Args) -> Result<TrainerConfig> {
    let mut config = match &args.config {
        Some(path) => TrainerConfig::load(path)?,
        None => TrainerConfig::default(),
    };

    if let Some(min) = args.min {
        config.min_note = min;
    }
    if let Some(max) = args.max {
        config.max_note = max;
    }

    config.validate()?;
    Ok(config)
}

/// Starts the audio thread, trains, and shuts the audio thread down again.
fn run(config: &TrainerConfig, rounds: Option<usize>) -> Result<()> {
    let (frame_tx, frame_rx) = crossbeam_channel::bounded(FRAME_QUEUE);
    let (worker, sample_rate) = AudioWorker::start(config.sample_rate, frame_tx)?;

    let result = train(config, rounds, &frame_rx, sample_rate);

    worker.stop();
    result
}

fn train(
    config: &TrainerConfig,
    rounds: Option<usize>,
    frames: &Receiver<Vec<f32>>,
    sample_rate: u32,
) -> Result<()> {
    let mut engine = config.engine();
    let mut listener = ConsoleListener::new(config.matching.band_low, config.matching.band_high);
    let mut rng = rand::thread_rng();
    let mut round = 0;

    while rounds.is_none_or(|limit| round < limit) {
        round += 1;
        let target = config.min_note.random_to(config.max_note, &mut rng)?;

        // Audio captured before the prompt belongs to the previous round.
        frames.try_iter().for_each(drop);

        println!("Round {round}: play or sing {target}");
        let started = Instant::now();
        listener.reset();

        match engine.listen_till_match(target, frames.iter(), sample_rate, &mut listener) {
            Some(note) => println!("  {note} found after {:.1}s", started.elapsed().as_secs_f32()),
            None => bail!("audio stream ended before {target} was found"),
        }
    }

    Ok(())
}

/// Reports engine events through the log.
///
/// Every estimate is logged at debug. The note being heard is logged at info
/// whenever it changes, as long as it lies inside the detection band.
struct ConsoleListener {
    band_low: Note,
    band_high: Note,
    heard: Option<Note>,
}

impl ConsoleListener {
    fn new(band_low: Note, band_high: Note) -> Self {
        Self {
            band_low,
            band_high,
            heard: None,
        }
    }

    fn reset(&mut self) {
        self.heard = None;
    }

    /// Classifies `frequency` and returns the note with its cents deviation
    /// if it is in band and differs from the last note reported.
    fn heard_note(&mut self, frequency: f32) -> Option<(Note, Option<f32>)> {
        let note = tuning::classify(frequency);
        if !note.is_between(&self.band_low, &self.band_high) {
            return None;
        }
        if self.heard == Some(note) {
            return None;
        }
        self.heard = Some(note);
        let cents = tuning::frequency_of(&note).map(|center| tuning::cents_deviation(frequency, center));
        Some((note, cents))
    }
}

impl MatchListener for ConsoleListener {
    fn on_pitch_estimated(&mut self, frequency: Option<f32>) {
        let Some(frequency) = frequency else {
            return;
        };
        debug!(target: "trainer", frequency, "pitch estimated");
        if let Some((note, cents)) = self.heard_note(frequency) {
            match cents {
                Some(cents) => info!(target: "trainer", note = %note, "hearing {note} ({cents:+.0} cents)"),
                None => info!(target: "trainer", note = %note, "hearing {note}"),
            }
        }
    }

    fn on_matched(&mut self, note: &Note) {
        info!(target: "trainer", note = %note, "note matched");
    }
}

/// Audio worker thread management structure.
///
/// The CPAL stream is created and dropped on the worker thread, which then
/// simply waits for the shutdown signal while the stream callback delivers
/// frames.
#[derive(Debug)]
struct AudioWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl AudioWorker {
    /// Spawns the audio thread and waits until capture is running.
    ///
    /// # Returns
    /// * `Ok((worker, sample_rate))` - Running worker and the device sample rate
    /// * `Err(e)` - The thread could not be spawned or capture failed to start
    fn start(target_rate: u32, frame_tx: Sender<Vec<f32>>) -> Result<(Self, u32)> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<u32, String>>(1);

        let thread_handle = thread::Builder::new()
            .name("audio".into())
            .spawn(move || {
                info!(target: "audio", "starting audio thread");
                let stream = match audio::start_audio_capture(frame_tx, target_rate) {
                    Ok((stream, sample_rate)) => {
                        let _ = ready_tx.send(Ok(sample_rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("{e:#}")));
                        return;
                    }
                };

                let _ = shutdown_rx.recv();

                info!(target: "audio", "stopping stream");
                if let Err(e) = stream.pause() {
                    warn!(target: "audio", "error pausing stream: {}", e);
                }
                drop(stream);
                info!(target: "audio", "audio thread finished");
            })
            .context("failed to spawn audio thread")?;

        let sample_rate = ready_rx
            .recv()
            .context("audio thread exited during setup")?
            .map_err(|e| anyhow!("failed to start audio capture: {e}"))?;

        Ok((
            Self {
                shutdown_tx,
                thread_handle: Some(thread_handle),
            },
            sample_rate,
        ))
    }

    fn stop(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!(target: "audio", "audio thread panicked");
            }
        }
    }
}
