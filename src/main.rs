use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel;
use cuebeat::audio::{AudioOutput, CLICK_QUEUE_CAPACITY, ClickSynthesizer, enumerate_output_devices};
use cuebeat::{Config, Metronome, MetronomeEvent, TerminalUI, TimeSignature};
use std::path::PathBuf;

/// Terminal metronome for dance rehearsals.
///
/// Keys: Space start, S stop, B tap, +/- tempo, T type BPM,
/// C switch 4/4 and flamenco 12, M mute, R start from last beat, Q quit.
#[derive(Debug, Parser)]
#[command(name = "cuebeat", version, about)]
struct Args {
    /// Config file (defaults to ./cuebeat.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Initial tempo in beats per minute
    #[arg(short, long)]
    bpm: Option<f64>,

    /// Initial time signature
    #[arg(short, long, value_enum)]
    signature: Option<TimeSignature>,

    /// Start muted
    #[arg(short, long)]
    mute: bool,

    /// Output device name
    #[arg(short, long)]
    output_device: Option<String>,

    /// Print available output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Write debug logging to debug.log
    #[arg(long)]
    debug: bool,
}

fn init_logging(debug: bool) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .context("opening debug.log")?;

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if debug { "cuebeat=debug" } else { "warn" }),
    );
    builder
        .target(env_logger::Target::Pipe(Box::new(file)))
        .write_style(env_logger::WriteStyle::Never)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_devices {
        for name in enumerate_output_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    init_logging(args.debug)?;

    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(bpm) = args.bpm {
        config.metronome.bpm = bpm;
    }
    if let Some(signature) = args.signature {
        config.metronome.signature = signature;
    }
    if args.mute {
        config.metronome.muted = true;
    }
    if args.output_device.is_some() {
        config.audio.output_device = args.output_device.clone();
    }
    log::debug!("Effective config: {:?}", config);

    let (mut synth, clicks) = ClickSynthesizer::channel(CLICK_QUEUE_CAPACITY);
    let mut output = None;
    if config.audio.enabled {
        match AudioOutput::open(&config.audio, clicks) {
            Ok(opened) => {
                log::info!(
                    "Audio output: {} ({} Hz, {} ch)",
                    opened.device_name(),
                    opened.sample_rate(),
                    opened.channels()
                );
                output = Some(opened);
            }
            Err(err) => {
                log::warn!("Audio unavailable, running silent: {:#}", err);
                synth = ClickSynthesizer::silent();
            }
        }
    } else {
        synth = ClickSynthesizer::silent();
    }

    let output_device_name = output
        .as_ref()
        .map(|o| o.device_name().to_string())
        .unwrap_or_else(|| "none".to_string());

    let metronome = Metronome::from_config(&config, synth);
    let (event_sender, event_receiver) = channel::unbounded::<MetronomeEvent>();
    metronome.set_event_sender(event_sender);

    let mut ui = TerminalUI::new(metronome, event_receiver, &output_device_name)
        .map_err(|e| anyhow::anyhow!("UI creation failed: {}", e))?;
    ui.run()
        .map_err(|e| anyhow::anyhow!("UI run failed: {}", e))?;
    drop(ui);

    // Keep the stream open until the UI is gone
    drop(output);
    Ok(())
}
