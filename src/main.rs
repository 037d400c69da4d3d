use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hark_dialog::audio::FRAME_SAMPLES;
use hark_dialog::config::DEFAULT_SAMPLE_RATE;
use hark_dialog::{
    AudioFrameSource, CpalFrameSource, CpalPromptPlayer, DialogConfig, DialogEngine,
    EnergyRecognizer,
};

/// Hark - voice-activated dialog front end
#[derive(Parser)]
#[command(name = "hark", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "HARK_CONFIG")]
    config: Option<PathBuf>,

    /// Input device name; omit for the default input device
    #[arg(long, env = "HARK_DEVICE")]
    device: Option<String>,

    /// Wake keyword the dialog listens for
    #[arg(short, long, env = "HARK_KEYWORD")]
    keyword: Option<String>,

    /// Locale tag forwarded to the command processor
    #[arg(long, env = "HARK_LANG")]
    lang: Option<String>,

    /// Command processor script run on captured recordings
    #[arg(long, env = "HARK_PROCESSOR")]
    processor: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,hark_dialog=info",
        1 => "info,hark_dialog=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(cli.device.as_deref(), duration).await,
        };
    }

    let mut config = DialogConfig::load(cli.config.as_deref())?;
    if cli.device.is_some() {
        config.device = cli.device;
    }
    if let Some(keyword) = cli.keyword {
        config.keyword = keyword;
    }
    if let Some(lang) = cli.lang {
        config.lang = lang;
    }
    if let Some(processor) = cli.processor {
        config.command_processor = processor;
    }
    tracing::debug!(?config, "loaded configuration");

    let keyword = config.keyword.clone();
    let recognizer =
        EnergyRecognizer::new(config.keyword.as_str()).with_options(&config.asr_args());

    let device = config.device.clone();
    let sample_rate = config.sample_rate;
    let source = Box::new(move || {
        let source = CpalFrameSource::open(device.as_deref(), sample_rate)?;
        Ok(Box::new(source) as Box<dyn AudioFrameSource>)
    });

    let engine = DialogEngine::new(
        config,
        source,
        Box::new(recognizer),
        Box::new(CpalPromptPlayer),
    );
    let (handle, mut commands) = engine.start()?;

    tracing::info!("hark ready - say \"{keyword}\"");

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(text) => println!("{text}"),
                None => {
                    tracing::info!("dialog loop ended");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, stopping");
                break;
            }
        }
    }

    handle.stop()?;
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(device: Option<&str>, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut source = CpalFrameSource::open(device, DEFAULT_SAMPLE_RATE)?;
    source.start()?;

    println!("Sample rate: {DEFAULT_SAMPLE_RATE} Hz");
    println!("---");

    let mut frame = vec![0_i16; FRAME_SAMPLES];
    for i in 0..duration {
        let mut samples = Vec::new();
        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        while std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let n = source.read(&mut frame)?;
            samples.extend_from_slice(&frame[..n]);
        }

        let energy = calculate_rms(&samples);
        let peak = samples
            .iter()
            .map(|s| f32::from(*s).abs() / 32_768.0)
            .fold(0.0_f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    source.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");
    println!("  4. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Calculate RMS energy over normalized samples
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples
        .iter()
        .map(|s| {
            let v = f32::from(*s) / 32_768.0;
            v * v
        })
        .sum();
    (sum_squares / samples.len() as f32).sqrt()
}
