//! Push-to-talk dictation CLI

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use dictate::{
    ui, AudioEngine, AuthorizationProvider, AuthorizationStatus, Config, ConsentAuthorization,
    ConsoleSurface, ControllerEvent, DictationController, StreamingRecognizer,
};

/// Push-to-talk dictation
#[derive(Parser)]
#[command(name = "dictate")]
#[command(about = "Live speech transcription for the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive dictation
    Run {
        /// Audio input device name (uses default if not specified)
        #[arg(short, long)]
        device: Option<String>,

        /// Path to Whisper model file
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Recognition locale (e.g., en, ru, de, fr, es)
        #[arg(short, long)]
        locale: Option<String>,

        /// Grant speech recognition consent for this run
        #[arg(long)]
        consent: bool,
    },

    /// List available audio input devices
    Devices,

    /// Show the speech recognition authorization status
    Auth,

    /// Download a Whisper model
    DownloadModel {
        /// Model size (tiny, base, small, medium, large); defaults to
        /// the configured size
        #[arg(short, long)]
        size: Option<String>,

        /// Download English-only model (smaller, faster)
        #[arg(long)]
        english_only: bool,

        /// Output directory for models
        #[arg(short, long, default_value = "./models")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging - quiet by default, use -v for more
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    // Load configuration
    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Run {
            device,
            model,
            locale,
            consent,
        } => {
            // Apply CLI overrides
            if let Some(device) = device {
                config.audio.device = Some(device);
            }
            if let Some(model) = model {
                config.recognizer.model_path = model;
            }
            if let Some(locale) = locale {
                config.recognizer.locale = locale;
            }
            if consent {
                config.auth.consent = Some(true);
            }

            run_dictation(config)
        }
        Commands::Devices => list_devices(),
        Commands::Auth => auth_status(&config),
        Commands::DownloadModel {
            size,
            english_only,
            output_dir,
        } => {
            let size = size.unwrap_or_else(|| config.recognizer.model_size.to_string());
            download_model(&size, english_only, &output_dir)
        }
    }
}

#[cfg(feature = "whisper")]
fn build_recognizer(config: &Config) -> Result<StreamingRecognizer> {
    use dictate::WhisperBackend;
    use std::sync::Arc;

    let backend = WhisperBackend::new(&config.recognizer)
        .context("Failed to initialize recognizer backend")?;
    Ok(StreamingRecognizer::new(
        config.recognizer.clone(),
        Arc::new(backend),
    ))
}

#[cfg(not(feature = "whisper"))]
fn build_recognizer(_config: &Config) -> Result<StreamingRecognizer> {
    anyhow::bail!("Built without a recognizer backend; rebuild with the 'whisper' feature")
}

/// Run the interactive dictation loop
fn run_dictation(config: Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    info!(
        "Loading recognizer (model: {})",
        config.recognizer.model_path.display()
    );
    let recognizer = build_recognizer(&config)?;

    let engine = AudioEngine::new(config.audio.clone());
    let surface = ConsoleSurface::new();
    let mut controller = DictationController::new(
        Box::new(engine),
        Box::new(recognizer),
        Box::new(surface),
        &config,
    );

    // Ctrl+C and stdin both feed the controller mailbox
    let events = controller.sender();
    ctrlc::set_handler(move || {
        let _ = events.send(ControllerEvent::Quit);
    })
    .context("Failed to install shutdown handler")?;

    let events = controller.sender();
    std::thread::spawn(move || ui::read_input(events));

    let auth = ConsentAuthorization::new(&config.auth);
    controller.bootstrap(&auth);

    println!("Push-to-talk dictation. Press Enter to toggle recording, q to quit.");
    controller.run();

    Ok(())
}

/// List available audio input devices
fn list_devices() -> Result<()> {
    let engine = AudioEngine::new(dictate::AudioConfig::default());
    let devices = engine.list_devices()?;

    if devices.is_empty() {
        println!("No audio input devices found");
    } else {
        println!("Available audio input devices:");
        for (i, name) in devices.iter().enumerate() {
            println!("  {}. {}", i + 1, name);
        }
    }

    Ok(())
}

/// Evaluate and print the authorization status
fn auth_status(config: &Config) -> Result<()> {
    let provider = ConsentAuthorization::new(&config.auth);
    let (tx, rx) = crossbeam_channel::bounded(1);
    provider.request_authorization(Box::new(move |status| {
        let _ = tx.send(status);
    }));

    let status = rx
        .recv_timeout(Duration::from_secs(5))
        .context("Authorization request timed out")?;

    println!("Speech recognition authorization: {}", status);
    if status != AuthorizationStatus::Authorized {
        println!();
        println!("Grant access with 'consent = true' under [auth] in the config file,");
        println!("or pass --consent to 'dictate run'.");
    }

    Ok(())
}

/// Download a Whisper model from Hugging Face
fn download_model(size: &str, english_only: bool, output_dir: &PathBuf) -> Result<()> {
    let valid_sizes = ["tiny", "base", "small", "medium", "large"];
    if !valid_sizes.contains(&size) {
        anyhow::bail!(
            "Invalid model size '{}'. Valid sizes: {}",
            size,
            valid_sizes.join(", ")
        );
    }

    let suffix = if english_only { ".en" } else { "" };
    let filename = format!("ggml-{}{}.bin", size, suffix);
    let url = format!(
        "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
        filename
    );

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

    let destination = output_dir.join(&filename);
    if destination.exists() {
        println!("Model already exists: {}", destination.display());
        println!("Delete it first if you want to re-download.");
        return Ok(());
    }

    println!("Downloading {} model from {}", size, url);
    println!("Destination: {}", destination.display());
    println!();

    let destination_str = destination
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Output path contains invalid UTF-8 characters"))?;

    // curl gives us a progress bar for free
    let status = std::process::Command::new("curl")
        .args(["-L", "--progress-bar", "-o", destination_str, &url])
        .status()
        .context("Failed to execute curl. Make sure curl is installed.")?;

    if !status.success() {
        anyhow::bail!("Download failed with exit code: {:?}", status.code());
    }

    let metadata = std::fs::metadata(&destination)
        .with_context(|| format!("Failed to read downloaded file: {}", destination.display()))?;

    // A truncated download is worse than no download
    let size_mb = metadata.len() as f64 / 1_000_000.0;
    if size_mb < 10.0 {
        std::fs::remove_file(&destination)?;
        anyhow::bail!(
            "Downloaded file is too small ({:.1} MB). Download may have failed.",
            size_mb
        );
    }

    println!();
    println!("Download complete: {:.1} MB", size_mb);
    println!();
    println!("To use this model:");
    println!("  dictate run -m {}", destination.display());

    Ok(())
}
