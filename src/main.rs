use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use murmur_gateway::api::{ApiServer, ApiState};
use murmur_gateway::config::Overrides;
use murmur_gateway::{Config, Models, SynthesisHandle};

/// Murmur - Real-time voice endpoint for conversational assistants
#[derive(Parser)]
#[command(name = "murmur", version, about)]
struct Cli {
    /// Address to bind (overrides `MURMUR_HOST`)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides `MURMUR_PORT`)
    #[arg(short, long)]
    port: Option<u16>,

    /// Config file (defaults to ~/.config/murmur/config.toml)
    #[arg(short, long, env = "MURMUR_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize a phrase with the configured TTS backend and save it
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello, this is a test of the text to speech integration.")]
        text: String,

        /// Where to write the audio
        #[arg(short, long, default_value = "test_audio.mp3")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,murmur_gateway=info",
        1 => "info,murmur_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = Overrides {
        config_path: cli.config,
        host: cli.host,
        port: cli.port,
    };

    let config = Config::load(&overrides)?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestTts { text, output } => test_tts(&config, &text, &output).await,
        };
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        stt = %config.stt.provider,
        tts = %config.tts.provider,
        vad_threshold = config.pipeline.energy_threshold,
        silence_limit_ms = config.pipeline.silence_limit.as_millis(),
        "starting murmur gateway"
    );

    let models = Models::load(&config).await;
    let state = ApiState::new(config.pipeline.clone(), models);
    let server = ApiServer::new(state, config.server.host.clone(), config.server.port);

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}

/// Synthesize `text` and write the audio to `output`
async fn test_tts(config: &Config, text: &str, output: &std::path::Path) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let handle = SynthesisHandle::from_config(config)?
        .ok_or_else(|| anyhow::anyhow!("speech synthesis is disabled (MURMUR_TTS_PROVIDER=none)"))?;
    println!(
        "Backend: {} (voice {})",
        handle.synthesizer.describe(),
        handle.voice
    );

    println!("Synthesizing speech...");
    let start = Instant::now();
    let audio = handle
        .synthesizer
        .synthesize(text, &handle.voice)
        .await
        .map_err(|e| anyhow::anyhow!("TTS synthesis failed: {e}"))?;
    println!(
        "Got {} bytes of audio data in {:.0} ms",
        audio.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    anyhow::ensure!(!audio.is_empty(), "synthesizer returned no audio");

    tokio::fs::write(output, &audio).await?;
    println!("Saved to {}", output.display());

    Ok(())
}
