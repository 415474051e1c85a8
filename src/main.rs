//! voicebridge - media transport client for a voice/video channel
//!
//! Starts from an already-negotiated voice server update (server ID,
//! session ID, endpoint, token); the primary event gateway that produces
//! those is out of scope for this crate, so the CLI takes them as
//! arguments rather than opening that gateway itself.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voicebridge::config::{self, Config};
use voicebridge::voice::{SessionIdentity, StreamSession, VoiceSession};

#[derive(Parser)]
#[command(name = "voicebridge")]
#[command(about = "Media transport client for a voice/video channel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Args)]
struct VoiceTarget {
    /// Guild or DM channel ID sent as `server_id` in IDENTIFY.
    #[arg(long)]
    server_id: String,

    /// Session ID from the voice state update.
    #[arg(long)]
    session_id: String,

    /// Voice server endpoint host (without `wss://` or the `/?v=7` suffix).
    #[arg(long)]
    endpoint: String,

    /// Seconds to hold the session open before disconnecting.
    #[arg(short, long, default_value = "30")]
    duration: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a voice channel and hold the session open.
    Join {
        #[command(flatten)]
        target: VoiceTarget,
    },

    /// Start a stream (screenshare) session and hold it open.
    Stream {
        #[command(flatten)]
        target: VoiceTarget,

        /// Stream key identifying this stream to the preview upload endpoint.
        #[arg(long)]
        stream_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::load().context("failed to load configuration")?;
    let mode = config.encryption_mode().context("invalid encryption mode in configuration")?;
    let user_id = config::derive_user_id(&config.user.token).context("failed to derive user ID from token")?;

    match cli.command {
        Commands::Join { target } => {
            let identity = SessionIdentity {
                user_id,
                session_id: target.session_id,
                server_id: target.server_id,
                endpoint: target.endpoint,
                token: config.user.token,
            };

            tracing::info!("connecting voice session...");
            let session = VoiceSession::start(identity, mode).await.context("voice handshake failed")?;
            tracing::info!("voice session ready");
            session.set_speaking(true).await.context("failed to signal speaking")?;

            tokio::time::sleep(std::time::Duration::from_secs(target.duration)).await;
        }
        Commands::Stream { target, stream_key } => {
            let identity = SessionIdentity {
                user_id,
                session_id: target.session_id,
                server_id: target.server_id,
                endpoint: target.endpoint,
                token: config.user.token,
            };

            tracing::info!("connecting stream session...");
            let stream = StreamSession::start(identity, mode, stream_key)
                .await
                .context("stream handshake failed")?;
            tracing::info!("stream session ready");
            stream.set_speaking(true).await.context("failed to signal stream presence")?;

            tokio::time::sleep(std::time::Duration::from_secs(target.duration)).await;
        }
    }

    Ok(())
}
