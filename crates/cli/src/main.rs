use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context as _,
    clap::{Parser, Subcommand},
    secrecy::ExposeSecret,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
    waypost_config::{ChannelConfig, WaypostConfig},
    waypost_gateway::{AppState, HttpBackend, NoopSink},
    waypost_whatsapp::{
        ChannelClient, DispatchSequencer, EventSink, MediaStore, OutboundPayload, Transcript,
    },
};

#[derive(Parser)]
#[command(name = "waypost", about = "Waypost — WhatsApp Business bridge")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file path (overrides discovery).
    #[arg(long, global = true, env = "WAYPOST_CONFIG")]
    config: Option<PathBuf>,

    // Serve arguments (used when no subcommand is provided, or with `serve`)
    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge server (default when no subcommand is provided).
    Serve,
    /// Send one message through the channel and print its ID.
    Send {
        /// Recipient phone number in international format, no plus sign.
        #[arg(long)]
        to: String,
        #[arg(short, long)]
        message: String,
    },
    /// Print the effective configuration with secrets redacted.
    Config,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<WaypostConfig> {
    match cli.config {
        Some(ref path) => waypost_config::load_config(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(waypost_config::discover_and_load()),
    }
}

/// The bridge cannot do anything useful without channel credentials, so
/// refuse to start instead of failing on the first request.
fn validate_channel(channel: &ChannelConfig) -> anyhow::Result<()> {
    if channel.phone_number_id.is_empty() {
        anyhow::bail!(
            "channel.phone_number_id is not set; configure it in waypost.toml or WAYPOST_* env vars"
        );
    }
    if channel.access_token.expose_secret().is_empty() {
        anyhow::bail!(
            "channel.access_token is not set; configure it in waypost.toml or WAYPOST_* env vars"
        );
    }
    Ok(())
}

async fn serve(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    validate_channel(&config.channel)?;
    if config.channel.app_secret.is_none() {
        tracing::warn!("channel.app_secret is not set, webhook signatures will not be verified");
    }

    let bind = cli.bind.unwrap_or(config.server.bind);
    let port = cli.port.unwrap_or(config.server.port);

    let client = ChannelClient::new(&config.channel)?;
    let transcript = Arc::new(Transcript::new());
    let media = Arc::new(MediaStore::new(client.clone(), &config.storage));
    let sequencer = Arc::new(DispatchSequencer::new(
        Arc::new(client),
        Arc::clone(&transcript),
        config.dispatch.queue_capacity,
    ));
    let sink: Arc<dyn EventSink> = match config.backend.webhook_url {
        Some(ref url) => Arc::new(HttpBackend::new(url.clone(), config.backend.secret.clone())?),
        None => Arc::new(NoopSink),
    };

    let state = AppState {
        sequencer,
        media,
        transcript,
        sink,
        channel: Arc::new(config.channel),
        storage: Arc::new(config.storage),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    };

    waypost_gateway::start_gateway(state, &bind, port).await
}

async fn send(cli: &Cli, to: String, message: String) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    validate_channel(&config.channel)?;

    let client = ChannelClient::new(&config.channel)?;
    let id = client
        .send_message(&OutboundPayload::text(to, message))
        .await?;
    println!("{id}");
    Ok(())
}

fn show_config(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    println!("{config:#?}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mut cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "waypost starting");

    match cli.command.take() {
        None | Some(Commands::Serve) => serve(cli).await,
        Some(Commands::Send { to, message }) => send(&cli, to, message).await,
        Some(Commands::Config) => show_config(&cli),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use secrecy::Secret;

    use super::*;

    fn configured_channel() -> ChannelConfig {
        ChannelConfig {
            phone_number_id: "15550001111".into(),
            access_token: Secret::new("token".into()),
            ..ChannelConfig::default()
        }
    }

    #[test]
    fn validate_accepts_configured_channel() {
        assert!(validate_channel(&configured_channel()).is_ok());
    }

    #[test]
    fn validate_rejects_missing_phone_number_id() {
        let channel = ChannelConfig {
            phone_number_id: String::new(),
            ..configured_channel()
        };
        let error = validate_channel(&channel).unwrap_err();
        assert!(error.to_string().contains("channel.phone_number_id"));
    }

    #[test]
    fn validate_rejects_missing_access_token() {
        let channel = ChannelConfig {
            access_token: Secret::new(String::new()),
            ..configured_channel()
        };
        let error = validate_channel(&channel).unwrap_err();
        assert!(error.to_string().contains("channel.access_token"));
    }
}
