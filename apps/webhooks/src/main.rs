//! `sms-inbox` binary: the webhook ingestion server plus an outbound send
//! helper, sharing one environment-derived configuration.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use smi_core::Config;
use smi_twilio::TwilioClient;
use smi_webhooks::{build_state, router};

#[derive(Parser, Debug)]
#[command(name = "sms-inbox", version, about = "SMS inbox as a service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the webhook ingestion server
    Web {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },
    /// Send an outbound SMS through the provider API
    Send {
        /// Sender number (E.164)
        #[arg(long)]
        from: String,
        /// Destination number (E.164)
        #[arg(long)]
        to: String,
        /// Message body
        body: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    smi_core::init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Command::Web { bind } => serve(config, bind).await,
        Command::Send { from, to, body } => send(config, &from, &to, &body).await,
    }
}

async fn serve(config: Config, bind: SocketAddr) -> Result<()> {
    if config.twilio_auth_token.is_none() {
        tracing::warn!("TWILIO_AUTH_TOKEN is not configured; signed webhooks will be rejected");
    }

    let state = build_state(&config)?;
    tracing::info!(storage = %config.storage_path.display(), "storage ready");

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    tracing::info!("sms-inbox listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}

async fn send(config: Config, from: &str, to: &str, body: &str) -> Result<()> {
    let account_sid = config
        .twilio_account_sid
        .context("TWILIO_ACCOUNT_SID is not configured")?;
    let auth_token = config
        .twilio_auth_token
        .context("TWILIO_AUTH_TOKEN is not configured")?;

    let client = TwilioClient::new(account_sid, auth_token);
    let message = client.send_message(from, to, body).await?;
    println!("{} {}", message.sid, message.status);
    Ok(())
}
