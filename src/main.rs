use std::sync::Arc;

use clap::Parser;
use commands::Command;
use constants::STARTUP_TIME;
use init::Config;
use store::QuoteStore;
use sync::Reconciler;
use tokio::sync::Mutex;

/// Shared state handed to every command.
#[derive(Clone)]
pub struct Data {
    pub store: Arc<Mutex<QuoteStore>>,
    pub reconciler: Arc<Reconciler>,
    pub config: Arc<Config>,
}

mod commands;
mod constants;
mod error;
mod init;
mod models;
mod remote;
mod storage;
mod store;
mod sync;
mod telemetry;

/// a dynamic quote generator that keeps its quotes in sync with a server.
#[derive(Parser)]
#[command(name = "quotesync", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let _ = &*STARTUP_TIME;

    telemetry::init_telemetry()?;

    let cli = Cli::parse();
    let data = init::init(Config::from_env()).await?;

    match cli.command.unwrap_or(Command::Show { category: None }) {
        Command::Run => commands::session::run(&data).await,
        command => commands::execute(&data, command).await,
    }
}
