use std::time::Duration;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use guild_chat::common::NetworkCommand;
use guild_chat::config::{self, AppConfig};
use guild_chat::network::{ChatClient, WsConnector};
use guild_chat::session::SessionContext;
use guild_chat::storage::{self, SessionDatabase};
use guild_chat::ui::{ChatApp, Controller};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(
    name = "guild_chat",
    version,
    about = "Desktop client for guild chat servers"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Override the HTTP API base URL
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,
    /// Override the WebSocket base URL
    #[arg(long, value_name = "URL")]
    ws_url: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Delete the persisted login token and exit
    ForgetSession,
    /// Print the effective configuration and exit
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<(), eframe::Error> {
    dotenv().ok();
    // Khởi tạo Logger để debug
    env_logger::init();

    let cli = Cli::parse();
    let mut app_config = config::load_config(&cli.config);
    app_config.apply_env();
    if let Some(url) = cli.api_url {
        app_config.api_base_url = url;
    }
    if let Some(url) = cli.ws_url {
        app_config.ws_base_url = url;
    }
    if let Err(err) = app_config.validate() {
        log::error!("Invalid configuration: {err}");
        std::process::exit(2);
    }

    match cli.command {
        Some(Command::ShowConfig) => {
            match serde_json::to_string_pretty(&app_config) {
                Ok(json) => println!("{json}"),
                Err(err) => log::error!("Failed to render configuration: {err}"),
            }
            return Ok(());
        }
        Some(Command::ForgetSession) => {
            forget_session(&app_config);
            return Ok(());
        }
        None => {}
    }

    run_client(app_config, cli.config).await
}

fn open_session_db(app_config: &AppConfig) -> Option<SessionDatabase> {
    if let Err(err) = storage::ensure_data_dir(&app_config.data_dir) {
        log::warn!(
            "Cannot create data dir {}: {err}; session will not persist",
            app_config.data_dir.display()
        );
        return None;
    }
    match SessionDatabase::open_in(&app_config.data_dir) {
        Ok(db) => Some(db),
        Err(err) => {
            log::warn!("Cannot open session database: {err}; session will not persist");
            None
        }
    }
}

fn forget_session(app_config: &AppConfig) {
    let Some(db) = open_session_db(app_config) else {
        return;
    };
    match db.clear() {
        Ok(true) => println!("Persisted session removed"),
        Ok(false) => println!("No persisted session"),
        Err(err) => log::error!("Failed to remove persisted session: {err}"),
    }
}

async fn run_client(app_config: AppConfig, config_path: String) -> Result<(), eframe::Error> {
    // 1. Tạo các kênh giao tiếp (Channels)
    // UI -> Network
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // Network -> UI
    let (event_tx, event_rx) = mpsc::channel(100);

    // 2. Khởi chạy Network Thread (Chạy ngầm)
    let context = SessionContext::new(open_session_db(&app_config));
    let connector = WsConnector::new(Duration::from_secs(app_config.request_timeout_secs));
    match ChatClient::new(&app_config, connector, context, event_tx, cmd_rx) {
        Ok(client) => {
            tokio::spawn(async move {
                if let Err(err) = client.run().await {
                    log::error!("Network client terminated: {err}");
                }
            });
        }
        Err(err) => log::error!("Network client failed to start: {err}"),
    }

    if let Err(err) = cmd_tx.try_send(NetworkCommand::RestoreSession) {
        log::warn!("Failed to request session restore: {err}");
    }

    // 3. Khởi chạy UI (Chạy trên Main Thread)
    let options = eframe::NativeOptions::default();
    let mut event_rx = Some(event_rx);
    let servers = app_config.servers.clone();

    eframe::run_native(
        "Guild Chat",
        options,
        Box::new(move |cc| {
            let Some(event_receiver) = event_rx.take() else {
                return Err("ChatApp should only be initialized once".into());
            };

            log::info!(
                "Client started against {} with {} servers",
                app_config.api_base_url,
                servers.len()
            );

            let controller = Controller::new(servers.clone(), cmd_tx.clone(), Some(config_path.clone()));
            Ok(Box::new(ChatApp::new(cc, controller, event_receiver)))
        }),
    )
}
