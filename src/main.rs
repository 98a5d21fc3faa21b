use std::sync::Arc;

use clap::Parser;
use complaint_chat::common::{ChatCommand, ComplaintId, PartyId};
use complaint_chat::config;
use complaint_chat::network::{ChatClient, ClientOptions, HttpComplaintApi, WsConnector};
use complaint_chat::ui::TerminalApp;
use dotenvy::dotenv;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(
    name = "complaint-chat",
    version,
    about = "Live chat about a complaint between a customer and an employee"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Your own user id; the live channel listens on it
    #[arg(long)]
    owner: String,
    /// Name shown on your messages
    #[arg(long, default_value = "Employee")]
    display_name: String,
    /// Complaint to open on start
    #[arg(long, requires = "counterpart")]
    complaint: Option<String>,
    /// User id of the other party
    #[arg(long, requires = "complaint")]
    counterpart: Option<String>,
    /// Name shown on the other party's messages
    #[arg(long)]
    counterpart_name: Option<String>,
    /// Write the effective config to --config and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let mut app_config = config::load_config(&cli.config);
    app_config.apply_env_overrides(|key| std::env::var(key).ok());
    app_config.validate()?;

    if cli.init_config {
        config::save_config(&cli.config, &app_config)?;
        log::info!("Wrote config to {}", cli.config);
        return Ok(());
    }

    // View -> client
    let (cmd_tx, cmd_rx) = mpsc::channel(app_config.channel_capacity);
    // Client -> view
    let (event_tx, event_rx) = mpsc::channel(app_config.channel_capacity);

    let options = ClientOptions {
        owner: PartyId::from(cli.owner),
        display_name: Some(cli.display_name),
        service_base: app_config.chat_service_base.clone(),
        echo_reconciliation: app_config.echo_reconciliation,
    };
    let api = Arc::new(HttpComplaintApi::new(app_config.api_base_url.clone()));
    let client = ChatClient::new(options, Arc::new(WsConnector), api, event_tx);
    let client_task = tokio::spawn(client.run(cmd_rx));

    if let (Some(complaint), Some(counterpart)) = (cli.complaint, cli.counterpart) {
        cmd_tx
            .send(ChatCommand::OpenConversation {
                complaint_id: ComplaintId::from(complaint),
                counterpart: PartyId::from(counterpart),
                counterpart_name: cli.counterpart_name,
            })
            .await?;
    }

    let app = TerminalApp::new(cmd_tx, event_rx);
    tokio::select! {
        result = app.run() => {
            if let Err(err) = result {
                log::error!("Terminal input failed: {err}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Received shutdown signal, closing chat...");
        }
    }

    // Dropping the view's command sender lets the client close its channel.
    if let Err(err) = client_task.await {
        log::error!("Chat client task failed: {err}");
    }

    Ok(())
}
