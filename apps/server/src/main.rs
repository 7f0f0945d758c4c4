use anyhow::Context;
use clap::{Parser, Subcommand};
use herald_backend_api::{build_router, AppState};
use herald_backend_runtime::{telemetry, BackendServices};
use herald_config::load as load_config;
use tokio::net::TcpListener;
use tracing::info;

const SEED_PASSWORD: &str = "password";
const SEED_USERS: [(&str, &str); 3] = [
    ("alice@example.com", "Alice"),
    ("bob@example.com", "Bob"),
    ("carol@example.com", "Carol"),
];

#[derive(Parser)]
#[command(name = "herald-backend")]
#[command(about = "Herald message delivery backend (serves HTTP by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Create demo users, sessions and a conversation
    SeedData,
    /// Print every conversation's messages with their delivery ledgers
    DumpMessages,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::SeedData => seed_data().await,
        Commands::DumpMessages => dump_messages().await,
    }
}

async fn initialise() -> anyhow::Result<(herald_config::AppConfig, BackendServices)> {
    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;
    Ok((config, services))
}

async fn run_server() -> anyhow::Result<()> {
    info!("starting Herald backend");

    let (config, services) = initialise().await?;

    let state = AppState::with_outbound_buffer(
        services.authenticator.clone(),
        services.delivery.clone(),
        services.registry.clone(),
        services.outbound_buffer,
    );
    let app = build_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(herald_backend_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

async fn seed_data() -> anyhow::Result<()> {
    info!("seeding database with demo data");

    let (_, services) = initialise().await?;
    let authenticator = &services.authenticator;

    let mut participants = Vec::with_capacity(SEED_USERS.len());
    println!("=== USERS ===");
    for (email, name) in SEED_USERS {
        let user = match authenticator
            .find_by_email(email)
            .await
            .with_context(|| format!("failed to look up {email}"))?
        {
            Some(user) => user,
            None => authenticator
                .register_with_password(email, SEED_PASSWORD, Some(name))
                .await
                .with_context(|| format!("failed to register {email}"))?,
        };
        let session = authenticator
            .issue_session(user.id)
            .await
            .with_context(|| format!("failed to issue session for {email}"))?;

        println!("{:<20} {:<26} token {}", email, user.public_id, session.token);
        participants.push(user.id);
    }

    let conversations = services.delivery.conversations();
    let group = conversations
        .create(Some("Demo group"), &participants)
        .await
        .context("failed to create demo group")?;
    let direct = conversations
        .create(None, &participants[..2])
        .await
        .context("failed to create demo direct conversation")?;

    println!("\n=== CONVERSATIONS ===");
    println!("group  {} (alice, bob, carol)", group.public_id);
    println!("direct {} (alice, bob)", direct.public_id);
    println!("\nPassword for every demo user: {SEED_PASSWORD}");
    println!("Run 'dump-messages' to inspect delivery ledgers");
    Ok(())
}

async fn dump_messages() -> anyhow::Result<()> {
    info!("dumping messages and delivery ledgers");

    let (_, services) = initialise().await?;
    let conversations = services
        .delivery
        .conversations()
        .list_all()
        .await
        .context("failed to list conversations")?;

    if conversations.is_empty() {
        println!("No conversations found in database");
        return Ok(());
    }

    for conversation in conversations {
        let messages = services
            .delivery
            .ledger()
            .list_by_conversation(conversation.id)
            .await
            .with_context(|| format!("failed to list messages of {}", conversation.public_id))?;

        println!(
            "=== CONVERSATION {} ({} participants, {} messages) ===",
            conversation.public_id,
            conversation.participants.len(),
            messages.len()
        );

        for message in messages {
            let sender = message
                .sender
                .display_name
                .as_deref()
                .unwrap_or(&message.sender.id);
            println!(
                "{:<26} {:<27} {:<12} {:<9} {}",
                message.public_id,
                message.created_at,
                sender,
                message.status,
                preview(message.text.as_deref(), message.has_image(), message.has_file())
            );
            for entry in &message.deliveries {
                println!(
                    "    -> {:<26} {:<9} {}",
                    entry.recipient_public_id,
                    entry.status,
                    entry.delivered_at.as_deref().unwrap_or("-")
                );
            }
        }
        println!();
    }

    Ok(())
}

fn preview(text: Option<&str>, has_image: bool, has_file: bool) -> String {
    let mut preview = match text {
        Some(text) if text.chars().count() > 40 => {
            format!("{}...", text.chars().take(37).collect::<String>())
        }
        Some(text) => text.to_string(),
        None => String::new(),
    };
    if has_image {
        preview.push_str(" [image]");
    }
    if has_file {
        preview.push_str(" [file]");
    }
    preview.trim_start().to_string()
}
