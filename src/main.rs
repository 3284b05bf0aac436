use anyhow::{Context, Result};
use groupdesk::{
    api::{ApiClient, GroupMeClient},
    auth::{
        self, ImplicitGrantFlow, SessionMonitor, SessionStatus, SessionValidator, TerminalSurface,
        TokenManager,
    },
    config::{Config, CredentialBackend},
    ClientError, RefreshCoordinator, RefreshOutcome, ViewState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const HELP: &str = "Commands: groups | select <n> | refresh | send <text> | help | quit";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let ephemeral = args.iter().any(|a| a == "--ephemeral");
    let no_browser = args.iter().any(|a| a == "--no-browser");

    let mut config = Config::load()?;
    if ephemeral {
        config.credentials.backend = CredentialBackend::Memory;
    }

    // Logs go to stderr so they don't interleave with the prompt output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.logging.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    info!("GroupDesk v{}", groupdesk::VERSION);
    info!(
        api = %config.api.base_url,
        backend = ?config.credentials.backend,
        "Configuration loaded"
    );

    let api: Arc<dyn ApiClient> =
        Arc::new(GroupMeClient::from_config(&config).context("Failed to build API client")?);
    let store = auth::credential_store(&config)?;
    let validator = SessionValidator::new(Arc::clone(&api), config.timeouts.probe());
    let manager = TokenManager::new(store, validator.clone());

    let mut flow = ImplicitGrantFlow::from_config(&config.auth)?;
    let mut surface = TerminalSurface::new(BufReader::new(tokio::io::stdin()));
    if no_browser {
        surface = surface.without_browser();
    }

    let session = match manager.establish_session(&mut flow, &mut surface).await {
        Ok(session) => session,
        Err(ClientError::AuthCancelled) => {
            eprintln!("Login cancelled");
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to establish session"),
    };

    let monitor = config
        .session
        .revalidate_interval_secs
        .map(|secs| SessionMonitor::spawn(session.clone(), validator, Duration::from_secs(secs)));

    let coordinator = RefreshCoordinator::new(api, session, config.timeouts.fetch());
    match coordinator.run(None).await {
        Ok(_) => print_roster(&coordinator.snapshot().await),
        Err(e) => eprintln!("❌ Could not load groups: {}", e),
    }
    println!("{}", HELP);

    let mut lines = surface.into_inner().lines();
    while let Some(line) = lines.next_line().await? {
        if monitor.as_ref().map(SessionMonitor::status) == Some(SessionStatus::Expired) {
            println!("⚠️  Session expired; restart groupdesk to log in again");
        }

        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        match command {
            "" => {}
            "groups" => print_roster(&coordinator.snapshot().await),
            "select" => {
                let views = coordinator.snapshot().await;
                let group = rest
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| views.roster.groups.get(i))
                    .cloned();

                match group {
                    Some(group) => spawn_refresh(&coordinator, coordinator.run(Some(group))),
                    None => println!("No such group: {}", rest.trim()),
                }
            }
            "refresh" => spawn_refresh(&coordinator, coordinator.refresh_current()),
            "send" => match coordinator.send(rest).await {
                Ok(true) => println!("✓ sent"),
                Ok(false) => println!("Message not sent"),
                Err(e) => println!("❌ {}", e),
            },
            "help" => println!("{}", HELP),
            "quit" | "exit" => break,
            other => println!("Unknown command: {}\n{}", other, HELP),
        }
    }

    if let Some(monitor) = monitor {
        monitor.stop().await;
    }

    Ok(())
}

/// Let the refresh finish in the background; only the latest selection prints
fn spawn_refresh<F>(coordinator: &RefreshCoordinator, refresh: F)
where
    F: std::future::Future<Output = Result<RefreshOutcome, ClientError>> + Send + 'static,
{
    let coordinator = coordinator.clone();
    tokio::spawn(async move {
        match refresh.await {
            Ok(RefreshOutcome::Applied) => print_group(&coordinator.snapshot().await),
            Ok(RefreshOutcome::Superseded) => {}
            Err(e) => println!("❌ Refresh failed: {}", e),
        }
    });
}

fn print_roster(views: &ViewState) {
    println!("\nGroups");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (i, group) in views.roster.groups.iter().enumerate() {
        println!("{:>3}. {}", i + 1, group.name);
    }
    if let Some(error) = &views.roster.error {
        println!("⚠️  {}", error);
    }
    println!();
}

fn print_group(views: &ViewState) {
    if let Some(group) = &views.detail.group {
        println!("\n{}", group.name);
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        let members: Vec<&str> = group.members.iter().map(|m| m.nickname.as_str()).collect();
        println!("Members: {}\n", members.join(", "));
    }

    for message in &views.messages.messages {
        let likes = if message.like_count > 0 {
            format!("  ♥ {}", message.like_count)
        } else {
            String::new()
        };
        println!("{}: {}{}", message.sender_name, message.content.display_text(), likes);
    }
    println!();
}
