//! # Teller Server
//!
//! Banking backend entry point. Without a subcommand the HTTP API is
//! served; `db` and `user` subcommands cover operator tasks.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, bail};
use clap::{Args as ClapArgs, Parser, Subcommand};
use teller_config::{Config, ConfigLoad, ConfigLoader};
use teller_core::auth::infrastructure::PostgresCredentialStore;
use teller_core::auth::{
    AuthenticationService, CredentialStore, LockoutPolicy, TokenSigner,
};
use teller_server::infra::startup::{
    build_app_state, build_crypto, connect_attempt_cache, connect_database,
    front_with_cache, run_migrations,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "teller-server")]
#[command(about = "PIN-authenticated banking API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Path to a teller.toml configuration file
    #[arg(long, env = "TELLER_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Db(DbCommand),
    #[command(subcommand)]
    User(UserCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply database migrations and exit
    Migrate,
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    /// Create a user with a PIN credential
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        display_name: Option<String>,
        /// PIN to set; prefer the environment over shell history
        #[arg(long, env = "TELLER_NEW_PIN", hide_env_values = true)]
        pin: String,
    },
    /// Clear failed attempts and any active lock
    Unlock {
        #[arg(long)]
        username: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_runtime_config(&cli.serve)?;

    match cli.command {
        Some(Command::Db(DbCommand::Migrate)) => run_db_migrate(&config).await,
        Some(Command::User(command)) => run_user_command(&config, command).await,
        None => run_server(config).await,
    }
}

fn load_runtime_config(args: &ServeArgs) -> anyhow::Result<Arc<Config>> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }

    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }

    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    Ok(Arc::new(config))
}

async fn run_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = connect_database(config).await?;
    run_migrations(&pool).await
}

async fn run_user_command(
    config: &Config,
    command: UserCommand,
) -> anyhow::Result<()> {
    let pool = connect_database(config).await?;
    let store = Arc::new(PostgresCredentialStore::new(pool));
    let crypto = build_crypto(config)?;

    match command {
        UserCommand::Add {
            username,
            display_name,
            pin,
        } => {
            let username = username.trim();
            if username.is_empty() || pin.is_empty() {
                bail!("username and PIN must not be empty");
            }
            let pin_hash = crypto.hash_pin(&pin)?;
            let display_name = display_name.as_deref().unwrap_or(username);
            let user_id =
                store.create_user(username, display_name, &pin_hash).await?;
            info!(%user_id, username, "user created");
        }
        UserCommand::Unlock { username } => {
            // The server's cache entry is rewritten along with the store.
            let cache = connect_attempt_cache(config).await?;
            let credentials = front_with_cache(store, cache, config);
            let Some(record) = credentials.find_by_username(&username).await?
            else {
                bail!("no user named {username}");
            };
            let service = AuthenticationService::new(
                credentials,
                Arc::new(TokenSigner::from_config(&config.auth)?),
                crypto,
                LockoutPolicy::from(&config.lockout),
            );
            service.unlock(record.user_id).await?;
            info!(user_id = %record.user_id, %username, "user unlocked");
        }
    }
    Ok(())
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    let addr: SocketAddr =
        format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .context("invalid server address")?;

    let state = build_app_state(config).await?;
    let app = teller_server::create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "teller server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("teller server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
