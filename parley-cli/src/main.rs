#![warn(clippy::all)]
#![allow(clippy::pedantic)]

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use parley_client::{
    provider_from_config, spawn_identity_sync, AuthSession, BackendClient, ConversationStore,
};
use parley_common::config::AuthProviderKind;
use parley_common::logging::init_logging_with_exclusions;
use parley_common::{Config, Validate};
use tracing::info;

mod render;
mod repl;

/// `parley` - chat with your assistant from the terminal.
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version)]
#[command(about = "Terminal client for the Parley chat backend.", long_about = None)]
struct Cli {
    /// Password for email sign-in (prompted for when unset)
    #[arg(long, global = true, env = "PARLEY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start an interactive chat
    Chat {
        /// Continue an existing conversation
        #[arg(short, long)]
        conversation: Option<String>,
    },

    /// List your conversations
    Conversations,

    /// Print the messages of a conversation
    Show {
        /// Conversation id
        id: String,
    },

    /// Delete a conversation
    Delete {
        /// Conversation id
        id: String,
    },

    /// Check that the backend is reachable
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Pinging needs no credentials, so only the backend section must be valid.
    let config = if matches!(cli.command, Commands::Ping) {
        let config = Config::load_with_env()?;
        config
            .backend
            .validate()
            .context("Invalid backend configuration")?;
        config
    } else {
        Config::load_and_validate()?
    };
    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    match cli.command {
        Commands::Ping => ping(&config).await,
        Commands::Chat { conversation } => {
            let (store, auth) = connect(&config, cli.password).await?;
            let sync = spawn_identity_sync(store.clone(), auth.clone());
            let result = repl::run(store, conversation).await;
            auth.sign_out().await;
            sync.stop().await;
            result
        }
        Commands::Conversations => {
            let (store, _auth) = connect(&config, cli.password).await?;
            store.load_conversations().await?;
            for row in render::format_conversation_list(&store.state()) {
                println!("{row}");
            }
            Ok(())
        }
        Commands::Show { id } => {
            let (store, _auth) = connect(&config, cli.password).await?;
            store.load_conversation(&id).await?;
            let state = store.state();
            if state.active_conversation_id.as_deref() != Some(id.as_str()) {
                bail!("Could not load conversation {id}");
            }
            for message in &state.messages {
                println!("{}", render::format_message(message));
            }
            Ok(())
        }
        Commands::Delete { id } => {
            let (store, _auth) = connect(&config, cli.password).await?;
            store.load_conversations().await?;
            if !store.state().conversations.iter().any(|c| c.id == id) {
                bail!("No conversation with id {id}");
            }
            store.delete_conversation(&id).await?;
            if store.state().conversations.iter().any(|c| c.id == id) {
                bail!("Failed to delete conversation {id}");
            }
            println!("Deleted conversation {id}");
            Ok(())
        }
    }
}

/// Sign in and build the store.
async fn connect(
    config: &Config,
    password: Option<String>,
) -> Result<(ConversationStore, Arc<AuthSession>)> {
    let password = match config.auth.provider {
        AuthProviderKind::SecureToken => Some(resolve_password(config, password)?),
        AuthProviderKind::Static => None,
    };

    let provider = provider_from_config(&config.auth, password)
        .context("Failed to set up identity provider")?;
    let auth = Arc::new(AuthSession::new(provider, &config.auth));
    let backend = BackendClient::new(&config.backend).context("Failed to create backend client")?;
    let store = ConversationStore::new(auth.clone(), Arc::new(backend));

    let identity = auth.sign_in().await.context("Sign-in failed")?;
    info!(
        user_id = %identity.user_id,
        backend = %config.backend.base_url,
        "Connected"
    );

    Ok((store, auth))
}

fn resolve_password(config: &Config, password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    let Some(email) = config.auth.email.as_deref() else {
        bail!("auth.email is required for secure-token sign-in (or set PARLEY_EMAIL)");
    };
    rpassword::prompt_password(format!("Password for {email}: "))
        .context("Failed to read password")
}

async fn ping(config: &Config) -> Result<()> {
    let backend = BackendClient::new(&config.backend).context("Failed to create backend client")?;
    let banner = backend
        .health()
        .await
        .with_context(|| format!("Backend at {} is not reachable", config.backend.base_url))?;
    println!("{}: {banner}", config.backend.base_url);
    Ok(())
}
