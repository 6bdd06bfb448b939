//! Command handlers.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use stakd_client::{
    ApiClient, ClientConfig, EntityApi, NoSession, StaticToken, TokenProvider,
    default_config_path,
};
use stakd_core::models::{Contact, Message, Notification, Task};
use stakd_core::{ListParams, Resource};
use stakd_sync::{EntitySync, PollingFeed, SyncClient, SyncConfig};

use crate::cli::{Cli, Command, ConfigAction, EntityAction, NotificationAction, WatchTarget};
use crate::cli::notification_filter;

// ============================================================================
// Setup
// ============================================================================

/// Resolved configuration: file, then environment, then flags.
pub fn resolve_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    if let Some(org) = &cli.org {
        config.org_id = Some(org.clone());
    }
    Ok(config)
}

fn api_client(cli: &Cli, config: &ClientConfig) -> Result<ApiClient> {
    let tokens: Arc<dyn TokenProvider> = match &cli.token {
        Some(token) => Arc::new(StaticToken::new(token.clone())),
        None => Arc::new(NoSession),
    };
    Ok(ApiClient::new(config, tokens)?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Dispatch
// ============================================================================

/// Runs the parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    match &cli.command {
        Command::Config { action } => config_command(*action, &config),
        Command::Contacts { action } => {
            entity_command::<Contact>(&api_client(&cli, &config)?, action).await
        }
        Command::Tasks { action } => {
            entity_command::<Task>(&api_client(&cli, &config)?, action).await
        }
        Command::Messages { action } => {
            entity_command::<Message>(&api_client(&cli, &config)?, action).await
        }
        Command::Notifications { action } => {
            notification_command(&api_client(&cli, &config)?, action).await
        }
        Command::Watch { entity, page } => {
            let Some(org) = config.org_id.clone() else {
                bail!("an organization is required to watch: pass --org or set STAKD_ORG");
            };
            let api = api_client(&cli, &config)?;
            let feed = Arc::new(PollingFeed::new(api.clone(), config.poll_interval()));
            let sync = SyncClient::new(api, feed, org, SyncConfig::from_client(&config));
            let params = page.to_params();
            match entity {
                WatchTarget::Contacts => watch(sync.contacts(), params).await,
                WatchTarget::Tasks => watch(sync.tasks(), params).await,
                WatchTarget::Messages => watch(sync.messages(), params).await,
                WatchTarget::Notifications => watch(sync.notifications(), params).await,
            }
        }
    }
}

fn config_command(action: ConfigAction, config: &ClientConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", config.to_toml_string()?);
        }
        ConfigAction::Path => match default_config_path() {
            Some(path) => {
                println!("{}", path.display());
                if !path.exists() {
                    eprintln!("(file does not exist; defaults are in use)");
                }
            }
            None => bail!("could not determine a config directory for this platform"),
        },
    }
    Ok(())
}

async fn entity_command<R>(api: &ApiClient, action: &EntityAction) -> Result<()>
where
    R: Resource + Serialize,
{
    let entity = EntityApi::<R>::new(api.clone());
    match action {
        EntityAction::List(args) => {
            let page = entity
                .list(&args.to_params())
                .await
                .into_result()
                .map_err(stakd_core::Error::from)?;
            print_json(&page)
        }
        EntityAction::Get { id } => {
            let record = entity
                .get(id)
                .await
                .into_result()
                .map_err(stakd_core::Error::from)?;
            print_json(&record)
        }
    }
}

async fn notification_command(api: &ApiClient, action: &NotificationAction) -> Result<()> {
    let notifications = EntityApi::<Notification>::new(api.clone());
    match action {
        NotificationAction::Count => {
            let unread = notifications
                .unread_count()
                .await
                .into_result()
                .map_err(stakd_core::Error::from)?;
            println!("{}", unread.count);
            Ok(())
        }
        NotificationAction::List { unread, page } => {
            let filter = notification_filter(*unread, page);
            let page = notifications
                .list_filtered(&filter)
                .await
                .into_result()
                .map_err(stakd_core::Error::from)?;
            print_json(&page)
        }
    }
}

/// Mounts a list view and prints it whenever a new result lands.
async fn watch<R>(entity: EntitySync<R>, params: ListParams) -> Result<()>
where
    R: Resource + Serialize,
{
    let mut view = entity.list(params).await?;
    if let Some(state) = view.subscription_state() {
        tracing::info!(entity = %R::KIND, %state, "watching");
    }

    let mut printed = None;
    loop {
        let snap = view.snapshot();
        if snap.updated_at != printed
            && let Some(page) = &snap.data
        {
            print_json(page.as_ref())?;
            printed = snap.updated_at;
        }
        if let Some(err) = &snap.error {
            tracing::warn!(code = %err.code, message = %err.message, "refresh failed");
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                return Ok(());
            }
            () = view.changed() => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_url = \"http://from-file/api\"\ndebounce_ms = 75\n").unwrap();

        let cli = Cli::try_parse_from([
            "stakd",
            "--config",
            path.to_str().unwrap(),
            "--api-url",
            "http://from-flag/api",
            "--org",
            "org-7",
            "config",
            "show",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.api_url, "http://from-flag/api");
        assert_eq!(config.org_id.as_deref(), Some("org-7"));
        assert_eq!(config.debounce_ms, 75);
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let cli = Cli::try_parse_from(["stakd", "--config", "/nonexistent/stakd.toml", "config", "path"])
            .unwrap();
        assert!(resolve_config(&cli).is_err());
    }
}
