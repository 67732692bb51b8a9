//! Subcommand handlers

use crate::{Args, Command, ConfigAction, ConfigSetArgs, PolicyArgs};
use fileshare_core::{is_remote_uri, FileUri, FilePermissionManager, ShareBroker, UriResolver};
use fileshare_foundation::{
    ConfigScope, Error, GrantStore, JsonStore, PolicyInfo, ShareConfig, TemporaryGrants,
};
use std::sync::Arc;
use tracing::{debug, warn};

impl PolicyArgs {
    fn policies(&self) -> Vec<PolicyInfo> {
        self.uris
            .iter()
            .map(|uri| PolicyInfo::new(uri.clone(), self.mode))
            .collect()
    }
}

impl ConfigSetArgs {
    fn scope(&self) -> ConfigScope {
        if self.global {
            ConfigScope::Global
        } else {
            ConfigScope::Project
        }
    }

    /// Only the fields given on the command line are set
    fn to_config(&self, app: Option<String>) -> ShareConfig {
        let mut update = ShareConfig::new();
        update.app_id = app;
        update.device_type = self.device_type.clone();
        update.sandbox_root = self.sandbox_root.clone();
        update.data_dir = self.data_dir.clone();
        update.user_name = self.user_name.clone();
        update.granted_permissions = self.permissions.iter().cloned().collect();
        update
    }
}

/// Manager plus the store it owns, closed explicitly when the command ends
struct Session {
    manager: FilePermissionManager,
    store: Arc<GrantStore>,
}

impl Session {
    fn open(config: &ShareConfig) -> anyhow::Result<Self> {
        let store = Arc::new(GrantStore::open(config.data_dir()?)?);
        let manager = FilePermissionManager::from_config(
            config,
            Arc::clone(&store),
            Arc::new(TemporaryGrants::new()),
        );
        Ok(Self { manager, store })
    }

    fn close(self) -> anyhow::Result<()> {
        let Session { manager, store } = self;
        drop(manager);

        match Arc::try_unwrap(store) {
            Ok(store) => store.close()?,
            Err(_) => warn!("grant store still in use; left to drop"),
        }
        Ok(())
    }
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    if let Command::Config { action } = &args.command {
        return run_config(action, args.app.clone());
    }

    let mut config = ShareConfig::load()?;
    if let Some(app) = args.app {
        config.app_id = Some(app);
    }
    debug!(app = %config.app_id(), device = %config.device_class(), "loaded config");

    match args.command {
        Command::Resolve { uri } => {
            let resolver = UriResolver::from_config(&config);
            println!("{}", resolver.resolve(&uri)?.display());
        }
        Command::Uri { path } => {
            println!("{}", FileUri::from_path(&path, config.app_id())?);
        }
        Command::IsRemote { uri } => {
            println!("{}", is_remote_uri(&uri));
        }
        Command::Share(share) => {
            let broker = ShareBroker::new(UriResolver::from_config(&config));
            let entries = broker.create_share_file(&share.target, &share.uris, share.mode.into())?;
            for entry in &entries {
                println!("{}", entry.display());
            }
            println!("Shared {} uri(s) with {}", share.uris.len(), share.target);
        }
        Command::Unshare { target, uris } => {
            let broker = ShareBroker::new(UriResolver::from_config(&config));
            broker.delete_share_file(&target, &uris)?;
            println!("Removed share entries of {} uri(s) for {}", uris.len(), target);
        }
        command => {
            let session = Session::open(&config)?;
            let outcome = run_permission(&session.manager, &config, command).await;
            session.close()?;
            outcome?;
        }
    }

    Ok(())
}

async fn run_permission(
    manager: &FilePermissionManager,
    config: &ShareConfig,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Persist(policy) => {
            manager.persist_permission(policy.policies())?.await?;
            println!("Persisted {} permission(s)", policy.uris.len());
        }
        Command::Revoke(policy) => {
            manager.revoke_permission(policy.policies())?.await?;
            println!("Revoked {} permission(s)", policy.uris.len());
        }
        Command::Activate(policy) => {
            manager.activate_permission(policy.policies())?.await?;
            println!("Activated {} permission(s)", policy.uris.len());
        }
        Command::Deactivate(policy) => {
            manager.deactivate_permission(policy.policies())?.await?;
            println!("Deactivated {} permission(s)", policy.uris.len());
        }
        Command::Check(policy) => {
            let results = manager
                .check_persistent_permission(policy.policies())?
                .await?;
            for (uri, granted) in policy.uris.iter().zip(results) {
                println!("{:<6} {}", granted, uri);
            }
        }
        Command::List { json } => {
            let grants = manager.list_grants()?.await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&grants)?);
                return Ok(());
            }
            if grants.is_empty() {
                println!("No persisted permissions for {}.", config.app_id());
                return Ok(());
            }

            println!("{:<6} {:<8} {:<26} {}", "Mode", "Active", "Updated", "Path");
            println!("{}", "-".repeat(80));
            for grant in grants {
                let updated = if grant.updated_at.len() > 25 {
                    &grant.updated_at[..25]
                } else {
                    &grant.updated_at
                };
                println!(
                    "{:<6} {:<8} {:<26} {}",
                    grant.mode, grant.active, updated, grant.path
                );
            }
        }
        other => anyhow::bail!("not a permission command: {:?}", other),
    }

    Ok(())
}

fn run_config(action: &ConfigAction, app: Option<String>) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let mut config = ShareConfig::load()?;
            if app.is_some() {
                config.app_id = app;
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Set(set) => {
            let store = JsonStore::for_scope(set.scope())?;
            let path = update_config(&store, set.to_config(app))?;
            println!("Saved {}", path.display());
        }
    }
    Ok(())
}

/// Merge `update` over the file in `store` and write it back
fn update_config(store: &JsonStore, update: ShareConfig) -> anyhow::Result<std::path::PathBuf> {
    let mut config = ShareConfig::load_from(store)?;
    config.merge(update);
    Ok(config.save_to(store)?)
}

/// Print an error with its numeric code and any per-policy failures
pub fn report(err: &anyhow::Error) {
    match err.downcast_ref::<Error>() {
        Some(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            for result in e.policy_results() {
                eprintln!("  [{}] {} - {}", result.code.code(), result.uri, result.message);
            }
        }
        None => eprintln!("Error: {:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};
    use fileshare_foundation::{acl, OperationMode};

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_policy_args() {
        let args = Args::try_parse_from([
            "fileshare",
            "--app",
            "com.example.a",
            "check",
            "file://com.example.a/a.txt",
            "file://com.example.a/b.txt",
            "--mode",
            "write",
        ])
        .expect("Failed to parse");

        assert_eq!(args.app.as_deref(), Some("com.example.a"));
        match args.command {
            Command::Check(policy) => {
                let policies = policy.policies();
                assert_eq!(policies.len(), 2);
                assert!(policies
                    .iter()
                    .all(|p| p.operation_mode == OperationMode::Write));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_persist_requires_uri() {
        assert!(Args::try_parse_from(["fileshare", "persist"]).is_err());
        assert!(Args::try_parse_from(["fileshare", "share", "--target", "com.b"]).is_err());
    }

    #[test]
    fn test_config_set_merges_into_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = JsonStore::project(dir.path());

        let args = Args::try_parse_from([
            "fileshare",
            "config",
            "set",
            "--device-type",
            "tablet",
            "--permission",
            acl::FILE_ACCESS_MANAGER,
        ])
        .expect("Failed to parse");
        let set = match args.command {
            Command::Config {
                action: ConfigAction::Set(set),
            } => set,
            other => panic!("unexpected command: {:?}", other),
        };
        assert_eq!(set.scope(), ConfigScope::Project);
        update_config(&store, set.to_config(None)).expect("Failed to save");

        let data_dir = dir.path().join("data");
        let update = ShareConfig::new()
            .with_app_id("com.example.a")
            .with_data_dir(&data_dir);
        update_config(&store, update).expect("Failed to save");

        let saved = ShareConfig::load_from(&store).expect("Failed to load");
        assert_eq!(saved.app_id(), "com.example.a");
        assert_eq!(saved.device_type.as_deref(), Some("tablet"));
        assert_eq!(saved.data_dir().expect("data dir"), data_dir);
        assert!(saved.identity().holds(acl::FILE_ACCESS_MANAGER));
    }

    #[tokio::test]
    async fn test_session_closes_store() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = ShareConfig::new()
            .with_app_id("com.example.a")
            .with_data_dir(dir.path());

        let session = Session::open(&config).expect("Failed to open session");
        let grants = session
            .manager
            .list_grants()
            .expect("precheck")
            .await
            .expect("Failed to list");
        assert!(grants.is_empty());
        session.close().expect("Failed to close session");

        let reopened = GrantStore::open(dir.path()).expect("Failed to reopen store");
        reopened.close().expect("Failed to close store");
    }
}
