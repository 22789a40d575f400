//! Subcommand implementations.

use clap::Subcommand;
use serde::Serialize;
use serde_json::Value;
use tokenstash_core::entities::AccountInfo;
use tokenstash_core::CacheManager;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List cached accounts with their cache keys.
    Accounts,
    /// List indexed id, access and refresh token keys.
    Tokens,
    /// Show the active account.
    Active,
    /// Remove one account and every credential issued to it.
    RemoveAccount {
        /// Account cache key, as printed by `accounts`.
        key: String,
    },
    /// Remove everything this client stored.
    Clear,
}

#[derive(Debug, Serialize)]
struct ListedAccount {
    key: String,
    #[serde(flatten)]
    account: AccountInfo,
}

#[derive(Debug, Serialize)]
struct Removed {
    removed: String,
}

#[derive(Debug, Serialize)]
struct Cleared {
    client_id: String,
    cleared: bool,
}

/// Run `command`, then flush both durable scopes. Reads queue index repairs,
/// so even listing commands can leave writes behind.
pub async fn run(manager: &CacheManager, command: Command) -> anyhow::Result<Value> {
    let output = match command {
        Command::Accounts => {
            let accounts: Vec<ListedAccount> = manager
                .get_account_keys()
                .into_iter()
                .filter_map(|key| {
                    let account = manager.get_account(&key)?.account_info();
                    Some(ListedAccount { key, account })
                })
                .collect();
            serde_json::to_value(accounts)?
        }
        Command::Tokens => serde_json::to_value(manager.get_token_keys())?,
        Command::Active => serde_json::to_value(manager.get_active_account())?,
        Command::RemoveAccount { key } => {
            manager.remove_account(&key)?;
            serde_json::to_value(Removed { removed: key })?
        }
        Command::Clear => {
            manager.clear().await?;
            serde_json::to_value(Cleared { client_id: manager.client_id().to_string(), cleared: true })?
        }
    };
    manager.backends().persistent.flush().await?;
    manager.backends().temporary.flush().await?;
    Ok(output)
}
