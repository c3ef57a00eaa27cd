//! `locally keyvault` - Azure Key Vault secrets

use anyhow::Result;
use clap::Subcommand;
use locally::infrastructure::KeyvaultRef;
use locally::pipeline::{Task, TaskKind};
use locally::vault::KEYVAULT_VAULT;
use std::process::ExitCode;

use super::app::App;

/// Key Vault operations
#[derive(Subcommand, Debug)]
pub enum KeyvaultAction {
    /// Pull secrets into the `keyvault` vault
    Sync {
        /// Vault URI; every Key Vault of the current context when omitted
        uri: Option<String>,
        /// Partition the secrets are stored under
        #[arg(long)]
        partition: Option<String>,
    },
}

/// Builds the sync task for one vault
#[must_use]
pub fn sync_task(vault: &KeyvaultRef) -> Task {
    let mut task = Task::new(vault.uri.clone(), TaskKind::KeyvaultSync).with_input("uri", vault.uri.as_str());
    if let Some(partition) = &vault.partition {
        task = task.with_input("partition", partition.as_str());
    }
    task
}

/// Executes a `keyvault` subcommand
pub fn run(app: &App, action: KeyvaultAction) -> Result<ExitCode> {
    let KeyvaultAction::Sync { uri, partition } = action;
    let context = app.context().ok();

    let vaults = match uri {
        Some(uri) => vec![KeyvaultRef { uri, partition }],
        None => match &context {
            Some(context) if !context.keyvaults.is_empty() => context.keyvaults.clone(),
            _ => anyhow::bail!("Pass a vault URI or declare keyvaults in the current context"),
        },
    };

    let ctx = app.worker_context(context)?;
    for vault in &vaults {
        if !app.run_task(&sync_task(vault), &ctx) {
            return Ok(ExitCode::FAILURE);
        }
    }
    for (key, _) in ctx.resolver.entries(KEYVAULT_VAULT) {
        println!("{KEYVAULT_VAULT}.{key}");
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use locally::tasks::{KeyvaultSyncParameters, TaskParameters, decode};
    use locally::vault::VariableResolver;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sync_task() {
        let task = sync_task(&KeyvaultRef {
            uri: "https://team.vault.azure.net".to_string(),
            partition: Some("shared".to_string()),
        });
        let params: KeyvaultSyncParameters = decode(&task, &VariableResolver::new()).unwrap();
        assert_eq!(params.effective_partition(), "shared");
        assert!(params.validate());
    }
}
