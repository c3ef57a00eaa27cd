//! Key Vault sync worker
//!
//! Pulls every enabled secret of a vault and stores it in the `keyvault`
//! vault of the resolver under the vault's partition, so later tasks can
//! reference `${{ keyvault.<partition>.<secret> }}`.

use crate::executor::{TaskWorker, WorkerContext};
use crate::infrastructure::AzureError;
use crate::pipeline::{Task, TaskKind, WorkerResult, codes};
use crate::tasks::KeyvaultSyncParameters;
use crate::vault::{KEYVAULT_VAULT, flatten};

/// Syncs Key Vault secrets into the resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyvaultSyncWorker;

fn failure(err: &AzureError) -> WorkerResult {
    let code = match err {
        AzureError::MissingCredential(_) => codes::INVALID_PARAMETERS,
        AzureError::Transport(_) => codes::CONNECTION_FAILED,
        _ => codes::EXECUTION_FAILED,
    };
    WorkerResult::errored(code, err.to_string())
}

impl TaskWorker for KeyvaultSyncWorker {
    type Params = KeyvaultSyncParameters;

    fn kind(&self) -> TaskKind {
        TaskKind::KeyvaultSync
    }

    fn execute(&self, params: &KeyvaultSyncParameters, task: &Task, ctx: &WorkerContext) -> WorkerResult {
        let partition = params.effective_partition();
        let secrets = match ctx
            .secrets
            .create(params)
            .and_then(|provider| provider.list_secrets())
        {
            Ok(secrets) => secrets,
            Err(e) => {
                tracing::warn!(task = %task, uri = %params.uri, error = %e, "Key Vault sync failed");
                return failure(&e);
            }
        };

        let entries = flatten(&secrets);
        for (key, value) in &entries {
            ctx.resolver
                .add(KEYVAULT_VAULT, &format!("{partition}.{key}"), value.clone());
        }
        ctx.notifier.success(format!(
            "Synced {} secrets from {} into {KEYVAULT_VAULT}.{partition}",
            entries.len(),
            params.uri
        ));
        WorkerResult::executed(format!("{} secrets", entries.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Worker;
    use crate::infrastructure::{SecretProvider, SecretProviderFactory};
    use crate::pipeline::ResultState;
    use crate::workers::testing;
    use pretty_assertions::assert_eq;
    use serde_json::{Map, Value, json};
    use std::sync::Arc;

    struct Fixed(Result<Map<String, Value>, AzureError>);

    impl SecretProvider for Fixed {
        fn list_secrets(&self) -> Result<Map<String, Value>, AzureError> {
            self.0.clone()
        }
    }

    struct FixedFactory(Result<Map<String, Value>, AzureError>);

    impl SecretProviderFactory for FixedFactory {
        fn create(
            &self,
            _params: &KeyvaultSyncParameters,
        ) -> Result<Box<dyn SecretProvider>, AzureError> {
            Ok(Box::new(Fixed(self.0.clone())))
        }
    }

    fn task() -> Task {
        Task::new("secrets", TaskKind::KeyvaultSync)
            .with_input("uri", "https://team-dev.vault.azure.net")
    }

    #[test]
    fn test_secrets_land_in_partition() {
        let secrets = json!({ "DbPassword": "pw", "api-key": "k" });
        let ctx = testing::context().with_secrets(Arc::new(FixedFactory(Ok(secrets
            .as_object()
            .unwrap()
            .clone()))));
        let result = KeyvaultSyncWorker.run(&task(), &ctx);
        assert_eq!(result.state, ResultState::Executed);
        assert_eq!(
            ctx.resolver.replace("${{ keyvault.team-dev.dbpassword }}").unwrap(),
            "pw"
        );
        assert_eq!(
            ctx.resolver.get(KEYVAULT_VAULT, "team-dev.api-key"),
            Some("k".to_string())
        );
    }

    #[test]
    fn test_explicit_partition() {
        let secrets = json!({ "token": "t" });
        let ctx = testing::context().with_secrets(Arc::new(FixedFactory(Ok(secrets
            .as_object()
            .unwrap()
            .clone()))));
        let task = task().with_input("partition", "Shared");
        KeyvaultSyncWorker.run(&task, &ctx);
        assert_eq!(ctx.resolver.get(KEYVAULT_VAULT, "shared.token"), Some("t".to_string()));
    }

    #[test]
    fn test_provider_errors_map_to_codes() {
        let ctx = testing::context().with_secrets(Arc::new(FixedFactory(Err(
            AzureError::Transport("timeout".to_string()),
        ))));
        let result = KeyvaultSyncWorker.run(&task(), &ctx);
        assert_eq!(result.error_code, codes::CONNECTION_FAILED);
    }

    #[test]
    fn test_plain_http_uri_is_rejected() {
        let ctx = testing::context();
        let task = Task::new("s", TaskKind::KeyvaultSync).with_input("uri", "http://vault");
        assert_eq!(
            KeyvaultSyncWorker.run(&task, &ctx).error_code,
            codes::INVALID_PARAMETERS
        );
    }
}
