//! Key Vault sync task parameters

use crate::tasks::TaskParameters;
use serde::{Deserialize, Serialize};
use url::Url;

/// Parameters of a `keyvault-sync` task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyvaultSyncParameters {
    /// Vault URI, e.g. `https://team.vault.azure.net`
    #[serde(default, alias = "keyvaultUri")]
    pub uri: String,

    /// Sub-namespace for the secrets; defaults to the vault host label
    #[serde(default)]
    pub partition: Option<String>,

    /// Overrides `AZURE_TENANT_ID`
    #[serde(default)]
    pub tenant_id: Option<String>,

    /// Overrides `AZURE_CLIENT_ID`
    #[serde(default)]
    pub client_id: Option<String>,

    /// Overrides `AZURE_CLIENT_SECRET`
    #[serde(default)]
    pub client_secret: Option<String>,
}

crate::expand_fields!(KeyvaultSyncParameters {
    uri,
    partition,
    tenant_id,
    client_id,
    client_secret
});

impl KeyvaultSyncParameters {
    /// Partition the secrets are stored under
    #[must_use]
    pub fn effective_partition(&self) -> String {
        if let Some(partition) = self.partition.as_deref().filter(|p| !p.trim().is_empty()) {
            return partition.trim().to_lowercase();
        }
        partition_for_uri(&self.uri)
    }
}

/// Host label of a vault URI, lower-cased
#[must_use]
pub fn partition_for_uri(uri: &str) -> String {
    Url::parse(uri)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .and_then(|host| host.split('.').next().map(str::to_lowercase))
        .unwrap_or_default()
}

impl TaskParameters for KeyvaultSyncParameters {
    fn validate(&self) -> bool {
        Url::parse(&self.uri).is_ok_and(|u| u.scheme() == "https") && !self.effective_partition().is_empty()
    }

    fn invalid_reason(&self) -> String {
        format!("'{}' is not a Key Vault https URI", self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partition_from_host() {
        let p = KeyvaultSyncParameters {
            uri: "https://Team-Secrets.vault.azure.net/".to_string(),
            ..KeyvaultSyncParameters::default()
        };
        assert!(p.validate());
        assert_eq!(p.effective_partition(), "team-secrets");
    }

    #[test]
    fn test_explicit_partition() {
        let p = KeyvaultSyncParameters {
            uri: "https://team.vault.azure.net".to_string(),
            partition: Some("Shared".to_string()),
            ..KeyvaultSyncParameters::default()
        };
        assert_eq!(p.effective_partition(), "shared");
    }

    #[test]
    fn test_plain_http_is_invalid() {
        let p = KeyvaultSyncParameters {
            uri: "http://team.vault.azure.net".to_string(),
            ..KeyvaultSyncParameters::default()
        };
        assert!(!p.validate());
    }
}
