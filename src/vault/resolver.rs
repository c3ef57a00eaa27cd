//! Variable resolver
//!
//! Holds the latest snapshot of every vault as lower-cased dotted keys and
//! substitutes placeholders. Unknown vaults and keys are left verbatim so a
//! caller may retry after another vault has been synced. Resolved values are
//! expanded again, bounded by an expansion budget and a cycle check on the
//! `(vault, key)` pairs of the current path.

use crate::vault::placeholder;
use crate::vault::{ResolverError, Vault, flatten};
use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Maximum substitutions performed by a single [`VariableResolver::replace`]
pub const DEFAULT_EXPANSION_BUDGET: u32 = 32;

type Snapshot = AHashMap<String, AHashMap<String, String>>;

/// Resolves `${{ vault.key }}` placeholders against vault snapshots
pub struct VariableResolver {
    vaults: RwLock<Vec<Arc<dyn Vault>>>,
    snapshot: RwLock<Snapshot>,
    budget: u32,
}

impl std::fmt::Debug for VariableResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableResolver")
            .field("vaults", &self.vault_names())
            .field("budget", &self.budget)
            .finish()
    }
}

impl Default for VariableResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableResolver {
    /// Creates a resolver with no vaults
    #[must_use]
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_EXPANSION_BUDGET)
    }

    /// Creates a resolver with a custom expansion budget
    #[must_use]
    pub fn with_budget(budget: u32) -> Self {
        Self {
            vaults: RwLock::new(Vec::new()),
            snapshot: RwLock::new(AHashMap::new()),
            budget,
        }
    }

    /// Registers a vault and takes its first snapshot
    pub fn register(&self, vault: impl Vault + 'static) -> Result<(), ResolverError> {
        self.register_shared(Arc::new(vault))
    }

    /// Registers a shared vault and takes its first snapshot
    pub fn register_shared(&self, vault: Arc<dyn Vault>) -> Result<(), ResolverError> {
        self.vaults.write().push(Arc::clone(&vault));
        self.sync_vault(vault.as_ref())
    }

    /// Refreshes one vault by name
    pub fn sync(&self, name: &str) -> Result<(), ResolverError> {
        let matching: Vec<Arc<dyn Vault>> = self
            .vaults
            .read()
            .iter()
            .filter(|v| v.name().eq_ignore_ascii_case(name))
            .cloned()
            .collect();
        for vault in matching {
            self.sync_vault(vault.as_ref())?;
        }
        Ok(())
    }

    /// Refreshes every registered vault, stopping at the first failure
    pub fn sync_all(&self) -> Result<(), ResolverError> {
        let vaults: Vec<Arc<dyn Vault>> = self.vaults.read().clone();
        for vault in vaults {
            self.sync_vault(vault.as_ref())?;
        }
        Ok(())
    }

    fn sync_vault(&self, vault: &dyn Vault) -> Result<(), ResolverError> {
        let entries = vault.sync()?;
        let flat = flatten(&entries);
        let name = vault.name().to_lowercase();

        let mut snapshot = self.snapshot.write();
        let store = snapshot.entry(name.clone()).or_default();
        match vault.partition() {
            Some(partition) => {
                let prefix = format!("{}.", partition.to_lowercase());
                store.retain(|k, _| !k.starts_with(&prefix));
                store.extend(flat.into_iter().map(|(k, v)| (format!("{prefix}{k}"), v)));
            }
            None => {
                store.clear();
                store.extend(flat);
            }
        }
        tracing::debug!(vault = %name, entries = store.len(), "Vault synced");
        Ok(())
    }

    /// Injects a single value at runtime
    pub fn add(&self, vault: &str, key: &str, value: impl Into<String>) {
        self.snapshot
            .write()
            .entry(vault.to_lowercase())
            .or_default()
            .insert(key.to_lowercase(), value.into());
    }

    /// Looks up a raw value without expanding it
    #[must_use]
    pub fn get(&self, vault: &str, key: &str) -> Option<String> {
        self.snapshot
            .read()
            .get(&vault.to_lowercase())?
            .get(&key.to_lowercase())
            .cloned()
    }

    /// Whether a vault with this name has a snapshot
    #[must_use]
    pub fn has_vault(&self, vault: &str) -> bool {
        self.snapshot.read().contains_key(&vault.to_lowercase())
    }

    /// Names of all known vaults, sorted
    #[must_use]
    pub fn vault_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Entries of one vault, sorted by key
    #[must_use]
    pub fn entries(&self, vault: &str) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .snapshot
            .read()
            .get(&vault.to_lowercase())
            .map(|store| store.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        entries.sort();
        entries
    }

    /// Substitutes every resolvable placeholder in `input`
    pub fn replace(&self, input: &str) -> Result<String, ResolverError> {
        if !placeholder::has_placeholder(input) {
            return Ok(input.to_string());
        }
        let snapshot = self.snapshot.read();
        let mut remaining = self.budget;
        let mut path = Vec::new();
        self.expand(&snapshot, input, &mut path, &mut remaining)
    }

    fn expand(
        &self,
        snapshot: &Snapshot,
        input: &str,
        path: &mut Vec<(String, String)>,
        remaining: &mut u32,
    ) -> Result<String, ResolverError> {
        let mut out = String::with_capacity(input.len());
        let mut cursor = 0;

        for found in placeholder::scan_all(input) {
            out.push_str(&input[cursor..found.start]);
            cursor = found.end;

            let Some((vault, key, value)) = lookup(snapshot, &found) else {
                out.push_str(found.text(input));
                continue;
            };

            if path.iter().any(|(v, k)| *v == vault && *k == key) {
                return Err(ResolverError::Cycle { vault, key });
            }
            if *remaining == 0 {
                return Err(ResolverError::ExpansionBudget {
                    budget: self.budget,
                });
            }
            *remaining -= 1;

            path.push((vault, key));
            let expanded = self.expand(snapshot, value, path, remaining)?;
            path.pop();
            out.push_str(&expanded);
        }

        out.push_str(&input[cursor..]);
        Ok(out)
    }
}

fn lookup<'s>(
    snapshot: &'s Snapshot,
    found: &placeholder::Placeholder<'_>,
) -> Option<(String, String, &'s str)> {
    for (vault, key) in found.splits() {
        let vault = vault.to_lowercase();
        if let Some(store) = snapshot.get(&vault) {
            let key = key.to_lowercase();
            return store
                .get(&key)
                .map(|value| (vault, key, value.as_str()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::MemoryVault;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn env_resolver() -> VariableResolver {
        let resolver = VariableResolver::new();
        resolver
            .register(
                MemoryVault::new("env")
                    .with_value("a", "${{ env.b }}")
                    .with_value("b", "world"),
            )
            .unwrap();
        resolver
    }

    #[test]
    fn test_nested_expansion() {
        let resolver = env_resolver();
        assert_eq!(resolver.replace("hi ${{ env.a }}").unwrap(), "hi world");
    }

    #[test]
    fn test_missing_key_left_verbatim() {
        let resolver = env_resolver();
        assert_eq!(
            resolver.replace("x ${{ env.missing }} y").unwrap(),
            "x ${{ env.missing }} y"
        );
        assert_eq!(
            resolver.replace("${{ nowhere.key }}").unwrap(),
            "${{ nowhere.key }}"
        );
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let resolver = VariableResolver::new();
        resolver
            .register(MemoryVault::new("Config").with_value("DB", "postgres"))
            .unwrap();
        assert_eq!(resolver.replace("${{ config.Db }}").unwrap(), "postgres");
    }

    #[test]
    fn test_longest_vault_prefix_wins() {
        let resolver = VariableResolver::new();
        resolver
            .register(MemoryVault::new("con").with_value("fig.key", "short"))
            .unwrap();
        resolver
            .register(MemoryVault::new("con.fig").with_value("key", "long"))
            .unwrap();
        assert_eq!(resolver.replace("${{ con.fig.key }}").unwrap(), "long");
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let resolver = VariableResolver::new();
        resolver
            .register(MemoryVault::new("a").with_value("x", "${{ a.x }}"))
            .unwrap();
        assert_eq!(
            resolver.replace("${{ a.x }}"),
            Err(ResolverError::Cycle {
                vault: "a".to_string(),
                key: "x".to_string()
            })
        );
    }

    #[test]
    fn test_repeated_reference_is_not_a_cycle() {
        let resolver = env_resolver();
        assert_eq!(
            resolver.replace("${{ env.b }} ${{ env.b }}").unwrap(),
            "world world"
        );
    }

    #[test]
    fn test_budget_exhaustion() {
        let resolver = VariableResolver::with_budget(2);
        resolver
            .register(
                MemoryVault::new("v")
                    .with_value("a", "${{ v.b }}")
                    .with_value("b", "${{ v.c }}")
                    .with_value("c", "end"),
            )
            .unwrap();
        assert_eq!(
            resolver.replace("${{ v.a }}"),
            Err(ResolverError::ExpansionBudget { budget: 2 })
        );
    }

    #[test]
    fn test_add_makes_value_visible() {
        let resolver = VariableResolver::new();
        resolver.add("keyvault", "team.db-password", "s3cret");
        assert!(resolver.has_vault("keyvault"));
        assert_eq!(
            resolver.replace("${{ keyvault.team.db-password }}").unwrap(),
            "s3cret"
        );
    }

    #[test]
    fn test_partitioned_sync_keeps_other_partitions() {
        let resolver = VariableResolver::new();
        resolver
            .register(
                MemoryVault::new("keyvault")
                    .with_partition("one")
                    .with_value("secret", "1"),
            )
            .unwrap();
        resolver
            .register(
                MemoryVault::new("keyvault")
                    .with_partition("two")
                    .with_value("secret", "2"),
            )
            .unwrap();
        assert_eq!(
            resolver.entries("keyvault"),
            vec![
                ("one.secret".to_string(), "1".to_string()),
                ("two.secret".to_string(), "2".to_string()),
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_plain_strings_pass_through(s in "[^$]*") {
            let resolver = env_resolver();
            prop_assert_eq!(resolver.replace(&s).unwrap(), s);
        }

        #[test]
        fn prop_replace_is_idempotent(
            parts in proptest::collection::vec(
                prop_oneof![
                    Just("${{ env.a }}".to_string()),
                    Just("${{ env.b }}".to_string()),
                    Just("${{ env.nope }}".to_string()),
                    "[a-z ]{0,6}",
                ],
                0..6,
            )
        ) {
            let resolver = env_resolver();
            let once = resolver.replace(&parts.concat()).unwrap();
            let twice = resolver.replace(&once).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
