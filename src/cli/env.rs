//! `locally env` - Print resolved variables

use anyhow::{Context, Result};
use locally::vault::{CONFIG_VAULT, ENV_VAULT, VariableResolver};
use std::process::ExitCode;

use super::app::App;

/// Prints one variable, or every variable with `list_all`
pub fn run(app: &App, variable: Option<&str>, list_all: bool) -> Result<ExitCode> {
    let context = app.context().ok();
    let ctx = app.worker_context(context)?;

    if list_all {
        for line in all_lines(&ctx.resolver) {
            println!("{line}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let Some(variable) = variable else {
        anyhow::bail!("Pass a variable name or --list-all");
    };
    match lookup(&ctx.resolver, variable)? {
        Some(value) => {
            println!("{value}");
            Ok(ExitCode::SUCCESS)
        }
        None => {
            app.notifier
                .error(format!("Variable '{variable}' is not defined"));
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Looks `variable` up and expands placeholders in its value
///
/// `vault.key` addresses one vault. A bare key is searched in the `config`
/// vault first, then in the process environment.
pub fn lookup(resolver: &VariableResolver, variable: &str) -> Result<Option<String>> {
    let raw = match variable.split_once('.') {
        Some((vault, key)) if resolver.has_vault(vault) => resolver.get(vault, key),
        _ => resolver
            .get(CONFIG_VAULT, variable)
            .or_else(|| resolver.get(ENV_VAULT, variable)),
    };
    raw.map(|value| {
        resolver
            .replace(&value)
            .with_context(|| format!("Cannot expand '{variable}'"))
    })
    .transpose()
}

/// `vault.key=value` for every entry of every vault
pub fn all_lines(resolver: &VariableResolver) -> Vec<String> {
    resolver
        .vault_names()
        .into_iter()
        .flat_map(|vault| {
            resolver
                .entries(&vault)
                .into_iter()
                .map(move |(key, value)| format!("{vault}.{key}={value}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use locally::vault::MemoryVault;
    use pretty_assertions::assert_eq;

    fn resolver() -> VariableResolver {
        let resolver = VariableResolver::new();
        resolver
            .register(
                MemoryVault::new("config")
                    .with_value("db.host", "localhost")
                    .with_value("db.url", "postgres://${{ config.db.host }}/app"),
            )
            .unwrap();
        resolver
            .register(MemoryVault::new("env").with_value("HOME", "/home/dev"))
            .unwrap();
        resolver
    }

    #[test]
    fn test_lookup() {
        let resolver = resolver();
        assert_eq!(
            lookup(&resolver, "config.db.url").unwrap().as_deref(),
            Some("postgres://localhost/app")
        );
        assert_eq!(lookup(&resolver, "db.host").unwrap().as_deref(), Some("localhost"));
        assert_eq!(lookup(&resolver, "home").unwrap().as_deref(), Some("/home/dev"));
        assert_eq!(lookup(&resolver, "missing").unwrap(), None);
    }

    #[test]
    fn test_all_lines_are_sorted_by_vault() {
        let lines = all_lines(&resolver());
        assert_eq!(
            lines,
            vec![
                "config.db.host=localhost",
                "config.db.url=postgres://${{ config.db.host }}/app",
                "env.home=/home/dev",
            ]
        );
    }
}
