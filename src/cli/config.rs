//! `locally config` - Manage contexts

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use locally::infrastructure::config;
use locally::infrastructure::ContextConfig;
use std::process::ExitCode;

use super::app::App;

/// Context management operations
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Select a registered context, or register and select a context file
    SetContext {
        /// Context name or path of a context file
        name: String,
    },

    /// List contexts, or the artefacts of the current context
    List {
        /// What to list
        #[arg(value_enum, default_value_t = ListKind::Contexts)]
        kind: ListKind,
    },

    /// Print the current context
    CurrentContext,

    /// Remove cached data
    Clean {
        /// Also forget every registered context
        #[arg(long)]
        all: bool,
    },
}

/// Listable artefacts
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ListKind {
    /// Registered contexts
    Contexts,
    /// Pipelines of the current context
    Pipelines,
    /// Docker services of the current context
    Services,
    /// Terraform stacks of the current context
    Infrastructure,
    /// Key Vaults of the current context
    Keyvaults,
}

/// Executes a `config` subcommand
pub fn run(app: &App, action: ConfigAction) -> Result<ExitCode> {
    match action {
        ConfigAction::SetContext { name } => {
            let mut global = app.global.clone();
            let selected = global
                .set_current(&name)
                .with_context(|| format!("Cannot select context '{name}'"))?;
            global
                .save(&app.home)
                .context("Cannot write the global configuration")?;
            app.notifier
                .success(format!("Current context is now {selected}"));
        }
        ConfigAction::List { kind: ListKind::Contexts } => {
            let current = app.global.current_context.as_deref();
            for context in &app.global.contexts {
                let marker = if Some(context.name.as_str()) == current { "*" } else { " " };
                println!("{marker} {:<24} {}", context.name, context.path.display());
            }
        }
        ConfigAction::List { kind } => {
            let context = app.context()?;
            for line in artefact_lines(&context, kind) {
                println!("{line}");
            }
        }
        ConfigAction::CurrentContext => match &app.global.current_context {
            Some(name) => println!("{name}"),
            None => {
                app.notifier.warning("No current context is set");
                return Ok(ExitCode::FAILURE);
            }
        },
        ConfigAction::Clean { all } => {
            config::clean(&app.home, all).context("Cannot clean the locally home")?;
            app.notifier.success(if all {
                "Cache and contexts removed"
            } else {
                "Cache removed"
            });
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn with_dependencies(name: &str, depends_on: &[String]) -> String {
    if depends_on.is_empty() {
        name.to_string()
    } else {
        format!("{name} (depends on {})", depends_on.join(", "))
    }
}

/// Lines describing the artefacts of `kind` in `context`
pub fn artefact_lines(context: &ContextConfig, kind: ListKind) -> Vec<String> {
    match kind {
        ListKind::Contexts => Vec::new(),
        ListKind::Pipelines => context
            .pipelines
            .iter()
            .map(|p| with_dependencies(&p.name, &p.depends_on))
            .collect(),
        ListKind::Services => context
            .services
            .iter()
            .flat_map(|s| {
                std::iter::once(with_dependencies(&s.name, &s.depends_on)).chain(
                    s.components
                        .iter()
                        .map(|c| format!("  {}", with_dependencies(&c.name, &c.depends_on))),
                )
            })
            .collect(),
        ListKind::Infrastructure => context
            .infrastructure
            .iter()
            .map(|s| with_dependencies(&s.name, &s.depends_on))
            .collect(),
        ListKind::Keyvaults => context
            .keyvaults
            .iter()
            .map(|k| match &k.partition {
                Some(partition) => format!("{} ({partition})", k.uri),
                None => k.uri.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_artefact_lines() {
        let context = ContextConfig::from_yaml(
            r"
name: dev
services:
  - name: api
    dependsOn: [db]
    components:
      - name: server
        image: api
  - name: db
infrastructure:
  - name: network
keyvaults:
  - uri: https://team.vault.azure.net
    partition: team
",
        )
        .unwrap();

        assert_eq!(
            artefact_lines(&context, ListKind::Services),
            vec!["db", "api (depends on db)", "  server"]
        );
        assert_eq!(artefact_lines(&context, ListKind::Infrastructure), vec!["network"]);
        assert_eq!(
            artefact_lines(&context, ListKind::Keyvaults),
            vec!["https://team.vault.azure.net (team)"]
        );
    }
}
