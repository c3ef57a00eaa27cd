//! Command line surface of locally
//!
//! - `config`: manage registered contexts
//! - `env`: print resolved variables
//! - `pipelines`: run, validate and list pipelines
//! - `infrastructure`: terraform stack lifecycle
//! - `docker`: service containers
//! - `keyvault sync`: pull secrets into the `keyvault` vault
//! - `tools`: small helpers
//! - `completions`: shell completions
//! - `api`: admin HTTP surface

pub mod app;
pub mod completions;
pub mod config;
pub mod docker;
pub mod env;
pub mod infrastructure;
pub mod keyvault;
pub mod pipelines;
pub mod tools;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use app::App;

/// CLI arguments for locally
#[derive(Parser, Debug)]
#[command(name = "locally")]
#[command(author, version, about = "Run your local development environment", long_about = None)]
struct Args {
    #[command(flatten)]
    global: GlobalFlags,

    #[command(subcommand)]
    command: Command,
}

/// Flags accepted by every command
#[derive(ClapArgs, Debug, Clone, Copy, Default)]
pub struct GlobalFlags {
    /// Show debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Show trace output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Never prompt
    #[arg(long, global = true)]
    pub no_input: bool,

    /// Approve destructive operations without asking
    #[arg(long, global = true)]
    pub auto_approve: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage contexts
    Config {
        #[command(subcommand)]
        action: config::ConfigAction,
    },

    /// Print a variable, or every known variable
    Env {
        /// Variable name, optionally prefixed with its vault (`config.db.host`)
        variable: Option<String>,
        /// List every variable of every vault
        #[arg(long)]
        list_all: bool,
    },

    /// Run, validate or list pipelines
    Pipelines {
        /// Operation
        #[arg(value_enum)]
        action: pipelines::PipelineAction,
        /// Pipeline name; all pipelines when omitted
        name: Option<String>,
    },

    /// Terraform stack operations
    #[command(alias = "infra")]
    Infrastructure {
        /// Operation
        #[arg(value_enum)]
        action: infrastructure::InfrastructureAction,
        /// Stack name
        stack: String,
        /// Apply the operation to the stack's dependencies first
        #[arg(long)]
        build_dependencies: bool,
    },

    /// Docker service operations
    Docker {
        /// Operation
        #[arg(value_enum)]
        action: docker::DockerAction,
        /// Service name
        service: Option<String>,
        /// Component name
        component: Option<String>,
        /// Apply the operation to dependencies first
        #[arg(long)]
        build_dependencies: bool,
    },

    /// Key Vault operations
    Keyvault {
        #[command(subcommand)]
        action: keyvault::KeyvaultAction,
    },

    /// Helpers
    Tools {
        #[command(subcommand)]
        action: tools::ToolsAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: ShellArg,
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Serve the admin HTTP API
    Api {
        /// Port to listen on
        #[arg(long, default_value_t = locally::infrastructure::api::DEFAULT_PORT)]
        port: u16,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ShellArg {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Build the CLI command for completion generation
pub fn build_cli() -> clap::Command {
    Args::command()
}

/// Parse and execute CLI arguments
pub fn run() -> Result<ExitCode> {
    let args = Args::parse();
    let app = App::new(args.global)?;

    match args.command {
        Command::Config { action } => config::run(&app, action),
        Command::Env { variable, list_all } => env::run(&app, variable.as_deref(), list_all),
        Command::Pipelines { action, name } => pipelines::run(&app, action, name.as_deref()),
        Command::Infrastructure {
            action,
            stack,
            build_dependencies,
        } => infrastructure::run(&app, action, &stack, build_dependencies),
        Command::Docker {
            action,
            service,
            component,
            build_dependencies,
        } => docker::run(
            &app,
            action,
            service.as_deref(),
            component.as_deref(),
            build_dependencies,
        ),
        Command::Keyvault { action } => keyvault::run(&app, action),
        Command::Tools { action } => tools::run(action),
        Command::Completions { shell, output } => {
            use clap_complete::Shell;

            let shell = match shell {
                ShellArg::Bash => Shell::Bash,
                ShellArg::Zsh => Shell::Zsh,
                ShellArg::Fish => Shell::Fish,
                ShellArg::PowerShell => Shell::PowerShell,
            };
            let completions = completions::generate_completions(shell)?;
            match output {
                Some(path) => completions::save_completions(&completions, &path)?,
                None => println!("{completions}"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Api { port } => {
            app.notifier
                .info(format!("Serving the admin API on http://127.0.0.1:{port}"));
            locally::infrastructure::api::run(app.home.clone(), port)
                .context("Admin API failed")?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
