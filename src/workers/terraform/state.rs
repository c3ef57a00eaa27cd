//! Stack lifecycle state
//!
//! The state of a stack lives next to terraform's own working data in
//! `<stack>/.terraform/locally-state.json`. A `.terraform` directory without
//! that file means the stack was initialized outside this tool.

use crate::tasks::TerraformCommand;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Terraform working directory
pub const TERRAFORM_DIR: &str = ".terraform";

/// State file name inside [`TERRAFORM_DIR`]
pub const STATE_FILE: &str = "locally-state.json";

/// Saved plan consumed by `apply`
pub const PLAN_FILE: &str = "locally.tfplan";

/// `apply` on a stack that was never initialized
pub const MISSING_INIT_WHEN_APPLYING: &str = "MissingInitWhenApplying";
/// `plan` on a stack that was never initialized
pub const MISSING_INIT_WHEN_PLANNING: &str = "MissingInitWhenPlanning";
/// `apply` without a preceding `plan`
pub const MISSING_PLAN_WHEN_APPLYING: &str = "MissingPlanWhenApplying";
/// `destroy` on a stack that was never initialized
pub const MISSING_INIT_WHEN_DESTROYING: &str = "MissingInitWhenDestroying";

/// Lifecycle state of a stack
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackState {
    /// Never initialized
    #[default]
    Unknown,
    /// `init` succeeded
    Initialized,
    /// `validate` succeeded
    Validated,
    /// A saved plan is waiting to be applied
    Planned,
    /// The saved plan was applied
    Applied,
    /// Resources were destroyed
    Destroyed,
}

impl fmt::Display for StackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Initialized => "initialized",
            Self::Validated => "validated",
            Self::Planned => "planned",
            Self::Applied => "applied",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateRecord {
    state: StackState,
    updated_at: DateTime<Utc>,
}

fn state_path(stack_dir: &Path) -> PathBuf {
    stack_dir.join(TERRAFORM_DIR).join(STATE_FILE)
}

impl StackState {
    /// Reads the state of the stack in `stack_dir`
    #[must_use]
    pub fn load(stack_dir: &Path) -> Self {
        let path = state_path(stack_dir);
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<StateRecord>(&content) {
                Ok(record) => record.state,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Unreadable stack state");
                    Self::Initialized
                }
            },
            Err(_) if stack_dir.join(TERRAFORM_DIR).is_dir() => Self::Initialized,
            Err(_) => Self::Unknown,
        }
    }

    /// Persists the state of the stack in `stack_dir`
    ///
    /// # Errors
    ///
    /// Fails when the state file cannot be written.
    pub fn save(self, stack_dir: &Path) -> std::io::Result<()> {
        let path = state_path(stack_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let record = StateRecord {
            state: self,
            updated_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&record).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Sentinel naming the missing prerequisite of `command`, if any
    #[must_use]
    pub fn missing_prerequisite(self, command: TerraformCommand) -> Option<&'static str> {
        match (command, self) {
            (TerraformCommand::Plan, Self::Unknown) => Some(MISSING_INIT_WHEN_PLANNING),
            (TerraformCommand::Apply, Self::Unknown) => Some(MISSING_INIT_WHEN_APPLYING),
            (TerraformCommand::Apply, state) if state != Self::Planned => {
                Some(MISSING_PLAN_WHEN_APPLYING)
            }
            (TerraformCommand::Destroy, Self::Unknown) => Some(MISSING_INIT_WHEN_DESTROYING),
            _ => None,
        }
    }

    /// State after `command` succeeded
    #[must_use]
    pub fn after(self, command: TerraformCommand) -> Self {
        match command {
            TerraformCommand::Init => Self::Initialized,
            TerraformCommand::Validate => match self {
                Self::Unknown | Self::Initialized => Self::Validated,
                other => other,
            },
            TerraformCommand::Plan => Self::Planned,
            TerraformCommand::Apply => Self::Applied,
            TerraformCommand::Destroy => Self::Destroyed,
            TerraformCommand::Output | TerraformCommand::Graph | TerraformCommand::Refresh => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_load_without_terraform_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(StackState::load(dir.path()), StackState::Unknown);
    }

    #[test]
    fn test_terraform_dir_means_initialized() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(TERRAFORM_DIR)).unwrap();
        assert_eq!(StackState::load(dir.path()), StackState::Initialized);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        StackState::Planned.save(dir.path()).unwrap();
        assert_eq!(StackState::load(dir.path()), StackState::Planned);
    }

    #[test]
    fn test_prerequisites() {
        use TerraformCommand::{Apply, Destroy, Init, Plan};
        assert_eq!(
            StackState::Unknown.missing_prerequisite(Apply),
            Some(MISSING_INIT_WHEN_APPLYING)
        );
        assert_eq!(
            StackState::Initialized.missing_prerequisite(Apply),
            Some(MISSING_PLAN_WHEN_APPLYING)
        );
        assert_eq!(
            StackState::Unknown.missing_prerequisite(Plan),
            Some(MISSING_INIT_WHEN_PLANNING)
        );
        assert_eq!(
            StackState::Unknown.missing_prerequisite(Destroy),
            Some(MISSING_INIT_WHEN_DESTROYING)
        );
        assert_eq!(StackState::Planned.missing_prerequisite(Apply), None);
        assert_eq!(StackState::Unknown.missing_prerequisite(Init), None);
    }

    #[test]
    fn test_transitions() {
        use TerraformCommand::{Apply, Init, Output, Plan, Validate};
        let state = StackState::Unknown.after(Init);
        assert_eq!(state, StackState::Initialized);
        let state = state.after(Validate).after(Plan);
        assert_eq!(state, StackState::Planned);
        assert_eq!(state.after(Validate), StackState::Planned);
        assert_eq!(state.after(Output), StackState::Planned);
        assert_eq!(state.after(Apply), StackState::Applied);
    }
}
