//! Bash task parameters

use crate::tasks::TaskParameters;
use crate::vault::placeholder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters of a `bash` task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BashParameters {
    /// Program to run; a full command line is split on [`prepare`](TaskParameters::prepare)
    #[serde(default)]
    pub command: String,

    /// Arguments passed to the program
    #[serde(default)]
    pub arguments: Vec<String>,

    /// Directory the child runs in
    #[serde(default)]
    pub working_directory: Option<String>,

    /// Extra environment for the child
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

crate::expand_fields!(BashParameters {
    command,
    arguments,
    working_directory,
    environment
});

impl TaskParameters for BashParameters {
    fn validate(&self) -> bool {
        !self.command.trim().is_empty()
    }

    fn prepare(&mut self) {
        let line = placeholder::compact(self.command.trim());
        let mut tokens = shell_words::split(&line)
            .unwrap_or_else(|_| line.split_whitespace().map(str::to_string).collect())
            .into_iter();
        let Some(program) = tokens.next() else {
            return;
        };
        self.command = program;
        let mut arguments: Vec<String> = tokens.collect();
        arguments.append(&mut self.arguments);
        self.arguments = arguments;
    }

    fn invalid_reason(&self) -> String {
        "command is required".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_prepare_splits_command_line() {
        let mut params = BashParameters {
            command: "docker compose up".to_string(),
            arguments: vec!["-d".to_string()],
            ..BashParameters::default()
        };
        params.prepare();
        assert_eq!(params.command, "docker");
        assert_eq!(params.arguments, vec!["compose", "up", "-d"]);
    }

    #[test]
    fn test_prepare_keeps_quoted_arguments() {
        let mut params = BashParameters {
            command: r#"echo "hello world""#.to_string(),
            ..BashParameters::default()
        };
        params.prepare();
        assert_eq!(params.arguments, vec!["hello world"]);
    }

    #[test]
    fn test_prepare_keeps_placeholders_whole() {
        let mut params = BashParameters {
            command: "echo ${{ env.name }}".to_string(),
            ..BashParameters::default()
        };
        params.prepare();
        assert_eq!(params.arguments, vec!["${{env.name}}"]);
    }

    #[test]
    fn test_blank_command_is_invalid() {
        let mut params = BashParameters {
            command: "   ".to_string(),
            ..BashParameters::default()
        };
        params.prepare();
        assert!(!params.validate());
    }
}
