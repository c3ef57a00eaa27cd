//! SQL task parameters

use crate::tasks::TaskParameters;
use serde::{Deserialize, Serialize};

/// Parameters of a `sql` task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlParameters {
    /// Database URL, e.g. `postgres://user:pw@localhost/db`
    #[serde(default)]
    pub connection_string: String,

    /// Statement to execute
    #[serde(default, alias = "query")]
    pub statement: String,
}

crate::expand_fields!(SqlParameters {
    connection_string,
    statement
});

impl TaskParameters for SqlParameters {
    fn validate(&self) -> bool {
        !self.connection_string.trim().is_empty() && !self.statement.trim().is_empty()
    }

    fn invalid_reason(&self) -> String {
        "connectionString and statement are required".to_string()
    }
}
