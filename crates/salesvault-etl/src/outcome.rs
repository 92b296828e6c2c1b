use salesvault_core::{Table, ValidationReport, VaultError};
use serde::Serialize;

/// Lifecycle of one source within a batch load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Pending,
    Loading,
    Succeeded,
    Failed,
}

/// A source that could not be loaded, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub identifier: String,
    pub error: VaultError,
}

/// Result of a batch load that produced at least one table.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// Every successful source concatenated in request order.
    pub table: Table,
    pub succeeded: Vec<String>,
    pub failures: Vec<LoadFailure>,
    /// One report per successful source, same order as `succeeded`.
    pub reports: Vec<ValidationReport>,
}

impl LoadOutcome {
    /// Final state of `identifier` in this batch. Identifiers never requested stay `Pending`.
    pub fn state_of(&self, identifier: &str) -> LoadState {
        if self.succeeded.iter().any(|id| id == identifier) {
            LoadState::Succeeded
        } else if self.failures.iter().any(|f| f.identifier == identifier) {
            LoadState::Failed
        } else {
            LoadState::Pending
        }
    }

    pub fn failed_identifiers(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.identifier.as_str()).collect()
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_reflects_membership() {
        let outcome = LoadOutcome {
            table: Table::empty(),
            succeeded: vec!["enero".into()],
            failures: vec![LoadFailure {
                identifier: "febrero".into(),
                error: VaultError::NotFound {
                    path: "febrero.enc".into(),
                },
            }],
            reports: Vec::new(),
        };

        assert_eq!(outcome.state_of("enero"), LoadState::Succeeded);
        assert_eq!(outcome.state_of("febrero"), LoadState::Failed);
        assert_eq!(outcome.state_of("marzo"), LoadState::Pending);
        assert_eq!(outcome.failed_identifiers(), ["febrero"]);
        assert!(outcome.is_partial());
    }
}
