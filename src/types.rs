use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What the context injector does with a placeholder it cannot resolve.
///
/// - `Lenient`: leave `{{id.result}}` in the input verbatim (default).
/// - `Strict`: fail the task with an injection error, which cascades to its
///   dependents like any other task failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderPolicy {
    #[default]
    Lenient,
    Strict,
}

impl FromStr for PlaceholderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lenient" => Ok(PlaceholderPolicy::Lenient),
            "strict" => Ok(PlaceholderPolicy::Strict),
            other => Err(format!(
                "invalid placeholder_policy: {other} (expected \"lenient\" or \"strict\")"
            )),
        }
    }
}

/// Why a run stopped before every task reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The caller cancelled the token passed to `Executor::execute`.
    Requested,
    /// The configured whole-plan timeout elapsed.
    PlanTimeout,
}
