use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::ViolationDetail;

/// How a save flow reacts to budget violations.
///
/// Import and manual-edit behave differently on purpose and stay separate modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePolicy {
    /// Bulk import: any violation is a hard stop with no override.
    Import,
    /// Single-record edit: violations are warnings and never block.
    ManualEdit,
    /// Plan to assignment promotion: one deduplicated confirm/cancel prompt.
    Promote,
}

impl GatePolicy {
    pub const fn label(self) -> &'static str {
        match self {
            GatePolicy::Import => "import",
            GatePolicy::ManualEdit => "manual_edit",
            GatePolicy::Promote => "promote",
        }
    }
}

pub(crate) struct Classification {
    pub blocked: bool,
    pub requires_confirmation: bool,
    pub violations: Vec<ViolationDetail>,
}

pub(crate) fn classify(policy: GatePolicy, violations: Vec<ViolationDetail>) -> Classification {
    match policy {
        GatePolicy::Import => Classification {
            blocked: !violations.is_empty(),
            requires_confirmation: false,
            violations,
        },
        GatePolicy::ManualEdit => Classification {
            blocked: false,
            requires_confirmation: false,
            violations,
        },
        GatePolicy::Promote => {
            let violations = dedupe_by_message(violations);
            Classification {
                blocked: false,
                requires_confirmation: !violations.is_empty(),
                violations,
            }
        }
    }
}

fn dedupe_by_message(violations: Vec<ViolationDetail>) -> Vec<ViolationDetail> {
    let mut seen = HashSet::new();
    violations
        .into_iter()
        .filter(|violation| seen.insert(violation.message.clone()))
        .collect()
}
