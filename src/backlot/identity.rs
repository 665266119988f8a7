//! Caller identity and data-sensitivity primitives.
//!
//! Every request reaching the supervisor carries an authenticated
//! [`CallerIdentity`] produced by an external authenticator.  This module owns
//! the role hierarchy, the six-level data-sensitivity order, and the envelope
//! helper that drops records a caller is not cleared to see.
//!
//! # Example
//!
//! ```rust
//! use backlot::identity::{CallerIdentity, DataSensitivity, UserRole};
//!
//! let caller = CallerIdentity::new("u-42", UserRole::Director, DataSensitivity::Restricted);
//! assert!(caller.can_access(DataSensitivity::Confidential));
//! assert!(!caller.can_access(DataSensitivity::TopSecret));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Organisational roles, ordered by privilege.  Lower numeric level = more
/// privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    Leadership,
    Director,
    CreativeDirector,
    Salesperson,
}

impl UserRole {
    /// Numeric privilege level: `Leadership=1`, `Director=2`,
    /// `CreativeDirector=3`, `Salesperson=4`.
    pub fn level(&self) -> u8 {
        match self {
            UserRole::Leadership => 1,
            UserRole::Director => 2,
            UserRole::CreativeDirector => 3,
            UserRole::Salesperson => 4,
        }
    }

    /// Display name matching the upstream identity provider's vocabulary.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Leadership => "Leadership",
            UserRole::Director => "Director",
            UserRole::CreativeDirector => "Creative Director",
            UserRole::Salesperson => "Salesperson",
        }
    }
}

/// Data-sensitivity levels, six steps ordered from least to most sensitive:
/// `Public < Internal < Confidential < Restricted < Secret < TopSecret`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum DataSensitivity {
    Public,
    Internal,
    Confidential,
    Restricted,
    Secret,
    TopSecret,
}

impl DataSensitivity {
    /// Display name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSensitivity::Public => "Public",
            DataSensitivity::Internal => "Internal",
            DataSensitivity::Confidential => "Confidential",
            DataSensitivity::Restricted => "Restricted",
            DataSensitivity::Secret => "Secret",
            DataSensitivity::TopSecret => "TopSecret",
        }
    }

    /// Numeric rank, 1 (Public) through 6 (TopSecret).
    pub fn rank(&self) -> u8 {
        match self {
            DataSensitivity::Public => 1,
            DataSensitivity::Internal => 2,
            DataSensitivity::Confidential => 3,
            DataSensitivity::Restricted => 4,
            DataSensitivity::Secret => 5,
            DataSensitivity::TopSecret => 6,
        }
    }
}

/// Discrete actions a caller may hold, consumed opaquely from the authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAction {
    AccessAiAgents,
    ViewReports,
    ExportData,
    ManageProjects,
    ConfigureAi,
    ViewAiLogs,
    SystemConfig,
}

/// Immutable per-request identity of the caller.
///
/// Produced by an external authenticator; the engine only consumes it.  The
/// `max_sensitivity` ceiling bounds every memory, tool result, and LLM response
/// surfaced back to this caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Stable user identifier.
    pub user_id: String,
    /// Display name, used only for assistant-voice messages.
    pub name: Option<String>,
    /// Organisational role.
    pub role: UserRole,
    /// Upper bound on the sensitivity of any record surfaced to this caller.
    pub max_sensitivity: DataSensitivity,
    /// Granted permission actions.
    pub permissions: HashSet<PermissionAction>,
}

impl CallerIdentity {
    /// Build an identity with an empty permission set.
    pub fn new(
        user_id: impl Into<String>,
        role: UserRole,
        max_sensitivity: DataSensitivity,
    ) -> Self {
        CallerIdentity {
            user_id: user_id.into(),
            name: None,
            role,
            max_sensitivity,
            permissions: HashSet::new(),
        }
    }

    /// Attach a display name (builder pattern).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Grant a permission action (builder pattern).
    pub fn with_permission(mut self, action: PermissionAction) -> Self {
        self.permissions.insert(action);
        self
    }

    /// Whether the caller holds the given permission.
    pub fn has_permission(&self, action: &PermissionAction) -> bool {
        self.permissions.contains(action)
    }

    /// Whether the caller may see records at the given sensitivity level.
    pub fn can_access(&self, level: DataSensitivity) -> bool {
        level <= self.max_sensitivity
    }
}

/// Anything carrying a sensitivity tag that the envelope filter can inspect.
pub trait Sensitive {
    fn sensitivity(&self) -> DataSensitivity;
}

/// Drop every record whose sensitivity exceeds the caller's ceiling.
///
/// Applied to memories, tool results, and any other tagged records before they
/// are surfaced.  Records at or below the ceiling pass through in order.
pub fn filter_by_sensitivity<T: Sensitive>(records: Vec<T>, caller: &CallerIdentity) -> Vec<T> {
    records
        .into_iter()
        .filter(|r| caller.can_access(r.sensitivity()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tagged(DataSensitivity);
    impl Sensitive for Tagged {
        fn sensitivity(&self) -> DataSensitivity {
            self.0
        }
    }

    #[test]
    fn sensitivity_order_is_total() {
        assert!(DataSensitivity::Public < DataSensitivity::Internal);
        assert!(DataSensitivity::Confidential < DataSensitivity::Restricted);
        assert!(DataSensitivity::Secret < DataSensitivity::TopSecret);
        assert_eq!(DataSensitivity::TopSecret.rank(), 6);
    }

    #[test]
    fn envelope_drops_records_above_ceiling() {
        let caller =
            CallerIdentity::new("u1", UserRole::Salesperson, DataSensitivity::Confidential);
        let records = vec![
            Tagged(DataSensitivity::Public),
            Tagged(DataSensitivity::Secret),
            Tagged(DataSensitivity::Confidential),
        ];
        let kept = filter_by_sensitivity(records, &caller);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn role_levels_match_hierarchy() {
        assert_eq!(UserRole::Leadership.level(), 1);
        assert_eq!(UserRole::Salesperson.level(), 4);
    }
}
