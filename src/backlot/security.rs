//! Query-level security filtering.
//!
//! Every inbound query is vetted against the caller's role before the supervisor
//! dispatches.  The filter may veto the query outright, sanitize it, or pass it
//! through untouched.  It never fails open: any internal error is reported as a
//! denial with reason `"security_filter_error"`.
//!
//! Independently of the keyword filter, the sensitivity envelope in
//! [`crate::backlot::identity`] bounds every record surfaced back to the caller.

use crate::backlot::identity::CallerIdentity;
use log::warn;

/// Keywords that mark a query as touching sensitive material.
const SENSITIVE_KEYWORDS: [&str; 11] = [
    "financial",
    "salary",
    "budget",
    "confidential",
    "internal",
    "strategic",
    "acquisition",
    "merger",
    "lawsuit",
    "legal",
    "compliance",
];

/// Roles above this level (numerically) may not issue sensitive queries at all.
const SENSITIVE_ACCESS_MAX_LEVEL: u8 = 2;

/// Roles above this level get their queries sanitized even when allowed.
const SANITIZE_ABOVE_LEVEL: u8 = 3;

/// Outcome of vetting a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SecurityVerdict {
    /// The query may proceed, possibly with sensitive words stripped.
    Allowed {
        /// The query text to dispatch (sanitized when `flagged`).
        filtered_query: String,
        /// Whether sanitization changed the text.
        flagged: bool,
    },
    /// The query must not be dispatched.  No LLM or tool call may be issued.
    Denied {
        /// Machine-readable reason, e.g. `"insufficient_permissions"`.
        reason: String,
    },
}

impl SecurityVerdict {
    /// Whether the verdict permits dispatch.
    pub fn is_allowed(&self) -> bool {
        matches!(self, SecurityVerdict::Allowed { .. })
    }
}

/// Role-based query filter applied ahead of the supervisor.
#[derive(Debug, Default, Clone)]
pub struct SecurityFilter;

impl SecurityFilter {
    pub fn new() -> Self {
        SecurityFilter
    }

    /// Vet `query` against `caller`'s role.
    ///
    /// Rules, in order:
    /// 1. Any sensitive keyword + role level > 2 → denied
    ///    (`"insufficient_permissions"`).
    /// 2. Role level > 3 → allowed with sensitive words stripped and
    ///    `flagged = true`.
    /// 3. Otherwise → allowed unchanged.
    ///
    /// Fail-secure: an internal error is mapped to a denial with reason
    /// `"security_filter_error"` rather than letting the query through.
    pub fn apply(&self, query: &str, caller: &CallerIdentity) -> SecurityVerdict {
        match self.apply_inner(query, caller) {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!("security filter internal error, denying query: {}", err);
                SecurityVerdict::Denied {
                    reason: "security_filter_error".to_string(),
                }
            }
        }
    }

    fn apply_inner(
        &self,
        query: &str,
        caller: &CallerIdentity,
    ) -> Result<SecurityVerdict, String> {
        let user_level = caller.role.level();
        let query_lower = query.to_lowercase();

        let contains_sensitive = SENSITIVE_KEYWORDS
            .iter()
            .any(|keyword| query_lower.contains(keyword));

        if contains_sensitive && user_level > SENSITIVE_ACCESS_MAX_LEVEL {
            warn!(
                "query blocked for role {} (level {}): sensitive content",
                caller.role.as_str(),
                user_level
            );
            return Ok(SecurityVerdict::Denied {
                reason: "insufficient_permissions".to_string(),
            });
        }

        if user_level > SANITIZE_ABOVE_LEVEL {
            let filtered = strip_sensitive_words(query);
            let flagged = filtered != query;
            return Ok(SecurityVerdict::Allowed {
                filtered_query: filtered,
                flagged,
            });
        }

        Ok(SecurityVerdict::Allowed {
            filtered_query: query.to_string(),
            flagged: false,
        })
    }
}

/// Remove sensitive words from the query, case-insensitively, collapsing the
/// whitespace left behind.
fn strip_sensitive_words(query: &str) -> String {
    let kept: Vec<&str> = query
        .split_whitespace()
        .filter(|word| {
            let bare: String = word
                .to_lowercase()
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect();
            !SENSITIVE_KEYWORDS.contains(&bare.as_str())
        })
        .collect();
    kept.join(" ")
}
