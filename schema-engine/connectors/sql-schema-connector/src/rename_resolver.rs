use crate::error::ConnectorError;
use crate::sql_schema_differ::AmbiguousChange;
use futures::future::BoxFuture;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverDecision {
    Rename,
    AddAndDrop,
}

/// Strategy deciding how ambiguous changes are interpreted.
pub enum RenameResolver {
    /// Preserve data when the intent reads as a rename.
    AlwaysRename,
    /// Clean slate: add the new object, drop the old one.
    AlwaysAddAndDrop,
    /// Fail on any ambiguity. The safe default for CI.
    Strict,
    /// Consult a user-supplied `(from, to) -> decision` lookup; entries
    /// missing from the map fail like `Strict`.
    Predefined(HashMap<(String, String), ResolverDecision>),
    /// Delegate to a synchronous user function.
    Function(Box<dyn Fn(&AmbiguousChange) -> ResolverDecision + Send + Sync>),
    /// Delegate to an asynchronous user function.
    AsyncFunction(
        Box<dyn Fn(&AmbiguousChange) -> BoxFuture<'static, ResolverDecision> + Send + Sync>,
    ),
}

impl std::fmt::Debug for RenameResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RenameResolver::AlwaysRename => "AlwaysRename",
            RenameResolver::AlwaysAddAndDrop => "AlwaysAddAndDrop",
            RenameResolver::Strict => "Strict",
            RenameResolver::Predefined(_) => "Predefined",
            RenameResolver::Function(_) => "Function",
            RenameResolver::AsyncFunction(_) => "AsyncFunction",
        };
        f.write_str(name)
    }
}

impl RenameResolver {
    /// Decide every ambiguity, in input order.
    pub async fn resolve(
        &self,
        ambiguities: &[AmbiguousChange],
    ) -> Result<Vec<(AmbiguousChange, ResolverDecision)>, ConnectorError> {
        if ambiguities.is_empty() {
            return Ok(Vec::new());
        }

        match self {
            RenameResolver::Strict => Err(ConnectorError::AmbiguousUnresolved {
                changes: ambiguities.iter().map(ToString::to_string).collect(),
            }),
            RenameResolver::AlwaysRename => Ok(ambiguities
                .iter()
                .map(|a| (a.clone(), ResolverDecision::Rename))
                .collect()),
            RenameResolver::AlwaysAddAndDrop => Ok(ambiguities
                .iter()
                .map(|a| (a.clone(), ResolverDecision::AddAndDrop))
                .collect()),
            RenameResolver::Predefined(lookup) => {
                let mut decisions = Vec::with_capacity(ambiguities.len());
                let mut unresolved = Vec::new();
                for ambiguity in ambiguities {
                    let key = match ambiguity {
                        AmbiguousChange::Column { from, to, .. }
                        | AmbiguousChange::Table { from, to, .. } => {
                            (from.clone(), to.clone())
                        }
                    };
                    match lookup.get(&key) {
                        Some(decision) => decisions.push((ambiguity.clone(), *decision)),
                        None => unresolved.push(ambiguity.to_string()),
                    }
                }
                if !unresolved.is_empty() {
                    return Err(ConnectorError::AmbiguousUnresolved { changes: unresolved });
                }
                Ok(decisions)
            }
            RenameResolver::Function(f) => Ok(ambiguities
                .iter()
                .map(|a| (a.clone(), f(a)))
                .collect()),
            RenameResolver::AsyncFunction(f) => {
                let mut decisions = Vec::with_capacity(ambiguities.len());
                for ambiguity in ambiguities {
                    let decision = f(ambiguity).await;
                    decisions.push((ambiguity.clone(), decision));
                }
                Ok(decisions)
            }
        }
    }
}

impl Default for RenameResolver {
    fn default() -> Self {
        RenameResolver::Strict
    }
}
