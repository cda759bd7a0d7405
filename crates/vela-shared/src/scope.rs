use serde::{Deserialize, Serialize};

/// Identifies a lexical scope.
///
/// Scopes are produced by the name-lookup front-end; the core only threads
/// them through queries and never inspects their contents.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ScopeId(pub u32);

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope{}", self.0)
    }
}
