use serde::{Deserialize, Serialize};

/// Identifies an expression node in the syntax tree.
///
/// Expression identities are stable for the lifetime of a compilation; the
/// binding map produced by the solver is keyed by them.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ExprId(pub u32);

impl std::fmt::Display for ExprId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%e{}", self.0)
    }
}
