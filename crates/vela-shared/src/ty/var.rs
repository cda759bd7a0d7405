use serde::{Deserialize, Serialize};

/// An open type placeholder with a fresh identity.
///
/// Variables are never mutated in place; the substitution map owns every
/// binding ever made for them.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TypeVar(pub u64);

impl std::fmt::Display for TypeVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Allocator for fresh type variables.
///
/// Kept as a value so that solver forks and the typed-program `open`
/// operation can share one counter without process-global state.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FreshVarAllocator {
    next_id: u64,
}

impl FreshVarAllocator {
    pub fn new() -> FreshVarAllocator {
        FreshVarAllocator::default()
    }

    /// Start allocation above ids already in use, e.g. when reviving a
    /// solver state from a recorded solution.
    pub fn starting_at(next_id: u64) -> FreshVarAllocator {
        FreshVarAllocator { next_id }
    }

    pub fn alloc(&mut self) -> TypeVar {
        let var = TypeVar(self.next_id);
        self.next_id += 1;
        var
    }
}
