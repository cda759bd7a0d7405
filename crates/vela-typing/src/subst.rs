//! The substitution map and the reification primitives built on it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use vela_shared::ty::{TransformAction, Type, TypeVar};

/// What `reify` does with variables the map has no assignment for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unresolved {
    /// Unresolved variables remain in the output.
    Kept,
    /// Unresolved variables are replaced by the error type.
    SubstitutedByError,
}

/// A monotonically growing mapping from variable identity to type.
///
/// Variables are never rewritten in place anywhere in the solver; every
/// binding lives here, and `reify` applies them transitively.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionMap {
    assignments: HashMap<TypeVar, Type>,
}

impl SubstitutionMap {
    pub fn new() -> SubstitutionMap {
        SubstitutionMap::default()
    }

    pub fn get(&self, var: TypeVar) -> Option<&Type> {
        self.assignments.get(&var)
    }

    pub fn contains(&self, var: TypeVar) -> bool {
        self.assignments.contains_key(&var)
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeVar, &Type)> {
        self.assignments.iter().map(|(v, t)| (*v, t))
    }

    /// Record an assignment. The map is monotone: assigning a variable twice
    /// is a logic error upstream.
    pub fn assign(&mut self, var: TypeVar, ty: Type) {
        let previous = self.assignments.insert(var, ty);
        debug_assert!(previous.is_none(), "variable {} assigned twice", var);
    }

    /// Walk `ty` and the assignments transitively, resolving every variable
    /// the map knows about.
    pub fn reify(&self, ty: &Type, unresolved: Unresolved) -> Type {
        ty.transform(&mut (), &mut |_, t| match t.as_variable() {
            Some(v) => match self.assignments.get(&v) {
                Some(assigned) => TransformAction::StepOver(self.reify(assigned, unresolved)),
                None => match unresolved {
                    Unresolved::Kept => TransformAction::StepOver(t.clone()),
                    Unresolved::SubstitutedByError => TransformAction::StepOver(Type::error()),
                },
            },
            None => {
                if t.contains_variable() {
                    TransformAction::StepInto(t.clone())
                } else {
                    TransformAction::StepOver(t.clone())
                }
            }
        })
    }

    /// The representative of `var`: what it reifies to under the map.
    pub fn reified_var(&self, var: TypeVar, unresolved: Unresolved) -> Type {
        self.reify(&Type::var(var), unresolved)
    }

    /// Path-compress terminal rewrites so that a single lookup suffices for
    /// every variable. After this, `reify` is idempotent in one step.
    pub fn optimized(&self) -> SubstitutionMap {
        let mut out = SubstitutionMap::new();
        for (var, ty) in &self.assignments {
            out.assignments
                .insert(*var, self.reify(ty, Unresolved::Kept));
        }
        out
    }
}

impl FromIterator<(TypeVar, Type)> for SubstitutionMap {
    fn from_iter<T: IntoIterator<Item = (TypeVar, Type)>>(iter: T) -> SubstitutionMap {
        let mut map = SubstitutionMap::new();
        for (var, ty) in iter {
            map.assign(var, ty);
        }
        map
    }
}

impl std::fmt::Display for SubstitutionMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.assignments.is_empty() {
            return write!(f, "{{}}");
        }
        let mut lines = self.assignments.iter().collect::<Vec<_>>();
        lines.sort_by_key(|(var, _)| **var);
        write!(f, "{{")?;
        for (i, (var, ty)) in lines.into_iter().enumerate() {
            if i != 0 {
                write!(f, ",")?;
            }
            write!(f, " {}: {}", var, ty)?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use vela_shared::ty::{TupleElement, Type, TypeVar};

    use super::{SubstitutionMap, Unresolved};

    #[test]
    fn reify_is_transitive() {
        let mut map = SubstitutionMap::new();
        map.assign(TypeVar(0), Type::var(TypeVar(1)));
        map.assign(TypeVar(1), Type::word());

        let out = map.reified_var(TypeVar(0), Unresolved::Kept);
        assert_eq!(out, Type::word());
    }

    #[test]
    fn reify_keeps_or_replaces_unresolved_variables() {
        let map = SubstitutionMap::new();
        let t = Type::var(TypeVar(9));
        assert_eq!(map.reify(&t, Unresolved::Kept), t);
        assert_eq!(map.reify(&t, Unresolved::SubstitutedByError), Type::error());
    }

    #[test]
    fn optimized_map_is_idempotent() {
        let mut map = SubstitutionMap::new();
        map.assign(TypeVar(0), Type::var(TypeVar(1)));
        map.assign(
            TypeVar(1),
            Type::tuple(vec![TupleElement {
                label: None,
                ty: Type::var(TypeVar(2)),
            }]),
        );
        map.assign(TypeVar(2), Type::word());

        let optimized = map.optimized();
        for (var, ty) in optimized.iter() {
            let _ = var;
            assert_eq!(&optimized.reify(ty, Unresolved::Kept), ty);
        }

        let t = Type::var(TypeVar(0));
        let once = optimized.reify(&t, Unresolved::Kept);
        let twice = optimized.reify(&once, Unresolved::Kept);
        assert_eq!(once, twice);
    }
}
