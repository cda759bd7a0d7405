//! The typed-program query surface the solver consumes.
//!
//! These are pure queries from the solver's perspective: implementations may
//! memoize internally but must not mutate observable results mid-solve.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use vela_shared::{
    builtins::BuiltinConcept,
    decl::{DeclId, DeclRef, Name},
    diag::Diagnostic,
    scope::ScopeId,
    ty::{FreshVarAllocator, TransformAction, Type, TypeKind},
};

use crate::{goal::Goal, relations::TypeRelations};

/// How a resolved name is about to be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionPurpose {
    /// Mentioned without application.
    Unapplied,
    /// Applied with function syntax.
    Function,
    /// Applied with subscript syntax.
    Subscript,
}

/// A candidate produced by name resolution: the declaration it refers to,
/// the type the use site sees, and the constraints the choice induces.
#[derive(Clone, Debug)]
pub struct NameResolutionCandidate {
    pub reference: DeclRef,
    pub ty: Type,
    pub constraints: Vec<Goal>,
}

/// The outcome of resolving a name against a subject type.
#[derive(Clone, Debug, Default)]
pub struct CandidateSet {
    pub viable: Vec<NameResolutionCandidate>,
    pub non_viable: Vec<(DeclRef, Diagnostic)>,
}

impl CandidateSet {
    pub fn is_empty(&self) -> bool {
        self.viable.is_empty() && self.non_viable.is_empty()
    }
}

/// The queries the solver issues against the typed program.
pub trait ProgramQuerier {
    fn relations(&self) -> &TypeRelations;

    /// The declared type of a declaration.
    fn decl_type(&self, decl: DeclId) -> Type;

    /// The declared name of a declaration, for diagnostics.
    fn decl_name(&self, decl: DeclId) -> Name;

    /// The traits `model` conforms to explicitly in `scope`.
    fn conformed_traits(&self, model: &Type, scope: ScopeId) -> Vec<DeclId>;

    /// Whether a trait declaration names a concept with structural rules.
    fn builtin_concept(&self, concept: DeclId) -> Option<BuiltinConcept>;

    /// Resolve `name` on `subject` (or unqualified when absent), yielding
    /// the candidates visible from `scope`.
    fn resolve(
        &self,
        name: &Name,
        subject: Option<&Type>,
        scope: ScopeId,
        purpose: ResolutionPurpose,
    ) -> CandidateSet;

    /// Whether the declaration is a trait requirement (as opposed to a
    /// concrete implementation).
    fn is_requirement(&self, decl: DeclId) -> bool;

    /// Whether the declaration is the module's entry function.
    fn is_module_entry(&self, decl: DeclId) -> bool;
}

/// Replace every generic parameter in `ty` with a fresh variable, returning
/// the opened type and the substitution performed.
pub fn open_type(
    ty: &Type,
    vars: &mut FreshVarAllocator,
) -> (Type, HashMap<DeclId, Type>) {
    let mut opened: HashMap<DeclId, Type> = HashMap::new();
    let out = ty.transform(&mut (vars, &mut opened), &mut |state, t| {
        let (vars, opened) = state;
        match t.kind() {
            TypeKind::GenericParam(p) => {
                let replacement = opened
                    .entry(p.decl)
                    .or_insert_with(|| Type::var(vars.alloc()))
                    .clone();
                TransformAction::StepOver(replacement)
            }
            _ => TransformAction::StepInto(t.clone()),
        }
    });
    (out, opened)
}

#[cfg(test)]
mod tests {
    use vela_shared::{
        decl::DeclId,
        ty::{CallableParam, FreshVarAllocator, Type},
    };

    use super::open_type;

    #[test]
    fn open_replaces_each_parameter_once() {
        let t_param = Type::generic_param(DeclId(0), "T");
        let ty = Type::thin_lambda(
            vec![
                CallableParam::new(None, t_param.clone()),
                CallableParam::new(None, t_param),
            ],
            Type::word(),
        );

        let mut vars = FreshVarAllocator::new();
        let (opened, map) = open_type(&ty, &mut vars);
        assert_eq!(map.len(), 1);
        assert!(opened.contains_variable());
    }
}
