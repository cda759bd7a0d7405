//! Specificity ranking between equally scored solutions.
//!
//! Two solutions are compared by the name-bindings they share: for each
//! shared name whose chosen declaration differs, the declared callable types
//! are compared by probing strict subtyping between their parameter tuples
//! with a fresh subsolver. A solution is more specific iff every shared-name
//! comparison ascends (or is equal) and at least one strictly ascends.

use std::collections::HashMap;

use vela_shared::{
    decl::{DeclRef, Name},
    scope::ScopeId,
    site::Site,
    ty::{CallableParam, FreshVarAllocator, TupleElement, Type, TypeKind},
};

use crate::{
    goal::{Goal, GoalKind, GoalOrigin, OriginKind},
    querier::{open_type, ProgramQuerier},
    solution::Solution,
    solver::ConstraintSystem,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolutionOrdering {
    Equal,
    /// The left solution is more specific.
    Finer,
    /// The right solution is more specific.
    Coarser,
    Incomparable,
}

pub fn compare(
    a: &Solution,
    b: &Solution,
    scope: ScopeId,
    querier: &dyn ProgramQuerier,
) -> SolutionOrdering {
    let mut a_ascends = false;
    let mut b_ascends = false;

    for (expr, a_ref) in a.bindings() {
        let Some(b_ref) = b.bindings().get(expr) else {
            continue;
        };
        if a_ref == b_ref {
            continue;
        }
        match compare_bindings(a_ref, b_ref, scope, querier) {
            SolutionOrdering::Equal => {}
            SolutionOrdering::Finer => a_ascends = true,
            SolutionOrdering::Coarser => b_ascends = true,
            SolutionOrdering::Incomparable => return SolutionOrdering::Incomparable,
        }
        if a_ascends && b_ascends {
            return SolutionOrdering::Incomparable;
        }
    }

    match (a_ascends, b_ascends) {
        (true, false) => SolutionOrdering::Finer,
        (false, true) => SolutionOrdering::Coarser,
        _ => SolutionOrdering::Equal,
    }
}

fn compare_bindings(
    a: &DeclRef,
    b: &DeclRef,
    scope: ScopeId,
    querier: &dyn ProgramQuerier,
) -> SolutionOrdering {
    let a_ty = querier.decl_type(a.decl);
    let b_ty = querier.decl_type(b.decl);

    let Some((a_labels, _)) = callable_shape(&a_ty) else {
        return SolutionOrdering::Incomparable;
    };
    let Some((b_labels, _)) = callable_shape(&b_ty) else {
        return SolutionOrdering::Incomparable;
    };
    if a_labels != b_labels {
        return SolutionOrdering::Incomparable;
    }

    let a_refines = refines(&a_ty, &b_ty, scope, querier);
    let b_refines = refines(&b_ty, &a_ty, scope, querier);
    match (a_refines, b_refines) {
        // Mutual refinement would break antisymmetry; treat it as a tie the
        // caller must keep.
        (true, true) => SolutionOrdering::Incomparable,
        (true, false) => SolutionOrdering::Finer,
        (false, true) => SolutionOrdering::Coarser,
        (false, false) => SolutionOrdering::Incomparable,
    }
}

/// The labels of a callable declaration's parameters, or `None` when the
/// declaration is not callable.
fn callable_shape(ty: &Type) -> Option<(Vec<Option<Name>>, Vec<CallableParam>)> {
    match ty.kind() {
        TypeKind::Lambda(l) => Some((
            l.inputs.iter().map(|p| p.label.clone()).collect(),
            l.inputs.clone(),
        )),
        TypeKind::Method(m) => Some((
            m.inputs.iter().map(|p| p.label.clone()).collect(),
            m.inputs.clone(),
        )),
        _ => None,
    }
}

/// Whether `a`'s parameter tuple is a strict subtype of an opened version of
/// `b`'s, decided by a fresh subsolver.
fn refines(a: &Type, b: &Type, scope: ScopeId, querier: &dyn ProgramQuerier) -> bool {
    let Some((_, a_params)) = callable_shape(a) else {
        return false;
    };
    let mut vars = FreshVarAllocator::new();
    let (b_opened, _) = open_type(b, &mut vars);
    let Some((_, b_params)) = callable_shape(&b_opened) else {
        return false;
    };
    if a_params.len() != b_params.len() {
        return false;
    }

    let a_tuple = params_tuple(&a_params);
    let b_tuple = params_tuple(&b_params);

    let goal = Goal::new(
        GoalKind::Subtyping {
            lhs: a_tuple,
            rhs: b_tuple,
            strict: true,
        },
        GoalOrigin::new(Site::default(), OriginKind::Structural),
    );
    let system = ConstraintSystem::new(scope, vec![goal], HashMap::new()).with_fresh_vars(vars);
    system.solve(querier).is_sound()
}

/// Bundle parameter bare types into a tuple for the subtyping probe.
fn params_tuple(params: &[CallableParam]) -> Type {
    Type::tuple(
        params
            .iter()
            .map(|p| {
                let bare = match p.ty.kind() {
                    TypeKind::Parameter(pt) => pt.bare.clone(),
                    _ => p.ty.clone(),
                };
                TupleElement {
                    label: p.label.clone(),
                    ty: bare,
                }
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use vela_shared::{
        access::AccessEffect,
        decl::{DeclId, DeclRef},
        node_id::ExprId,
        scope::ScopeId,
        ty::{CallableParam, Type},
    };

    use crate::{
        mocks::MockQuerier,
        solution::{Score, Solution},
        subst::SubstitutionMap,
    };

    use super::{compare, SolutionOrdering};

    fn callable(param: Type) -> Type {
        Type::thin_lambda(
            vec![CallableParam::new(
                Some("x".into()),
                Type::parameter(AccessEffect::Let, param),
            )],
            Type::word(),
        )
    }

    fn solution_binding(expr: ExprId, decl: DeclId) -> Solution {
        let mut bindings = HashMap::new();
        bindings.insert(expr, DeclRef::new(decl));
        Solution::new(
            SubstitutionMap::new(),
            bindings,
            Score::ZERO,
            Default::default(),
            vec![],
        )
    }

    #[test]
    fn specificity_is_antisymmetric() {
        let int = Type::product(DeclId(1), "Int");
        let bool_ty = Type::product(DeclId(2), "Bool");

        let specific = DeclId(10);
        let general = DeclId(11);
        let mut querier = MockQuerier::new();
        querier.add_decl(specific, "f", callable(int.clone()));
        querier.add_decl(general, "f", callable(Type::union(vec![int, bool_ty])));

        let expr = ExprId(0);
        let a = solution_binding(expr, specific);
        let b = solution_binding(expr, general);

        assert_eq!(compare(&a, &b, ScopeId(0), &querier), SolutionOrdering::Finer);
        assert_eq!(compare(&b, &a, ScopeId(0), &querier), SolutionOrdering::Coarser);
    }

    #[test]
    fn equal_types_with_distinct_declarations_are_incomparable() {
        let int = Type::product(DeclId(1), "Int");
        let first = DeclId(10);
        let second = DeclId(11);
        let mut querier = MockQuerier::new();
        querier.add_decl(first, "f", callable(int.clone()));
        querier.add_decl(second, "f", callable(int));

        let expr = ExprId(0);
        let a = solution_binding(expr, first);
        let b = solution_binding(expr, second);

        assert_eq!(
            compare(&a, &b, ScopeId(0), &querier),
            SolutionOrdering::Incomparable
        );
        assert_eq!(
            compare(&b, &a, ScopeId(0), &querier),
            SolutionOrdering::Incomparable
        );
    }
}
