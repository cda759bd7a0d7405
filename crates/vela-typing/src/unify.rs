//! Unification over substituted views.
//!
//! Unification walks both sides under the current substitution; when either
//! side is an unbound variable it assumes the variable equals the other side.
//! Every assumption made is appended to `assumed` so the caller can awaken
//! stale goals whose types changed under the new assignments.

use vela_shared::ty::{ExistentialInterface, Type, TypeKind, TypeVar};

use crate::subst::{SubstitutionMap, Unresolved};

pub fn unify(
    lhs: &Type,
    rhs: &Type,
    subst: &mut SubstitutionMap,
    assumed: &mut Vec<TypeVar>,
) -> bool {
    let l = subst.reify(lhs, Unresolved::Kept);
    let r = subst.reify(rhs, Unresolved::Kept);

    if l == r {
        return true;
    }

    match (l.kind(), r.kind()) {
        // Error types are compatible with everything so that one failure
        // does not cascade.
        (TypeKind::Error, _) | (_, TypeKind::Error) => true,

        (TypeKind::Var(v), _) => assume(*v, &r, subst, assumed),
        (_, TypeKind::Var(v)) => assume(*v, &l, subst, assumed),

        // Aliases are transparent to unification.
        (TypeKind::Alias(a), _) => unify(&a.aliasee, &r, subst, assumed),
        (_, TypeKind::Alias(b)) => unify(&l, &b.aliasee, subst, assumed),

        (TypeKind::Tuple(a), TypeKind::Tuple(b)) => {
            a.elements.len() == b.elements.len()
                && a.elements.iter().zip(b.elements.iter()).all(|(x, y)| {
                    x.label == y.label && unify(&x.ty, &y.ty, subst, assumed)
                })
        }

        // A singleton union is its member.
        (TypeKind::Union(a), _) if a.members.len() == 1 => {
            unify(&a.members[0], &r, subst, assumed)
        }
        (_, TypeKind::Union(b)) if b.members.len() == 1 => {
            unify(&l, &b.members[0], subst, assumed)
        }

        (TypeKind::Union(a), TypeKind::Union(b)) => {
            if a.members.len() != b.members.len() {
                return false;
            }
            // Unions are unordered; compare in canonical member order.
            let mut xs = a.members.clone();
            let mut ys = b.members.clone();
            xs.sort();
            ys.sort();
            xs.iter().zip(ys.iter()).all(|(x, y)| unify(x, y, subst, assumed))
        }

        (TypeKind::Lambda(a), TypeKind::Lambda(b)) => {
            a.style == b.style
                && a.inputs.len() == b.inputs.len()
                && a.inputs
                    .iter()
                    .zip(b.inputs.iter())
                    .all(|(x, y)| x.label == y.label)
                && unify(&a.environment, &b.environment, subst, assumed)
                && a.inputs
                    .iter()
                    .zip(b.inputs.iter())
                    .all(|(x, y)| unify(&x.ty, &y.ty, subst, assumed))
                && unify(&a.output, &b.output, subst, assumed)
        }

        (TypeKind::Method(a), TypeKind::Method(b)) => {
            a.capabilities == b.capabilities
                && a.inputs.len() == b.inputs.len()
                && a.inputs
                    .iter()
                    .zip(b.inputs.iter())
                    .all(|(x, y)| x.label == y.label)
                && unify(&a.receiver, &b.receiver, subst, assumed)
                && a.inputs
                    .iter()
                    .zip(b.inputs.iter())
                    .all(|(x, y)| unify(&x.ty, &y.ty, subst, assumed))
                && unify(&a.output, &b.output, subst, assumed)
        }

        (TypeKind::Parameter(a), TypeKind::Parameter(b)) => {
            a.access == b.access && unify(&a.bare, &b.bare, subst, assumed)
        }

        (TypeKind::Remote(a), TypeKind::Remote(b)) => {
            a.access == b.access && unify(&a.bare, &b.bare, subst, assumed)
        }

        (TypeKind::Metatype(a), TypeKind::Metatype(b)) => unify(a, b, subst, assumed),

        (TypeKind::Existential(a), TypeKind::Existential(b)) => {
            match (&a.interface, &b.interface) {
                (ExistentialInterface::Traits(x), ExistentialInterface::Traits(y)) => {
                    let mut xs = x.clone();
                    let mut ys = y.clone();
                    xs.sort();
                    ys.sort();
                    xs == ys
                }
                (ExistentialInterface::Generic(x), ExistentialInterface::Generic(y)) => {
                    unify(x, y, subst, assumed)
                }
                (ExistentialInterface::Metatype, ExistentialInterface::Metatype) => true,
                _ => false,
            }
        }

        // Bound-generic argument maps are checked element-wise against
        // matching keys.
        (TypeKind::BoundGeneric(a), TypeKind::BoundGeneric(b)) => {
            if a.args.len() != b.args.len() {
                return false;
            }
            if !unify(&a.base, &b.base, subst, assumed) {
                return false;
            }
            a.args.iter().all(|x| {
                b.args
                    .iter()
                    .find(|y| y.key == x.key)
                    .is_some_and(|y| unify(&x.value, &y.value, subst, assumed))
            })
        }

        (TypeKind::GenericParam(a), TypeKind::GenericParam(b)) => a.decl == b.decl,
        (TypeKind::Product(a), TypeKind::Product(b)) => a.decl == b.decl,
        (TypeKind::Builtin(a), TypeKind::Builtin(b)) => a == b,

        _ => false,
    }
}

fn assume(
    var: TypeVar,
    ty: &Type,
    subst: &mut SubstitutionMap,
    assumed: &mut Vec<TypeVar>,
) -> bool {
    // Occurs check: a variable cannot equal a term containing it.
    if ty.contains_variable() && ty.vars().contains(&var) {
        return false;
    }
    subst.assign(var, ty.clone());
    assumed.push(var);
    true
}

#[cfg(test)]
mod tests {
    use vela_shared::{
        access::AccessEffect,
        ty::{CallableParam, Type, TypeVar},
    };

    use crate::subst::{SubstitutionMap, Unresolved};

    use super::unify;

    #[test]
    fn unify_assumes_unbound_variables() {
        let mut subst = SubstitutionMap::new();
        let mut assumed = vec![];
        assert!(unify(
            &Type::var(TypeVar(0)),
            &Type::word(),
            &mut subst,
            &mut assumed
        ));
        assert_eq!(assumed, vec![TypeVar(0)]);
        assert_eq!(subst.reified_var(TypeVar(0), Unresolved::Kept), Type::word());
    }

    #[test]
    fn unify_decomposes_callables_and_requires_matching_effects() {
        let mut subst = SubstitutionMap::new();
        let mut assumed = vec![];

        let a = Type::thin_lambda(
            vec![CallableParam::new(
                Some("x".into()),
                Type::parameter(AccessEffect::Sink, Type::var(TypeVar(0))),
            )],
            Type::word(),
        );
        let b = Type::thin_lambda(
            vec![CallableParam::new(
                Some("x".into()),
                Type::parameter(AccessEffect::Sink, Type::word()),
            )],
            Type::word(),
        );
        assert!(unify(&a, &b, &mut subst, &mut assumed));

        let c = Type::thin_lambda(
            vec![CallableParam::new(
                Some("x".into()),
                Type::parameter(AccessEffect::Let, Type::word()),
            )],
            Type::word(),
        );
        assert!(!unify(&b, &c, &mut subst, &mut assumed));
    }

    #[test]
    fn unify_rejects_occurs_violations() {
        let mut subst = SubstitutionMap::new();
        let mut assumed = vec![];
        let v = Type::var(TypeVar(1));
        let recursive = Type::union(vec![Type::word(), v.clone()]);
        assert!(!unify(&v, &recursive, &mut subst, &mut assumed));
    }

    #[test]
    fn unify_label_mismatch_fails() {
        let mut subst = SubstitutionMap::new();
        let mut assumed = vec![];
        let a = Type::thin_lambda(
            vec![CallableParam::new(Some("x".into()), Type::word())],
            Type::word(),
        );
        let b = Type::thin_lambda(
            vec![CallableParam::new(Some("y".into()), Type::word())],
            Type::word(),
        );
        assert!(!unify(&a, &b, &mut subst, &mut assumed));
    }
}
