//! The ambient type relations: canonicalization and equivalence.

use std::collections::BTreeSet;

use vela_shared::{
    decl::DeclId,
    ty::{
        ExistentialInterface, GenericArgument, Type, TypeKind,
    },
};

/// Canonicalization and equivalence under the ambient relations.
///
/// Canonical forms expand aliases and order the unordered constructors
/// (union members, bound-generic argument maps, existential trait sets).
/// Cyclic references through generic arguments are treated as fixed points,
/// never as errors.
#[derive(Clone, Debug, Default)]
pub struct TypeRelations;

impl TypeRelations {
    pub fn new() -> TypeRelations {
        TypeRelations
    }

    /// The unique representative of `ty`'s equivalence class.
    pub fn canonical(&self, ty: &Type) -> Type {
        if ty.is_canonical() {
            return ty.clone();
        }
        let mut in_progress = BTreeSet::new();
        self.canonical_impl(ty, &mut in_progress)
    }

    pub fn are_equivalent(&self, a: &Type, b: &Type) -> bool {
        a == b || self.canonical(a) == self.canonical(b)
    }

    fn canonical_impl(&self, ty: &Type, in_progress: &mut BTreeSet<DeclId>) -> Type {
        if ty.is_canonical() {
            return ty.clone();
        }
        match ty.kind() {
            TypeKind::Alias(a) => {
                // Re-entering an alias under expansion is a cycle; leave the
                // node in place as its own fixed point.
                if !in_progress.insert(a.decl) {
                    return ty.clone();
                }
                let out = self.canonical_impl(&a.aliasee, in_progress);
                in_progress.remove(&a.decl);
                out
            }
            TypeKind::Union(u) => {
                let mut members = u
                    .members
                    .iter()
                    .map(|m| self.canonical_impl(m, in_progress))
                    .collect::<Vec<_>>();
                members.sort();
                members.dedup();
                // A union of one member is that member.
                if members.len() == 1 {
                    return members.pop().expect("one member");
                }
                Type::union(members)
            }
            TypeKind::BoundGeneric(b) => {
                let base = self.canonical_impl(&b.base, in_progress);
                let mut args = b
                    .args
                    .iter()
                    .map(|a| GenericArgument {
                        key: a.key,
                        value: self.canonical_impl(&a.value, in_progress),
                    })
                    .collect::<Vec<_>>();
                args.sort_by_key(|a| a.key);
                Type::bound_generic(base, args)
            }
            TypeKind::Existential(e) => match &e.interface {
                ExistentialInterface::Traits(traits) => {
                    let mut sorted = traits.clone();
                    sorted.sort();
                    sorted.dedup();
                    Type::existential(ExistentialInterface::Traits(sorted))
                }
                ExistentialInterface::Generic(t) => Type::existential(
                    ExistentialInterface::Generic(self.canonical_impl(t, in_progress)),
                ),
                ExistentialInterface::Metatype => ty.clone(),
            },
            TypeKind::Tuple(t) => Type::tuple(
                t.elements
                    .iter()
                    .map(|e| vela_shared::ty::TupleElement {
                        label: e.label.clone(),
                        ty: self.canonical_impl(&e.ty, in_progress),
                    })
                    .collect(),
            ),
            TypeKind::Lambda(l) => Type::lambda(
                l.style,
                self.canonical_impl(&l.environment, in_progress),
                self.canonical_params(&l.inputs, in_progress),
                self.canonical_impl(&l.output, in_progress),
            ),
            TypeKind::Method(m) => Type::method(
                self.canonical_impl(&m.receiver, in_progress),
                self.canonical_params(&m.inputs, in_progress),
                self.canonical_impl(&m.output, in_progress),
                m.capabilities,
            ),
            TypeKind::Parameter(p) => {
                Type::parameter(p.access, self.canonical_impl(&p.bare, in_progress))
            }
            TypeKind::Remote(r) => {
                Type::remote(r.access, self.canonical_impl(&r.bare, in_progress))
            }
            TypeKind::Metatype(t) => Type::metatype(self.canonical_impl(t, in_progress)),
            // Leaves are always canonical; reaching here means the flag was
            // conservative. Return the term unchanged.
            _ => ty.clone(),
        }
    }

    fn canonical_params(
        &self,
        inputs: &[vela_shared::ty::CallableParam],
        in_progress: &mut BTreeSet<DeclId>,
    ) -> Vec<vela_shared::ty::CallableParam> {
        inputs
            .iter()
            .map(|p| vela_shared::ty::CallableParam {
                label: p.label.clone(),
                ty: self.canonical_impl(&p.ty, in_progress),
                has_default: p.has_default,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use vela_shared::{
        decl::DeclId,
        ty::{GenericArgument, Type},
    };

    use super::TypeRelations;

    #[test]
    fn canonical_expands_aliases() {
        let relations = TypeRelations::new();
        let int = Type::alias(DeclId(0), "Int", Type::word());
        assert_eq!(relations.canonical(&int), Type::word());
        assert!(relations.are_equivalent(&int, &Type::word()));
    }

    #[test]
    fn canonical_orders_union_members() {
        let relations = TypeRelations::new();
        let a = Type::product(DeclId(1), "A");
        let b = Type::product(DeclId(2), "B");
        let u1 = Type::union(vec![b.clone(), a.clone()]);
        let u2 = Type::union(vec![a, b]);
        assert!(relations.are_equivalent(&u1, &u2));
    }

    #[test]
    fn cyclic_alias_is_a_fixed_point() {
        let relations = TypeRelations::new();
        // A cycle `alias Loop = Loop` cannot be built without interning, so
        // approximate it with an alias whose aliasee is another alias of the
        // same declaration.
        let inner = Type::alias(DeclId(9), "Loop", Type::word());
        let outer = Type::alias(DeclId(9), "Loop", inner.clone());
        // Expansion stops at the re-entered declaration instead of looping.
        assert_eq!(relations.canonical(&outer), inner);
    }

    #[test]
    fn canonical_sorts_bound_generic_arguments() {
        let relations = TypeRelations::new();
        let base = Type::product(DeclId(3), "Pair");
        let args = vec![
            GenericArgument {
                key: DeclId(11),
                value: Type::word(),
            },
            GenericArgument {
                key: DeclId(10),
                value: Type::float64(),
            },
        ];
        let t = Type::bound_generic(base, args);
        assert!(!t.is_canonical());
        assert!(relations.canonical(&t).is_canonical());
    }
}
