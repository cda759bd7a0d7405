use crate::ty::{
    BoundGenericType, CallableParam, ExistentialInterface, ExistentialType, GenericArgument,
    LambdaType, MethodType, TupleElement, Type, TypeKind,
};

/// How a structural rewrite proceeds after visiting a term.
pub enum TransformAction {
    /// Replace the term with the payload, then recurse into its parts.
    StepInto(Type),
    /// Replace the term with the payload as-is.
    StepOver(Type),
}

impl Type {
    /// Rewrite the term bottom-up through `f`, threading `state` through the
    /// traversal. This is the single mechanism by which substitution,
    /// opening, and canonicalization rewrite types; variables are never
    /// mutated in place.
    pub fn transform<S, F>(&self, state: &mut S, f: &mut F) -> Type
    where
        F: FnMut(&mut S, &Type) -> TransformAction,
    {
        match f(state, self) {
            TransformAction::StepOver(t) => t,
            TransformAction::StepInto(t) => t.transform_parts(state, f),
        }
    }

    fn transform_parts<S, F>(&self, state: &mut S, f: &mut F) -> Type
    where
        F: FnMut(&mut S, &Type) -> TransformAction,
    {
        match self.kind() {
            TypeKind::Var(_)
            | TypeKind::GenericParam(_)
            | TypeKind::Product(_)
            | TypeKind::Builtin(_)
            | TypeKind::Error => self.clone(),
            TypeKind::Alias(a) => Type::alias(
                a.decl,
                a.name.clone(),
                a.aliasee.transform(state, f),
            ),
            TypeKind::Tuple(t) => Type::tuple(
                t.elements
                    .iter()
                    .map(|e| TupleElement {
                        label: e.label.clone(),
                        ty: e.ty.transform(state, f),
                    })
                    .collect(),
            ),
            TypeKind::Union(u) => {
                Type::union(u.members.iter().map(|m| m.transform(state, f)).collect())
            }
            TypeKind::Lambda(LambdaType {
                style,
                environment,
                inputs,
                output,
            }) => Type::lambda(
                *style,
                environment.transform(state, f),
                transform_params(inputs, state, f),
                output.transform(state, f),
            ),
            TypeKind::Method(MethodType {
                receiver,
                inputs,
                output,
                capabilities,
            }) => Type::method(
                receiver.transform(state, f),
                transform_params(inputs, state, f),
                output.transform(state, f),
                *capabilities,
            ),
            TypeKind::Parameter(p) => Type::parameter(p.access, p.bare.transform(state, f)),
            TypeKind::Remote(r) => Type::remote(r.access, r.bare.transform(state, f)),
            TypeKind::Metatype(t) => Type::metatype(t.transform(state, f)),
            TypeKind::Existential(ExistentialType { interface }) => match interface {
                ExistentialInterface::Generic(t) => Type::existential(
                    ExistentialInterface::Generic(t.transform(state, f)),
                ),
                other => Type::existential(other.clone()),
            },
            TypeKind::BoundGeneric(BoundGenericType { base, args }) => Type::bound_generic(
                base.transform(state, f),
                args.iter()
                    .map(|a| GenericArgument {
                        key: a.key,
                        value: a.value.transform(state, f),
                    })
                    .collect(),
            ),
        }
    }
}

fn transform_params<S, F>(inputs: &[CallableParam], state: &mut S, f: &mut F) -> Vec<CallableParam>
where
    F: FnMut(&mut S, &Type) -> TransformAction,
{
    inputs
        .iter()
        .map(|p| CallableParam {
            label: p.label.clone(),
            ty: p.ty.transform(state, f),
            has_default: p.has_default,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::{
        decl::DeclId,
        ty::{TransformAction, TupleElement, Type, TypeVar},
    };

    #[test]
    fn transform_rewrites_nested_variables() {
        let v = TypeVar(7);
        let t = Type::tuple(vec![TupleElement {
            label: None,
            ty: Type::union(vec![Type::var(v), Type::word()]),
        }]);

        let mut hits = 0usize;
        let out = t.transform(&mut hits, &mut |hits, t| {
            if t.as_variable() == Some(v) {
                *hits += 1;
                TransformAction::StepOver(Type::product(DeclId(1), "A"))
            } else {
                TransformAction::StepInto(t.clone())
            }
        });

        assert_eq!(hits, 1);
        assert!(!out.contains_variable());
    }
}
