//! Front-end helpers for typing lambda literals.

use vela_shared::{
    site::Site,
    ty::{CallableParam, CallableStyle, FreshVarAllocator, Type},
};

use crate::error::{TypeError, TypeErrorKind};

/// The shape of a lambda literal's body, as far as return-type inference is
/// concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LambdaBody {
    /// A single expression; its type is the return type.
    SingleExpression,
    /// A block of statements.
    Block { is_empty: bool },
}

/// The type a lambda literal is checked against.
///
/// When the literal declares no output, the return type can only be inferred
/// from a single-expression body (as the unit type for an empty block); a
/// nonempty block requires an annotation.
pub fn lambda_literal_type(
    inputs: Vec<CallableParam>,
    declared_output: Option<Type>,
    body: LambdaBody,
    site: Site,
    vars: &mut FreshVarAllocator,
) -> Result<Type, TypeError> {
    let output = match declared_output {
        Some(output) => output,
        None => match body {
            LambdaBody::SingleExpression => Type::var(vars.alloc()),
            LambdaBody::Block { is_empty: true } => Type::unit(),
            LambdaBody::Block { is_empty: false } => {
                return Err(TypeError::new(TypeErrorKind::ComplexReturnType, site));
            }
        },
    };
    Ok(Type::lambda(
        CallableStyle::Arrow,
        Type::unit(),
        inputs,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use vela_shared::{
        access::AccessEffect,
        site::Site,
        ty::{CallableParam, FreshVarAllocator, Type},
    };

    use crate::error::TypeErrorKind;

    use super::{lambda_literal_type, LambdaBody};

    fn sink_word_input() -> CallableParam {
        CallableParam::new(
            Some("x".into()),
            Type::parameter(AccessEffect::Sink, Type::word()),
        )
    }

    #[test]
    fn single_expression_body_opens_the_output() {
        let mut vars = FreshVarAllocator::new();
        let ty = lambda_literal_type(
            vec![sink_word_input()],
            None,
            LambdaBody::SingleExpression,
            Site::default(),
            &mut vars,
        )
        .expect("inferable");
        assert!(ty.contains_variable());
    }

    #[test]
    fn nonempty_block_without_annotation_is_rejected() {
        let mut vars = FreshVarAllocator::new();
        let err = lambda_literal_type(
            vec![sink_word_input()],
            None,
            LambdaBody::Block { is_empty: false },
            Site::default(),
            &mut vars,
        )
        .expect_err("needs annotation");
        assert_eq!(err.kind, TypeErrorKind::ComplexReturnType);
        assert_eq!(
            err.message(),
            "cannot infer complex return type; add an explicit return type annotation"
        );
    }
}
