//! The error kinds the solver and its callers report.

use vela_shared::{
    decl::Name,
    diag::Diagnostic,
    site::Site,
    ty::{CallableStyle, Type},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeErrorKind {
    /// Incompatible types, reported with both reified under the final
    /// substitution.
    Unification(Type, Type),
    /// The model does not conform to the concept.
    Conformance(Type, Name),
    CannotInitializeWith(Type, Type),
    DoesNotMatchPattern(Type, Type),
    NotStrictSubtype(Type, Type),
    NotSubtype(Type, Type),
    /// Cannot pass a value of the first type to a parameter of the second.
    ParameterPassing(Type, Type),
    InvalidParameterType(Type),
    UndefinedName(Name),
    NoViableCandidate(Name),
    AmbiguousUse(Name),
    AmbiguousDisjunction,
    BranchesMismatch(Type, Type),
    /// The callee is not callable with the given application style.
    NotCallable(Type, CallableStyle),
    LabelMismatch { found: String, expected: String },
    TupleIndexOutOfRange(Type, usize),
    /// Not enough context remained to decide the goal.
    StaleGoal(String),
    ComplexReturnType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub site: Site,
}

impl TypeError {
    pub fn new(kind: TypeErrorKind, site: Site) -> TypeError {
        TypeError { kind, site }
    }

    pub fn message(&self) -> String {
        match &self.kind {
            TypeErrorKind::Unification(a, b) => {
                format!("incompatible types `{}` and `{}`", a, b)
            }
            TypeErrorKind::Conformance(model, concept) => {
                format!("type `{}` does not conform to `{}`", model, concept)
            }
            TypeErrorKind::CannotInitializeWith(target, source) => {
                format!("cannot initialize value of type `{}` with `{}`", target, source)
            }
            TypeErrorKind::DoesNotMatchPattern(ty, pattern) => {
                format!("value of type `{}` does not match pattern of type `{}`", ty, pattern)
            }
            TypeErrorKind::NotStrictSubtype(a, b) => {
                format!("type `{}` is not strictly subordinate to `{}`", a, b)
            }
            TypeErrorKind::NotSubtype(a, b) => {
                format!("type `{}` is not subtype of `{}`", a, b)
            }
            TypeErrorKind::ParameterPassing(a, b) => {
                format!("cannot pass value of type `{}` to parameter `{}`", a, b)
            }
            TypeErrorKind::InvalidParameterType(t) => {
                format!("invalid parameter type `{}`", t)
            }
            TypeErrorKind::UndefinedName(name) => format!("undefined name '{}'", name),
            TypeErrorKind::NoViableCandidate(name) => {
                format!("no viable candidate for '{}'", name)
            }
            TypeErrorKind::AmbiguousUse(name) => format!("ambiguous use of '{}'", name),
            TypeErrorKind::AmbiguousDisjunction => "ambiguous expression".to_string(),
            TypeErrorKind::BranchesMismatch(a, b) => {
                format!("conditional branches have mismatching types `{}` and `{}`", a, b)
            }
            TypeErrorKind::NotCallable(ty, style) => match style {
                CallableStyle::Arrow => {
                    format!("cannot call value of type `{}` as a function", ty)
                }
                CallableStyle::Subscript => {
                    format!("cannot call value of type `{}` as a subscript", ty)
                }
            },
            TypeErrorKind::LabelMismatch { found, expected } => {
                format!("incompatible labels: found '{}', expected '{}'", found, expected)
            }
            TypeErrorKind::TupleIndexOutOfRange(ty, index) => {
                format!("tuple `{}` has no element at index {}", ty, index)
            }
            TypeErrorKind::StaleGoal(goal) => {
                format!("not enough context to solve constraint '{}'", goal)
            }
            TypeErrorKind::ComplexReturnType => {
                "cannot infer complex return type; add an explicit return type annotation"
                    .to_string()
            }
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        let message = self.message();
        Diagnostic::error(message, self.site)
    }
}

impl std::fmt::Display for TypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.site, self.message())
    }
}
