use std::collections::BTreeSet;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::{
    access::{AccessEffect, AccessEffectSet},
    builtins::BuiltinType,
    decl::{DeclId, Name},
    ty::TypeVar,
};

/// Structural properties of a type, computed once at construction as
/// conservative unions over subterms. `CANONICAL` may be absent from a type
/// that happens to be canonical; it is never present on one that is not.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TypeFlags(u8);

impl TypeFlags {
    pub const CANONICAL: TypeFlags = TypeFlags(0b001);
    pub const HAS_VARIABLE: TypeFlags = TypeFlags(0b010);
    pub const HAS_ERROR: TypeFlags = TypeFlags(0b100);

    pub fn empty() -> TypeFlags {
        TypeFlags(0)
    }

    pub fn contains(self, other: TypeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn inserting(self, other: TypeFlags) -> TypeFlags {
        TypeFlags(self.0 | other.0)
    }

    pub fn removing(self, other: TypeFlags) -> TypeFlags {
        TypeFlags(self.0 & !other.0)
    }

    /// Combine the flags of a subterm into those of its parent: canonicity
    /// intersects, the taint flags union.
    pub fn merging(self, child: TypeFlags) -> TypeFlags {
        let mut out = TypeFlags(self.0 | (child.0 & !Self::CANONICAL.0));
        if !child.contains(Self::CANONICAL) {
            out = out.removing(Self::CANONICAL);
        }
        out
    }
}

/// A labeled element of a tuple type.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TupleElement {
    pub label: Option<Name>,
    pub ty: Type,
}

/// A parameter of a lambda or method type.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallableParam {
    pub label: Option<Name>,
    pub ty: Type,
    pub has_default: bool,
}

impl CallableParam {
    pub fn new(label: Option<Name>, ty: Type) -> CallableParam {
        CallableParam {
            label,
            ty,
            has_default: false,
        }
    }

    pub fn with_default(label: Option<Name>, ty: Type) -> CallableParam {
        CallableParam {
            label,
            ty,
            has_default: true,
        }
    }
}

/// Whether a callable is applied with function or subscript syntax.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum CallableStyle {
    Arrow,
    Subscript,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GenericParamType {
    pub decl: DeclId,
    pub name: Name,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductType {
    pub decl: DeclId,
    pub name: Name,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AliasType {
    pub decl: DeclId,
    pub name: Name,
    pub aliasee: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TupleType {
    pub elements: Vec<TupleElement>,
}

/// An unordered set of member types; the empty union is `Never`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnionType {
    pub members: Vec<Type>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LambdaType {
    pub style: CallableStyle,
    pub environment: Type,
    pub inputs: Vec<CallableParam>,
    pub output: Type,
}

impl LambdaType {
    /// The argument labels, rendered the way diagnostics expect them:
    /// `(x:y:)`, with `_` for unlabeled positions.
    pub fn labels(&self) -> String {
        labels_of(&self.inputs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodType {
    pub receiver: Type,
    pub inputs: Vec<CallableParam>,
    pub output: Type,
    pub capabilities: AccessEffectSet,
}

impl MethodType {
    pub fn labels(&self) -> String {
        labels_of(&self.inputs)
    }
}

/// Render a parameter list's labels the way diagnostics expect them:
/// `(x:y:)`, with `_` for unlabeled positions.
pub fn labels_of(inputs: &[CallableParam]) -> String {
    let mut out = String::from("(");
    for input in inputs {
        match &input.label {
            Some(l) => out.push_str(l.as_str()),
            None => out.push('_'),
        }
        out.push(':');
    }
    out.push(')');
    out
}

/// The type of a parameter as seen across a call boundary.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParameterType {
    pub access: AccessEffect,
    pub bare: Type,
}

/// A projection handle: the type of a value borrowed out of a subscript.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemoteType {
    pub access: AccessEffect,
    pub bare: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExistentialInterface {
    /// A set of traits the witness conforms to.
    Traits(Vec<DeclId>),
    /// A (possibly bound) generic base the witness instantiates.
    Generic(Type),
    /// Any metatype.
    Metatype,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExistentialType {
    pub interface: ExistentialInterface,
}

/// An argument in a bound generic's parameter-to-argument map.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GenericArgument {
    pub key: DeclId,
    pub value: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BoundGenericType {
    pub base: Type,
    pub args: Vec<GenericArgument>,
}

/// The shape of a type. Constructed only through [`Type`]'s constructors so
/// that flags stay consistent.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Var(TypeVar),
    GenericParam(GenericParamType),
    Product(ProductType),
    Alias(AliasType),
    Tuple(TupleType),
    Union(UnionType),
    Lambda(LambdaType),
    Method(MethodType),
    Parameter(ParameterType),
    Remote(RemoteType),
    Metatype(Type),
    Existential(ExistentialType),
    BoundGeneric(BoundGenericType),
    Builtin(BuiltinType),
    Error,
}

/// A type term.
///
/// The handle is a cheap clone (the solver forks its whole state for every
/// disjunction choice); the kind and flags behind it are immutable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Type {
    inner: Rc<TypeInner>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TypeInner {
    kind: TypeKind,
    flags: TypeFlags,
}

impl PartialEq for Type {
    fn eq(&self, other: &Type) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner) || self.kind() == other.kind()
    }
}

impl Eq for Type {}

impl PartialOrd for Type {
    fn partial_cmp(&self, other: &Type) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Type {
    fn cmp(&self, other: &Type) -> std::cmp::Ordering {
        self.kind().cmp(other.kind())
    }
}

impl std::hash::Hash for Type {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
    }
}

impl Default for Type {
    fn default() -> Type {
        Type::never()
    }
}

impl Type {
    pub fn new(kind: TypeKind) -> Type {
        let flags = flags_of(&kind);
        Type {
            inner: Rc::new(TypeInner { kind, flags }),
        }
    }

    pub fn kind(&self) -> &TypeKind {
        &self.inner.kind
    }

    pub fn flags(&self) -> TypeFlags {
        self.inner.flags
    }

    pub fn is_canonical(&self) -> bool {
        self.flags().contains(TypeFlags::CANONICAL)
    }

    pub fn contains_variable(&self) -> bool {
        self.flags().contains(TypeFlags::HAS_VARIABLE)
    }

    pub fn contains_error(&self) -> bool {
        self.flags().contains(TypeFlags::HAS_ERROR)
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind(), TypeKind::Var(_))
    }

    pub fn as_variable(&self) -> Option<TypeVar> {
        match self.kind() {
            TypeKind::Var(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind(), TypeKind::Error)
    }

    pub fn is_never(&self) -> bool {
        matches!(self.kind(), TypeKind::Union(u) if u.members.is_empty())
    }

    pub fn is_unit(&self) -> bool {
        matches!(self.kind(), TypeKind::Tuple(t) if t.elements.is_empty())
    }

    /// Whether the type has no structure unification could refine.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self.kind(),
            TypeKind::GenericParam(_)
                | TypeKind::Product(_)
                | TypeKind::Builtin(_)
                | TypeKind::Error
        )
    }

    // Constructors.

    pub fn var(v: TypeVar) -> Type {
        Type::new(TypeKind::Var(v))
    }

    pub fn generic_param(decl: DeclId, name: impl Into<Name>) -> Type {
        Type::new(TypeKind::GenericParam(GenericParamType {
            decl,
            name: name.into(),
        }))
    }

    pub fn product(decl: DeclId, name: impl Into<Name>) -> Type {
        Type::new(TypeKind::Product(ProductType {
            decl,
            name: name.into(),
        }))
    }

    pub fn alias(decl: DeclId, name: impl Into<Name>, aliasee: Type) -> Type {
        Type::new(TypeKind::Alias(AliasType {
            decl,
            name: name.into(),
            aliasee,
        }))
    }

    pub fn tuple(elements: Vec<TupleElement>) -> Type {
        Type::new(TypeKind::Tuple(TupleType { elements }))
    }

    /// Unit type `()`, the empty tuple.
    pub fn unit() -> Type {
        Type::tuple(vec![])
    }

    pub fn union(members: Vec<Type>) -> Type {
        Type::new(TypeKind::Union(UnionType { members }))
    }

    /// `Never`, the empty union.
    pub fn never() -> Type {
        Type::union(vec![])
    }

    pub fn lambda(
        style: CallableStyle,
        environment: Type,
        inputs: Vec<CallableParam>,
        output: Type,
    ) -> Type {
        Type::new(TypeKind::Lambda(LambdaType {
            style,
            environment,
            inputs,
            output,
        }))
    }

    /// An arrow lambda with an empty environment.
    pub fn thin_lambda(inputs: Vec<CallableParam>, output: Type) -> Type {
        Type::lambda(CallableStyle::Arrow, Type::unit(), inputs, output)
    }

    pub fn method(
        receiver: Type,
        inputs: Vec<CallableParam>,
        output: Type,
        capabilities: AccessEffectSet,
    ) -> Type {
        Type::new(TypeKind::Method(MethodType {
            receiver,
            inputs,
            output,
            capabilities,
        }))
    }

    pub fn parameter(access: AccessEffect, bare: Type) -> Type {
        Type::new(TypeKind::Parameter(ParameterType { access, bare }))
    }

    pub fn remote(access: AccessEffect, bare: Type) -> Type {
        Type::new(TypeKind::Remote(RemoteType { access, bare }))
    }

    pub fn metatype(instance: Type) -> Type {
        Type::new(TypeKind::Metatype(instance))
    }

    pub fn existential(interface: ExistentialInterface) -> Type {
        Type::new(TypeKind::Existential(ExistentialType { interface }))
    }

    pub fn bound_generic(base: Type, args: Vec<GenericArgument>) -> Type {
        Type::new(TypeKind::BoundGeneric(BoundGenericType { base, args }))
    }

    pub fn builtin(b: BuiltinType) -> Type {
        Type::new(TypeKind::Builtin(b))
    }

    pub fn word() -> Type {
        Type::builtin(BuiltinType::Word)
    }

    pub fn float64() -> Type {
        Type::builtin(BuiltinType::Float64)
    }

    pub fn ptr() -> Type {
        Type::builtin(BuiltinType::Ptr)
    }

    pub fn i(width: u32) -> Type {
        Type::builtin(BuiltinType::I(width))
    }

    pub fn error() -> Type {
        Type::new(TypeKind::Error)
    }

    /// Collect every variable occurring in the term.
    pub fn collect_vars(&self, vars: &mut BTreeSet<TypeVar>) {
        match self.kind() {
            TypeKind::Var(v) => {
                vars.insert(*v);
            }
            TypeKind::GenericParam(_)
            | TypeKind::Product(_)
            | TypeKind::Builtin(_)
            | TypeKind::Error => {}
            TypeKind::Alias(a) => a.aliasee.collect_vars(vars),
            TypeKind::Tuple(t) => {
                for e in &t.elements {
                    e.ty.collect_vars(vars);
                }
            }
            TypeKind::Union(u) => {
                for m in &u.members {
                    m.collect_vars(vars);
                }
            }
            TypeKind::Lambda(l) => {
                l.environment.collect_vars(vars);
                for p in &l.inputs {
                    p.ty.collect_vars(vars);
                }
                l.output.collect_vars(vars);
            }
            TypeKind::Method(m) => {
                m.receiver.collect_vars(vars);
                for p in &m.inputs {
                    p.ty.collect_vars(vars);
                }
                m.output.collect_vars(vars);
            }
            TypeKind::Parameter(p) => p.bare.collect_vars(vars),
            TypeKind::Remote(r) => r.bare.collect_vars(vars),
            TypeKind::Metatype(t) => t.collect_vars(vars),
            TypeKind::Existential(e) => {
                if let ExistentialInterface::Generic(t) = &e.interface {
                    t.collect_vars(vars);
                }
            }
            TypeKind::BoundGeneric(b) => {
                b.base.collect_vars(vars);
                for a in &b.args {
                    a.value.collect_vars(vars);
                }
            }
        }
    }

    /// The variables occurring in the term.
    pub fn vars(&self) -> BTreeSet<TypeVar> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }
}

fn merge_all<'a>(base: TypeFlags, children: impl Iterator<Item = &'a Type>) -> TypeFlags {
    children.fold(base, |acc, c| acc.merging(c.flags()))
}

fn flags_of(kind: &TypeKind) -> TypeFlags {
    let canonical = TypeFlags::CANONICAL;
    match kind {
        TypeKind::Var(_) => canonical.inserting(TypeFlags::HAS_VARIABLE),
        TypeKind::GenericParam(_) | TypeKind::Product(_) | TypeKind::Builtin(_) => canonical,
        TypeKind::Error => canonical.inserting(TypeFlags::HAS_ERROR),
        // Aliases are transparent to the taint flags but never canonical.
        TypeKind::Alias(a) => a.aliasee.flags().removing(TypeFlags::CANONICAL),
        TypeKind::Tuple(t) => merge_all(canonical, t.elements.iter().map(|e| &e.ty)),
        TypeKind::Union(u) => {
            let mut flags = merge_all(canonical, u.members.iter());
            // A singleton union is equivalent to its member; only the
            // collapsed form is canonical.
            if u.members.len() == 1 || !is_sorted_strict(&u.members) {
                flags = flags.removing(TypeFlags::CANONICAL);
            }
            flags
        }
        TypeKind::Lambda(l) => {
            let flags = merge_all(canonical, l.inputs.iter().map(|p| &p.ty));
            flags
                .merging(l.environment.flags())
                .merging(l.output.flags())
        }
        TypeKind::Method(m) => {
            let flags = merge_all(canonical, m.inputs.iter().map(|p| &p.ty));
            flags.merging(m.receiver.flags()).merging(m.output.flags())
        }
        TypeKind::Parameter(p) => canonical.merging(p.bare.flags()),
        TypeKind::Remote(r) => canonical.merging(r.bare.flags()),
        TypeKind::Metatype(t) => canonical.merging(t.flags()),
        TypeKind::Existential(e) => match &e.interface {
            ExistentialInterface::Traits(traits) => {
                if traits.windows(2).all(|w| w[0] < w[1]) {
                    canonical
                } else {
                    TypeFlags::empty()
                }
            }
            ExistentialInterface::Generic(t) => canonical.merging(t.flags()),
            ExistentialInterface::Metatype => canonical,
        },
        TypeKind::BoundGeneric(b) => {
            let mut flags = merge_all(canonical, b.args.iter().map(|a| &a.value));
            flags = flags.merging(b.base.flags());
            if !b.args.windows(2).all(|w| w[0].key < w[1].key) {
                flags = flags.removing(TypeFlags::CANONICAL);
            }
            flags
        }
    }
}

fn is_sorted_strict(members: &[Type]) -> bool {
    members.windows(2).all(|w| w[0] < w[1])
}

fn fmt_params(f: &mut std::fmt::Formatter<'_>, inputs: &[CallableParam]) -> std::fmt::Result {
    for (i, p) in inputs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        match &p.label {
            Some(l) => write!(f, "{}: {}", l, p.ty)?,
            None => write!(f, "_: {}", p.ty)?,
        }
    }
    Ok(())
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind())
    }
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeKind::Var(v) => write!(f, "{}", v),
            TypeKind::GenericParam(p) => write!(f, "{}", p.name),
            TypeKind::Product(p) => write!(f, "{}", p.name),
            TypeKind::Alias(a) => write!(f, "{}", a.name),
            TypeKind::Tuple(t) => {
                write!(f, "(")?;
                for (i, e) in t.elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match &e.label {
                        Some(l) => write!(f, "{}: {}", l, e.ty)?,
                        None => write!(f, "{}", e.ty)?,
                    }
                }
                write!(f, ")")
            }
            TypeKind::Union(u) => {
                if u.members.is_empty() {
                    return write!(f, "Never");
                }
                write!(f, "Union<")?;
                for (i, m) in u.members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", m)?;
                }
                write!(f, ">")
            }
            TypeKind::Lambda(l) => {
                if l.environment.is_unit() {
                    write!(f, "[]")?;
                } else {
                    write!(f, "[{}]", l.environment)?;
                }
                write!(f, "(")?;
                fmt_params(f, &l.inputs)?;
                match l.style {
                    CallableStyle::Arrow => write!(f, ") -> {}", l.output),
                    CallableStyle::Subscript => write!(f, ") : {}", l.output),
                }
            }
            TypeKind::Method(m) => {
                write!(f, "method[{}](", m.receiver)?;
                fmt_params(f, &m.inputs)?;
                write!(f, ") -> {} {}", m.output, m.capabilities)
            }
            TypeKind::Parameter(p) => write!(f, "{} {}", p.access, p.bare),
            TypeKind::Remote(r) => write!(f, "remote {} {}", r.access, r.bare),
            TypeKind::Metatype(t) => write!(f, "Metatype<{}>", t),
            TypeKind::Existential(e) => match &e.interface {
                ExistentialInterface::Traits(traits) => {
                    write!(f, "any ")?;
                    for (i, t) in traits.iter().enumerate() {
                        if i > 0 {
                            write!(f, " & ")?;
                        }
                        write!(f, "{}", t)?;
                    }
                    Ok(())
                }
                ExistentialInterface::Generic(t) => write!(f, "any {}", t),
                ExistentialInterface::Metatype => write!(f, "any Metatype"),
            },
            TypeKind::BoundGeneric(b) => {
                write!(f, "{}<", b.base)?;
                for (i, a) in b.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a.value)?;
                }
                write!(f, ">")
            }
            TypeKind::Builtin(b) => write!(f, "{}", b),
            TypeKind::Error => write!(f, "{{error}}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{access::AccessEffect, decl::DeclId};

    use super::*;

    #[test]
    fn flags_propagate_from_subterms() {
        let v = Type::var(TypeVar(0));
        let t = Type::tuple(vec![
            TupleElement {
                label: None,
                ty: Type::word(),
            },
            TupleElement {
                label: None,
                ty: v,
            },
        ]);
        assert!(t.contains_variable());
        assert!(!t.contains_error());
        assert!(t.is_canonical());
    }

    #[test]
    fn unsorted_union_is_not_canonical() {
        let a = Type::product(DeclId(1), "A");
        let b = Type::product(DeclId(2), "B");
        let sorted = Type::union(vec![a.clone(), b.clone()]);
        let unsorted = Type::union(vec![b, a]);
        assert!(sorted.is_canonical());
        assert!(!unsorted.is_canonical());
    }

    #[test]
    fn alias_is_never_canonical() {
        let aliasee = Type::word();
        let alias = Type::alias(DeclId(3), "Int", aliasee);
        assert!(!alias.is_canonical());
        assert!(!alias.contains_variable());
    }

    #[test]
    fn lambda_display_shows_labels_and_effects() {
        let input = CallableParam::new(
            Some("x".into()),
            Type::parameter(AccessEffect::Sink, Type::word()),
        );
        let ty = Type::thin_lambda(vec![input], Type::word());
        assert_eq!(ty.to_string(), "[](x: sink word) -> word");
    }

    #[test]
    fn never_is_the_empty_union() {
        assert!(Type::never().is_never());
        assert_eq!(Type::never().to_string(), "Never");
    }
}
