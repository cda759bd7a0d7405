use serde::{Deserialize, Serialize};

/// The machine-level types the language exposes directly.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum BuiltinType {
    /// Machine integer with the given bit width, e.g. `i1`, `i64`.
    I(u32),
    /// Pointer-sized unsigned integer.
    Word,
    Float64,
    Ptr,
    /// The type of the built-in module itself.
    Module,
}

impl std::fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuiltinType::I(width) => write!(f, "i{}", width),
            BuiltinType::Word => write!(f, "word"),
            BuiltinType::Float64 => write!(f, "float64"),
            BuiltinType::Ptr => write!(f, "ptr"),
            BuiltinType::Module => write!(f, "module"),
        }
    }
}

/// Concepts the solver knows structural rules for.
///
/// Conformance to any other concept must be declared explicitly; these two
/// additionally admit the structural decomposition described by the
/// conformance rules (tuples and unions conform element-wise to *movable*;
/// only built-ins are *foreign-convertible*).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum BuiltinConcept {
    Movable,
    ForeignConvertible,
}

impl std::fmt::Display for BuiltinConcept {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuiltinConcept::Movable => write!(f, "Movable"),
            BuiltinConcept::ForeignConvertible => write!(f, "ForeignConvertible"),
        }
    }
}
