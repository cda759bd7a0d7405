use serde::{Deserialize, Serialize};

use crate::ty::Type;

/// Identifies a declaration in the program.
///
/// DeclIds are structural: they are handed out by the front-end in source
/// order and remain stable across renames. The core never dereferences them
/// directly; it goes through the typed-program query surface.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DeclId(pub u32);

impl std::fmt::Display for DeclId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "decl{}", self.0)
    }
}

/// The name of a declaration or argument label.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Name(String);

impl Name {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Name {
        Name(s.to_string())
    }
}

impl From<String> for Name {
    fn from(s: String) -> Name {
        Name(s)
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reference to a declaration together with the generic arguments the use
/// site applies to it. Most references carry no specialization.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeclRef {
    pub decl: DeclId,
    pub specialization: Vec<(DeclId, Type)>,
}

impl DeclRef {
    pub fn new(decl: DeclId) -> DeclRef {
        DeclRef {
            decl,
            specialization: vec![],
        }
    }

    pub fn specialized(decl: DeclId, specialization: Vec<(DeclId, Type)>) -> DeclRef {
        DeclRef {
            decl,
            specialization,
        }
    }
}

impl std::fmt::Display for DeclRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.specialization.is_empty() {
            write!(f, "{}", self.decl)
        } else {
            let args = self
                .specialization
                .iter()
                .map(|(p, a)| format!("{}: {}", p, a))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, "{}<{}>", self.decl, args)
        }
    }
}
