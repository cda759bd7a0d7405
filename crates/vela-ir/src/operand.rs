use serde::{Deserialize, Serialize};

use vela_shared::ty::Type;

/// Index of an instruction in its function's arena.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct InstId(pub usize);

impl std::fmt::Display for InstId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Index of a block in its function.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockId(pub usize);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Index of a function in its module.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FunctionId(pub usize);

impl std::fmt::Display for FunctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// The type of an IR value: a language-level type, seen either as an object
/// or as the address of one.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IrType {
    pub ast: Type,
    pub is_address: bool,
}

impl IrType {
    pub fn object(ast: Type) -> IrType {
        IrType {
            ast,
            is_address: false,
        }
    }

    pub fn address(ast: Type) -> IrType {
        IrType {
            ast,
            is_address: true,
        }
    }
}

impl std::fmt::Display for IrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_address {
            write!(f, "&{}", self.ast)
        } else {
            write!(f, "{}", self.ast)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Constant {
    Word(i64),
    /// Bit pattern of an IEEE-754 double; stored raw so constants stay
    /// comparable and hashable.
    Float64(u64),
    Unit,
    /// A reference to another function in the module.
    Function(FunctionId),
}

impl Constant {
    pub fn ty(&self) -> IrType {
        match self {
            Constant::Word(_) => IrType::object(Type::word()),
            Constant::Float64(_) => IrType::object(Type::float64()),
            Constant::Unit => IrType::object(Type::unit()),
            Constant::Function(_) => IrType::object(Type::ptr()),
        }
    }
}

impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Word(n) => write!(f, "{}", n),
            Constant::Float64(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Constant::Unit => write!(f, "unit"),
            Constant::Function(id) => write!(f, "@{}", id),
        }
    }
}

/// The value an instruction consumes: the result of another instruction, a
/// block parameter, or a constant.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operand {
    Register(InstId),
    Parameter(BlockId, usize),
    Constant(Constant),
}

impl Operand {
    pub fn register(inst: InstId) -> Operand {
        Operand::Register(inst)
    }

    pub fn parameter(block: BlockId, index: usize) -> Operand {
        Operand::Parameter(block, index)
    }

    pub fn word(value: i64) -> Operand {
        Operand::Constant(Constant::Word(value))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Operand::Constant(_))
    }

    pub fn as_register(&self) -> Option<InstId> {
        match self {
            Operand::Register(id) => Some(*id),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Register(id) => write!(f, "{}", id),
            Operand::Parameter(block, index) => write!(f, "%{}.{}", block, index),
            Operand::Constant(c) => write!(f, "{}", c),
        }
    }
}

/// A use of an operand: the instruction consuming it and the operand's index
/// among that instruction's operands.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Use {
    pub user: InstId,
    pub index: usize,
}
