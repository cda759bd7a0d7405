use serde::{Deserialize, Serialize};

use vela_shared::{
    access::{AccessEffect, AccessEffectSet},
    site::Site,
    ty::Type,
};

use crate::operand::{BlockId, Operand};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Linkage {
    Public,
    Module,
}

impl std::fmt::Display for Linkage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Linkage::Public => write!(f, "public"),
            Linkage::Module => write!(f, "module"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocStack {
    pub allocated: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeallocStack {
    pub target: Operand,
}

/// An access scope over an address. Lowering emits accesses with the full
/// set of capabilities the source code could need; reification narrows
/// `selected` to a single concrete capability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    pub capabilities: AccessEffectSet,
    pub source: Operand,
    pub selected: Option<AccessEffect>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndAccess {
    pub start: Operand,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Load {
    pub source: Operand,
}

/// Store an object into an address, initializing it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub value: Operand,
    pub target: Operand,
}

/// The `move` pseudo-instruction. Object-state normalization replaces every
/// move with either `initialize` or `assign`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveValue {
    pub value: Operand,
    pub target: Operand,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initialize {
    pub value: Operand,
    pub target: Operand,
}

/// Overwrite an initialized slot, releasing its previous value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assign {
    pub value: Operand,
    pub target: Operand,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub callee: Operand,
    /// The access effect each argument is passed with.
    pub conventions: Vec<AccessEffect>,
    pub arguments: Vec<Operand>,
    pub output: Type,
}

/// A subscript projection: yields a borrowed handle onto part of `source`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub capability: AccessEffect,
    pub source: Operand,
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubfieldView {
    pub base: Operand,
    pub path: Vec<usize>,
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceByBytes {
    pub base: Operand,
    pub byte_offset: Operand,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapExistentialAddr {
    pub witness: Operand,
    pub interface: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub target: BlockId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CondBranch {
    pub condition: Operand,
    pub on_true: BlockId,
    pub on_false: BlockId,
}

/// Bookkeeping pseudo-instruction recording an initialization state change
/// that is not visible as a store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkState {
    pub initialized: bool,
    pub target: Operand,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstKind {
    AllocStack(AllocStack),
    DeallocStack(DeallocStack),
    Access(Access),
    EndAccess(EndAccess),
    Load(Load),
    Store(Store),
    Move(MoveValue),
    Initialize(Initialize),
    Assign(Assign),
    Call(Call),
    Project(Project),
    SubfieldView(SubfieldView),
    AdvanceByBytes(AdvanceByBytes),
    WrapExistentialAddr(WrapExistentialAddr),
    Branch(Branch),
    CondBranch(CondBranch),
    Return,
    Unreachable,
    MarkState(MarkState),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inst {
    pub kind: InstKind,
    pub site: Site,
}

impl Inst {
    pub fn new(kind: InstKind, site: Site) -> Inst {
        Inst { kind, site }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            InstKind::Branch(_) | InstKind::CondBranch(_) | InstKind::Return | InstKind::Unreachable
        )
    }

    /// Whether removing the instruction is observable when its result is
    /// unused.
    pub fn is_pure(&self) -> bool {
        matches!(
            self.kind,
            InstKind::AllocStack(_)
                | InstKind::Load(_)
                | InstKind::SubfieldView(_)
                | InstKind::AdvanceByBytes(_)
                | InstKind::WrapExistentialAddr(_)
        )
    }

    pub fn operands(&self) -> Vec<Operand> {
        match &self.kind {
            InstKind::AllocStack(_) | InstKind::Return | InstKind::Unreachable => vec![],
            InstKind::DeallocStack(i) => vec![i.target.clone()],
            InstKind::Access(i) => vec![i.source.clone()],
            InstKind::EndAccess(i) => vec![i.start.clone()],
            InstKind::Load(i) => vec![i.source.clone()],
            InstKind::Store(i) => vec![i.value.clone(), i.target.clone()],
            InstKind::Move(i) => vec![i.value.clone(), i.target.clone()],
            InstKind::Initialize(i) => vec![i.value.clone(), i.target.clone()],
            InstKind::Assign(i) => vec![i.value.clone(), i.target.clone()],
            InstKind::Call(i) => {
                let mut out = vec![i.callee.clone()];
                out.extend(i.arguments.iter().cloned());
                out
            }
            InstKind::Project(i) => vec![i.source.clone()],
            InstKind::SubfieldView(i) => vec![i.base.clone()],
            InstKind::AdvanceByBytes(i) => vec![i.base.clone(), i.byte_offset.clone()],
            InstKind::WrapExistentialAddr(i) => vec![i.witness.clone()],
            InstKind::Branch(_) => vec![],
            InstKind::CondBranch(i) => vec![i.condition.clone()],
            InstKind::MarkState(i) => vec![i.target.clone()],
        }
    }

    /// Rewrite the operand at `index` in place. All operand mutation goes
    /// through here so use chains can be kept consistent by the caller.
    pub(crate) fn set_operand(&mut self, index: usize, new: Operand) {
        let slot: &mut Operand = match (&mut self.kind, index) {
            (InstKind::DeallocStack(i), 0) => &mut i.target,
            (InstKind::Access(i), 0) => &mut i.source,
            (InstKind::EndAccess(i), 0) => &mut i.start,
            (InstKind::Load(i), 0) => &mut i.source,
            (InstKind::Store(i), 0) => &mut i.value,
            (InstKind::Store(i), 1) => &mut i.target,
            (InstKind::Move(i), 0) => &mut i.value,
            (InstKind::Move(i), 1) => &mut i.target,
            (InstKind::Initialize(i), 0) => &mut i.value,
            (InstKind::Initialize(i), 1) => &mut i.target,
            (InstKind::Assign(i), 0) => &mut i.value,
            (InstKind::Assign(i), 1) => &mut i.target,
            (InstKind::Call(i), 0) => &mut i.callee,
            (InstKind::Call(i), n) => &mut i.arguments[n - 1],
            (InstKind::Project(i), 0) => &mut i.source,
            (InstKind::SubfieldView(i), 0) => &mut i.base,
            (InstKind::AdvanceByBytes(i), 0) => &mut i.base,
            (InstKind::AdvanceByBytes(i), 1) => &mut i.byte_offset,
            (InstKind::WrapExistentialAddr(i), 0) => &mut i.witness,
            (InstKind::CondBranch(i), 0) => &mut i.condition,
            (InstKind::MarkState(i), 0) => &mut i.target,
            _ => panic!("operand index {} out of range", index),
        };
        *slot = new;
    }

    pub fn successors(&self) -> Vec<BlockId> {
        match &self.kind {
            InstKind::Branch(b) => vec![b.target],
            InstKind::CondBranch(b) => vec![b.on_true, b.on_false],
            _ => vec![],
        }
    }
}

impl std::fmt::Display for Inst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            InstKind::AllocStack(i) => write!(f, "alloc_stack {}", i.allocated),
            InstKind::DeallocStack(i) => write!(f, "dealloc_stack {}", i.target),
            InstKind::Access(i) => match i.selected {
                Some(effect) => write!(f, "access [{}] {}", effect, i.source),
                None => write!(f, "access {} {}", i.capabilities, i.source),
            },
            InstKind::EndAccess(i) => write!(f, "end_access {}", i.start),
            InstKind::Load(i) => write!(f, "load {}", i.source),
            InstKind::Store(i) => write!(f, "store {}, {}", i.value, i.target),
            InstKind::Move(i) => write!(f, "move {}, {}", i.value, i.target),
            InstKind::Initialize(i) => write!(f, "initialize {}, {}", i.value, i.target),
            InstKind::Assign(i) => write!(f, "assign {}, {}", i.value, i.target),
            InstKind::Call(i) => {
                write!(f, "call {}(", i.callee)?;
                for (k, (argument, convention)) in
                    i.arguments.iter().zip(i.conventions.iter()).enumerate()
                {
                    if k > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[{}] {}", convention, argument)?;
                }
                write!(f, ")")
            }
            InstKind::Project(i) => write!(f, "project [{}] {}", i.capability, i.source),
            InstKind::SubfieldView(i) => {
                let path = i
                    .path
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(".");
                write!(f, "subfield_view {}, {}", i.base, path)
            }
            InstKind::AdvanceByBytes(i) => {
                write!(f, "advance_by_bytes {}, {}", i.base, i.byte_offset)
            }
            InstKind::WrapExistentialAddr(i) => {
                write!(f, "wrap_existential_addr {}, {}", i.witness, i.interface)
            }
            InstKind::Branch(b) => write!(f, "branch {}", b.target),
            InstKind::CondBranch(b) => {
                write!(f, "cond_branch {}, {}, {}", b.condition, b.on_true, b.on_false)
            }
            InstKind::Return => write!(f, "return"),
            InstKind::Unreachable => write!(f, "unreachable"),
            InstKind::MarkState(i) => {
                let state = if i.initialized { "initialized" } else { "uninitialized" };
                write!(f, "mark_state [{}] {}", state, i.target)
            }
        }
    }
}
