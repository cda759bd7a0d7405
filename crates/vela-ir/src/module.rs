use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use vela_shared::{
    access::AccessEffect,
    decl::{DeclId, Name},
    site::Site,
    ty::Type,
};

use crate::{
    inst::{Inst, InstKind, Linkage},
    operand::{BlockId, FunctionId, InstId, IrType, Operand, Use},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInput {
    pub label: Option<Name>,
    pub access: AccessEffect,
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub scope: vela_shared::scope::ScopeId,
    pub params: Vec<IrType>,
    pub insts: Vec<InstId>,
}

/// A function: blocks over an instruction arena, with a use map kept
/// consistent by every mutation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Function {
    pub name: Name,
    pub site: Site,
    pub linkage: Linkage,
    pub generic_params: Vec<DeclId>,
    pub inputs: Vec<FunctionInput>,
    pub output: Type,
    pub is_subscript: bool,
    blocks: Vec<Option<Block>>,
    insts: Vec<Option<Inst>>,
    entry: Option<BlockId>,
    uses: HashMap<Operand, Vec<Use>>,
}

impl Function {
    pub fn new(
        name: impl Into<Name>,
        site: Site,
        linkage: Linkage,
        inputs: Vec<FunctionInput>,
        output: Type,
    ) -> Function {
        Function {
            name: name.into(),
            site,
            linkage,
            generic_params: vec![],
            inputs,
            output,
            is_subscript: false,
            blocks: vec![],
            insts: vec![],
            entry: None,
            uses: HashMap::new(),
        }
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.entry
    }

    /// Append the entry block. Its parameters match the function's inputs,
    /// with a trailing return-storage parameter for non-subscript functions.
    pub fn append_entry_block(&mut self, scope: vela_shared::scope::ScopeId) -> BlockId {
        let mut params = self
            .inputs
            .iter()
            .map(|i| IrType::address(i.ty.clone()))
            .collect::<Vec<_>>();
        if !self.is_subscript {
            params.push(IrType::address(self.output.clone()));
        }
        let block = self.append_block(scope, params);
        self.entry = Some(block);
        block
    }

    pub fn append_block(
        &mut self,
        scope: vela_shared::scope::ScopeId,
        params: Vec<IrType>,
    ) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Some(Block {
            scope,
            params,
            insts: vec![],
        }));
        id
    }

    pub fn block(&self, id: BlockId) -> &Block {
        self.blocks[id.0].as_ref().expect("block removed")
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_some())
            .map(|(i, _)| BlockId(i))
    }

    pub fn inst(&self, id: InstId) -> &Inst {
        self.insts[id.0].as_ref().expect("instruction removed")
    }

    pub fn contains_inst(&self, id: InstId) -> bool {
        self.insts.get(id.0).map(|i| i.is_some()).unwrap_or(false)
    }

    /// The block containing `id`.
    pub fn block_of(&self, id: InstId) -> BlockId {
        for block in self.block_ids() {
            if self.block(block).insts.contains(&id) {
                return block;
            }
        }
        panic!("instruction {} is in no block", id)
    }

    /// The terminator of a block, when it has one.
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        let last = *self.block(block).insts.last()?;
        if self.inst(last).is_terminator() {
            Some(last)
        } else {
            None
        }
    }

    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        match self.terminator(block) {
            Some(t) => self.inst(t).successors(),
            None => vec![],
        }
    }

    // Insertion. Every path records uses for the new instruction's operands
    // atomically with making it visible.

    pub fn append(&mut self, block: BlockId, inst: Inst) -> InstId {
        debug_assert!(
            self.terminator(block).is_none(),
            "appending after a terminator"
        );
        let id = self.push_inst(inst);
        self.block_mut(block).insts.push(id);
        id
    }

    pub fn prepend(&mut self, block: BlockId, inst: Inst) -> InstId {
        let id = self.push_inst(inst);
        self.block_mut(block).insts.insert(0, id);
        id
    }

    pub fn insert_before(&mut self, anchor: InstId, inst: Inst) -> InstId {
        let block = self.block_of(anchor);
        let position = self.position_in_block(block, anchor);
        let id = self.push_inst(inst);
        self.block_mut(block).insts.insert(position, id);
        id
    }

    pub fn insert_after(&mut self, anchor: InstId, inst: Inst) -> InstId {
        let block = self.block_of(anchor);
        let position = self.position_in_block(block, anchor) + 1;
        let id = self.push_inst(inst);
        self.block_mut(block).insts.insert(position, id);
        id
    }

    /// Insert before the block's terminator, or at the end when the block is
    /// not yet terminated.
    pub fn insert_before_terminator(&mut self, block: BlockId, inst: Inst) -> InstId {
        match self.terminator(block) {
            Some(t) => self.insert_before(t, inst),
            None => self.append(block, inst),
        }
    }

    /// Replace an instruction with another of the same result type.
    pub fn replace(&mut self, id: InstId, inst: Inst) {
        debug_assert_eq!(
            self.result_type(id),
            self.result_type_of_inst(&inst),
            "replacement changes the result type"
        );
        self.erase_uses(id);
        self.insts[id.0] = Some(inst);
        self.record_uses(id);
    }

    /// Rewrite one operand of an instruction, keeping the use map in sync.
    pub fn replace_operand(&mut self, user: InstId, index: usize, new: Operand) {
        let old = self.inst(user).operands()[index].clone();
        if let Some(list) = self.uses.get_mut(&old) {
            list.retain(|u| !(u.user == user && u.index == index));
        }
        self.insts[user.0]
            .as_mut()
            .expect("instruction removed")
            .set_operand(index, new.clone());
        if !new.is_constant() {
            self.uses.entry(new).or_default().push(Use { user, index });
        }
    }

    /// Redirect every use of `of` to `with`. The operands must have
    /// identical types.
    pub fn replace_all_uses(&mut self, of: &Operand, with: Operand) {
        debug_assert_eq!(
            self.type_of_operand(of),
            self.type_of_operand(&with),
            "use replacement changes types"
        );
        let uses = self.uses.remove(of).unwrap_or_default();
        for u in uses {
            self.insts[u.user.0]
                .as_mut()
                .expect("instruction removed")
                .set_operand(u.index, with.clone());
            if !with.is_constant() {
                self.uses
                    .entry(with.clone())
                    .or_default()
                    .push(u);
            }
        }
    }

    /// Remove an instruction whose result is unused.
    pub fn remove_inst(&mut self, id: InstId) {
        debug_assert!(
            self.uses(&Operand::Register(id)).is_empty(),
            "removing an instruction whose result is used"
        );
        self.erase_uses(id);
        let block = self.block_of(id);
        self.block_mut(block).insts.retain(|&i| i != id);
        self.insts[id.0] = None;
        self.uses.remove(&Operand::Register(id));
    }

    pub fn remove_block(&mut self, id: BlockId) {
        let insts = self.block(id).insts.clone();
        for inst in insts {
            self.erase_uses(inst);
            self.insts[inst.0] = None;
            self.uses.remove(&Operand::Register(inst));
        }
        for index in 0..self.block(id).params.len() {
            self.uses.remove(&Operand::Parameter(id, index));
        }
        self.blocks[id.0] = None;
    }

    pub fn uses(&self, operand: &Operand) -> &[Use] {
        self.uses.get(operand).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn type_of_operand(&self, operand: &Operand) -> IrType {
        match operand {
            Operand::Register(id) => self
                .result_type(*id)
                .expect("operand has no result"),
            Operand::Parameter(block, index) => self.block(*block).params[*index].clone(),
            Operand::Constant(c) => c.ty(),
        }
    }

    pub fn result_type(&self, id: InstId) -> Option<IrType> {
        self.result_type_of_inst(self.inst(id))
    }

    fn result_type_of_inst(&self, inst: &Inst) -> Option<IrType> {
        match &inst.kind {
            InstKind::AllocStack(i) => Some(IrType::address(i.allocated.clone())),
            InstKind::Access(i) => {
                Some(IrType::address(self.type_of_operand(&i.source).ast))
            }
            InstKind::Load(i) => Some(IrType::object(self.type_of_operand(&i.source).ast)),
            InstKind::Call(i) => Some(IrType::object(i.output.clone())),
            InstKind::Project(i) => Some(IrType::address(i.ty.clone())),
            InstKind::SubfieldView(i) => Some(IrType::address(i.ty.clone())),
            InstKind::AdvanceByBytes(_) => Some(IrType::address(Type::ptr())),
            InstKind::WrapExistentialAddr(i) => Some(IrType::address(i.interface.clone())),
            InstKind::DeallocStack(_)
            | InstKind::EndAccess(_)
            | InstKind::Store(_)
            | InstKind::Move(_)
            | InstKind::Initialize(_)
            | InstKind::Assign(_)
            | InstKind::Branch(_)
            | InstKind::CondBranch(_)
            | InstKind::Return
            | InstKind::Unreachable
            | InstKind::MarkState(_) => None,
        }
    }

    /// The static provenance of an address: the set of original operands it
    /// derives from. Addressing instructions recurse into their sources;
    /// anything else is its own provenance.
    pub fn provenances(&self, operand: &Operand) -> BTreeSet<Operand> {
        match operand {
            Operand::Register(id) => match &self.inst(*id).kind {
                InstKind::Access(i) => self.provenances(&i.source),
                InstKind::Project(i) => self.provenances(&i.source),
                InstKind::SubfieldView(i) => self.provenances(&i.base),
                InstKind::AdvanceByBytes(i) => self.provenances(&i.base),
                InstKind::WrapExistentialAddr(i) => self.provenances(&i.witness),
                _ => BTreeSet::from([operand.clone()]),
            },
            _ => BTreeSet::from([operand.clone()]),
        }
    }

    /// Whether `operand` is sink in this function: every provenance is a
    /// value the function owns.
    pub fn is_sink(&self, operand: &Operand) -> bool {
        self.provenances(operand).iter().all(|p| match p {
            Operand::Register(id) => {
                matches!(self.inst(*id).kind, InstKind::AllocStack(_))
            }
            Operand::Parameter(block, index) => {
                Some(*block) == self.entry
                    && self
                        .inputs
                        .get(*index)
                        .map(|i| i.access == AccessEffect::Sink)
                        .unwrap_or(false)
            }
            Operand::Constant(_) => false,
        })
    }

    fn block_mut(&mut self, id: BlockId) -> &mut Block {
        self.blocks[id.0].as_mut().expect("block removed")
    }

    fn position_in_block(&self, block: BlockId, inst: InstId) -> usize {
        self.block(block)
            .insts
            .iter()
            .position(|&i| i == inst)
            .expect("instruction not in block")
    }

    fn push_inst(&mut self, inst: Inst) -> InstId {
        let id = InstId(self.insts.len());
        self.insts.push(Some(inst));
        self.record_uses(id);
        id
    }

    fn record_uses(&mut self, id: InstId) {
        for (index, operand) in self.inst(id).operands().into_iter().enumerate() {
            if operand.is_constant() {
                continue;
            }
            self.uses
                .entry(operand)
                .or_default()
                .push(Use { user: id, index });
        }
    }

    fn erase_uses(&mut self, id: InstId) {
        for operand in self.inst(id).operands() {
            if let Some(list) = self.uses.get_mut(&operand) {
                list.retain(|u| u.user != id);
                if list.is_empty() {
                    self.uses.remove(&operand);
                }
            }
        }
    }
}

impl std::fmt::Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_subscript { "subscript" } else { "fun" };
        write!(f, "{} {} @{}(", self.linkage, kind, self.name)?;
        for (i, input) in self.inputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match &input.label {
                Some(l) => write!(f, "{} {}: {}", input.access, l, input.ty)?,
                None => write!(f, "{} _: {}", input.access, input.ty)?,
            }
        }
        writeln!(f, ") -> {} {{", self.output)?;
        for block in self.block_ids() {
            let b = self.block(block);
            write!(f, "{}(", block)?;
            for (i, param) in b.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "%{}.{}: {}", block, i, param)?;
            }
            writeln!(f, "):")?;
            for &inst in &b.insts {
                if self.result_type(inst).is_some() {
                    writeln!(f, "  {} = {}", inst, self.inst(inst))?;
                } else {
                    writeln!(f, "  {}", self.inst(inst))?;
                }
            }
        }
        writeln!(f, "}}")
    }
}

/// A compilation module: a list of functions created on first demand.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Module {
    pub name: Name,
    functions: Vec<Function>,
    decl_functions: HashMap<DeclId, FunctionId>,
}

impl Module {
    pub fn new(name: impl Into<Name>) -> Module {
        Module {
            name: name.into(),
            functions: vec![],
            decl_functions: HashMap::new(),
        }
    }

    pub fn add_function(&mut self, function: Function) -> FunctionId {
        let id = FunctionId(self.functions.len());
        self.functions.push(function);
        id
    }

    /// The function lowered for `decl`, creating it on first use.
    pub fn function_for_decl(
        &mut self,
        decl: DeclId,
        make: impl FnOnce() -> Function,
    ) -> FunctionId {
        if let Some(id) = self.decl_functions.get(&decl) {
            return *id;
        }
        let id = self.add_function(make());
        self.decl_functions.insert(decl, id);
        id
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.0]
    }

    pub fn function_ids(&self) -> impl Iterator<Item = FunctionId> {
        (0..self.functions.len()).map(FunctionId)
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "module {}", self.name)?;
        for id in self.function_ids() {
            writeln!(f)?;
            write!(f, "{}", self.function(id))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use vela_shared::{access::AccessEffectSet, scope::ScopeId, site::Site, ty::Type};

    use crate::{
        inst::{Access, AllocStack, Inst, InstKind, Linkage, Store},
        operand::Operand,
    };

    use super::Function;

    fn empty_function() -> Function {
        Function::new("test", Site::default(), Linkage::Module, vec![], Type::unit())
    }

    #[test]
    fn insertion_records_uses_and_removal_erases_them() {
        let mut f = empty_function();
        let b = f.append_entry_block(ScopeId(0));
        let slot = f.append(
            b,
            Inst::new(
                InstKind::AllocStack(AllocStack {
                    allocated: Type::word(),
                }),
                Site::default(),
            ),
        );
        let store = f.append(
            b,
            Inst::new(
                InstKind::Store(Store {
                    value: Operand::word(1),
                    target: Operand::register(slot),
                }),
                Site::default(),
            ),
        );

        assert_eq!(f.uses(&Operand::register(slot)).len(), 1);
        f.remove_inst(store);
        assert!(f.uses(&Operand::register(slot)).is_empty());
        f.remove_inst(slot);
        assert!(!f.contains_inst(slot));
    }

    #[test]
    fn provenance_sees_through_accesses() {
        let mut f = empty_function();
        let b = f.append_entry_block(ScopeId(0));
        let slot = f.append(
            b,
            Inst::new(
                InstKind::AllocStack(AllocStack {
                    allocated: Type::word(),
                }),
                Site::default(),
            ),
        );
        let access = f.append(
            b,
            Inst::new(
                InstKind::Access(Access {
                    capabilities: AccessEffectSet::singleton(
                        vela_shared::access::AccessEffect::Let,
                    ),
                    source: Operand::register(slot),
                    selected: None,
                }),
                Site::default(),
            ),
        );

        let provenance = f.provenances(&Operand::register(access));
        assert_eq!(provenance.len(), 1);
        assert!(provenance.contains(&Operand::register(slot)));
        assert!(f.is_sink(&Operand::register(access)));
    }

    #[test]
    fn replace_all_uses_migrates_the_use_list() {
        let mut f = empty_function();
        let b = f.append_entry_block(ScopeId(0));
        let first = f.append(
            b,
            Inst::new(
                InstKind::AllocStack(AllocStack {
                    allocated: Type::word(),
                }),
                Site::default(),
            ),
        );
        let second = f.append(
            b,
            Inst::new(
                InstKind::AllocStack(AllocStack {
                    allocated: Type::word(),
                }),
                Site::default(),
            ),
        );
        f.append(
            b,
            Inst::new(
                InstKind::Store(Store {
                    value: Operand::word(2),
                    target: Operand::register(first),
                }),
                Site::default(),
            ),
        );

        f.replace_all_uses(&Operand::register(first), Operand::register(second));
        assert!(f.uses(&Operand::register(first)).is_empty());
        assert_eq!(f.uses(&Operand::register(second)).len(), 1);
    }
}
