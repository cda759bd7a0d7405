use vela_shared::{
    access::{AccessEffect, AccessEffectSet},
    site::Site,
    ty::Type,
};

use crate::{
    inst::{
        Access, AllocStack, Branch, Call, CondBranch, DeallocStack, EndAccess, Inst, InstKind,
        Load, MoveValue, Store,
    },
    module::{Function, Module},
    operand::{BlockId, FunctionId, InstId, Operand},
};

/// Where the builder emits its next instruction.
#[derive(Clone, Copy, Debug)]
pub enum InsertionPoint {
    EndOf(BlockId),
    Before(InstId),
    After(InstId),
}

/// A cursor over a function under construction. All emission goes through
/// the module's insertion helpers so use chains stay consistent.
pub struct Builder<'a> {
    module: &'a mut Module,
    function: FunctionId,
    point: InsertionPoint,
    site: Site,
}

impl<'a> Builder<'a> {
    pub fn new(module: &'a mut Module, function: FunctionId, block: BlockId) -> Builder<'a> {
        let site = module.function(function).site;
        Builder {
            module,
            function,
            point: InsertionPoint::EndOf(block),
            site,
        }
    }

    pub fn function(&self) -> &Function {
        self.module.function(self.function)
    }

    pub fn set_insertion_point(&mut self, point: InsertionPoint) {
        self.point = point;
    }

    pub fn set_site(&mut self, site: Site) {
        self.site = site;
    }

    pub fn insert(&mut self, kind: InstKind) -> InstId {
        let inst = Inst::new(kind, self.site);
        let function = self.module.function_mut(self.function);
        let id = match self.point {
            InsertionPoint::EndOf(block) => function.append(block, inst),
            InsertionPoint::Before(anchor) => function.insert_before(anchor, inst),
            InsertionPoint::After(anchor) => function.insert_after(anchor, inst),
        };
        // Keep emitting after what we just inserted.
        if !matches!(self.point, InsertionPoint::EndOf(_)) {
            self.point = InsertionPoint::After(id);
        }
        id
    }

    pub fn alloc_stack(&mut self, allocated: Type) -> InstId {
        self.insert(InstKind::AllocStack(AllocStack { allocated }))
    }

    pub fn dealloc_stack(&mut self, target: Operand) -> InstId {
        self.insert(InstKind::DeallocStack(DeallocStack { target }))
    }

    pub fn access(&mut self, capabilities: AccessEffectSet, source: Operand) -> InstId {
        self.insert(InstKind::Access(Access {
            capabilities,
            source,
            selected: None,
        }))
    }

    pub fn access_one(&mut self, capability: AccessEffect, source: Operand) -> InstId {
        self.access(AccessEffectSet::singleton(capability), source)
    }

    pub fn end_access(&mut self, start: Operand) -> InstId {
        self.insert(InstKind::EndAccess(EndAccess { start }))
    }

    pub fn load(&mut self, source: Operand) -> InstId {
        self.insert(InstKind::Load(Load { source }))
    }

    pub fn store(&mut self, value: Operand, target: Operand) -> InstId {
        self.insert(InstKind::Store(Store { value, target }))
    }

    pub fn move_value(&mut self, value: Operand, target: Operand) -> InstId {
        self.insert(InstKind::Move(MoveValue { value, target }))
    }

    pub fn call(
        &mut self,
        callee: Operand,
        conventions: Vec<AccessEffect>,
        arguments: Vec<Operand>,
        output: Type,
    ) -> InstId {
        debug_assert_eq!(conventions.len(), arguments.len());
        self.insert(InstKind::Call(Call {
            callee,
            conventions,
            arguments,
            output,
        }))
    }

    pub fn branch(&mut self, target: BlockId) -> InstId {
        self.insert(InstKind::Branch(Branch { target }))
    }

    pub fn cond_branch(
        &mut self,
        condition: Operand,
        on_true: BlockId,
        on_false: BlockId,
    ) -> InstId {
        self.insert(InstKind::CondBranch(CondBranch {
            condition,
            on_true,
            on_false,
        }))
    }

    pub fn ret(&mut self) -> InstId {
        self.insert(InstKind::Return)
    }
}
