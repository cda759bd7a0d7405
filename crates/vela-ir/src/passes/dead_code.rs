//! Dead-code removal: unreachable blocks, then pure instructions whose
//! results have no uses, to a fixpoint.

use vela_shared::diag::DiagnosticSink;

use crate::{
    module::Module,
    operand::{FunctionId, InstId, Operand},
    passes::ControlFlow,
};

pub fn run(module: &mut Module, function: FunctionId, _diagnostics: &mut DiagnosticSink) {
    remove_unreachable_blocks(module, function);

    loop {
        let f = module.function(function);
        let mut dead: Vec<InstId> = vec![];
        for block in f.block_ids() {
            for &inst in &f.block(block).insts {
                if f.inst(inst).is_pure() && f.uses(&Operand::Register(inst)).is_empty() {
                    dead.push(inst);
                }
            }
        }
        if dead.is_empty() {
            break;
        }
        log::debug!("[dead_code] removing {} instructions", dead.len());
        let f = module.function_mut(function);
        for inst in dead {
            f.remove_inst(inst);
        }
    }
}

fn remove_unreachable_blocks(module: &mut Module, function: FunctionId) {
    let f = module.function(function);
    let Some(entry) = f.entry() else {
        return;
    };
    let cfg = ControlFlow::of(f);
    let mut reachable = cfg.reachable_from(entry);
    reachable.push(entry);

    let dead = f
        .block_ids()
        .filter(|b| !reachable.contains(b))
        .collect::<Vec<_>>();
    if dead.is_empty() {
        return;
    }
    log::debug!("[dead_code] removing {} unreachable blocks", dead.len());
    let f = module.function_mut(function);
    for block in dead {
        f.remove_block(block);
    }
}

#[cfg(test)]
mod tests {
    use vela_shared::{diag::DiagnosticSink, scope::ScopeId, site::Site, ty::Type};

    use crate::{
        inst::{AllocStack, Inst, InstKind, Linkage},
        module::{Function, Module},
    };

    #[test]
    fn unused_pure_instructions_are_removed() {
        let mut module = Module::new("test");
        let mut f = Function::new("f", Site::default(), Linkage::Module, vec![], Type::unit());
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
        f.append(b, Inst::new(InstKind::Return, Site::default()));
        let id = module.add_function(f);

        let mut diagnostics = DiagnosticSink::new();
        super::run(&mut module, id, &mut diagnostics);

        assert!(!module.function(id).contains_inst(slot));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn unreachable_blocks_are_removed() {
        let mut module = Module::new("test");
        let mut f = Function::new("f", Site::default(), Linkage::Module, vec![], Type::unit());
        let entry = f.append_entry_block(ScopeId(0));
        f.append(entry, Inst::new(InstKind::Return, Site::default()));
        let orphan = f.append_block(ScopeId(0), vec![]);
        f.append(orphan, Inst::new(InstKind::Unreachable, Site::default()));
        let id = module.add_function(f);

        let mut diagnostics = DiagnosticSink::new();
        super::run(&mut module, id, &mut diagnostics);

        let blocks = module.function(id).block_ids().collect::<Vec<_>>();
        assert_eq!(blocks, vec![entry]);
    }
}
