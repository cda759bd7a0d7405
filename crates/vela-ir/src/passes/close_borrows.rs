//! Borrow closing: give every access scope a matching `end_access`,
//! honouring block topology.

use std::collections::BTreeSet;

use vela_shared::diag::DiagnosticSink;

use crate::{
    inst::{EndAccess, Inst, InstKind},
    module::Module,
    operand::{BlockId, FunctionId, InstId, Operand},
    passes::ControlFlow,
};

pub fn run(module: &mut Module, function: FunctionId, _diagnostics: &mut DiagnosticSink) {
    let f = module.function(function);
    let cfg = ControlFlow::of(f);

    // (anchor, access) pairs: an end_access for `access` goes right after
    // `anchor`.
    let mut insertions: Vec<(InstId, InstId)> = vec![];

    for block in f.block_ids() {
        for &inst in &f.block(block).insts {
            if !matches!(f.inst(inst).kind, InstKind::Access(_)) {
                continue;
            }
            let register = Operand::Register(inst);
            let uses = f.uses(&register);
            if uses
                .iter()
                .any(|u| matches!(f.inst(u.user).kind, InstKind::EndAccess(_)))
            {
                continue;
            }
            if uses.is_empty() {
                insertions.push((inst, inst));
                continue;
            }

            // The scope ends after the last use in every block no other
            // using block is reachable from.
            let use_blocks: BTreeSet<BlockId> =
                uses.iter().map(|u| f.block_of(u.user)).collect();
            for &b in &use_blocks {
                let downstream = cfg.reachable_from(b);
                if use_blocks
                    .iter()
                    .any(|&other| other != b && downstream.contains(&other))
                {
                    continue;
                }
                let last_use = f
                    .block(b)
                    .insts
                    .iter()
                    .rev()
                    .find(|i| uses.iter().any(|u| u.user == **i))
                    .copied()
                    .expect("using block has a use");
                insertions.push((last_use, inst));
            }
        }
    }

    let f = module.function_mut(function);
    for (anchor, access) in insertions {
        log::debug!("[close_borrows] closing {} after {}", access, anchor);
        let site = f.inst(access).site;
        f.insert_after(
            anchor,
            Inst::new(
                InstKind::EndAccess(EndAccess {
                    start: Operand::Register(access),
                }),
                site,
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use vela_shared::{
        access::{AccessEffect, AccessEffectSet},
        diag::DiagnosticSink,
        scope::ScopeId,
        site::Site,
        ty::Type,
    };

    use crate::{
        builder::Builder,
        inst::InstKind,
        module::{Function, Module},
        operand::Operand,
    };

    #[test]
    fn every_access_gets_a_closing_counterpart() {
        let mut module = Module::new("test");
        let mut f = Function::new(
            "f",
            Site::default(),
            crate::inst::Linkage::Module,
            vec![],
            Type::unit(),
        );
        let entry = f.append_entry_block(ScopeId(0));
        let id = module.add_function(f);

        let mut b = Builder::new(&mut module, id, entry);
        let slot = b.alloc_stack(Type::word());
        b.store(Operand::word(3), Operand::register(slot));
        let access = b.access(
            AccessEffectSet::singleton(AccessEffect::Let),
            Operand::register(slot),
        );
        b.load(Operand::register(access));
        b.ret();

        let mut diagnostics = DiagnosticSink::new();
        super::run(&mut module, id, &mut diagnostics);

        let f = module.function(id);
        let closed = f
            .uses(&Operand::register(access))
            .iter()
            .any(|u| matches!(f.inst(u.user).kind, InstKind::EndAccess(_)));
        assert!(closed);

        // The pass is idempotent: a second run adds nothing.
        let before = format!("{}", module.function(id));
        super::run(&mut module, id, &mut diagnostics);
        assert_eq!(before, format!("{}", module.function(id)));
    }
}
