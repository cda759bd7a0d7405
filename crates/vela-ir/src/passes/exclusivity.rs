//! Exclusivity enforcement: reject overlapping accesses to the same
//! provenance when either is mutable.

use std::collections::{BTreeSet, HashMap};

use vela_shared::diag::{Diagnostic, DiagnosticSink};

use crate::{
    inst::InstKind,
    module::{Function, Module},
    operand::{BlockId, FunctionId, InstId, Operand},
    passes::ControlFlow,
};

type OpenSet = BTreeSet<InstId>;

pub fn run(module: &mut Module, function: FunctionId, diagnostics: &mut DiagnosticSink) {
    let f = module.function(function);
    let Some(entry) = f.entry() else {
        return;
    };
    let cfg = ControlFlow::of(f);
    let order = cfg.reverse_postorder(entry);

    // Which accesses are still open at each block's exit.
    let mut exits: HashMap<BlockId, OpenSet> = HashMap::new();
    loop {
        let mut changed = false;
        for &block in &order {
            let mut open = block_input(&cfg, block, &exits);
            scan(f, block, &mut open, None);
            if exits.get(&block) != Some(&open) {
                exits.insert(block, open);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    for &block in &order {
        let mut open = block_input(&cfg, block, &exits);
        scan(f, block, &mut open, Some(diagnostics));
    }
}

fn block_input(cfg: &ControlFlow, block: BlockId, exits: &HashMap<BlockId, OpenSet>) -> OpenSet {
    let mut open = OpenSet::new();
    for pred in cfg.predecessors(block) {
        if let Some(out) = exits.get(&pred) {
            open.extend(out.iter().copied());
        }
    }
    open
}

fn scan(
    f: &Function,
    block: BlockId,
    open: &mut OpenSet,
    mut diagnostics: Option<&mut DiagnosticSink>,
) {
    for &inst in &f.block(block).insts {
        match &f.inst(inst).kind {
            InstKind::Access(a) => {
                if let Some(d) = diagnostics.as_deref_mut() {
                    let provenance = f.provenances(&a.source);
                    let mutable = a
                        .selected
                        .map(|s| s.is_mutating())
                        .unwrap_or_else(|| {
                            a.capabilities.strongest().map(|s| s.is_mutating()).unwrap_or(false)
                        });
                    for &other in open.iter() {
                        let InstKind::Access(b) = &f.inst(other).kind else {
                            continue;
                        };
                        let other_mutable = b
                            .selected
                            .map(|s| s.is_mutating())
                            .unwrap_or_else(|| {
                                b.capabilities
                                    .strongest()
                                    .map(|s| s.is_mutating())
                                    .unwrap_or(false)
                            });
                        if !mutable && !other_mutable {
                            continue;
                        }
                        let other_provenance = f.provenances(&b.source);
                        if provenance.intersection(&other_provenance).next().is_some() {
                            d.report(
                                Diagnostic::error(
                                    "exclusivity violation: overlapping accesses to the same value",
                                    f.inst(inst).site,
                                )
                                .with_note("conflicting access opened here", f.inst(other).site),
                            );
                        }
                    }
                }
                open.insert(inst);
            }
            InstKind::EndAccess(e) => {
                if let Operand::Register(start) = e.start {
                    open.remove(&start);
                }
            }
            _ => {}
        }
    }
}
