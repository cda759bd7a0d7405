//! Object-state normalization: track the initialization state of every
//! stack slot through the CFG, legalize `move` into `initialize` or
//! `assign`, and diagnose reads from uninitialized or consumed storage.

use std::collections::{BTreeMap, HashMap};

use vela_shared::{
    access::AccessEffect,
    diag::{Diagnostic, DiagnosticSink},
};

use crate::{
    inst::{Assign, Initialize, Inst, InstKind},
    module::{Function, Module},
    operand::{BlockId, FunctionId, InstId, Operand},
    passes::ControlFlow,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    Uninitialized,
    Initialized,
    /// Moved out by a sink access.
    Consumed,
    /// Differs between incoming paths.
    Conflict,
}

type StateMap = BTreeMap<Operand, SlotState>;

enum Legalized {
    Initialize,
    Assign,
}

pub fn run(module: &mut Module, function: FunctionId, diagnostics: &mut DiagnosticSink) {
    let f = module.function(function);
    let Some(entry) = f.entry() else {
        return;
    };
    let cfg = ControlFlow::of(f);
    let order = cfg.reverse_postorder(entry);
    let initial = entry_state(f, entry);

    // Fixpoint over block-exit states.
    let mut exits: HashMap<BlockId, StateMap> = HashMap::new();
    loop {
        let mut changed = false;
        for &block in &order {
            let input = block_input(&cfg, block, entry, &initial, &exits);
            let mut state = input;
            transfer(f, block, &mut state, None, None);
            if exits.get(&block) != Some(&state) {
                exits.insert(block, state);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    // Re-walk with the settled entry states, diagnosing and collecting the
    // move legalizations.
    let mut rewrites: Vec<(InstId, Legalized)> = vec![];
    for &block in &order {
        let mut state = block_input(&cfg, block, entry, &initial, &exits);
        transfer(
            f,
            block,
            &mut state,
            Some(diagnostics),
            Some(&mut rewrites),
        );
    }

    let f = module.function_mut(function);
    for (inst, legalized) in rewrites {
        let site = f.inst(inst).site;
        let InstKind::Move(m) = f.inst(inst).kind.clone() else {
            continue;
        };
        let replacement = match legalized {
            Legalized::Initialize => InstKind::Initialize(Initialize {
                value: m.value,
                target: m.target,
            }),
            Legalized::Assign => InstKind::Assign(Assign {
                value: m.value,
                target: m.target,
            }),
        };
        f.replace(inst, Inst::new(replacement, site));
    }
}

fn entry_state(f: &Function, entry: BlockId) -> StateMap {
    let mut state = StateMap::new();
    for (index, input) in f.inputs.iter().enumerate() {
        let slot = Operand::Parameter(entry, index);
        let initial = if input.access == AccessEffect::Set {
            SlotState::Uninitialized
        } else {
            SlotState::Initialized
        };
        state.insert(slot, initial);
    }
    if !f.is_subscript {
        // The trailing return-storage parameter starts uninitialized.
        state.insert(
            Operand::Parameter(entry, f.inputs.len()),
            SlotState::Uninitialized,
        );
    }
    state
}

fn block_input(
    cfg: &ControlFlow,
    block: BlockId,
    entry: BlockId,
    initial: &StateMap,
    exits: &HashMap<BlockId, StateMap>,
) -> StateMap {
    let mut input = if block == entry {
        initial.clone()
    } else {
        StateMap::new()
    };
    for pred in cfg.predecessors(block) {
        if let Some(out) = exits.get(&pred) {
            merge_into(&mut input, out);
        }
    }
    input
}

fn merge_into(into: &mut StateMap, from: &StateMap) {
    for (slot, &state) in from {
        match into.get(slot) {
            None => {
                into.insert(slot.clone(), state);
            }
            Some(&existing) if existing == state => {}
            Some(_) => {
                into.insert(slot.clone(), SlotState::Conflict);
            }
        }
    }
}

fn transfer(
    f: &Function,
    block: BlockId,
    state: &mut StateMap,
    mut diagnostics: Option<&mut DiagnosticSink>,
    mut rewrites: Option<&mut Vec<(InstId, Legalized)>>,
) {
    for &inst in &f.block(block).insts {
        match &f.inst(inst).kind {
            InstKind::AllocStack(_) => {
                state.insert(Operand::Register(inst), SlotState::Uninitialized);
            }
            InstKind::DeallocStack(i) => {
                set_roots(f, state, &i.target, SlotState::Uninitialized);
            }
            InstKind::Store(i) => {
                set_roots(f, state, &i.target, SlotState::Initialized);
            }
            InstKind::Initialize(i) => {
                set_roots(f, state, &i.target, SlotState::Initialized);
            }
            InstKind::Assign(i) => {
                set_roots(f, state, &i.target, SlotState::Initialized);
            }
            InstKind::Move(i) => {
                let roots = f.provenances(&i.target);
                let states = roots
                    .iter()
                    .map(|r| state.get(r).copied().unwrap_or(SlotState::Initialized))
                    .collect::<Vec<_>>();
                let legalized = if states
                    .iter()
                    .all(|s| matches!(s, SlotState::Uninitialized | SlotState::Consumed))
                {
                    Legalized::Initialize
                } else if states.iter().all(|s| *s == SlotState::Initialized) {
                    Legalized::Assign
                } else {
                    if let Some(d) = diagnostics.as_deref_mut() {
                        d.report(Diagnostic::error(
                            "initialization state of the target depends on control flow",
                            f.inst(inst).site,
                        ));
                    }
                    Legalized::Initialize
                };
                if let Some(r) = rewrites.as_deref_mut() {
                    r.push((inst, legalized));
                }
                set_roots(f, state, &i.target, SlotState::Initialized);
            }
            InstKind::MarkState(i) => {
                let next = if i.initialized {
                    SlotState::Initialized
                } else {
                    SlotState::Uninitialized
                };
                set_roots(f, state, &i.target, next);
            }
            InstKind::Access(a) => {
                let Some(selected) = a.selected else { continue };
                let roots = f.provenances(&a.source);
                match selected {
                    AccessEffect::Let | AccessEffect::Inout | AccessEffect::Yielded => {
                        check_readable(f, state, &roots, inst, diagnostics.as_deref_mut());
                    }
                    AccessEffect::Sink => {
                        check_readable(f, state, &roots, inst, diagnostics.as_deref_mut());
                        for root in &roots {
                            state.insert(root.clone(), SlotState::Consumed);
                        }
                    }
                    // A `set` access only grants the right to write; the
                    // store or move through it is what initializes.
                    AccessEffect::Set => {}
                }
            }
            _ => {}
        }
    }
}

fn check_readable(
    f: &Function,
    state: &StateMap,
    roots: &std::collections::BTreeSet<Operand>,
    inst: InstId,
    diagnostics: Option<&mut DiagnosticSink>,
) {
    let Some(d) = diagnostics else {
        return;
    };
    for root in roots {
        match state.get(root).copied() {
            Some(SlotState::Uninitialized) => {
                d.report(Diagnostic::error(
                    "use of uninitialized value",
                    f.inst(inst).site,
                ));
            }
            Some(SlotState::Consumed) => {
                d.report(Diagnostic::error(
                    "use of value after it was moved",
                    f.inst(inst).site,
                ));
            }
            Some(SlotState::Conflict) => {
                d.report(Diagnostic::error(
                    "value may be uninitialized on some paths",
                    f.inst(inst).site,
                ));
            }
            _ => {}
        }
    }
}

fn set_roots(f: &Function, state: &mut StateMap, target: &Operand, next: SlotState) {
    for root in f.provenances(target) {
        state.insert(root, next);
    }
}
