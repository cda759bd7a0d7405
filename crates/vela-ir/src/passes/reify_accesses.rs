//! Access reification: narrow abstract access requests to the concrete
//! capability their provenance and downstream uses demand.

use vela_shared::{access::AccessEffect, diag::Diagnostic, diag::DiagnosticSink};

use crate::{
    inst::{Access, Inst, InstKind},
    module::{Function, Module},
    operand::{FunctionId, InstId, Operand},
};

pub fn run(module: &mut Module, function: FunctionId, diagnostics: &mut DiagnosticSink) {
    let f = module.function(function);
    let mut selections: Vec<(InstId, Access, AccessEffect)> = vec![];

    for block in f.block_ids() {
        for &inst in &f.block(block).insts {
            let InstKind::Access(a) = &f.inst(inst).kind else {
                continue;
            };
            if a.selected.is_some() {
                continue;
            }

            let required = demanded(f, inst);
            let Some(chosen) = a.capabilities.iter().filter(|c| *c >= required).min() else {
                diagnostics.report(Diagnostic::error(
                    format!(
                        "access requires capability '{}' but only {} are available",
                        required, a.capabilities
                    ),
                    f.inst(inst).site,
                ));
                continue;
            };
            if chosen == AccessEffect::Sink && !f.is_sink(&a.source) {
                diagnostics.report(Diagnostic::error(
                    "cannot take 'sink' access to a value not owned by this function",
                    f.inst(inst).site,
                ));
            }
            selections.push((inst, a.clone(), chosen));
        }
    }

    let f = module.function_mut(function);
    for (inst, access, chosen) in selections {
        log::debug!("[reify_accesses] {} <- {}", inst, chosen);
        let site = f.inst(inst).site;
        f.replace(
            inst,
            Inst::new(
                InstKind::Access(Access {
                    capabilities: access.capabilities,
                    source: access.source,
                    selected: Some(chosen),
                }),
                site,
            ),
        );
    }
}

/// The strongest capability the downstream uses of `register` demand.
fn demanded(f: &Function, register: InstId) -> AccessEffect {
    let mut required = AccessEffect::Let;
    for u in f.uses(&Operand::Register(register)) {
        let demand = match &f.inst(u.user).kind {
            InstKind::Load(_) | InstKind::EndAccess(_) => AccessEffect::Let,
            InstKind::Store(_) | InstKind::Move(_) | InstKind::Initialize(_)
            | InstKind::Assign(_)
                if u.index == 1 =>
            {
                // Writing through the address; `set` and `sink` also grant
                // this.
                AccessEffect::Inout
            }
            InstKind::Call(c) if u.index >= 1 => c.conventions[u.index - 1],
            // Derived addresses inherit the demand on their own result.
            InstKind::SubfieldView(_)
            | InstKind::AdvanceByBytes(_)
            | InstKind::Project(_)
            | InstKind::WrapExistentialAddr(_)
            | InstKind::Access(_) => demanded(f, u.user),
            _ => AccessEffect::Let,
        };
        required = required.max(demand);
    }
    required
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
        inst::{InstKind, Linkage},
        module::{Function, FunctionInput, Module},
        operand::Operand,
    };

    #[test]
    fn read_only_use_narrows_to_let() {
        let mut module = Module::new("test");
        let mut f = Function::new("f", Site::default(), Linkage::Module, vec![], Type::word());
        let entry = f.append_entry_block(ScopeId(0));
        let id = module.add_function(f);

        let mut b = Builder::new(&mut module, id, entry);
        let slot = b.alloc_stack(Type::word());
        b.store(Operand::word(1), Operand::register(slot));
        let all = AccessEffectSet::from_iter([AccessEffect::Let, AccessEffect::Inout]);
        let access = b.access(all, Operand::register(slot));
        let loaded = b.load(Operand::register(access));
        b.store(Operand::register(loaded), Operand::parameter(entry, 0));
        b.end_access(Operand::register(access));
        b.ret();

        let mut diagnostics = DiagnosticSink::new();
        super::run(&mut module, id, &mut diagnostics);
        assert!(diagnostics.is_empty());

        let f = module.function(id);
        let InstKind::Access(a) = &f.inst(access).kind else {
            panic!("not an access");
        };
        assert_eq!(a.selected, Some(AccessEffect::Let));
    }

    #[test]
    fn sink_demand_on_borrowed_parameter_is_rejected() {
        let mut module = Module::new("test");
        let mut f = Function::new(
            "f",
            Site::default(),
            Linkage::Module,
            vec![FunctionInput {
                label: None,
                access: AccessEffect::Let,
                ty: Type::word(),
            }],
            Type::unit(),
        );
        let entry = f.append_entry_block(ScopeId(0));
        let id = module.add_function(f);

        let mut b = Builder::new(&mut module, id, entry);
        let access = b.access(
            AccessEffectSet::singleton(AccessEffect::Sink),
            Operand::parameter(entry, 0),
        );
        let callee = b.alloc_stack(Type::ptr());
        let callee_addr = Operand::register(callee);
        b.call(
            callee_addr,
            vec![AccessEffect::Sink],
            vec![Operand::register(access)],
            Type::unit(),
        );
        b.end_access(Operand::register(access));
        b.ret();

        let mut diagnostics = DiagnosticSink::new();
        super::run(&mut module, id, &mut diagnostics);
        assert!(diagnostics.has_errors());
    }
}
