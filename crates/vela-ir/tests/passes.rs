//! End-to-end tests for the mandatory pass pipeline.

use vela_shared::{
    access::{AccessEffect, AccessEffectSet},
    diag::DiagnosticSink,
    scope::ScopeId,
    site::Site,
    ty::Type,
};

use vela_ir::{
    passes::run_mandatory_passes, Builder, Function, FunctionInput, InstKind, Linkage, Module,
    Operand,
};

fn site(line: u32) -> Site {
    Site::new(vela_shared::file_id::FileId(0), line, 1)
}

fn inout_word_function() -> Function {
    Function::new(
        "f",
        site(1),
        Linkage::Module,
        vec![FunctionInput {
            label: Some("x".into()),
            access: AccessEffect::Inout,
            ty: Type::word(),
        }],
        Type::unit(),
    )
}

#[test]
fn overlapping_inout_accesses_are_rejected() {
    let mut module = Module::new("test");
    let mut f = inout_word_function();
    let entry = f.append_entry_block(ScopeId(0));
    let id = module.add_function(f);

    let mut b = Builder::new(&mut module, id, entry);
    b.set_site(site(2));
    let first = b.access(
        AccessEffectSet::singleton(AccessEffect::Inout),
        Operand::parameter(entry, 0),
    );
    b.set_site(site(3));
    let second = b.access(
        AccessEffectSet::singleton(AccessEffect::Inout),
        Operand::parameter(entry, 0),
    );
    b.store(Operand::word(1), Operand::register(first));
    b.store(Operand::word(2), Operand::register(second));
    b.end_access(Operand::register(first));
    b.end_access(Operand::register(second));
    b.store(Operand::Constant(vela_ir::Constant::Unit), Operand::parameter(entry, 1));
    b.ret();

    let mut diagnostics = DiagnosticSink::new();
    run_mandatory_passes(&mut module, id, &mut diagnostics);

    assert!(diagnostics.has_errors());
    assert!(diagnostics
        .iter()
        .any(|d| d.message.contains("exclusivity violation")));
}

#[test]
fn sequential_accesses_split_by_blocks_are_accepted() {
    let mut module = Module::new("test");
    let mut f = inout_word_function();
    let entry = f.append_entry_block(ScopeId(0));
    let id = module.add_function(f);

    let tail = module.function_mut(id).append_block(ScopeId(0), vec![]);

    let mut b = Builder::new(&mut module, id, entry);
    b.set_site(site(2));
    let first = b.access(
        AccessEffectSet::singleton(AccessEffect::Inout),
        Operand::parameter(entry, 0),
    );
    b.store(Operand::word(1), Operand::register(first));
    b.end_access(Operand::register(first));
    b.branch(tail);

    let mut b = Builder::new(&mut module, id, tail);
    b.set_site(site(5));
    let second = b.access(
        AccessEffectSet::singleton(AccessEffect::Inout),
        Operand::parameter(entry, 0),
    );
    b.store(Operand::word(2), Operand::register(second));
    b.end_access(Operand::register(second));
    b.store(Operand::Constant(vela_ir::Constant::Unit), Operand::parameter(entry, 1));
    b.ret();

    let mut diagnostics = DiagnosticSink::new();
    run_mandatory_passes(&mut module, id, &mut diagnostics);

    assert!(!diagnostics.has_errors(), "{:?}", diagnostics);
}

#[test]
fn reading_uninitialized_storage_is_diagnosed() {
    let mut module = Module::new("test");
    let mut f = Function::new("f", site(1), Linkage::Module, vec![], Type::word());
    let entry = f.append_entry_block(ScopeId(0));
    let id = module.add_function(f);

    let mut b = Builder::new(&mut module, id, entry);
    b.set_site(site(2));
    let slot = b.alloc_stack(Type::word());
    let access = b.access(
        AccessEffectSet::singleton(AccessEffect::Let),
        Operand::register(slot),
    );
    let loaded = b.load(Operand::register(access));
    b.end_access(Operand::register(access));
    b.store(Operand::register(loaded), Operand::parameter(entry, 0));
    b.ret();

    let mut diagnostics = DiagnosticSink::new();
    run_mandatory_passes(&mut module, id, &mut diagnostics);

    assert!(diagnostics
        .iter()
        .any(|d| d.message == "use of uninitialized value"));
}

#[test]
fn using_a_value_after_it_moved_is_diagnosed() {
    let mut module = Module::new("test");
    let mut f = Function::new("f", site(1), Linkage::Module, vec![], Type::word());
    let entry = f.append_entry_block(ScopeId(0));
    let id = module.add_function(f);

    let mut b = Builder::new(&mut module, id, entry);
    b.set_site(site(2));
    let slot = b.alloc_stack(Type::word());
    b.store(Operand::word(7), Operand::register(slot));

    let consumed = b.access(
        AccessEffectSet::singleton(AccessEffect::Sink),
        Operand::register(slot),
    );
    let taken = b.load(Operand::register(consumed));
    b.end_access(Operand::register(consumed));
    b.store(Operand::register(taken), Operand::parameter(entry, 0));

    b.set_site(site(6));
    let read_back = b.access(
        AccessEffectSet::singleton(AccessEffect::Let),
        Operand::register(slot),
    );
    b.load(Operand::register(read_back));
    b.end_access(Operand::register(read_back));
    b.ret();

    let mut diagnostics = DiagnosticSink::new();
    run_mandatory_passes(&mut module, id, &mut diagnostics);

    assert!(diagnostics
        .iter()
        .any(|d| d.message == "use of value after it was moved"));
}

#[test]
fn passes_legalize_moves_and_close_every_access() {
    let mut module = Module::new("test");
    let mut f = Function::new("f", site(1), Linkage::Module, vec![], Type::unit());
    let entry = f.append_entry_block(ScopeId(0));
    let id = module.add_function(f);

    let mut b = Builder::new(&mut module, id, entry);
    b.set_site(site(2));
    let slot = b.alloc_stack(Type::word());
    let access = b.access(
        AccessEffectSet::singleton(AccessEffect::Set),
        Operand::register(slot),
    );
    // No end_access on purpose: borrow closing must insert one.
    b.move_value(Operand::word(4), Operand::register(access));
    b.store(Operand::Constant(vela_ir::Constant::Unit), Operand::parameter(entry, 0));
    b.ret();

    let mut diagnostics = DiagnosticSink::new();
    run_mandatory_passes(&mut module, id, &mut diagnostics);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics);

    let f = module.function(id);
    for block in f.block_ids() {
        for &inst in &f.block(block).insts {
            assert!(
                !matches!(f.inst(inst).kind, InstKind::Move(_)),
                "a move pseudo-instruction survived the passes"
            );
            if matches!(f.inst(inst).kind, InstKind::Access(_)) {
                let closed = f
                    .uses(&Operand::Register(inst))
                    .iter()
                    .any(|u| matches!(f.inst(u.user).kind, InstKind::EndAccess(_)));
                assert!(closed, "an access scope is never closed");
            }
        }
    }
    let text = format!("{}", f);
    assert!(text.contains("initialize "), "{}", text);
}

#[test]
fn textual_output_is_deterministic() {
    let build = || {
        let mut module = Module::new("test");
        let mut f = inout_word_function();
        let entry = f.append_entry_block(ScopeId(0));
        let id = module.add_function(f);
        let mut b = Builder::new(&mut module, id, entry);
        let access = b.access(
            AccessEffectSet::singleton(AccessEffect::Let),
            Operand::parameter(entry, 0),
        );
        let loaded = b.load(Operand::register(access));
        b.end_access(Operand::register(access));
        b.store(Operand::register(loaded), Operand::parameter(entry, 1));
        b.ret();
        let mut diagnostics = DiagnosticSink::new();
        run_mandatory_passes(&mut module, id, &mut diagnostics);
        format!("{}", module)
    };
    assert_eq!(build(), build());
}
