//! Synthetic implementations: default deinitializers and move operators,
//! generated on first demand for a conforming type and lowered through the
//! same builder the normal emitter uses.

use std::collections::HashMap;

use vela_shared::{
    access::AccessEffect,
    scope::ScopeId,
    site::Site,
    ty::{Type, TypeKind},
};

use crate::{
    builder::Builder,
    inst::Linkage,
    module::{Function, FunctionInput, Module},
    operand::{Constant, FunctionId, Operand},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyntheticKind {
    Deinit,
    MoveOperator,
}

/// Demand-driven store of synthesized functions, memoized per module so a
/// conformance is lowered at most once.
#[derive(Default)]
pub struct Synthesizer {
    memo: HashMap<(Type, SyntheticKind), FunctionId>,
}

impl Synthesizer {
    pub fn new() -> Synthesizer {
        Synthesizer::default()
    }

    /// The deinitializer for `ty`, generating it on first use.
    pub fn demand_deinit(&mut self, module: &mut Module, ty: &Type, site: Site) -> FunctionId {
        if let Some(id) = self.memo.get(&(ty.clone(), SyntheticKind::Deinit)) {
            return *id;
        }

        let name = format!("deinit.{}", ty);
        let function = Function::new(
            name,
            site,
            Linkage::Module,
            vec![FunctionInput {
                label: Some("self".into()),
                access: AccessEffect::Sink,
                ty: ty.clone(),
            }],
            Type::unit(),
        );
        let id = module.add_function(function);
        self.memo
            .insert((ty.clone(), SyntheticKind::Deinit), id);

        let entry = module.function_mut(id).append_entry_block(ScopeId(0));
        // Collect the element deinits first so nested demands do not fight
        // over the module borrow.
        let elements: Vec<(usize, Type)> = match ty.kind() {
            TypeKind::Tuple(t) => t
                .elements
                .iter()
                .enumerate()
                .map(|(i, e)| (i, e.ty.clone()))
                .collect(),
            _ => vec![],
        };
        let element_deinits = elements
            .iter()
            .map(|(index, element)| (*index, element.clone(), self.demand_deinit(module, element, site)))
            .collect::<Vec<_>>();

        let mut b = Builder::new(module, id, entry);
        b.set_site(site);
        let this = Operand::parameter(entry, 0);
        for (index, element, deinit) in element_deinits {
            let view = b.insert(crate::inst::InstKind::SubfieldView(crate::inst::SubfieldView {
                base: this.clone(),
                path: vec![index],
                ty: element.clone(),
            }));
            let access = b.access_one(AccessEffect::Sink, Operand::register(view));
            b.call(
                Operand::Constant(Constant::Function(deinit)),
                vec![AccessEffect::Sink],
                vec![Operand::register(access)],
                Type::unit(),
            );
            b.end_access(Operand::register(access));
        }
        b.store(Operand::Constant(Constant::Unit), Operand::parameter(entry, 1));
        b.ret();
        id
    }

    /// The move operator for `ty`: `(set/inout target, sink source)`,
    /// legalized later into an initialization or an assignment by the
    /// object-state pass.
    pub fn demand_move_operator(
        &mut self,
        module: &mut Module,
        ty: &Type,
        site: Site,
    ) -> FunctionId {
        if let Some(id) = self.memo.get(&(ty.clone(), SyntheticKind::MoveOperator)) {
            return *id;
        }

        let name = format!("move.{}", ty);
        let function = Function::new(
            name,
            site,
            Linkage::Module,
            vec![
                FunctionInput {
                    label: Some("target".into()),
                    access: AccessEffect::Set,
                    ty: ty.clone(),
                },
                FunctionInput {
                    label: Some("source".into()),
                    access: AccessEffect::Sink,
                    ty: ty.clone(),
                },
            ],
            Type::unit(),
        );
        let id = module.add_function(function);
        self.memo
            .insert((ty.clone(), SyntheticKind::MoveOperator), id);

        let entry = module.function_mut(id).append_entry_block(ScopeId(0));
        let mut b = Builder::new(module, id, entry);
        b.set_site(site);
        let source_access = b.access_one(AccessEffect::Sink, Operand::parameter(entry, 1));
        let value = b.load(Operand::register(source_access));
        b.end_access(Operand::register(source_access));
        let target_access = b.access_one(AccessEffect::Set, Operand::parameter(entry, 0));
        b.move_value(Operand::register(value), Operand::register(target_access));
        b.end_access(Operand::register(target_access));
        b.store(Operand::Constant(Constant::Unit), Operand::parameter(entry, 2));
        b.ret();
        id
    }
}

#[cfg(test)]
mod tests {
    use vela_shared::{
        diag::DiagnosticSink,
        site::Site,
        ty::{TupleElement, Type},
    };

    use crate::{module::Module, passes::run_mandatory_passes};

    use super::Synthesizer;

    #[test]
    fn deinit_is_generated_once_per_type() {
        let mut module = Module::new("test");
        let mut synth = Synthesizer::new();
        let pair = Type::tuple(vec![
            TupleElement {
                label: None,
                ty: Type::word(),
            },
            TupleElement {
                label: None,
                ty: Type::word(),
            },
        ]);
        let first = synth.demand_deinit(&mut module, &pair, Site::default());
        let second = synth.demand_deinit(&mut module, &pair, Site::default());
        assert_eq!(first, second);
        // The element type's deinit was demanded once as well.
        assert_eq!(module.function_ids().count(), 2);
    }

    #[test]
    fn synthesized_move_operator_survives_the_passes() {
        let mut module = Module::new("test");
        let mut synth = Synthesizer::new();
        let id = synth.demand_move_operator(&mut module, &Type::word(), Site::default());

        let mut diagnostics = DiagnosticSink::new();
        run_mandatory_passes(&mut module, id, &mut diagnostics);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics);

        // The move pseudo-instruction was legalized away.
        let text = format!("{}", module.function(id));
        assert!(!text.contains("move "), "{}", text);
        assert!(text.contains("initialize "), "{}", text);
    }
}
