//! A mock typed-program query surface for solver tests.

use std::collections::{HashMap, HashSet};

use vela_shared::{
    builtins::BuiltinConcept,
    decl::{DeclId, DeclRef, Name},
    scope::ScopeId,
    ty::Type,
};

use crate::{
    querier::{CandidateSet, NameResolutionCandidate, ProgramQuerier, ResolutionPurpose},
    relations::TypeRelations,
};

struct MemberEntry {
    subject: Option<Type>,
    decl: DeclId,
}

#[derive(Default)]
pub struct MockQuerier {
    relations: TypeRelations,
    decl_types: HashMap<DeclId, Type>,
    decl_names: HashMap<DeclId, Name>,
    members: HashMap<Name, Vec<MemberEntry>>,
    conformances: Vec<(Type, DeclId)>,
    builtin_concepts: HashMap<DeclId, BuiltinConcept>,
    requirements: HashSet<DeclId>,
    entries: HashSet<DeclId>,
}

impl MockQuerier {
    pub fn new() -> MockQuerier {
        MockQuerier::default()
    }

    pub fn add_decl(&mut self, decl: DeclId, name: impl Into<Name>, ty: Type) {
        self.decl_names.insert(decl, name.into());
        self.decl_types.insert(decl, ty);
    }

    /// Expose `decl` as a member `name` of `subject` (or of any subject when
    /// `None`).
    pub fn add_member(&mut self, name: impl Into<Name>, subject: Option<Type>, decl: DeclId) {
        self.members
            .entry(name.into())
            .or_default()
            .push(MemberEntry { subject, decl });
    }

    pub fn add_conformance(&mut self, model: Type, concept: DeclId) {
        self.conformances.push((model, concept));
    }

    pub fn add_builtin_concept(&mut self, decl: DeclId, concept: BuiltinConcept) {
        self.builtin_concepts.insert(decl, concept);
    }

    pub fn mark_requirement(&mut self, decl: DeclId) {
        self.requirements.insert(decl);
    }

    pub fn mark_module_entry(&mut self, decl: DeclId) {
        self.entries.insert(decl);
    }
}

impl ProgramQuerier for MockQuerier {
    fn relations(&self) -> &TypeRelations {
        &self.relations
    }

    fn decl_type(&self, decl: DeclId) -> Type {
        self.decl_types.get(&decl).cloned().unwrap_or_else(Type::error)
    }

    fn decl_name(&self, decl: DeclId) -> Name {
        self.decl_names
            .get(&decl)
            .cloned()
            .unwrap_or_else(|| Name::from("_"))
    }

    fn conformed_traits(&self, model: &Type, _scope: ScopeId) -> Vec<DeclId> {
        self.conformances
            .iter()
            .filter(|(m, _)| self.relations.are_equivalent(m, model))
            .map(|(_, c)| *c)
            .collect()
    }

    fn builtin_concept(&self, concept: DeclId) -> Option<BuiltinConcept> {
        self.builtin_concepts.get(&concept).copied()
    }

    fn resolve(
        &self,
        name: &Name,
        subject: Option<&Type>,
        _scope: ScopeId,
        _purpose: ResolutionPurpose,
    ) -> CandidateSet {
        let mut set = CandidateSet::default();
        let Some(entries) = self.members.get(name) else {
            return set;
        };
        for entry in entries {
            let matches = match (&entry.subject, subject) {
                (None, _) => true,
                (Some(expected), Some(actual)) => self.relations.are_equivalent(expected, actual),
                (Some(_), None) => false,
            };
            if matches {
                set.viable.push(NameResolutionCandidate {
                    reference: DeclRef::new(entry.decl),
                    ty: self.decl_type(entry.decl),
                    constraints: vec![],
                });
            }
        }
        set
    }

    fn is_requirement(&self, decl: DeclId) -> bool {
        self.requirements.contains(&decl)
    }

    fn is_module_entry(&self, decl: DeclId) -> bool {
        self.entries.contains(&decl)
    }
}
