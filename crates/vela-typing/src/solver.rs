//! The constraint solver: a fresh/stale goal queue over a substitution map
//! and a binding map.
//!
//! Disjunctions and overloads fork the whole solver state per choice; forks
//! are pruned by score against the best solution seen so far, and equally
//! scored survivors are ranked by specificity.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use vela_shared::{
    builtins::BuiltinConcept,
    decl::{DeclRef, Name},
    node_id::ExprId,
    scope::ScopeId,
    site::Site,
    ty::{CallableParam, CallableStyle, FreshVarAllocator, Type, TypeKind, TypeVar},
};

use crate::{
    error::{TypeError, TypeErrorKind},
    goal::{Choice, Goal, GoalId, GoalKind, GoalOrigin, OriginKind, OverloadCandidate},
    outcome::{delegate_diagnosis, DiagnoseFn, Outcome, Outcomes},
    querier::{open_type, NameResolutionCandidate, ProgramQuerier, ResolutionPurpose},
    ranking::{self, SolutionOrdering},
    solution::{Score, Solution},
    subst::{SubstitutionMap, Unresolved},
    trace::InferenceTracer,
    unify::unify,
};

enum Resolution {
    Decided(Outcome),
    Postponed,
}

/// One alternative explored by a disjunction or overload.
struct Branch {
    penalty: u32,
    bind: Option<(ExprId, DeclRef)>,
    goals: Vec<Goal>,
}

/// The forkable solver state. Deliberately free of outward references so
/// that a fork is a plain value clone.
#[derive(Clone, Debug)]
pub struct ConstraintSystem {
    scope: ScopeId,
    goals: Vec<Goal>,
    outcomes: Outcomes,
    /// Worklist ordered by simplicity, simplest at the tail.
    fresh: Vec<GoalId>,
    /// Goals awaiting more substitution progress.
    stale: Vec<GoalId>,
    /// Index from variable to the stale goals mentioning it.
    stale_index: HashMap<TypeVar, BTreeSet<GoalId>>,
    type_assumptions: SubstitutionMap,
    binding_assumptions: HashMap<ExprId, DeclRef>,
    penalties: u32,
    vars: FreshVarAllocator,
    tracer: Option<InferenceTracer>,
}

impl ConstraintSystem {
    pub fn new(
        scope: ScopeId,
        seeds: Vec<Goal>,
        bindings: HashMap<ExprId, DeclRef>,
    ) -> ConstraintSystem {
        let mut system = ConstraintSystem {
            scope,
            goals: vec![],
            outcomes: Outcomes::new(),
            fresh: vec![],
            stale: vec![],
            stale_index: HashMap::new(),
            type_assumptions: SubstitutionMap::new(),
            binding_assumptions: bindings,
            penalties: 0,
            vars: FreshVarAllocator::new(),
            tracer: None,
        };
        for goal in seeds {
            system.insert_goal(goal);
        }
        system
    }

    /// Attach a trace sink. Must be done before solving starts.
    pub fn with_tracer(mut self, tracer: InferenceTracer) -> ConstraintSystem {
        self.tracer = Some(tracer);
        self
    }

    /// Continue allocating fresh variables from a caller-owned counter, so
    /// seeded goals and solver-opened types cannot collide.
    pub fn with_fresh_vars(mut self, vars: FreshVarAllocator) -> ConstraintSystem {
        self.vars = vars;
        self
    }

    pub fn score(&self) -> Score {
        Score::new(self.outcomes.failure_count(), self.penalties)
    }

    /// Solve to the best reachable solution.
    pub fn solve(self, querier: &dyn ProgramQuerier) -> Solution {
        if let Some(t) = &self.tracer {
            t.headers(
                self.fresh.iter().map(|&id| (id, &self.goals[id])),
                self.stale.iter().map(|&id| (id, &self.goals[id])),
            );
        }
        match self.solve_impl(querier, Score::MAX) {
            Some(solution) => solution,
            None => unreachable!("unbounded solve cannot be pruned"),
        }
    }

    /// Solve, returning `None` as soon as pruning shows no solution at or
    /// under `max_score` is reachable.
    pub fn solve_not_worse_than(
        self,
        max_score: Score,
        querier: &dyn ProgramQuerier,
    ) -> Option<Solution> {
        self.solve_impl(querier, max_score)
            .filter(|s| s.score() <= max_score)
    }

    fn solve_impl(mut self, querier: &dyn ProgramQuerier, bound: Score) -> Option<Solution> {
        while let Some(id) = self.fresh.pop() {
            if self.score() > bound {
                if let Some(t) = &self.tracer {
                    t.abort();
                }
                return None;
            }

            // Apply the current substitutions to the goal in place.
            let goal = self.goals[id].applying(&self.type_assumptions);
            self.goals[id] = goal.clone();
            if let Some(t) = &self.tracer {
                t.solve(id, &goal);
            }

            match &goal.kind {
                GoalKind::Disjunction { .. } | GoalKind::Overload { .. } => {
                    return self.solve_branches(id, querier, bound);
                }
                _ => {}
            }

            match self.solve_goal(id, &goal, querier) {
                Resolution::Postponed => self.postpone(id),
                Resolution::Decided(outcome) => {
                    if let Some(t) = &self.tracer {
                        match &outcome {
                            Outcome::Success => t.success(id),
                            Outcome::Failure(_) => t.failure(id),
                            Outcome::Product(..) => {}
                        }
                    }
                    self.outcomes.set(id, outcome);
                }
            }
        }

        Some(self.finalize())
    }

    fn solve_goal(&mut self, id: GoalId, goal: &Goal, querier: &dyn ProgramQuerier) -> Resolution {
        match &goal.kind {
            GoalKind::Equality { lhs, rhs } => self.solve_equality(goal, lhs, rhs),
            GoalKind::Subtyping { lhs, rhs, strict } => {
                self.solve_subtyping(id, goal, lhs, rhs, *strict, querier)
            }
            GoalKind::Conformance { model, concept } => {
                self.solve_conformance(id, goal, model, *concept, querier)
            }
            GoalKind::Parameter { lhs, rhs } => self.solve_parameter(id, goal, lhs, rhs),
            GoalKind::Member {
                subject,
                name,
                member_ty,
                member_expr,
                purpose,
            } => self.solve_member(
                id,
                goal,
                subject,
                name,
                member_ty,
                *member_expr,
                *purpose,
                querier,
            ),
            GoalKind::TupleMember {
                subject,
                index,
                element_ty,
            } => self.solve_tuple_member(goal, subject, *index, element_ty),
            GoalKind::Call {
                callee,
                labels,
                arguments,
                output,
                style,
            } => self.solve_call(id, goal, callee, labels, arguments, output, *style),
            GoalKind::Merging {
                supertype,
                branches,
            } => self.solve_merging(id, goal, supertype, branches),
            GoalKind::Disjunction { .. } | GoalKind::Overload { .. } => {
                unreachable!("branch goals are handled by the main loop")
            }
        }
    }

    // Equality: run unification.

    fn solve_equality(&mut self, goal: &Goal, lhs: &Type, rhs: &Type) -> Resolution {
        let diagnose = reified_failure(
            |l, r| TypeErrorKind::Unification(l, r),
            lhs.clone(),
            rhs.clone(),
            goal.origin.site,
        );
        Resolution::Decided(self.unify_as_outcome(lhs, rhs, diagnose))
    }

    fn unify_as_outcome(&mut self, lhs: &Type, rhs: &Type, diagnose: DiagnoseFn) -> Outcome {
        let mut assumed = vec![];
        let ok = unify(lhs, rhs, &mut self.type_assumptions, &mut assumed);
        self.did_assume(assumed);
        if ok {
            Outcome::Success
        } else {
            Outcome::Failure(diagnose)
        }
    }

    // Subtyping.

    fn solve_subtyping(
        &mut self,
        id: GoalId,
        goal: &Goal,
        lhs: &Type,
        rhs: &Type,
        strict: bool,
        querier: &dyn ProgramQuerier,
    ) -> Resolution {
        let relations = querier.relations();
        let origin = goal.origin;
        let diagnose = subtype_failure(origin, strict, lhs.clone(), rhs.clone());

        // Equivalence is established early; strict subtyping excludes it.
        if !lhs.contains_variable()
            && !rhs.contains_variable()
            && relations.are_equivalent(lhs, rhs)
        {
            return if strict {
                Resolution::Decided(Outcome::Failure(diagnose))
            } else {
                Resolution::Decided(Outcome::Success)
            };
        }

        // When both sides are non-canonical, canonicalize and retry.
        let (lhs, rhs) = if !lhs.is_canonical() && !rhs.is_canonical() {
            (relations.canonical(lhs), relations.canonical(rhs))
        } else {
            (lhs.clone(), rhs.clone())
        };

        match (lhs.kind(), rhs.kind()) {
            (TypeKind::Error, _) | (_, TypeKind::Error) => {
                Resolution::Decided(Outcome::Success)
            }

            // Variables postpone under strictness; otherwise they spawn
            // inference alternatives.
            (TypeKind::Var(_), _) | (_, TypeKind::Var(_)) if strict => Resolution::Postponed,

            (TypeKind::Var(_), _) => {
                if rhs.is_leaf() {
                    // The only strict subtype of a leaf is `Never`; assume
                    // equality directly.
                    Resolution::Decided(self.unify_as_outcome(&lhs, &rhs, diagnose))
                } else {
                    let choices = vec![
                        Choice {
                            goals: vec![Goal::new(
                                GoalKind::Equality {
                                    lhs: lhs.clone(),
                                    rhs: rhs.clone(),
                                },
                                origin,
                            )],
                            penalty: 0,
                        },
                        Choice {
                            goals: vec![Goal::new(
                                GoalKind::Subtyping {
                                    lhs: lhs.clone(),
                                    rhs: rhs.clone(),
                                    strict: true,
                                },
                                origin,
                            )],
                            penalty: 1,
                        },
                    ];
                    Resolution::Decided(self.spawn_disjunction(id, origin, choices, diagnose))
                }
            }

            (_, TypeKind::Var(_)) => {
                // A leaf has no structure a strict-subtyping subgoal could
                // ever refine against an unresolved variable; the alternative
                // then pins the relation through `Never`.
                let alternative = if lhs.is_leaf() {
                    Goal::new(
                        GoalKind::Equality {
                            lhs: Type::never(),
                            rhs: rhs.clone(),
                        },
                        origin,
                    )
                } else {
                    Goal::new(
                        GoalKind::Subtyping {
                            lhs: lhs.clone(),
                            rhs: rhs.clone(),
                            strict: true,
                        },
                        origin,
                    )
                };
                let choices = vec![
                    Choice {
                        goals: vec![Goal::new(
                            GoalKind::Equality {
                                lhs: lhs.clone(),
                                rhs: rhs.clone(),
                            },
                            origin,
                        )],
                        penalty: 0,
                    },
                    Choice {
                        goals: vec![alternative],
                        penalty: 1,
                    },
                ];
                Resolution::Decided(self.spawn_disjunction(id, origin, choices, diagnose))
            }

            // A union is below `rhs` iff every member is.
            (TypeKind::Union(lu), _) => {
                let subs = lu
                    .members
                    .iter()
                    .map(|m| {
                        Goal::new(
                            GoalKind::Subtyping {
                                lhs: m.clone(),
                                rhs: rhs.clone(),
                                strict: false,
                            },
                            origin,
                        )
                    })
                    .collect();
                Resolution::Decided(self.spawn_product(id, subs, diagnose))
            }

            (_, TypeKind::Union(ru)) => match ru.members.len() {
                0 => Resolution::Decided(self.unify_as_outcome(&lhs, &Type::never(), diagnose)),
                1 => {
                    let subs = vec![Goal::new(
                        GoalKind::Subtyping {
                            lhs: lhs.clone(),
                            rhs: ru.members[0].clone(),
                            strict,
                        },
                        origin,
                    )];
                    Resolution::Decided(self.spawn_product(id, subs, diagnose))
                }
                n => {
                    let mut choices = vec![];
                    if !strict {
                        choices.push(Choice {
                            goals: vec![Goal::new(
                                GoalKind::Equality {
                                    lhs: lhs.clone(),
                                    rhs: rhs.clone(),
                                },
                                origin,
                            )],
                            penalty: 0,
                        });
                    }
                    for dropped in 0..n {
                        let subset = ru
                            .members
                            .iter()
                            .enumerate()
                            .filter(|(i, _)| *i != dropped)
                            .map(|(_, m)| m.clone())
                            .collect::<Vec<_>>();
                        // A strict subset of the members already guarantees
                        // strictness.
                        choices.push(Choice {
                            goals: vec![Goal::new(
                                GoalKind::Subtyping {
                                    lhs: lhs.clone(),
                                    rhs: Type::union(subset),
                                    strict: false,
                                },
                                origin,
                            )],
                            penalty: 1,
                        });
                    }
                    Resolution::Decided(self.spawn_disjunction(id, origin, choices, diagnose))
                }
            },

            // A projection handle is below whatever its bare type is below.
            (TypeKind::Remote(rl), _) => {
                let subs = vec![Goal::new(
                    GoalKind::Subtyping {
                        lhs: rl.bare.clone(),
                        rhs: rhs.clone(),
                        strict,
                    },
                    origin,
                )];
                Resolution::Decided(self.spawn_product(id, subs, diagnose))
            }

            (_, TypeKind::Existential(e)) => match &e.interface {
                vela_shared::ty::ExistentialInterface::Traits(traits) => {
                    // Erasing behind a trait interface is a coercion.
                    self.penalties += 1;
                    let subs = traits
                        .iter()
                        .map(|t| {
                            Goal::new(
                                GoalKind::Conformance {
                                    model: lhs.clone(),
                                    concept: *t,
                                },
                                origin,
                            )
                        })
                        .collect();
                    Resolution::Decided(self.spawn_product(id, subs, diagnose))
                }
                vela_shared::ty::ExistentialInterface::Generic(base) => {
                    let (opened, _) = open_type(base, &mut self.vars);
                    let subs = vec![Goal::new(
                        GoalKind::Equality {
                            lhs: lhs.clone(),
                            rhs: opened,
                        },
                        origin,
                    )];
                    Resolution::Decided(self.spawn_product(id, subs, diagnose))
                }
                vela_shared::ty::ExistentialInterface::Metatype => {
                    match lhs.kind() {
                        TypeKind::Metatype(_) => Resolution::Decided(Outcome::Success),
                        _ => Resolution::Decided(Outcome::Failure(diagnose)),
                    }
                }
            },

            (TypeKind::Lambda(la), TypeKind::Lambda(lb)) => {
                if la.inputs.len() != lb.inputs.len()
                    || la
                        .inputs
                        .iter()
                        .zip(lb.inputs.iter())
                        .any(|(a, b)| a.label != b.label)
                {
                    let error = TypeError::new(
                        TypeErrorKind::LabelMismatch {
                            found: la.labels(),
                            expected: lb.labels(),
                        },
                        origin.site,
                    );
                    return Resolution::Decided(Outcome::Failure(simple_failure(error)));
                }
                if la.style != lb.style {
                    return Resolution::Decided(Outcome::Failure(diagnose));
                }
                let mut subs = vec![Goal::new(
                    GoalKind::Subtyping {
                        lhs: la.environment.clone(),
                        rhs: lb.environment.clone(),
                        strict: false,
                    },
                    origin,
                )];
                for (a, b) in la.inputs.iter().zip(lb.inputs.iter()) {
                    // Parameters are contravariant.
                    subs.push(Goal::new(
                        GoalKind::Subtyping {
                            lhs: b.ty.clone(),
                            rhs: a.ty.clone(),
                            strict: false,
                        },
                        origin,
                    ));
                }
                subs.push(Goal::new(
                    GoalKind::Subtyping {
                        lhs: la.output.clone(),
                        rhs: lb.output.clone(),
                        strict: false,
                    },
                    origin,
                ));
                Resolution::Decided(self.spawn_product(id, subs, diagnose))
            }

            (TypeKind::Tuple(ta), TypeKind::Tuple(tb)) => {
                if ta.elements.len() != tb.elements.len()
                    || ta
                        .elements
                        .iter()
                        .zip(tb.elements.iter())
                        .any(|(a, b)| a.label != b.label)
                {
                    return Resolution::Decided(Outcome::Failure(diagnose));
                }
                let subs = ta
                    .elements
                    .iter()
                    .zip(tb.elements.iter())
                    .map(|(a, b)| {
                        Goal::new(
                            GoalKind::Subtyping {
                                lhs: a.ty.clone(),
                                rhs: b.ty.clone(),
                                strict: false,
                            },
                            origin,
                        )
                    })
                    .collect();
                Resolution::Decided(self.spawn_product(id, subs, diagnose))
            }

            (TypeKind::Parameter(pa), TypeKind::Parameter(pb)) => {
                if pa.access != pb.access {
                    return Resolution::Decided(Outcome::Failure(diagnose));
                }
                let subs = vec![Goal::new(
                    GoalKind::Subtyping {
                        lhs: pa.bare.clone(),
                        rhs: pb.bare.clone(),
                        strict,
                    },
                    origin,
                )];
                Resolution::Decided(self.spawn_product(id, subs, diagnose))
            }

            _ => {
                if strict {
                    Resolution::Decided(Outcome::Failure(diagnose))
                } else {
                    Resolution::Decided(self.unify_as_outcome(&lhs, &rhs, diagnose))
                }
            }
        }
    }

    // Conformance.

    fn solve_conformance(
        &mut self,
        id: GoalId,
        goal: &Goal,
        model: &Type,
        concept: vela_shared::decl::DeclId,
        querier: &dyn ProgramQuerier,
    ) -> Resolution {
        if model.is_variable() {
            return Resolution::Postponed;
        }

        let concept_name = querier.decl_name(concept);
        let diagnose = conformance_failure(model.clone(), concept_name, goal.origin.site);

        if querier
            .conformed_traits(model, self.scope)
            .contains(&concept)
        {
            return Resolution::Decided(Outcome::Success);
        }

        match querier.builtin_concept(concept) {
            Some(BuiltinConcept::Movable) => match model.kind() {
                TypeKind::Builtin(_) => Resolution::Decided(Outcome::Success),
                TypeKind::Tuple(t) => {
                    let subs = t
                        .elements
                        .iter()
                        .map(|e| {
                            Goal::new(
                                GoalKind::Conformance {
                                    model: e.ty.clone(),
                                    concept,
                                },
                                goal.origin,
                            )
                        })
                        .collect();
                    Resolution::Decided(self.spawn_product(id, subs, diagnose))
                }
                TypeKind::Union(u) => {
                    let subs = u
                        .members
                        .iter()
                        .map(|m| {
                            Goal::new(
                                GoalKind::Conformance {
                                    model: m.clone(),
                                    concept,
                                },
                                goal.origin,
                            )
                        })
                        .collect();
                    Resolution::Decided(self.spawn_product(id, subs, diagnose))
                }
                _ => Resolution::Decided(Outcome::Failure(diagnose)),
            },
            Some(BuiltinConcept::ForeignConvertible) => match model.kind() {
                TypeKind::Builtin(_) => Resolution::Decided(Outcome::Success),
                _ => Resolution::Decided(Outcome::Failure(diagnose)),
            },
            None => Resolution::Decided(Outcome::Failure(diagnose)),
        }
    }

    // Parameter passing.

    fn solve_parameter(
        &mut self,
        id: GoalId,
        goal: &Goal,
        lhs: &Type,
        rhs: &Type,
    ) -> Resolution {
        match rhs.kind() {
            TypeKind::Var(_) => Resolution::Postponed,
            TypeKind::Parameter(p) => {
                let diagnose = reified_failure(
                    |l, r| TypeErrorKind::ParameterPassing(l, r),
                    lhs.clone(),
                    rhs.clone(),
                    goal.origin.site,
                );
                let subs = vec![Goal::new(
                    GoalKind::Subtyping {
                        lhs: lhs.clone(),
                        rhs: p.bare.clone(),
                        strict: false,
                    },
                    goal.origin,
                )];
                Resolution::Decided(self.spawn_product(id, subs, diagnose))
            }
            _ => {
                let error = TypeError::new(
                    TypeErrorKind::InvalidParameterType(rhs.clone()),
                    goal.origin.site,
                );
                Resolution::Decided(Outcome::Failure(simple_failure(error)))
            }
        }
    }

    // Member resolution.

    #[allow(clippy::too_many_arguments)]
    fn solve_member(
        &mut self,
        id: GoalId,
        goal: &Goal,
        subject: &Type,
        name: &Name,
        member_ty: &Type,
        member_expr: ExprId,
        purpose: ResolutionPurpose,
        querier: &dyn ProgramQuerier,
    ) -> Resolution {
        if subject.is_variable() {
            return Resolution::Postponed;
        }

        let set = querier.resolve(name, Some(subject), self.scope, purpose);

        if set.is_empty() {
            let error = TypeError::new(
                TypeErrorKind::UndefinedName(name.clone()),
                goal.origin.site,
            );
            return Resolution::Decided(Outcome::Failure(simple_failure(error)));
        }

        if set.viable.is_empty() {
            let collected = set
                .non_viable
                .into_iter()
                .map(|(_, d)| d)
                .collect::<Vec<_>>();
            let error = TypeError::new(
                TypeErrorKind::NoViableCandidate(name.clone()),
                goal.origin.site,
            );
            let diagnose: DiagnoseFn = Rc::new(move |sink, _, _| {
                sink.report(error.clone().into_diagnostic());
                for d in &collected {
                    sink.report(d.clone());
                }
            });
            return Resolution::Decided(Outcome::Failure(diagnose));
        }

        if set.viable.len() == 1 {
            let NameResolutionCandidate {
                reference,
                ty,
                constraints,
            } = set.viable.into_iter().next().expect("one viable candidate");
            self.binding_assumptions.insert(member_expr, reference);
            let mut subs = constraints;
            subs.push(Goal::new(
                GoalKind::Equality {
                    lhs: ty,
                    rhs: member_ty.clone(),
                },
                goal.origin,
            ));
            return Resolution::Decided(self.spawn_product_delegating(id, subs));
        }

        // Multiple viable candidates: explore them as an overload.
        let candidates = set
            .viable
            .into_iter()
            .map(|c| {
                let penalty = if querier.is_requirement(c.reference.decl) {
                    1
                } else {
                    0
                };
                OverloadCandidate {
                    reference: c.reference,
                    ty: c.ty,
                    goals: c.constraints,
                    penalty,
                }
            })
            .collect();
        let overload = Goal::new(
            GoalKind::Overload {
                overloaded_expr: member_expr,
                ty: member_ty.clone(),
                candidates,
            },
            goal.origin.subordinate(id),
        );
        let oid = self.insert_goal(overload);
        Resolution::Decided(Outcome::Product(
            vec![oid],
            delegate_diagnosis(vec![oid]),
        ))
    }

    // Tuple member.

    fn solve_tuple_member(
        &mut self,
        goal: &Goal,
        subject: &Type,
        index: usize,
        element_ty: &Type,
    ) -> Resolution {
        match subject.kind() {
            TypeKind::Var(_) => Resolution::Postponed,
            TypeKind::Tuple(t) if index < t.elements.len() => {
                let diagnose = reified_failure(
                    |l, r| TypeErrorKind::Unification(l, r),
                    t.elements[index].ty.clone(),
                    element_ty.clone(),
                    goal.origin.site,
                );
                let element = t.elements[index].ty.clone();
                Resolution::Decided(self.unify_as_outcome(&element, element_ty, diagnose))
            }
            _ => {
                let error = TypeError::new(
                    TypeErrorKind::TupleIndexOutOfRange(subject.clone(), index),
                    goal.origin.site,
                );
                Resolution::Decided(Outcome::Failure(simple_failure(error)))
            }
        }
    }

    // Calls.

    #[allow(clippy::too_many_arguments)]
    fn solve_call(
        &mut self,
        id: GoalId,
        goal: &Goal,
        callee: &Type,
        labels: &[Option<Name>],
        arguments: &[Type],
        output: &Type,
        style: CallableStyle,
    ) -> Resolution {
        let (params, callee_output): (&[CallableParam], &Type) = match callee.kind() {
            TypeKind::Var(_) => return Resolution::Postponed,
            TypeKind::Lambda(l) if l.style == style => (&l.inputs, &l.output),
            TypeKind::Method(m) if style == CallableStyle::Arrow => (&m.inputs, &m.output),
            _ => {
                let error = TypeError::new(
                    TypeErrorKind::NotCallable(callee.clone(), style),
                    goal.origin.site,
                );
                return Resolution::Decided(Outcome::Failure(simple_failure(error)));
            }
        };

        // Match argument labels to parameter labels; parameters with
        // defaults may be skipped.
        debug_assert_eq!(labels.len(), arguments.len());
        let mut pairs = vec![];
        let mut next_argument = 0usize;
        let mut matched = true;
        for param in params {
            if next_argument < arguments.len() && labels[next_argument] == param.label {
                pairs.push((arguments[next_argument].clone(), param.ty.clone()));
                next_argument += 1;
            } else if param.has_default {
                continue;
            } else {
                matched = false;
                break;
            }
        }
        if !matched || next_argument != arguments.len() {
            let error = TypeError::new(
                TypeErrorKind::LabelMismatch {
                    found: format_labels(labels),
                    expected: vela_shared::ty::labels_of(params),
                },
                goal.origin.site,
            );
            return Resolution::Decided(Outcome::Failure(simple_failure(error)));
        }

        let argument_origin = GoalOrigin::new(goal.origin.site, OriginKind::Argument);
        let mut subs = pairs
            .into_iter()
            .map(|(argument, parameter)| {
                Goal::new(
                    GoalKind::Parameter {
                        lhs: argument,
                        rhs: parameter,
                    },
                    argument_origin,
                )
            })
            .collect::<Vec<_>>();
        subs.push(Goal::new(
            GoalKind::Equality {
                lhs: callee_output.clone(),
                rhs: output.clone(),
            },
            goal.origin,
        ));
        Resolution::Decided(self.spawn_product_delegating(id, subs))
    }

    // Conditional joins.

    fn solve_merging(
        &mut self,
        id: GoalId,
        goal: &Goal,
        supertype: &Type,
        branches: &[Type],
    ) -> Resolution {
        if branches.is_empty() {
            return Resolution::Decided(Outcome::Success);
        }
        let branch_origin = GoalOrigin::new(goal.origin.site, OriginKind::Branch);
        let subs = branches
            .iter()
            .map(|b| {
                Goal::new(
                    GoalKind::Subtyping {
                        lhs: b.clone(),
                        rhs: supertype.clone(),
                        strict: false,
                    },
                    branch_origin,
                )
            })
            .collect::<Vec<_>>();

        let supertype = supertype.clone();
        let branches = branches.to_vec();
        let site = goal.origin.site;
        let outcome = self.spawn_product_with(id, subs, move |sub_ids| {
            Rc::new(move |sink, subst, outcomes| {
                let failed = sub_ids.iter().position(|&s| outcomes.failed(s));
                let branch = failed
                    .and_then(|i| branches.get(i))
                    .cloned()
                    .unwrap_or_else(Type::error);
                let b = subst.reify(&branch, Unresolved::SubstitutedByError);
                let s = subst.reify(&supertype, Unresolved::SubstitutedByError);
                sink.report(
                    TypeError::new(TypeErrorKind::BranchesMismatch(b, s), site)
                        .into_diagnostic(),
                );
            })
        });
        Resolution::Decided(outcome)
    }

    // Disjunction and overload exploration.

    fn solve_branches(
        self,
        id: GoalId,
        querier: &dyn ProgramQuerier,
        bound: Score,
    ) -> Option<Solution> {
        let origin = self.goals[id].origin;
        let (branches, ambiguity) = match &self.goals[id].kind {
            GoalKind::Disjunction { choices } => {
                let branches = choices
                    .iter()
                    .map(|c| Branch {
                        penalty: c.penalty,
                        bind: None,
                        goals: c.goals.clone(),
                    })
                    .collect::<Vec<_>>();
                let ambiguity =
                    TypeError::new(TypeErrorKind::AmbiguousDisjunction, origin.site);
                (branches, ambiguity)
            }
            GoalKind::Overload {
                overloaded_expr,
                ty,
                candidates,
            } => {
                let branches = candidates
                    .iter()
                    .map(|c| {
                        let mut goals = c.goals.clone();
                        goals.push(Goal::new(
                            GoalKind::Equality {
                                lhs: c.ty.clone(),
                                rhs: ty.clone(),
                            },
                            origin,
                        ));
                        Branch {
                            penalty: c.penalty,
                            bind: Some((*overloaded_expr, c.reference.clone())),
                            goals,
                        }
                    })
                    .collect::<Vec<_>>();
                let name = candidates
                    .first()
                    .map(|c| querier.decl_name(c.reference.decl))
                    .unwrap_or_else(|| Name::from("_"));
                let ambiguity =
                    TypeError::new(TypeErrorKind::AmbiguousUse(name), origin.site);
                (branches, ambiguity)
            }
            _ => unreachable!("solve_branches requires a branching goal"),
        };

        if let Some(t) = &self.tracer {
            t.fork(id);
        }

        let mut best = bound;
        let mut winners: Vec<Solution> = vec![];
        for (i, branch) in branches.into_iter().enumerate() {
            if self.score().adding_penalty(branch.penalty) > best {
                if let Some(t) = &self.tracer {
                    t.skip(i);
                }
                continue;
            }

            if let Some(t) = &self.tracer {
                t.pick(i);
                t.indent();
            }

            let mut fork = self.clone();
            fork.penalties += branch.penalty;
            if let Some((expr, reference)) = branch.bind {
                fork.binding_assumptions.insert(expr, reference);
            }
            let mut subs = Vec::with_capacity(branch.goals.len());
            for g in branch.goals {
                let sub = Goal::new(g.kind, g.origin.subordinate(id));
                subs.push(fork.insert_goal(sub));
            }
            fork.outcomes
                .set(id, Outcome::Product(subs.clone(), delegate_diagnosis(subs)));

            let result = fork.solve_impl(querier, best);
            if let Some(t) = &self.tracer {
                t.outdent();
            }

            let Some(solution) = result else { continue };
            match winners.first().map(|w| w.score()) {
                None if solution.score() <= best => {
                    best = solution.score();
                    winners.push(solution);
                }
                None => {
                    if let Some(t) = &self.tracer {
                        t.break_exploration();
                    }
                }
                Some(s) if solution.score() < s => {
                    best = solution.score();
                    winners = vec![solution];
                }
                Some(s) if solution.score() == s => {
                    let mut dominated = false;
                    winners.retain(|w| {
                        match ranking::compare(&solution, w, self.scope, querier) {
                            SolutionOrdering::Finer => false,
                            SolutionOrdering::Coarser | SolutionOrdering::Equal => {
                                dominated = true;
                                true
                            }
                            SolutionOrdering::Incomparable => true,
                        }
                    });
                    if !dominated {
                        winners.push(solution);
                    }
                }
                Some(_) => {
                    if let Some(t) = &self.tracer {
                        t.break_exploration();
                    }
                }
            }
        }

        if winners.len() <= 1 {
            return winners.pop();
        }
        let mut merged = winners.remove(0);
        for w in winners {
            merged.absorb(w);
        }
        merged.report(ambiguity.into_diagnostic());
        Some(merged)
    }

    // Scheduling.

    fn insert_goal(&mut self, goal: Goal) -> GoalId {
        let id = self.goals.len();
        self.goals.push(goal);
        self.outcomes.push_pending();
        self.schedule(id, false);
        id
    }

    fn schedule(&mut self, id: GoalId, revived: bool) {
        let key = self.goals[id].simplicity();
        let goals = &self.goals;
        let pos = self
            .fresh
            .partition_point(|&g| goals[g].simplicity() > key);
        self.fresh.insert(pos, id);
        if let Some(t) = &self.tracer {
            if revived {
                t.refresh(id);
            } else {
                t.schedule(id, &self.goals[id]);
            }
        }
    }

    /// Postponing is the only way to avoid non-termination when both sides
    /// of a relation are unconstrained variables.
    fn postpone(&mut self, id: GoalId) {
        let mentions = self.goals[id].mentions();
        debug_assert!(!mentions.is_empty(), "postponed goal mentions no variable");
        for var in mentions {
            self.stale_index.entry(var).or_default().insert(id);
        }
        self.stale.push(id);
        if let Some(t) = &self.tracer {
            t.defer(id);
        }
    }

    /// Awaken every stale goal whose reified form changed under the new
    /// assignments.
    fn did_assume(&mut self, assumed: Vec<TypeVar>) {
        for var in assumed {
            if let Some(t) = &self.tracer {
                let ty = self.type_assumptions.reified_var(var, Unresolved::Kept);
                t.assume(var, &ty);
            }
            if let Some(ids) = self.stale_index.remove(&var) {
                for id in ids {
                    if let Some(pos) = self.stale.iter().position(|&s| s == id) {
                        self.stale.remove(pos);
                        self.schedule(id, true);
                    }
                }
            }
        }
    }

    fn spawn_product(&mut self, parent: GoalId, subs: Vec<Goal>, diagnose: DiagnoseFn) -> Outcome {
        let ids = self.insert_subordinates(parent, subs);
        Outcome::Product(ids, diagnose)
    }

    fn spawn_product_delegating(&mut self, parent: GoalId, subs: Vec<Goal>) -> Outcome {
        let ids = self.insert_subordinates(parent, subs);
        Outcome::Product(ids.clone(), delegate_diagnosis(ids))
    }

    fn spawn_product_with(
        &mut self,
        parent: GoalId,
        subs: Vec<Goal>,
        make_diagnose: impl FnOnce(Vec<GoalId>) -> DiagnoseFn,
    ) -> Outcome {
        let ids = self.insert_subordinates(parent, subs);
        let diagnose = make_diagnose(ids.clone());
        Outcome::Product(ids, diagnose)
    }

    fn spawn_disjunction(
        &mut self,
        parent: GoalId,
        origin: GoalOrigin,
        choices: Vec<Choice>,
        diagnose: DiagnoseFn,
    ) -> Outcome {
        let goal = Goal::new(
            GoalKind::Disjunction { choices },
            origin.subordinate(parent),
        );
        let id = self.insert_goal(goal);
        Outcome::Product(vec![id], diagnose)
    }

    fn insert_subordinates(&mut self, parent: GoalId, subs: Vec<Goal>) -> Vec<GoalId> {
        subs.into_iter()
            .map(|g| {
                let sub = Goal::new(g.kind, g.origin.subordinate(parent));
                self.insert_goal(sub)
            })
            .collect()
    }

    // Wrap-up.

    fn finalize(mut self) -> Solution {
        // Finalize stale goals with structural failures.
        let stale_ids = std::mem::take(&mut self.stale);
        let mut stale_goals = vec![];
        for id in stale_ids {
            let goal = self.goals[id].applying(&self.type_assumptions);
            if let Some(t) = &self.tracer {
                t.failure(id);
            }
            self.outcomes.set(id, stale_failure(&goal));
            stale_goals.push(goal);
        }

        let score = self.score();
        let substitutions = self.type_assumptions.optimized();
        let mut sink = vela_shared::diag::DiagnosticSink::new();
        for (id, goal) in self.goals.iter().enumerate() {
            if goal.origin.is_root() && self.outcomes.failed(id) {
                self.outcomes.diagnose(id, &mut sink, &substitutions);
            }
        }

        Solution::new(
            substitutions,
            self.binding_assumptions,
            score,
            sink,
            stale_goals,
        )
    }
}

// Diagnosis builders.

fn reified_failure(
    kind: impl Fn(Type, Type) -> TypeErrorKind + 'static,
    lhs: Type,
    rhs: Type,
    site: Site,
) -> DiagnoseFn {
    Rc::new(move |sink, subst, _| {
        let l = subst.reify(&lhs, Unresolved::SubstitutedByError);
        let r = subst.reify(&rhs, Unresolved::SubstitutedByError);
        sink.report(TypeError::new(kind(l, r), site).into_diagnostic());
    })
}

fn simple_failure(error: TypeError) -> DiagnoseFn {
    Rc::new(move |sink, _, _| {
        sink.report(error.clone().into_diagnostic());
    })
}

fn subtype_failure(origin: GoalOrigin, strict: bool, lhs: Type, rhs: Type) -> DiagnoseFn {
    let kind = move |l: Type, r: Type| {
        if strict {
            return TypeErrorKind::NotStrictSubtype(l, r);
        }
        match origin.kind {
            OriginKind::Initialization => TypeErrorKind::CannotInitializeWith(r, l),
            OriginKind::PatternMatch => TypeErrorKind::DoesNotMatchPattern(l, r),
            _ => TypeErrorKind::NotSubtype(l, r),
        }
    };
    reified_failure(kind, lhs, rhs, origin.site)
}

fn conformance_failure(model: Type, concept: Name, site: Site) -> DiagnoseFn {
    Rc::new(move |sink, subst, _| {
        let m = subst.reify(&model, Unresolved::SubstitutedByError);
        sink.report(
            TypeError::new(TypeErrorKind::Conformance(m, concept.clone()), site)
                .into_diagnostic(),
        );
    })
}

/// The structural failure assigned to goals that remained undecidable.
fn stale_failure(goal: &Goal) -> Outcome {
    let site = goal.origin.site;

    // A stale equality or subtyping over a lambda whose output is still
    // open means the body's return type could not be determined.
    let complex_return = |t: &Type| match t.kind() {
        TypeKind::Lambda(l) => l.output.contains_variable(),
        _ => false,
    };
    let is_complex_return = match &goal.kind {
        GoalKind::Equality { lhs, rhs } | GoalKind::Subtyping { lhs, rhs, .. } => {
            complex_return(lhs) || complex_return(rhs)
        }
        _ => false,
    };

    let error = if is_complex_return {
        TypeError::new(TypeErrorKind::ComplexReturnType, site)
    } else {
        TypeError::new(TypeErrorKind::StaleGoal(goal.to_string()), site)
    };
    Outcome::Failure(simple_failure(error))
}

fn format_labels(labels: &[Option<Name>]) -> String {
    let mut out = String::from("(");
    for label in labels {
        match label {
            Some(l) => out.push_str(l.as_str()),
            None => out.push('_'),
        }
        out.push(':');
    }
    out.push(')');
    out
}
