//! Goals: the constraints tracked by the solver.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use vela_shared::{
    decl::{DeclRef, Name},
    node_id::ExprId,
    site::Site,
    ty::{CallableStyle, Type, TypeVar},
};

use crate::{
    querier::ResolutionPurpose,
    subst::{SubstitutionMap, Unresolved},
};

/// Stable identity of a goal: its index in the solver's goal list.
pub type GoalId = usize;

/// Why a goal exists. The kind selects the diagnostic rendered when the goal
/// fails; the parent marks goals spawned by decomposition, whose failures are
/// reported only through their root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalOrigin {
    pub site: Site,
    pub kind: OriginKind,
    pub parent: Option<GoalId>,
}

impl GoalOrigin {
    pub fn new(site: Site, kind: OriginKind) -> GoalOrigin {
        GoalOrigin {
            site,
            kind,
            parent: None,
        }
    }

    pub fn subordinate(&self, parent: GoalId) -> GoalOrigin {
        GoalOrigin {
            site: self.site,
            kind: self.kind,
            parent: Some(parent),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OriginKind {
    /// A type ascription or annotation.
    Annotation,
    /// Initialization of a binding from a value.
    Initialization,
    /// A value matched against a pattern.
    PatternMatch,
    /// An argument passed to a parameter.
    Argument,
    /// A returned or yielded value.
    Return,
    /// A branch of a conditional expression.
    Branch,
    /// A member access.
    Member,
    /// Structural decomposition of another goal.
    Structural,
}

/// One alternative of a disjunction: a constraint set and the penalty its
/// exploration incurs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Choice {
    pub goals: Vec<Goal>,
    pub penalty: u32,
}

/// One alternative of an overload: a declaration to bind plus the choice's
/// constraint set and penalty.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OverloadCandidate {
    pub reference: DeclRef,
    pub ty: Type,
    pub goals: Vec<Goal>,
    pub penalty: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GoalKind {
    /// `lhs` and `rhs` unify.
    Equality { lhs: Type, rhs: Type },
    /// `lhs` is a subtype of `rhs`; `strict` additionally fails when both
    /// sides are equivalent.
    Subtyping { lhs: Type, rhs: Type, strict: bool },
    /// `model` conforms to the trait `concept` names.
    Conformance { model: Type, concept: vela_shared::decl::DeclId },
    /// An argument of type `lhs` can pass to a parameter of type `rhs`.
    Parameter { lhs: Type, rhs: Type },
    /// `subject` has a member `name` of type `member_ty`.
    Member {
        subject: Type,
        name: Name,
        member_ty: Type,
        member_expr: ExprId,
        purpose: ResolutionPurpose,
    },
    /// `subject` is a tuple whose `index`-th element has type `element_ty`.
    TupleMember {
        subject: Type,
        index: usize,
        element_ty: Type,
    },
    /// `callee` accepts `arguments` with `labels` and returns `output`.
    Call {
        callee: Type,
        labels: Vec<Option<Name>>,
        arguments: Vec<Type>,
        output: Type,
        style: CallableStyle,
    },
    /// Every branch of a conditional is a subtype of the shared supertype.
    Merging { supertype: Type, branches: Vec<Type> },
    /// Exactly one of the choices holds.
    Disjunction { choices: Vec<Choice> },
    /// `overloaded_expr` refers to one of the candidates, which has type
    /// `ty`.
    Overload {
        overloaded_expr: ExprId,
        ty: Type,
        candidates: Vec<OverloadCandidate>,
    },
}

/// A constraint tracked by the solver, with its origin.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Goal {
    pub kind: GoalKind,
    pub origin: GoalOrigin,
}

impl Goal {
    pub fn new(kind: GoalKind, origin: GoalOrigin) -> Goal {
        Goal { kind, origin }
    }

    /// The goal with every contained type reified under `subst`, variables
    /// kept.
    pub fn applying(&self, subst: &SubstitutionMap) -> Goal {
        let r = |t: &Type| subst.reify(t, Unresolved::Kept);
        let kind = match &self.kind {
            GoalKind::Equality { lhs, rhs } => GoalKind::Equality {
                lhs: r(lhs),
                rhs: r(rhs),
            },
            GoalKind::Subtyping { lhs, rhs, strict } => GoalKind::Subtyping {
                lhs: r(lhs),
                rhs: r(rhs),
                strict: *strict,
            },
            GoalKind::Conformance { model, concept } => GoalKind::Conformance {
                model: r(model),
                concept: *concept,
            },
            GoalKind::Parameter { lhs, rhs } => GoalKind::Parameter {
                lhs: r(lhs),
                rhs: r(rhs),
            },
            GoalKind::Member {
                subject,
                name,
                member_ty,
                member_expr,
                purpose,
            } => GoalKind::Member {
                subject: r(subject),
                name: name.clone(),
                member_ty: r(member_ty),
                member_expr: *member_expr,
                purpose: *purpose,
            },
            GoalKind::TupleMember {
                subject,
                index,
                element_ty,
            } => GoalKind::TupleMember {
                subject: r(subject),
                index: *index,
                element_ty: r(element_ty),
            },
            GoalKind::Call {
                callee,
                labels,
                arguments,
                output,
                style,
            } => GoalKind::Call {
                callee: r(callee),
                labels: labels.clone(),
                arguments: arguments.iter().map(|t| r(t)).collect(),
                output: r(output),
                style: *style,
            },
            GoalKind::Merging {
                supertype,
                branches,
            } => GoalKind::Merging {
                supertype: r(supertype),
                branches: branches.iter().map(|t| r(t)).collect(),
            },
            GoalKind::Disjunction { choices } => GoalKind::Disjunction {
                choices: choices
                    .iter()
                    .map(|c| Choice {
                        goals: c.goals.iter().map(|g| g.applying(subst)).collect(),
                        penalty: c.penalty,
                    })
                    .collect(),
            },
            GoalKind::Overload {
                overloaded_expr,
                ty,
                candidates,
            } => GoalKind::Overload {
                overloaded_expr: *overloaded_expr,
                ty: r(ty),
                candidates: candidates
                    .iter()
                    .map(|c| OverloadCandidate {
                        reference: c.reference.clone(),
                        ty: r(&c.ty),
                        goals: c.goals.iter().map(|g| g.applying(subst)).collect(),
                        penalty: c.penalty,
                    })
                    .collect(),
            },
        };
        Goal {
            kind,
            origin: self.origin,
        }
    }

    /// The variables mentioned by the goal, used to index stale goals.
    pub fn mentions(&self) -> BTreeSet<TypeVar> {
        let mut vars = BTreeSet::new();
        self.collect_mentions(&mut vars);
        vars
    }

    fn collect_mentions(&self, vars: &mut BTreeSet<TypeVar>) {
        match &self.kind {
            GoalKind::Equality { lhs, rhs }
            | GoalKind::Subtyping { lhs, rhs, .. }
            | GoalKind::Parameter { lhs, rhs } => {
                lhs.collect_vars(vars);
                rhs.collect_vars(vars);
            }
            GoalKind::Conformance { model, .. } => model.collect_vars(vars),
            GoalKind::Member {
                subject, member_ty, ..
            } => {
                subject.collect_vars(vars);
                member_ty.collect_vars(vars);
            }
            GoalKind::TupleMember {
                subject,
                element_ty,
                ..
            } => {
                subject.collect_vars(vars);
                element_ty.collect_vars(vars);
            }
            GoalKind::Call {
                callee,
                arguments,
                output,
                ..
            } => {
                callee.collect_vars(vars);
                for a in arguments {
                    a.collect_vars(vars);
                }
                output.collect_vars(vars);
            }
            GoalKind::Merging {
                supertype,
                branches,
            } => {
                supertype.collect_vars(vars);
                for b in branches {
                    b.collect_vars(vars);
                }
            }
            GoalKind::Disjunction { choices } => {
                for c in choices {
                    for g in &c.goals {
                        g.collect_mentions(vars);
                    }
                }
            }
            GoalKind::Overload { ty, candidates, .. } => {
                ty.collect_vars(vars);
                for c in candidates {
                    c.ty.collect_vars(vars);
                    for g in &c.goals {
                        g.collect_mentions(vars);
                    }
                }
            }
        }
    }

    /// The key the fresh worklist is ordered by: lower is simpler, and
    /// simpler goals are popped first.
    pub fn simplicity(&self) -> usize {
        match &self.kind {
            GoalKind::Equality { .. } => 0,
            GoalKind::Subtyping { .. } => 1,
            GoalKind::Conformance { .. } => 2,
            GoalKind::Parameter { .. } => 3,
            GoalKind::TupleMember { .. } => 4,
            GoalKind::Merging { .. } => 5,
            GoalKind::Member { .. } => 6,
            GoalKind::Call { .. } => 7,
            GoalKind::Disjunction { choices } => 100 + choices.len(),
            GoalKind::Overload { candidates, .. } => 100 + candidates.len(),
        }
    }
}

impl std::fmt::Display for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::fmt::Display for GoalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoalKind::Equality { lhs, rhs } => write!(f, "{} == {}", lhs, rhs),
            GoalKind::Subtyping { lhs, rhs, strict } => {
                if *strict {
                    write!(f, "{} < {}", lhs, rhs)
                } else {
                    write!(f, "{} <= {}", lhs, rhs)
                }
            }
            GoalKind::Conformance { model, concept } => write!(f, "{} : {}", model, concept),
            GoalKind::Parameter { lhs, rhs } => write!(f, "{} -> {}", lhs, rhs),
            GoalKind::Member {
                subject,
                name,
                member_ty,
                ..
            } => write!(f, "{}.{} == {}", subject, name, member_ty),
            GoalKind::TupleMember {
                subject,
                index,
                element_ty,
            } => write!(f, "{}.{} == {}", subject, index, element_ty),
            GoalKind::Call {
                callee,
                arguments,
                output,
                ..
            } => {
                let args = arguments
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "({})({}) == {}", callee, args, output)
            }
            GoalKind::Merging {
                supertype,
                branches,
            } => {
                let bs = branches
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(" | ");
                write!(f, "merge({}) == {}", bs, supertype)
            }
            GoalKind::Disjunction { choices } => {
                for (i, c) in choices.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ∨ ")?;
                    }
                    let goals = c
                        .goals
                        .iter()
                        .map(|g| g.to_string())
                        .collect::<Vec<_>>()
                        .join(" ∧ ");
                    write!(f, "{{{}}}+{}", goals, c.penalty)?;
                }
                Ok(())
            }
            GoalKind::Overload {
                overloaded_expr,
                ty,
                candidates,
            } => {
                write!(f, "{} : {} ∈ {{", overloaded_expr, ty)?;
                for (i, c) in candidates.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", c.reference)?;
                }
                write!(f, "}}")
            }
        }
    }
}
