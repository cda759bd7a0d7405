//! End-to-end solver scenarios over the mock query surface.

use std::collections::HashMap;

use vela_shared::{
    access::AccessEffect,
    builtins::BuiltinConcept,
    decl::{DeclId, DeclRef},
    node_id::ExprId,
    scope::ScopeId,
    site::Site,
    ty::{CallableParam, FreshVarAllocator, TupleElement, Type, TypeVar},
};
use vela_typing::{
    infer::{lambda_literal_type, LambdaBody},
    mocks::MockQuerier,
    ConstraintSystem, Goal, GoalKind, GoalOrigin, InferenceTracer, OriginKind,
    ResolutionPurpose,
};

fn int() -> Type {
    Type::product(DeclId(1), "Int")
}

fn bool_ty() -> Type {
    Type::product(DeclId(2), "Bool")
}

fn origin(kind: OriginKind) -> GoalOrigin {
    GoalOrigin::new(Site::default(), kind)
}

fn solve(goals: Vec<Goal>, querier: &MockQuerier) -> vela_typing::Solution {
    ConstraintSystem::new(ScopeId(0), goals, HashMap::new())
        .with_fresh_vars(FreshVarAllocator::starting_at(100))
        .solve(querier)
}

#[test]
fn union_widening_succeeds_with_penalty_one() {
    let querier = MockQuerier::new();
    let target = Type::union(vec![int(), bool_ty()]);
    let goal = Goal::new(
        GoalKind::Subtyping {
            lhs: int(),
            rhs: target,
            strict: false,
        },
        origin(OriginKind::Initialization),
    );

    let literal = ExprId(0);
    let mut bindings = HashMap::new();
    bindings.insert(literal, DeclRef::new(DeclId(1)));
    let solution = ConstraintSystem::new(ScopeId(0), vec![goal], bindings)
        .with_fresh_vars(FreshVarAllocator::starting_at(100))
        .solve(&querier);

    assert!(solution.is_sound(), "{:?}", solution.diagnostics());
    assert_eq!(solution.score().penalties, 1);
    assert_eq!(solution.binding(literal), Some(&DeclRef::new(DeclId(1))));
}

#[test]
fn lambda_inference_resolves_the_output() {
    let querier = MockQuerier::new();
    let mut vars = FreshVarAllocator::new();
    let f = TypeVar(90);
    let lambda = lambda_literal_type(
        vec![CallableParam::new(
            Some("x".into()),
            Type::parameter(AccessEffect::Sink, int()),
        )],
        None,
        LambdaBody::SingleExpression,
        Site::default(),
        &mut vars,
    )
    .expect("inferable");

    let goals = vec![
        Goal::new(
            GoalKind::Equality {
                lhs: Type::var(f),
                rhs: lambda,
            },
            origin(OriginKind::Initialization),
        ),
        // The body returns `x`, so `Int` flows into the open output.
        Goal::new(
            GoalKind::Subtyping {
                lhs: int(),
                rhs: Type::var(TypeVar(0)),
                strict: false,
            },
            origin(OriginKind::Return),
        ),
    ];
    let solution = solve(goals, &querier);

    assert!(solution.is_sound(), "{:?}", solution.diagnostics());
    let inferred = solution
        .substitutions()
        .reified_var(f, vela_typing::Unresolved::SubstitutedByError);
    assert_eq!(inferred.to_string(), "[](x: sink Int) -> Int");
}

#[test]
fn lambda_without_annotation_needs_single_expression_body() {
    let mut vars = FreshVarAllocator::new();
    let err = lambda_literal_type(
        vec![CallableParam::new(
            Some("x".into()),
            Type::parameter(AccessEffect::Sink, int()),
        )],
        None,
        LambdaBody::Block { is_empty: false },
        Site::default(),
        &mut vars,
    )
    .expect_err("nonempty block cannot be inferred");
    assert_eq!(
        err.message(),
        "cannot infer complex return type; add an explicit return type annotation"
    );
}

#[test]
fn lambda_label_mismatch_is_reported() {
    let querier = MockQuerier::new();
    let found = Type::thin_lambda(
        vec![CallableParam::new(
            Some("y".into()),
            Type::parameter(AccessEffect::Let, int()),
        )],
        int(),
    );
    let expected = Type::thin_lambda(
        vec![CallableParam::new(
            Some("x".into()),
            Type::parameter(AccessEffect::Let, int()),
        )],
        int(),
    );
    let goal = Goal::new(
        GoalKind::Subtyping {
            lhs: found,
            rhs: expected,
            strict: false,
        },
        origin(OriginKind::Initialization),
    );
    let solution = solve(vec![goal], &querier);

    assert!(!solution.is_sound());
    let messages = solution
        .diagnostics()
        .iter()
        .map(|d| d.message.clone())
        .collect::<Vec<_>>();
    assert!(
        messages
            .iter()
            .any(|m| m == "incompatible labels: found '(y:)', expected '(x:)'"),
        "unexpected diagnostics: {:?}",
        messages
    );
}

fn member_goal(subject: Type, member_ty: Type, expr: ExprId) -> Goal {
    Goal::new(
        GoalKind::Member {
            subject,
            name: "foo".into(),
            member_ty,
            member_expr: expr,
            purpose: ResolutionPurpose::Function,
        },
        origin(OriginKind::Member),
    )
}

fn foo_type(param: Type) -> Type {
    Type::thin_lambda(
        vec![CallableParam::new(
            Some("x".into()),
            Type::parameter(AccessEffect::Let, param),
        )],
        int(),
    )
}

#[test]
fn overload_prefers_the_concrete_candidate() {
    let subject = Type::product(DeclId(10), "S");
    let concrete = DeclId(20);
    let requirement = DeclId(21);

    let mut querier = MockQuerier::new();
    querier.add_decl(concrete, "foo", foo_type(int()));
    querier.add_decl(requirement, "foo", foo_type(int()));
    querier.add_member("foo", Some(subject.clone()), concrete);
    querier.add_member("foo", Some(subject.clone()), requirement);
    querier.mark_requirement(requirement);

    let expr = ExprId(7);
    let solution = solve(
        vec![member_goal(subject, Type::var(TypeVar(0)), expr)],
        &querier,
    );

    assert!(solution.is_sound(), "{:?}", solution.diagnostics());
    assert_eq!(solution.score().penalties, 0);
    assert_eq!(solution.binding(expr), Some(&DeclRef::new(concrete)));
}

#[test]
fn overload_tie_between_concretes_is_ambiguous() {
    let subject = Type::product(DeclId(10), "S");
    let first = DeclId(20);
    let second = DeclId(22);

    let mut querier = MockQuerier::new();
    querier.add_decl(first, "foo", foo_type(int()));
    querier.add_decl(second, "foo", foo_type(int()));
    querier.add_member("foo", Some(subject.clone()), first);
    querier.add_member("foo", Some(subject.clone()), second);

    let expr = ExprId(7);
    let solution = solve(
        vec![member_goal(subject, Type::var(TypeVar(0)), expr)],
        &querier,
    );

    assert!(!solution.is_sound());
    let messages = solution
        .diagnostics()
        .iter()
        .map(|d| d.message.clone())
        .collect::<Vec<_>>();
    assert!(
        messages.iter().any(|m| m == "ambiguous use of 'foo'"),
        "unexpected diagnostics: {:?}",
        messages
    );
}

#[test]
fn overload_picks_the_more_specific_candidate() {
    let subject = Type::product(DeclId(10), "S");
    let specific = DeclId(30);
    let general = DeclId(31);

    let mut querier = MockQuerier::new();
    querier.add_decl(specific, "foo", foo_type(int()));
    querier.add_decl(general, "foo", foo_type(Type::union(vec![int(), bool_ty()])));
    querier.add_member("foo", Some(subject.clone()), specific);
    querier.add_member("foo", Some(subject.clone()), general);

    let expr = ExprId(8);
    let solution = solve(
        vec![member_goal(subject, Type::var(TypeVar(0)), expr)],
        &querier,
    );

    assert!(solution.is_sound(), "{:?}", solution.diagnostics());
    assert_eq!(solution.binding(expr), Some(&DeclRef::new(specific)));
}

#[test]
fn structural_conformance_to_movable() {
    let movable = DeclId(40);
    let mut querier = MockQuerier::new();
    querier.add_decl(movable, "Movable", Type::error());
    querier.add_builtin_concept(movable, BuiltinConcept::Movable);

    let pair = Type::tuple(vec![
        TupleElement {
            label: None,
            ty: Type::word(),
        },
        TupleElement {
            label: None,
            ty: Type::i(1),
        },
    ]);
    let goals = vec![
        Goal::new(
            GoalKind::Conformance {
                model: pair,
                concept: movable,
            },
            origin(OriginKind::Structural),
        ),
        Goal::new(
            GoalKind::Conformance {
                model: Type::unit(),
                concept: movable,
            },
            origin(OriginKind::Structural),
        ),
    ];
    let solution = solve(goals, &querier);
    assert!(solution.is_sound(), "{:?}", solution.diagnostics());

    // A product without a declared conformance does not conform.
    let nope = Goal::new(
        GoalKind::Conformance {
            model: Type::product(DeclId(50), "File"),
            concept: movable,
        },
        origin(OriginKind::Structural),
    );
    let failing = solve(vec![nope], &querier);
    assert!(!failing.is_sound());
}

#[test]
fn stale_goals_are_revived_by_assignments() {
    let querier = MockQuerier::new();
    let a = TypeVar(0);
    let b = TypeVar(1);
    let goals = vec![
        // Postpones until both sides gain structure.
        Goal::new(
            GoalKind::Subtyping {
                lhs: Type::var(a),
                rhs: Type::var(b),
                strict: true,
            },
            origin(OriginKind::Annotation),
        ),
        Goal::new(
            GoalKind::Subtyping {
                lhs: Type::tuple(vec![
                    TupleElement {
                        label: None,
                        ty: Type::var(a),
                    },
                    TupleElement {
                        label: None,
                        ty: Type::var(b),
                    },
                ]),
                rhs: Type::tuple(vec![
                    TupleElement {
                        label: None,
                        ty: int(),
                    },
                    TupleElement {
                        label: None,
                        ty: Type::union(vec![int(), bool_ty()]),
                    },
                ]),
                strict: false,
            },
            origin(OriginKind::Annotation),
        ),
    ];
    let solution = solve(goals, &querier);
    assert!(solution.is_sound(), "{:?}", solution.diagnostics());
    assert!(solution.stale().is_empty());
    assert_eq!(solution.score().penalties, 1);
}

#[test]
fn leaf_bounds_on_one_variable_fall_back_to_never() {
    let querier = MockQuerier::new();
    let v = TypeVar(0);
    // Two incompatible leaves below the same variable: equality can satisfy
    // only one of them, so the other resolves through `Never`.
    let goals = vec![
        Goal::new(
            GoalKind::Subtyping {
                lhs: int(),
                rhs: Type::var(v),
                strict: false,
            },
            origin(OriginKind::Annotation),
        ),
        Goal::new(
            GoalKind::Subtyping {
                lhs: bool_ty(),
                rhs: Type::var(v),
                strict: false,
            },
            origin(OriginKind::Annotation),
        ),
    ];
    let solution = solve(goals, &querier);

    assert!(solution.is_sound(), "{:?}", solution.diagnostics());
    assert_eq!(solution.score().penalties, 2);
    assert!(solution.stale().is_empty());
    let resolved = solution
        .substitutions()
        .reified_var(v, vela_typing::Unresolved::SubstitutedByError);
    assert!(resolved.is_never(), "resolved to {}", resolved);
}

#[test]
fn undecidable_goals_end_up_stale_and_unsound() {
    let querier = MockQuerier::new();
    let goal = Goal::new(
        GoalKind::Subtyping {
            lhs: Type::var(TypeVar(0)),
            rhs: Type::var(TypeVar(1)),
            strict: true,
        },
        origin(OriginKind::Annotation),
    );
    let solution = solve(vec![goal], &querier);
    assert!(!solution.is_sound());
    assert_eq!(solution.stale().len(), 1);
}

#[test]
fn trace_output_is_deterministic() {
    let run = || {
        let querier = MockQuerier::new();
        let tracer = InferenceTracer::new();
        let goal = Goal::new(
            GoalKind::Subtyping {
                lhs: int(),
                rhs: Type::union(vec![int(), bool_ty()]),
                strict: false,
            },
            origin(OriginKind::Initialization),
        );
        let solution = ConstraintSystem::new(ScopeId(0), vec![goal], HashMap::new())
            .with_tracer(tracer.clone())
            .solve(&querier);
        assert!(solution.is_sound());
        tracer.output()
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert!(first.starts_with("fresh:\n"));
    assert!(first.contains("stale:\n"));
    assert!(first.contains("steps:\n"));
    assert!(first.contains("fork g"));
    assert!(first.contains("pick 0"));
}
