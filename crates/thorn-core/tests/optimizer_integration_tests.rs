//! End-to-end tests for the full optimization pipeline across levels.

use thorn_core::ast::{BinaryOp, Expression, Program, Statement};
use thorn_core::config::{OptimizationLevel, OptimizerOptions, PassSetting};
use thorn_core::optimizer::Optimizer;

fn optimize_at(level: OptimizationLevel, statements: Vec<Statement>) -> Vec<Statement> {
    let optimizer = Optimizer::with_level(level);
    optimizer
        .optimize(Program { statements })
        .unwrap()
        .statements
}

fn const_add(a: f64, b: f64) -> Expression {
    Expression::binary(
        Expression::number(a),
        BinaryOp::Add,
        Expression::number(b),
    )
}

#[test]
fn test_o0_is_a_passthrough() {
    let statements = vec![
        Statement::var("x", const_add(1.0, 2.0)),
        Statement::var("unused", Expression::number(9.0)),
        Statement::if_stmt(
            Expression::boolean(false),
            Statement::Return(None),
            None,
        ),
    ];
    assert_eq!(
        optimize_at(OptimizationLevel::O0, statements.clone()),
        statements
    );
}

#[test]
fn test_o1_folds_and_prunes() {
    // The constant condition folds away, the dead branch disappears, and
    // the unused variable is swept.
    let statements = vec![
        Statement::var("unused", Expression::number(9.0)),
        Statement::if_stmt(
            Expression::boolean(true),
            Statement::Return(Some(const_add(20.0, 22.0))),
            Some(Statement::Return(Some(Expression::number(0.0)))),
        ),
    ];
    let output = optimize_at(OptimizationLevel::O1, statements);
    assert_eq!(
        output,
        vec![Statement::Return(Some(Expression::number(42.0)))]
    );
}

#[test]
fn test_o1_removes_code_after_return() {
    let statements = vec![
        Statement::function(
            "f",
            vec![],
            vec![
                Statement::Return(Some(Expression::number(1.0))),
                Statement::Expression(Expression::call(
                    Expression::variable("log"),
                    vec![],
                )),
            ],
        ),
        Statement::Expression(Expression::call(Expression::variable("f"), vec![])),
    ];
    let output = optimize_at(OptimizationLevel::O1, statements);
    let Statement::Function(func) = &output[0] else {
        panic!("expected the function to survive");
    };
    assert_eq!(func.body, vec![Statement::Return(Some(Expression::number(1.0)))]);
}

#[test]
fn test_o2_inlines_small_functions() {
    let statements = vec![
        Statement::function(
            "twice",
            vec!["x"],
            vec![Statement::Return(Some(Expression::binary(
                Expression::variable("x"),
                BinaryOp::Multiply,
                Expression::number(2.0),
            )))],
        ),
        Statement::Return(Some(Expression::call(
            Expression::variable("twice"),
            vec![Expression::number(21.0)],
        ))),
    ];
    let output = optimize_at(OptimizationLevel::O2, statements);
    // The call is replaced by the substituted body and the definition is
    // gone. Folding already ran, so the product stays symbolic.
    assert_eq!(
        output,
        vec![Statement::Return(Some(Expression::binary(
            Expression::number(21.0),
            BinaryOp::Multiply,
            Expression::number(2.0),
        )))]
    );
}

#[test]
fn test_o1_does_not_inline() {
    let statements = vec![
        Statement::function(
            "twice",
            vec!["x"],
            vec![Statement::Return(Some(Expression::binary(
                Expression::variable("x"),
                BinaryOp::Multiply,
                Expression::number(2.0),
            )))],
        ),
        Statement::Return(Some(Expression::call(
            Expression::variable("twice"),
            vec![Expression::number(21.0)],
        ))),
    ];
    let output = optimize_at(OptimizationLevel::O1, statements.clone());
    assert_eq!(output, statements);
}

#[test]
fn test_disabled_pass_is_skipped() {
    let mut options = OptimizerOptions::with_level(OptimizationLevel::O1);
    options
        .disabled_passes
        .push("constant-folding".to_string());
    options
        .disabled_passes
        .push("branch-optimization".to_string());
    options
        .disabled_passes
        .push("unreachable-code-elimination".to_string());
    let optimizer = Optimizer::new(options);

    let statements = vec![Statement::Return(Some(const_add(1.0, 2.0)))];
    let output = optimizer
        .optimize(Program {
            statements: statements.clone(),
        })
        .unwrap()
        .statements;
    assert_eq!(output, statements);
}

#[test]
fn test_force_enabled_pass_runs_below_its_level() {
    let mut options = OptimizerOptions::with_level(OptimizationLevel::O1);
    options
        .enabled_passes
        .push("function-inlining".to_string());
    let optimizer = Optimizer::new(options);

    let statements = vec![
        Statement::function(
            "identity",
            vec!["x"],
            vec![Statement::Return(Some(Expression::variable("x")))],
        ),
        Statement::Return(Some(Expression::call(
            Expression::variable("identity"),
            vec![Expression::number(7.0)],
        ))),
    ];
    let output = optimizer
        .optimize(Program { statements })
        .unwrap()
        .statements;
    assert_eq!(output, vec![Statement::Return(Some(Expression::number(7.0)))]);
}

#[test]
fn test_pass_setting_reaches_the_pass() {
    // Threshold 0 disqualifies every candidate.
    let mut options = OptimizerOptions::with_level(OptimizationLevel::O2);
    options.pass_settings.push(PassSetting {
        pass: "function-inlining".to_string(),
        key: "threshold".to_string(),
        value: "0".to_string(),
    });
    let optimizer = Optimizer::new(options);

    let statements = vec![
        Statement::function(
            "twice",
            vec!["x"],
            vec![Statement::Return(Some(Expression::binary(
                Expression::variable("x"),
                BinaryOp::Multiply,
                Expression::number(2.0),
            )))],
        ),
        Statement::function(
            "main",
            vec![],
            vec![Statement::Return(Some(Expression::call(
                Expression::variable("twice"),
                vec![Expression::number(21.0)],
            )))],
        ),
    ];
    let output = optimizer
        .optimize(Program { statements })
        .unwrap()
        .statements;
    assert!(output
        .iter()
        .any(|s| matches!(s, Statement::Function(f) if f.name == "twice")));
}

#[test]
fn test_statistics_report_each_pass() {
    let optimizer = Optimizer::with_level(OptimizationLevel::O2);
    let outcome = optimizer
        .optimize_statements(vec![Statement::Return(Some(const_add(1.0, 1.0)))])
        .unwrap();
    assert_eq!(outcome.statistics.len(), 8);
    assert_eq!(outcome.passes_run(), 8);
    let folding = outcome
        .statistics
        .iter()
        .find(|s| s.name == "constant-folding")
        .unwrap();
    assert!(folding.report.changed);
}

#[test]
fn test_higher_levels_subsume_lower() {
    let statements = vec![
        Statement::var("unused", Expression::number(1.0)),
        Statement::Return(Some(const_add(2.0, 2.0))),
    ];
    let o1 = optimize_at(OptimizationLevel::O1, statements.clone());
    let o3 = optimize_at(OptimizationLevel::O3, statements);
    assert_eq!(o1, vec![Statement::Return(Some(Expression::number(4.0)))]);
    assert_eq!(o3, o1);
}
