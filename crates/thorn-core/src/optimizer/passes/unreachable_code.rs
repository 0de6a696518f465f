use tracing::debug;

use crate::ast::{Statement, WhileStmt};
use crate::config::OptimizationLevel;
use crate::errors::OptimizeError;
use crate::optimizer::context::OptimizationContext;
use crate::optimizer::control_flow::REACHABILITY;
use crate::optimizer::pass::{OptimizationPass, PassOutcome, PassReport, PassType};

/// Removes code no execution can reach: statements after a terminator,
/// branches whose literal condition rules them out, and loops that never
/// run. Requires the reachability analysis; without it the pass does
/// nothing.
pub struct UnreachableCodeEliminationPass;

impl OptimizationPass for UnreachableCodeEliminationPass {
    fn name(&self) -> &'static str {
        "unreachable-code-elimination"
    }

    fn pass_type(&self) -> PassType {
        PassType::Cleanup
    }

    fn minimum_level(&self) -> OptimizationLevel {
        OptimizationLevel::O1
    }

    fn dependencies(&self) -> &[&'static str] {
        &["control-flow-analysis"]
    }

    fn description(&self) -> &'static str {
        "Removes statements that can never execute"
    }

    fn transform(
        &self,
        statements: &[Statement],
        context: &mut OptimizationContext,
    ) -> Result<PassOutcome, OptimizeError> {
        let Some(reachability) = context.cached_analysis(&REACHABILITY) else {
            debug!("reachability analysis unavailable, skipping unreachable code elimination");
            return Ok(PassOutcome::unchanged(statements.to_vec()));
        };
        if !reachability.unreachable.is_empty() {
            debug!(
                unreachable_blocks = reachability.unreachable.len(),
                "eliminating unreachable code"
            );
        }

        let mut report = PassReport::new();
        let optimized = eliminate_statements(statements, &mut report);
        Ok(PassOutcome::new(optimized, report))
    }
}

fn eliminate_statements(statements: &[Statement], report: &mut PassReport) -> Vec<Statement> {
    let mut result = Vec::with_capacity(statements.len());
    for (index, stmt) in statements.iter().enumerate() {
        let terminator = ends_with_terminator(stmt);
        if let Some(optimized) = eliminate_statement(stmt, report) {
            result.push(optimized);
        }
        if terminator {
            let dropped = statements.len() - index - 1;
            if dropped > 0 {
                report.record("unreachable statements removed", dropped as u64);
            }
            break;
        }
    }
    result
}

/// True when control cannot flow past this statement, including a block
/// whose own tail terminates and an if/else where both arms do.
fn ends_with_terminator(stmt: &Statement) -> bool {
    match stmt {
        Statement::Return(_) | Statement::Throw(_) => true,
        Statement::Block(statements) => {
            statements.last().map(ends_with_terminator).unwrap_or(false)
        }
        Statement::If(if_stmt) => match &if_stmt.else_branch {
            Some(else_branch) => {
                ends_with_terminator(&if_stmt.then_branch) && ends_with_terminator(else_branch)
            }
            None => false,
        },
        _ => false,
    }
}

fn eliminate_statement(stmt: &Statement, report: &mut PassReport) -> Option<Statement> {
    match stmt {
        Statement::Block(statements) => {
            let optimized = eliminate_statements(statements, report);
            if optimized.is_empty() {
                report.bump("empty blocks removed");
                None
            } else {
                Some(Statement::Block(optimized))
            }
        }
        Statement::If(if_stmt) => {
            if let Some(literal) = if_stmt.condition.as_literal() {
                report.bump("dead branches removed");
                return if literal.is_truthy() {
                    eliminate_statement(&if_stmt.then_branch, report)
                } else {
                    if_stmt
                        .else_branch
                        .as_ref()
                        .and_then(|e| eliminate_statement(e, report))
                };
            }
            let mut if_stmt = if_stmt.clone();
            if_stmt.then_branch = Box::new(
                eliminate_statement(&if_stmt.then_branch, report)
                    .unwrap_or(Statement::Block(Vec::new())),
            );
            if_stmt.else_branch = match if_stmt.else_branch.take() {
                Some(else_branch) => {
                    eliminate_statement(&else_branch, report).map(Box::new)
                }
                None => None,
            };
            Some(Statement::If(if_stmt))
        }
        Statement::While(while_stmt) => {
            if let Some(literal) = while_stmt.condition.as_literal() {
                if !literal.is_truthy() {
                    report.bump("dead loops removed");
                    return None;
                }
            }
            let body = eliminate_statement(&while_stmt.body, report)
                .unwrap_or(Statement::Block(Vec::new()));
            Some(Statement::While(WhileStmt {
                condition: while_stmt.condition.clone(),
                body: Box::new(body),
            }))
        }
        Statement::For(for_stmt) => {
            let mut for_stmt = for_stmt.clone();
            for_stmt.body = Box::new(
                eliminate_statement(&for_stmt.body, report)
                    .unwrap_or(Statement::Block(Vec::new())),
            );
            Some(Statement::For(for_stmt))
        }
        Statement::Function(func) => {
            let mut func = func.clone();
            func.body = eliminate_statements(&func.body, report);
            Some(Statement::Function(func))
        }
        Statement::Class(class) => {
            let mut class = class.clone();
            for method in &mut class.methods {
                method.body = eliminate_statements(&method.body, report);
            }
            Some(Statement::Class(class))
        }
        Statement::Export(inner) => {
            eliminate_statement(inner, report).map(|s| Statement::Export(Box::new(s)))
        }
        other => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expression;
    use crate::optimizer::control_flow::ControlFlowAnalysisPass;

    fn run_with_analysis(statements: Vec<Statement>) -> Vec<Statement> {
        let mut context = OptimizationContext::new(OptimizationLevel::O1);
        let analyzed = ControlFlowAnalysisPass
            .transform(&statements, &mut context)
            .unwrap()
            .statements;
        UnreachableCodeEliminationPass
            .transform(&analyzed, &mut context)
            .unwrap()
            .statements
    }

    #[test]
    fn test_noop_without_analysis() {
        let statements = vec![
            Statement::Return(None),
            Statement::var("dead", Expression::number(1.0)),
        ];
        let mut context = OptimizationContext::new(OptimizationLevel::O1);
        let outcome = UnreachableCodeEliminationPass
            .transform(&statements, &mut context)
            .unwrap();
        assert_eq!(outcome.statements, statements);
        assert!(!outcome.report.changed);
    }

    #[test]
    fn test_code_after_return_removed() {
        let input = vec![
            Statement::var("x", Expression::number(1.0)),
            Statement::Return(Some(Expression::variable("x"))),
            Statement::var("dead", Expression::number(2.0)),
        ];
        let output = run_with_analysis(input);
        assert_eq!(output.len(), 2);
        assert!(matches!(output[1], Statement::Return(_)));
    }

    #[test]
    fn test_code_after_terminating_block_removed() {
        let input = vec![
            Statement::Block(vec![Statement::Return(None)]),
            Statement::var("dead", Expression::number(1.0)),
        ];
        let output = run_with_analysis(input);
        assert_eq!(output, vec![Statement::Block(vec![Statement::Return(None)])]);
    }

    #[test]
    fn test_code_after_exhaustive_if_removed() {
        let input = vec![
            Statement::if_stmt(
                Expression::variable("flag"),
                Statement::Return(Some(Expression::number(1.0))),
                Some(Statement::Return(Some(Expression::number(2.0)))),
            ),
            Statement::var("dead", Expression::number(3.0)),
        ];
        let output = run_with_analysis(input);
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn test_literal_false_branch_removed() {
        let input = vec![Statement::if_stmt(
            Expression::boolean(false),
            Statement::var("x", Expression::number(1.0)),
            Some(Statement::var("x", Expression::number(2.0))),
        )];
        let output = run_with_analysis(input);
        assert_eq!(output, vec![Statement::var("x", Expression::number(2.0))]);
    }

    #[test]
    fn test_while_false_removed() {
        let input = vec![Statement::while_stmt(
            Expression::boolean(false),
            Statement::Expression(Expression::call(Expression::variable("tick"), vec![])),
        )];
        assert_eq!(run_with_analysis(input), Vec::new());
    }

    #[test]
    fn test_function_body_pruned() {
        let input = vec![Statement::function(
            "f",
            vec![],
            vec![
                Statement::Return(None),
                Statement::var("dead", Expression::number(1.0)),
            ],
        )];
        let output = run_with_analysis(input);
        let Statement::Function(func) = &output[0] else {
            panic!("expected a function");
        };
        assert_eq!(func.body, vec![Statement::Return(None)]);
    }
}
