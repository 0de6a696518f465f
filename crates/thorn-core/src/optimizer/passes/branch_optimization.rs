use crate::ast::{
    BinaryOp, Expression, IfStmt, Literal, LogicalOp, Statement, UnaryOp, WhileStmt,
};
use crate::config::OptimizationLevel;
use crate::errors::OptimizeError;
use crate::optimizer::context::OptimizationContext;
use crate::optimizer::pass::{OptimizationPass, PassOutcome, PassReport, PassType};

/// Simplifies control flow: removes statements after a return, collapses
/// branches with literal conditions, and drops loops and blocks that can
/// never execute.
pub struct BranchOptimizationPass;

impl OptimizationPass for BranchOptimizationPass {
    fn name(&self) -> &'static str {
        "branch-optimization"
    }

    fn pass_type(&self) -> PassType {
        PassType::Transformation
    }

    fn minimum_level(&self) -> OptimizationLevel {
        OptimizationLevel::O1
    }

    fn dependencies(&self) -> &[&'static str] {
        &["constant-folding"]
    }

    fn estimated_cost(&self) -> u32 {
        3
    }

    fn description(&self) -> &'static str {
        "Simplifies branches and removes unreachable control flow"
    }

    fn transform(
        &self,
        statements: &[Statement],
        _context: &mut OptimizationContext,
    ) -> Result<PassOutcome, OptimizeError> {
        let mut report = PassReport::new();
        let optimized = optimize_statements(statements, &mut report);
        Ok(PassOutcome::new(optimized, report))
    }

    /// This pass only ever deletes or shrinks statements.
    fn validate(
        &self,
        original: &[Statement],
        optimized: &[Statement],
        _context: &OptimizationContext,
    ) -> bool {
        optimized.len() <= original.len()
    }
}

fn optimize_statements(statements: &[Statement], report: &mut PassReport) -> Vec<Statement> {
    let mut result = Vec::with_capacity(statements.len());
    let mut iter = statements.iter();
    while let Some(stmt) = iter.next() {
        let is_return = matches!(stmt, Statement::Return(_));
        if let Some(optimized) = optimize_statement(stmt, report) {
            result.push(optimized);
        }
        if is_return {
            let dropped = iter.count();
            if dropped > 0 {
                report.record("dead statements removed", dropped as u64);
            }
            break;
        }
    }
    result
}

fn optimize_statement(stmt: &Statement, report: &mut PassReport) -> Option<Statement> {
    match stmt {
        Statement::Block(statements) => {
            let optimized = optimize_statements(statements, report);
            if optimized.is_empty() {
                report.bump("empty blocks removed");
                None
            } else {
                Some(Statement::Block(optimized))
            }
        }
        Statement::Expression(expr) => {
            Some(Statement::Expression(simplify_expression(expr, report)))
        }
        Statement::Var(decl) => {
            let mut decl = decl.clone();
            decl.initializer = decl
                .initializer
                .as_ref()
                .map(|init| simplify_expression(init, report));
            Some(Statement::Var(decl))
        }
        Statement::Return(value) => Some(Statement::Return(
            value.as_ref().map(|v| simplify_expression(v, report)),
        )),
        Statement::Throw(value) => {
            Some(Statement::Throw(simplify_expression(value, report)))
        }
        Statement::If(if_stmt) => optimize_if(if_stmt, report),
        Statement::While(while_stmt) => {
            let condition = simplify_expression(&while_stmt.condition, report);
            if let Some(literal) = condition.as_literal() {
                if !literal.is_truthy() {
                    report.bump("loops removed");
                    return None;
                }
            }
            let body = optimize_statement(&while_stmt.body, report)
                .unwrap_or(Statement::Block(Vec::new()));
            Some(Statement::While(WhileStmt {
                condition,
                body: Box::new(body),
            }))
        }
        Statement::For(for_stmt) => {
            let mut for_stmt = for_stmt.clone();
            for_stmt.iterable = simplify_expression(&for_stmt.iterable, report);
            for_stmt.body = Box::new(
                optimize_statement(&for_stmt.body, report)
                    .unwrap_or(Statement::Block(Vec::new())),
            );
            Some(Statement::For(for_stmt))
        }
        Statement::Function(func) => {
            let mut func = func.clone();
            func.body = optimize_statements(&func.body, report);
            Some(Statement::Function(func))
        }
        Statement::Class(class) => {
            let mut class = class.clone();
            for method in &mut class.methods {
                method.body = optimize_statements(&method.body, report);
            }
            Some(Statement::Class(class))
        }
        Statement::Export(inner) => {
            optimize_statement(inner, report).map(|s| Statement::Export(Box::new(s)))
        }
        other => Some(other.clone()),
    }
}

fn optimize_if(if_stmt: &IfStmt, report: &mut PassReport) -> Option<Statement> {
    // The condition may only become literal after simplification, so check
    // both before and after rebuilding the branches.
    let condition = simplify_expression(&if_stmt.condition, report);
    if let Some(literal) = condition.as_literal() {
        report.bump("branches simplified");
        return if literal.is_truthy() {
            optimize_statement(&if_stmt.then_branch, report)
        } else {
            if_stmt
                .else_branch
                .as_ref()
                .and_then(|e| optimize_statement(e, report))
        };
    }
    let then_branch = optimize_statement(&if_stmt.then_branch, report)
        .unwrap_or(Statement::Block(Vec::new()));
    let else_branch = if_stmt
        .else_branch
        .as_ref()
        .and_then(|e| optimize_statement(e, report));
    Some(Statement::If(IfStmt {
        condition,
        then_branch: Box::new(then_branch),
        else_branch: else_branch.map(Box::new),
    }))
}

/// Mirror of the folding rules this pass needs to recognise conditions that
/// became decidable: comparisons, logical connectives, `!`, and groupings.
/// Arithmetic is left to constant-folding.
fn simplify_expression(expr: &Expression, report: &mut PassReport) -> Expression {
    match expr {
        Expression::Grouping(inner) => {
            let inner = simplify_expression(inner, report);
            if inner.as_literal().is_some() {
                inner
            } else {
                Expression::Grouping(Box::new(inner))
            }
        }
        Expression::Binary(left, op, right) => {
            let left = simplify_expression(left, report);
            let right = simplify_expression(right, report);
            if let (Some(l), Some(r)) = (left.as_literal(), right.as_literal()) {
                if let Some(folded) = fold_comparison(l, *op, r) {
                    report.bump("expressions simplified");
                    return Expression::Literal(folded);
                }
            }
            Expression::Binary(Box::new(left), *op, Box::new(right))
        }
        Expression::Logical(left, op, right) => {
            let left = simplify_expression(left, report);
            if let Some(literal) = left.as_literal() {
                report.bump("expressions simplified");
                return match (op, literal.is_truthy()) {
                    (LogicalOp::And, false) => Expression::boolean(false),
                    (LogicalOp::And, true) => simplify_expression(right, report),
                    (LogicalOp::Or, true) => Expression::boolean(true),
                    (LogicalOp::Or, false) => simplify_expression(right, report),
                };
            }
            let right = simplify_expression(right, report);
            Expression::Logical(Box::new(left), *op, Box::new(right))
        }
        Expression::Unary(UnaryOp::Not, operand) => {
            let operand = simplify_expression(operand, report);
            if let Some(literal) = operand.as_literal() {
                report.bump("expressions simplified");
                return Expression::boolean(!literal.is_truthy());
            }
            Expression::Unary(UnaryOp::Not, Box::new(operand))
        }
        other => other.clone(),
    }
}

fn fold_comparison(left: &Literal, op: BinaryOp, right: &Literal) -> Option<Literal> {
    match op {
        BinaryOp::Equal => Some(Literal::Boolean(left == right)),
        BinaryOp::NotEqual => Some(Literal::Boolean(left != right)),
        BinaryOp::LessThan | BinaryOp::LessThanOrEqual | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual => {
            if let (Literal::Number(l), Literal::Number(r)) = (left, right) {
                let result = match op {
                    BinaryOp::LessThan => l < r,
                    BinaryOp::LessThanOrEqual => l <= r,
                    BinaryOp::GreaterThan => l > r,
                    _ => l >= r,
                };
                Some(Literal::Boolean(result))
            } else {
                None
            }
        }
        _ => None,
    }
}
