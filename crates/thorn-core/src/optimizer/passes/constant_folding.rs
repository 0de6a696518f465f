use crate::ast::{
    BinaryOp, Expression, IfStmt, Literal, LogicalOp, MatchCase, Statement, UnaryOp, WhileStmt,
};
use crate::errors::OptimizeError;
use crate::optimizer::context::OptimizationContext;
use crate::optimizer::pass::{OptimizationPass, PassOutcome, PassReport, PassType};

/// Evaluates constant expressions at compile time and simplifies branches
/// whose condition folds to a literal.
pub struct ConstantFoldingPass;

impl OptimizationPass for ConstantFoldingPass {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn pass_type(&self) -> PassType {
        PassType::Transformation
    }

    fn description(&self) -> &'static str {
        "Evaluates constant expressions at compile time"
    }

    fn transform(
        &self,
        statements: &[Statement],
        _context: &mut OptimizationContext,
    ) -> Result<PassOutcome, OptimizeError> {
        let mut report = PassReport::new();
        let optimized = fold_statements(statements, &mut report);
        Ok(PassOutcome::new(optimized, report))
    }
}

fn fold_statements(statements: &[Statement], report: &mut PassReport) -> Vec<Statement> {
    statements
        .iter()
        .filter_map(|stmt| fold_statement(stmt, report))
        .collect()
}

/// Rebuilds one statement with folded expressions. `None` means the whole
/// statement went away (a branch or loop whose condition folded to a
/// literal that makes it dead).
fn fold_statement(stmt: &Statement, report: &mut PassReport) -> Option<Statement> {
    match stmt {
        Statement::Block(statements) => {
            Some(Statement::Block(fold_statements(statements, report)))
        }
        Statement::Expression(expr) => {
            Some(Statement::Expression(fold_expression(expr, report)))
        }
        Statement::Var(decl) => {
            let mut decl = decl.clone();
            decl.initializer = decl
                .initializer
                .as_ref()
                .map(|init| fold_expression(init, report));
            Some(Statement::Var(decl))
        }
        Statement::Return(value) => Some(Statement::Return(
            value.as_ref().map(|v| fold_expression(v, report)),
        )),
        Statement::Throw(value) => Some(Statement::Throw(fold_expression(value, report))),
        Statement::If(if_stmt) => fold_if(if_stmt, report),
        Statement::While(while_stmt) => {
            let condition = fold_expression(&while_stmt.condition, report);
            if let Some(literal) = condition.as_literal() {
                if !literal.is_truthy() {
                    report.bump("loops removed");
                    return None;
                }
            }
            let body = fold_statement(&while_stmt.body, report)
                .unwrap_or(Statement::Block(Vec::new()));
            Some(Statement::While(WhileStmt {
                condition,
                body: Box::new(body),
            }))
        }
        Statement::For(for_stmt) => {
            let mut for_stmt = for_stmt.clone();
            for_stmt.iterable = fold_expression(&for_stmt.iterable, report);
            for_stmt.body = Box::new(
                fold_statement(&for_stmt.body, report).unwrap_or(Statement::Block(Vec::new())),
            );
            Some(Statement::For(for_stmt))
        }
        Statement::Function(func) => {
            let mut func = func.clone();
            func.body = fold_statements(&func.body, report);
            Some(Statement::Function(func))
        }
        Statement::Class(class) => {
            let mut class = class.clone();
            for method in &mut class.methods {
                method.body = fold_statements(&method.body, report);
            }
            Some(Statement::Class(class))
        }
        Statement::Export(inner) => {
            fold_statement(inner, report).map(|s| Statement::Export(Box::new(s)))
        }
        other => Some(other.clone()),
    }
}

fn fold_if(if_stmt: &IfStmt, report: &mut PassReport) -> Option<Statement> {
    let condition = fold_expression(&if_stmt.condition, report);
    if let Some(literal) = condition.as_literal() {
        report.bump("branches simplified");
        return if literal.is_truthy() {
            fold_statement(&if_stmt.then_branch, report)
        } else {
            if_stmt
                .else_branch
                .as_ref()
                .and_then(|e| fold_statement(e, report))
        };
    }
    let then_branch =
        fold_statement(&if_stmt.then_branch, report).unwrap_or(Statement::Block(Vec::new()));
    let else_branch = if_stmt
        .else_branch
        .as_ref()
        .and_then(|e| fold_statement(e, report));
    Some(Statement::If(IfStmt {
        condition,
        then_branch: Box::new(then_branch),
        else_branch: else_branch.map(Box::new),
    }))
}

fn fold_expression(expr: &Expression, report: &mut PassReport) -> Expression {
    match expr {
        Expression::Binary(left, op, right) => {
            let left = fold_expression(left, report);
            let right = fold_expression(right, report);
            if let (Some(l), Some(r)) = (left.as_literal(), right.as_literal()) {
                if let Some(folded) = fold_binary(l, *op, r) {
                    report.bump("expressions folded");
                    return Expression::Literal(folded);
                }
            }
            Expression::Binary(Box::new(left), *op, Box::new(right))
        }
        Expression::Logical(left, op, right) => {
            let left = fold_expression(left, report);
            if let Some(literal) = left.as_literal() {
                report.bump("expressions folded");
                return match (op, literal.is_truthy()) {
                    (LogicalOp::And, false) => Expression::boolean(false),
                    (LogicalOp::And, true) => fold_expression(right, report),
                    (LogicalOp::Or, true) => Expression::boolean(true),
                    (LogicalOp::Or, false) => fold_expression(right, report),
                };
            }
            let right = fold_expression(right, report);
            Expression::Logical(Box::new(left), *op, Box::new(right))
        }
        Expression::Unary(op, operand) => {
            let operand = fold_expression(operand, report);
            match (op, operand.as_literal()) {
                (UnaryOp::Negate, Some(Literal::Number(n))) => {
                    report.bump("expressions folded");
                    Expression::number(-n)
                }
                (UnaryOp::Not, Some(literal)) => {
                    report.bump("expressions folded");
                    Expression::boolean(!literal.is_truthy())
                }
                _ => Expression::Unary(*op, Box::new(operand)),
            }
        }
        Expression::Grouping(inner) => {
            let inner = fold_expression(inner, report);
            if inner.as_literal().is_some() {
                report.bump("expressions folded");
                inner
            } else {
                Expression::Grouping(Box::new(inner))
            }
        }
        Expression::Assign(name, value) => {
            Expression::Assign(name.clone(), Box::new(fold_expression(value, report)))
        }
        Expression::Call(callee, args) => Expression::Call(
            Box::new(fold_expression(callee, report)),
            args.iter().map(|a| fold_expression(a, report)).collect(),
        ),
        Expression::Get(object, name) => {
            Expression::Get(Box::new(fold_expression(object, report)), name.clone())
        }
        Expression::Set(object, name, value) => Expression::Set(
            Box::new(fold_expression(object, report)),
            name.clone(),
            Box::new(fold_expression(value, report)),
        ),
        Expression::Index(object, key) => Expression::Index(
            Box::new(fold_expression(object, report)),
            Box::new(fold_expression(key, report)),
        ),
        Expression::IndexSet(object, key, value) => Expression::IndexSet(
            Box::new(fold_expression(object, report)),
            Box::new(fold_expression(key, report)),
            Box::new(fold_expression(value, report)),
        ),
        Expression::Slice { object, start, end } => Expression::Slice {
            object: Box::new(fold_expression(object, report)),
            start: start
                .as_ref()
                .map(|s| Box::new(fold_expression(s, report))),
            end: end.as_ref().map(|e| Box::new(fold_expression(e, report))),
        },
        Expression::List(elements) => Expression::List(
            elements
                .iter()
                .map(|e| fold_expression(e, report))
                .collect(),
        ),
        Expression::Dict(pairs) => Expression::Dict(
            pairs
                .iter()
                .map(|(k, v)| (fold_expression(k, report), fold_expression(v, report)))
                .collect(),
        ),
        Expression::Match(subject, cases) => Expression::Match(
            Box::new(fold_expression(subject, report)),
            cases
                .iter()
                .map(|case| MatchCase {
                    pattern: case.pattern.clone(),
                    guard: case.guard.as_ref().map(|g| fold_expression(g, report)),
                    value: fold_expression(&case.value, report),
                })
                .collect(),
        ),
        // Lambda bodies are a separate execution context; folding stops here.
        Expression::Lambda(_) | Expression::Literal(_) | Expression::Variable(_)
        | Expression::This => expr.clone(),
    }
}

fn fold_binary(left: &Literal, op: BinaryOp, right: &Literal) -> Option<Literal> {
    match op {
        BinaryOp::Add => match (left, right) {
            (Literal::Number(l), Literal::Number(r)) => Some(Literal::Number(l + r)),
            (Literal::String(l), Literal::String(r)) => {
                Some(Literal::String(format!("{l}{r}")))
            }
            _ => None,
        },
        BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo
        | BinaryOp::Power => {
            if let (Literal::Number(l), Literal::Number(r)) = (left, right) {
                fold_numeric(*l, op, *r).map(Literal::Number)
            } else {
                None
            }
        }
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
    }
}

fn fold_numeric(left: f64, op: BinaryOp, right: f64) -> Option<f64> {
    match op {
        BinaryOp::Subtract => Some(left - right),
        BinaryOp::Multiply => Some(left * right),
        BinaryOp::Divide => {
            if right != 0.0 {
                Some(left / right)
            } else {
                None // Don't fold division by zero
            }
        }
        BinaryOp::Modulo => Some(left % right),
        BinaryOp::Power => Some(left.powf(right)),
        _ => None,
    }
}
