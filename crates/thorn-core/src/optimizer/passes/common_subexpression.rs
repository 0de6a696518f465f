use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::ast::{Expression, IfStmt, Statement, VarDecl, WhileStmt};
use crate::config::OptimizationLevel;
use crate::errors::OptimizeError;
use crate::optimizer::context::OptimizationContext;
use crate::optimizer::pass::{OptimizationPass, PassOutcome, PassReport, PassType};

/// Hoists repeated expensive expressions into temporaries so they are
/// evaluated once per scope. A scope is one top-level statement (or one
/// block / function body); temporaries never cross a lambda or function
/// boundary.
pub struct CommonSubexpressionEliminationPass;

impl OptimizationPass for CommonSubexpressionEliminationPass {
    fn name(&self) -> &'static str {
        "common-subexpression-elimination"
    }

    fn pass_type(&self) -> PassType {
        PassType::Transformation
    }

    fn minimum_level(&self) -> OptimizationLevel {
        OptimizationLevel::O2
    }

    fn dependencies(&self) -> &[&'static str] {
        &["control-flow-analysis"]
    }

    fn estimated_cost(&self) -> u32 {
        4
    }

    fn description(&self) -> &'static str {
        "Eliminates redundant computation of identical expressions"
    }

    fn transform(
        &self,
        statements: &[Statement],
        _context: &mut OptimizationContext,
    ) -> Result<PassOutcome, OptimizeError> {
        let mut report = PassReport::new();
        let optimized = statements
            .iter()
            .map(|stmt| hoist_statement(stmt, &mut report))
            .collect();
        Ok(PassOutcome::new(optimized, report))
    }
}

/// Applies hoisting to one statement as its own scope.
fn hoist_statement(stmt: &Statement, report: &mut PassReport) -> Statement {
    match stmt {
        Statement::Block(statements) => {
            Statement::Block(hoist_in_list(statements, report))
        }
        Statement::Function(func) => {
            let mut func = func.clone();
            func.body = hoist_in_list(&func.body, report);
            Statement::Function(func)
        }
        Statement::Class(class) => {
            let mut class = class.clone();
            for method in &mut class.methods {
                method.body = hoist_in_list(&method.body, report);
            }
            Statement::Class(class)
        }
        Statement::If(if_stmt) => Statement::If(IfStmt {
            condition: if_stmt.condition.clone(),
            then_branch: Box::new(hoist_statement(&if_stmt.then_branch, report)),
            else_branch: if_stmt
                .else_branch
                .as_ref()
                .map(|e| Box::new(hoist_statement(e, report))),
        }),
        Statement::While(while_stmt) => Statement::While(WhileStmt {
            condition: while_stmt.condition.clone(),
            body: Box::new(hoist_statement(&while_stmt.body, report)),
        }),
        Statement::For(for_stmt) => {
            let mut for_stmt = for_stmt.clone();
            for_stmt.body = Box::new(hoist_statement(&for_stmt.body, report));
            Statement::For(for_stmt)
        }
        Statement::Export(inner) => {
            Statement::Export(Box::new(hoist_statement(inner, report)))
        }
        other => {
            let mut result = hoist_in_list(std::slice::from_ref(other), report);
            if result.len() == 1 {
                result.remove(0)
            } else {
                Statement::Block(result)
            }
        }
    }
}

/// Treats `statements` as one scope: counts repeated expensive expressions
/// across the whole list, declares a temporary for each, and rewrites the
/// occurrences. Nested function and lambda bodies are separate scopes.
fn hoist_in_list(statements: &[Statement], report: &mut PassReport) -> Vec<Statement> {
    // Occurrence count per canonical key, in first-appearance order.
    let mut counts: IndexMap<String, (usize, Expression)> = IndexMap::new();
    for stmt in statements {
        count_statement(stmt, &mut counts);
    }

    // A temporary is evaluated once at the top of the scope, so it must
    // not read any symbol the scope writes: occurrences after the write
    // would see a stale value.
    let mut written = FxHashSet::default();
    for stmt in statements {
        collect_writes(stmt, &mut written);
    }

    let mut temps: IndexMap<String, String> = IndexMap::new();
    for (key, (count, representative)) in &counts {
        if *count >= 2 && !reads_written_symbol(representative, &written) {
            temps.insert(key.clone(), format!("_cse{}", temps.len()));
        }
    }

    if temps.is_empty() {
        // Still give nested function bodies their own hoisting scope.
        return statements
            .iter()
            .map(|stmt| descend_into_functions(stmt, report))
            .collect();
    }

    report.record("expressions hoisted", temps.len() as u64);

    // Declare innermost first (shorter canonical key) so outer initializers
    // can reference the inner temporaries.
    let mut ordered: Vec<&String> = temps.keys().collect();
    ordered.sort_by_key(|key| key.len());

    let mut declarations = Vec::with_capacity(ordered.len());
    for key in ordered {
        let (_, representative) = &counts[key.as_str()];
        let initializer = rewrite_expression(representative, &temps, Some(key), report);
        declarations.push(Statement::Var(VarDecl {
            name: temps[key.as_str()].clone(),
            type_annotation: None,
            initializer: Some(initializer),
            immutable: false,
        }));
    }

    let mut result = declarations;
    for stmt in statements {
        let rewritten = rewrite_statement(stmt, &temps, report);
        result.push(descend_into_functions(&rewritten, report));
    }
    result
}

/// Hoisting recursion for function and class declarations reached while a
/// surrounding scope is being rewritten.
fn descend_into_functions(stmt: &Statement, report: &mut PassReport) -> Statement {
    match stmt {
        Statement::Function(_) | Statement::Class(_) => hoist_statement(stmt, report),
        _ => stmt.clone(),
    }
}

/// Canonical text for an expression, or `None` when the expression contains
/// a write (assignment, property or index store) or a construct that must
/// not be duplicated. Groupings are transparent so `(a*b)` and `a*b` share
/// a key.
fn canonical_key(expr: &Expression) -> Option<String> {
    match expr {
        Expression::Literal(literal) => Some(match literal {
            crate::ast::Literal::Null => "null".to_string(),
            crate::ast::Literal::Boolean(b) => b.to_string(),
            crate::ast::Literal::Number(n) => n.to_string(),
            crate::ast::Literal::String(s) => format!("{s:?}"),
        }),
        Expression::Variable(name) => Some(name.clone()),
        Expression::This => Some("this".to_string()),
        Expression::Grouping(inner) => canonical_key(inner),
        Expression::Binary(left, op, right) => Some(format!(
            "({} {:?} {})",
            canonical_key(left)?,
            op,
            canonical_key(right)?
        )),
        Expression::Logical(left, op, right) => Some(format!(
            "({} {:?} {})",
            canonical_key(left)?,
            op,
            canonical_key(right)?
        )),
        Expression::Unary(op, operand) => {
            Some(format!("({:?} {})", op, canonical_key(operand)?))
        }
        Expression::Call(callee, args) => {
            let mut rendered = Vec::with_capacity(args.len());
            for arg in args {
                rendered.push(canonical_key(arg)?);
            }
            Some(format!("{}({})", canonical_key(callee)?, rendered.join(",")))
        }
        Expression::Get(object, name) => {
            Some(format!("{}.{}", canonical_key(object)?, name))
        }
        Expression::Index(object, key) => Some(format!(
            "{}[{}]",
            canonical_key(object)?,
            canonical_key(key)?
        )),
        Expression::Slice { object, start, end } => {
            let start = match start {
                Some(s) => canonical_key(s)?,
                None => String::new(),
            };
            let end = match end {
                Some(e) => canonical_key(e)?,
                None => String::new(),
            };
            Some(format!("{}[{}:{}]", canonical_key(object)?, start, end))
        }
        Expression::List(elements) => {
            let mut rendered = Vec::with_capacity(elements.len());
            for element in elements {
                rendered.push(canonical_key(element)?);
            }
            Some(format!("[{}]", rendered.join(",")))
        }
        Expression::Dict(pairs) => {
            let mut rendered = Vec::with_capacity(pairs.len());
            for (key, value) in pairs {
                rendered.push(format!("{}:{}", canonical_key(key)?, canonical_key(value)?));
            }
            Some(format!("{{{}}}", rendered.join(",")))
        }
        // Writes and constructs whose duplication changes behaviour.
        Expression::Assign(..)
        | Expression::Set(..)
        | Expression::IndexSet(..)
        | Expression::Match(..)
        | Expression::Lambda(_) => None,
    }
}

/// Shapes worth paying a temporary for.
fn is_expensive(expr: &Expression) -> bool {
    matches!(
        expr,
        Expression::Binary(..) | Expression::Call(..) | Expression::Index(..)
            | Expression::Get(..)
    )
}

/// Collects every symbol the scope writes: declarations, assignments,
/// loop variables, and the base object of property or index stores.
/// Lambda bodies count (the lambda may run within the scope); nested
/// function and class bodies are separate scopes.
fn collect_writes(stmt: &Statement, written: &mut FxHashSet<String>) {
    match stmt {
        Statement::Block(statements) => {
            for s in statements {
                collect_writes(s, written);
            }
        }
        Statement::Expression(expr) | Statement::Throw(expr) => {
            collect_expression_writes(expr, written);
        }
        Statement::Var(decl) => {
            written.insert(decl.name.clone());
            if let Some(init) = &decl.initializer {
                collect_expression_writes(init, written);
            }
        }
        Statement::Return(value) => {
            if let Some(value) = value {
                collect_expression_writes(value, written);
            }
        }
        Statement::If(if_stmt) => {
            collect_expression_writes(&if_stmt.condition, written);
            collect_writes(&if_stmt.then_branch, written);
            if let Some(else_branch) = &if_stmt.else_branch {
                collect_writes(else_branch, written);
            }
        }
        Statement::While(while_stmt) => {
            collect_expression_writes(&while_stmt.condition, written);
            collect_writes(&while_stmt.body, written);
        }
        Statement::For(for_stmt) => {
            written.insert(for_stmt.variable.clone());
            collect_expression_writes(&for_stmt.iterable, written);
            collect_writes(&for_stmt.body, written);
        }
        Statement::Export(inner) => collect_writes(inner, written),
        Statement::Function(_)
        | Statement::Class(_)
        | Statement::Import(_)
        | Statement::ExportIdentifier(_)
        | Statement::TypeAlias { .. } => {}
    }
}

fn collect_expression_writes(expr: &Expression, written: &mut FxHashSet<String>) {
    match expr {
        Expression::Assign(name, value) => {
            written.insert(name.clone());
            collect_expression_writes(value, written);
        }
        Expression::Set(object, _, value) => {
            if let Some(root) = root_variable(object) {
                written.insert(root.to_string());
            }
            collect_expression_writes(object, written);
            collect_expression_writes(value, written);
        }
        Expression::IndexSet(object, key, value) => {
            if let Some(root) = root_variable(object) {
                written.insert(root.to_string());
            }
            collect_expression_writes(object, written);
            collect_expression_writes(key, written);
            collect_expression_writes(value, written);
        }
        Expression::Binary(left, _, right) | Expression::Logical(left, _, right) => {
            collect_expression_writes(left, written);
            collect_expression_writes(right, written);
        }
        Expression::Unary(_, operand) | Expression::Grouping(operand) => {
            collect_expression_writes(operand, written);
        }
        Expression::Call(callee, args) => {
            collect_expression_writes(callee, written);
            for arg in args {
                collect_expression_writes(arg, written);
            }
        }
        Expression::Get(object, _) => collect_expression_writes(object, written),
        Expression::Index(object, key) => {
            collect_expression_writes(object, written);
            collect_expression_writes(key, written);
        }
        Expression::Slice { object, start, end } => {
            collect_expression_writes(object, written);
            if let Some(start) = start {
                collect_expression_writes(start, written);
            }
            if let Some(end) = end {
                collect_expression_writes(end, written);
            }
        }
        Expression::List(elements) => {
            for element in elements {
                collect_expression_writes(element, written);
            }
        }
        Expression::Dict(pairs) => {
            for (key, value) in pairs {
                collect_expression_writes(key, written);
                collect_expression_writes(value, written);
            }
        }
        Expression::Lambda(lambda) => {
            for s in &lambda.body {
                collect_writes(s, written);
            }
        }
        Expression::Match(subject, cases) => {
            collect_expression_writes(subject, written);
            for case in cases {
                if let Some(guard) = &case.guard {
                    collect_expression_writes(guard, written);
                }
                collect_expression_writes(&case.value, written);
            }
        }
        Expression::Literal(_) | Expression::Variable(_) | Expression::This => {}
    }
}

/// Base variable of an lvalue chain like `o.x.y[i]`.
fn root_variable(expr: &Expression) -> Option<&str> {
    match expr {
        Expression::Variable(name) => Some(name),
        Expression::Grouping(inner) => root_variable(inner),
        Expression::Get(object, _) | Expression::Index(object, _) => root_variable(object),
        Expression::Slice { object, .. } => root_variable(object),
        _ => None,
    }
}

/// True when the expression reads any symbol in `written`.
fn reads_written_symbol(expr: &Expression, written: &FxHashSet<String>) -> bool {
    match expr {
        Expression::Variable(name) => written.contains(name),
        Expression::Literal(_) | Expression::This => false,
        Expression::Grouping(inner) | Expression::Unary(_, inner) => {
            reads_written_symbol(inner, written)
        }
        Expression::Binary(left, _, right) | Expression::Logical(left, _, right) => {
            reads_written_symbol(left, written) || reads_written_symbol(right, written)
        }
        Expression::Call(callee, args) => {
            reads_written_symbol(callee, written)
                || args.iter().any(|arg| reads_written_symbol(arg, written))
        }
        Expression::Get(object, _) => reads_written_symbol(object, written),
        Expression::Index(object, key) => {
            reads_written_symbol(object, written) || reads_written_symbol(key, written)
        }
        Expression::Slice { object, start, end } => {
            reads_written_symbol(object, written)
                || start
                    .as_ref()
                    .map(|s| reads_written_symbol(s, written))
                    .unwrap_or(false)
                || end
                    .as_ref()
                    .map(|e| reads_written_symbol(e, written))
                    .unwrap_or(false)
        }
        Expression::List(elements) => {
            elements.iter().any(|e| reads_written_symbol(e, written))
        }
        Expression::Dict(pairs) => pairs
            .iter()
            .any(|(k, v)| reads_written_symbol(k, written) || reads_written_symbol(v, written)),
        // Never keyed; treated as reading everything.
        Expression::Assign(..)
        | Expression::Set(..)
        | Expression::IndexSet(..)
        | Expression::Lambda(_)
        | Expression::Match(..) => true,
    }
}

fn count_statement(stmt: &Statement, counts: &mut IndexMap<String, (usize, Expression)>) {
    match stmt {
        Statement::Block(statements) => {
            for s in statements {
                count_statement(s, counts);
            }
        }
        Statement::Expression(expr) | Statement::Throw(expr) => count_expression(expr, counts),
        Statement::Var(decl) => {
            if let Some(init) = &decl.initializer {
                count_expression(init, counts);
            }
        }
        Statement::Return(value) => {
            if let Some(value) = value {
                count_expression(value, counts);
            }
        }
        Statement::If(if_stmt) => {
            count_expression(&if_stmt.condition, counts);
            count_statement(&if_stmt.then_branch, counts);
            if let Some(else_branch) = &if_stmt.else_branch {
                count_statement(else_branch, counts);
            }
        }
        Statement::While(while_stmt) => {
            count_expression(&while_stmt.condition, counts);
            count_statement(&while_stmt.body, counts);
        }
        Statement::For(for_stmt) => {
            count_expression(&for_stmt.iterable, counts);
            count_statement(&for_stmt.body, counts);
        }
        Statement::Export(inner) => count_statement(inner, counts),
        // Function and class bodies are their own scopes.
        Statement::Function(_)
        | Statement::Class(_)
        | Statement::Import(_)
        | Statement::ExportIdentifier(_)
        | Statement::TypeAlias { .. } => {}
    }
}

fn count_expression(expr: &Expression, counts: &mut IndexMap<String, (usize, Expression)>) {
    if is_expensive(expr) {
        if let Some(key) = canonical_key(expr) {
            counts
                .entry(key)
                .and_modify(|(count, _)| *count += 1)
                .or_insert_with(|| (1, expr.clone()));
        }
    }
    match expr {
        Expression::Binary(left, _, right) | Expression::Logical(left, _, right) => {
            count_expression(left, counts);
            count_expression(right, counts);
        }
        Expression::Unary(_, operand) | Expression::Grouping(operand) => {
            count_expression(operand, counts);
        }
        Expression::Assign(_, value) => count_expression(value, counts),
        Expression::Call(callee, args) => {
            count_expression(callee, counts);
            for arg in args {
                count_expression(arg, counts);
            }
        }
        Expression::Get(object, _) => count_expression(object, counts),
        Expression::Set(object, _, value) => {
            count_expression(object, counts);
            count_expression(value, counts);
        }
        Expression::Index(object, key) => {
            count_expression(object, counts);
            count_expression(key, counts);
        }
        Expression::IndexSet(object, key, value) => {
            count_expression(object, counts);
            count_expression(key, counts);
            count_expression(value, counts);
        }
        Expression::Slice { object, start, end } => {
            count_expression(object, counts);
            if let Some(start) = start {
                count_expression(start, counts);
            }
            if let Some(end) = end {
                count_expression(end, counts);
            }
        }
        Expression::List(elements) => {
            for element in elements {
                count_expression(element, counts);
            }
        }
        Expression::Dict(pairs) => {
            for (key, value) in pairs {
                count_expression(key, counts);
                count_expression(value, counts);
            }
        }
        Expression::Match(subject, cases) => {
            count_expression(subject, counts);
            for case in cases {
                if let Some(guard) = &case.guard {
                    count_expression(guard, counts);
                }
                count_expression(&case.value, counts);
            }
        }
        Expression::Lambda(_)
        | Expression::Literal(_)
        | Expression::Variable(_)
        | Expression::This => {}
    }
}

fn rewrite_statement(
    stmt: &Statement,
    temps: &IndexMap<String, String>,
    report: &mut PassReport,
) -> Statement {
    match stmt {
        Statement::Block(statements) => Statement::Block(
            statements
                .iter()
                .map(|s| rewrite_statement(s, temps, report))
                .collect(),
        ),
        Statement::Expression(expr) => {
            Statement::Expression(rewrite_expression(expr, temps, None, report))
        }
        Statement::Throw(expr) => {
            Statement::Throw(rewrite_expression(expr, temps, None, report))
        }
        Statement::Var(decl) => {
            let mut decl = decl.clone();
            decl.initializer = decl
                .initializer
                .as_ref()
                .map(|init| rewrite_expression(init, temps, None, report));
            Statement::Var(decl)
        }
        Statement::Return(value) => Statement::Return(
            value
                .as_ref()
                .map(|v| rewrite_expression(v, temps, None, report)),
        ),
        Statement::If(if_stmt) => Statement::If(IfStmt {
            condition: rewrite_expression(&if_stmt.condition, temps, None, report),
            then_branch: Box::new(rewrite_statement(&if_stmt.then_branch, temps, report)),
            else_branch: if_stmt
                .else_branch
                .as_ref()
                .map(|e| Box::new(rewrite_statement(e, temps, report))),
        }),
        Statement::While(while_stmt) => Statement::While(WhileStmt {
            condition: rewrite_expression(&while_stmt.condition, temps, None, report),
            body: Box::new(rewrite_statement(&while_stmt.body, temps, report)),
        }),
        Statement::For(for_stmt) => {
            let mut for_stmt = for_stmt.clone();
            for_stmt.iterable = rewrite_expression(&for_stmt.iterable, temps, None, report);
            for_stmt.body = Box::new(rewrite_statement(&for_stmt.body, temps, report));
            Statement::For(for_stmt)
        }
        Statement::Export(inner) => {
            Statement::Export(Box::new(rewrite_statement(inner, temps, report)))
        }
        other => other.clone(),
    }
}

/// Replaces any subexpression whose canonical key has a temporary with a
/// read of that temporary. `skip` carries the key currently being declared
/// so an initializer does not collapse into a self-reference.
fn rewrite_expression(
    expr: &Expression,
    temps: &IndexMap<String, String>,
    skip: Option<&str>,
    report: &mut PassReport,
) -> Expression {
    if is_expensive(expr) {
        if let Some(key) = canonical_key(expr) {
            if skip != Some(key.as_str()) {
                if let Some(temp) = temps.get(&key) {
                    report.bump("occurrences rewritten");
                    return Expression::Variable(temp.clone());
                }
            }
        }
    }
    match expr {
        Expression::Binary(left, op, right) => Expression::Binary(
            Box::new(rewrite_expression(left, temps, None, report)),
            *op,
            Box::new(rewrite_expression(right, temps, None, report)),
        ),
        Expression::Logical(left, op, right) => Expression::Logical(
            Box::new(rewrite_expression(left, temps, None, report)),
            *op,
            Box::new(rewrite_expression(right, temps, None, report)),
        ),
        Expression::Unary(op, operand) => {
            Expression::Unary(*op, Box::new(rewrite_expression(operand, temps, None, report)))
        }
        Expression::Grouping(inner) => Expression::Grouping(Box::new(rewrite_expression(
            inner, temps, None, report,
        ))),
        Expression::Assign(name, value) => Expression::Assign(
            name.clone(),
            Box::new(rewrite_expression(value, temps, None, report)),
        ),
        Expression::Call(callee, args) => Expression::Call(
            Box::new(rewrite_expression(callee, temps, None, report)),
            args.iter()
                .map(|a| rewrite_expression(a, temps, None, report))
                .collect(),
        ),
        Expression::Get(object, name) => Expression::Get(
            Box::new(rewrite_expression(object, temps, None, report)),
            name.clone(),
        ),
        Expression::Set(object, name, value) => Expression::Set(
            Box::new(rewrite_expression(object, temps, None, report)),
            name.clone(),
            Box::new(rewrite_expression(value, temps, None, report)),
        ),
        Expression::Index(object, key) => Expression::Index(
            Box::new(rewrite_expression(object, temps, None, report)),
            Box::new(rewrite_expression(key, temps, None, report)),
        ),
        Expression::IndexSet(object, key, value) => Expression::IndexSet(
            Box::new(rewrite_expression(object, temps, None, report)),
            Box::new(rewrite_expression(key, temps, None, report)),
            Box::new(rewrite_expression(value, temps, None, report)),
        ),
        Expression::Slice { object, start, end } => Expression::Slice {
            object: Box::new(rewrite_expression(object, temps, None, report)),
            start: start
                .as_ref()
                .map(|s| Box::new(rewrite_expression(s, temps, None, report))),
            end: end
                .as_ref()
                .map(|e| Box::new(rewrite_expression(e, temps, None, report))),
        },
        Expression::List(elements) => Expression::List(
            elements
                .iter()
                .map(|e| rewrite_expression(e, temps, None, report))
                .collect(),
        ),
        Expression::Dict(pairs) => Expression::Dict(
            pairs
                .iter()
                .map(|(k, v)| {
                    (
                        rewrite_expression(k, temps, None, report),
                        rewrite_expression(v, temps, None, report),
                    )
                })
                .collect(),
        ),
        Expression::Match(subject, cases) => Expression::Match(
            Box::new(rewrite_expression(subject, temps, None, report)),
            cases
                .iter()
                .map(|case| crate::ast::MatchCase {
                    pattern: case.pattern.clone(),
                    guard: case
                        .guard
                        .as_ref()
                        .map(|g| rewrite_expression(g, temps, None, report)),
                    value: rewrite_expression(&case.value, temps, None, report),
                })
                .collect(),
        ),
        Expression::Lambda(_)
        | Expression::Literal(_)
        | Expression::Variable(_)
        | Expression::This => expr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;

    fn run(statements: Vec<Statement>) -> Vec<Statement> {
        let mut context = OptimizationContext::new(OptimizationLevel::O2);
        CommonSubexpressionEliminationPass
            .transform(&statements, &mut context)
            .unwrap()
            .statements
    }

    fn a_times_b() -> Expression {
        Expression::binary(
            Expression::variable("a"),
            BinaryOp::Multiply,
            Expression::variable("b"),
        )
    }

    fn ab_plus_c() -> Expression {
        Expression::binary(a_times_b(), BinaryOp::Add, Expression::variable("c"))
    }

    #[test]
    fn test_repeated_expression_hoisted_in_block() {
        let input = vec![Statement::Block(vec![
            Statement::var("r", ab_plus_c()),
            Statement::var("s", ab_plus_c()),
        ])];
        let output = run(input);

        // Inner subexpression first, then the outer one built from it.
        let expected = vec![Statement::Block(vec![
            Statement::var("_cse1", a_times_b()),
            Statement::var(
                "_cse0",
                Expression::binary(
                    Expression::variable("_cse1"),
                    BinaryOp::Add,
                    Expression::variable("c"),
                ),
            ),
            Statement::var("r", Expression::variable("_cse0")),
            Statement::var("s", Expression::variable("_cse0")),
        ])];
        assert_eq!(output, expected);
    }

    #[test]
    fn test_single_occurrence_untouched() {
        let input = vec![Statement::Block(vec![
            Statement::var("r", ab_plus_c()),
            Statement::var("s", Expression::variable("r")),
        ])];
        assert_eq!(run(input.clone()), input);
    }

    #[test]
    fn test_grouping_is_transparent() {
        let input = vec![Statement::Block(vec![
            Statement::var("r", Expression::grouping(a_times_b())),
            Statement::var("s", a_times_b()),
        ])];
        let expected = vec![Statement::Block(vec![
            Statement::var("_cse0", a_times_b()),
            Statement::var("r", Expression::grouping(Expression::variable("_cse0"))),
            Statement::var("s", Expression::variable("_cse0")),
        ])];
        assert_eq!(run(input), expected);
    }

    #[test]
    fn test_assignments_never_hoisted() {
        let write = Expression::binary(
            Expression::assign("x", Expression::number(1.0)),
            BinaryOp::Add,
            Expression::variable("y"),
        );
        let input = vec![Statement::Block(vec![
            Statement::Expression(write.clone()),
            Statement::Expression(write.clone()),
        ])];
        assert_eq!(run(input.clone()), input);
    }

    #[test]
    fn test_lambda_bodies_are_separate_scopes() {
        use crate::ast::Lambda;
        let lambda = Expression::Lambda(Lambda {
            params: vec![],
            body: vec![Statement::Return(Some(a_times_b()))],
        });
        let input = vec![Statement::Block(vec![
            Statement::var("f", lambda.clone()),
            Statement::var("r", a_times_b()),
        ])];
        // The occurrence inside the lambda does not pair with the outer one.
        assert_eq!(run(input.clone()), input);
    }

    #[test]
    fn test_plain_statement_scope_wraps_in_block() {
        let doubled = Expression::binary(a_times_b(), BinaryOp::Add, a_times_b());
        let input = vec![Statement::var("r", doubled)];
        let expected = vec![Statement::Block(vec![
            Statement::var("_cse0", a_times_b()),
            Statement::var(
                "r",
                Expression::binary(
                    Expression::variable("_cse0"),
                    BinaryOp::Add,
                    Expression::variable("_cse0"),
                ),
            ),
        ])];
        assert_eq!(run(input), expected);
    }

    #[test]
    fn test_write_between_occurrences_blocks_hoisting() {
        // `a` is reassigned between the two occurrences, so a single
        // top-of-scope temporary would carry the stale product.
        let input = vec![Statement::Block(vec![
            Statement::var("r", a_times_b()),
            Statement::Expression(Expression::assign("a", Expression::number(5.0))),
            Statement::var("s", a_times_b()),
        ])];
        assert_eq!(run(input.clone()), input);
    }

    #[test]
    fn test_write_to_unrelated_symbol_does_not_block() {
        let input = vec![Statement::Block(vec![
            Statement::var("r", a_times_b()),
            Statement::Expression(Expression::assign("x", Expression::number(0.0))),
            Statement::var("s", a_times_b()),
        ])];
        let expected = vec![Statement::Block(vec![
            Statement::var("_cse0", a_times_b()),
            Statement::var("r", Expression::variable("_cse0")),
            Statement::Expression(Expression::assign("x", Expression::number(0.0))),
            Statement::var("s", Expression::variable("_cse0")),
        ])];
        assert_eq!(run(input), expected);
    }

    #[test]
    fn test_property_store_on_base_blocks_hoisting() {
        let o_x = Expression::get(Expression::variable("o"), "x");
        let input = vec![Statement::Block(vec![
            Statement::var("r", o_x.clone()),
            Statement::Expression(Expression::Set(
                Box::new(Expression::variable("o")),
                "x".to_string(),
                Box::new(Expression::number(5.0)),
            )),
            Statement::var("s", o_x.clone()),
        ])];
        assert_eq!(run(input.clone()), input);
    }

    #[test]
    fn test_function_body_is_its_own_scope() {
        let input = vec![Statement::function(
            "f",
            vec!["a", "b", "c"],
            vec![
                Statement::var("r", a_times_b()),
                Statement::var("s", a_times_b()),
            ],
        )];
        let expected = vec![Statement::function(
            "f",
            vec!["a", "b", "c"],
            vec![
                Statement::var("_cse0", a_times_b()),
                Statement::var("r", Expression::variable("_cse0")),
                Statement::var("s", Expression::variable("_cse0")),
            ],
        )];
        assert_eq!(run(input), expected);
    }
}
