use rustc_hash::FxHashSet;

use crate::ast::{Expression, Statement};
use crate::config::OptimizationLevel;
use crate::errors::OptimizeError;
use crate::optimizer::context::OptimizationContext;
use crate::optimizer::pass::{OptimizationPass, PassOutcome, PassReport, PassType};

/// Removes unused variables, unused functions, and expression statements
/// with no observable effect.
pub struct DeadCodeEliminationPass;

impl OptimizationPass for DeadCodeEliminationPass {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn pass_type(&self) -> PassType {
        PassType::Cleanup
    }

    fn minimum_level(&self) -> OptimizationLevel {
        OptimizationLevel::O1
    }

    fn description(&self) -> &'static str {
        "Removes unused variables, functions, and pure statements"
    }

    fn transform(
        &self,
        statements: &[Statement],
        _context: &mut OptimizationContext,
    ) -> Result<PassOutcome, OptimizeError> {
        let mut usage = UsageCollector::default();
        usage.collect(statements);

        let mut report = PassReport::new();
        let optimized = remove_dead_code(statements, &usage, &mut report);
        Ok(PassOutcome::new(optimized, report))
    }
}

fn remove_dead_code(
    statements: &[Statement],
    usage: &UsageCollector,
    report: &mut PassReport,
) -> Vec<Statement> {
    let mut result = Vec::with_capacity(statements.len());
    for stmt in statements {
        match stmt {
            Statement::Var(decl) => {
                let initializer_pure = decl
                    .initializer
                    .as_ref()
                    .map(|init| !has_side_effects(init))
                    .unwrap_or(true);
                if !usage.is_used(&decl.name) && initializer_pure {
                    report.bump("variables removed");
                    continue;
                }
            }
            Statement::Function(func) => {
                if !usage.is_used(&func.name) && !is_entry_point(&func.name) {
                    report.bump("functions removed");
                    continue;
                }
            }
            Statement::Expression(expr) => {
                if !has_side_effects(expr) {
                    report.bump("statements removed");
                    continue;
                }
            }
            Statement::Block(inner) => {
                let optimized = remove_dead_code(inner, usage, report);
                if !optimized.is_empty() {
                    result.push(Statement::Block(optimized));
                }
                continue;
            }
            _ => {}
        }
        result.push(stmt.clone());
    }
    result
}

/// Entry points and test functions stay even when nothing references them.
fn is_entry_point(name: &str) -> bool {
    name == "main" || name.starts_with("test")
}

/// Conservative effect analysis: anything that writes or calls counts.
fn has_side_effects(expr: &Expression) -> bool {
    match expr {
        Expression::Assign(..)
        | Expression::Call(..)
        | Expression::Set(..)
        | Expression::IndexSet(..)
        | Expression::Match(..) => true,
        Expression::Binary(left, _, right) | Expression::Logical(left, _, right) => {
            has_side_effects(left) || has_side_effects(right)
        }
        Expression::Unary(_, operand) | Expression::Grouping(operand) => {
            has_side_effects(operand)
        }
        Expression::Get(object, _) => has_side_effects(object),
        Expression::Index(object, key) => has_side_effects(object) || has_side_effects(key),
        Expression::Slice { object, start, end } => {
            has_side_effects(object)
                || start.as_ref().map(|s| has_side_effects(s)).unwrap_or(false)
                || end.as_ref().map(|e| has_side_effects(e)).unwrap_or(false)
        }
        Expression::List(elements) => elements.iter().any(has_side_effects),
        Expression::Dict(pairs) => pairs
            .iter()
            .any(|(k, v)| has_side_effects(k) || has_side_effects(v)),
        Expression::Literal(_)
        | Expression::Variable(_)
        | Expression::Lambda(_)
        | Expression::This => false,
    }
}

/// Records every symbol that is read or assigned anywhere in the program,
/// including inside lambda and function bodies.
#[derive(Default)]
struct UsageCollector {
    used: FxHashSet<String>,
}

impl UsageCollector {
    fn is_used(&self, symbol: &str) -> bool {
        self.used.contains(symbol)
    }

    fn collect(&mut self, statements: &[Statement]) {
        for stmt in statements {
            self.collect_statement(stmt);
        }
    }

    fn collect_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Block(statements) => self.collect(statements),
            Statement::Expression(expr) | Statement::Throw(expr) => {
                self.collect_expression(expr)
            }
            Statement::Var(decl) => {
                if let Some(init) = &decl.initializer {
                    self.collect_expression(init);
                }
            }
            Statement::Return(value) => {
                if let Some(value) = value {
                    self.collect_expression(value);
                }
            }
            Statement::If(if_stmt) => {
                self.collect_expression(&if_stmt.condition);
                self.collect_statement(&if_stmt.then_branch);
                if let Some(else_branch) = &if_stmt.else_branch {
                    self.collect_statement(else_branch);
                }
            }
            Statement::While(while_stmt) => {
                self.collect_expression(&while_stmt.condition);
                self.collect_statement(&while_stmt.body);
            }
            Statement::For(for_stmt) => {
                self.collect_expression(&for_stmt.iterable);
                self.collect_statement(&for_stmt.body);
            }
            Statement::Function(func) => self.collect(&func.body),
            Statement::Class(class) => {
                for method in &class.methods {
                    self.collect(&method.body);
                }
            }
            Statement::Export(inner) => {
                // Exported declarations are visible outside this module.
                match inner.as_ref() {
                    Statement::Function(func) => self.used.insert(func.name.clone()),
                    Statement::Var(decl) => self.used.insert(decl.name.clone()),
                    _ => false,
                };
                self.collect_statement(inner);
            }
            Statement::ExportIdentifier(name) => {
                self.used.insert(name.clone());
            }
            Statement::Import(_) | Statement::TypeAlias { .. } => {}
        }
    }

    fn collect_expression(&mut self, expr: &Expression) {
        match expr {
            Expression::Variable(name) => {
                self.used.insert(name.clone());
            }
            Expression::Assign(name, value) => {
                self.used.insert(name.clone());
                self.collect_expression(value);
            }
            Expression::Binary(left, _, right) | Expression::Logical(left, _, right) => {
                self.collect_expression(left);
                self.collect_expression(right);
            }
            Expression::Unary(_, operand) | Expression::Grouping(operand) => {
                self.collect_expression(operand);
            }
            Expression::Call(callee, args) => {
                self.collect_expression(callee);
                for arg in args {
                    self.collect_expression(arg);
                }
            }
            Expression::Get(object, _) => self.collect_expression(object),
            Expression::Set(object, _, value) => {
                self.collect_expression(object);
                self.collect_expression(value);
            }
            Expression::Index(object, key) => {
                self.collect_expression(object);
                self.collect_expression(key);
            }
            Expression::IndexSet(object, key, value) => {
                self.collect_expression(object);
                self.collect_expression(key);
                self.collect_expression(value);
            }
            Expression::Slice { object, start, end } => {
                self.collect_expression(object);
                if let Some(start) = start {
                    self.collect_expression(start);
                }
                if let Some(end) = end {
                    self.collect_expression(end);
                }
            }
            Expression::List(elements) => {
                for element in elements {
                    self.collect_expression(element);
                }
            }
            Expression::Dict(pairs) => {
                for (key, value) in pairs {
                    self.collect_expression(key);
                    self.collect_expression(value);
                }
            }
            Expression::Lambda(lambda) => self.collect(&lambda.body),
            Expression::Match(subject, cases) => {
                self.collect_expression(subject);
                for case in cases {
                    self.collect_expression(&case.pattern);
                    if let Some(guard) = &case.guard {
                        self.collect_expression(guard);
                    }
                    self.collect_expression(&case.value);
                }
            }
            Expression::Literal(_) | Expression::This => {}
        }
    }
}
