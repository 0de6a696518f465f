use crate::ast::{
    Expression, FunctionDecl, IfStmt, Literal, Statement, VarDecl, WhileStmt,
};
use crate::config::OptimizationLevel;
use crate::errors::OptimizeError;
use crate::optimizer::context::OptimizationContext;
use crate::optimizer::pass::{OptimizationPass, PassOutcome, PassReport, PassType};

/// Detects self-recursive tail calls and which of them sit in trailing
/// position (their fall-through reaches the end of the function body).
pub struct TailCallAnalyzer;

impl TailCallAnalyzer {
    /// True when `statements` contains a `return f(...)` where `f` is the
    /// enclosing function, at any nesting of blocks, branches, or loops.
    /// Nested functions and lambdas are not searched.
    pub fn has_tail_recursion(function: &FunctionDecl) -> bool {
        Self::any_tail_call(&function.body, &function.name)
    }

    fn any_tail_call(statements: &[Statement], function_name: &str) -> bool {
        statements
            .iter()
            .any(|stmt| Self::statement_has_tail_call(stmt, function_name))
    }

    fn statement_has_tail_call(stmt: &Statement, function_name: &str) -> bool {
        match stmt {
            Statement::Return(value) => value
                .as_ref()
                .map(|v| Self::as_self_call(v, function_name).is_some())
                .unwrap_or(false),
            Statement::Block(statements) => Self::any_tail_call(statements, function_name),
            Statement::If(if_stmt) => {
                Self::statement_has_tail_call(&if_stmt.then_branch, function_name)
                    || if_stmt
                        .else_branch
                        .as_ref()
                        .map(|e| Self::statement_has_tail_call(e, function_name))
                        .unwrap_or(false)
            }
            Statement::While(while_stmt) => {
                Self::statement_has_tail_call(&while_stmt.body, function_name)
            }
            _ => false,
        }
    }

    /// The call's arguments when `value` is a direct self-recursive call.
    fn as_self_call<'a>(value: &'a Expression, function_name: &str) -> Option<&'a [Expression]> {
        if let Expression::Call(callee, args) = value {
            if let Expression::Variable(name) = callee.as_ref() {
                if name == function_name {
                    return Some(args);
                }
            }
        }
        None
    }

    /// Every path through `statements` ends in a return or throw.
    pub fn always_terminates(statements: &[Statement]) -> bool {
        statements.iter().any(Self::statement_terminates)
    }

    fn statement_terminates(stmt: &Statement) -> bool {
        match stmt {
            Statement::Return(_) | Statement::Throw(_) => true,
            Statement::Block(statements) => Self::always_terminates(statements),
            Statement::If(if_stmt) => {
                if_stmt
                    .else_branch
                    .as_ref()
                    .map(|e| {
                        Self::statement_terminates(&if_stmt.then_branch)
                            && Self::statement_terminates(e)
                    })
                    .unwrap_or(false)
            }
            _ => false,
        }
    }
}

/// Rewrites self-recursive tail calls into loop iterations: the function
/// body becomes `while (true) { ... }` and each trailing `return f(args)`
/// turns into argument temporaries, parameter reassignments, and a
/// fall-through to the next iteration.
pub struct TailCallOptimizationPass;

impl OptimizationPass for TailCallOptimizationPass {
    fn name(&self) -> &'static str {
        "tail-call-optimization"
    }

    fn pass_type(&self) -> PassType {
        PassType::Transformation
    }

    fn minimum_level(&self) -> OptimizationLevel {
        OptimizationLevel::O2
    }

    fn estimated_cost(&self) -> u32 {
        2
    }

    fn description(&self) -> &'static str {
        "Converts self-recursive tail calls into loops"
    }

    fn transform(
        &self,
        statements: &[Statement],
        _context: &mut OptimizationContext,
    ) -> Result<PassOutcome, OptimizeError> {
        let mut report = PassReport::new();
        let optimized = statements
            .iter()
            .map(|stmt| rewrite_statement(stmt, &mut report))
            .collect();
        Ok(PassOutcome::new(optimized, report))
    }
}

fn rewrite_statement(stmt: &Statement, report: &mut PassReport) -> Statement {
    match stmt {
        Statement::Function(func) => Statement::Function(rewrite_function(func, report)),
        Statement::Class(class) => {
            let mut class = class.clone();
            class.methods = class
                .methods
                .iter()
                .map(|m| rewrite_function(m, report))
                .collect();
            Statement::Class(class)
        }
        Statement::Block(statements) => Statement::Block(
            statements
                .iter()
                .map(|s| rewrite_statement(s, report))
                .collect(),
        ),
        Statement::Export(inner) => {
            Statement::Export(Box::new(rewrite_statement(inner, report)))
        }
        other => other.clone(),
    }
}

fn rewrite_function(func: &FunctionDecl, report: &mut PassReport) -> FunctionDecl {
    // Look for tail calls inside the body first so nested declarations get
    // their own chance.
    let mut func = func.clone();
    func.body = func
        .body
        .iter()
        .map(|s| rewrite_statement(s, report))
        .collect();

    if !TailCallAnalyzer::has_tail_recursion(&func) {
        return func;
    }
    // A fall-off-the-end path would spin forever inside the loop wrapper.
    if !TailCallAnalyzer::always_terminates(&func.body) {
        return func;
    }

    let mut eliminated = 0u64;
    let rewritten = rewrite_trailing(&func.body, &func, &mut eliminated);
    if eliminated == 0 {
        return func;
    }

    report.bump("functions rewritten");
    report.record("tail calls eliminated", eliminated);

    func.body = vec![Statement::While(WhileStmt {
        condition: Expression::Literal(Literal::Boolean(true)),
        body: Box::new(Statement::Block(rewritten)),
    })];
    func
}

/// Rewrites tail calls reachable in trailing position: the last statement
/// of the sequence, descending through blocks and both arms of a trailing
/// if/else. Tail calls anywhere else stay real recursion, which is still
/// correct because a `return` leaves the loop.
fn rewrite_trailing(
    statements: &[Statement],
    func: &FunctionDecl,
    eliminated: &mut u64,
) -> Vec<Statement> {
    let mut result: Vec<Statement> = statements.to_vec();
    let Some(last) = result.pop() else {
        return result;
    };
    match last {
        Statement::Return(Some(ref value)) => {
            if let Some(args) = TailCallAnalyzer::as_self_call(value, &func.name) {
                if args.len() == func.params.len() {
                    *eliminated += 1;
                    result.extend(expand_call_site(args, func));
                    return result;
                }
            }
            result.push(last);
        }
        Statement::Block(ref inner) => {
            result.push(Statement::Block(rewrite_trailing(inner, func, eliminated)));
        }
        Statement::If(ref if_stmt) => {
            let then_branch = Statement::Block(rewrite_trailing(
                std::slice::from_ref(&if_stmt.then_branch),
                func,
                eliminated,
            ));
            let else_branch = if_stmt.else_branch.as_ref().map(|e| {
                Box::new(Statement::Block(rewrite_trailing(
                    std::slice::from_ref(e),
                    func,
                    eliminated,
                )))
            });
            result.push(Statement::If(IfStmt {
                condition: if_stmt.condition.clone(),
                then_branch: Box::new(then_branch),
                else_branch,
            }));
        }
        other => result.push(other),
    }
    result
}

/// One rewritten call site: evaluate every argument into a temporary before
/// any parameter changes, so argument expressions that read the parameters
/// see the old values.
fn expand_call_site(args: &[Expression], func: &FunctionDecl) -> Vec<Statement> {
    let mut statements = Vec::with_capacity(args.len() * 2);
    for (i, arg) in args.iter().enumerate() {
        statements.push(Statement::Var(VarDecl {
            name: format!("_tail{i}"),
            type_annotation: None,
            initializer: Some(arg.clone()),
            immutable: false,
        }));
    }
    for (i, param) in func.params.iter().enumerate() {
        statements.push(Statement::Expression(Expression::assign(
            param.name.clone(),
            Expression::variable(format!("_tail{i}")),
        )));
    }
    statements
}
