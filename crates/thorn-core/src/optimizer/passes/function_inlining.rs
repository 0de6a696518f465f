use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{Expression, FunctionDecl, Parameter, Statement};
use crate::config::OptimizationLevel;
use crate::errors::OptimizeError;
use crate::optimizer::context::OptimizationContext;
use crate::optimizer::pass::{OptimizationPass, PassOutcome, PassReport, PassType};

const DEFAULT_INLINE_THRESHOLD: i64 = 5; // AST node count
const MAX_INLINE_DEPTH: usize = 3;
const MAX_CALL_SITES: usize = 5;

/// Replaces calls to small functions with their bodies. Only functions
/// whose body is a single `return <expr>` are candidates; recursive
/// functions, large functions, and heavily-called functions are skipped.
pub struct FunctionInliningPass;

impl OptimizationPass for FunctionInliningPass {
    fn name(&self) -> &'static str {
        "function-inlining"
    }

    fn pass_type(&self) -> PassType {
        PassType::Transformation
    }

    fn minimum_level(&self) -> OptimizationLevel {
        OptimizationLevel::O2
    }

    fn dependencies(&self) -> &[&'static str] {
        &["dead-code-elimination", "constant-folding"]
    }

    fn estimated_cost(&self) -> u32 {
        3
    }

    fn description(&self) -> &'static str {
        "Inlines small functions to eliminate call overhead"
    }

    fn transform(
        &self,
        statements: &[Statement],
        context: &mut OptimizationContext,
    ) -> Result<PassOutcome, OptimizeError> {
        let threshold = context.pass_setting_int(
            "function-inlining",
            "threshold",
            DEFAULT_INLINE_THRESHOLD,
        );
        let mut inliner = Inliner::new(threshold);
        inliner.analyze(statements);
        let optimized = inliner.run(statements);

        let mut report = PassReport::new();
        report.record("calls inlined", inliner.calls_inlined);
        report.record("functions removed", inliner.functions_removed);
        Ok(PassOutcome::new(optimized, report))
    }
}

struct Inliner {
    threshold: i64,
    functions: FxHashMap<String, FunctionDecl>,
    sizes: FxHashMap<String, i64>,
    call_counts: FxHashMap<String, usize>,
    recursive: FxHashSet<String>,
    inlineable: FxHashSet<String>,
    inlined_functions: FxHashSet<String>,
    calls_inlined: u64,
    functions_removed: u64,
    depth: usize,
}

impl Inliner {
    fn new(threshold: i64) -> Self {
        Inliner {
            threshold,
            functions: FxHashMap::default(),
            sizes: FxHashMap::default(),
            call_counts: FxHashMap::default(),
            recursive: FxHashSet::default(),
            inlineable: FxHashSet::default(),
            inlined_functions: FxHashSet::default(),
            calls_inlined: 0,
            functions_removed: 0,
            depth: 0,
        }
    }

    /// Collect definitions, sizes, recursion, and call counts, then decide
    /// which functions qualify.
    fn analyze(&mut self, statements: &[Statement]) {
        self.collect_functions(statements);
        for stmt in statements {
            self.count_calls_statement(stmt);
        }

        let mut qualifying = Vec::new();
        for (name, func) in &self.functions {
            let size = self.sizes.get(name).copied().unwrap_or(i64::MAX);
            let calls = self.call_counts.get(name).copied().unwrap_or(0);
            if size > self.threshold
                || self.recursive.contains(name)
                || calls == 0
                || calls > MAX_CALL_SITES
                || name == "main"
                || name.starts_with("test")
            {
                continue;
            }
            // Only single-return-expression bodies can be spliced into an
            // expression position, and substitution cannot reach parameter
            // reads hidden behind a lambda or match boundary.
            if let [Statement::Return(Some(body))] = func.body.as_slice() {
                if !contains_scope_boundary(body) {
                    qualifying.push(name.clone());
                }
            }
        }
        self.inlineable = qualifying.into_iter().collect();
    }

    fn run(&mut self, statements: &[Statement]) -> Vec<Statement> {
        let transformed: Vec<Statement> = statements
            .iter()
            .map(|stmt| self.transform_statement(stmt))
            .collect();

        // A definition goes away only when every call to it was replaced.
        self.call_counts.clear();
        for stmt in &transformed {
            self.count_calls_statement(stmt);
        }
        transformed
            .into_iter()
            .filter(|stmt| match stmt {
                Statement::Function(func) => {
                    let gone = self.inlined_functions.contains(&func.name)
                        && self.call_counts.get(&func.name).copied().unwrap_or(0) == 0;
                    if gone {
                        self.functions_removed += 1;
                    }
                    !gone
                }
                _ => true,
            })
            .collect()
    }

    fn collect_functions(&mut self, statements: &[Statement]) {
        for stmt in statements {
            match stmt {
                Statement::Function(func) => self.record_function(func),
                Statement::Class(class) => {
                    for method in &class.methods {
                        self.record_function(method);
                    }
                }
                Statement::Block(inner) => self.collect_functions(inner),
                Statement::If(if_stmt) => {
                    self.collect_functions(std::slice::from_ref(&if_stmt.then_branch));
                    if let Some(else_branch) = &if_stmt.else_branch {
                        self.collect_functions(std::slice::from_ref(else_branch));
                    }
                }
                Statement::While(while_stmt) => {
                    self.collect_functions(std::slice::from_ref(&while_stmt.body));
                }
                Statement::For(for_stmt) => {
                    self.collect_functions(std::slice::from_ref(&for_stmt.body));
                }
                Statement::Export(inner) => {
                    self.collect_functions(std::slice::from_ref(inner));
                }
                _ => {}
            }
        }
    }

    fn record_function(&mut self, func: &FunctionDecl) {
        let name = func.name.clone();
        self.sizes.insert(name.clone(), function_size(func));
        if is_recursive(func) {
            self.recursive.insert(name.clone());
        }
        self.functions.insert(name, func.clone());
    }

    fn count_calls_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Block(statements) => {
                for s in statements {
                    self.count_calls_statement(s);
                }
            }
            Statement::Expression(expr) | Statement::Throw(expr) => {
                self.count_calls_expression(expr)
            }
            Statement::Var(decl) => {
                if let Some(init) = &decl.initializer {
                    self.count_calls_expression(init);
                }
            }
            Statement::Return(Some(value)) => self.count_calls_expression(value),
            Statement::Return(None) => {}
            Statement::If(if_stmt) => {
                self.count_calls_expression(&if_stmt.condition);
                self.count_calls_statement(&if_stmt.then_branch);
                if let Some(else_branch) = &if_stmt.else_branch {
                    self.count_calls_statement(else_branch);
                }
            }
            Statement::While(while_stmt) => {
                self.count_calls_expression(&while_stmt.condition);
                self.count_calls_statement(&while_stmt.body);
            }
            Statement::For(for_stmt) => {
                self.count_calls_expression(&for_stmt.iterable);
                self.count_calls_statement(&for_stmt.body);
            }
            Statement::Function(func) => {
                for s in &func.body {
                    self.count_calls_statement(s);
                }
            }
            Statement::Class(class) => {
                for method in &class.methods {
                    for s in &method.body {
                        self.count_calls_statement(s);
                    }
                }
            }
            Statement::Export(inner) => self.count_calls_statement(inner),
            Statement::Import(_) | Statement::ExportIdentifier(_)
            | Statement::TypeAlias { .. } => {}
        }
    }

    fn count_calls_expression(&mut self, expr: &Expression) {
        if let Expression::Call(callee, _) = expr {
            if let Expression::Variable(name) = callee.as_ref() {
                *self.call_counts.entry(name.clone()).or_insert(0) += 1;
            }
        }
        for_each_child(expr, |child| self.count_calls_expression(child));
    }

    fn transform_statement(&mut self, stmt: &Statement) -> Statement {
        match stmt {
            Statement::Block(statements) => {
                let mut result = Vec::with_capacity(statements.len());
                for s in statements {
                    result.push(self.transform_statement(s));
                }
                Statement::Block(result)
            }
            Statement::Expression(expr) => {
                Statement::Expression(self.transform_expression(expr))
            }
            Statement::Throw(expr) => Statement::Throw(self.transform_expression(expr)),
            Statement::Var(decl) => {
                let mut decl = decl.clone();
                decl.initializer = decl
                    .initializer
                    .as_ref()
                    .map(|init| self.transform_expression(init));
                Statement::Var(decl)
            }
            Statement::Return(value) => {
                Statement::Return(value.as_ref().map(|v| self.transform_expression(v)))
            }
            Statement::If(if_stmt) => {
                let mut if_stmt = if_stmt.clone();
                if_stmt.condition = self.transform_expression(&if_stmt.condition);
                if_stmt.then_branch = Box::new(self.transform_statement(&if_stmt.then_branch));
                if_stmt.else_branch = if_stmt
                    .else_branch
                    .take()
                    .map(|e| Box::new(self.transform_statement(&e)));
                Statement::If(if_stmt)
            }
            Statement::While(while_stmt) => {
                let mut while_stmt = while_stmt.clone();
                while_stmt.condition = self.transform_expression(&while_stmt.condition);
                while_stmt.body = Box::new(self.transform_statement(&while_stmt.body));
                Statement::While(while_stmt)
            }
            Statement::For(for_stmt) => {
                let mut for_stmt = for_stmt.clone();
                for_stmt.iterable = self.transform_expression(&for_stmt.iterable);
                for_stmt.body = Box::new(self.transform_statement(&for_stmt.body));
                Statement::For(for_stmt)
            }
            Statement::Function(func) => {
                let mut func = func.clone();
                func.body = func
                    .body
                    .iter()
                    .map(|s| self.transform_statement(s))
                    .collect();
                Statement::Function(func)
            }
            Statement::Class(class) => {
                let mut class = class.clone();
                for method in &mut class.methods {
                    method.body = method
                        .body
                        .iter()
                        .map(|s| self.transform_statement(s))
                        .collect();
                }
                Statement::Class(class)
            }
            Statement::Export(inner) => {
                Statement::Export(Box::new(self.transform_statement(inner)))
            }
            other => other.clone(),
        }
    }

    fn transform_expression(&mut self, expr: &Expression) -> Expression {
        if self.depth >= MAX_INLINE_DEPTH {
            return expr.clone();
        }
        if let Expression::Call(callee, args) = expr {
            if let Expression::Variable(name) = callee.as_ref() {
                if self.inlineable.contains(name) {
                    if let Some(inlined) = self.inline_call(name.clone(), args) {
                        self.inlined_functions.insert(name.clone());
                        self.calls_inlined += 1;
                        return inlined;
                    }
                }
            }
        }
        rebuild(expr, |child| self.transform_expression(child))
    }

    /// Substitute the call's arguments into the candidate's return
    /// expression. Declined when the arity does not match, when a
    /// side-effecting argument's parameter does not occur exactly once in
    /// the body (substitution would drop or repeat the effect), or when
    /// two side-effecting arguments would run in a different order than
    /// the call site evaluates them.
    fn inline_call(&mut self, name: String, args: &[Expression]) -> Option<Expression> {
        let func = self.functions.get(&name)?.clone();
        if args.len() != func.params.len() {
            return None;
        }
        let [Statement::Return(Some(body))] = func.body.as_slice() else {
            return None;
        };

        self.depth += 1;
        let substituted: Vec<Expression> =
            args.iter().map(|arg| self.transform_expression(arg)).collect();
        self.depth -= 1;

        let mut bindings: FxHashMap<&str, &Expression> = FxHashMap::default();
        let mut effectful = Vec::new();
        for (index, (param, arg)) in func.params.iter().zip(&substituted).enumerate() {
            if !is_trivial(arg) {
                if occurrences(body, &param.name) != 1 {
                    return None;
                }
                effectful.push(index);
            }
            bindings.insert(param.name.as_str(), arg);
        }
        if effectful.len() > 1 && !reads_in_parameter_order(body, &func.params, &effectful) {
            return None;
        }
        Some(substitute(body, &bindings))
    }
}

/// Flat node count: one per statement plus one per directly attached
/// expression.
fn function_size(func: &FunctionDecl) -> i64 {
    fn statement_size(stmt: &Statement) -> i64 {
        match stmt {
            Statement::Block(statements) => {
                1 + statements.iter().map(statement_size).sum::<i64>()
            }
            Statement::Expression(_) | Statement::Throw(_) => 2,
            Statement::Var(decl) => 1 + i64::from(decl.initializer.is_some()),
            Statement::Return(value) => 1 + i64::from(value.is_some()),
            Statement::If(if_stmt) => {
                2 + statement_size(&if_stmt.then_branch)
                    + if_stmt
                        .else_branch
                        .as_ref()
                        .map(|e| statement_size(e))
                        .unwrap_or(0)
            }
            Statement::While(while_stmt) => 2 + statement_size(&while_stmt.body),
            Statement::For(for_stmt) => 2 + statement_size(&for_stmt.body),
            Statement::Function(func) => {
                1 + func.body.iter().map(statement_size).sum::<i64>()
            }
            Statement::Class(class) => {
                1 + class
                    .methods
                    .iter()
                    .flat_map(|m| m.body.iter())
                    .map(statement_size)
                    .sum::<i64>()
            }
            Statement::Export(inner) => statement_size(inner),
            _ => 1,
        }
    }
    func.body.iter().map(statement_size).sum()
}

fn is_recursive(func: &FunctionDecl) -> bool {
    fn statement_calls(stmt: &Statement, target: &str) -> bool {
        match stmt {
            Statement::Block(statements) => {
                statements.iter().any(|s| statement_calls(s, target))
            }
            Statement::Expression(expr) | Statement::Throw(expr) => {
                expression_calls(expr, target)
            }
            Statement::Var(decl) => decl
                .initializer
                .as_ref()
                .map(|init| expression_calls(init, target))
                .unwrap_or(false),
            Statement::Return(value) => value
                .as_ref()
                .map(|v| expression_calls(v, target))
                .unwrap_or(false),
            Statement::If(if_stmt) => {
                expression_calls(&if_stmt.condition, target)
                    || statement_calls(&if_stmt.then_branch, target)
                    || if_stmt
                        .else_branch
                        .as_ref()
                        .map(|e| statement_calls(e, target))
                        .unwrap_or(false)
            }
            Statement::While(while_stmt) => {
                expression_calls(&while_stmt.condition, target)
                    || statement_calls(&while_stmt.body, target)
            }
            Statement::For(for_stmt) => {
                expression_calls(&for_stmt.iterable, target)
                    || statement_calls(&for_stmt.body, target)
            }
            Statement::Function(func) => {
                func.body.iter().any(|s| statement_calls(s, target))
            }
            Statement::Export(inner) => statement_calls(inner, target),
            _ => false,
        }
    }

    fn expression_calls(expr: &Expression, target: &str) -> bool {
        if let Expression::Call(callee, _) = expr {
            if let Expression::Variable(name) = callee.as_ref() {
                if name == target {
                    return true;
                }
            }
        }
        let mut found = false;
        for_each_child(expr, |child| {
            if !found {
                found = expression_calls(child, target);
            }
        });
        found
    }

    func.body.iter().any(|s| statement_calls(s, &func.name))
}

/// Safe to duplicate at multiple parameter occurrences.
fn is_trivial(expr: &Expression) -> bool {
    matches!(
        expr,
        Expression::Literal(_) | Expression::Variable(_) | Expression::This
    )
}

fn occurrences(expr: &Expression, name: &str) -> usize {
    let mut count = usize::from(matches!(expr, Expression::Variable(n) if n == name));
    for_each_child(expr, |child| count += occurrences(child, name));
    count
}

/// A lambda or match nested in the body would capture parameter names that
/// plain substitution cannot rewrite.
fn contains_scope_boundary(expr: &Expression) -> bool {
    if matches!(expr, Expression::Lambda(_) | Expression::Match(..)) {
        return true;
    }
    let mut found = false;
    for_each_child(expr, |child| {
        if !found {
            found = contains_scope_boundary(child);
        }
    });
    found
}

/// True when the body reads the tracked parameters in the same order the
/// call site evaluates its arguments. Each tracked parameter occurs
/// exactly once, so the read sequence decides the substituted effects'
/// order.
fn reads_in_parameter_order(body: &Expression, params: &[Parameter], tracked: &[usize]) -> bool {
    let mut reads = Vec::new();
    variable_read_order(body, &mut reads);
    let positions: Vec<usize> = reads
        .iter()
        .filter_map(|name| params.iter().position(|p| &p.name == name))
        .filter(|index| tracked.contains(index))
        .collect();
    positions.windows(2).all(|pair| pair[0] < pair[1])
}

/// Variable reads in evaluation order (left to right, callee before
/// arguments).
fn variable_read_order(expr: &Expression, reads: &mut Vec<String>) {
    if let Expression::Variable(name) = expr {
        reads.push(name.clone());
    }
    for_each_child(expr, |child| variable_read_order(child, reads));
}

fn substitute(expr: &Expression, bindings: &FxHashMap<&str, &Expression>) -> Expression {
    if let Expression::Variable(name) = expr {
        if let Some(replacement) = bindings.get(name.as_str()) {
            return (*replacement).clone();
        }
    }
    rebuild(expr, |child| substitute(child, bindings))
}

/// Applies `f` to every direct subexpression. Lambda and match bodies are
/// boundaries and are not visited.
fn for_each_child<F: FnMut(&Expression)>(expr: &Expression, mut f: F) {
    match expr {
        Expression::Binary(left, _, right) | Expression::Logical(left, _, right) => {
            f(left);
            f(right);
        }
        Expression::Unary(_, operand) | Expression::Grouping(operand) => f(operand),
        Expression::Assign(_, value) => f(value),
        Expression::Call(callee, args) => {
            f(callee);
            for arg in args {
                f(arg);
            }
        }
        Expression::Get(object, _) => f(object),
        Expression::Set(object, _, value) => {
            f(object);
            f(value);
        }
        Expression::Index(object, key) => {
            f(object);
            f(key);
        }
        Expression::IndexSet(object, key, value) => {
            f(object);
            f(key);
            f(value);
        }
        Expression::Slice { object, start, end } => {
            f(object);
            if let Some(start) = start {
                f(start);
            }
            if let Some(end) = end {
                f(end);
            }
        }
        Expression::List(elements) => {
            for element in elements {
                f(element);
            }
        }
        Expression::Dict(pairs) => {
            for (key, value) in pairs {
                f(key);
                f(value);
            }
        }
        Expression::Literal(_)
        | Expression::Variable(_)
        | Expression::Lambda(_)
        | Expression::Match(..)
        | Expression::This => {}
    }
}

/// Rebuilds an expression with `f` applied to each direct subexpression.
fn rebuild<F: FnMut(&Expression) -> Expression>(expr: &Expression, mut f: F) -> Expression {
    match expr {
        Expression::Binary(left, op, right) => {
            Expression::Binary(Box::new(f(left)), *op, Box::new(f(right)))
        }
        Expression::Logical(left, op, right) => {
            Expression::Logical(Box::new(f(left)), *op, Box::new(f(right)))
        }
        Expression::Unary(op, operand) => Expression::Unary(*op, Box::new(f(operand))),
        Expression::Grouping(inner) => Expression::Grouping(Box::new(f(inner))),
        Expression::Assign(name, value) => {
            Expression::Assign(name.clone(), Box::new(f(value)))
        }
        Expression::Call(callee, args) => {
            Expression::Call(Box::new(f(callee)), args.iter().map(|a| f(a)).collect())
        }
        Expression::Get(object, name) => {
            Expression::Get(Box::new(f(object)), name.clone())
        }
        Expression::Set(object, name, value) => {
            Expression::Set(Box::new(f(object)), name.clone(), Box::new(f(value)))
        }
        Expression::Index(object, key) => {
            Expression::Index(Box::new(f(object)), Box::new(f(key)))
        }
        Expression::IndexSet(object, key, value) => Expression::IndexSet(
            Box::new(f(object)),
            Box::new(f(key)),
            Box::new(f(value)),
        ),
        Expression::Slice { object, start, end } => Expression::Slice {
            object: Box::new(f(object)),
            start: start.as_ref().map(|s| Box::new(f(s))),
            end: end.as_ref().map(|e| Box::new(f(e))),
        },
        Expression::List(elements) => {
            Expression::List(elements.iter().map(|e| f(e)).collect())
        }
        Expression::Dict(pairs) => {
            Expression::Dict(pairs.iter().map(|(k, v)| (f(k), f(v))).collect())
        }
        Expression::Literal(_)
        | Expression::Variable(_)
        | Expression::Lambda(_)
        | Expression::Match(..)
        | Expression::This => expr.clone(),
    }
}
