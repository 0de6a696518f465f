use super::statement::{Parameter, Statement};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

impl Literal {
    /// Truthiness shared by every pass that evaluates a literal condition:
    /// null, false, 0.0, and "" are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Literal::Null => false,
            Literal::Boolean(value) => *value,
            Literal::Number(value) => *value != 0.0,
            Literal::String(value) => !value.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Variable(String),
    Assign(String, Box<Expression>),
    Binary(Box<Expression>, BinaryOp, Box<Expression>),
    Logical(Box<Expression>, LogicalOp, Box<Expression>),
    Unary(UnaryOp, Box<Expression>),
    Grouping(Box<Expression>),
    Call(Box<Expression>, Vec<Expression>),
    Get(Box<Expression>, String),
    Set(Box<Expression>, String, Box<Expression>),
    Index(Box<Expression>, Box<Expression>),
    IndexSet(Box<Expression>, Box<Expression>, Box<Expression>),
    Slice {
        object: Box<Expression>,
        start: Option<Box<Expression>>,
        end: Option<Box<Expression>>,
    },
    List(Vec<Expression>),
    Dict(Vec<(Expression, Expression)>),
    Lambda(Lambda),
    Match(Box<Expression>, Vec<MatchCase>),
    This,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<Parameter>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    pub pattern: Expression,
    pub guard: Option<Expression>,
    pub value: Expression,
}

impl Expression {
    pub fn number(value: f64) -> Self {
        Expression::Literal(Literal::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::Literal(Literal::String(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        Expression::Literal(Literal::Boolean(value))
    }

    pub fn null() -> Self {
        Expression::Literal(Literal::Null)
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    pub fn assign(name: impl Into<String>, value: Expression) -> Self {
        Expression::Assign(name.into(), Box::new(value))
    }

    pub fn binary(left: Expression, op: BinaryOp, right: Expression) -> Self {
        Expression::Binary(Box::new(left), op, Box::new(right))
    }

    pub fn logical(left: Expression, op: LogicalOp, right: Expression) -> Self {
        Expression::Logical(Box::new(left), op, Box::new(right))
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Expression::Unary(op, Box::new(operand))
    }

    pub fn grouping(inner: Expression) -> Self {
        Expression::Grouping(Box::new(inner))
    }

    pub fn call(callee: Expression, arguments: Vec<Expression>) -> Self {
        Expression::Call(Box::new(callee), arguments)
    }

    pub fn get(object: Expression, name: impl Into<String>) -> Self {
        Expression::Get(Box::new(object), name.into())
    }

    pub fn index(object: Expression, key: Expression) -> Self {
        Expression::Index(Box::new(object), Box::new(key))
    }

    /// Returns the literal payload when this expression is a bare literal.
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Expression::Literal(literal) => Some(literal),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_of_literals() {
        assert!(!Literal::Null.is_truthy());
        assert!(!Literal::Boolean(false).is_truthy());
        assert!(Literal::Boolean(true).is_truthy());
        assert!(!Literal::Number(0.0).is_truthy());
        assert!(Literal::Number(-1.5).is_truthy());
        assert!(!Literal::String(String::new()).is_truthy());
        assert!(Literal::String("false".to_string()).is_truthy());
    }

    #[test]
    fn negative_zero_is_falsy() {
        assert!(!Literal::Number(-0.0).is_truthy());
    }
}
