pub mod expression;
pub mod statement;
pub mod types;

pub use expression::{
    BinaryOp, Expression, Lambda, Literal, LogicalOp, MatchCase, UnaryOp,
};
pub use statement::{
    ClassDecl, ForStmt, FunctionDecl, IfStmt, ImportDecl, Parameter, Statement, VarDecl,
    WhileStmt,
};
pub use types::TypeExpr;

/// Top-level program
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        Program { statements }
    }
}
