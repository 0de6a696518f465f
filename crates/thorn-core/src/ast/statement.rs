use super::expression::Expression;
use super::types::TypeExpr;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Block(Vec<Statement>),
    Expression(Expression),
    Var(VarDecl),
    Return(Option<Expression>),
    Throw(Expression),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Function(FunctionDecl),
    Class(ClassDecl),
    Import(ImportDecl),
    Export(Box<Statement>),
    ExportIdentifier(String),
    TypeAlias { name: String, aliased: TypeExpr },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub type_annotation: Option<TypeExpr>,
    pub initializer: Option<Expression>,
    pub immutable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expression,
    pub then_branch: Box<Statement>,
    pub else_branch: Option<Box<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expression,
    pub body: Box<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub variable: String,
    pub iterable: Expression,
    pub body: Box<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeExpr>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub type_annotation: Option<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub methods: Vec<FunctionDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub module: String,
    pub names: Vec<String>,
}

impl Statement {
    pub fn var(name: impl Into<String>, initializer: Expression) -> Self {
        Statement::Var(VarDecl {
            name: name.into(),
            type_annotation: None,
            initializer: Some(initializer),
            immutable: false,
        })
    }

    pub fn if_stmt(
        condition: Expression,
        then_branch: Statement,
        else_branch: Option<Statement>,
    ) -> Self {
        Statement::If(IfStmt {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn while_stmt(condition: Expression, body: Statement) -> Self {
        Statement::While(WhileStmt {
            condition,
            body: Box::new(body),
        })
    }

    pub fn function(
        name: impl Into<String>,
        params: Vec<&str>,
        body: Vec<Statement>,
    ) -> Self {
        Statement::Function(FunctionDecl {
            name: name.into(),
            params: params
                .into_iter()
                .map(|name| Parameter {
                    name: name.to_string(),
                    type_annotation: None,
                })
                .collect(),
            return_type: None,
            body,
        })
    }
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            type_annotation: None,
        }
    }
}
