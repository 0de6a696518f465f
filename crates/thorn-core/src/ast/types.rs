/// Type annotations as written in source. These only appear in declaration
/// positions (variables, parameters, return types, type aliases); no pass
/// evaluates them.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Named(String),
    Generic(String, Vec<TypeExpr>),
    Function(Vec<TypeExpr>, Box<TypeExpr>),
    Array(Box<TypeExpr>),
}
