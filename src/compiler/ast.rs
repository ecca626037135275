//! The Jack class tree. Built once per compilation unit, never mutated
//! after parsing, consumed linearly by the code generator.

use std::fmt;

use crate::compiler::symbols::SymbolTable;
use crate::span::Spanned;

#[derive(Clone, Debug)]
pub struct ClassTree {
    pub name: Spanned<String>,
    pub var_decs: Vec<ClassVarDec>,
    pub subroutines: Vec<SubroutineDec>,
    /// Class scope: `static` and `field` entries, populated during parse.
    pub symbols: SymbolTable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarStorage {
    Static,
    Field,
}

#[derive(Clone, Debug)]
pub struct ClassVarDec {
    pub storage: VarStorage,
    pub ty: Type,
    pub names: Vec<Spanned<String>>,
}

/// A declared type: the three primitive names or a class name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    Char,
    Boolean,
    Class(String),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Char => write!(f, "char"),
            Type::Boolean => write!(f, "boolean"),
            Type::Class(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReturnType {
    Void,
    Of(Type),
}

#[derive(Clone, Debug)]
pub struct SubroutineDec {
    pub kind: SubroutineKind,
    pub return_type: ReturnType,
    pub name: Spanned<String>,
    pub params: Vec<Param>,
    pub body: SubroutineBody,
    /// Subroutine scope: `argument` and `var` entries, populated during parse.
    pub symbols: SymbolTable,
}

#[derive(Clone, Debug)]
pub struct Param {
    pub ty: Type,
    pub name: Spanned<String>,
}

#[derive(Clone, Debug)]
pub struct VarDec {
    pub ty: Type,
    pub names: Vec<Spanned<String>>,
}

#[derive(Clone, Debug)]
pub struct SubroutineBody {
    pub var_decs: Vec<VarDec>,
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug)]
pub enum Statement {
    Let {
        target: Spanned<String>,
        /// `Some` for an indexed target `v[e]`.
        index: Option<Expression>,
        value: Expression,
    },
    If {
        cond: Expression,
        then_body: Vec<Statement>,
        else_body: Option<Vec<Statement>>,
    },
    While {
        cond: Expression,
        body: Vec<Statement>,
    },
    Do(SubroutineCall),
    Return(Option<Expression>),
}

/// A term followed by zero or more (operator, term) pairs, evaluated
/// strictly left to right.
#[derive(Clone, Debug)]
pub struct Expression {
    pub first: Term,
    pub rest: Vec<(BinaryOp, Term)>,
}

#[derive(Clone, Debug)]
pub enum Term {
    Int(u16),
    Str(String),
    True,
    False,
    Null,
    This,
    Var(Spanned<String>),
    ArrayAccess {
        name: Spanned<String>,
        index: Box<Expression>,
    },
    Paren(Box<Expression>),
    Unary(UnaryOp, Box<Term>),
    Call(SubroutineCall),
}

/// Only identifier receivers parse; whether a receiver is a variable or a
/// class name is decided at code generation time.
#[derive(Clone, Debug)]
pub enum SubroutineCall {
    Bare {
        name: Spanned<String>,
        args: Vec<Expression>,
    },
    Qualified {
        receiver: Spanned<String>,
        method: Spanned<String>,
        args: Vec<Expression>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Lt,
    Gt,
    Eq,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}
