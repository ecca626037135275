use std::sync::mpsc::Receiver;

use crate::compiler::ast::*;
use crate::compiler::lexer::TokenResult;
use crate::compiler::symbols::{SymbolTable, VarKind};
use crate::compiler::token::{Keyword, Sym, Token};
use crate::diagnostic::Diagnostic;
use crate::span::{Span, Spanned};

const MAX_NESTING_DEPTH: u32 = 256;

/// Recursive-descent parser over the Jack grammar. Tokens arrive through
/// the scanner's bounded queue; the parser suspends when the queue is
/// empty. The first mismatch aborts the parse.
pub struct Parser {
    tokens: Receiver<TokenResult>,
    current: Spanned<Token>,
    class_symbols: SymbolTable,
    sub_symbols: SymbolTable,
    depth: u32,
}

impl Parser {
    pub fn new(tokens: Receiver<TokenResult>) -> Result<Self, Diagnostic> {
        let current = recv_token(&tokens)?;
        Ok(Self {
            tokens,
            current,
            class_symbols: SymbolTable::new(),
            sub_symbols: SymbolTable::new(),
            depth: 0,
        })
    }

    pub fn parse_class(mut self) -> Result<ClassTree, Diagnostic> {
        self.expect_keyword(Keyword::Class)?;
        let name = self.expect_ident()?;
        self.expect_sym(Sym::LBrace)?;
        let var_decs = self.parse_class_var_decs()?;
        let subroutines = self.parse_subroutines()?;
        self.expect_sym(Sym::RBrace)?;
        if self.current.node != Token::Eof {
            return Err(self.error(&format!(
                "expected end of file after class body, found {}",
                self.current.node.description()
            )));
        }
        Ok(ClassTree {
            name,
            var_decs,
            subroutines,
            symbols: self.class_symbols,
        })
    }

    fn parse_class_var_decs(&mut self) -> Result<Vec<ClassVarDec>, Diagnostic> {
        let mut decs = Vec::new();
        loop {
            let storage = if self.at_keyword(Keyword::Static) {
                VarStorage::Static
            } else if self.at_keyword(Keyword::Field) {
                VarStorage::Field
            } else {
                return Ok(decs);
            };
            self.advance()?;
            let ty = self.parse_type()?;
            let kind = match storage {
                VarStorage::Static => VarKind::Static,
                VarStorage::Field => VarKind::Field,
            };
            let mut names = Vec::new();
            loop {
                let name = self.expect_ident()?;
                define_or_err(&mut self.class_symbols, &name, &ty, kind)?;
                names.push(name);
                if !self.eat_sym(Sym::Comma)? {
                    break;
                }
            }
            self.expect_sym(Sym::Semicolon)?;
            decs.push(ClassVarDec { storage, ty, names });
        }
    }

    fn parse_subroutines(&mut self) -> Result<Vec<SubroutineDec>, Diagnostic> {
        let mut decs = Vec::new();
        loop {
            let kind = if self.at_keyword(Keyword::Constructor) {
                SubroutineKind::Constructor
            } else if self.at_keyword(Keyword::Function) {
                SubroutineKind::Function
            } else if self.at_keyword(Keyword::Method) {
                SubroutineKind::Method
            } else {
                return Ok(decs);
            };
            self.advance()?;

            let return_type = if self.at_keyword(Keyword::Void) {
                self.advance()?;
                ReturnType::Void
            } else {
                ReturnType::Of(self.parse_type()?)
            };
            let name = self.expect_ident()?;

            self.sub_symbols = SymbolTable::new();
            self.expect_sym(Sym::LParen)?;
            let params = self.parse_param_list()?;
            self.expect_sym(Sym::RParen)?;
            let body = self.parse_subroutine_body()?;

            decs.push(SubroutineDec {
                kind,
                return_type,
                name,
                params,
                body,
                symbols: std::mem::take(&mut self.sub_symbols),
            });
        }
    }

    fn parse_param_list(&mut self) -> Result<Vec<Param>, Diagnostic> {
        let mut params = Vec::new();
        if !self.at_type() {
            return Ok(params);
        }
        loop {
            let ty = self.parse_type()?;
            let name = self.expect_ident()?;
            define_or_err(&mut self.sub_symbols, &name, &ty, VarKind::Argument)?;
            params.push(Param { ty, name });
            if !self.eat_sym(Sym::Comma)? {
                return Ok(params);
            }
        }
    }

    fn parse_subroutine_body(&mut self) -> Result<SubroutineBody, Diagnostic> {
        self.expect_sym(Sym::LBrace)?;
        let mut var_decs = Vec::new();
        while self.at_keyword(Keyword::Var) {
            self.advance()?;
            let ty = self.parse_type()?;
            let mut names = Vec::new();
            loop {
                let name = self.expect_ident()?;
                define_or_err(&mut self.sub_symbols, &name, &ty, VarKind::Var)?;
                names.push(name);
                if !self.eat_sym(Sym::Comma)? {
                    break;
                }
            }
            self.expect_sym(Sym::Semicolon)?;
            var_decs.push(VarDec { ty, names });
        }
        let statements = self.parse_statements()?;
        self.expect_sym(Sym::RBrace)?;
        Ok(SubroutineBody {
            var_decs,
            statements,
        })
    }

    fn parse_statements(&mut self) -> Result<Vec<Statement>, Diagnostic> {
        let mut statements = Vec::new();
        loop {
            let stmt = if self.at_keyword(Keyword::Let) {
                self.parse_let()?
            } else if self.at_keyword(Keyword::If) {
                self.parse_if()?
            } else if self.at_keyword(Keyword::While) {
                self.parse_while()?
            } else if self.at_keyword(Keyword::Do) {
                self.parse_do()?
            } else if self.at_keyword(Keyword::Return) {
                self.parse_return()?
            } else {
                return Ok(statements);
            };
            statements.push(stmt);
        }
    }

    fn parse_let(&mut self) -> Result<Statement, Diagnostic> {
        self.advance()?; // let
        let target = self.expect_ident()?;
        let index = if self.eat_sym(Sym::LBracket)? {
            let index = self.parse_expression()?;
            self.expect_sym(Sym::RBracket)?;
            Some(index)
        } else {
            None
        };
        self.expect_sym(Sym::Eq)?;
        let value = self.parse_expression()?;
        self.expect_sym(Sym::Semicolon)?;
        Ok(Statement::Let {
            target,
            index,
            value,
        })
    }

    fn parse_if(&mut self) -> Result<Statement, Diagnostic> {
        self.enter_nesting()?;
        self.advance()?; // if
        self.expect_sym(Sym::LParen)?;
        let cond = self.parse_expression()?;
        self.expect_sym(Sym::RParen)?;
        let then_body = self.parse_block()?;
        let else_body = if self.at_keyword(Keyword::Else) {
            self.advance()?;
            Some(self.parse_block()?)
        } else {
            None
        };
        self.exit_nesting();
        Ok(Statement::If {
            cond,
            then_body,
            else_body,
        })
    }

    fn parse_while(&mut self) -> Result<Statement, Diagnostic> {
        self.enter_nesting()?;
        self.advance()?; // while
        self.expect_sym(Sym::LParen)?;
        let cond = self.parse_expression()?;
        self.expect_sym(Sym::RParen)?;
        let body = self.parse_block()?;
        self.exit_nesting();
        Ok(Statement::While { cond, body })
    }

    fn parse_do(&mut self) -> Result<Statement, Diagnostic> {
        self.advance()?; // do
        let initial = self.expect_ident()?;
        let call = self.parse_subroutine_call(initial)?;
        self.expect_sym(Sym::Semicolon)?;
        Ok(Statement::Do(call))
    }

    fn parse_return(&mut self) -> Result<Statement, Diagnostic> {
        self.advance()?; // return
        if self.eat_sym(Sym::Semicolon)? {
            return Ok(Statement::Return(None));
        }
        let value = self.parse_expression()?;
        self.expect_sym(Sym::Semicolon)?;
        Ok(Statement::Return(Some(value)))
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>, Diagnostic> {
        self.expect_sym(Sym::LBrace)?;
        let statements = self.parse_statements()?;
        self.expect_sym(Sym::RBrace)?;
        Ok(statements)
    }

    fn parse_expression(&mut self) -> Result<Expression, Diagnostic> {
        self.enter_nesting()?;
        let first = self.parse_term()?;
        let mut rest = Vec::new();
        while let Some(op) = self.current_binary_op() {
            self.advance()?;
            rest.push((op, self.parse_term()?));
        }
        self.exit_nesting();
        Ok(Expression { first, rest })
    }

    fn current_binary_op(&self) -> Option<BinaryOp> {
        let sym = match &self.current.node {
            Token::Sym(sym) => *sym,
            _ => return None,
        };
        match sym {
            Sym::Plus => Some(BinaryOp::Add),
            Sym::Minus => Some(BinaryOp::Sub),
            Sym::Star => Some(BinaryOp::Mul),
            Sym::Slash => Some(BinaryOp::Div),
            Sym::Amp => Some(BinaryOp::And),
            Sym::Pipe => Some(BinaryOp::Or),
            Sym::Lt => Some(BinaryOp::Lt),
            Sym::Gt => Some(BinaryOp::Gt),
            Sym::Eq => Some(BinaryOp::Eq),
            _ => None,
        }
    }

    fn parse_term(&mut self) -> Result<Term, Diagnostic> {
        match self.current.node.clone() {
            Token::Int(n) => {
                self.advance()?;
                Ok(Term::Int(n))
            }
            Token::Str(s) => {
                self.advance()?;
                Ok(Term::Str(s))
            }
            Token::Keyword(Keyword::True) => {
                self.advance()?;
                Ok(Term::True)
            }
            Token::Keyword(Keyword::False) => {
                self.advance()?;
                Ok(Term::False)
            }
            Token::Keyword(Keyword::Null) => {
                self.advance()?;
                Ok(Term::Null)
            }
            Token::Keyword(Keyword::This) => {
                self.advance()?;
                Ok(Term::This)
            }
            Token::Sym(Sym::Minus) => {
                self.advance()?;
                Ok(Term::Unary(UnaryOp::Neg, Box::new(self.parse_term()?)))
            }
            Token::Sym(Sym::Tilde) => {
                self.advance()?;
                Ok(Term::Unary(UnaryOp::Not, Box::new(self.parse_term()?)))
            }
            Token::Sym(Sym::LParen) => {
                self.advance()?;
                let inner = self.parse_expression()?;
                self.expect_sym(Sym::RParen)?;
                Ok(Term::Paren(Box::new(inner)))
            }
            Token::Ident(name) => {
                let initial = Spanned::new(name, self.current.span);
                self.advance()?;
                if self.eat_sym(Sym::LBracket)? {
                    let index = self.parse_expression()?;
                    self.expect_sym(Sym::RBracket)?;
                    Ok(Term::ArrayAccess {
                        name: initial,
                        index: Box::new(index),
                    })
                } else if self.at_sym(Sym::LParen) || self.at_sym(Sym::Dot) {
                    Ok(Term::Call(self.parse_subroutine_call(initial)?))
                } else {
                    Ok(Term::Var(initial))
                }
            }
            _ => Err(self
                .error(&format!(
                    "expected expression term, found {}",
                    self.current.node.description()
                ))
                .with_help(
                    "a term is a constant, a variable, an array element, a subroutine call, \
                     a parenthesized expression, or a unary operator applied to a term"
                        .to_string(),
                )),
        }
    }

    /// The identifier before `(` or `.` has already been consumed.
    fn parse_subroutine_call(
        &mut self,
        initial: Spanned<String>,
    ) -> Result<SubroutineCall, Diagnostic> {
        if self.eat_sym(Sym::LParen)? {
            let args = self.parse_argument_list()?;
            self.expect_sym(Sym::RParen)?;
            return Ok(SubroutineCall::Bare {
                name: initial,
                args,
            });
        }
        if self.eat_sym(Sym::Dot)? {
            let method = self.expect_ident()?;
            self.expect_sym(Sym::LParen)?;
            let args = self.parse_argument_list()?;
            self.expect_sym(Sym::RParen)?;
            return Ok(SubroutineCall::Qualified {
                receiver: initial,
                method,
                args,
            });
        }
        Err(self.error(&format!(
            "expected '(' or '.' in subroutine call, found {}",
            self.current.node.description()
        )))
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Expression>, Diagnostic> {
        let mut args = Vec::new();
        if self.at_sym(Sym::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if !self.eat_sym(Sym::Comma)? {
                return Ok(args);
            }
        }
    }

    fn parse_type(&mut self) -> Result<Type, Diagnostic> {
        let ty = match &self.current.node {
            Token::Keyword(Keyword::Int) => Type::Int,
            Token::Keyword(Keyword::Char) => Type::Char,
            Token::Keyword(Keyword::Boolean) => Type::Boolean,
            Token::Ident(name) => Type::Class(name.clone()),
            other => {
                return Err(self
                    .error(&format!("expected type, found {}", other.description()))
                    .with_help("a type is int, char, boolean, or a class name".to_string()));
            }
        };
        self.advance()?;
        Ok(ty)
    }

    fn at_type(&self) -> bool {
        matches!(
            self.current.node,
            Token::Keyword(Keyword::Int)
                | Token::Keyword(Keyword::Char)
                | Token::Keyword(Keyword::Boolean)
                | Token::Ident(_)
        )
    }

    // --- Utility methods ---

    fn enter_nesting(&mut self) -> Result<(), Diagnostic> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self
                .error("nesting depth exceeded (maximum 256 levels)")
                .with_help("split deeply nested code into separate subroutines".to_string()));
        }
        Ok(())
    }

    fn exit_nesting(&mut self) {
        self.depth -= 1;
    }

    fn advance(&mut self) -> Result<(), Diagnostic> {
        if self.current.node == Token::Eof {
            return Ok(());
        }
        self.current = recv_token(&self.tokens)?;
        Ok(())
    }

    fn at_keyword(&self, kw: Keyword) -> bool {
        self.current.node == Token::Keyword(kw)
    }

    fn at_sym(&self, sym: Sym) -> bool {
        self.current.node == Token::Sym(sym)
    }

    fn eat_sym(&mut self, sym: Sym) -> Result<bool, Diagnostic> {
        if self.at_sym(sym) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_sym(&mut self, sym: Sym) -> Result<Span, Diagnostic> {
        if self.at_sym(sym) {
            let span = self.current.span;
            self.advance()?;
            Ok(span)
        } else {
            Err(self.error(&format!(
                "expected '{}', found {}",
                sym.as_char(),
                self.current.node.description()
            )))
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<Span, Diagnostic> {
        if self.at_keyword(kw) {
            let span = self.current.span;
            self.advance()?;
            Ok(span)
        } else {
            Err(self.error(&format!(
                "expected '{}', found {}",
                kw.as_str(),
                self.current.node.description()
            )))
        }
    }

    fn expect_ident(&mut self) -> Result<Spanned<String>, Diagnostic> {
        if let Token::Ident(name) = self.current.node.clone() {
            let span = self.current.span;
            self.advance()?;
            Ok(Spanned::new(name, span))
        } else {
            Err(self.error(&format!(
                "expected identifier, found {}",
                self.current.node.description()
            )))
        }
    }

    fn error(&self, msg: &str) -> Diagnostic {
        Diagnostic::error(msg.to_string(), self.current.span)
    }
}

fn recv_token(rx: &Receiver<TokenResult>) -> Result<Spanned<Token>, Diagnostic> {
    match rx.recv() {
        Ok(result) => result,
        // The scanner closes the queue after Eof; reaching this means it
        // died without one.
        Err(_) => Err(Diagnostic::error(
            "token stream ended unexpectedly".to_string(),
            Span::dummy(),
        )),
    }
}

fn define_or_err(
    table: &mut SymbolTable,
    name: &Spanned<String>,
    ty: &Type,
    kind: VarKind,
) -> Result<(), Diagnostic> {
    if table.define(&name.node, &ty.to_string(), kind).is_none() {
        return Err(Diagnostic::error(
            format!("variable '{}' is already defined in this scope", name.node),
            name.span,
        ));
    }
    Ok(())
}
