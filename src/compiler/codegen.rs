//! VM code emission for a parsed class tree.

use std::collections::HashMap;

use crate::compiler::ast::*;
use crate::compiler::symbols::{Symbol, VarKind};
use crate::diagnostic::Diagnostic;
use crate::span::Span;

/// Produces unique labels with an independent counter per prefix:
/// `next("IF")` yields `IF0`, `IF1`, … regardless of other prefixes.
#[derive(Default)]
pub struct LabelGenerator {
    counters: HashMap<String, u32>,
}

impl LabelGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let label = format!("{}{}", prefix, counter);
        *counter += 1;
        label
    }
}

/// Walks a `ClassTree` and appends VM commands to an owned buffer.
/// One emitter per compilation unit; the label generator lives for the
/// whole class so labels never repeat within it.
pub struct VmEmitter<'a> {
    class: &'a ClassTree,
    out: Vec<String>,
    labels: LabelGenerator,
    current: Option<&'a SubroutineDec>,
}

impl<'a> VmEmitter<'a> {
    pub fn new(class: &'a ClassTree) -> Self {
        Self {
            class,
            out: Vec::new(),
            labels: LabelGenerator::new(),
            current: None,
        }
    }

    pub fn emit(mut self) -> Result<Vec<String>, Diagnostic> {
        for sub in &self.class.subroutines {
            self.emit_subroutine(sub)?;
        }
        Ok(self.out)
    }

    fn emit_subroutine(&mut self, sub: &'a SubroutineDec) -> Result<(), Diagnostic> {
        self.current = Some(sub);
        let name = format!("{}.{}", self.class.name.node, sub.name.node);
        let locals = sub.symbols.var_count(VarKind::Var);
        self.push_line(format!("function {} {}", name, locals));

        match sub.kind {
            SubroutineKind::Function => {}
            // Install `this` from the hidden receiver argument.
            SubroutineKind::Method => {
                self.push_line("push argument 0");
                self.push_line("pop pointer 0");
            }
            // Allocate the object and point `this` at it.
            SubroutineKind::Constructor => {
                let fields = self.class.symbols.var_count(VarKind::Field);
                self.push_line(format!("push constant {}", fields));
                self.push_line("call Memory.alloc 1");
                self.push_line("pop pointer 0");
            }
        }

        self.emit_statements(&sub.body.statements)
    }

    fn emit_statements(&mut self, statements: &[Statement]) -> Result<(), Diagnostic> {
        for stmt in statements {
            self.emit_statement(stmt)?;
        }
        Ok(())
    }

    fn emit_statement(&mut self, stmt: &Statement) -> Result<(), Diagnostic> {
        match stmt {
            Statement::Let {
                target,
                index,
                value,
            } => self.emit_let(target, index.as_ref(), value),
            Statement::If {
                cond,
                then_body,
                else_body,
            } => self.emit_if(cond, then_body, else_body.as_deref()),
            Statement::While { cond, body } => self.emit_while(cond, body),
            Statement::Do(call) => {
                self.emit_call(call)?;
                // The callee's return value is ignored.
                self.push_line("pop temp 0");
                Ok(())
            }
            Statement::Return(value) => self.emit_return(value.as_ref()),
        }
    }

    fn emit_let(
        &mut self,
        target: &crate::span::Spanned<String>,
        index: Option<&Expression>,
        value: &Expression,
    ) -> Result<(), Diagnostic> {
        match index {
            None => {
                self.emit_expression(value)?;
                let access = self.access(&target.node, target.span)?;
                self.push_line(format!("pop {}", access));
            }
            // The value is evaluated before the target address so the
            // address computation cannot clobber an in-flight pointer 1
            // from the right-hand side.
            Some(index) => {
                self.emit_expression(value)?;
                let access = self.access(&target.node, target.span)?;
                self.push_line(format!("push {}", access));
                self.emit_expression(index)?;
                self.push_line("add");
                self.push_line("pop pointer 1");
                self.push_line("pop that 0");
            }
        }
        Ok(())
    }

    fn emit_if(
        &mut self,
        cond: &Expression,
        then_body: &[Statement],
        else_body: Option<&[Statement]>,
    ) -> Result<(), Diagnostic> {
        let skip_then = self.labels.next("IF");
        self.emit_expression(cond)?;
        self.push_line("not");
        self.push_line(format!("if-goto {}", skip_then));
        self.emit_statements(then_body)?;
        match else_body {
            Some(else_body) => {
                let skip_else = self.labels.next("IF");
                self.push_line(format!("goto {}", skip_else));
                self.push_line(format!("label {}", skip_then));
                self.emit_statements(else_body)?;
                self.push_line(format!("label {}", skip_else));
            }
            None => self.push_line(format!("label {}", skip_then)),
        }
        Ok(())
    }

    fn emit_while(&mut self, cond: &Expression, body: &[Statement]) -> Result<(), Diagnostic> {
        let top = self.labels.next("WHILE");
        let exit = self.labels.next("WHILE");
        self.push_line(format!("label {}", top));
        self.emit_expression(cond)?;
        self.push_line("not");
        self.push_line(format!("if-goto {}", exit));
        self.emit_statements(body)?;
        self.push_line(format!("goto {}", top));
        self.push_line(format!("label {}", exit));
        Ok(())
    }

    fn emit_return(&mut self, value: Option<&Expression>) -> Result<(), Diagnostic> {
        let Some(sub) = self.current else {
            return Ok(());
        };
        if sub.return_type == ReturnType::Void {
            self.push_line("push constant 0");
        } else if sub.kind == SubroutineKind::Constructor {
            // A constructor always hands back the allocated object.
            self.push_line("push pointer 0");
        } else {
            match value {
                Some(expr) => self.emit_expression(expr)?,
                // Default return value in a non-void subroutine.
                None => self.push_line("push constant 0"),
            }
        }
        self.push_line("return");
        Ok(())
    }

    /// Post-order: operands first, operator last.
    fn emit_expression(&mut self, expr: &Expression) -> Result<(), Diagnostic> {
        self.emit_term(&expr.first)?;
        for (op, term) in &expr.rest {
            self.emit_term(term)?;
            self.push_line(binary_vm_op(*op));
        }
        Ok(())
    }

    fn emit_term(&mut self, term: &Term) -> Result<(), Diagnostic> {
        match term {
            Term::Int(n) => self.push_line(format!("push constant {}", n)),
            Term::Str(s) => self.emit_string(s),
            Term::True => {
                self.push_line("push constant 1");
                self.push_line("neg");
            }
            Term::False | Term::Null => self.push_line("push constant 0"),
            Term::This => self.push_line("push pointer 0"),
            Term::Var(name) => {
                let access = self.access(&name.node, name.span)?;
                self.push_line(format!("push {}", access));
            }
            Term::ArrayAccess { name, index } => {
                let access = self.access(&name.node, name.span)?;
                self.push_line(format!("push {}", access));
                self.emit_expression(index)?;
                self.push_line("add");
                self.push_line("pop pointer 1");
                self.push_line("push that 0");
            }
            Term::Paren(inner) => self.emit_expression(inner)?,
            Term::Unary(op, inner) => {
                self.emit_term(inner)?;
                self.push_line(match op {
                    UnaryOp::Neg => "neg",
                    UnaryOp::Not => "not",
                });
            }
            Term::Call(call) => self.emit_call(call)?,
        }
        Ok(())
    }

    /// Build the string object byte by byte at run time.
    fn emit_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        self.push_line(format!("push constant {}", bytes.len()));
        self.push_line("call String.new 1");
        for b in bytes {
            self.push_line(format!("push constant {}", b));
            self.push_line("call String.appendChar 2");
        }
    }

    fn emit_call(&mut self, call: &SubroutineCall) -> Result<(), Diagnostic> {
        match call {
            // A bare call is a method call on the current instance. (This
            // mis-handles a bare call to a function of the same class;
            // qualify such calls with the class name.)
            SubroutineCall::Bare { name, args } => {
                self.push_line("push pointer 0");
                for arg in args {
                    self.emit_expression(arg)?;
                }
                self.push_line(format!(
                    "call {}.{} {}",
                    self.class.name.node,
                    name.node,
                    args.len() + 1
                ));
            }
            SubroutineCall::Qualified {
                receiver,
                method,
                args,
            } => match self.resolve(&receiver.node) {
                // The receiver is a variable: a genuine method call on its
                // object, dispatched by the variable's declared class.
                Some((symbol, index)) => {
                    self.push_line(format!("push {} {}", symbol.kind.segment(), index));
                    for arg in args {
                        self.emit_expression(arg)?;
                    }
                    self.push_line(format!(
                        "call {}.{} {}",
                        symbol.ty,
                        method.node,
                        args.len() + 1
                    ));
                }
                // Unresolved receiver: a function call on another class.
                None => {
                    for arg in args {
                        self.emit_expression(arg)?;
                    }
                    self.push_line(format!(
                        "call {}.{} {}",
                        receiver.node,
                        method.node,
                        args.len()
                    ));
                }
            },
        }
        Ok(())
    }

    /// Subroutine scope first, then class scope. The effective index of a
    /// method argument is shifted by one: argument 0 is the receiver.
    fn resolve(&self, name: &str) -> Option<(&'a Symbol, u16)> {
        let sub = self.current?;
        let symbol = sub.symbols.lookup(name).or_else(|| self.class.symbols.lookup(name))?;
        let mut index = symbol.index;
        if symbol.kind == VarKind::Argument && sub.kind == SubroutineKind::Method {
            index += 1;
        }
        Some((symbol, index))
    }

    fn access(&self, name: &str, span: Span) -> Result<String, Diagnostic> {
        match self.resolve(name) {
            Some((symbol, index)) => Ok(format!("{} {}", symbol.kind.segment(), index)),
            None => Err(Diagnostic::error(
                format!("undefined variable '{}'", name),
                span,
            )
            .with_help("declare it with 'var', 'field', 'static', or as a parameter".to_string())),
        }
    }

    fn push_line(&mut self, line: impl Into<String>) {
        self.out.push(line.into());
    }
}

fn binary_vm_op(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        BinaryOp::Lt => "lt",
        BinaryOp::Gt => "gt",
        BinaryOp::Eq => "eq",
        BinaryOp::Mul => "call Math.multiply 2",
        BinaryOp::Div => "call Math.divide 2",
    }
}
