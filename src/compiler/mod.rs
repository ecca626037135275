//! The Jack compiler: `.jack` source → VM intermediate code.
//!
//! The scanner runs on its own thread and feeds the parser through a
//! bounded token queue; parsing builds the class tree and the symbol
//! tables, and the code generator walks the finished tree. Each stage
//! stops at its first error.

pub mod ast;
pub mod codegen;
pub mod lexer;
pub mod parser;
pub mod symbols;
pub mod token;

use crate::diagnostic::Diagnostic;

/// Compile one Jack compilation unit to VM code, one command per line.
pub fn compile_source(source: &str, file_id: u16) -> Result<String, Diagnostic> {
    let tokens = lexer::stream(source.to_string(), file_id);
    let class = parser::Parser::new(tokens)?.parse_class()?;
    let commands = codegen::VmEmitter::new(&class).emit()?;
    let mut out = commands.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}
