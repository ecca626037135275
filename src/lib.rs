//! Compilation toolchain for the Jack language on the Hack platform:
//! a Jack compiler (`.jack` → `.vm`), a VM translator (`.vm` → `.asm`),
//! and a Hack assembler (`.asm` → `.hack`). Each stage is a complete
//! pipeline of its own; output of one is input to the next.

pub mod compiler;
pub mod diagnostic;
pub mod hack;
pub mod source;
pub mod span;
pub mod vm;

pub use diagnostic::Diagnostic;
pub use source::{resolve_input, SourceFile};
