//! The VM translator: stack-machine commands → Hack assembly.

pub mod codewriter;
pub mod command;
pub mod parser;

use crate::diagnostic::Diagnostic;

/// Translate a set of VM modules into one assembly program. `boot`
/// prepends the bootstrap sequence (SP=256, `call Sys.init 0`) and is
/// set for whole-program (directory) input. Module order is the caller's;
/// the `file_id` in any error is the failing module's position.
pub fn translate_sources(sources: &[(&str, &str)], boot: bool) -> Result<String, Diagnostic> {
    let mut writer = codewriter::AsmWriter::new();
    if boot {
        writer.write_boot();
    }
    for (file_id, (module, text)) in sources.iter().enumerate() {
        for cmd in parser::parse_source(text, module, file_id as u16)? {
            writer.write_command(&cmd);
        }
    }
    let mut out = writer.finish().join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_comes_first_for_directory_input() {
        let asm = translate_sources(&[("Main", "function Main.main 0\nreturn\n")], true).unwrap();
        assert!(
            asm.starts_with("@256\nD=A\n@SP\nM=D\n"),
            "SP init leads the program"
        );
        assert!(asm.contains("@Sys.init"));
    }

    #[test]
    fn test_single_file_input_has_no_boot() {
        let asm = translate_sources(&[("Main", "push constant 1\n")], false).unwrap();
        assert!(asm.starts_with("// push constant 1\n"));
        assert!(!asm.contains("@Sys.init"));
    }

    #[test]
    fn test_static_labels_stay_per_module() {
        let asm = translate_sources(
            &[("A", "push static 0\n"), ("B", "push static 0\n")],
            false,
        )
        .unwrap();
        assert!(asm.contains("@A.0"), "module A gets its own static cell");
        assert!(asm.contains("@B.0"), "module B gets its own static cell");
    }

    #[test]
    fn test_error_carries_failing_module_id() {
        let err = translate_sources(
            &[("Good", "add\n"), ("Bad", "pop constant 1\n")],
            false,
        )
        .unwrap_err();
        assert_eq!(err.span.file_id, 1);
    }
}
