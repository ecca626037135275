//! Per-line classification and validation of VM commands.

use std::sync::LazyLock;

use regex::Regex;

use crate::diagnostic::Diagnostic;
use crate::span::Span;
use crate::vm::command::{ArithmeticOp, Segment, VmCommand, VmOp};

/// Labels and function names: a letter, dot, underscore, or colon,
/// then any of those plus digits.
static LABEL_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[._:a-zA-Z][._:a-zA-Z0-9]*$").unwrap());

/// Parse a whole `.vm` file. Comments (`//` to end of line) and blank
/// lines vanish; every surviving line must be a valid command.
pub fn parse_source(
    source: &str,
    module: &str,
    file_id: u16,
) -> Result<Vec<VmCommand>, Diagnostic> {
    let mut commands = Vec::new();
    let mut current_function = String::new();
    let mut offset = 0u32;

    for (line_idx, raw_line) in source.lines().enumerate() {
        let span = Span::new(file_id, offset, offset + raw_line.len() as u32);
        offset += raw_line.len() as u32 + 1;

        let line = match raw_line.find("//") {
            Some(idx) => &raw_line[..idx],
            None => raw_line,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let op = classify(line, span)?;
        if let VmOp::Function { name, .. } = &op {
            current_function = name.clone();
        }
        commands.push(VmCommand {
            op,
            function: current_function.clone(),
            module: module.to_string(),
            line: line_idx as u32 + 1,
            text: line.to_string(),
        });
    }
    Ok(commands)
}

fn classify(line: &str, span: Span) -> Result<VmOp, Diagnostic> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let command = words[0].to_lowercase();

    if let Some(op) = ArithmeticOp::from_str(&command) {
        expect_args(&words, 0, span)?;
        return Ok(VmOp::Arithmetic(op));
    }

    match command.as_str() {
        "return" => {
            expect_args(&words, 0, span)?;
            Ok(VmOp::Return)
        }
        "label" | "goto" | "if-goto" => {
            expect_args(&words, 1, span)?;
            let label = parse_label(words[1], span)?;
            Ok(match command.as_str() {
                "label" => VmOp::Label(label),
                "goto" => VmOp::Goto(label),
                _ => VmOp::IfGoto(label),
            })
        }
        "push" | "pop" => {
            expect_args(&words, 2, span)?;
            let segment = Segment::from_str(words[1]).ok_or_else(|| {
                Diagnostic::error(format!("'{}' is not a valid segment", words[1]), span)
                    .with_help(
                        "segments are argument, local, static, constant, this, that, \
                         pointer, and temp"
                            .to_string(),
                    )
            })?;
            let index = parse_index(&command, words[2], span)?;
            if command == "pop" {
                if segment == Segment::Constant {
                    return Err(Diagnostic::error(
                        "cannot pop into the read-only constant segment".to_string(),
                        span,
                    ));
                }
                validate_fixed_segment(segment, index, span)?;
                Ok(VmOp::Pop { segment, index })
            } else {
                validate_fixed_segment(segment, index, span)?;
                Ok(VmOp::Push { segment, index })
            }
        }
        "function" | "call" => {
            expect_args(&words, 2, span)?;
            if !LABEL_FORM.is_match(words[1]) {
                return Err(Diagnostic::error(
                    format!("invalid function name '{}'", words[1]),
                    span,
                ));
            }
            let name = words[1].to_string();
            let count = parse_index(&command, words[2], span)?;
            Ok(if command == "function" {
                VmOp::Function {
                    name,
                    locals: count,
                }
            } else {
                VmOp::Call { name, args: count }
            })
        }
        _ => Err(Diagnostic::error(
            format!("unrecognized command '{}'", words[0]),
            span,
        )),
    }
}

fn expect_args(words: &[&str], want: usize, span: Span) -> Result<(), Diagnostic> {
    let got = words.len() - 1;
    if got == want {
        return Ok(());
    }
    let argument_word = match want {
        0 => "no arguments".to_string(),
        1 => "one argument".to_string(),
        n => format!("{} arguments", n),
    };
    Err(Diagnostic::error(
        format!("'{}' takes {}, found {}", words[0], argument_word, got),
        span,
    ))
}

fn parse_label(word: &str, span: Span) -> Result<String, Diagnostic> {
    if LABEL_FORM.is_match(word) {
        Ok(word.to_string())
    } else {
        Err(Diagnostic::error(
            format!("invalid label '{}'", word),
            span,
        )
        .with_help(
            "labels start with a letter, '.', '_', or ':' and continue with those or digits"
                .to_string(),
        ))
    }
}

fn parse_index(command: &str, word: &str, span: Span) -> Result<u16, Diagnostic> {
    word.parse::<u16>().map_err(|_| {
        Diagnostic::error(
            format!(
                "second argument of '{}' must be a non-negative decimal number, found '{}'",
                command, word
            ),
            span,
        )
    })
}

/// `temp` and `pointer` address fixed cells; out-of-range indices would
/// silently alias unrelated RAM.
fn validate_fixed_segment(segment: Segment, index: u16, span: Span) -> Result<(), Diagnostic> {
    match segment {
        Segment::Pointer if index > 1 => Err(Diagnostic::error(
            format!("pointer index must be 0 or 1, found {}", index),
            span,
        )),
        Segment::Temp if index > 7 => Err(Diagnostic::error(
            format!("temp index must be between 0 and 7, found {}", index),
            span,
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<VmCommand> {
        parse_source(source, "Test", 0)
            .unwrap_or_else(|d| panic!("parse failed: {}", d.message))
    }

    fn parse_err(source: &str) -> Diagnostic {
        parse_source(source, "Test", 0)
            .err()
            .expect("source should fail to parse")
    }

    #[test]
    fn test_arithmetic_commands() {
        let cmds = parse("add\nsub\nneg\neq\ngt\nlt\nand\nor\nnot\n");
        assert_eq!(cmds.len(), 9);
        assert_eq!(cmds[0].op, VmOp::Arithmetic(ArithmeticOp::Add));
        assert_eq!(cmds[8].op, VmOp::Arithmetic(ArithmeticOp::Not));
    }

    #[test]
    fn test_push_pop() {
        let cmds = parse("push constant 7\npop local 2\npush static 0\n");
        assert_eq!(
            cmds[0].op,
            VmOp::Push {
                segment: Segment::Constant,
                index: 7
            }
        );
        assert_eq!(
            cmds[1].op,
            VmOp::Pop {
                segment: Segment::Local,
                index: 2
            }
        );
        assert_eq!(
            cmds[2].op,
            VmOp::Push {
                segment: Segment::Static,
                index: 0
            }
        );
    }

    #[test]
    fn test_branching_commands() {
        let cmds = parse("label LOOP_START\ngoto LOOP_START\nif-goto END\n");
        assert_eq!(cmds[0].op, VmOp::Label("LOOP_START".to_string()));
        assert_eq!(cmds[1].op, VmOp::Goto("LOOP_START".to_string()));
        assert_eq!(cmds[2].op, VmOp::IfGoto("END".to_string()));
    }

    #[test]
    fn test_function_call_return() {
        let cmds = parse("function Main.main 2\ncall Math.multiply 2\nreturn\n");
        assert_eq!(
            cmds[0].op,
            VmOp::Function {
                name: "Main.main".to_string(),
                locals: 2
            }
        );
        assert_eq!(
            cmds[1].op,
            VmOp::Call {
                name: "Math.multiply".to_string(),
                args: 2
            }
        );
        assert_eq!(cmds[2].op, VmOp::Return);
    }

    #[test]
    fn test_current_function_tracking() {
        let cmds = parse("push constant 1\nfunction Main.main 0\npush constant 2\nfunction Sys.init 0\nreturn\n");
        assert_eq!(cmds[0].function, "", "empty before the first function");
        assert_eq!(cmds[1].function, "Main.main");
        assert_eq!(cmds[2].function, "Main.main");
        assert_eq!(cmds[4].function, "Sys.init");
    }

    #[test]
    fn test_module_and_line_stamps() {
        let cmds = parse_source("\n// comment only\npush constant 1\n", "Square", 0).unwrap();
        assert_eq!(cmds[0].module, "Square");
        assert_eq!(cmds[0].line, 3);
        assert_eq!(cmds[0].text, "push constant 1");
    }

    #[test]
    fn test_comments_and_blank_lines_vanish() {
        let cmds = parse("// header\n\n   \nadd // trailing\n");
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].text, "add");
    }

    #[test]
    fn test_commands_are_case_insensitive() {
        let cmds = parse("Push constant 3\nADD\n");
        assert!(matches!(cmds[0].op, VmOp::Push { .. }));
        assert!(matches!(cmds[1].op, VmOp::Arithmetic(ArithmeticOp::Add)));
    }

    #[test]
    fn test_error_unknown_command() {
        let diag = parse_err("shove constant 1\n");
        assert!(
            diag.message.contains("unrecognized command 'shove'"),
            "got: {}",
            diag.message
        );
    }

    #[test]
    fn test_error_arithmetic_takes_no_arguments() {
        let diag = parse_err("add 1\n");
        assert!(
            diag.message.contains("'add' takes no arguments"),
            "got: {}",
            diag.message
        );
    }

    #[test]
    fn test_error_push_arity() {
        let diag = parse_err("push constant\n");
        assert!(
            diag.message.contains("'push' takes 2 arguments, found 1"),
            "got: {}",
            diag.message
        );
    }

    #[test]
    fn test_error_invalid_segment() {
        let diag = parse_err("push heap 0\n");
        assert!(
            diag.message.contains("'heap' is not a valid segment"),
            "got: {}",
            diag.message
        );
        assert!(diag.help.is_some());
    }

    #[test]
    fn test_error_pop_constant() {
        let diag = parse_err("pop constant 5\n");
        assert!(
            diag.message.contains("read-only constant segment"),
            "got: {}",
            diag.message
        );
    }

    #[test]
    fn test_error_non_numeric_index() {
        let diag = parse_err("push local x\n");
        assert!(
            diag.message.contains("non-negative decimal number"),
            "got: {}",
            diag.message
        );
    }

    #[test]
    fn test_error_negative_index() {
        let diag = parse_err("push local -1\n");
        assert!(diag.message.contains("non-negative decimal number"));
    }

    #[test]
    fn test_error_malformed_label() {
        let diag = parse_err("label 2START\n");
        assert!(
            diag.message.contains("invalid label '2START'"),
            "got: {}",
            diag.message
        );
    }

    #[test]
    fn test_label_alphabet_accepts_dots_and_colons() {
        let cmds = parse("label Main.main:if0\n");
        assert_eq!(cmds[0].op, VmOp::Label("Main.main:if0".to_string()));
    }

    #[test]
    fn test_error_pointer_index_range() {
        let diag = parse_err("push pointer 2\n");
        assert!(diag.message.contains("pointer index must be 0 or 1"));
    }

    #[test]
    fn test_error_temp_index_range() {
        let diag = parse_err("pop temp 8\n");
        assert!(diag.message.contains("temp index must be between 0 and 7"));
    }

    #[test]
    fn test_error_reports_first_bad_line() {
        let err = parse_source("add\npush local 0\nbogus\nadd\n", "Test", 0).unwrap_err();
        assert!(err.message.contains("bogus"));
    }
}
