//! The Hack assembler: symbolic assembly → 16-bit binary text.
//!
//! Two passes over the preprocessed lines: the first binds labels and
//! records symbol references, the second encodes. Variable addresses are
//! handed out only between the passes, once every label has been seen.

pub mod encode;
pub mod symbols;

use crate::diagnostic::Diagnostic;
use crate::hack::symbols::SymbolTable;
use crate::span::Span;

/// Largest value an A-instruction can load.
const MAX_ADDRESS: u32 = 32767;

struct Line {
    text: String,
    span: Span,
}

/// Assemble a whole `.asm` file into one binary literal per instruction.
pub fn assemble(source: &str, file_id: u16) -> Result<Vec<String>, Diagnostic> {
    let lines = preprocess(source, file_id);
    let mut table = SymbolTable::new();

    // Pass 1: bind labels to instruction addresses, note symbol references.
    let mut address: u16 = 0;
    for line in &lines {
        if let Some(rest) = line.text.strip_prefix('(') {
            let name = rest.strip_suffix(')').ok_or_else(|| {
                Diagnostic::error("expected ')' at end of label".to_string(), line.span)
            })?;
            if name.is_empty() {
                return Err(Diagnostic::error("empty label".to_string(), line.span));
            }
            table.bind(name, address);
            continue;
        }
        if let Some(rest) = line.text.strip_prefix('@') {
            if !is_numeric(rest) {
                table.reference(rest);
            }
        }
        address += 1;
    }

    table.resolve_variables();

    // Pass 2: encode.
    let mut out = Vec::with_capacity(lines.len());
    for line in &lines {
        if line.text.starts_with('(') {
            continue;
        }
        let word = match line.text.strip_prefix('@') {
            Some(rest) => encode_a_instruction(rest, &table, line.span)?,
            None => encode_c_instruction(&line.text, line.span)?,
        };
        out.push(format!("{:016b}", word));
    }
    Ok(out)
}

fn preprocess(source: &str, file_id: u16) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut offset = 0u32;
    for raw_line in source.lines() {
        let span = Span::new(file_id, offset, offset + raw_line.len() as u32);
        offset += raw_line.len() as u32 + 1;

        let text = match raw_line.find("//") {
            Some(idx) => &raw_line[..idx],
            None => raw_line,
        };
        let text = text.trim();
        if !text.is_empty() {
            lines.push(Line {
                text: text.to_string(),
                span,
            });
        }
    }
    lines
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn encode_a_instruction(
    value: &str,
    table: &SymbolTable,
    span: Span,
) -> Result<u16, Diagnostic> {
    if value.is_empty() {
        return Err(Diagnostic::error(
            "expected an address or symbol after '@'".to_string(),
            span,
        ));
    }
    if is_numeric(value) {
        return match value.parse::<u32>() {
            Ok(n) if n <= MAX_ADDRESS => Ok(n as u16),
            _ => Err(Diagnostic::error(
                format!("address '{}' is out of range", value),
                span,
            )
            .with_help(format!("addresses fit in 15 bits, at most {}", MAX_ADDRESS))),
        };
    }
    table.address_of(value).ok_or_else(|| {
        Diagnostic::error(format!("undefined symbol '{}'", value), span)
    })
}

/// `[dest=]comp[;jmp]`
fn encode_c_instruction(text: &str, span: Span) -> Result<u16, Diagnostic> {
    let (dest_text, rest) = match text.find('=') {
        Some(idx) => (&text[..idx], &text[idx + 1..]),
        None => ("", text),
    };
    let (comp_text, jump_text) = match rest.find(';') {
        Some(idx) => (&rest[..idx], &rest[idx + 1..]),
        None => (rest, ""),
    };

    let dest = encode::dest(dest_text.trim()).ok_or_else(|| {
        Diagnostic::error(format!("invalid destination '{}'", dest_text.trim()), span)
            .with_help("a destination is any combination of A, D, and M".to_string())
    })?;
    let comp = encode::comp(comp_text.trim()).ok_or_else(|| {
        Diagnostic::error(
            format!("unknown computation mnemonic '{}'", comp_text.trim()),
            span,
        )
    })?;
    let jump = encode::jump(jump_text.trim()).ok_or_else(|| {
        Diagnostic::error(format!("unknown jump mnemonic '{}'", jump_text.trim()), span)
            .with_help("jumps are JGT, JEQ, JGE, JLT, JNE, JLE, and JMP".to_string())
    })?;

    Ok(encode::c_instruction(dest, comp, jump))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asm(source: &str) -> Vec<String> {
        assemble(source, 0).unwrap_or_else(|d| panic!("assembly failed: {}", d.message))
    }

    fn asm_err(source: &str) -> Diagnostic {
        assemble(source, 0).expect_err("source should fail to assemble")
    }

    #[test]
    fn test_numeric_a_instruction() {
        assert_eq!(asm("@17\n"), vec!["0000000000010001"]);
        assert_eq!(asm("@0\n"), vec!["0000000000000000"]);
        assert_eq!(asm("@32767\n"), vec!["0111111111111111"]);
    }

    #[test]
    fn test_c_instruction_with_dest_and_jump() {
        assert_eq!(asm("D=M;JMP\n"), vec!["1111110000010111"]);
    }

    #[test]
    fn test_c_instruction_forms() {
        assert_eq!(asm("0;JMP\n"), vec!["1110101010000111"]);
        assert_eq!(asm("D=D+A\n"), vec!["1110000010010000"]);
        assert_eq!(asm("AM=M-1\n"), vec!["1111110010101000"]);
        assert_eq!(asm("D;JNE\n"), vec!["1110001100000101"]);
    }

    #[test]
    fn test_preseeded_symbols_resolve() {
        assert_eq!(asm("@SP\n"), vec!["0000000000000000"]);
        assert_eq!(asm("@THAT\n"), vec!["0000000000000100"]);
        assert_eq!(asm("@R13\n"), vec!["0000000000001101"]);
        assert_eq!(asm("@SCREEN\n"), vec!["0100000000000000"]);
        assert_eq!(asm("@KBD\n"), vec!["0110000000000000"]);
    }

    #[test]
    fn test_label_binds_to_following_instruction() {
        let out = asm("@1\n(LOOP)\n@LOOP\n0;JMP\n");
        // LOOP is instruction address 1; labels do not advance the counter.
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], "0000000000000001");
    }

    #[test]
    fn test_forward_label_reference() {
        let out = asm("@END\n0;JMP\n@5\n(END)\n@END\n");
        assert_eq!(out[0], "0000000000000011", "END binds to address 3");
        assert_eq!(out[3], "0000000000000011");
    }

    #[test]
    fn test_variables_start_at_16() {
        let out = asm("@i\n@sum\n@i\n");
        assert_eq!(out[0], "0000000000010000");
        assert_eq!(out[1], "0000000000010001");
        assert_eq!(out[2], "0000000000010000", "repeat reference reuses the cell");
    }

    #[test]
    fn test_label_reference_is_not_a_variable() {
        // A name that later appears as a label must not burn a RAM cell.
        let out = asm("@done\n@x\n(done)\n@x\n");
        assert_eq!(out[0], "0000000000000010", "done is the label at 2");
        assert_eq!(out[1], "0000000000010000", "x is the first variable");
        assert_eq!(out[3], out[1]);
    }

    #[test]
    fn test_comments_and_blanks_ignored() {
        let out = asm("// whole line\n\n  @2 // trailing\n   D=A\n");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], "0000000000000010");
    }

    #[test]
    fn test_small_program_end_to_end() {
        // RAM[2] = RAM[0] + RAM[1]
        let source = "@R0\nD=M\n@R1\nD=D+M\n@R2\nM=D\n(HALT)\n@HALT\n0;JMP\n";
        let out = asm(source);
        assert_eq!(out.len(), 8);
        assert_eq!(out[0], "0000000000000000");
        assert_eq!(out[1], "1111110000010000"); // D=M
        assert_eq!(out[3], "1111000010010000"); // D=D+M
        assert_eq!(out[5], "1110001100001000"); // M=D
        assert_eq!(out[6], "0000000000000110"); // @HALT = 6
    }

    #[test]
    fn test_every_line_is_16_binary_digits() {
        let out = asm("@42\nD=A\n@sum\nM=D\n(X)\n@X\nD;JGT\n");
        for line in &out {
            assert_eq!(line.len(), 16);
            assert!(line.bytes().all(|b| b == b'0' || b == b'1'));
        }
    }

    #[test]
    fn test_error_unclosed_label() {
        let diag = asm_err("(LOOP\n");
        assert!(
            diag.message.contains("expected ')'"),
            "got: {}",
            diag.message
        );
    }

    #[test]
    fn test_error_unknown_computation() {
        let diag = asm_err("D=Q+1\n");
        assert!(
            diag.message.contains("unknown computation mnemonic 'Q+1'"),
            "got: {}",
            diag.message
        );
    }

    #[test]
    fn test_error_unknown_jump() {
        let diag = asm_err("0;JNZ\n");
        assert!(
            diag.message.contains("unknown jump mnemonic 'JNZ'"),
            "got: {}",
            diag.message
        );
        assert!(diag.help.is_some());
    }

    #[test]
    fn test_error_invalid_destination() {
        let diag = asm_err("X=D\n");
        assert!(
            diag.message.contains("invalid destination 'X'"),
            "got: {}",
            diag.message
        );
    }

    #[test]
    fn test_error_address_out_of_range() {
        let diag = asm_err("@32768\n");
        assert!(
            diag.message.contains("out of range"),
            "got: {}",
            diag.message
        );
    }

    #[test]
    fn test_error_bare_at_sign() {
        let diag = asm_err("@\n");
        assert!(diag.message.contains("after '@'"), "got: {}", diag.message);
    }

    #[test]
    fn test_reassembling_is_deterministic() {
        let source = "@start\nD=M\n(start)\n@temp\nM=D;JEQ\n@start\n0;JMP\n";
        assert_eq!(asm(source), asm(source));
    }
}
