//! VM commands → Hack assembly.
//!
//! The writer owns its output buffer and a single monotonically
//! increasing label counter shared by every generated jump target.

use crate::vm::command::{ArithmeticOp, Segment, VmCommand, VmOp};

/// Generated labels start above this value, clear of the small numbers
/// people put in hand-written label names.
const LABEL_SEED: u32 = 1000;

pub struct AsmWriter {
    out: Vec<String>,
    label_counter: u32,
}

impl Default for AsmWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl AsmWriter {
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            label_counter: LABEL_SEED,
        }
    }

    pub fn finish(self) -> Vec<String> {
        self.out
    }

    /// SP = 256, then transfer to `Sys.init` through the full calling
    /// convention. `Sys.init` is a forward reference; the assembler
    /// resolves labels across the whole program in its first pass.
    pub fn write_boot(&mut self) {
        self.write("@256");
        self.write("D=A");
        self.write("@SP");
        self.write("M=D");
        self.write_call("Boot", "Sys.init", 0);
    }

    pub fn write_command(&mut self, cmd: &VmCommand) {
        self.write(format!("// {}", cmd.text));
        match &cmd.op {
            VmOp::Arithmetic(op) => self.write_arithmetic(*op),
            VmOp::Push { segment, index } => self.write_push(*segment, *index, &cmd.module),
            VmOp::Pop { segment, index } => self.write_pop(*segment, *index, &cmd.module),
            VmOp::Label(label) => self.write(format!("({})", label)),
            VmOp::Goto(label) => {
                self.write(format!("@{}", label));
                self.write("0;JMP");
            }
            VmOp::IfGoto(label) => {
                self.pop_d();
                self.write(format!("@{}", label));
                self.write("D;JNE");
            }
            VmOp::Function { name, locals } => self.write_function(name, *locals),
            VmOp::Call { name, args } => self.write_call(&cmd.function, name, *args),
            VmOp::Return => self.write_return(),
        }
    }

    fn write_arithmetic(&mut self, op: ArithmeticOp) {
        // Unary operators work in place on the top-of-stack word.
        match op {
            ArithmeticOp::Neg => {
                self.write("@SP");
                self.write("A=M-1");
                self.write("M=-M");
                return;
            }
            ArithmeticOp::Not => {
                self.write("@SP");
                self.write("A=M-1");
                self.write("M=!M");
                return;
            }
            _ => {}
        }

        // Binary: y into R13, x into D, combine, push.
        self.pop_d();
        self.write("@R13");
        self.write("M=D");
        self.pop_d();
        self.write("@R13");
        match op {
            ArithmeticOp::Add => self.write("D=D+M"),
            ArithmeticOp::Sub => self.write("D=D-M"),
            ArithmeticOp::And => self.write("D=D&M"),
            ArithmeticOp::Or => self.write("D=D|M"),
            ArithmeticOp::Eq | ArithmeticOp::Gt | ArithmeticOp::Lt => {
                let done = self.fresh_label();
                let is_true = self.fresh_label();
                self.write("D=D-M");
                self.write(format!("@{}", is_true));
                self.write(match op {
                    ArithmeticOp::Eq => "D;JEQ",
                    ArithmeticOp::Gt => "D;JGT",
                    _ => "D;JLT",
                });
                self.write("D=0");
                self.write(format!("@{}", done));
                self.write("0;JMP");
                self.write(format!("({})", is_true));
                self.write("D=-1");
                self.write(format!("({})", done));
            }
            ArithmeticOp::Neg | ArithmeticOp::Not => unreachable!(),
        }
        self.push_d();
    }

    fn write_push(&mut self, segment: Segment, index: u16, module: &str) {
        match segment {
            Segment::Constant => {
                self.write(format!("@{}", index));
                self.write("D=A");
            }
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                self.write(format!("@{}", index));
                self.write("D=A");
                self.write(format!("@{}", base_pointer(segment)));
                self.write("A=D+M");
                self.write("D=M");
            }
            Segment::Temp | Segment::Pointer => {
                self.write(format!("@{}", fixed_address(segment, index)));
                self.write("D=M");
            }
            Segment::Static => {
                self.write(format!("@{}.{}", module, index));
                self.write("D=M");
            }
        }
        self.push_d();
    }

    fn write_pop(&mut self, segment: Segment, index: u16, module: &str) {
        match segment {
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                self.write(format!("@{}", index));
                self.write("D=A");
                self.write(format!("@{}", base_pointer(segment)));
                self.write("D=D+M");
                self.write("@R13");
                self.write("M=D");
                self.pop_d();
                self.write("@R13");
                self.write("A=M");
                self.write("M=D");
            }
            Segment::Temp | Segment::Pointer => {
                self.pop_d();
                self.write(format!("@{}", fixed_address(segment, index)));
                self.write("M=D");
            }
            Segment::Static => {
                self.pop_d();
                self.write(format!("@{}.{}", module, index));
                self.write("M=D");
            }
            // Rejected by the parser.
            Segment::Constant => unreachable!("pop constant never parses"),
        }
    }

    fn write_function(&mut self, name: &str, locals: u16) {
        self.write(format!("({})", name));
        if locals > 0 {
            self.write("D=0");
            for _ in 0..locals {
                self.push_d();
            }
        }
    }

    /// Save the caller frame, reposition ARG and LCL, transfer control,
    /// and plant the return address label.
    pub fn write_call(&mut self, caller: &str, name: &str, args: u16) {
        let return_label = format!("Ret{}{}", caller, self.fresh_label());

        self.write(format!("@{}", return_label));
        self.write("D=A");
        self.push_d();
        for pointer in ["LCL", "ARG", "THIS", "THAT"] {
            self.write(format!("@{}", pointer));
            self.write("D=M");
            self.push_d();
        }

        // ARG = SP - args - 5
        self.write("@SP");
        self.write("D=M");
        self.write(format!("@{}", u32::from(args) + 5));
        self.write("D=D-A");
        self.write("@ARG");
        self.write("M=D");

        // LCL = SP
        self.write("@SP");
        self.write("D=M");
        self.write("@LCL");
        self.write("M=D");

        self.write(format!("@{}", name));
        self.write("0;JMP");
        self.write(format!("({})", return_label));
    }

    fn write_return(&mut self) {
        // FRAME = LCL
        self.write("@LCL");
        self.write("D=M");
        self.write("@R13");
        self.write("M=D");
        // RET = *(FRAME - 5)
        self.write("@5");
        self.write("A=D-A");
        self.write("D=M");
        self.write("@R14");
        self.write("M=D");
        // *ARG = pop()
        self.pop_d();
        self.write("@ARG");
        self.write("A=M");
        self.write("M=D");
        // SP = ARG + 1
        self.write("@ARG");
        self.write("D=M+1");
        self.write("@SP");
        self.write("M=D");
        // Walk FRAME downward restoring the caller's pointer cells.
        for pointer in ["THAT", "THIS", "ARG", "LCL"] {
            self.write("@R13");
            self.write("AM=M-1");
            self.write("D=M");
            self.write(format!("@{}", pointer));
            self.write("M=D");
        }
        // goto RET
        self.write("@R14");
        self.write("A=M");
        self.write("0;JMP");
    }

    fn pop_d(&mut self) {
        self.write("@SP");
        self.write("AM=M-1");
        self.write("D=M");
    }

    fn push_d(&mut self) {
        self.write("@SP");
        self.write("A=M");
        self.write("M=D");
        self.write("@SP");
        self.write("M=M+1");
    }

    fn fresh_label(&mut self) -> String {
        self.label_counter += 1;
        format!("L{}", self.label_counter)
    }

    fn write(&mut self, line: impl Into<String>) {
        self.out.push(line.into());
    }
}

fn base_pointer(segment: Segment) -> &'static str {
    match segment {
        Segment::Local => "LCL",
        Segment::Argument => "ARG",
        Segment::This => "THIS",
        Segment::That => "THAT",
        _ => unreachable!("segment has no base pointer"),
    }
}

fn fixed_address(segment: Segment, index: u16) -> u16 {
    match segment {
        Segment::Temp => 5 + index,
        Segment::Pointer => 3 + index,
        _ => unreachable!("segment is not at a fixed address"),
    }
}
