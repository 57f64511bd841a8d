//! HACK assembly emission
//!
//! One [`CodeWriter`] spans the whole compilation: it owns the output sink,
//! the label counters that keep comparison and return-site labels globally
//! unique, and the unit/function names that qualify static references and
//! VM labels.

use std::io::{self, Write};

use crate::command::{ArithOp, Command, Segment};

// Emits a run of fixed assembly lines, each annotated with its ordinal
macro_rules! emit {
    ($writer:expr, $($line:literal)*) => {
        $($writer.code($line)?;)*
    };
}

pub struct CodeWriter<W: Write> {
    out: W,
    /// Basename of the unit currently being translated, qualifies statics
    unit: String,
    /// Enclosing function, qualifies VM labels; falls back to the unit name
    /// until the first `function` command
    function: Option<String>,
    line_count: usize,
    bool_count: usize,
    call_count: usize,
}

impl<W: Write> CodeWriter<W> {
    pub fn new(out: W) -> Self {
        CodeWriter {
            out,
            unit: String::new(),
            function: None,
            line_count: 0,
            bool_count: 0,
            call_count: 0,
        }
    }

    /// Announces the unit whose commands follow
    ///
    /// Emits a banner so the unit boundaries stay visible in the output.
    pub fn set_unit(&mut self, unit: &str) -> io::Result<()> {
        self.unit.clear();
        self.unit.push_str(unit);
        self.function = None;

        self.plain("//////")?;
        let banner = format!("// {unit}");
        self.plain(&banner)
    }

    /// Emits the runtime preamble: `SP = 256`, then `call Sys.init 0`
    ///
    /// Called exactly once, before any unit is translated.
    pub fn write_bootstrap(&mut self) -> io::Result<()> {
        emit!(self,
            "@256"
            "D=A"
            "@SP"
            "M=D"
        );
        self.write_call("Sys.init", 0)
    }

    /// Echoes the command as a comment, then dispatches on the variant
    pub fn write_command(&mut self, command: &Command) -> io::Result<()> {
        let echo = format!("// {command}");
        self.plain(&echo)?;

        match command {
            Command::Arithmetic(op) => self.write_arithmetic(*op),
            Command::Push { segment, index } => self.write_push(*segment, *index),
            Command::Pop { segment, index } => self.write_pop(*segment, *index),
            Command::Label(name) => self.write_label(name),
            Command::Goto(name) => self.write_goto(name),
            Command::IfGoto(name) => self.write_if_goto(name),
            Command::Function { name, locals } => self.write_function(name, *locals),
            Command::Call { name, args } => self.write_call(name, *args),
            Command::Return => self.write_return(),
        }
    }

    /// Applies an operator to the top of the stack
    ///
    /// Binary operators pop the right operand into D first; every operator
    /// then works in place on the slot under SP. Comparisons branch to a
    /// fresh `BOOL<n>` label to store true (-1) and rejoin at `ENDBOOL<n>`.
    pub fn write_arithmetic(&mut self, op: ArithOp) -> io::Result<()> {
        if op.is_binary() {
            self.pop_to_d()?;
        }
        self.dec_sp()?;
        self.set_a_to_stack()?;

        match op {
            ArithOp::Add => self.code("M=M+D")?,
            ArithOp::Sub => self.code("M=M-D")?,
            ArithOp::And => self.code("M=M&D")?,
            ArithOp::Or => self.code("M=M|D")?,
            ArithOp::Neg => self.code("M=-M")?,
            ArithOp::Not => self.code("M=!M")?,
            ArithOp::Eq | ArithOp::Gt | ArithOp::Lt => {
                let n = self.bool_count;
                self.bool_count += 1;

                // D = x - y; subtraction can wrap on 16 bits when the
                // operands straddle zero, a limit of the target machine
                self.code("D=M-D")?;
                let then_label = format!("@BOOL{n}");
                self.code(&then_label)?;
                self.code(match op {
                    ArithOp::Eq => "D;JEQ",
                    ArithOp::Gt => "D;JGT",
                    _ => "D;JLT",
                })?;

                self.set_a_to_stack()?;
                self.code("M=0")?;
                let end_target = format!("@ENDBOOL{n}");
                self.code(&end_target)?;
                self.code("0;JMP")?;

                let then_decl = format!("(BOOL{n})");
                self.plain(&then_decl)?;
                self.set_a_to_stack()?;
                self.code("M=-1")?;

                let end_decl = format!("(ENDBOOL{n})");
                self.plain(&end_decl)?;
            }
        }
        self.inc_sp()
    }

    pub fn write_push(&mut self, segment: Segment, index: u16) -> io::Result<()> {
        self.resolve_address(segment, index)?;
        if segment == Segment::Constant {
            self.code("D=A")?;
        } else {
            self.code("D=M")?;
        }
        self.push_d()
    }

    /// Stashes the resolved address in R13: popping the stack clobbers A,
    /// so the store goes through the scratch slot
    pub fn write_pop(&mut self, segment: Segment, index: u16) -> io::Result<()> {
        // pops to the virtual constant segment are rejected during parsing
        debug_assert!(segment != Segment::Constant, "pop constant");

        self.resolve_address(segment, index)?;
        emit!(self,
            "D=A"
            "@R13"
            "M=D"
        );
        self.pop_to_d()?;
        emit!(self,
            "@R13"
            "A=M"
            "M=D"
        );
        Ok(())
    }

    /// Declares a VM label, qualified by the enclosing scope
    pub fn write_label(&mut self, name: &str) -> io::Result<()> {
        let decl = format!("({}${name})", self.scope());
        self.plain(&decl)
    }

    pub fn write_goto(&mut self, name: &str) -> io::Result<()> {
        let target = format!("@{}${name}", self.scope());
        self.code(&target)?;
        self.code("0;JMP")
    }

    /// Pops the condition and branches on any nonzero value
    pub fn write_if_goto(&mut self, name: &str) -> io::Result<()> {
        self.pop_to_d()?;
        let target = format!("@{}${name}", self.scope());
        self.code(&target)?;
        self.code("D;JNE")
    }

    /// Declares the function's global label and zero-initializes its locals
    ///
    /// The caller has already set LCL to SP, so each pushed zero lands in
    /// the next local slot.
    pub fn write_function(&mut self, name: &str, locals: u16) -> io::Result<()> {
        self.function = Some(name.to_string());

        let decl = format!("({name})");
        self.plain(&decl)?;
        for _ in 0..locals {
            self.code("D=0")?;
            self.push_d()?;
        }
        Ok(())
    }

    /// Emits the caller half of the call protocol
    ///
    /// Pushes the return address and the four saved pointers, repositions
    /// LCL to the new SP and ARG to `SP - args - 5`, jumps to the callee,
    /// and declares the unique return-site label.
    pub fn write_call(&mut self, name: &str, args: u16) -> io::Result<()> {
        let ret = format!("{name}RET{}", self.call_count);
        self.call_count += 1;

        let ret_target = format!("@{ret}");
        self.code(&ret_target)?;
        self.code("D=A")?;
        self.push_d()?;

        for saved in ["@LCL", "@ARG", "@THIS", "@THAT"] {
            self.code(saved)?;
            self.code("D=M")?;
            self.push_d()?;
        }

        emit!(self,
            "@SP"
            "D=M"
            "@LCL"
            "M=D"
        );
        let frame_size = format!("@{}", u32::from(args) + 5);
        self.code(&frame_size)?;
        emit!(self,
            "D=D-A"
            "@ARG"
            "M=D"
        );

        let entry = format!("@{name}");
        self.code(&entry)?;
        self.code("0;JMP")?;

        let ret_decl = format!("({ret})");
        self.plain(&ret_decl)
    }

    /// Emits the callee half of the call protocol
    ///
    /// FRAME is anchored in R13 and the return address saved in R14 before
    /// the return value is placed: with zero arguments the value lands in
    /// the very slot the return address occupied.
    pub fn write_return(&mut self) -> io::Result<()> {
        emit!(self,
            "@LCL"
            "D=M"
            "@R13"
            "M=D"
        );
        emit!(self,
            "@R13"
            "D=M"
            "@5"
            "D=D-A"
            "A=D"
            "D=M"
            "@R14"
            "M=D"
        );

        // return value goes to *ARG, the caller's new top of stack
        self.pop_to_d()?;
        emit!(self,
            "@ARG"
            "A=M"
            "M=D"
            "@ARG"
            "D=M"
            "@SP"
            "M=D+1"
        );

        // THAT sits immediately below FRAME, then THIS, ARG, LCL
        for (offset, pointer) in ["@THAT", "@THIS", "@ARG", "@LCL"].iter().enumerate() {
            self.code("@R13")?;
            self.code("D=M")?;
            let slot = format!("@{}", offset + 1);
            self.code(&slot)?;
            self.code("D=D-A")?;
            self.code("A=D")?;
            self.code("D=M")?;
            self.code(pointer)?;
            self.code("M=D")?;
        }

        emit!(self,
            "@R14"
            "A=M"
            "0;JMP"
        );
        Ok(())
    }

    /// Flushes the sink; the writer stays usable afterwards
    pub fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Leaves the effective address in A (or the literal for `constant`)
    fn resolve_address(&mut self, segment: Segment, index: u16) -> io::Result<()> {
        if let Some(base) = segment.base_symbol() {
            let base_ref = format!("@{base}");
            self.code(&base_ref)?;
            self.code("D=M")?;
            let offset = format!("@{index}");
            self.code(&offset)?;
            self.code("A=D+A")
        } else {
            let address = match segment {
                Segment::Constant => format!("@{index}"),
                Segment::Static => format!("@{}.{index}", self.unit),
                Segment::Pointer => format!("@R{}", 3 + index),
                Segment::Temp => format!("@R{}", 5 + index),
                _ => unreachable!("indirect segments resolve via base pointer"),
            };
            self.code(&address)
        }
    }

    fn scope(&self) -> &str {
        self.function.as_deref().unwrap_or(&self.unit)
    }

    fn push_d(&mut self) -> io::Result<()> {
        emit!(self,
            "@SP"
            "A=M"
            "M=D"
        );
        self.inc_sp()
    }

    fn pop_to_d(&mut self) -> io::Result<()> {
        self.dec_sp()?;
        emit!(self,
            "A=M"
            "D=M"
        );
        Ok(())
    }

    fn inc_sp(&mut self) -> io::Result<()> {
        emit!(self,
            "@SP"
            "M=M+1"
        );
        Ok(())
    }

    fn dec_sp(&mut self) -> io::Result<()> {
        emit!(self,
            "@SP"
            "M=M-1"
        );
        Ok(())
    }

    fn set_a_to_stack(&mut self) -> io::Result<()> {
        emit!(self,
            "@SP"
            "A=M"
        );
        Ok(())
    }

    /// Writes one instruction, annotated with its ordinal
    fn code(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{line} // {}", self.line_count)?;
        self.line_count += 1;
        Ok(())
    }

    /// Writes a label declaration or comment, no ordinal
    fn plain(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{line}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    /// Translates VM source for unit "Test" and returns the raw output
    fn translate(source: &str) -> String {
        let mut out = Vec::new();
        let mut writer = CodeWriter::new(&mut out);
        writer.set_unit("Test").unwrap();
        for command in Parser::new(source) {
            writer.write_command(&command.unwrap()).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    /// Instruction and label lines with comments and ordinals stripped
    fn ops(output: &str) -> Vec<&str> {
        output
            .lines()
            .filter(|line| !line.starts_with("//"))
            .map(|line| line.split(" // ").next().unwrap())
            .collect()
    }

    #[test]
    fn test_push_constant() {
        let output = translate("push constant 7");
        assert_eq!(
            ops(&output),
            ["@7", "D=A", "@SP", "A=M", "M=D", "@SP", "M=M+1"]
        );
    }

    #[test]
    fn test_push_indirect_segment() {
        let output = translate("push local 2");
        assert_eq!(
            ops(&output),
            ["@LCL", "D=M", "@2", "A=D+A", "D=M", "@SP", "A=M", "M=D", "@SP", "M=M+1"]
        );
    }

    #[test]
    fn test_pop_stashes_address_in_r13() {
        let output = translate("pop argument 3");
        assert_eq!(
            ops(&output),
            [
                "@ARG", "D=M", "@3", "A=D+A", "D=A", "@R13", "M=D", "@SP", "M=M-1", "A=M",
                "D=M", "@R13", "A=M", "M=D"
            ]
        );
    }

    #[test]
    fn test_fixed_segments() {
        assert!(ops(&translate("push pointer 1")).contains(&"@R4"));
        assert!(ops(&translate("push temp 6")).contains(&"@R11"));
        assert!(ops(&translate("pop temp 0")).contains(&"@R5"));
    }

    #[test]
    fn test_static_is_qualified_by_unit() {
        let output = translate("push static 3\npop static 8");
        let ops = ops(&output);
        assert!(ops.contains(&"@Test.3"));
        assert!(ops.contains(&"@Test.8"));
    }

    #[test]
    fn test_binary_arithmetic() {
        let output = translate("add");
        assert_eq!(
            ops(&output),
            [
                "@SP", "M=M-1", "A=M", "D=M", "@SP", "M=M-1", "@SP", "A=M", "M=M+D", "@SP",
                "M=M+1"
            ]
        );
        assert!(ops(&translate("sub")).contains(&"M=M-D"));
        assert!(ops(&translate("and")).contains(&"M=M&D"));
        assert!(ops(&translate("or")).contains(&"M=M|D"));
    }

    #[test]
    fn test_unary_arithmetic_leaves_sp_alone() {
        let output = translate("neg");
        assert_eq!(
            ops(&output),
            ["@SP", "M=M-1", "@SP", "A=M", "M=-M", "@SP", "M=M+1"]
        );
        assert!(ops(&translate("not")).contains(&"M=!M"));
    }

    #[test]
    fn test_comparison_labels_are_unique() {
        let output = translate("eq\ngt\nlt");
        let ops = ops(&output);
        assert!(ops.contains(&"(BOOL0)"));
        assert!(ops.contains(&"(ENDBOOL0)"));
        assert!(ops.contains(&"(BOOL1)"));
        assert!(ops.contains(&"(BOOL2)"));
        assert!(ops.contains(&"D;JEQ"));
        assert!(ops.contains(&"D;JGT"));
        assert!(ops.contains(&"D;JLT"));
    }

    #[test]
    fn test_comparison_true_is_all_bits_one() {
        let output = translate("eq");
        let ops = ops(&output);
        let then = ops.iter().position(|&op| op == "(BOOL0)").unwrap();
        assert_eq!(ops[then + 3], "M=-1");
        // fall-through path stores false
        let branch = ops.iter().position(|&op| op == "D;JEQ").unwrap();
        assert_eq!(ops[branch + 3], "M=0");
    }

    #[test]
    fn test_labels_scope_to_the_unit_outside_functions() {
        let output = translate("label LOOP\ngoto LOOP\nif-goto LOOP");
        let ops = ops(&output);
        assert!(ops.contains(&"(Test$LOOP)"));
        assert!(ops.contains(&"@Test$LOOP"));
        assert!(ops.contains(&"D;JNE"));
    }

    #[test]
    fn test_labels_scope_to_the_enclosing_function() {
        let output = translate("function Foo.bar 0\nlabel LOOP\ngoto LOOP");
        let ops = ops(&output);
        assert!(ops.contains(&"(Foo.bar$LOOP)"));
        assert!(ops.contains(&"@Foo.bar$LOOP"));
        assert!(!ops.iter().any(|op| op.contains("Test$LOOP")));
    }

    #[test]
    fn test_function_allocates_locals() {
        let output = translate("function Foo.bar 2");
        let ops = ops(&output);
        assert_eq!(ops[0], "(Foo.bar)");
        assert_eq!(ops.iter().filter(|&&op| op == "D=0").count(), 2);
        assert_eq!(ops.iter().filter(|&&op| op == "M=M+1").count(), 2);
    }

    #[test]
    fn test_call_pushes_frame_in_order() {
        let output = translate("call Foo.baz 2");
        assert_eq!(
            ops(&output),
            [
                "@Foo.bazRET0", "D=A", "@SP", "A=M", "M=D", "@SP", "M=M+1", // return address
                "@LCL", "D=M", "@SP", "A=M", "M=D", "@SP", "M=M+1",
                "@ARG", "D=M", "@SP", "A=M", "M=D", "@SP", "M=M+1",
                "@THIS", "D=M", "@SP", "A=M", "M=D", "@SP", "M=M+1",
                "@THAT", "D=M", "@SP", "A=M", "M=D", "@SP", "M=M+1",
                "@SP", "D=M", "@LCL", "M=D", // LCL = SP
                "@7", "D=D-A", "@ARG", "M=D", // ARG = SP - 2 - 5
                "@Foo.baz", "0;JMP", "(Foo.bazRET0)"
            ]
        );
    }

    #[test]
    fn test_return_site_labels_are_unique() {
        let output = translate("call Foo.a 0\ncall Foo.a 0\ncall Foo.b 1");
        let ops = ops(&output);
        assert!(ops.contains(&"(Foo.aRET0)"));
        assert!(ops.contains(&"(Foo.aRET1)"));
        assert!(ops.contains(&"(Foo.bRET2)"));
    }

    #[test]
    fn test_return_saves_address_before_placing_value() {
        let output = translate("return");
        let ops = ops(&output);
        // return address lands in R14 before the stack pop
        let saved = ops.iter().position(|&op| op == "@R14").unwrap();
        let popped = ops.iter().position(|&op| op == "M=M-1").unwrap();
        assert!(saved < popped);
        // the final instruction jumps through R14
        assert_eq!(&ops[ops.len() - 3..], ["@R14", "A=M", "0;JMP"]);
    }

    #[test]
    fn test_return_restores_pointers_in_order() {
        let output = translate("return");
        let ops = ops(&output);
        let restores: Vec<&str> = ops
            .windows(2)
            .filter(|pair| pair[1] == "M=D" && pair[0].starts_with('@') && pair[0] != "@R13")
            .map(|pair| pair[0])
            .collect();
        // THAT first, its slot is immediately below FRAME
        assert_eq!(restores, ["@R14", "@THAT", "@THIS", "@ARG", "@LCL"]);
    }

    #[test]
    fn test_bootstrap_sets_sp_and_calls_sys_init() {
        let mut out = Vec::new();
        let mut writer = CodeWriter::new(&mut out);
        writer.write_bootstrap().unwrap();
        let output = String::from_utf8(out).unwrap();
        let ops = ops(&output);
        assert_eq!(&ops[..4], ["@256", "D=A", "@SP", "M=D"]);
        assert!(ops.contains(&"@Sys.init"));
        assert!(ops.contains(&"(Sys.initRET0)"));
    }

    #[test]
    fn test_line_ordinals_are_monotonic() {
        let output = translate("push constant 1\npush constant 2\nadd");
        let ordinals: Vec<usize> = output
            .lines()
            .filter_map(|line| line.split(" // ").nth(1))
            .map(|n| n.parse().unwrap())
            .collect();
        assert_eq!(ordinals, (0..ordinals.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_unit_switch_resets_scope_but_not_counters() {
        let mut out = Vec::new();
        let mut writer = CodeWriter::new(&mut out);
        writer.set_unit("First").unwrap();
        writer
            .write_command(&Command::Arithmetic(ArithOp::Eq))
            .unwrap();
        writer.set_unit("Second").unwrap();
        writer
            .write_command(&Command::Arithmetic(ArithOp::Eq))
            .unwrap();
        writer
            .write_command(&Command::Label("L".to_string()))
            .unwrap();
        let output = String::from_utf8(out).unwrap();
        let ops = ops(&output);
        assert!(ops.contains(&"(BOOL0)"));
        assert!(ops.contains(&"(BOOL1)"));
        assert!(ops.contains(&"(Second$L)"));
    }
}
