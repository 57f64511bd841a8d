//! VM Translator for the `Nand2Tetris` course
//!
//! This crate translates stack-based VM bytecode (`.vm`) into Hack symbolic
//! assembly (`.asm`), covering the full VM language: stack arithmetic,
//! memory segments, program flow, and the function call/return protocol.
//!
//! # Architecture
//!
//! The translator consists of four main modules, composed as a pipeline:
//! - [`parser`]: Lazy classification of VM source into typed commands
//! - [`command`]: The command variants and PHF-backed opcode tables
//! - [`code_writer`]: Hack assembly emission with cross-unit label counters
//! - [`driver`]: Unit-set rules, bootstrap, and orchestration
//!
//! Data flows VM text → [`Parser`] → [`Command`] → [`CodeWriter`] → Hack
//! assembly. One parser exists per source unit; a single code writer spans
//! the whole compilation so comparison and return-site labels never
//! collide across units.
//!
//! # Example
//!
//! ```rust
//! use project8::{CodeWriter, Parser};
//!
//! let source = "push constant 7\npush constant 8\nadd";
//! let mut out = Vec::new();
//!
//! let mut writer = CodeWriter::new(&mut out);
//! writer.set_unit("SimpleAdd").unwrap();
//! for command in Parser::new(source) {
//!     writer.write_command(&command.unwrap()).unwrap();
//! }
//!
//! let asm = String::from_utf8(out).unwrap();
//! assert!(asm.contains("M=M+D"));
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod code_writer;
pub mod command;
pub mod driver;
pub mod error;
pub mod parser;

// Re-export commonly used types for convenience
pub use code_writer::CodeWriter;
pub use command::{ArithOp, Command, Segment};
pub use driver::translate_path;
pub use error::{Result, TranslateError};
pub use parser::Parser;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_translation_workflow() {
        let source = "\
            // computes 7 + 8\n\
            push constant 7\n\
            push constant 8\n\
            add\n";

        let mut out = Vec::new();
        let mut writer = CodeWriter::new(&mut out);
        writer.set_unit("SimpleAdd").unwrap();
        for command in Parser::new(source) {
            writer.write_command(&command.unwrap()).unwrap();
        }
        writer.finish().unwrap();

        let asm = String::from_utf8(out).unwrap();
        assert!(asm.contains("// SimpleAdd"));
        assert!(asm.contains("// push constant 7"));
        assert!(asm.contains("@7"));
        assert!(asm.contains("@8"));
        assert!(asm.contains("M=M+D"));
    }

    #[test]
    fn test_errors_surface_through_the_iterator() {
        let mut parser = Parser::new("push constant 1\nwat 2");
        assert!(parser.next().unwrap().is_ok());
        let err = parser.next().unwrap().unwrap_err();
        assert!(matches!(err, TranslateError::UnknownOpcode { .. }));
    }
}
