//! VM command representation
//!
//! A parsed VM program is a sequence of [`Command`] values. Classification
//! uses perfect hash functions (PHF) so opcode and segment lookup is an O(1)
//! compile-time hash table producing the enum value directly.

use std::fmt;

use phf::phf_map;

/// One VM command with its operands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Stack arithmetic/logic: `add`, `sub`, `neg`, `eq`, `gt`, `lt`, `and`, `or`, `not`
    Arithmetic(ArithOp),
    /// `push <segment> <index>`
    Push { segment: Segment, index: u16 },
    /// `pop <segment> <index>`
    Pop { segment: Segment, index: u16 },
    /// `label <name>`
    Label(String),
    /// `goto <name>`
    Goto(String),
    /// `if-goto <name>`
    IfGoto(String),
    /// `function <name> <locals>`
    Function { name: String, locals: u16 },
    /// `call <name> <args>`
    Call { name: String, args: u16 },
    /// `return`
    Return,
}

/// The nine stack arithmetic/logic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

/// The eight VM memory segments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Virtual literal segment, push-only
    Constant,
    /// Per-unit symbols `<unit>.<index>`, RAM assigned by the assembler
    Static,
    Local,
    Argument,
    This,
    That,
    /// RAM 3..4, aliases of THIS/THAT
    Pointer,
    /// RAM 5..12
    Temp,
}

/// Arithmetic operator mnemonics
///
/// PHF gives O(1) lookup with zero runtime overhead; the table is the
/// classification step for any opcode that is not a structural command.
static ARITHMETIC: phf::Map<&'static str, ArithOp> = phf_map! {
    "add" => ArithOp::Add,
    "sub" => ArithOp::Sub,
    "neg" => ArithOp::Neg,
    "eq" => ArithOp::Eq,
    "gt" => ArithOp::Gt,
    "lt" => ArithOp::Lt,
    "and" => ArithOp::And,
    "or" => ArithOp::Or,
    "not" => ArithOp::Not,
};

/// Segment name to segment mapping
static SEGMENTS: phf::Map<&'static str, Segment> = phf_map! {
    "constant" => Segment::Constant,
    "static" => Segment::Static,
    "local" => Segment::Local,
    "argument" => Segment::Argument,
    "this" => Segment::This,
    "that" => Segment::That,
    "pointer" => Segment::Pointer,
    "temp" => Segment::Temp,
};

/// Looks up an arithmetic operator by its (lower-case) mnemonic
#[inline]
#[must_use]
pub fn arithmetic_op(token: &str) -> Option<ArithOp> {
    ARITHMETIC.get(token).copied()
}

/// Looks up a segment by name
///
/// Segment names are case-sensitive; they appear verbatim in VM source.
#[inline]
#[must_use]
pub fn segment(token: &str) -> Option<Segment> {
    SEGMENTS.get(token).copied()
}

impl ArithOp {
    /// The VM mnemonic for this operator
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Neg => "neg",
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
        }
    }

    /// Whether the operator consumes two stack operands
    #[inline]
    #[must_use]
    pub const fn is_binary(self) -> bool {
        !matches!(self, Self::Neg | Self::Not)
    }
}

impl Segment {
    /// The named RAM pointer holding this segment's base, for the four
    /// indirect segments; `None` for segments with fixed or virtual addresses
    #[must_use]
    pub const fn base_symbol(self) -> Option<&'static str> {
        match self {
            Self::Local => Some("LCL"),
            Self::Argument => Some("ARG"),
            Self::This => Some("THIS"),
            Self::That => Some("THAT"),
            _ => None,
        }
    }

    /// The VM name of this segment
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Static => "static",
            Self::Local => "local",
            Self::Argument => "argument",
            Self::This => "this",
            Self::That => "that",
            Self::Pointer => "pointer",
            Self::Temp => "temp",
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Command {
    /// Canonical VM text of the command, used for output annotations and
    /// error messages
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Arithmetic(op) => write!(f, "{op}"),
            Self::Push { segment, index } => write!(f, "push {segment} {index}"),
            Self::Pop { segment, index } => write!(f, "pop {segment} {index}"),
            Self::Label(name) => write!(f, "label {name}"),
            Self::Goto(name) => write!(f, "goto {name}"),
            Self::IfGoto(name) => write!(f, "if-goto {name}"),
            Self::Function { name, locals } => write!(f, "function {name} {locals}"),
            Self::Call { name, args } => write!(f, "call {name} {args}"),
            Self::Return => f.write_str("return"),
        }
    }
}
