use std::fmt::{self, Display};

pub const SPACE: u8 = b' ';
pub const TAB: u8 = b'\t';
pub const LINE_FEED: u8 = b'\n';

/// Identifier of a jump target. Leading zero bits in the source are insignificant.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct Label(pub u64);

impl Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded whitespace instruction. Instructions are immutable once the parser produced them.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Instruction {
    PushStack(i64),
    DuplicateStack,
    CopyNthStack(i64),
    SwapStack,
    DiscardStack,
    SlideNStack(i64),
    Add,
    Subtract,
    Multiply,
    IntegerDivision,
    Modulo,
    StoreHeap,
    RetrieveHeap,
    Mark(Label),
    Call(Label),
    Jump(Label),
    JumpZero(Label),
    JumpNegative(Label),
    Return,
    Exit,
    OutCharacter,
    OutInteger,
    ReadCharacter,
    ReadInteger,
}

impl Instruction {
    /// Short assembly-style name of the instruction
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::PushStack(_) => "push",
            Instruction::DuplicateStack => "dup",
            Instruction::CopyNthStack(_) => "copy",
            Instruction::SwapStack => "swap",
            Instruction::DiscardStack => "discard",
            Instruction::SlideNStack(_) => "slide",
            Instruction::Add => "add",
            Instruction::Subtract => "sub",
            Instruction::Multiply => "mul",
            Instruction::IntegerDivision => "div",
            Instruction::Modulo => "mod",
            Instruction::StoreHeap => "store",
            Instruction::RetrieveHeap => "retrieve",
            Instruction::Mark(_) => "label",
            Instruction::Call(_) => "call",
            Instruction::Jump(_) => "jump",
            Instruction::JumpZero(_) => "jz",
            Instruction::JumpNegative(_) => "jn",
            Instruction::Return => "ret",
            Instruction::Exit => "exit",
            Instruction::OutCharacter => "outchar",
            Instruction::OutInteger => "outnum",
            Instruction::ReadCharacter => "readchar",
            Instruction::ReadInteger => "readnum",
        }
    }

    /// Appends the whitespace encoding of this instruction to `out`
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let opcode: &[u8] = match self {
            Instruction::PushStack(_) => b"  ",
            Instruction::DuplicateStack => b" \n ",
            Instruction::CopyNthStack(_) => b" \t ",
            Instruction::SwapStack => b" \n\t",
            Instruction::DiscardStack => b" \n\n",
            Instruction::SlideNStack(_) => b" \t\n",
            Instruction::Add => b"\t   ",
            Instruction::Subtract => b"\t  \t",
            Instruction::Multiply => b"\t  \n",
            Instruction::IntegerDivision => b"\t \t ",
            Instruction::Modulo => b"\t \t\t",
            Instruction::StoreHeap => b"\t\t ",
            Instruction::RetrieveHeap => b"\t\t\t",
            Instruction::Mark(_) => b"\n  ",
            Instruction::Call(_) => b"\n \t",
            Instruction::Jump(_) => b"\n \n",
            Instruction::JumpZero(_) => b"\n\t ",
            Instruction::JumpNegative(_) => b"\n\t\t",
            Instruction::Return => b"\n\t\n",
            Instruction::Exit => b"\n\n\n",
            Instruction::OutCharacter => b"\t\n  ",
            Instruction::OutInteger => b"\t\n \t",
            Instruction::ReadCharacter => b"\t\n\t ",
            Instruction::ReadInteger => b"\t\n\t\t",
        };
        out.extend_from_slice(opcode);
        match *self {
            Instruction::PushStack(n) | Instruction::CopyNthStack(n) | Instruction::SlideNStack(n) => {
                encode_signed(n, out)
            }
            Instruction::Mark(label)
            | Instruction::Call(label)
            | Instruction::Jump(label)
            | Instruction::JumpZero(label)
            | Instruction::JumpNegative(label) => encode_unsigned(label.0, out),
            _ => (),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::PushStack(n) | Instruction::CopyNthStack(n) | Instruction::SlideNStack(n) => {
                write!(f, "{} {}", self.mnemonic(), n)
            }
            Instruction::Mark(label)
            | Instruction::Call(label)
            | Instruction::Jump(label)
            | Instruction::JumpZero(label)
            | Instruction::JumpNegative(label) => write!(f, "{} {}", self.mnemonic(), label),
            _ => f.write_str(self.mnemonic()),
        }
    }
}

fn push_bits(value: u64, out: &mut Vec<u8>) {
    let width = u64::BITS - value.leading_zeros();
    for place in (0..width).rev() {
        out.push(if (value >> place) & 1 == 1 { TAB } else { SPACE });
    }
}

/// Sign flag, binary magnitude (most significant bit first), line feed.
pub fn encode_signed(value: i64, out: &mut Vec<u8>) {
    out.push(if value < 0 { TAB } else { SPACE });
    push_bits(value.unsigned_abs(), out);
    out.push(LINE_FEED);
}

/// Binary magnitude (most significant bit first), line feed.
pub fn encode_unsigned(value: u64, out: &mut Vec<u8>) {
    push_bits(value, out);
    out.push(LINE_FEED);
}

/// Encodes a whole program as whitespace source.
pub fn encode(instructions: &[Instruction]) -> Vec<u8> {
    let mut out = Vec::new();
    for instr in instructions {
        instr.encode_into(&mut out);
    }
    out
}
