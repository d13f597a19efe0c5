#[cfg(not(target_arch = "wasm32"))]
use memmap::Mmap;
#[cfg(not(target_arch = "wasm32"))]
use std::fs::File;
use std::io::{self, Read};
use std::ops::Deref;
#[cfg(not(target_arch = "wasm32"))]
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::ir::{Instruction, Label, LINE_FEED, SPACE, TAB};

/// Longest stretch of undecoded source shown in error messages
const REMAINDER_PREVIEW: usize = 32;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unrecognized instruction at token {position}: {}", preview(.remainder))]
    UnrecognizedInstruction { position: usize, remainder: Vec<u8> },
    #[error("operand of `{command}` at token {position} is not terminated by a line feed")]
    UnterminatedOperand {
        position: usize,
        command: &'static str,
    },
    #[error("operand of `{command}` at token {position} does not fit in 64 bits")]
    OperandOverflow {
        position: usize,
        command: &'static str,
    },
    #[error("failed to open file {}, details: {source}", .path.display())]
    FileOpen { path: PathBuf, source: io::Error },
    #[error("failed to memory map file {}, details: {source}", .path.display())]
    MemoryMap { path: PathBuf, source: io::Error },
    #[error("failed to read source, details: {0}")]
    Read(#[from] io::Error),
}

fn preview(remainder: &[u8]) -> String {
    let shown = &remainder[..remainder.len().min(REMAINDER_PREVIEW)];
    let text = format!("{:?}", String::from_utf8_lossy(shown));
    if remainder.len() > REMAINDER_PREVIEW {
        format!("{}...", text)
    } else {
        text
    }
}

/// Raw program text, either memory mapped from disk or held in memory
#[derive(Debug)]
pub enum Source {
    #[cfg(not(target_arch = "wasm32"))]
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl Source {
    /// Memory maps the source file at `path`
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Source, ParseError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ParseError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let len = file
            .metadata()
            .map_err(|source| ParseError::FileOpen {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        // mapping a zero-length file fails on most platforms
        if len == 0 {
            return Ok(Source::Buffered(vec![]));
        }
        let source = unsafe { Mmap::map(&file) }.map_err(|source| ParseError::MemoryMap {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = source.len(), "mapped source file");

        Ok(Source::Mapped(source))
    }

    /// Reads `reader` to its end
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Source, ParseError> {
        let mut buf = vec![];
        reader.read_to_end(&mut buf)?;
        debug!(bytes = buf.len(), "read source from stream");

        Ok(Source::Buffered(buf))
    }
}

impl From<Vec<u8>> for Source {
    fn from(buf: Vec<u8>) -> Self {
        Source::Buffered(buf)
    }
}

impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Source::Buffered(text.as_bytes().to_vec())
    }
}

impl Deref for Source {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            #[cfg(not(target_arch = "wasm32"))]
            Source::Mapped(map) => map,
            Source::Buffered(buf) => buf,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub(crate) enum ImpKind {
    Stack,
    Arithmetic,
    Heap,
    Flow,
    IO,
}

/// Decodes whitespace source into instructions.
///
/// Every byte that is not a space, tab or line feed is dropped before decoding starts, so the
/// instruction set is a prefix-free code over the three remaining tokens: an instruction
/// modification parameter (IMP) selects the group, the following tokens select the command.
#[derive(Debug)]
pub struct Parser {
    tokens: Vec<u8>,
    token_index: usize,
    failed: bool,
}

impl Parser {
    pub fn new(source: &[u8]) -> Parser {
        let tokens: Vec<u8> = source
            .iter()
            .copied()
            .filter(|token| matches!(*token, SPACE | TAB | LINE_FEED))
            .collect();

        Parser {
            tokens,
            token_index: 0,
            failed: false,
        }
    }

    /// Decodes the whole source, stopping at the first error
    pub fn parse(self) -> Result<Vec<Instruction>, ParseError> {
        let instructions = self.collect::<Result<Vec<_>, _>>()?;
        debug!(count = instructions.len(), "decoded instructions");

        Ok(instructions)
    }

    fn next_token(&mut self) -> Option<u8> {
        let token = self.tokens.get(self.token_index).copied()?;
        self.token_index += 1;

        Some(token)
    }

    fn unrecognized(&self, start: usize) -> ParseError {
        ParseError::UnrecognizedInstruction {
            position: start,
            remainder: self.tokens[start..].to_vec(),
        }
    }

    fn imp(&mut self) -> Option<ImpKind> {
        match self.next_token()? {
            SPACE => Some(ImpKind::Stack),
            TAB => match self.next_token()? {
                SPACE => Some(ImpKind::Arithmetic),
                TAB => Some(ImpKind::Heap),
                _ => Some(ImpKind::IO),
            },
            _ => Some(ImpKind::Flow),
        }
    }

    // Commands carrying an operand come back with a zero placeholder that `operand` replaces.

    fn stack(&mut self) -> Option<Instruction> {
        match self.next_token()? {
            SPACE => Some(Instruction::PushStack(0)),
            TAB => match self.next_token()? {
                SPACE => Some(Instruction::CopyNthStack(0)),
                LINE_FEED => Some(Instruction::SlideNStack(0)),
                _ => None,
            },
            _ => match self.next_token()? {
                SPACE => Some(Instruction::DuplicateStack),
                TAB => Some(Instruction::SwapStack),
                _ => Some(Instruction::DiscardStack),
            },
        }
    }

    fn arithmetic(&mut self) -> Option<Instruction> {
        match self.next_token()? {
            SPACE => match self.next_token()? {
                SPACE => Some(Instruction::Add),
                TAB => Some(Instruction::Subtract),
                _ => Some(Instruction::Multiply),
            },
            TAB => match self.next_token()? {
                SPACE => Some(Instruction::IntegerDivision),
                TAB => Some(Instruction::Modulo),
                _ => None,
            },
            _ => None,
        }
    }

    fn heap(&mut self) -> Option<Instruction> {
        match self.next_token()? {
            SPACE => Some(Instruction::StoreHeap),
            TAB => Some(Instruction::RetrieveHeap),
            _ => None,
        }
    }

    fn flow(&mut self) -> Option<Instruction> {
        let placeholder = Label(0);
        match self.next_token()? {
            SPACE => match self.next_token()? {
                SPACE => Some(Instruction::Mark(placeholder)),
                TAB => Some(Instruction::Call(placeholder)),
                _ => Some(Instruction::Jump(placeholder)),
            },
            TAB => match self.next_token()? {
                SPACE => Some(Instruction::JumpZero(placeholder)),
                TAB => Some(Instruction::JumpNegative(placeholder)),
                _ => Some(Instruction::Return),
            },
            _ => match self.next_token()? {
                LINE_FEED => Some(Instruction::Exit),
                _ => None,
            },
        }
    }

    fn io(&mut self) -> Option<Instruction> {
        match self.next_token()? {
            SPACE => match self.next_token()? {
                SPACE => Some(Instruction::OutCharacter),
                TAB => Some(Instruction::OutInteger),
                _ => None,
            },
            TAB => match self.next_token()? {
                SPACE => Some(Instruction::ReadCharacter),
                TAB => Some(Instruction::ReadInteger),
                _ => None,
            },
            _ => None,
        }
    }

    fn command(&mut self) -> Option<Instruction> {
        match self.imp()? {
            ImpKind::Stack => self.stack(),
            ImpKind::Arithmetic => self.arithmetic(),
            ImpKind::Heap => self.heap(),
            ImpKind::Flow => self.flow(),
            ImpKind::IO => self.io(),
        }
    }

    /// Folds space (0) and tab (1) digits up to the terminating line feed, most significant first
    fn bits(&mut self, start: usize, command: &'static str) -> Result<u64, ParseError> {
        let mut value: u64 = 0;
        loop {
            let bit = match self.next_token() {
                Some(SPACE) => 0,
                Some(TAB) => 1,
                Some(_) => return Ok(value),
                None => {
                    return Err(ParseError::UnterminatedOperand {
                        position: start,
                        command,
                    })
                }
            };
            value = value
                .checked_mul(2)
                .and_then(|value| value.checked_add(bit))
                .ok_or(ParseError::OperandOverflow {
                    position: start,
                    command,
                })?;
        }
    }

    /// Sign flag (tab is negative) followed by the magnitude
    fn number(&mut self, start: usize, command: &'static str) -> Result<i64, ParseError> {
        let negative = match self.next_token() {
            Some(SPACE) => false,
            Some(TAB) => true,
            Some(_) => return Ok(0),
            None => {
                return Err(ParseError::UnterminatedOperand {
                    position: start,
                    command,
                })
            }
        };
        let magnitude = i64::try_from(self.bits(start, command)?).map_err(|_| {
            ParseError::OperandOverflow {
                position: start,
                command,
            }
        })?;

        Ok(if negative { -magnitude } else { magnitude })
    }

    fn label(&mut self, start: usize, command: &'static str) -> Result<Label, ParseError> {
        Ok(Label(self.bits(start, command)?))
    }

    fn operand(&mut self, start: usize, instr: Instruction) -> Result<Instruction, ParseError> {
        let command = instr.mnemonic();
        Ok(match instr {
            Instruction::PushStack(_) => Instruction::PushStack(self.number(start, command)?),
            Instruction::CopyNthStack(_) => Instruction::CopyNthStack(self.number(start, command)?),
            Instruction::SlideNStack(_) => Instruction::SlideNStack(self.number(start, command)?),
            Instruction::Mark(_) => Instruction::Mark(self.label(start, command)?),
            Instruction::Call(_) => Instruction::Call(self.label(start, command)?),
            Instruction::Jump(_) => Instruction::Jump(self.label(start, command)?),
            Instruction::JumpZero(_) => Instruction::JumpZero(self.label(start, command)?),
            Instruction::JumpNegative(_) => Instruction::JumpNegative(self.label(start, command)?),
            other => other,
        })
    }

    fn instruction(&mut self) -> Result<Option<Instruction>, ParseError> {
        let start = self.token_index;
        if start >= self.tokens.len() {
            return Ok(None);
        }
        let instr = self.command().ok_or_else(|| self.unrecognized(start))?;

        self.operand(start, instr).map(Some)
    }
}

impl Iterator for Parser {
    type Item = Result<Instruction, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let res = self.instruction().transpose();
        if let Some(Err(_)) = res {
            self.failed = true;
        }

        res
    }
}
