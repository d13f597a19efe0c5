use crate::ir::{Instruction, Label};
use crate::parser::{ParseError, Parser};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Display;
use std::io::{self, BufRead, Write};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum VmErrorKind {
    #[error("stack underflow, needed {needed} value(s) but the stack holds {available}")]
    StackUnderflow { needed: usize, available: usize },
    #[error("return with an empty call stack")]
    CallStackUnderflow,
    #[error("unknown label {0}")]
    UnknownLabel(Label),
    #[error("heap address {0} was never written")]
    UnsetHeapAddress(i64),
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
    #[error("stack offset {0} is negative")]
    InvalidStackOffset(i64),
    #[error("{0} is not a unicode code point")]
    InvalidCharacter(i64),
    #[error("input is exhausted")]
    EndOfInput,
    #[error("input is not valid UTF-8")]
    InvalidInput,
    #[error("cannot read {0:?} as a number")]
    InvalidNumber(String),
    #[error("ran past the last instruction ({0}) without reaching exit")]
    MissingExit(usize),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// A fatal runtime error, together with the instruction that raised it
#[derive(Debug)]
pub struct VmError {
    kind: VmErrorKind,
    location: Option<(usize, Instruction)>,
}

impl VmError {
    pub fn kind(&self) -> &VmErrorKind {
        &self.kind
    }

    /// Index and instruction that failed, if the error is tied to one
    pub fn location(&self) -> Option<(usize, Instruction)> {
        self.location
    }
}

impl From<VmErrorKind> for VmError {
    fn from(kind: VmErrorKind) -> Self {
        VmError {
            kind,
            location: None,
        }
    }
}

impl Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some((index, instr)) => write!(f, "{} (instruction {}: `{}`)", self.kind, index, instr),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for VmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// The root component for the virtual machine
#[derive(Debug)]
pub struct Vm {
    instructions: Vec<Instruction>,
    labels: HashMap<Label, usize>,
    stack: Vec<i64>,
    call_stack: Vec<usize>,
    heap: HashMap<i64, i64>,
    instruction_pointer: usize,
    done: bool,
}

impl Vm {
    /// Creates a new virtual machine for the given program. Jump targets are resolved here, once;
    /// when a label is declared more than once the first declaration wins.
    pub fn new(instructions: Vec<Instruction>) -> Vm {
        let mut labels = HashMap::new();
        for (index, instr) in instructions.iter().enumerate() {
            if let Instruction::Mark(label) = instr {
                match labels.entry(*label) {
                    Entry::Vacant(entry) => {
                        entry.insert(index);
                    }
                    Entry::Occupied(entry) => warn!(
                        label = label.0,
                        first = *entry.get(),
                        duplicate = index,
                        "label declared more than once, jumps use the first declaration"
                    ),
                }
            }
        }
        debug!(
            instructions = instructions.len(),
            labels = labels.len(),
            "built label table"
        );

        Vm {
            instructions,
            labels,
            stack: vec![],
            call_stack: vec![],
            heap: HashMap::new(),
            instruction_pointer: 0,
            done: false,
        }
    }

    /// Decodes `source` and creates a virtual machine for it
    pub fn from_source(source: &[u8]) -> Result<Vm, ParseError> {
        Ok(Vm::new(Parser::new(source).parse()?))
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The value stack, bottom first
    pub fn stack(&self) -> &[i64] {
        &self.stack
    }

    pub fn call_stack(&self) -> &[usize] {
        &self.call_stack
    }

    pub fn heap(&self) -> &HashMap<i64, i64> {
        &self.heap
    }

    pub fn instruction_pointer(&self) -> usize {
        self.instruction_pointer
    }

    /// Whether `exit` has been executed
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Resets the runtime state without decoding the source again
    pub fn reset(&mut self) {
        self.stack.clear();
        self.call_stack.clear();
        self.heap.clear();
        self.instruction_pointer = 0;
        self.done = false;
    }

    /// Executes instructions until `exit` or the first error. Output is flushed either way.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<(), VmError> {
        let res = self.execute(input, output);
        let flushed = output.flush();
        let steps = res?;
        flushed.map_err(VmErrorKind::from)?;
        info!(steps, "program exited");

        Ok(())
    }

    fn execute<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<u64, VmError> {
        let mut steps = 0;
        while !self.done {
            self.step(input, output)?;
            steps += 1;
        }

        Ok(steps)
    }

    /// Executes the instruction at the instruction pointer. Does nothing once the program exited.
    pub fn step<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<(), VmError> {
        if self.done {
            return Ok(());
        }
        let index = self.instruction_pointer;
        let instr = *self
            .instructions
            .get(index)
            .ok_or(VmErrorKind::MissingExit(index))?;
        self.instruction_pointer += 1;

        self.exec(instr, input, output).map_err(|kind| VmError {
            kind,
            location: Some((index, instr)),
        })
    }

    fn exec<R: BufRead, W: Write>(
        &mut self,
        instr: Instruction,
        input: &mut R,
        output: &mut W,
    ) -> Result<(), VmErrorKind> {
        match instr {
            Instruction::PushStack(value) => self.stack.push(value),
            Instruction::DuplicateStack => {
                let top = self.peek(0)?;
                self.stack.push(top);
            }
            Instruction::CopyNthStack(n) => {
                let value = self.peek(offset(n)?)?;
                self.stack.push(value);
            }
            Instruction::SwapStack => {
                self.require(2)?;
                let len = self.stack.len();
                self.stack.swap(len - 1, len - 2);
            }
            Instruction::DiscardStack => {
                self.pop()?;
            }
            Instruction::SlideNStack(n) => {
                let n = offset(n)?;
                self.require(n.saturating_add(1))?;
                let top = self.pop()?;
                self.stack.truncate(self.stack.len() - n);
                self.stack.push(top);
            }
            Instruction::Add => self.arithmetic(i64::checked_add)?,
            Instruction::Subtract => self.arithmetic(i64::checked_sub)?,
            Instruction::Multiply => self.arithmetic(i64::checked_mul)?,
            Instruction::IntegerDivision => self.division(floor_div)?,
            Instruction::Modulo => self.division(floor_mod)?,
            Instruction::StoreHeap => {
                self.require(2)?;
                let value = self.pop()?;
                let address = self.pop()?;
                self.heap.insert(address, value);
            }
            Instruction::RetrieveHeap => {
                let address = self.pop()?;
                let value = self
                    .heap
                    .get(&address)
                    .copied()
                    .ok_or(VmErrorKind::UnsetHeapAddress(address))?;
                self.stack.push(value);
            }
            Instruction::Mark(_) => (),
            Instruction::Call(label) => {
                let target = self.resolve(label)?;
                self.call_stack.push(self.instruction_pointer);
                self.instruction_pointer = target;
            }
            Instruction::Jump(label) => self.instruction_pointer = self.resolve(label)?,
            Instruction::JumpZero(label) => {
                if self.pop()? == 0 {
                    self.instruction_pointer = self.resolve(label)?;
                }
            }
            Instruction::JumpNegative(label) => {
                if self.pop()? < 0 {
                    self.instruction_pointer = self.resolve(label)?;
                }
            }
            Instruction::Return => {
                self.instruction_pointer = self
                    .call_stack
                    .pop()
                    .ok_or(VmErrorKind::CallStackUnderflow)?;
            }
            Instruction::Exit => self.done = true,
            Instruction::OutCharacter => {
                let value = self.pop()?;
                let character = u32::try_from(value)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(VmErrorKind::InvalidCharacter(value))?;
                write!(output, "{}", character)?;
            }
            Instruction::OutInteger => write!(output, "{}", self.pop()?)?,
            Instruction::ReadCharacter => {
                let address = self.pop()?;
                output.flush()?;
                let character = read_char(input)?;
                self.heap.insert(address, i64::from(u32::from(character)));
            }
            Instruction::ReadInteger => {
                let address = self.pop()?;
                output.flush()?;
                let number = read_number(input)?;
                self.heap.insert(address, number);
            }
        }

        Ok(())
    }

    fn require(&self, needed: usize) -> Result<(), VmErrorKind> {
        if self.stack.len() < needed {
            return Err(VmErrorKind::StackUnderflow {
                needed,
                available: self.stack.len(),
            });
        }

        Ok(())
    }

    fn pop(&mut self) -> Result<i64, VmErrorKind> {
        self.require(1)?;
        self.stack.pop().ok_or(VmErrorKind::StackUnderflow {
            needed: 1,
            available: 0,
        })
    }

    /// Value `depth` positions below the top, 0 being the top itself
    fn peek(&self, depth: usize) -> Result<i64, VmErrorKind> {
        self.require(depth.saturating_add(1))?;

        Ok(self.stack[self.stack.len() - 1 - depth])
    }

    fn arithmetic(&mut self, op: fn(i64, i64) -> Option<i64>) -> Result<(), VmErrorKind> {
        self.require(2)?;
        let right = self.pop()?;
        let left = self.pop()?;
        self.stack.push(op(left, right).ok_or(VmErrorKind::Overflow)?);

        Ok(())
    }

    fn division(&mut self, op: fn(i64, i64) -> Option<i64>) -> Result<(), VmErrorKind> {
        self.require(2)?;
        if self.peek(0)? == 0 {
            return Err(VmErrorKind::DivisionByZero);
        }

        self.arithmetic(op)
    }

    fn resolve(&self, label: Label) -> Result<usize, VmErrorKind> {
        self.labels
            .get(&label)
            .copied()
            .ok_or(VmErrorKind::UnknownLabel(label))
    }
}

fn offset(n: i64) -> Result<usize, VmErrorKind> {
    usize::try_from(n).map_err(|_| VmErrorKind::InvalidStackOffset(n))
}

/// Quotient rounded towards negative infinity
fn floor_div(left: i64, right: i64) -> Option<i64> {
    let quotient = left.checked_div(right)?;
    if left % right != 0 && (left < 0) != (right < 0) {
        return quotient.checked_sub(1);
    }

    Some(quotient)
}

/// Remainder carrying the sign of the divisor
fn floor_mod(left: i64, right: i64) -> Option<i64> {
    let remainder = left.checked_rem(right)?;
    if remainder != 0 && (remainder < 0) != (right < 0) {
        return Some(remainder + right);
    }

    Some(remainder)
}

fn read_char<R: BufRead>(input: &mut R) -> Result<char, VmErrorKind> {
    let lead = match input.fill_buf()?.first() {
        Some(byte) => *byte,
        None => return Err(VmErrorKind::EndOfInput),
    };
    input.consume(1);
    let width = match lead {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => return Err(VmErrorKind::InvalidInput),
    };
    let mut bytes = [lead, 0, 0, 0];
    input
        .read_exact(&mut bytes[1..width])
        .map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => VmErrorKind::EndOfInput,
            _ => VmErrorKind::Io(err),
        })?;

    std::str::from_utf8(&bytes[..width])
        .ok()
        .and_then(|text| text.chars().next())
        .ok_or(VmErrorKind::InvalidInput)
}

fn read_number<R: BufRead>(input: &mut R) -> Result<i64, VmErrorKind> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(VmErrorKind::EndOfInput);
    }
    let trimmed = line.trim();

    trimmed
        .parse()
        .map_err(|_| VmErrorKind::InvalidNumber(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{Vm, VmError, VmErrorKind};
    use crate::ir::Instruction::*;
    use crate::ir::{Instruction, Label};
    use crate::parser::{ParseError, Source};
    use std::io;

    fn run_with_input(
        instructions: Vec<Instruction>,
        input: &str,
    ) -> Result<(Vm, String), VmError> {
        let mut vm = Vm::new(instructions);
        let mut output = vec![];
        vm.run(&mut input.as_bytes(), &mut output)?;

        Ok((vm, String::from_utf8(output).unwrap()))
    }

    fn run(instructions: Vec<Instruction>) -> Result<(Vm, String), VmError> {
        run_with_input(instructions, "")
    }

    fn run_err(instructions: Vec<Instruction>, input: &str) -> (VmError, String) {
        let mut vm = Vm::new(instructions);
        let mut output = vec![];
        let err = vm.run(&mut input.as_bytes(), &mut output).unwrap_err();

        (err, String::from_utf8(output).unwrap())
    }

    fn step_all(vm: &mut Vm) -> Result<(), VmError> {
        for _ in 0..vm.instructions().len() {
            vm.step(&mut io::empty(), &mut io::sink())?;
        }

        Ok(())
    }

    #[test]
    fn interpret_stack() -> Result<(), VmError> {
        let mut vm = Vm::new(vec![PushStack(5), DuplicateStack, Add]);
        step_all(&mut vm)?;
        assert_eq!(vm.stack(), &[10]);

        let (vm, _) = run(vec![
            PushStack(1),
            PushStack(2),
            PushStack(3),
            SwapStack,
            DiscardStack,
            PushStack(-1),
            Exit,
        ])?;
        assert_eq!(vm.stack(), &[1, 3, -1]);
        assert!(vm.heap().is_empty());

        Ok(())
    }

    #[test]
    fn copy_and_slide() -> Result<(), VmError> {
        let base = vec![PushStack(1), PushStack(2), PushStack(3)];

        let mut vm = Vm::new([base.clone(), vec![CopyNthStack(1)]].concat());
        step_all(&mut vm)?;
        assert_eq!(vm.stack(), &[1, 2, 3, 2]);

        let mut vm = Vm::new([base.clone(), vec![CopyNthStack(0)]].concat());
        step_all(&mut vm)?;
        assert_eq!(vm.stack(), &[1, 2, 3, 3]);

        let mut vm = Vm::new([base.clone(), vec![SlideNStack(1)]].concat());
        step_all(&mut vm)?;
        assert_eq!(vm.stack(), &[1, 3]);

        let mut vm = Vm::new([base.clone(), vec![SlideNStack(2)]].concat());
        step_all(&mut vm)?;
        assert_eq!(vm.stack(), &[3]);

        let mut vm = Vm::new([base, vec![SlideNStack(0)]].concat());
        step_all(&mut vm)?;
        assert_eq!(vm.stack(), &[1, 2, 3]);

        Ok(())
    }

    #[test]
    fn copy_and_slide_out_of_range() {
        let (err, _) = run_err(vec![PushStack(1), CopyNthStack(1), Exit], "");
        assert!(matches!(
            err.kind(),
            VmErrorKind::StackUnderflow {
                needed: 2,
                available: 1
            }
        ));

        let (err, _) = run_err(vec![PushStack(1), PushStack(2), SlideNStack(2), Exit], "");
        assert!(matches!(err.kind(), VmErrorKind::StackUnderflow { .. }));

        let (err, _) = run_err(vec![PushStack(1), CopyNthStack(-1), Exit], "");
        assert!(matches!(err.kind(), VmErrorKind::InvalidStackOffset(-1)));
    }

    #[test]
    fn interpret_arithmetic() -> Result<(), VmError> {
        let (vm, _) = run(vec![
            PushStack(7),
            PushStack(3),
            Subtract,
            PushStack(6),
            Multiply,
            PushStack(5),
            IntegerDivision,
            PushStack(3),
            Modulo,
            Exit,
        ])?;
        // ((7 - 3) * 6 / 5) % 3
        assert_eq!(vm.stack(), &[1]);

        Ok(())
    }

    #[test]
    fn division_rounds_towards_negative_infinity() -> Result<(), VmError> {
        let (vm, _) = run(vec![
            PushStack(-7),
            PushStack(2),
            IntegerDivision,
            PushStack(-7),
            PushStack(2),
            Modulo,
            PushStack(7),
            PushStack(-2),
            Modulo,
            PushStack(6),
            PushStack(-3),
            IntegerDivision,
            Exit,
        ])?;
        assert_eq!(vm.stack(), &[-4, 1, -1, -2]);

        Ok(())
    }

    #[test]
    fn division_by_zero_halts() {
        let (err, output) = run_err(
            vec![
                PushStack(1),
                OutInteger,
                PushStack(4),
                PushStack(0),
                IntegerDivision,
                PushStack(2),
                OutInteger,
                Exit,
            ],
            "",
        );
        assert!(matches!(err.kind(), VmErrorKind::DivisionByZero));
        assert_eq!(err.location(), Some((4, IntegerDivision)));
        assert_eq!(output, "1");

        let (err, _) = run_err(vec![PushStack(4), PushStack(0), Modulo, Exit], "");
        assert!(matches!(err.kind(), VmErrorKind::DivisionByZero));
    }

    #[test]
    fn arithmetic_overflow() {
        let (err, _) = run_err(vec![PushStack(i64::MAX), PushStack(1), Add, Exit], "");
        assert!(matches!(err.kind(), VmErrorKind::Overflow));

        let (err, _) = run_err(
            vec![
                PushStack(-i64::MAX),
                PushStack(1),
                Subtract,
                PushStack(-1),
                IntegerDivision,
                Exit,
            ],
            "",
        );
        assert!(matches!(err.kind(), VmErrorKind::Overflow));
    }

    #[test]
    fn interpret_heap() -> Result<(), VmError> {
        let (vm, _) = run(vec![
            PushStack(-8),
            PushStack(10),
            StoreHeap,
            PushStack(1 << 40),
            PushStack(3),
            StoreHeap,
            PushStack(-8),
            RetrieveHeap,
            PushStack(1 << 40),
            RetrieveHeap,
            Exit,
        ])?;
        assert_eq!(vm.stack(), &[10, 3]);
        assert_eq!(vm.heap().get(&-8), Some(&10));

        Ok(())
    }

    #[test]
    fn unset_heap_address() {
        let (err, _) = run_err(vec![PushStack(3), RetrieveHeap, Exit], "");
        assert!(matches!(err.kind(), VmErrorKind::UnsetHeapAddress(3)));
    }

    #[test]
    fn jump_skips_instructions() -> Result<(), VmError> {
        let (_, output) = run(vec![
            PushStack(1),
            Jump(Label(7)),
            OutInteger,
            Mark(Label(7)),
            PushStack(2),
            OutInteger,
            Exit,
        ])?;
        assert_eq!(output, "2");

        Ok(())
    }

    #[test]
    fn conditional_jumps() -> Result<(), VmError> {
        let program = |value, jump: fn(Label) -> Instruction| {
            vec![
                PushStack(value),
                jump(Label(1)),
                PushStack(0),
                OutInteger,
                Exit,
                Mark(Label(1)),
                PushStack(1),
                OutInteger,
                Exit,
            ]
        };

        assert_eq!(run(program(0, JumpZero))?.1, "1");
        assert_eq!(run(program(5, JumpZero))?.1, "0");
        assert_eq!(run(program(-5, JumpZero))?.1, "0");
        assert_eq!(run(program(-5, JumpNegative))?.1, "1");
        assert_eq!(run(program(0, JumpNegative))?.1, "0");
        assert_eq!(run(program(5, JumpNegative))?.1, "0");

        Ok(())
    }

    #[test]
    fn call_and_return() -> Result<(), VmError> {
        let (vm, output) = run(vec![
            Call(Label(2)),
            PushStack(66),
            OutCharacter,
            Exit,
            Mark(Label(2)),
            PushStack(65),
            OutCharacter,
            Return,
        ])?;
        assert_eq!(output, "AB");
        assert!(vm.call_stack().is_empty());

        Ok(())
    }

    #[test]
    fn duplicate_labels_use_first_declaration() -> Result<(), VmError> {
        let (_, output) = run(vec![
            Jump(Label(3)),
            Mark(Label(3)),
            PushStack(1),
            OutInteger,
            Exit,
            Mark(Label(3)),
            PushStack(2),
            OutInteger,
            Exit,
        ])?;
        assert_eq!(output, "1");

        Ok(())
    }

    #[test]
    fn unknown_label() {
        let (err, _) = run_err(vec![Jump(Label(9)), Exit], "");
        assert!(matches!(err.kind(), VmErrorKind::UnknownLabel(Label(9))));
        assert_eq!(
            err.to_string(),
            "unknown label 9 (instruction 0: `jump 9`)"
        );

        let (err, _) = run_err(vec![Call(Label(4)), Exit], "");
        assert!(matches!(err.kind(), VmErrorKind::UnknownLabel(Label(4))));
    }

    #[test]
    fn runtime_underflows() {
        let (err, _) = run_err(vec![Return], "");
        assert!(matches!(err.kind(), VmErrorKind::CallStackUnderflow));

        let (err, _) = run_err(vec![DiscardStack], "");
        assert!(matches!(
            err.kind(),
            VmErrorKind::StackUnderflow {
                needed: 1,
                available: 0
            }
        ));

        let (err, _) = run_err(vec![PushStack(1), Add], "");
        assert!(matches!(
            err.kind(),
            VmErrorKind::StackUnderflow {
                needed: 2,
                available: 1
            }
        ));
    }

    #[test]
    fn running_past_the_end() {
        let (err, output) = run_err(vec![PushStack(5), OutInteger], "");
        assert!(matches!(err.kind(), VmErrorKind::MissingExit(2)));
        assert_eq!(err.location(), None);
        assert_eq!(output, "5");

        let (err, _) = run_err(vec![], "");
        assert!(matches!(err.kind(), VmErrorKind::MissingExit(0)));
    }

    #[test]
    fn exit_stops_execution() -> Result<(), VmError> {
        let (vm, output) = run(vec![Exit, PushStack(1), OutInteger])?;
        assert!(vm.is_done());
        assert_eq!(vm.instruction_pointer(), 1);
        assert_eq!(output, "");

        Ok(())
    }

    #[test]
    fn interpret_io() -> Result<(), VmError> {
        let (_, output) = run(vec![PushStack(72), OutCharacter, Exit])?;
        assert_eq!(output, "H");
        let (_, output) = run(vec![PushStack(72), OutInteger, Exit])?;
        assert_eq!(output, "72");
        let (_, output) = run(vec![PushStack(0x1f600), OutCharacter, Exit])?;
        assert_eq!(output, "\u{1f600}");

        Ok(())
    }

    #[test]
    fn invalid_character() {
        let (err, _) = run_err(vec![PushStack(-1), OutCharacter, Exit], "");
        assert!(matches!(err.kind(), VmErrorKind::InvalidCharacter(-1)));
        let (err, _) = run_err(vec![PushStack(0xd800), OutCharacter, Exit], "");
        assert!(matches!(err.kind(), VmErrorKind::InvalidCharacter(0xd800)));
    }

    #[test]
    fn read_input() -> Result<(), VmError> {
        let (vm, _) = run_with_input(
            vec![
                PushStack(0),
                ReadCharacter,
                PushStack(1),
                ReadCharacter,
                PushStack(-2),
                ReadInteger,
                PushStack(3),
                ReadCharacter,
                Exit,
            ],
            "aé  -42 \nz",
        )?;
        assert_eq!(vm.heap().get(&0), Some(&('a' as i64)));
        assert_eq!(vm.heap().get(&1), Some(&('é' as i64)));
        assert_eq!(vm.heap().get(&-2), Some(&-42));
        assert_eq!(vm.heap().get(&3), Some(&('z' as i64)));

        Ok(())
    }

    #[test]
    fn read_errors() {
        let (err, _) = run_err(vec![PushStack(0), ReadCharacter, Exit], "");
        assert!(matches!(err.kind(), VmErrorKind::EndOfInput));

        let (err, _) = run_err(vec![PushStack(0), ReadInteger, Exit], "");
        assert!(matches!(err.kind(), VmErrorKind::EndOfInput));

        let (err, _) = run_err(vec![PushStack(0), ReadInteger, Exit], "twelve\n");
        assert!(matches!(err.kind(), VmErrorKind::InvalidNumber(text) if text == "twelve"));

        let mut vm = Vm::new(vec![PushStack(0), ReadCharacter, Exit]);
        let err = vm
            .run(&mut &[0xffu8][..], &mut io::sink())
            .unwrap_err();
        assert!(matches!(err.kind(), VmErrorKind::InvalidInput));
    }

    #[test]
    fn reset_restores_initial_state() -> Result<(), VmError> {
        let mut vm = Vm::new(vec![PushStack(1), PushStack(2), StoreHeap, PushStack(7), Exit]);
        vm.run(&mut io::empty(), &mut io::sink())?;
        assert_eq!(vm.stack(), &[7]);

        vm.reset();
        assert!(vm.stack().is_empty());
        assert!(vm.heap().is_empty());
        assert_eq!(vm.instruction_pointer(), 0);
        assert!(!vm.is_done());

        vm.run(&mut io::empty(), &mut io::sink())?;
        assert_eq!(vm.stack(), &[7]);

        Ok(())
    }

    #[test]
    fn hello_world() -> Result<(), Box<dyn std::error::Error>> {
        let source = Source::from_file("ws/hello_world.ws")?;
        let mut vm = Vm::from_source(&source)?;
        let mut output = vec![];
        vm.run(&mut io::empty(), &mut output)?;
        assert_eq!(String::from_utf8(output)?, "Hello, world!\n");

        Ok(())
    }

    #[test]
    fn count() -> Result<(), Box<dyn std::error::Error>> {
        let source = Source::from_file("ws/count.ws")?;
        let mut vm = Vm::from_source(&source)?;
        let mut output = vec![];
        vm.run(&mut io::empty(), &mut output)?;
        assert_eq!(
            String::from_utf8(output)?,
            "1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n"
        );

        Ok(())
    }

    #[test]
    fn factorial_reads_input() -> Result<(), Box<dyn std::error::Error>> {
        let source = Source::from_file("ws/factorial.ws")?;
        let mut vm = Vm::from_source(&source)?;
        let mut output = vec![];
        vm.run(&mut "10\n".as_bytes(), &mut output)?;
        assert_eq!(String::from_utf8(output)?, "3628800\n");

        Ok(())
    }

    #[test]
    fn from_source_reports_decode_errors() {
        assert!(matches!(
            Vm::from_source(b"\t\t\n").unwrap_err(),
            ParseError::UnrecognizedInstruction { .. }
        ));
    }
}
