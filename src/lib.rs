//! A whitespace interpreter.
//!
//! Source text is decoded into [`Instruction`]s by the [`Parser`] and executed by the [`Vm`], a
//! stack machine with a sparse heap, a call stack and label based control flow. Input and output
//! streams are passed in explicitly, nothing touches the process' standard streams.

pub mod ir;
pub mod parser;
pub mod vm;
pub mod wasm;

use std::io::{BufRead, Write};
use thiserror::Error;

pub use ir::{Instruction, Label};
pub use parser::{ParseError, Parser, Source};
pub use vm::{Vm, VmError, VmErrorKind};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Vm(#[from] VmError),
}

/// Decodes `source` and runs it to completion
pub fn interpret<R: BufRead, W: Write>(
    source: &[u8],
    input: &mut R,
    output: &mut W,
) -> Result<(), Error> {
    let mut vm = Vm::from_source(source)?;
    vm.run(input, output)?;

    Ok(())
}
