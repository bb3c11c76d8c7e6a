//! Stack-oriented RPL calculator engine core.
//!
//! The engine parses a textual surface syntax into packed tagged objects,
//! stores them in a single contiguous arena, evaluates them on a data
//! stack and reclaims unreachable temporaries with a compacting collector
//! that rewrites live references in place. Input, display and persistence
//! are external collaborators behind a narrow interface: `parse`,
//! `evaluate`/`execute`, direct stack access, the key FIFO and the
//! settings record.

pub mod command;
pub mod complex;
pub mod keyboard;
pub mod leb128;
pub mod list;
pub mod number;
pub mod object;
pub mod parser;
pub mod renderer;
pub mod runtime;
pub mod settings;
pub mod text;

use thiserror::Error;

pub use keyboard::{Key, KeyFifo};
pub use object::{Id, ObjRef};
pub use parser::parse;
pub use renderer::{render_to_string, Renderer};
pub use runtime::{Runtime, Safe, REDZONE};
pub use settings::{AngleMode, CommandFormat, DisplayMode, Settings};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Everything the engine can fail with.
///
/// Failures travel on two channels: the `Err` return and the runtime's
/// error slot, which keeps the display message until the user clears it.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Too few arguments")]
    TooFewArguments,
    #[error("Insufficient stack depth")]
    InsufficientStackDepth,
    #[error("Bad argument type")]
    BadArgumentType,
    #[error("Bad argument value")]
    BadArgumentValue,
    #[error("Syntax error at byte {0}")]
    Syntax(usize),
    #[error("Interrupted")]
    Interrupted,
    #[error("Division by zero")]
    DivideByZero,
    #[error("Undefined result")]
    UndefinedResult,
    #[error("Overflow")]
    Overflow,
    #[error("Cannot return without a caller")]
    CannotReturn,
    #[error("Undefined name '{0}'")]
    UndefinedName(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings error: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Parse and execute one line of input against the runtime.
///
/// This is the shape of the key handler's ENTER path: the whole line
/// becomes a program which is then executed, leaving results on the
/// stack.
pub fn run_line(rt: &mut Runtime, line: &str) -> Result<()> {
    let program = parser::parse(rt, line)?;
    object::execute(rt, program)
}
