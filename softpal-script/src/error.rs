use std::path::PathBuf;

use crate::script::ScriptStringType;

#[derive(thiserror::Error, Debug)]
pub enum ScriptError {
    #[error("required file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("bad magic in {what}: expected {expected:?}, got {got:?}")]
    BadMagic {
        what: &'static str,
        expected: String,
        got: String,
    },

    #[error("malformed input at 0x{offset:X}: {msg}")]
    Format { offset: usize, msg: String },

    #[error(
        "string type mismatch at iteration #{iteration} (operand offset 0x{offset:X}): \
         expected {expected:?}, got {actual:?}, text={text}"
    )]
    TypeMismatch {
        iteration: usize,
        offset: u32,
        expected: ScriptStringType,
        actual: ScriptStringType,
        text: String,
    },

    #[error("not enough lines in translation (ran out at iteration #{iteration})")]
    Underrun { iteration: usize },

    #[error("too many lines in translation")]
    Overrun,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScriptError {
    pub(crate) fn format(offset: usize, msg: impl Into<String>) -> Self {
        ScriptError::Format {
            offset,
            msg: msg.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScriptError>;
