//! Text extraction and repatching for Softpal `SCRIPT.SRC` script units.

pub mod config;
pub mod consts;
pub mod disasm;
pub mod error;
pub mod format;
pub mod script;
pub mod transform;

pub use config::PatchConfig;
pub use error::{Result, ScriptError};
pub use script::{PatchStats, Patched, ScriptString, ScriptStringType, SoftpalScript, TextOperand};
pub use transform::{FontProfiles, Softpalizer};
