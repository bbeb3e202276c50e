//! On-disk pieces of a Softpal script unit.
//!
//! - `SCRIPT.SRC`: compiled bytecode ([`CodeImage`])
//! - `POINT.DAT`: label table ([`read_label_offsets`])
//! - `TEXT.DAT`: string pool ([`TextPool`])

mod code;
mod point;
mod text;

pub use code::CodeImage;
pub use point::{parse_label_offsets, read_label_offsets};
pub use text::TextPool;

pub const CODE_FILE_NAME: &str = "SCRIPT.SRC";
pub const TEXT_FILE_NAME: &str = "TEXT.DAT";
pub const POINT_FILE_NAME: &str = "POINT.DAT";
