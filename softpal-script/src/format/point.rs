use std::{fs, path::Path};

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    consts::{CODE_OFFSET, POINT_MAGIC},
    error::{Result, ScriptError},
};

/// Read `POINT.DAT` and return the label offsets into `SCRIPT.SRC`.
pub fn read_label_offsets(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ScriptError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = fs::read(path)?;
    parse_label_offsets(&bytes)
}

/// Layout (little-endian):
/// - 0x00: `$POINT_LIST_****`
/// - 0x10..EOF: i32 delta from the code base, one per label
///
/// The table is written back to front, so the result is reversed.
pub fn parse_label_offsets(bytes: &[u8]) -> Result<Vec<u32>> {
    let magic_len = POINT_MAGIC.len();
    if bytes.len() < magic_len || &bytes[..magic_len] != POINT_MAGIC {
        let got = &bytes[..bytes.len().min(magic_len)];
        return Err(ScriptError::BadMagic {
            what: "POINT.DAT",
            expected: String::from_utf8_lossy(POINT_MAGIC).into_owned(),
            got: String::from_utf8_lossy(got).into_owned(),
        });
    }

    let body = &bytes[magic_len..];
    if body.len() % 4 != 0 {
        return Err(ScriptError::format(
            magic_len + body.len() / 4 * 4,
            "trailing bytes after the last label delta",
        ));
    }

    let mut labels = Vec::with_capacity(body.len() / 4);
    for (i, chunk) in body.chunks_exact(4).enumerate() {
        let delta = LittleEndian::read_i32(chunk);
        let offset = (CODE_OFFSET as i64) + delta as i64;
        if !(0..=u32::MAX as i64).contains(&offset) {
            return Err(ScriptError::format(
                magic_len + i * 4,
                format!("label delta {delta} points outside the code file"),
            ));
        }
        labels.push(offset as u32);
    }
    labels.reverse();
    Ok(labels)
}
