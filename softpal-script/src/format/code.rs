use std::{fs, path::Path};

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, ScriptError};

/// The compiled script (`SCRIPT.SRC`), patched in place by offset.
#[derive(Debug, Clone)]
pub struct CodeImage {
    bytes: Vec<u8>,
}

impl CodeImage {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScriptError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(Self::from_bytes(fs::read(path)?))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        if offset.checked_add(len).map_or(true, |end| end > self.bytes.len()) {
            return Err(ScriptError::format(
                offset,
                format!("{len} byte access past end of code (size 0x{:X})", self.bytes.len()),
            ));
        }
        Ok(())
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        self.check(offset, 2)?;
        Ok(LittleEndian::read_u16(&self.bytes[offset..]))
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        self.check(offset, 4)?;
        Ok(LittleEndian::read_u32(&self.bytes[offset..]))
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.check(offset, 4)?;
        LittleEndian::write_u32(&mut self.bytes[offset..], value);
        Ok(())
    }

    /// Replace a 2 byte constant only if it still holds `original`.
    ///
    /// Returns whether the patch was applied; a different value means a
    /// different engine build and the bytes are left alone.
    pub fn replace_u16(&mut self, offset: usize, original: u16, replacement: u16) -> bool {
        match self.read_u16(offset) {
            Ok(v) if v == original => {
                LittleEndian::write_u16(&mut self.bytes[offset..], replacement);
                log::debug!(
                    "replaced SCRIPT.SRC value at 0x{:X} from {} to {}",
                    offset,
                    original,
                    replacement
                );
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_replace() {
        let mut code = CodeImage::from_bytes(vec![0x10, 0x02, 0x08, 0x00]);
        assert!(code.replace_u16(0, 528, 590));
        assert_eq!(code.read_u16(0).unwrap(), 590);
        assert!(!code.replace_u16(2, 9, 12));
        assert_eq!(code.read_u16(2).unwrap(), 8);
        assert!(!code.replace_u16(3, 8, 12));
    }

    #[test]
    fn u32_access_is_bounds_checked() {
        let mut code = CodeImage::from_bytes(vec![0; 6]);
        code.write_u32(2, 0xDEADBEEF).unwrap();
        assert_eq!(code.read_u32(2).unwrap(), 0xDEADBEEF);
        assert!(code.read_u32(3).is_err());
        assert!(code.write_u32(usize::MAX, 1).is_err());
    }
}
