use std::{fs, path::Path};

use softpal_nls::{Decoder, TextDecoder};

use crate::{
    consts::{TEXT_ENTRY_HEADER, TEXT_NOT_ENCRYPTED},
    error::{Result, ScriptError},
};

/// The string pool from `TEXT.DAT`.
///
/// Every entry is a 4 byte index field followed by a NUL-terminated cp932
/// string; code refers to entries by the offset of the index field. The pool
/// only grows: existing bytes are never rewritten once loaded, so addresses
/// handed out earlier stay valid for the lifetime of the pool.
#[derive(Debug, Clone)]
pub struct TextPool {
    bytes: Vec<u8>,
}

impl TextPool {
    /// Load `TEXT.DAT`, forcing the encryption flag off.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScriptError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(Self::from_bytes(fs::read(path)?))
    }

    pub fn from_bytes(mut bytes: Vec<u8>) -> Self {
        match bytes.first_mut() {
            Some(flag) => *flag = TEXT_NOT_ENCRYPTED,
            None => bytes.push(TEXT_NOT_ENCRYPTED),
        }
        Self { bytes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Decode the entry whose index field starts at `address`.
    pub fn read_str(&self, address: u32, nls: &Decoder) -> Result<String> {
        let start = address as usize + TEXT_ENTRY_HEADER as usize;
        if start > self.bytes.len() {
            return Err(ScriptError::format(
                address as usize,
                format!("text address beyond TEXT.DAT (size 0x{:X})", self.bytes.len()),
            ));
        }
        let tail = &self.bytes[start..];
        if !tail.contains(&0) {
            return Err(ScriptError::format(start, "unterminated string in TEXT.DAT"));
        }
        Ok(nls.decode_cstr(tail).into_owned())
    }

    /// Append an entry and return its address. The index field is left zero.
    pub fn append(&mut self, encoded: &[u8]) -> Result<u32> {
        let address = u32::try_from(self.bytes.len())
            .map_err(|_| ScriptError::format(self.bytes.len(), "TEXT.DAT outgrew 4 GiB"))?;
        self.bytes.extend_from_slice(&[0; TEXT_ENTRY_HEADER as usize]);
        self.bytes.extend(encoded.iter().copied().filter(|&b| b != 0));
        self.bytes.push(0);
        Ok(address)
    }

    pub fn append_str(&mut self, text: &str, nls: &Decoder) -> Result<u32> {
        let encoded = nls.encode_owned(text);
        self.append(&encoded)
    }
}
