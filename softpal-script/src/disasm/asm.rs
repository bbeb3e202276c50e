use crate::consts::CODE_OFFSET;

use super::opcode::{Opcode, OperandKind, TextSyscall, OPCODE_TAG};

/// Emits instruction words in the `SCRIPT.SRC` encoding.
///
/// Used to build code images for tests and for the `disasm` round trip checks.
/// Addresses handed out are absolute offsets into the image.
pub struct CodeBuilder {
    bytes: Vec<u8>,
}

impl Default for CodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeBuilder {
    /// Start an image with a zeroed header up to `CODE_OFFSET`.
    pub fn new() -> Self {
        Self {
            bytes: vec![0; CODE_OFFSET as usize],
        }
    }

    #[inline]
    pub fn here(&self) -> u32 {
        self.bytes.len() as u32
    }

    fn word(&mut self, w: u32) {
        self.bytes.extend_from_slice(&w.to_le_bytes());
    }

    /// Emit one instruction; returns the offset of its first operand word.
    pub fn inst(&mut self, op: Opcode, operands: &[u32]) -> u32 {
        assert_eq!(operands.len(), op.operand_count(), "{op} operand count");
        self.word(OPCODE_TAG | op as u32);
        let first = self.here();
        for &w in operands {
            self.word(w);
        }
        first
    }

    /// `push imm`; returns the offset of the pushed value.
    pub fn push(&mut self, value: u32) -> u32 {
        self.inst(Opcode::Push, &[OperandKind::Immediate(value).to_word()])
    }

    pub fn push_var(&mut self, var: OperandKind) -> u32 {
        self.inst(Opcode::Push, &[var.to_word()])
    }

    pub fn syscall(&mut self, id: u32) {
        self.inst(Opcode::Syscall, &[id]);
    }

    /// `push name; push text; syscall Message`; returns (name slot, text slot).
    pub fn message(&mut self, name_addr: Option<u32>, text_addr: u32) -> (Option<u32>, u32) {
        let name = match name_addr {
            Some(addr) => Some(self.push(addr)),
            None => {
                self.push_var(OperandKind::Global(0));
                None
            }
        };
        let text = self.push(text_addr);
        self.syscall(TextSyscall::MESSAGE_ID);
        (name, text)
    }

    /// `push name; push text; syscall BacklogAdd`; returns (name slot, text slot).
    pub fn backlog(&mut self, name_addr: u32, text_addr: u32) -> (u32, u32) {
        let name = self.push(name_addr);
        let text = self.push(text_addr);
        self.syscall(TextSyscall::BACKLOG_ADD_ID);
        (name, text)
    }

    pub fn select(&mut self, text_addr: u32) -> u32 {
        let text = self.push(text_addr);
        self.syscall(TextSyscall::SELECT_ADD_ID);
        text
    }

    pub fn jmp(&mut self, target: u32) -> u32 {
        self.inst(Opcode::Jmp, &[delta(target)])
    }

    pub fn jz(&mut self, cond: OperandKind, target: u32) -> u32 {
        self.inst(Opcode::Jz, &[cond.to_word(), delta(target)]) + 4
    }

    pub fn call(&mut self, target: u32) -> u32 {
        self.inst(Opcode::Call, &[delta(target)])
    }

    pub fn ret(&mut self) {
        self.inst(Opcode::Ret, &[]);
    }

    pub fn exit(&mut self) {
        self.inst(Opcode::Exit, &[]);
    }

    /// Overwrite a previously emitted branch target word.
    pub fn set_target(&mut self, slot: u32, target: u32) {
        let at = slot as usize;
        self.bytes[at..at + 4].copy_from_slice(&delta(target).to_le_bytes());
    }

    /// Zero-filled padding, for placing layout constants at fixed offsets.
    pub fn pad_to(&mut self, len: usize) {
        if self.bytes.len() < len {
            self.bytes.resize(len, 0);
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

fn delta(target: u32) -> u32 {
    target.wrapping_sub(CODE_OFFSET)
}
