//! Walks `SCRIPT.SRC` and finds the operands that point into `TEXT.DAT`.
//!
//! Instruction layout (little-endian):
//! - u32 `0x0001_0000 | opcode`
//! - `opcode.operand_count()` u32 operand words
//!
//! Text never appears inline. A text argument is an immediate `push` whose
//! value is an address into the string pool, consumed by one of the
//! [`TextSyscall`]s. The walker keeps the pushes of the current run and
//! classifies them when the syscall is reached.

mod asm;
mod opcode;

use std::collections::{HashSet, VecDeque};

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::{
    consts::CODE_OFFSET,
    error::{Result, ScriptError},
    script::{ScriptStringType, TextOperand},
};

pub use asm::CodeBuilder;
pub use opcode::{Opcode, OperandKind, TextSyscall, OPCODE_TAG};

/// One operand word and where it lives in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    pub offset: u32,
    pub word: u32,
}

impl Operand {
    #[inline]
    pub fn kind(&self) -> OperandKind {
        OperandKind::from_word(self.word)
    }
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub address: u32,
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
}

impl Instruction {
    #[inline]
    pub fn size(&self) -> u32 {
        4 + 4 * self.operands.len() as u32
    }

    #[inline]
    pub fn next(&self) -> u32 {
        self.address + self.size()
    }
}

/// Disassembly listing entry, as written by the `disasm` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inst {
    pub address: u32,
    pub mnemonic: String,
    pub operands: Vec<String>,
}

impl From<&Instruction> for Inst {
    fn from(inst: &Instruction) -> Self {
        let operands = match inst.opcode {
            Opcode::Syscall => inst
                .operands
                .iter()
                .map(|o| match TextSyscall::from_id(o.word) {
                    Some(sys) => format!("{sys:?}"),
                    None => format!("0x{:08X}", o.word),
                })
                .collect(),
            op => inst
                .operands
                .iter()
                .enumerate()
                .map(|(i, o)| match op.target_operand() {
                    Some(t) if t == i => format!("@0x{:X}", branch_target(o.word)),
                    _ => o.kind().to_string(),
                })
                .collect(),
        };
        Self {
            address: inst.address,
            mnemonic: inst.opcode.mnemonic().to_string(),
            operands,
        }
    }
}

fn branch_target(word: u32) -> i64 {
    CODE_OFFSET as i64 + word as i32 as i64
}

/// Decode the instruction at `pc`.
pub fn decode(code: &[u8], pc: u32) -> Result<Instruction> {
    let at = pc as usize;
    if at + 4 > code.len() {
        return Err(ScriptError::format(at, "truncated instruction word"));
    }
    let word = LittleEndian::read_u32(&code[at..]);
    if word & 0xFFFF_0000 != OPCODE_TAG {
        return Err(ScriptError::format(at, format!("invalid instruction word 0x{word:08X}")));
    }
    let opcode = Opcode::try_from(word as u16)
        .map_err(|_| ScriptError::format(at, format!("unknown opcode 0x{:02X}", word & 0xFFFF)))?;

    let count = opcode.operand_count();
    let end = at + 4 + 4 * count;
    if end > code.len() {
        return Err(ScriptError::format(at, format!("{opcode} operands run past end of code")));
    }
    let operands = (0..count)
        .map(|i| {
            let offset = at + 4 + 4 * i;
            Operand {
                offset: offset as u32,
                word: LittleEndian::read_u32(&code[offset..]),
            }
        })
        .collect();

    Ok(Instruction {
        address: pc,
        opcode,
        operands,
    })
}

/// Result of one walk over the code.
#[derive(Debug, Default)]
pub struct Disassembly {
    /// Text operands in traversal order.
    pub operands: Vec<TextOperand>,
    /// Decoded instructions sorted by address; empty unless requested.
    pub listing: Vec<Inst>,
}

pub struct Disassembler<'a> {
    code: &'a [u8],
    queue: VecDeque<u32>,
    visited: HashSet<u32>,
    /// Pushes seen since the last call boundary in the current run.
    pushes: Vec<Operand>,
    operands: Vec<TextOperand>,
    listing: Option<Vec<Inst>>,
}

impl<'a> Disassembler<'a> {
    /// Seed the work-list with the code start followed by `labels` in order.
    pub fn new(code: &'a [u8], labels: &[u32]) -> Self {
        let mut queue = VecDeque::with_capacity(labels.len() + 1);
        queue.push_back(CODE_OFFSET);
        queue.extend(labels.iter().copied());
        Self {
            code,
            queue,
            visited: HashSet::new(),
            pushes: Vec::new(),
            operands: Vec::new(),
            listing: None,
        }
    }

    pub fn with_listing(mut self) -> Self {
        self.listing = Some(Vec::new());
        self
    }

    pub fn run(mut self) -> Result<Disassembly> {
        while let Some(start) = self.queue.pop_front() {
            if start as usize > self.code.len() || start < CODE_OFFSET {
                return Err(ScriptError::format(
                    start as usize,
                    format!("label outside code section (size 0x{:X})", self.code.len()),
                ));
            }
            self.walk(start)?;
        }

        let mut listing = self.listing.unwrap_or_default();
        listing.sort_by_key(|i| i.address);
        log::debug!(
            "disassembled {} instructions, {} text operands",
            self.visited.len(),
            self.operands.len()
        );
        Ok(Disassembly {
            operands: self.operands,
            listing,
        })
    }

    /// Follow straight-line code from `start` until control leaves it.
    fn walk(&mut self, start: u32) -> Result<()> {
        self.pushes.clear();
        let mut pc = start;
        while (pc as usize) < self.code.len() {
            if !self.visited.insert(pc) {
                break;
            }
            let inst = decode(self.code, pc)?;
            if let Some(listing) = self.listing.as_mut() {
                listing.push(Inst::from(&inst));
            }

            if let Some(t) = inst.opcode.target_operand() {
                self.enqueue(&inst, inst.operands[t])?;
            }
            match inst.opcode {
                Opcode::Push => self.pushes.push(inst.operands[0]),
                Opcode::Pop => {
                    self.pushes.pop();
                }
                Opcode::Syscall => {
                    self.syscall(&inst);
                    self.pushes.clear();
                }
                Opcode::Call => self.pushes.clear(),
                _ => {}
            }

            if inst.opcode.ends_run() {
                break;
            }
            pc = inst.next();
        }
        Ok(())
    }

    fn enqueue(&mut self, inst: &Instruction, target: Operand) -> Result<()> {
        let to = branch_target(target.word);
        if to < CODE_OFFSET as i64 || to > self.code.len() as i64 {
            return Err(ScriptError::format(
                inst.address as usize,
                format!("{} target 0x{:X} outside code section", inst.opcode, to),
            ));
        }
        let to = to as u32;
        if !self.visited.contains(&to) {
            self.queue.push_back(to);
        }
        Ok(())
    }

    fn syscall(&mut self, inst: &Instruction) {
        let Some(sys) = TextSyscall::from_id(inst.operands[0].word) else {
            return;
        };
        let params = sys.arguments();
        if self.pushes.len() < params.len() {
            log::warn!(
                "{:?} at 0x{:X} has {} pushed arguments, expected {}",
                sys,
                inst.address,
                self.pushes.len(),
                params.len()
            );
            return;
        }

        let args = &self.pushes[self.pushes.len() - params.len()..];
        for (arg, &ty) in args.iter().zip(params) {
            match arg.kind() {
                OperandKind::Immediate(_) => self.operands.push(TextOperand {
                    offset: arg.offset,
                    ty,
                }),
                // narration: the speaker slot holds a variable, not a name
                _ if matches!(ty, ScriptStringType::CharacterName | ScriptStringType::LogCharacterName) => {}
                kind => log::debug!(
                    "{:?} argument at 0x{:X} is {}, not a text address",
                    sys,
                    arg.offset,
                    kind
                ),
            }
        }
    }
}

/// Collect the text operands of `code`, seeding the walk with `labels`.
pub fn disassemble(code: &[u8], labels: &[u32]) -> Result<Vec<TextOperand>> {
    Ok(Disassembler::new(code, labels).run()?.operands)
}

/// Same walk as [`disassemble`], also keeping every decoded instruction.
pub fn disassemble_listing(code: &[u8], labels: &[u32]) -> Result<Disassembly> {
    Disassembler::new(code, labels).with_listing().run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::script::ScriptStringType::*;

    fn types(ops: &[TextOperand]) -> Vec<ScriptStringType> {
        ops.iter().map(|o| o.ty).collect()
    }

    #[test]
    fn message_reports_name_then_text() {
        let mut b = CodeBuilder::new();
        let (name, text) = b.message(Some(0x10), 0x20);
        b.exit();
        let code = b.finish();

        let ops = disassemble(&code, &[]).unwrap();
        assert_eq!(
            ops,
            vec![
                TextOperand { offset: name.unwrap(), ty: CharacterName },
                TextOperand { offset: text, ty: DialogueMessage },
            ]
        );
        assert_eq!(LittleEndian::read_u32(&code[text as usize..]), 0x20);
    }

    #[test]
    fn narration_has_no_name_operand() {
        let mut b = CodeBuilder::new();
        b.message(None, 0x20);
        b.exit();
        let ops = disassemble(&b.finish(), &[]).unwrap();
        assert_eq!(types(&ops), vec![DialogueMessage]);
    }

    #[test]
    fn unrelated_pushes_and_syscalls_are_ignored() {
        let mut b = CodeBuilder::new();
        b.push(5);
        b.push(6);
        b.syscall(0x0003_0001);
        b.inst(Opcode::Mov, &[OperandKind::Global(1).to_word(), 0x30]);
        b.select(0x40);
        b.ret();
        let ops = disassemble(&b.finish(), &[]).unwrap();
        assert_eq!(types(&ops), vec![SelectionChoice]);
    }

    #[test]
    fn walk_follows_labels_and_branches_once() {
        let mut b = CodeBuilder::new();
        // entry: jump over a block only reachable through a label
        let jmp_slot = b.jmp(0);
        let hidden = b.here();
        b.message(Some(1), 2);
        b.ret();
        let main = b.here();
        b.set_target(jmp_slot, main);
        let call_slot = b.call(0);
        b.backlog(3, 4);
        b.exit();
        let sub = b.here();
        b.set_target(call_slot, sub);
        b.select(5);
        b.ret();
        let code = b.finish();

        // branch targets are walked after the labels
        let ops = disassemble(&code, &[hidden, main]).unwrap();
        assert_eq!(
            types(&ops),
            vec![CharacterName, DialogueMessage, LogCharacterName, LogMessage, SelectionChoice]
        );

        // without the label, the hidden block is never reached
        let ops = disassemble(&code, &[]).unwrap();
        assert_eq!(types(&ops), vec![LogCharacterName, LogMessage, SelectionChoice]);
    }

    #[test]
    fn loops_terminate() {
        let mut b = CodeBuilder::new();
        let top = b.here();
        b.select(1);
        b.jz(OperandKind::Global(2), top);
        b.jmp(top);
        let ops = disassemble(&b.finish(), &[top, top]).unwrap();
        assert_eq!(types(&ops), vec![SelectionChoice]);
    }

    #[test]
    fn out_of_range_text_address_is_reported_as_is() {
        let mut b = CodeBuilder::new();
        let slot = b.select(0xFFFF_0000);
        b.exit();
        let ops = disassemble(&b.finish(), &[]).unwrap();
        assert_eq!(ops, vec![TextOperand { offset: slot, ty: SelectionChoice }]);
    }

    #[test]
    fn malformed_code_is_a_format_error() {
        let mut code = CodeBuilder::new().finish();
        code.extend_from_slice(&0x0002_0001u32.to_le_bytes());
        assert!(matches!(disassemble(&code, &[]), Err(ScriptError::Format { offset: 0xC, .. })));

        let mut code = CodeBuilder::new().finish();
        code.extend_from_slice(&(OPCODE_TAG | 0x1D).to_le_bytes());
        assert!(matches!(disassemble(&code, &[]), Err(ScriptError::Format { .. })));

        let mut b = CodeBuilder::new();
        b.push(1);
        let mut code = b.finish();
        code.truncate(code.len() - 2);
        assert!(matches!(disassemble(&code, &[]), Err(ScriptError::Format { .. })));
    }

    #[test]
    fn branch_outside_code_is_rejected() {
        let mut b = CodeBuilder::new();
        b.jmp(0x1000);
        assert!(matches!(disassemble(&b.finish(), &[]), Err(ScriptError::Format { .. })));
    }

    #[test]
    fn listing_is_sorted_by_address() {
        let mut b = CodeBuilder::new();
        let j = b.jmp(0);
        let second = b.here();
        b.ret();
        let first = b.here();
        b.set_target(j, first);
        b.select(7);
        b.jmp(second);
        let code = b.finish();

        let dis = Disassembler::new(&code, &[]).with_listing().run().unwrap();
        let addrs: Vec<u32> = dis.listing.iter().map(|i| i.address).collect();
        let mut sorted = addrs.clone();
        sorted.sort();
        assert_eq!(addrs, sorted);
        // jmp, push, syscall, jmp, ret
        assert_eq!(dis.listing.len(), 5);
        assert!(dis.listing.iter().any(|i| i.operands == vec!["SelectAdd".to_string()]));
    }
}
