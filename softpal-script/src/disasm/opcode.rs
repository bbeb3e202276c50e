use std::fmt;

use crate::script::ScriptStringType;

/// High half of every instruction word.
pub const OPCODE_TAG: u32 = 0x0001_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Mov = 0x01,
    Add = 0x02,
    Sub = 0x03,
    Mul = 0x04,
    Div = 0x05,
    Mod = 0x06,
    And = 0x07,
    Or = 0x08,
    Xor = 0x09,
    Not = 0x0A,
    Shl = 0x0B,
    Shr = 0x0C,
    Eq = 0x0D,
    Ne = 0x0E,
    Gt = 0x0F,
    Ge = 0x10,
    Lt = 0x11,
    Le = 0x12,
    LAnd = 0x13,
    LOr = 0x14,
    Jmp = 0x15,
    Jz = 0x16,
    Call = 0x17,
    Syscall = 0x18,
    Ret = 0x19,
    Exit = 0x1A,
    Nop = 0x1B,
    /// Source line marker left in by the compiler.
    Line = 0x1C,
    Push = 0x1F,
    Pop = 0x20,
}

impl Opcode {
    /// Number of u32 operand words following the instruction word.
    pub fn operand_count(self) -> usize {
        match self {
            Opcode::Ret | Opcode::Exit | Opcode::Nop => 0,
            Opcode::Not
            | Opcode::Jmp
            | Opcode::Call
            | Opcode::Syscall
            | Opcode::Line
            | Opcode::Push
            | Opcode::Pop => 1,
            Opcode::Mov
            | Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Shl
            | Opcode::Shr
            | Opcode::Jz => 2,
            Opcode::Eq
            | Opcode::Ne
            | Opcode::Gt
            | Opcode::Ge
            | Opcode::Lt
            | Opcode::Le
            | Opcode::LAnd
            | Opcode::LOr => 3,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Mov => "mov",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Mod => "mod",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Not => "not",
            Opcode::Shl => "shl",
            Opcode::Shr => "shr",
            Opcode::Eq => "eq",
            Opcode::Ne => "ne",
            Opcode::Gt => "gt",
            Opcode::Ge => "ge",
            Opcode::Lt => "lt",
            Opcode::Le => "le",
            Opcode::LAnd => "land",
            Opcode::LOr => "lor",
            Opcode::Jmp => "jmp",
            Opcode::Jz => "jz",
            Opcode::Call => "call",
            Opcode::Syscall => "syscall",
            Opcode::Ret => "ret",
            Opcode::Exit => "exit",
            Opcode::Nop => "nop",
            Opcode::Line => "line",
            Opcode::Push => "push",
            Opcode::Pop => "pop",
        }
    }

    /// Index of the operand holding a branch target, if any.
    pub fn target_operand(self) -> Option<usize> {
        match self {
            Opcode::Jmp | Opcode::Call => Some(0),
            Opcode::Jz => Some(1),
            _ => None,
        }
    }

    /// Control never falls through to the next instruction.
    pub fn ends_run(self) -> bool {
        matches!(self, Opcode::Jmp | Opcode::Ret | Opcode::Exit)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl TryFrom<u16> for Opcode {
    type Error = ();

    fn try_from(v: u16) -> core::result::Result<Self, Self::Error> {
        match v {
            x if x == Opcode::Mov as u16 => Ok(Opcode::Mov),
            x if x == Opcode::Add as u16 => Ok(Opcode::Add),
            x if x == Opcode::Sub as u16 => Ok(Opcode::Sub),
            x if x == Opcode::Mul as u16 => Ok(Opcode::Mul),
            x if x == Opcode::Div as u16 => Ok(Opcode::Div),
            x if x == Opcode::Mod as u16 => Ok(Opcode::Mod),
            x if x == Opcode::And as u16 => Ok(Opcode::And),
            x if x == Opcode::Or as u16 => Ok(Opcode::Or),
            x if x == Opcode::Xor as u16 => Ok(Opcode::Xor),
            x if x == Opcode::Not as u16 => Ok(Opcode::Not),
            x if x == Opcode::Shl as u16 => Ok(Opcode::Shl),
            x if x == Opcode::Shr as u16 => Ok(Opcode::Shr),
            x if x == Opcode::Eq as u16 => Ok(Opcode::Eq),
            x if x == Opcode::Ne as u16 => Ok(Opcode::Ne),
            x if x == Opcode::Gt as u16 => Ok(Opcode::Gt),
            x if x == Opcode::Ge as u16 => Ok(Opcode::Ge),
            x if x == Opcode::Lt as u16 => Ok(Opcode::Lt),
            x if x == Opcode::Le as u16 => Ok(Opcode::Le),
            x if x == Opcode::LAnd as u16 => Ok(Opcode::LAnd),
            x if x == Opcode::LOr as u16 => Ok(Opcode::LOr),
            x if x == Opcode::Jmp as u16 => Ok(Opcode::Jmp),
            x if x == Opcode::Jz as u16 => Ok(Opcode::Jz),
            x if x == Opcode::Call as u16 => Ok(Opcode::Call),
            x if x == Opcode::Syscall as u16 => Ok(Opcode::Syscall),
            x if x == Opcode::Ret as u16 => Ok(Opcode::Ret),
            x if x == Opcode::Exit as u16 => Ok(Opcode::Exit),
            x if x == Opcode::Nop as u16 => Ok(Opcode::Nop),
            x if x == Opcode::Line as u16 => Ok(Opcode::Line),
            x if x == Opcode::Push as u16 => Ok(Opcode::Push),
            x if x == Opcode::Pop as u16 => Ok(Opcode::Pop),
            _ => Err(()),
        }
    }
}

/// Decoded operand word. The top nibble selects the addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Immediate(u32),
    Global(u32),
    Local(u32),
}

impl OperandKind {
    const INDEX_MASK: u32 = 0x0FFF_FFFF;

    pub fn from_word(word: u32) -> Self {
        match word >> 28 {
            0x4 => OperandKind::Global(word & Self::INDEX_MASK),
            0x2 => OperandKind::Local(word & Self::INDEX_MASK),
            _ => OperandKind::Immediate(word),
        }
    }

    pub fn to_word(self) -> u32 {
        match self {
            OperandKind::Immediate(v) => v,
            OperandKind::Global(i) => 0x4000_0000 | (i & Self::INDEX_MASK),
            OperandKind::Local(i) => 0x2000_0000 | (i & Self::INDEX_MASK),
        }
    }
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandKind::Immediate(v) => write!(f, "0x{v:X}"),
            OperandKind::Global(i) => write!(f, "g[{i}]"),
            OperandKind::Local(i) => write!(f, "l[{i}]"),
        }
    }
}

/// Engine services whose arguments reference `TEXT.DAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSyscall {
    /// Show a line in the message window: (name, text).
    Message,
    /// Record a line in the backlog only: (name, text).
    BacklogAdd,
    /// Add an entry to the choice menu: (text).
    SelectAdd,
}

impl TextSyscall {
    pub const MESSAGE_ID: u32 = 0x0002_0002;
    pub const BACKLOG_ADD_ID: u32 = 0x0002_000F;
    pub const SELECT_ADD_ID: u32 = 0x0006_0003;

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            Self::MESSAGE_ID => Some(TextSyscall::Message),
            Self::BACKLOG_ADD_ID => Some(TextSyscall::BacklogAdd),
            Self::SELECT_ADD_ID => Some(TextSyscall::SelectAdd),
            _ => None,
        }
    }

    pub fn id(self) -> u32 {
        match self {
            TextSyscall::Message => Self::MESSAGE_ID,
            TextSyscall::BacklogAdd => Self::BACKLOG_ADD_ID,
            TextSyscall::SelectAdd => Self::SELECT_ADD_ID,
        }
    }

    /// String type of each argument, in push order.
    pub fn arguments(self) -> &'static [ScriptStringType] {
        match self {
            TextSyscall::Message => &[ScriptStringType::CharacterName, ScriptStringType::DialogueMessage],
            TextSyscall::BacklogAdd => &[ScriptStringType::LogCharacterName, ScriptStringType::LogMessage],
            TextSyscall::SelectAdd => &[ScriptStringType::SelectionChoice],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_roundtrips_through_u16() {
        for raw in 0u16..0x40 {
            if let Ok(op) = Opcode::try_from(raw) {
                assert_eq!(op as u16, raw, "{op}");
            }
        }
        assert!(Opcode::try_from(0x1D).is_err());
    }

    #[test]
    fn operand_kinds() {
        assert_eq!(OperandKind::from_word(0x1234), OperandKind::Immediate(0x1234));
        assert_eq!(OperandKind::from_word(0xFFFF_FFFF), OperandKind::Immediate(0xFFFF_FFFF));
        assert_eq!(OperandKind::from_word(0x4000_0007), OperandKind::Global(7));
        assert_eq!(OperandKind::from_word(0x2000_0003), OperandKind::Local(3));
        assert_eq!(OperandKind::Global(7).to_word(), 0x4000_0007);
    }
}
