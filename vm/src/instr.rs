//! Bytecode opcode set.
//!
//! Each opcode is a struct variant whose fields are its decoded
//! operands. Operand conventions: `arg`/`dst`/`src` index the argument
//! vector, `reg` a context register, `global` a global-environment
//! entry, `lit` the literal pool, `level` a parent-walk count,
//! `offset` a slot offset, `prim` the primitive table, `nargs` the
//! call's argument count, `target` a program counter, and
//! `unwind`/`next`/`indirect` are behavior flags.

use serde::{Deserialize, Serialize};

/// Program counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pc {
    /// Offset into the opcode sequence of the running code object.
    pub relative: u32,
}

impl Pc {
    /// A program counter at the given offset.
    #[must_use]
    pub fn new(relative: u32) -> Self {
        Self { relative }
    }

    /// The offset as a vector index.
    #[must_use]
    pub fn index(self) -> usize {
        self.relative as usize
    }
}

impl From<u16> for Pc {
    fn from(relative: u16) -> Self {
        Self {
            relative: u32::from(relative),
        }
    }
}

impl std::fmt::Display for Pc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.relative)
    }
}

/// A decoded opcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    // -- Machine control --
    /// Stop the machine with exit code 0.
    Halt,
    /// Install a fresh child context whose parent is the current one.
    Push,
    /// Reinstate the parent context.
    Pop,
    /// Set the current call's argument count.
    Nargs {
        /// New argument count.
        n: u16,
    },
    /// Replace the argument vector with `n` no-value slots.
    Alloc {
        /// Slot count.
        n: u16,
    },
    /// `Push` followed by `Alloc`.
    PushAlloc {
        /// Slot count.
        n: u16,
    },
    /// Bind the argument vector through a template literal, extending
    /// the environment on match.
    Extend {
        /// Literal-pool index of the template.
        lit: u16,
    },
    /// Record the resume point and expected result count on the
    /// current context before it yields.
    Outstanding {
        /// Resume program counter.
        target: u16,
        /// Number of results awaited.
        count: u16,
    },
    /// Clone the current context at `target` and prepend it to the
    /// strand pool.
    Fork {
        /// Program counter for the forked strand.
        target: u16,
    },

    // -- Transmit --
    /// Transmit to the current target through the existing tag.
    Xmit {
        /// Flatten the `&rest` tail before dispatch.
        unwind: bool,
        /// Yield to the next strand after completion.
        next: bool,
        /// Argument count for the transmit.
        nargs: u16,
    },
    /// Transmit with the tag taken from a location literal.
    XmitTag {
        /// Flatten the `&rest` tail before dispatch.
        unwind: bool,
        /// Yield to the next strand after completion.
        next: bool,
        /// Argument count for the transmit.
        nargs: u16,
        /// Literal-pool index of the tag location.
        lit: u16,
    },
    /// Transmit with the tag aimed at an argument slot.
    XmitArg {
        /// Flatten the `&rest` tail before dispatch.
        unwind: bool,
        /// Yield to the next strand after completion.
        next: bool,
        /// Argument count for the transmit.
        nargs: u16,
        /// Destination argument slot.
        arg: u16,
    },
    /// Transmit with the tag aimed at a context register.
    XmitReg {
        /// Flatten the `&rest` tail before dispatch.
        unwind: bool,
        /// Yield to the next strand after completion.
        next: bool,
        /// Argument count for the transmit.
        nargs: u16,
        /// Destination context register.
        reg: u16,
    },
    /// Transmit with the parent link severed first.
    Send {
        /// Flatten the `&rest` tail before dispatch.
        unwind: bool,
        /// Yield to the next strand after completion.
        next: bool,
        /// Argument count for the transmit.
        nargs: u16,
    },

    // -- Return --
    /// Return the current result through the existing tag.
    Rtn {
        /// Yield to the next strand after the return.
        next: bool,
    },
    /// Return through a tag taken from a location literal.
    RtnTag {
        /// Yield to the next strand after the return.
        next: bool,
        /// Literal-pool index of the tag location.
        lit: u16,
    },
    /// Return into an argument slot of the parent.
    RtnArg {
        /// Yield to the next strand after the return.
        next: bool,
        /// Destination argument slot.
        arg: u16,
    },
    /// Return into a context register of the parent.
    RtnReg {
        /// Yield to the next strand after the return.
        next: bool,
        /// Destination context register.
        reg: u16,
    },
    /// Store the result directly into the parent at a literal tag,
    /// bypassing the return machinery.
    UpcallRtn {
        /// Yield to the next strand after the store.
        next: bool,
        /// Literal-pool index of the tag location.
        lit: u16,
    },
    /// Reschedule the parent and yield.
    UpcallResume,

    // -- Control flow --
    /// Switch to the next runnable strand; halt when none is left.
    Nxt,
    /// Unconditional jump.
    Jmp {
        /// Target program counter.
        target: u16,
    },
    /// Jump when the current result is the false object.
    JmpFalse {
        /// Target program counter.
        target: u16,
    },
    /// Cut `cut` environment frames, then jump.
    JmpCut {
        /// Target program counter.
        target: u16,
        /// Parent frames to cut.
        cut: u16,
    },

    // -- Lookup --
    /// Resolve a key through the self environment into an argument slot.
    LookupToArg {
        /// Destination argument slot.
        arg: u16,
        /// Literal-pool index of the key.
        lit: u16,
    },
    /// Resolve a key through the self environment into a register.
    LookupToReg {
        /// Destination context register.
        reg: u16,
        /// Literal-pool index of the key.
        lit: u16,
    },

    // -- Transfers --
    /// Read a lexical slot into an argument slot.
    XferLexToArg {
        /// Parent frames to walk.
        level: u16,
        /// Read through the frame's actor extension.
        indirect: bool,
        /// Slot offset within the frame.
        offset: u16,
        /// Destination argument slot.
        arg: u16,
    },
    /// Read a lexical slot into a context register.
    XferLexToReg {
        /// Parent frames to walk.
        level: u16,
        /// Read through the frame's actor extension.
        indirect: bool,
        /// Slot offset within the frame.
        offset: u16,
        /// Destination context register.
        reg: u16,
    },
    /// Read a global entry into an argument slot.
    XferGlobalToArg {
        /// Global-environment entry.
        global: u16,
        /// Destination argument slot.
        arg: u16,
    },
    /// Read a global entry into a context register.
    XferGlobalToReg {
        /// Global-environment entry.
        global: u16,
        /// Destination context register.
        reg: u16,
    },
    /// Copy between argument slots.
    XferArgToArg {
        /// Destination argument slot.
        dst: u16,
        /// Source argument slot.
        src: u16,
    },
    /// Copy the result into an argument slot.
    XferRsltToArg {
        /// Destination argument slot.
        arg: u16,
    },
    /// Copy an argument slot into the result.
    XferArgToRslt {
        /// Source argument slot.
        arg: u16,
    },
    /// Copy the result into a context register.
    XferRsltToReg {
        /// Destination context register.
        reg: u16,
    },
    /// Copy a context register into the result.
    XferRegToRslt {
        /// Source context register.
        reg: u16,
    },
    /// Store the result through a location literal.
    XferRsltToDest {
        /// Literal-pool index of the destination location.
        lit: u16,
    },
    /// Fetch through a location literal into the result.
    XferSrcToRslt {
        /// Literal-pool index of the source location.
        lit: u16,
    },

    // -- Literals --
    /// Copy a pool literal into an argument slot.
    IndLitToArg {
        /// Destination argument slot.
        arg: u16,
        /// Literal-pool index.
        lit: u16,
    },
    /// Copy a pool literal into a context register.
    IndLitToReg {
        /// Destination context register.
        reg: u16,
        /// Literal-pool index.
        lit: u16,
    },
    /// Copy a pool literal into the result.
    IndLitToRslt {
        /// Literal-pool index.
        lit: u16,
    },
    /// Copy a fixed machine literal into an argument slot.
    ImmediateLitToArg {
        /// Machine literal index.
        value: u16,
        /// Destination argument slot.
        arg: u16,
    },
    /// Copy a fixed machine literal into a context register.
    ImmediateLitToReg {
        /// Machine literal index.
        value: u16,
        /// Destination context register.
        reg: u16,
    },
    /// Copy a fixed machine literal into the result.
    ImmediateLitToRslt {
        /// Machine literal index.
        value: u16,
    },

    // -- Primitive application --
    /// Apply a primitive, storing the result through a location literal.
    ApplyPrimTag {
        /// Flatten the `&rest` tail around the application.
        unwind: bool,
        /// Yield to the next strand after completion.
        next: bool,
        /// Argument count for the call.
        nargs: u16,
        /// Primitive-table index.
        prim: u16,
        /// Literal-pool index of the destination location.
        lit: u16,
    },
    /// Apply a primitive, storing the result into an argument slot.
    ApplyPrimArg {
        /// Flatten the `&rest` tail around the application.
        unwind: bool,
        /// Yield to the next strand after completion.
        next: bool,
        /// Argument count for the call.
        nargs: u16,
        /// Primitive-table index.
        prim: u16,
        /// Destination argument slot.
        arg: u16,
    },
    /// Apply a primitive, storing the result into a context register.
    ApplyPrimReg {
        /// Flatten the `&rest` tail around the application.
        unwind: bool,
        /// Yield to the next strand after completion.
        next: bool,
        /// Argument count for the call.
        nargs: u16,
        /// Primitive-table index.
        prim: u16,
        /// Destination context register.
        reg: u16,
    },
    /// Apply a primitive for effect, discarding the result.
    ApplyCmd {
        /// Flatten the `&rest` tail around the application.
        unwind: bool,
        /// Yield to the next strand after completion.
        next: bool,
        /// Argument count for the call.
        nargs: u16,
        /// Primitive-table index.
        prim: u16,
    },

    /// Unrecognized encoding; fatal.
    Unknown,
}

/// Fieldless opcode discriminant, used as the key of the per-opcode
/// dispatch counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum OpCode {
    Halt,
    Push,
    Pop,
    Nargs,
    Alloc,
    PushAlloc,
    Extend,
    Outstanding,
    Fork,
    Xmit,
    XmitTag,
    XmitArg,
    XmitReg,
    Send,
    Rtn,
    RtnTag,
    RtnArg,
    RtnReg,
    UpcallRtn,
    UpcallResume,
    Nxt,
    Jmp,
    JmpFalse,
    JmpCut,
    LookupToArg,
    LookupToReg,
    XferLexToArg,
    XferLexToReg,
    XferGlobalToArg,
    XferGlobalToReg,
    XferArgToArg,
    XferRsltToArg,
    XferArgToRslt,
    XferRsltToReg,
    XferRegToRslt,
    XferRsltToDest,
    XferSrcToRslt,
    IndLitToArg,
    IndLitToReg,
    IndLitToRslt,
    ImmediateLitToArg,
    ImmediateLitToReg,
    ImmediateLitToRslt,
    ApplyPrimTag,
    ApplyPrimArg,
    ApplyPrimReg,
    ApplyCmd,
    Unknown,
}

impl Op {
    /// The fieldless discriminant of this opcode.
    #[must_use]
    pub fn opcode(&self) -> OpCode {
        match self {
            Self::Halt => OpCode::Halt,
            Self::Push => OpCode::Push,
            Self::Pop => OpCode::Pop,
            Self::Nargs { .. } => OpCode::Nargs,
            Self::Alloc { .. } => OpCode::Alloc,
            Self::PushAlloc { .. } => OpCode::PushAlloc,
            Self::Extend { .. } => OpCode::Extend,
            Self::Outstanding { .. } => OpCode::Outstanding,
            Self::Fork { .. } => OpCode::Fork,
            Self::Xmit { .. } => OpCode::Xmit,
            Self::XmitTag { .. } => OpCode::XmitTag,
            Self::XmitArg { .. } => OpCode::XmitArg,
            Self::XmitReg { .. } => OpCode::XmitReg,
            Self::Send { .. } => OpCode::Send,
            Self::Rtn { .. } => OpCode::Rtn,
            Self::RtnTag { .. } => OpCode::RtnTag,
            Self::RtnArg { .. } => OpCode::RtnArg,
            Self::RtnReg { .. } => OpCode::RtnReg,
            Self::UpcallRtn { .. } => OpCode::UpcallRtn,
            Self::UpcallResume => OpCode::UpcallResume,
            Self::Nxt => OpCode::Nxt,
            Self::Jmp { .. } => OpCode::Jmp,
            Self::JmpFalse { .. } => OpCode::JmpFalse,
            Self::JmpCut { .. } => OpCode::JmpCut,
            Self::LookupToArg { .. } => OpCode::LookupToArg,
            Self::LookupToReg { .. } => OpCode::LookupToReg,
            Self::XferLexToArg { .. } => OpCode::XferLexToArg,
            Self::XferLexToReg { .. } => OpCode::XferLexToReg,
            Self::XferGlobalToArg { .. } => OpCode::XferGlobalToArg,
            Self::XferGlobalToReg { .. } => OpCode::XferGlobalToReg,
            Self::XferArgToArg { .. } => OpCode::XferArgToArg,
            Self::XferRsltToArg { .. } => OpCode::XferRsltToArg,
            Self::XferArgToRslt { .. } => OpCode::XferArgToRslt,
            Self::XferRsltToReg { .. } => OpCode::XferRsltToReg,
            Self::XferRegToRslt { .. } => OpCode::XferRegToRslt,
            Self::XferRsltToDest { .. } => OpCode::XferRsltToDest,
            Self::XferSrcToRslt { .. } => OpCode::XferSrcToRslt,
            Self::IndLitToArg { .. } => OpCode::IndLitToArg,
            Self::IndLitToReg { .. } => OpCode::IndLitToReg,
            Self::IndLitToRslt { .. } => OpCode::IndLitToRslt,
            Self::ImmediateLitToArg { .. } => OpCode::ImmediateLitToArg,
            Self::ImmediateLitToReg { .. } => OpCode::ImmediateLitToReg,
            Self::ImmediateLitToRslt { .. } => OpCode::ImmediateLitToRslt,
            Self::ApplyPrimTag { .. } => OpCode::ApplyPrimTag,
            Self::ApplyPrimArg { .. } => OpCode::ApplyPrimArg,
            Self::ApplyPrimReg { .. } => OpCode::ApplyPrimReg,
            Self::ApplyCmd { .. } => OpCode::ApplyCmd,
            Self::Unknown => OpCode::Unknown,
        }
    }
}
