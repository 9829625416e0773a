//! Bytecode execution engine for the Rosette actor language.
//!
//! This crate provides a standalone, embeddable dispatch interpreter
//! for a register-oriented, actor-style object language. Strands
//! (cooperative lightweight threads) execute one opcode at a time; a
//! post-step flag machine reconciles transmits, returns, errors, and
//! strand switches in a fixed order.
//!
//! # Architecture
//!
//! - **Opcodes** ([`instr::Op`]): the decoded instruction set
//! - **Code objects** ([`code::Code`]): validated opcode sequence + literal pool
//! - **Contexts** ([`ctxt::Ctxt`]): per-strand execution records
//! - **Locations** ([`location`]): the fetch/store address algebra
//! - **Pools** ([`scheduler::StrandPools`]): ready and sleeping strands
//! - **Monitors** ([`monitor::Monitor`]): per-strand instrumentation
//! - **Hosts** ([`prim::ObjectSystem`]): primitive table and object-system hooks
//! - **The machine** ([`vm::VM`]): dispatch loop and flag machine
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use rosette_vm::{Code, GlobalEnv, Op, PrimTable, VM, VMConfig};
//!
//! let code = Arc::new(Code::new(vec![Op::Halt], vec![]).unwrap());
//! let mut vm = VM::new(VMConfig::default(), code, GlobalEnv::default());
//! vm.run(&PrimTable::new(), 100);
//! assert_eq!(vm.exit_code(), 0);
//! ```

pub mod code;
pub mod ctxt;
pub mod global;
pub mod instr;
pub mod location;
pub mod monitor;
pub mod prim;
pub mod scheduler;
pub mod vm;

pub use code::{vm_literal, Code, VMError, NUM_VM_LITERALS};
pub use ctxt::{Ctxt, RetEffect, NUM_CTXT_REGS};
pub use global::GlobalEnv;
pub use instr::{Op, OpCode, Pc};
pub use location::{fetch, store, StoreResult};
pub use monitor::Monitor;
pub use prim::{ObjectSystem, Prim, PrimTable};
pub use scheduler::{StrandPools, Wake};
pub use vm::{ErrorPolicy, StepOutcome, VMConfig, VM};
