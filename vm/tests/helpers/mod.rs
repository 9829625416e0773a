//! Shared test infrastructure for machine conformance tests.

use std::sync::{Arc, Mutex};

use rosette_types::{Ob, RblError};
use rosette_vm::{Code, Ctxt, GlobalEnv, Op, Prim, PrimTable, VMConfig, VM};

/// Deterministic seed for reproducibility.
pub const SEED: [u8; 32] = [
    0x52, 0x6F, 0x73, 0x65, 0x74, 0x74, 0x65, 0x56, // "RosetteV"
    0x4D, 0x43, 0x6F, 0x6E, 0x66, 0x6F, 0x72, 0x6D, // "MConform"
    0x61, 0x6E, 0x63, 0x65, 0x53, 0x75, 0x69, 0x74, // "anceSuit"
    0x65, 0x56, 0x31, 0x52, 0x75, 0x73, 0x74, 0x31, // "eV1Rust1"
];

/// Build a validated code object or panic; test programs are static.
pub fn code(ops: Vec<Op>, lits: Vec<Ob>) -> Arc<Code> {
    Arc::new(Code::new(ops, lits).expect("test code validates"))
}

/// A machine over the given program with default config.
pub fn boot(ops: Vec<Op>, lits: Vec<Ob>) -> VM {
    VM::new(VMConfig::default(), code(ops, lits), GlobalEnv::default())
}

/// A machine with the debug trail on.
pub fn boot_debug(ops: Vec<Op>, lits: Vec<Ob>) -> VM {
    let config = VMConfig {
        debug: true,
        ..VMConfig::default()
    };
    VM::new(config, code(ops, lits), GlobalEnv::default())
}

/// Primitive returning a fixed object on every call.
pub struct ConstPrim(pub Ob);

impl Prim for ConstPrim {
    fn name(&self) -> &str {
        "const"
    }

    fn dispatch_helper(&self, _ctxt: &mut Ctxt) -> Result<Ob, RblError> {
        Ok(self.0.clone())
    }
}

/// Primitive recording the nargs of every call it receives.
pub struct RecordingPrim {
    pub calls: Mutex<Vec<usize>>,
    pub result: Ob,
}

impl RecordingPrim {
    pub fn new(result: Ob) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            result,
        }
    }
}

impl Prim for RecordingPrim {
    fn name(&self) -> &str {
        "recording"
    }

    fn dispatch_helper(&self, ctxt: &mut Ctxt) -> Result<Ob, RblError> {
        self.calls.lock().expect("recording lock").push(ctxt.nargs);
        Ok(self.result.clone())
    }
}

/// Primitive failing with the given error on every call.
pub struct FailingPrim(pub RblError);

impl Prim for FailingPrim {
    fn name(&self) -> &str {
        "failing"
    }

    fn dispatch_helper(&self, _ctxt: &mut Ctxt) -> Result<Ob, RblError> {
        Err(self.0.clone())
    }
}

/// A table over a single boxed primitive.
pub fn one_prim(prim: Box<dyn Prim>) -> PrimTable {
    let mut table = PrimTable::new();
    table.install(prim);
    table
}
