//! The machine: dispatch loop, flag machine, and opcode handlers.
//!
//! Execution is one step at a time: fetch the opcode at the program
//! counter, bump the counter, count the dispatch, run the handler,
//! then reconcile the control flags. Handlers never raise; they encode
//! outcomes into the flags, and the flag machine's fixed order
//! (transmit, return, vm-error, next-strand) decides what the step
//! ultimately did.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use rosette_types::{Env, Location, Ob, RblError, SysCode, Tuple, RBLFALSE};

use crate::code::{vm_literal, Code};
use crate::ctxt::Ctxt;
use crate::global::GlobalEnv;
use crate::instr::{Op, OpCode, Pc};
use crate::location::{fetch, store, StoreResult};
use crate::monitor::Monitor;
use crate::prim::{ObjectSystem, Prim};
use crate::scheduler::{StrandPools, Wake};

/// What to do when the vm-error flag is raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Hand off to the next strand and keep going.
    #[default]
    SwitchStrand,
    /// Record the faulting strand's diagnostic first, then switch.
    Recover,
}

/// Machine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VMConfig {
    /// Record the debug-info trail regardless of monitor tracing.
    pub debug: bool,
    /// Recovery behavior for the vm-error flag.
    pub error_policy: ErrorPolicy,
}

/// Result of advancing the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Work remains.
    Continue,
    /// Both pools drained with signals outstanding; the host should
    /// deliver them and resume.
    AwaitSignals,
    /// The machine stopped; consult the exit code.
    Exited,
}

/// Transmit scratch recorded by xmit-family opcodes for the flag
/// machine's one-shot consumption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct XmitData {
    unwind: bool,
    next: bool,
}

/// Destination of a primitive application's result.
#[derive(Debug, Clone, Copy)]
enum PrimDest {
    Tag(u16),
    Arg(u16),
    Reg(u16),
    Cmd,
}

/// Destination of a lookup or transfer write.
#[derive(Debug, Clone, Copy)]
enum WriteDest {
    Arg(u16),
    Reg(u16),
}

impl std::fmt::Display for WriteDest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Arg(a) => write!(f, "arg[{a}]"),
            Self::Reg(r) => write!(f, "reg[{r}]"),
        }
    }
}

/// The virtual machine.
///
/// Owns the installed strand, the code/pc mirror it executes from, the
/// strand pools, the global environment, the monitor views, and the
/// per-step control flags. Host collaborators (primitives, the object
/// system) are threaded into [`VM::step`], never stored here, so the
/// whole machine snapshots cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VM {
    config: VMConfig,
    ctxt: Ctxt,
    code: Arc<Code>,
    pc: Pc,
    global_env: GlobalEnv,
    current_monitor: Monitor,
    pools: StrandPools,

    do_xmit_flag: bool,
    do_rtn_flag: bool,
    do_next_thread_flag: bool,
    vm_error_flag: bool,
    exit_flag: bool,
    do_async_wait_flag: bool,
    debug: bool,

    xmit_data: XmitData,
    do_rtn_data: bool,
    loc: Location,

    bytecodes: BTreeMap<OpCode, u64>,
    ob_counts: BTreeMap<String, u64>,
    exit_code: i32,
    debug_info: Vec<String>,
}

impl VM {
    /// A machine over `code` with a root strand and an empty lexical
    /// environment.
    #[must_use]
    pub fn new(config: VMConfig, code: Arc<Code>, global_env: GlobalEnv) -> Self {
        let monitor = if config.debug {
            Monitor::with_tracing(0)
        } else {
            Monitor::new(0)
        };
        let ctxt = Ctxt::root(code, Env::empty(), monitor);
        Self::with_ctxt(config, ctxt, global_env)
    }

    /// A machine booting from a prepared root strand.
    #[must_use]
    pub fn with_ctxt(config: VMConfig, ctxt: Ctxt, global_env: GlobalEnv) -> Self {
        let mut current_monitor = ctxt.monitor.clone();
        current_monitor.start();
        let debug = config.debug || current_monitor.tracing;
        Self {
            code: Arc::clone(&ctxt.code),
            pc: ctxt.pc,
            bytecodes: current_monitor.opcode_counts.clone(),
            ob_counts: current_monitor.ob_counts.clone(),
            config,
            ctxt,
            global_env,
            current_monitor,
            pools: StrandPools::new(),
            do_xmit_flag: false,
            do_rtn_flag: false,
            do_next_thread_flag: false,
            vm_error_flag: false,
            exit_flag: false,
            do_async_wait_flag: false,
            debug,
            xmit_data: XmitData::default(),
            do_rtn_data: false,
            loc: Location::Limbo,
            exit_code: 0,
            debug_info: Vec::new(),
        }
    }

    // ---- Dispatch loop ----

    /// Execute one opcode and reconcile the flags.
    pub fn step(&mut self, sys: &dyn ObjectSystem) -> StepOutcome {
        if self.exit_flag {
            return StepOutcome::Exited;
        }
        if self.do_async_wait_flag {
            return StepOutcome::AwaitSignals;
        }
        let Some(op) = self.code.op(self.pc).cloned() else {
            return StepOutcome::Exited;
        };
        self.pc.relative += 1;
        *self.bytecodes.entry(op.opcode()).or_default() += 1;
        self.execute(op, sys);
        self.reconcile_flags(sys);

        if self.exit_flag {
            StepOutcome::Exited
        } else if self.do_async_wait_flag {
            StepOutcome::AwaitSignals
        } else {
            StepOutcome::Continue
        }
    }

    /// Step until the machine exits, cedes to the host, or the budget
    /// runs out.
    pub fn run(&mut self, sys: &dyn ObjectSystem, max_steps: usize) -> StepOutcome {
        for _ in 0..max_steps {
            match self.step(sys) {
                StepOutcome::Continue => {}
                outcome => return outcome,
            }
        }
        StepOutcome::Continue
    }

    // ---- Flag machine ----

    /// Post-step reconciliation. The order is load-bearing: transmit
    /// first, then return, then error recovery, then strand switch.
    fn reconcile_flags(&mut self, sys: &dyn ObjectSystem) {
        if self.do_xmit_flag {
            self.do_xmit(sys);
        }
        if self.do_rtn_flag {
            self.do_rtn();
            self.do_rtn_flag = false;
        }
        if self.vm_error_flag {
            self.vm_error_flag = false;
            if self.config.error_policy == ErrorPolicy::Recover {
                let diagnostic = self.ctxt.vm_error();
                self.debug_note(diagnostic);
            }
            self.do_next_thread_flag = true;
        }
        if self.do_next_thread_flag {
            self.do_next_thread_flag = false;
            if self.next_strand() {
                self.exit_flag = true;
            }
        }
    }

    /// Consume a pending transmit. Dispatches on the target; only
    /// standard operations dispatch today, everything else passes
    /// through.
    fn do_xmit(&mut self, sys: &dyn ObjectSystem) {
        self.do_xmit_flag = false;
        let XmitData { unwind, next } = self.xmit_data;
        if unwind {
            match self.ctxt.argvec.flatten_rest() {
                rosette_types::FlattenResult::Flattened(flat) => {
                    self.ctxt.nargs = flat.len();
                    self.ctxt.argvec = flat;
                }
                rosette_types::FlattenResult::AbsentRest => {
                    self.ctxt.argvec = Tuple::NIL;
                    self.ctxt.nargs = 0;
                }
                rosette_types::FlattenResult::InvalidRest => {
                    self.raise_vm_error("&rest value is not a tuple");
                    return;
                }
            }
        }
        match self.ctxt.trgt.clone() {
            Ob::StdOprn(oprn) => sys.dispatch_oprn(self, &oprn),
            other => {
                tracing::debug!(kind = other.kind(), "transmit target pass-through");
            }
        }
        if next {
            self.do_next_thread_flag = true;
        }
    }

    /// Consume a pending return.
    fn do_rtn(&mut self) {
        let result = self.ctxt.rslt.clone();
        let effect = self.ctxt.ret(result, &self.global_env);
        if effect.error {
            self.vm_error_flag = true;
            return;
        }
        if let Some(env) = effect.new_global {
            self.global_env = env;
        }
        if let Some(strand) = effect.schedule {
            self.pools.schedule(strand);
        }
        if self.do_rtn_data {
            self.do_next_thread_flag = true;
        }
    }

    // ---- Scheduler ----

    /// Install the next runnable strand. Returns true when no work is
    /// left anywhere.
    fn next_strand(&mut self) -> bool {
        match self.pools.next_runnable() {
            Wake::Strand(strand) => {
                self.install_strand(*strand);
                false
            }
            Wake::WaitForAsync => {
                self.do_async_wait_flag = true;
                false
            }
            Wake::NoWorkLeft => true,
        }
    }

    fn install_strand(&mut self, strand: Ctxt) {
        if strand.monitor.id != self.current_monitor.id {
            self.install_monitor(strand.monitor.clone());
        }
        self.install_ctxt(strand);
    }

    fn install_monitor(&mut self, mut monitor: Monitor) {
        self.current_monitor.stop();
        self.bytecodes = monitor.opcode_counts.clone();
        self.ob_counts = monitor.ob_counts.clone();
        self.debug = self.config.debug || monitor.tracing;
        monitor.start();
        tracing::debug!(id = monitor.id, "monitor installed");
        self.current_monitor = monitor;
    }

    fn install_ctxt(&mut self, ctxt: Ctxt) {
        self.code = Arc::clone(&ctxt.code);
        self.pc = ctxt.pc;
        self.ctxt = ctxt;
    }

    /// Move a copy of the running strand, resuming after the current
    /// opcode, into the sleeper pool.
    pub fn park_current_strand(&mut self) {
        let mut strand = self.ctxt.clone();
        strand.pc = self.pc;
        self.pools.park(strand);
    }

    /// Append a strand to the ready pool.
    pub fn schedule(&mut self, strand: Ctxt) {
        self.pools.schedule(strand);
    }

    // ---- Signals ----

    /// Record an outstanding external signal.
    pub fn post_signal(&mut self) {
        self.pools.nsigs += 1;
    }

    /// Acknowledge a delivered external signal.
    pub fn consume_signal(&mut self) {
        self.pools.nsigs = self.pools.nsigs.saturating_sub(1);
    }

    /// Clear the async-wait flag after the host injected work.
    pub fn clear_async_wait(&mut self) {
        self.do_async_wait_flag = false;
    }

    // ---- Opcode handlers ----

    fn execute(&mut self, op: Op, sys: &dyn ObjectSystem) {
        match op {
            Op::Halt => {
                self.exit_flag = true;
                self.exit_code = 0;
            }
            Op::Push => self.op_push(),
            Op::Pop => self.op_pop(),
            Op::Nargs { n } => self.ctxt.nargs = usize::from(n),
            Op::Alloc { n } => {
                self.ctxt.argvec = Tuple::filled(usize::from(n));
                self.count_ob("tuple");
            }
            Op::PushAlloc { n } => {
                self.op_push();
                self.ctxt.argvec = Tuple::filled(usize::from(n));
                self.count_ob("tuple");
            }
            Op::Extend { lit } => self.op_extend(lit),
            Op::Outstanding { target, count } => {
                self.ctxt.pc = Pc::from(target);
                self.ctxt.outstanding = i32::from(count);
            }
            Op::Fork { target } => {
                let mut strand = self.ctxt.clone();
                strand.pc = Pc::from(target);
                self.pools.prepend(strand);
                self.count_ob("strand");
            }
            Op::Xmit {
                unwind,
                next,
                nargs,
            } => self.op_xmit(unwind, next, nargs, None),
            Op::XmitTag {
                unwind,
                next,
                nargs,
                lit,
            } => {
                if let Some(tag) = self.tag_lit(lit) {
                    self.op_xmit(unwind, next, nargs, Some(tag));
                }
            }
            Op::XmitArg {
                unwind,
                next,
                nargs,
                arg,
            } => self.op_xmit(unwind, next, nargs, Some(Location::ArgReg(usize::from(arg)))),
            Op::XmitReg {
                unwind,
                next,
                nargs,
                reg,
            } => self.op_xmit(unwind, next, nargs, Some(Location::CtxtReg(usize::from(reg)))),
            Op::Send {
                unwind,
                next,
                nargs,
            } => {
                self.ctxt.parent = None;
                self.op_xmit(unwind, next, nargs, None);
            }
            Op::Rtn { next } => self.op_rtn(next, None),
            Op::RtnTag { next, lit } => {
                if let Some(tag) = self.tag_lit(lit) {
                    self.op_rtn(next, Some(tag));
                }
            }
            Op::RtnArg { next, arg } => {
                self.op_rtn(next, Some(Location::ArgReg(usize::from(arg))));
            }
            Op::RtnReg { next, reg } => {
                self.op_rtn(next, Some(Location::CtxtReg(usize::from(reg))));
            }
            Op::UpcallRtn { next, lit } => self.op_upcall_rtn(next, lit),
            Op::UpcallResume => self.op_upcall_resume(),
            Op::Nxt => {
                if self.next_strand() {
                    self.exit_flag = true;
                    self.exit_code = 0;
                }
            }
            Op::Jmp { target } => self.pc = Pc::from(target),
            Op::JmpFalse { target } => {
                if self.ctxt.rslt == RBLFALSE {
                    self.pc = Pc::from(target);
                }
            }
            Op::JmpCut { target, cut } => self.op_jmp_cut(target, cut),
            Op::LookupToArg { arg, lit } => self.op_lookup(lit, WriteDest::Arg(arg)),
            Op::LookupToReg { reg, lit } => self.op_lookup(lit, WriteDest::Reg(reg)),
            Op::XferLexToArg {
                level,
                indirect,
                offset,
                arg,
            } => self.op_xfer_lex(level, indirect, offset, WriteDest::Arg(arg)),
            Op::XferLexToReg {
                level,
                indirect,
                offset,
                reg,
            } => self.op_xfer_lex(level, indirect, offset, WriteDest::Reg(reg)),
            Op::XferGlobalToArg { global, arg } => {
                self.op_xfer_global(global, WriteDest::Arg(arg));
            }
            Op::XferGlobalToReg { global, reg } => {
                self.op_xfer_global(global, WriteDest::Reg(reg));
            }
            Op::XferArgToArg { dst, src } => {
                if let Some(ob) = self.arg(src) {
                    self.put_arg(dst, ob);
                }
            }
            Op::XferRsltToArg { arg } => {
                let ob = self.ctxt.rslt.clone();
                self.put_arg(arg, ob);
            }
            Op::XferArgToRslt { arg } => {
                if let Some(ob) = self.arg(arg) {
                    self.ctxt.rslt = ob;
                }
            }
            Op::XferRsltToReg { reg } => {
                let ob = self.ctxt.rslt.clone();
                self.put_reg(reg, ob);
            }
            Op::XferRegToRslt { reg } => {
                if let Some(ob) = self.reg(reg) {
                    self.ctxt.rslt = ob;
                }
            }
            Op::XferRsltToDest { lit } => self.op_xfer_rslt_to_dest(lit),
            Op::XferSrcToRslt { lit } => self.op_xfer_src_to_rslt(lit),
            Op::IndLitToArg { arg, lit } => {
                if let Some(ob) = self.pool_lit(lit) {
                    self.put_arg(arg, ob);
                }
            }
            Op::IndLitToReg { reg, lit } => {
                if let Some(ob) = self.pool_lit(lit) {
                    self.put_reg(reg, ob);
                }
            }
            Op::IndLitToRslt { lit } => {
                if let Some(ob) = self.pool_lit(lit) {
                    self.ctxt.rslt = ob;
                }
            }
            Op::ImmediateLitToArg { value, arg } => {
                if let Some(ob) = self.machine_lit(value) {
                    self.put_arg(arg, ob);
                }
            }
            Op::ImmediateLitToReg { value, reg } => {
                if let Some(ob) = self.machine_lit(value) {
                    self.put_reg(reg, ob);
                }
            }
            Op::ImmediateLitToRslt { value } => {
                if let Some(ob) = self.machine_lit(value) {
                    self.ctxt.rslt = ob;
                }
            }
            Op::ApplyPrimTag {
                unwind,
                next,
                nargs,
                prim,
                lit,
            } => self.op_apply_prim(sys, prim, unwind, nargs, next, PrimDest::Tag(lit)),
            Op::ApplyPrimArg {
                unwind,
                next,
                nargs,
                prim,
                arg,
            } => self.op_apply_prim(sys, prim, unwind, nargs, next, PrimDest::Arg(arg)),
            Op::ApplyPrimReg {
                unwind,
                next,
                nargs,
                prim,
                reg,
            } => self.op_apply_prim(sys, prim, unwind, nargs, next, PrimDest::Reg(reg)),
            Op::ApplyCmd {
                unwind,
                next,
                nargs,
                prim,
            } => self.op_apply_prim(sys, prim, unwind, nargs, next, PrimDest::Cmd),
            Op::Unknown => self.suicide("unknown opcode"),
        }
    }

    fn op_push(&mut self) {
        let child = self.ctxt.child_shell();
        let parent = std::mem::replace(&mut self.ctxt, child);
        self.ctxt.parent = Some(Box::new(parent));
        self.count_ob("strand");
    }

    fn op_pop(&mut self) {
        match self.ctxt.parent.take() {
            Some(parent) => self.ctxt = *parent,
            None => self.raise_vm_error("pop without a parent context"),
        }
    }

    fn op_extend(&mut self, lit: u16) {
        let Some(Ob::Template(template)) = self.code.lit(lit).cloned() else {
            self.raise_vm_error("extend literal is not a template");
            return;
        };
        match template.match_pattern(&self.ctxt.argvec, self.ctxt.nargs) {
            Some(actuals) => {
                let extended = self
                    .ctxt
                    .env_frame()
                    .map(|env| env.extend_with(&template.keymeta, actuals));
                match extended {
                    Some(env) => {
                        self.ctxt.nargs = 0;
                        self.ctxt.env = Ob::Env(Box::new(env));
                        self.count_ob("env");
                    }
                    None => self.raise_vm_error("environment register does not hold a frame"),
                }
            }
            None => {
                self.handle_formals_mismatch();
                self.do_next_thread_flag = true;
            }
        }
    }

    fn op_xmit(&mut self, unwind: bool, next: bool, nargs: u16, tag: Option<Location>) {
        if let Some(tag) = tag {
            self.ctxt.tag = tag;
        }
        self.ctxt.nargs = usize::from(nargs);
        self.xmit_data = XmitData { unwind, next };
        self.do_xmit_flag = true;
    }

    fn op_rtn(&mut self, next: bool, tag: Option<Location>) {
        if let Some(tag) = tag {
            self.ctxt.tag = tag;
        }
        self.do_rtn_data = next;
        self.do_rtn_flag = true;
    }

    fn op_upcall_rtn(&mut self, next: bool, lit: u16) {
        let Some(tag) = self.tag_lit(lit) else {
            return;
        };
        let result = self.ctxt.rslt.clone();
        let Some(parent) = self.ctxt.parent.as_deref_mut() else {
            self.raise_vm_error("upcall return without a parent context");
            return;
        };
        match store(&tag, parent, &self.global_env, result) {
            StoreResult::Fail => self.vm_error_flag = true,
            StoreResult::Ctxt => {}
            StoreResult::Global(env) => self.global_env = env,
        }
        if next {
            self.do_next_thread_flag = true;
        }
    }

    fn op_upcall_resume(&mut self) {
        let parent = self.ctxt.parent.as_deref().cloned();
        match parent {
            Some(strand) => {
                self.pools.schedule(strand);
                self.do_next_thread_flag = true;
            }
            None => self.raise_vm_error("upcall resume without a parent context"),
        }
    }

    fn op_jmp_cut(&mut self, target: u16, cut: u16) {
        let ancestor = self
            .ctxt
            .env_frame()
            .and_then(|env| env.nth_parent(usize::from(cut)))
            .cloned();
        match ancestor {
            Some(frame) => {
                self.ctxt.env = Ob::Env(Box::new(frame));
                self.pc = Pc::from(target);
            }
            None => self.raise_vm_error("environment cut beyond the root frame"),
        }
    }

    fn op_lookup(&mut self, lit: u16, dest: WriteDest) {
        let Some(key) = self.code.lit(lit).cloned() else {
            self.raise_vm_error("lookup key literal out of range");
            return;
        };
        let outcome = match self.ctxt.self_env.as_env() {
            Some(env) => env.lookup_obo(&key),
            None => {
                self.raise_vm_error("self environment register does not hold a frame");
                return;
            }
        };
        match outcome {
            Ok(ob) => self.put_dest(dest, ob),
            Err(RblError::Upcall) => self.do_next_thread_flag = true,
            Err(RblError::Absent) => {
                self.handle_missing_binding(&key, dest);
                self.do_next_thread_flag = true;
            }
            Err(err) => self.raise_vm_error(format!("lookup failure: {err}")),
        }
    }

    fn op_xfer_lex(&mut self, level: u16, indirect: bool, offset: u16, dest: WriteDest) {
        let value = self
            .ctxt
            .env_frame()
            .and_then(|env| env.nth_parent(usize::from(level)))
            .and_then(|frame| {
                if indirect {
                    frame.extension_slot(usize::from(offset))
                } else {
                    frame.slot(usize::from(offset))
                }
            })
            .cloned();
        match value {
            Some(ob) => self.put_dest(dest, ob),
            None => self.raise_vm_error(format!(
                "lexical slot [{level},{offset}] unreachable (indirect: {indirect})"
            )),
        }
    }

    fn op_xfer_global(&mut self, global: u16, dest: WriteDest) {
        match self.global_env.entry(usize::from(global)).cloned() {
            Some(ob) => self.put_dest(dest, ob),
            None => self.raise_vm_error(format!("global entry {global} out of range")),
        }
    }

    fn op_xfer_rslt_to_dest(&mut self, lit: u16) {
        let Some(loc) = self.tag_lit(lit) else {
            return;
        };
        let result = self.ctxt.rslt.clone();
        match store(&loc, &mut self.ctxt, &self.global_env, result) {
            StoreResult::Fail => self.vm_error_flag = true,
            StoreResult::Ctxt => {}
            StoreResult::Global(env) => self.global_env = env,
        }
    }

    fn op_xfer_src_to_rslt(&mut self, lit: u16) {
        let Some(loc) = self.tag_lit(lit) else {
            return;
        };
        match fetch(&loc, &self.ctxt, &self.global_env) {
            Some(ob) => self.ctxt.rslt = ob,
            None => self.raise_vm_error(format!("nothing to fetch at {loc}")),
        }
    }

    // ---- Primitive application ----

    fn op_apply_prim(
        &mut self,
        sys: &dyn ObjectSystem,
        prim_index: u16,
        unwind: bool,
        nargs: u16,
        next: bool,
        dest: PrimDest,
    ) {
        self.ctxt.nargs = usize::from(nargs);
        if let PrimDest::Tag(lit) = dest {
            let Some(loc) = self.tag_lit(lit) else {
                return;
            };
            self.loc = loc;
        }
        let Some(prim) = sys.prim(usize::from(prim_index)) else {
            self.raise_vm_error(format!("no primitive at index {prim_index}"));
            return;
        };
        let result = if unwind {
            self.unwind_and_apply_prim(prim)
        } else {
            prim.dispatch_helper(&mut self.ctxt)
        };
        self.dispose_prim_result(sys, result, dest, next);
    }

    /// Apply a primitive against a flattened view of the argument
    /// vector, restoring the original argvec and nargs afterwards so
    /// the compiler-arranged vector survives the call.
    fn unwind_and_apply_prim(&mut self, prim: &dyn Prim) -> Result<Ob, RblError> {
        let flat = match self.ctxt.argvec.flatten_rest() {
            rosette_types::FlattenResult::Flattened(flat) => flat,
            rosette_types::FlattenResult::AbsentRest => Tuple::NIL,
            rosette_types::FlattenResult::InvalidRest => {
                return Err(prim.runtime_error("&rest value is not a tuple"));
            }
        };
        let saved_nargs = self.ctxt.nargs;
        self.ctxt.nargs = flat.len();
        let saved_argvec = std::mem::replace(&mut self.ctxt.argvec, flat);
        let result = prim.dispatch_helper(&mut self.ctxt);
        self.ctxt.argvec = saved_argvec;
        self.ctxt.nargs = saved_nargs;
        result
    }

    fn dispose_prim_result(
        &mut self,
        sys: &dyn ObjectSystem,
        result: Result<Ob, RblError>,
        dest: PrimDest,
        next: bool,
    ) {
        match result {
            Err(RblError::DeadThread) => self.do_next_thread_flag = true,
            Err(err) => self.raise_vm_error(format!("primitive failure: {err}")),
            Ok(ob) if ob.is_sysval() => {
                self.handle_exception(&ob, true, sys);
                self.do_next_thread_flag = true;
            }
            Ok(ob) => match dest {
                PrimDest::Tag(_) => {
                    let loc = self.loc.clone();
                    match store(&loc, &mut self.ctxt, &self.global_env, ob) {
                        StoreResult::Fail => self.vm_error_flag = true,
                        StoreResult::Ctxt => {
                            if next {
                                self.do_next_thread_flag = true;
                            }
                        }
                        StoreResult::Global(env) => self.global_env = env,
                    }
                }
                PrimDest::Arg(arg) => {
                    if usize::from(arg) >= self.ctxt.argvec.len() {
                        self.raise_vm_error(format!("argument slot {arg} out of range"));
                    } else {
                        self.ctxt.argvec.set_elem(usize::from(arg), ob);
                        if next {
                            self.do_next_thread_flag = true;
                        }
                    }
                }
                PrimDest::Reg(reg) => {
                    if self.ctxt.set_reg(usize::from(reg), ob) {
                        if next {
                            self.do_next_thread_flag = true;
                        }
                    } else {
                        self.register_failure(usize::from(reg));
                    }
                }
                PrimDest::Cmd => {
                    if next {
                        self.do_next_thread_flag = true;
                    }
                }
            },
        }
    }

    /// Route a sysval result from the primitive-apply boundary.
    fn handle_exception(&mut self, ob: &Ob, from_apply_prim: bool, sys: &dyn ObjectSystem) {
        match ob.sysval() {
            Some(SysCode::Upcall) => {
                if from_apply_prim {
                    sys.on_apply_prim_upcall(self);
                } else {
                    sys.on_xmit_upcall(self);
                }
            }
            Some(SysCode::Suspend) => {
                if from_apply_prim {
                    sys.on_apply_prim_suspend(self);
                }
            }
            Some(SysCode::Sleep) => sys.on_sleep(self),
            Some(SysCode::Invalid | SysCode::DeadThread) => {}
            Some(SysCode::Interrupt) => self.suicide("interrupt at the primitive boundary"),
            None => self.suicide("non-sysval routed to the exception handler"),
        }
    }

    // ---- Failure paths ----

    fn handle_formals_mismatch(&mut self) {
        tracing::warn!("formals mismatch");
        let nargs = self.ctxt.nargs;
        self.debug_note(format!("formals mismatch with {nargs} actuals"));
    }

    fn handle_missing_binding(&mut self, key: &Ob, dest: WriteDest) {
        tracing::warn!(key = %key, "missing binding");
        self.debug_note(format!("missing binding: {key} for {dest}"));
    }

    fn register_failure(&mut self, r: usize) {
        self.exit_flag = true;
        self.exit_code = 1;
        self.debug_note(format!("Unknown register: {r}"));
    }

    /// Non-recoverable abort.
    fn suicide(&mut self, msg: &str) {
        tracing::error!(msg, pc = self.pc.relative, "fatal machine abort");
        self.debug_note(format!("fatal: {msg}"));
        self.exit_flag = true;
        self.exit_code = 1;
    }

    fn raise_vm_error(&mut self, msg: impl Into<String>) {
        self.debug_note(msg);
        self.vm_error_flag = true;
    }

    fn debug_note(&mut self, msg: impl Into<String>) {
        if self.debug {
            self.debug_info.push(msg.into());
        }
    }

    // ---- Small accessors used by handlers ----

    fn arg(&mut self, a: u16) -> Option<Ob> {
        let ob = self.ctxt.argvec.elem(usize::from(a)).cloned();
        if ob.is_none() {
            self.raise_vm_error(format!("argument slot {a} out of range"));
        }
        ob
    }

    fn reg(&mut self, r: u16) -> Option<Ob> {
        let ob = self.ctxt.get_reg(usize::from(r)).cloned();
        if ob.is_none() {
            self.register_failure(usize::from(r));
        }
        ob
    }

    fn put_arg(&mut self, arg: u16, ob: Ob) {
        if !self.ctxt.argvec.set_elem(usize::from(arg), ob) {
            self.raise_vm_error(format!("argument slot {arg} out of range"));
        }
    }

    fn put_reg(&mut self, reg: u16, ob: Ob) {
        if !self.ctxt.set_reg(usize::from(reg), ob) {
            self.register_failure(usize::from(reg));
        }
    }

    fn put_dest(&mut self, dest: WriteDest, ob: Ob) {
        match dest {
            WriteDest::Arg(a) => self.put_arg(a, ob),
            WriteDest::Reg(r) => self.put_reg(r, ob),
        }
    }

    fn pool_lit(&mut self, lit: u16) -> Option<Ob> {
        let ob = self.code.lit(lit).cloned();
        if ob.is_none() {
            self.raise_vm_error(format!("literal {lit} out of range"));
        }
        ob
    }

    fn machine_lit(&mut self, value: u16) -> Option<Ob> {
        let ob = vm_literal(value);
        if ob.is_none() {
            self.raise_vm_error(format!("machine literal {value} out of range"));
        }
        ob
    }

    fn tag_lit(&mut self, lit: u16) -> Option<Location> {
        match self.code.lit(lit).cloned() {
            Some(Ob::Location(loc)) => Some(*loc),
            Some(other) => {
                self.raise_vm_error(format!("tag literal is not a location: {other}"));
                None
            }
            None => {
                self.raise_vm_error(format!("tag literal {lit} out of range"));
                None
            }
        }
    }

    fn count_ob(&mut self, kind: &str) {
        *self.ob_counts.entry(kind.to_string()).or_default() += 1;
    }

    // ---- Introspection ----

    /// The installed strand.
    #[must_use]
    pub fn ctxt(&self) -> &Ctxt {
        &self.ctxt
    }

    /// Mutable access to the installed strand, for host setup.
    pub fn ctxt_mut(&mut self) -> &mut Ctxt {
        &mut self.ctxt
    }

    /// The global environment.
    #[must_use]
    pub fn global_env(&self) -> &GlobalEnv {
        &self.global_env
    }

    /// The machine's program counter.
    #[must_use]
    pub fn pc(&self) -> Pc {
        self.pc
    }

    /// Whether the machine has stopped.
    #[must_use]
    pub fn is_exited(&self) -> bool {
        self.exit_flag
    }

    /// The exit code: 0 for a clean halt, 1 for a fatal abort.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Per-opcode dispatch counts under the installed monitor.
    #[must_use]
    pub fn bytecodes(&self) -> &BTreeMap<OpCode, u64> {
        &self.bytecodes
    }

    /// Per-kind allocation counts under the installed monitor.
    #[must_use]
    pub fn ob_counts(&self) -> &BTreeMap<String, u64> {
        &self.ob_counts
    }

    /// The installed monitor.
    #[must_use]
    pub fn current_monitor(&self) -> &Monitor {
        &self.current_monitor
    }

    /// The debug-info trail.
    #[must_use]
    pub fn debug_info(&self) -> &[String] {
        &self.debug_info
    }

    /// Number of ready strands.
    #[must_use]
    pub fn strand_count(&self) -> usize {
        self.pools.ready_count()
    }

    /// Number of sleeping strands.
    #[must_use]
    pub fn sleeper_count(&self) -> usize {
        self.pools.sleeper_count()
    }
}
