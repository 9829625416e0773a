//! Strand execution records.
//!
//! A `Ctxt` is the whole state of one strand: where it is in its code,
//! its argument vector and environments, its result and transmit
//! target, and the parent continuation its returns deliver into.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use rosette_types::{Env, Location, Ob, Tuple};

use crate::code::Code;
use crate::global::GlobalEnv;
use crate::instr::Pc;
use crate::location::{store, StoreResult};
use crate::monitor::Monitor;

/// Number of addressable context registers.
///
/// Register 0 is the result, 1 the transmit target, 2 the environment,
/// 3 the self environment. Anything else is an unknown register.
pub const NUM_CTXT_REGS: usize = 4;

/// The bundled effect of delivering a result into the parent
/// continuation.
#[derive(Debug, Default)]
pub struct RetEffect {
    /// The tag store failed.
    pub error: bool,
    /// The store targeted the global environment; install this value.
    pub new_global: Option<GlobalEnv>,
    /// The parent became runnable and should join the strand pool.
    pub schedule: Option<Ctxt>,
}

/// One strand's execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ctxt {
    /// Where this strand's returns deliver inside the parent.
    pub tag: Location,
    /// Arguments for the current call.
    pub argvec: Tuple,
    /// How many leading argvec slots the current call uses.
    pub nargs: usize,
    /// Lexical environment. Usually an `Ob::Env`; the machine faults
    /// when an environment operation finds something else here.
    pub env: Ob,
    /// Self environment, used by lookup opcodes.
    pub self_env: Ob,
    /// The code this strand runs.
    pub code: Arc<Code>,
    /// Saved resume point; live only while the strand is not installed.
    pub pc: Pc,
    /// Current result.
    pub rslt: Ob,
    /// Transmit target.
    pub trgt: Ob,
    /// Results still awaited before this context resumes.
    pub outstanding: i32,
    /// Parent continuation.
    pub parent: Option<Box<Ctxt>>,
    /// Instrumentation bundle for this strand.
    pub monitor: Monitor,
}

impl Ctxt {
    /// A root context over `code`, with `env` as both lexical and self
    /// environment.
    #[must_use]
    pub fn root(code: Arc<Code>, env: Env, monitor: Monitor) -> Self {
        let env = Ob::Env(Box::new(env));
        Self {
            tag: Location::Limbo,
            argvec: Tuple::NIL,
            nargs: 0,
            self_env: env.clone(),
            env,
            code,
            pc: Pc::default(),
            rslt: Ob::Niv,
            trgt: Ob::Niv,
            outstanding: 0,
            parent: None,
            monitor,
        }
    }

    /// A fresh child record inheriting this context's code and
    /// environments, with no parent link. The caller links the parent.
    #[must_use]
    pub fn child_shell(&self) -> Self {
        Self {
            tag: Location::Limbo,
            argvec: Tuple::NIL,
            nargs: 0,
            env: self.env.clone(),
            self_env: self.self_env.clone(),
            code: Arc::clone(&self.code),
            pc: self.pc,
            rslt: Ob::Niv,
            trgt: Ob::Niv,
            outstanding: 0,
            parent: None,
            monitor: self.monitor.clone(),
        }
    }

    /// Read a context register.
    #[must_use]
    pub fn get_reg(&self, r: usize) -> Option<&Ob> {
        match r {
            0 => Some(&self.rslt),
            1 => Some(&self.trgt),
            2 => Some(&self.env),
            3 => Some(&self.self_env),
            _ => None,
        }
    }

    /// Write a context register. Returns false for a register that
    /// does not exist.
    pub fn set_reg(&mut self, r: usize, ob: Ob) -> bool {
        match r {
            0 => self.rslt = ob,
            1 => self.trgt = ob,
            2 => self.env = ob,
            3 => self.self_env = ob,
            _ => return false,
        }
        true
    }

    /// The lexical environment as a frame, when it is one.
    #[must_use]
    pub fn env_frame(&self) -> Option<&Env> {
        self.env.as_env()
    }

    /// Deliver `result` into the parent continuation according to this
    /// context's tag.
    ///
    /// A limbo tag discards the result. Otherwise the result is stored
    /// into the parent at the tag, the parent's outstanding count
    /// drops, and a parent that is no longer waiting is handed back
    /// for scheduling.
    pub fn ret(&mut self, result: Ob, global: &GlobalEnv) -> RetEffect {
        let mut effect = RetEffect::default();
        if self.tag == Location::Limbo {
            return effect;
        }
        let tag = self.tag.clone();
        let Some(parent) = self.parent.as_deref_mut() else {
            effect.error = true;
            return effect;
        };
        match store(&tag, parent, global, result) {
            StoreResult::Fail => {
                effect.error = true;
                return effect;
            }
            StoreResult::Ctxt => {}
            StoreResult::Global(env) => effect.new_global = Some(env),
        }
        parent.outstanding -= 1;
        if parent.outstanding <= 0 {
            effect.schedule = Some(parent.clone());
        }
        effect
    }

    /// Render a diagnostic for the error-recovery path.
    #[must_use]
    pub fn vm_error(&self) -> String {
        format!("vm error: strand at {} with rslt {}", self.pc, self.rslt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Code;
    use crate::instr::Op;

    fn test_code() -> Arc<Code> {
        Arc::new(Code::new(vec![Op::Halt], vec![]).unwrap())
    }

    fn root() -> Ctxt {
        Ctxt::root(test_code(), Env::empty(), Monitor::new(0))
    }

    #[test]
    fn register_file_mapping() {
        let mut ctxt = root();
        assert!(ctxt.set_reg(0, Ob::Fixnum(1)));
        assert!(ctxt.set_reg(1, Ob::Fixnum(2)));
        assert_eq!(ctxt.get_reg(0), Some(&Ob::Fixnum(1)));
        assert_eq!(ctxt.get_reg(1), Some(&Ob::Fixnum(2)));
        assert_eq!(ctxt.rslt, Ob::Fixnum(1));

        assert!(!ctxt.set_reg(NUM_CTXT_REGS, Ob::Niv));
        assert_eq!(ctxt.get_reg(NUM_CTXT_REGS), None);
    }

    #[test]
    fn ret_through_limbo_is_inert() {
        let mut ctxt = root();
        ctxt.tag = Location::Limbo;
        let effect = ctxt.ret(Ob::Fixnum(5), &GlobalEnv::default());
        assert!(!effect.error);
        assert!(effect.schedule.is_none());
        assert!(effect.new_global.is_none());
    }

    #[test]
    fn ret_stores_into_parent_and_schedules() {
        let parent = root();
        let mut child = parent.child_shell();
        child.parent = Some(Box::new(parent));
        child.tag = Location::CtxtReg(0);
        if let Some(p) = child.parent.as_deref_mut() {
            p.outstanding = 1;
        }

        let effect = child.ret(Ob::Fixnum(7), &GlobalEnv::default());
        assert!(!effect.error);
        let scheduled = effect.schedule.expect("parent runnable");
        assert_eq!(scheduled.rslt, Ob::Fixnum(7));
        assert_eq!(scheduled.outstanding, 0);
    }

    #[test]
    fn ret_holds_parent_while_outstanding() {
        let parent = root();
        let mut child = parent.child_shell();
        child.parent = Some(Box::new(parent));
        child.tag = Location::ArgReg(0);
        if let Some(p) = child.parent.as_deref_mut() {
            p.argvec = Tuple::filled(2);
            p.outstanding = 2;
        }

        let effect = child.ret(Ob::Fixnum(1), &GlobalEnv::default());
        assert!(!effect.error);
        assert!(effect.schedule.is_none());
        assert_eq!(
            child.parent.as_deref().unwrap().argvec.elem(0),
            Some(&Ob::Fixnum(1))
        );
    }

    #[test]
    fn ret_without_parent_is_an_error() {
        let mut ctxt = root();
        ctxt.tag = Location::CtxtReg(0);
        let effect = ctxt.ret(Ob::Niv, &GlobalEnv::default());
        assert!(effect.error);
    }
}
