//! Host collaborator traits.
//!
//! The machine consumes two contracts from its embedding host: a
//! primitive table indexed by apply opcodes, and the object system's
//! dispatch/exception hooks. Both are threaded into `VM::step` as a
//! single [`ObjectSystem`] argument, never stored in machine state.

use rosette_types::{Ob, RblError, StdOprn};

use crate::ctxt::Ctxt;
use crate::vm::VM;

/// An externally-defined primitive operation callable from bytecode.
pub trait Prim: Send + Sync {
    /// Primitive name, for diagnostics.
    fn name(&self) -> &str;

    /// Apply this primitive against the calling context.
    ///
    /// The context's `argvec`/`nargs` describe the call; the primitive
    /// may also read and write the context's registers.
    ///
    /// # Errors
    ///
    /// A `RblError` outcome is a scheduling signal or diagnostic, not a
    /// Rust-level failure; the machine encodes it into its flags.
    fn dispatch_helper(&self, ctxt: &mut Ctxt) -> Result<Ob, RblError>;

    /// Build a runtime diagnostic attributed to this primitive.
    fn runtime_error(&self, msg: &str) -> RblError {
        RblError::RuntimeError(format!("{}: {msg}", self.name()))
    }
}

/// The object system as the machine consumes it.
///
/// The exception hooks are extension points: an implementation may
/// enqueue the running strand to the sleeper pool, signal an async
/// wait, or log. The defaults do the minimum the machine needs.
pub trait ObjectSystem: Send + Sync {
    /// Primitive table lookup.
    fn prim(&self, index: usize) -> Option<&dyn Prim>;

    /// Dispatch a transmit whose target is a standard operation.
    ///
    /// The default is a pass-through: the transmit completes with no
    /// effect beyond its flags.
    fn dispatch_oprn(&self, vm: &mut VM, oprn: &StdOprn) {
        let _ = vm;
        tracing::debug!(oprn = %oprn.name, "operation dispatch pass-through");
    }

    /// An apply-primitive returned an upcall signal.
    fn on_apply_prim_upcall(&self, vm: &mut VM) {
        let _ = vm;
        tracing::debug!("apply-prim upcall");
    }

    /// An apply-primitive returned a suspend signal.
    fn on_apply_prim_suspend(&self, vm: &mut VM) {
        let _ = vm;
        tracing::debug!("apply-prim suspend");
    }

    /// A transmit returned an upcall signal.
    fn on_xmit_upcall(&self, vm: &mut VM) {
        let _ = vm;
        tracing::debug!("transmit upcall");
    }

    /// A primitive returned a sleep signal. The default parks the
    /// running strand in the sleeper pool.
    fn on_sleep(&self, vm: &mut VM) {
        vm.park_current_strand();
    }
}

impl<T: ObjectSystem + ?Sized> ObjectSystem for &T {
    fn prim(&self, index: usize) -> Option<&dyn Prim> {
        (**self).prim(index)
    }

    fn dispatch_oprn(&self, vm: &mut VM, oprn: &StdOprn) {
        (**self).dispatch_oprn(vm, oprn);
    }

    fn on_apply_prim_upcall(&self, vm: &mut VM) {
        (**self).on_apply_prim_upcall(vm);
    }

    fn on_apply_prim_suspend(&self, vm: &mut VM) {
        (**self).on_apply_prim_suspend(vm);
    }

    fn on_xmit_upcall(&self, vm: &mut VM) {
        (**self).on_xmit_upcall(vm);
    }

    fn on_sleep(&self, vm: &mut VM) {
        (**self).on_sleep(vm);
    }
}

/// A plain indexed primitive table with the default object-system
/// behavior.
#[derive(Default)]
pub struct PrimTable {
    prims: Vec<Box<dyn Prim>>,
}

impl PrimTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a primitive, returning its index.
    pub fn install(&mut self, prim: Box<dyn Prim>) -> usize {
        self.prims.push(prim);
        self.prims.len() - 1
    }

    /// Number of installed primitives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prims.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }
}

impl ObjectSystem for PrimTable {
    fn prim(&self, index: usize) -> Option<&dyn Prim> {
        self.prims.get(index).map(AsRef::as_ref)
    }
}

impl std::fmt::Debug for PrimTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimTable")
            .field("len", &self.prims.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(i64);

    impl Prim for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn dispatch_helper(&self, _ctxt: &mut Ctxt) -> Result<Ob, RblError> {
            Ok(Ob::Fixnum(self.0))
        }
    }

    #[test]
    fn table_indexing() {
        let mut table = PrimTable::new();
        let k = table.install(Box::new(Fixed(7)));
        assert_eq!(k, 0);
        assert!(table.prim(0).is_some());
        assert!(table.prim(1).is_none());
        assert_eq!(table.prim(0).unwrap().name(), "fixed");
    }

    #[test]
    fn runtime_error_carries_prim_name() {
        let prim = Fixed(0);
        assert_eq!(
            prim.runtime_error("bad"),
            RblError::RuntimeError("fixed: bad".into())
        );
    }
}
