//! Per-strand instrumentation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::instr::OpCode;

/// Instrumentation bundle carried by every strand.
///
/// The machine keys its live dispatch counters off the installed
/// monitor; switching strands with a different monitor swaps the
/// counter views wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    /// Monitor identity; strand switches compare by this.
    pub id: usize,
    /// Per-opcode dispatch counts.
    pub opcode_counts: BTreeMap<OpCode, u64>,
    /// Per-kind object allocation counts.
    pub ob_counts: BTreeMap<String, u64>,
    /// Whether strands under this monitor record the debug trail.
    pub tracing: bool,
    running: bool,
}

impl Monitor {
    /// A stopped monitor with the given identity.
    #[must_use]
    pub fn new(id: usize) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// A monitor that turns the debug trail on.
    #[must_use]
    pub fn with_tracing(id: usize) -> Self {
        Self {
            id,
            tracing: true,
            ..Self::default()
        }
    }

    /// Begin a collection interval.
    pub fn start(&mut self) {
        self.running = true;
    }

    /// End the current collection interval.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Whether a collection interval is open.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_toggles_running() {
        let mut m = Monitor::new(3);
        assert!(!m.is_running());
        m.start();
        assert!(m.is_running());
        m.stop();
        assert!(!m.is_running());
        assert_eq!(m.id, 3);
    }
}
