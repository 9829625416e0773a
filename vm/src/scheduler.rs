//! Strand pools.
//!
//! Ready strands live in a FIFO deque; forked strands are prepended so
//! they run before older work. Sleeping strands sit in a separate pool
//! until a wake schedules them en masse. `nsigs` counts external
//! signals still owed to the machine: with both pools empty it decides
//! between terminating and waiting on the host.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::ctxt::Ctxt;

/// What the pools have to offer next.
#[derive(Debug)]
pub enum Wake {
    /// A runnable strand, popped from the pool head.
    Strand(Box<Ctxt>),
    /// Nothing runnable, but external signals are outstanding; the
    /// machine should cede to its host.
    WaitForAsync,
    /// Nothing runnable and nothing pending; the machine is done.
    NoWorkLeft,
}

/// The strand and sleeper pools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrandPools {
    ready: VecDeque<Ctxt>,
    sleepers: Vec<Ctxt>,
    /// Outstanding external signal count.
    pub nsigs: u32,
}

impl StrandPools {
    /// Empty pools.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strand to the ready pool.
    pub fn schedule(&mut self, strand: Ctxt) {
        self.ready.push_back(strand);
    }

    /// Prepend a strand to the ready pool (fork order).
    pub fn prepend(&mut self, strand: Ctxt) {
        self.ready.push_front(strand);
    }

    /// Move a strand to the sleeper pool.
    pub fn park(&mut self, strand: Ctxt) {
        self.sleepers.push(strand);
    }

    /// Pop the next runnable strand, waking sleepers when the ready
    /// pool drains.
    pub fn next_runnable(&mut self) -> Wake {
        if let Some(strand) = self.ready.pop_front() {
            return Wake::Strand(Box::new(strand));
        }
        if self.sleepers.is_empty() {
            if self.nsigs == 0 {
                return Wake::NoWorkLeft;
            }
            return Wake::WaitForAsync;
        }
        for sleeper in self.sleepers.drain(..) {
            self.ready.push_back(sleeper);
        }
        match self.ready.pop_front() {
            Some(strand) => Wake::Strand(Box::new(strand)),
            None => Wake::NoWorkLeft,
        }
    }

    /// Number of ready strands.
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    /// Number of sleeping strands.
    #[must_use]
    pub fn sleeper_count(&self) -> usize {
        self.sleepers.len()
    }
}
