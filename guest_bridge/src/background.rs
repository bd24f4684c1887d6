// Copyright 2026 the Guest Bridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Background translation of guest code.
//!
//! Ahead-of-time translation of a code region may run off the guest's critical path. Jobs only
//! receive owned, `Send + 'static` inputs, so they cannot reach a sandbox's registry; results are
//! picked up without blocking the next time execution enters the same region.
//!
//! The execution engine owns the [`Translator`] and consults it from
//! [`GuestMachine::run`](crate::machine::GuestMachine::run):
//!
//! ```ignore
//! fn run(&mut self, address: GuestAddr, max_steps: u64, traps: &mut dyn TrapHandler)
//!     -> Result<(), MachineStop>
//! {
//!     match self.translator.poll(address) {
//!         Some(code) => self.install(address, code),
//!         None => {
//!             let bytes = self.code_region(address).to_vec();
//!             self.translator.submit(address, move || translate(&bytes));
//!         }
//!     }
//!     self.interpret(address, max_steps, traps)
//! }
//! ```

use std::boxed::Box;
use std::string::String;
use std::sync::mpsc;
use std::thread;

use hashbrown::{HashMap, HashSet};

use crate::machine::GuestAddr;

/// A detached unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs somewhere else.
pub trait TaskSpawner {
    /// Starts `job`. Must not wait for it to finish.
    fn spawn(&self, job: Job);
}

impl<S: TaskSpawner + ?Sized> TaskSpawner for Box<S> {
    fn spawn(&self, job: Job) {
        (**self).spawn(job);
    }
}

/// Spawns one named, detached thread per job.
#[derive(Clone, Debug)]
pub struct ThreadSpawner {
    name: String,
}

impl ThreadSpawner {
    /// Creates a spawner whose threads carry `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ThreadSpawner {
    fn default() -> Self {
        Self::new("guest-bridge-translate")
    }
}

impl TaskSpawner for ThreadSpawner {
    fn spawn(&self, job: Job) {
        let spawned = thread::Builder::new().name(self.name.clone()).spawn(job);
        if let Err(err) = spawned {
            log::warn!("could not start background job on `{}`: {err}", self.name);
        }
    }
}

/// Runs jobs immediately on the calling thread. For hosts without threads, and tests.
#[derive(Copy, Clone, Debug, Default)]
pub struct InlineSpawner;

impl TaskSpawner for InlineSpawner {
    fn spawn(&self, job: Job) {
        job();
    }
}

/// Tracks translation jobs per code region.
pub struct Translator<T, S = ThreadSpawner> {
    spawner: S,
    tx: mpsc::Sender<(GuestAddr, T)>,
    rx: mpsc::Receiver<(GuestAddr, T)>,
    pending: HashSet<GuestAddr>,
    ready: HashMap<GuestAddr, T>,
}

impl<T: Send + 'static, S: TaskSpawner> Translator<T, S> {
    /// Creates a translator that runs jobs on `spawner`.
    pub fn new(spawner: S) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            spawner,
            tx,
            rx,
            pending: HashSet::new(),
            ready: HashMap::new(),
        }
    }

    /// Schedules `job` for `region` unless one is already pending or waiting to be picked up.
    ///
    /// Returns `true` when a job was started.
    pub fn submit<F>(&mut self, region: GuestAddr, job: F) -> bool
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.drain();
        if self.pending.contains(&region) || self.ready.contains_key(&region) {
            return false;
        }
        self.pending.insert(region);
        let tx = self.tx.clone();
        self.spawner.spawn(Box::new(move || {
            // The translator may be gone; the result is simply dropped then.
            let _ = tx.send((region, job()));
        }));
        true
    }

    /// Takes the finished result for `region`, if there is one. Never blocks.
    pub fn poll(&mut self, region: GuestAddr) -> Option<T> {
        self.drain();
        self.ready.remove(&region)
    }

    /// Returns `true` while a job for `region` is running.
    pub fn is_pending(&mut self, region: GuestAddr) -> bool {
        self.drain();
        self.pending.contains(&region)
    }

    /// Number of running jobs.
    pub fn pending_count(&mut self) -> usize {
        self.drain();
        self.pending.len()
    }

    fn drain(&mut self) {
        while let Ok((region, result)) = self.rx.try_recv() {
            self.pending.remove(&region);
            self.ready.insert(region, result);
        }
    }
}

impl<T, S: core::fmt::Debug> core::fmt::Debug for Translator<T, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Translator")
            .field("spawner", &self.spawner)
            .field("pending", &self.pending.len())
            .field("ready", &self.ready.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn inline_results_are_ready_on_the_next_poll() {
        let mut translator = Translator::new(InlineSpawner);
        assert!(translator.submit(0x1000, || 7_u32));
        assert!(!translator.submit(0x1000, || 8_u32), "result not consumed yet");
        assert!(!translator.is_pending(0x1000));
        assert_eq!(translator.poll(0x2000), None);
        assert_eq!(translator.poll(0x1000), Some(7));
        assert_eq!(translator.poll(0x1000), None);
    }

    #[test]
    fn thread_results_arrive_without_blocking() {
        let mut translator = Translator::new(ThreadSpawner::default());
        let (release, gate) = mpsc::channel::<()>();
        assert!(translator.submit(0x40, move || {
            let _ = gate.recv();
            "translated"
        }));
        assert!(translator.is_pending(0x40));
        assert_eq!(translator.poll(0x40), None);
        release.send(()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(result) = translator.poll(0x40) {
                assert_eq!(result, "translated");
                break;
            }
            assert!(Instant::now() < deadline, "background job never finished");
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(translator.pending_count(), 0);
    }
}
