use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Where the layout worker currently is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LayoutPhase {
    #[default]
    Stopped,
    Running,
    /// Worker alive but waiting for the layout to become dirty.
    Idle,
}

#[derive(Debug, Default)]
struct Control {
    cancelled: bool,
    dirty: bool,
    paused: bool,
    phase: LayoutPhase,
}

/// What woke a waiting worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Wake {
    Work,
    Cancelled,
}

/// How a sleep between iterations ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Interrupt {
    None,
    Paused,
    Cancelled,
}

/// Wake-up channel between graph mutators and the layout worker.
///
/// The worker blocks on "dirty and not paused, or cancelled". Marking dirty
/// and cancelling both notify the condition variable, so an idle worker
/// resumes or exits immediately.
#[derive(Debug, Default)]
pub struct LayoutSignal {
    control: Mutex<Control>,
    wake: Condvar,
}

impl LayoutSignal {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flags that node or edge state changed and wakes an idle worker.
    pub fn mark_dirty(&self) {
        self.control().dirty = true;
        self.wake.notify_all();
    }

    /// Clears the dirty flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        std::mem::take(&mut self.control().dirty)
    }

    pub fn is_dirty(&self) -> bool {
        self.control().dirty
    }

    /// Sticky user pause. A paused worker finishes its current iteration and
    /// idles until unpaused, regardless of dirtiness.
    pub fn set_paused(&self, paused: bool) {
        self.control().paused = paused;
        self.wake.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.control().paused
    }

    pub fn phase(&self) -> LayoutPhase {
        self.control().phase
    }

    pub(crate) fn set_phase(&self, phase: LayoutPhase) {
        self.control().phase = phase;
    }

    /// Prepares for a fresh worker. The first run starts dirty so a newly
    /// started layout always iterates at least once.
    pub(crate) fn arm(&self) {
        let mut control = self.control();
        control.cancelled = false;
        control.dirty = true;
    }

    pub(crate) fn cancel(&self) {
        self.control().cancelled = true;
        self.wake.notify_all();
    }

    /// Blocks until there is work to do or the worker is cancelled. Consumes
    /// the dirty flag on [`Wake::Work`].
    pub(crate) fn wait_for_work(&self) -> Wake {
        let guard = self.control();
        let mut control = self
            .wake
            .wait_while(guard, |control| {
                !control.cancelled && !(control.dirty && !control.paused)
            })
            .unwrap_or_else(PoisonError::into_inner);
        if control.cancelled {
            return Wake::Cancelled;
        }
        control.dirty = false;
        Wake::Work
    }

    /// Sleeps between iterations. Returns early on cancel or pause.
    pub(crate) fn sleep(&self, duration: Duration) -> Interrupt {
        let guard = self.control();
        let (control, _) = self
            .wake
            .wait_timeout_while(guard, duration, |control| {
                !control.cancelled && !control.paused
            })
            .unwrap_or_else(PoisonError::into_inner);
        interrupt_for(&control)
    }

    pub(crate) fn interrupt(&self) -> Interrupt {
        interrupt_for(&self.control())
    }
}

fn interrupt_for(control: &Control) -> Interrupt {
    if control.cancelled {
        Interrupt::Cancelled
    } else if control.paused {
        Interrupt::Paused
    } else {
        Interrupt::None
    }
}
