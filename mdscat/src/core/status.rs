use std::sync::Arc;
use std::sync::atomic::{
    AtomicBool,
    AtomicUsize,
    Ordering,
};

use crate::error::{Error, Result};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Start { total: usize },
    Update { done: usize, total: usize },
    Finish,
}

pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;


/// Cancellation token and progress counter of one run. Clones share the same state,
/// so a clone handed to another thread can stop the run.
#[derive(Clone, Default)]
pub struct Status {
    stopped: Arc<AtomicBool>,
    total: Arc<AtomicUsize>,
    done: Arc<AtomicUsize>,
    callback: Option<ProgressCallback>,
}


impl Status {
    pub fn new() -> Self {
        Self::default()
    }


    pub fn with_callback(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            ..Self::default()
        }
    }


    #[inline]
    fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }


    pub fn start(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.done.store(0, Ordering::SeqCst);
        self.report(Progress::Start { total });
    }


    pub fn update(&self) {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total.load(Ordering::SeqCst);
        self.report(Progress::Update { done, total });
    }


    pub fn finish(&self) {
        self.report(Progress::Finish);
    }


    /// Request a stop, honored at the next check point.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }


    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }


    /// `Err(Error::Cancelled)` once a stop was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_stopped() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }


    /// `(done, total)` units of work.
    pub fn progress(&self) -> (usize, usize) {
        (self.done.load(Ordering::SeqCst), self.total.load(Ordering::SeqCst))
    }
}


/// Result of a cancellable operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
}


impl<T> Outcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(v) => Some(v),
            Self::Cancelled => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Completed(v) => Outcome::Completed(f(v)),
            Self::Cancelled => Outcome::Cancelled,
        }
    }
}
