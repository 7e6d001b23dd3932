//! Cooperative cancellation for spin-waiting callers.
//!
//! Rust threads carry no interrupt status of their own, so each thread gets a
//! lazily created flag that other threads can raise through an
//! [`InterruptHandle`]. [`SnowflakeIdGenerator::next_id`] polls the calling
//! thread's flag once per retry and gives up with [`Error::Cancelled`].
//!
//! ```
//! use std::sync::mpsc;
//!
//! let (tx, rx) = mpsc::channel();
//! let worker = std::thread::spawn(move || {
//!     tx.send(spinflake::interrupt::current()).unwrap();
//!     while !spinflake::interrupt::is_interrupted() {
//!         core::hint::spin_loop();
//!     }
//! });
//!
//! rx.recv().unwrap().interrupt();
//! worker.join().unwrap();
//! ```
//!
//! [`SnowflakeIdGenerator::next_id`]: crate::SnowflakeIdGenerator::next_id
//! [`Error::Cancelled`]: crate::Error::Cancelled

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Something a spinning caller can poll to learn it should stop.
pub trait Cancellation {
    /// Returns `true` once cancellation has been requested.
    fn is_cancelled(&self) -> bool;
}

/// Never requests cancellation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl Cancellation for NeverCancel {
    #[inline]
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl Cancellation for AtomicBool {
    #[inline]
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

/// A shareable handle to one thread's interrupt flag.
///
/// The flag is sticky: once raised it stays raised until [`Self::clear`].
#[derive(Clone, Debug, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    /// Creates a fresh, unraised flag not bound to any thread.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag.
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns whether the flag is raised.
    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Lowers the flag, returning whether it was raised.
    pub fn clear(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}

impl Cancellation for InterruptHandle {
    #[inline]
    fn is_cancelled(&self) -> bool {
        self.is_interrupted()
    }
}

thread_local! {
    static CURRENT: InterruptHandle = InterruptHandle::new();
}

/// Returns the interrupt handle of the calling thread.
pub fn current() -> InterruptHandle {
    CURRENT.with(Clone::clone)
}

/// Returns whether the calling thread has been interrupted.
pub fn is_interrupted() -> bool {
    CURRENT.with(InterruptHandle::is_interrupted)
}

/// Lowers the calling thread's interrupt flag, returning whether it was
/// raised.
pub fn clear() -> bool {
    CURRENT.with(InterruptHandle::clear)
}

/// Polls the calling thread's interrupt flag.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurrentThread;

impl Cancellation for CurrentThread {
    #[inline]
    fn is_cancelled(&self) -> bool {
        is_interrupted()
    }
}
