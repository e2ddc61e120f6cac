//! Execution-context tracking for caller checks
//!
//! Each thread carries a marker saying what kind of code it is currently
//! running: ordinary thread code, system initialization, an interrupt handler
//! or the periodic timer. Runtime glue enters the non-thread contexts through
//! [`enter`], which returns a guard restoring the previous marker on drop.

use std::cell::Cell;
use std::marker::PhantomData;

use crate::error::{NetError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    Thread,
    Initialization,
    Interrupt,
    Timer,
}

thread_local! {
    static CURRENT: Cell<ExecutionContext> = const { Cell::new(ExecutionContext::Thread) };
}

pub fn current() -> ExecutionContext {
    CURRENT.with(|c| c.get())
}

/// Mark the calling thread as running in `ctx` until the guard is dropped.
pub fn enter(ctx: ExecutionContext) -> ContextGuard {
    let previous = CURRENT.with(|c| c.replace(ctx));
    ContextGuard {
        previous,
        _not_send: PhantomData,
    }
}

/// Restores the previous execution context on drop.
pub struct ContextGuard {
    previous: ExecutionContext,
    // The marker is per-thread; the guard must be dropped where it was made.
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT.with(|c| c.set(self.previous));
    }
}

/// Accept only ordinary thread code.
pub fn threads_only() -> Result<()> {
    match current() {
        ExecutionContext::Thread => Ok(()),
        _ => Err(NetError::CallerError),
    }
}

/// Accept thread code and system initialization.
pub fn init_and_threads() -> Result<()> {
    match current() {
        ExecutionContext::Thread | ExecutionContext::Initialization => Ok(()),
        _ => Err(NetError::CallerError),
    }
}

/// Accept anything but interrupt handlers.
pub fn not_interrupt() -> Result<()> {
    match current() {
        ExecutionContext::Interrupt => Err(NetError::CallerError),
        _ => Ok(()),
    }
}
