//! Reusable [`Context`] pool.
//!
//! Acquire and release are the only operations that touch shared state; once a
//! context is handed out it is owned exclusively by one request and needs no lock.

use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::context::Context;

/// A free list of idle contexts, bounded by `max_idle`.
///
/// Contexts are created lazily on first demand. On release a context is cleared and
/// kept for reuse unless the pool already holds `max_idle` idle contexts, in which
/// case it is dropped.
pub struct ContextPool {
    free: Mutex<Vec<Context>>,
    max_idle: usize,
    created: AtomicUsize,
}

impl ContextPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_idle,
            created: AtomicUsize::new(0),
        }
    }

    /// Takes an idle context, or creates one if none is free.
    ///
    /// The returned guard releases the context when dropped, including while
    /// unwinding from a panic.
    pub fn acquire(&self) -> PooledContext<'_> {
        let idle = self.lock().pop();
        let ctx = idle.unwrap_or_else(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            Context::default()
        });
        PooledContext { ctx, pool: self }
    }

    fn release(&self, mut ctx: Context) {
        ctx.clear();
        let mut free = self.lock();
        if free.len() < self.max_idle {
            free.push(ctx);
        }
    }

    /// Total contexts ever allocated by this pool.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Contexts currently waiting in the free list.
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    // Nothing panics while the lock is held, so a poisoned list is still consistent.
    fn lock(&self) -> MutexGuard<'_, Vec<Context>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive handle on a pooled [`Context`]. Dereferences to the context.
pub struct PooledContext<'a> {
    ctx: Context,
    pool: &'a ContextPool,
}

impl Deref for PooledContext<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.ctx
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        self.pool.release(mem::take(&mut self.ctx));
    }
}
