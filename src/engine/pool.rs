//! Context pool.
//!
//! A bounded free list of boxed contexts. Acquisition hands out a guard;
//! dropping the guard returns the context, so release happens on every exit
//! path, including unwinding and cancelled futures.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::Settings;
use crate::context::Context;

pub(crate) struct ContextPool {
    idle: Mutex<Vec<Box<Context>>>,
    capacity: usize,
}

impl ContextPool {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity.min(64))),
            capacity,
        }
    }

    // Contexts are cleared before they are pushed back, so a poisoned list
    // still only holds reusable entries.
    fn lock(&self) -> MutexGuard<'_, Vec<Box<Context>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take an idle context, or build one when the pool is empty.
    pub(crate) fn acquire(&self, settings: &Arc<Settings>) -> PooledContext<'_> {
        let context = self
            .lock()
            .pop()
            .unwrap_or_else(|| Box::new(Context::new(settings.clone())));
        PooledContext {
            pool: self,
            context: Some(context),
        }
    }

    fn release(&self, mut context: Box<Context>) {
        context.clear();
        let mut idle = self.lock();
        if idle.len() < self.capacity {
            idle.push(context);
        }
    }

    pub(crate) fn idle(&self) -> usize {
        self.lock().len()
    }
}

/// Exclusive handle on a pooled context.
pub(crate) struct PooledContext<'a> {
    pool: &'a ContextPool,
    context: Option<Box<Context>>,
}

impl Deref for PooledContext<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        // Only `Drop` takes the context out.
        self.context.as_deref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.context.as_deref_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.pool.release(context);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_on_drop() {
        let settings = Arc::new(Settings::default());
        let pool = ContextPool::new(4);

        {
            let _a = pool.acquire(&settings);
            let _b = pool.acquire(&settings);
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 2);

        let _c = pool.acquire(&settings);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_capacity_bounds_idle_list() {
        let settings = Arc::new(Settings::default());
        let pool = ContextPool::new(1);

        let a = pool.acquire(&settings);
        let b = pool.acquire(&settings);
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_release_during_unwind() {
        let settings = Arc::new(Settings::default());
        let pool = ContextPool::new(4);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = pool.acquire(&settings);
            panic!("handler blew up");
        }));
        assert!(result.is_err());
        assert_eq!(pool.idle(), 1);
    }
}
