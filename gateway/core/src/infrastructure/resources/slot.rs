// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Lazily initialized, closable client slot.
//!
//! Construction runs while the slot lock is held, so concurrent first callers
//! wait for one construction instead of racing several. A failed
//! construction leaves the slot `Uninitialized` for the next caller to retry.
//!
//! The observable state lives in a separate mirror so `state()` never waits
//! behind a construction in progress.

use parking_lot::RwLock;
use std::future::Future;
use tokio::sync::Mutex;

use crate::domain::resource::{ResourceError, SlotState};

enum Slot<T> {
    Uninitialized,
    Ready(T),
    Closed,
}

pub struct ResourceSlot<T> {
    name: String,
    inner: Mutex<Slot<T>>,
    state: RwLock<SlotState>,
}

impl<T: Clone + Send> ResourceSlot<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Slot::Uninitialized),
            state: RwLock::new(SlotState::Uninitialized),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Memoized handle, building it with `init` on first use.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<T, ResourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ResourceError>>,
    {
        let mut inner = self.inner.lock().await;
        match &*inner {
            Slot::Ready(handle) => Ok(handle.clone()),
            Slot::Closed => Err(ResourceError::Closed(self.name.clone())),
            Slot::Uninitialized => {
                let handle = init().await?;
                *inner = Slot::Ready(handle.clone());
                *self.state.write() = SlotState::Ready;
                Ok(handle)
            }
        }
    }

    /// Current state; a construction in progress still reads `Uninitialized`.
    pub fn state(&self) -> SlotState {
        *self.state.read()
    }

    /// Mark the slot closed, handing a built client to `release`.
    ///
    /// Returns false when there was nothing to release.
    pub async fn close<F, Fut>(&self, release: F) -> bool
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = ()>,
    {
        let previous = {
            let mut inner = self.inner.lock().await;
            *self.state.write() = SlotState::Closed;
            std::mem::replace(&mut *inner, Slot::Closed)
        };
        match previous {
            Slot::Ready(handle) => {
                release(handle).await;
                true
            }
            Slot::Uninitialized | Slot::Closed => false,
        }
    }
}
