//! Shared window storage.
//!
//! Routes, multi-routes and the constraint generator all refer to windows
//! through [`WindowHandle`]s into one [`WindowArena`]. Mutation goes through
//! the arena and only through the validated setters of [`ActivityWindow`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::window::{ActivityCapabilities, ActivityWindow, SatIndex, WindowKey};
use crate::error::{ErrorContext, SchedulingError, SchedulingResult};

/// Stable reference to a window stored in a [`WindowArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowHandle(usize);

impl WindowHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Registry of activity windows keyed by (identifier, namespace).
#[derive(Debug, Default, Clone)]
pub struct WindowArena {
    windows: Vec<ActivityWindow>,
    by_key: HashMap<WindowKey, WindowHandle>,
}

impl WindowArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a window. Fails if its key is already registered.
    pub fn insert(&mut self, window: ActivityWindow) -> SchedulingResult<WindowHandle> {
        if self.by_key.contains_key(window.key()) {
            return Err(SchedulingError::window_state_with_context(
                "duplicate window identifier",
                ErrorContext::new("arena_insert")
                    .with_entity("window")
                    .with_entity_id(window.key()),
            ));
        }
        let handle = WindowHandle(self.windows.len());
        self.by_key.insert(window.key().clone(), handle);
        self.windows.push(window);
        Ok(handle)
    }

    /// Look up a window by handle.
    pub fn get(&self, handle: WindowHandle) -> SchedulingResult<&ActivityWindow> {
        self.windows.get(handle.0).ok_or_else(|| {
            SchedulingError::not_found_with_context(
                format!("no window for handle {}", handle.0),
                ErrorContext::new("arena_get").with_entity("window"),
            )
        })
    }

    /// Look up the handle registered for a key.
    pub fn handle_of(&self, key: &WindowKey) -> Option<WindowHandle> {
        self.by_key.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (WindowHandle, &ActivityWindow)> {
        self.windows
            .iter()
            .enumerate()
            .map(|(i, w)| (WindowHandle(i), w))
    }

    /// Handles of all windows involving `sat`, ordered by center time.
    pub fn handles_for_sat(&self, sat: SatIndex) -> Vec<WindowHandle> {
        let mut handles: Vec<WindowHandle> = self
            .iter()
            .filter(|(_, w)| w.has_sat_indx(sat))
            .map(|(h, _)| h)
            .collect();
        handles.sort_by_key(|h| (self.windows[h.0].center(), h.0));
        handles
    }

    /// Apply a validated mutation to one window.
    ///
    /// The closure receives the window mutably; any error it returns is passed
    /// through and the window setters guarantee no partial update.
    pub fn update<T, F>(&mut self, handle: WindowHandle, f: F) -> SchedulingResult<T>
    where
        F: FnOnce(&mut ActivityWindow) -> SchedulingResult<T>,
    {
        let window = self.windows.get_mut(handle.0).ok_or_else(|| {
            SchedulingError::not_found_with_context(
                format!("no window for handle {}", handle.0),
                ErrorContext::new("arena_update").with_entity("window"),
            )
        })?;
        f(window)
    }

    pub fn set_scheduled_dv(&mut self, handle: WindowHandle, scheduled_dv: f64) -> SchedulingResult<()> {
        self.update(handle, |w| w.set_scheduled_dv(scheduled_dv))
    }
}
