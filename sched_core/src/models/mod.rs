//! Window model: typed activity intervals and the arena that shares them.

pub mod macros;
pub mod arena;
pub mod window;


pub use arena::{WindowArena, WindowHandle};
pub use window::{
    find_window_at, ActivityCapabilities, ActivityCode, ActivityKind, ActivityWindow,
    EclipseWindow, EventWindow, ExecutionRecord, GsIndex, SatIndex, WindowId, WindowKey,
    XlnkDirection, DV_EPSILON,
};
