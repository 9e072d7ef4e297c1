//! Trigger admission and the display surface boundary.

pub mod display;
pub mod gate;

pub use display::{DisplayController, DisplaySurface, TracingDisplay};
pub use gate::{GatePhase, InteractionGate};
