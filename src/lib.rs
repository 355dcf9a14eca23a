//! vrshell: interaction and frame-composition core of a VR browser shell.
//!
//! Controllers are ray cast into a scene of browser widgets, hits become
//! edge-triggered pointer and scroll events for the host application, and
//! every frame is culled once and drawn for both eyes. The binary entry
//! point (`vrshell-headless`) lives in `main.rs`.

pub mod config;
pub mod device;
pub mod error;
pub mod host;
pub mod render;
pub mod scripted;
pub mod vr;
pub mod world;

pub use config::{WidgetPlacement, WorldConfig};
pub use error::SetupError;
pub use host::{HostCallbacks, HostEnvironment, HostEvent};
pub use world::World;
