//! Shows one image at a time and replaces it, glitch-free, whenever a newer
//! image reference arrives from the periodic poller or the push channel.

pub mod buffer;
pub mod config;
pub mod constants;
pub mod controller;
pub mod ingestion;
pub mod observer;
pub mod preload;
pub mod push;
pub mod raylib_renderer;
pub mod reference;
pub mod renderer;
pub mod runtime;
pub mod scheduler;
pub mod transition;

pub use buffer::{BufferRole, DoubleBuffer, SlotId};
pub use controller::{Controller, ControllerConfig};
pub use observer::{NullObserver, Observer, TracingObserver};
pub use preload::{PreloadError, PreloadVerifier};
pub use reference::ImageReference;
pub use renderer::Renderer;
pub use transition::{CycleId, TransitionState};
