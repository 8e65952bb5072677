//! Codec control engine
//!
//! The state machine, work pipeline and event dispatch shared by the four
//! codec interfaces. Nothing in here knows about pixels or samples; the
//! codec-specific halves live in `webcodecs::*` as [`control::CodecProcessor`]
//! implementations.

pub mod control;
pub mod events;

pub use control::{CodecPipeline, CodecProcessor, CodecState, ErrorCallback, OutputCallback};
pub use events::{AddEventListenerOptions, Event, EventHandler, EventTarget};
