//! Vivitag Capture Engine
//!
//! Turns a video project into a tagged clip. A [`CaptureController`] keeps
//! the composited surface in step with media playback, loops the trim
//! window while previewing, and feeds an encoding sink while recording.
//! [`RecordingSession`] drives it in real time and hands the finished file
//! to a share or download target.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                RecordingSession                  │
//! │   frame tick      monitor tick      safety sleep │
//! │       │               │                 │        │
//! │       ▼               ▼                 ▼        │
//! │  ┌────────────────────────────────────────────┐  │
//! │  │             CaptureController              │  │
//! │  │  MediaElement ─► Compositor ─► Surface     │  │
//! │  │                  PhysicsTable     │        │  │
//! │  │                                   ▼        │  │
//! │  │                           EncodingSink     │  │
//! │  └───────────────────────────────┬────────────┘  │
//! │                                  ▼               │
//! │              ShareTarget / DownloadTarget        │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod controller;
pub mod deliver;
pub mod ffmpeg;
pub mod media;
pub mod negotiate;
pub mod session;
pub mod sink;

pub use controller::*;
pub use deliver::*;
pub use media::*;
pub use negotiate::*;
pub use session::*;
pub use sink::*;
