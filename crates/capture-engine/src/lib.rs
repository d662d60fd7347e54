//! Veil Capture Engine
//!
//! Drives one screen-share session at a time and keeps the overlay out of
//! the shared stream while it runs.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │               CaptureController                │
//! │  Idle → Requesting → Active → Stopping → Stopped
//! │                 │         │                     │
//! │                 └─────────┴──────→ Failed(reason)
//! │        │                        │               │
//! │        ▼                        ▼               │
//! │  ┌──────────────┐      ┌──────────────────┐     │
//! │  │ CaptureBridge│      │  OverlayManager  │     │
//! │  │ (host stream)│      │ (exclusion/hide) │     │
//! │  └──────────────┘      └──────────────────┘     │
//! └───────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod session;
pub mod stream;

pub use commands::CommandDispatcher;
pub use session::*;
pub use stream::StreamHandle;
