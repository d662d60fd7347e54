//! Veil Host Runtime
//!
//! The privileged side of the bridge. It owns OS capture and window
//! resources and answers bridge requests one at a time:
//! - **Catalog:** enumerates monitors and windows with PNG thumbnails
//! - **Router:** validates payloads, acquires and releases the host stream
//! - **Transport:** in-process request queue with one-shot replies
//! - **Virtual desktop:** simulated platform with fault injection

pub mod catalog;
pub mod router;
pub mod transport;
pub mod update;
pub mod virtual_desktop;

pub use catalog::SourceCatalog;
pub use router::HostRouter;
pub use transport::{spawn_host, ChannelTransport, HostHandle};
pub use update::UpdateNotices;
pub use virtual_desktop::{DesktopOp, SurfaceState, VirtualDesktop};
