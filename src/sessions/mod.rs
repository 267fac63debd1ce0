//! Session registry and portable snapshots

pub mod registry;
pub mod snapshot;

pub use registry::{Session, SessionRegistry};
pub use snapshot::{render_markdown, ExportBundle, SessionSnapshot};
