pub mod adapters;
pub mod compiler;
pub mod content;
pub mod manifest;

pub use adapters::axum::{AxumTrellisAdapter, PageRequest, RequestHandler, ServeContext};
pub use compiler::{TRELLIS_RUNTIME_JS, TrellisEngine, content_type_for};
pub use content::{CONTENT_TTL, ContentServer};
pub use manifest::{NodeSpec, PageManifest};
