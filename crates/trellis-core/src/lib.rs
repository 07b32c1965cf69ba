//! Trellis core crate.
//!
//! This crate holds the composition model and keeps it free of any HTTP
//! concern:
//!
//! - `component`: loadable markup/script/style units, the resource loader,
//!   and the store-usage comment parser.
//! - `node`: the composition tree and the recursive render algorithm that
//!   resolves child placeholders and aggregates script/style fragments.
//! - `store`: the request-scoped key/value bag components read at compile
//!   time.
//!
//! Rendering is a pure function of the tree and its component contents: a
//! render call never mutates the tree and never touches shared state, so the
//! same tree renders to the same artifact every time.

pub mod component;
pub mod error;
pub mod node;
pub mod store;

pub use component::{
    Component, ComponentKind, ComponentLoader, HTML_TEMPLATE_FILENAME, ResourceFile,
    SCRIPT_ENTRYPOINT_FILENAME, STYLESHEET_FILENAME, extract_store_usage,
};
pub use error::ComposeError;
pub use node::{Node, RenderArtifact};
pub use store::Store;
