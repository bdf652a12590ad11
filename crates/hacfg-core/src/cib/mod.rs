//! The cluster configuration document and the algorithms mutating it.

pub mod acl;
pub mod document;
pub mod ids;
pub mod nvpair;
pub mod resource;

pub use document::{Document, NodeId, SchemaVersion, Tag};
