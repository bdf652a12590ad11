#![warn(missing_docs)]

//! hacfg management subsystem: command line, configuration loading, file-backed document store

pub mod cli;
pub mod config;
pub mod reporter;
pub mod store;

pub use config::MgmtConfig;
pub use reporter::TracingReporter;
pub use store::FileDocumentStore;
