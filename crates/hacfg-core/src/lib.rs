#![warn(missing_docs)]

//! hacfg core: cluster configuration document model, validation, option grouping and transactional publishing

pub mod args;
pub mod cib;
pub mod commands;
pub mod env;
pub mod error;
pub mod fanout;
pub mod ports;
pub mod report;
pub mod resource_args;
pub mod status;
pub mod validate;

pub use cib::{Document, NodeId, SchemaVersion, Tag};
pub use env::{EnvOptions, Environment, LiveCluster, Phase, Transaction, WaitPolicy};
pub use error::{CoreError, Result};
pub use fanout::{FanoutResult, FanoutStatus, FanoutSummary, PeerFanout, PeerOutcome};
pub use report::{ForceCode, ForceFlags, ReportItem, ReportKind, ReportList, Reporter, Severity};
