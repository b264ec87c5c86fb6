//! # reval-core: Paths and Storage
//!
//! The leaf crate of the reval workspace. It knows nothing about schemas or
//! validation state; it only answers two questions:
//!
//! 1. **Where is a value?** [`path`] converts between canonical string paths
//!    (`/car/wheels/2`) and [`Route`]s (ordered key/index segments), and
//!    resolves relative paths (`../b`) against a host path.
//!
//! 2. **What is there?** [`Storage`] owns a `serde_json::Value` tree and
//!    performs nested get/set by route, creating intermediate containers on
//!    write.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `reval-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod path;
pub mod storage;

pub use error::PathError;
pub use path::{Route, Segment, ROOT};
pub use storage::{type_name, Storage};
