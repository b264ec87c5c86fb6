//! # reval-schema: Rule Compilation and Result Merging
//!
//! Compiles a JSON-Schema-flavoured document into an executable [`Rule`]
//! tree and folds keyword outputs into one [`Outcome`] per path.
//!
//! ## Compilation (`compiler`)
//!
//! [`Compiler::compile`] walks the schema once. Every node becomes a
//! [`Rule`]: an implicit annotation check (`default`, `filter`, `title`,
//! `readOnly`, `dependsOn`, ...) followed by one [`Check`] per keyword, in
//! declaration order. Keywords are looked up in a [`Registry`]; an unknown
//! key or a malformed payload fails the whole compilation with a
//! [`CompileError`].
//!
//! ## Execution (`rule`, `probe`)
//!
//! Rules run against a [`Cursor`] supplied by a [`Host`]. The validation
//! graph in `reval-model` is the production host; [`ScratchHost`] serves
//! private copies for probing conditional branches and for
//! [`evaluate_detached`].
//!
//! ## Crate Policy
//!
//! - Depends only on `reval-core` internally.
//! - Rules never own storage or per-path state.
//! - An invalid value is an [`Outcome`], never an error.

pub mod compiler;
pub mod error;
pub mod keywords;
pub mod outcome;
pub mod probe;
pub mod rule;

pub use compiler::{Compiler, Filter, Keyword, Registry, Site, ANNOTATION_KEYS};
pub use error::{CompileError, RuleError};
pub use outcome::{merge_results, Outcome};
pub use probe::{evaluate_detached, ScratchHost};
pub use rule::{Check, Cursor, EvalOptions, Host, Messages, Mode, Rule, RuleFuture};
