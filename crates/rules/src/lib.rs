//! YARA rule compilation for paste monitoring.
//!
//! This crate provides:
//! - `[namespace:]path` rule references and their ordered collection
//! - An explicit compiler builder that registers every source under its namespace
//! - The immutable, shareable scanning engine it produces

pub mod compiler;
pub mod engine;
pub mod error;
pub mod spec;

pub use compiler::{compile, compile_with_globals, RuleCompiler};
pub use engine::ScanningEngine;
pub use error::{CompileError, RuleSpecError, ScanError};
pub use spec::{GlobalDefinition, GlobalValue, RuleDescriptor, RuleDescriptorSet};
