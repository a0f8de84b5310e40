//! Builds a [`ScanningEngine`] from an ordered set of rule descriptors.
//!
//! Compilation is all-or-nothing: the first unreadable or unparseable rule
//! source aborts the whole run, so an engine never silently lacks rules.

use std::fs;

use tracing::{debug, info};

use crate::engine::{ScanningEngine, GLOBAL_NAMESPACE};
use crate::error::{CompileError, Result};
use crate::spec::{GlobalDefinition, GlobalValue, RuleDescriptor, RuleDescriptorSet};

/// Compilation unit that rule sources are registered into.
///
/// The builder is an explicit value: create it, thread it through
/// [`add_descriptor`](Self::add_descriptor) calls, then [`finalize`](Self::finalize)
/// it once into an immutable engine.
pub struct RuleCompiler {
    inner: yara_x::Compiler<'static>,
    registered: usize,
}

impl RuleCompiler {
    /// Create an empty compilation unit.
    pub fn new() -> Result<Self> {
        Self::with_globals(&[])
    }

    /// Create an empty compilation unit with external variables defined.
    pub fn with_globals(globals: &[GlobalDefinition]) -> Result<Self> {
        let mut inner = yara_x::Compiler::new();
        for global in globals {
            let defined = match &global.value {
                GlobalValue::Bool(v) => inner.define_global(&global.name, *v),
                GlobalValue::Integer(v) => inner.define_global(&global.name, *v),
                GlobalValue::Text(v) => inner.define_global(&global.name, v.as_str()),
            };
            defined.map_err(|e| CompileError::Init(format!("global '{}': {e}", global.name)))?;
            debug!(name = %global.name, "defined global rule variable");
        }
        Ok(Self {
            inner,
            registered: 0,
        })
    }

    /// Open the descriptor's source and register it under its namespace.
    pub fn add_descriptor(&mut self, descriptor: &RuleDescriptor) -> Result<()> {
        let contents = fs::read(&descriptor.source).map_err(|cause| CompileError::SourceOpen {
            path: descriptor.source.clone(),
            cause,
        })?;
        self.add_source(&descriptor.namespace, &descriptor.source, contents)
    }

    /// Register rule source under `namespace`; `origin` names it in errors.
    /// The bytes go to the engine as-is, so encoding problems surface as
    /// [`CompileError::SourceParse`].
    pub fn add_source(
        &mut self,
        namespace: &str,
        origin: &str,
        contents: impl AsRef<[u8]>,
    ) -> Result<()> {
        let namespace = if namespace.is_empty() {
            GLOBAL_NAMESPACE
        } else {
            namespace
        };
        self.inner.new_namespace(namespace);
        self.inner
            .add_source(yara_x::SourceCode::from(contents.as_ref()).with_origin(origin))
            .map_err(|e| CompileError::SourceParse {
                path: origin.to_string(),
                cause: e.to_string(),
            })?;
        self.registered += 1;
        Ok(())
    }

    /// Number of sources registered so far.
    pub fn registered(&self) -> usize {
        self.registered
    }

    /// Turn the unit into an engine. A unit with no sources is refused: an
    /// engine without rules would never report anything.
    pub fn finalize(self) -> Result<ScanningEngine> {
        if self.registered == 0 {
            return Err(CompileError::Finalize(
                "no rule sources were registered".to_string(),
            ));
        }
        Ok(ScanningEngine::new(self.inner.build()))
    }
}

/// Compile every descriptor, in order, into one engine.
pub fn compile(descriptors: &RuleDescriptorSet) -> Result<ScanningEngine> {
    compile_with_globals(descriptors, &[])
}

/// [`compile`] with external variables defined on the compilation unit.
pub fn compile_with_globals(
    descriptors: &RuleDescriptorSet,
    globals: &[GlobalDefinition],
) -> Result<ScanningEngine> {
    let mut compiler = RuleCompiler::with_globals(globals)?;

    for descriptor in descriptors {
        compiler.add_descriptor(descriptor)?;
        let namespace = if descriptor.is_global() {
            GLOBAL_NAMESPACE
        } else {
            descriptor.namespace.as_str()
        };
        info!(source = %descriptor.source, namespace, "registered rule source");
    }

    let engine = compiler.finalize()?;
    info!(
        sources = descriptors.len(),
        rules = engine.rule_count(),
        descriptors = %descriptors,
        "rules compiled"
    );
    Ok(engine)
}
