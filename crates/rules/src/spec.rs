//! Rule references of the form `[namespace:]path`.
//!
//! A reference is given once per repeated `--rules` flag and accumulated
//! into a [`RuleDescriptorSet`], which the compiler consumes in order.

use std::fmt;
use std::str::FromStr;

use crate::error::RuleSpecError;

/// One rule source plus the namespace its rules are registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDescriptor {
    /// Empty string means the global namespace.
    pub namespace: String,
    /// Path of the rule file.
    pub source: String,
}

impl RuleDescriptor {
    /// Parse a `[namespace:]path` reference, splitting on the first `:`.
    pub fn parse(arg: &str) -> Result<Self, RuleSpecError> {
        if arg.is_empty() {
            return Err(RuleSpecError::EmptyArgument);
        }

        let (namespace, source) = match arg.split_once(':') {
            Some((namespace, source)) => (namespace, source),
            None => ("", arg),
        };

        if source.is_empty() {
            return Err(RuleSpecError::EmptySource(arg.to_string()));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            source: source.to_string(),
        })
    }

    pub fn is_global(&self) -> bool {
        self.namespace.is_empty()
    }
}

impl FromStr for RuleDescriptor {
    type Err = RuleSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.namespace.is_empty() {
            write!(f, "{}:", self.namespace)?;
        }
        f.write_str(&self.source)
    }
}

/// Append-only, insertion-ordered collection of rule descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleDescriptorSet {
    descriptors: Vec<RuleDescriptor>,
}

impl RuleDescriptorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `arg` and append it. The set is left untouched on error.
    pub fn push_arg(&mut self, arg: &str) -> Result<(), RuleSpecError> {
        let descriptor = RuleDescriptor::parse(arg)?;
        self.descriptors.push(descriptor);
        Ok(())
    }

    pub fn push(&mut self, descriptor: RuleDescriptor) {
        self.descriptors.push(descriptor);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RuleDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl FromIterator<RuleDescriptor> for RuleDescriptorSet {
    fn from_iter<I: IntoIterator<Item = RuleDescriptor>>(iter: I) -> Self {
        Self {
            descriptors: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RuleDescriptorSet {
    type Item = &'a RuleDescriptor;
    type IntoIter = std::slice::Iter<'a, RuleDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Space-joined descriptors in insertion order.
impl fmt::Display for RuleDescriptorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, descriptor) in self.descriptors.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{descriptor}")?;
        }
        Ok(())
    }
}

/// External variable defined on the compiler, written `name=value`.
///
/// `true`/`false` become booleans, integers become integers, anything else
/// is a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalDefinition {
    pub name: String,
    pub value: GlobalValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl FromStr for GlobalDefinition {
    type Err = RuleSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, raw) = s
            .split_once('=')
            .filter(|(name, _)| !name.trim().is_empty())
            .ok_or_else(|| RuleSpecError::MalformedGlobal(s.to_string()))?;

        let value = match raw {
            "true" => GlobalValue::Bool(true),
            "false" => GlobalValue::Bool(false),
            _ => match raw.parse::<i64>() {
                Ok(n) => GlobalValue::Integer(n),
                Err(_) => GlobalValue::Text(raw.to_string()),
            },
        };

        Ok(Self {
            name: name.trim().to_string(),
            value,
        })
    }
}
