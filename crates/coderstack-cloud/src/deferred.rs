//! Values that become known only after a later construction step

use crate::error::{CloudError, Result};

/// A named value that is resolved exactly once.
///
/// Reading it before resolution is an error rather than an empty value.
#[derive(Debug, Clone)]
pub struct Deferred<T> {
    name: String,
    value: Option<T>,
}

impl<T> Deferred<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    pub fn resolve(&mut self, value: T) -> Result<()> {
        if self.value.is_some() {
            return Err(CloudError::AlreadyResolved(self.name.clone()));
        }
        tracing::debug!(name = %self.name, "Resolved deferred value");
        self.value = Some(value);
        Ok(())
    }

    /// Read the value, failing if it has not been resolved yet
    pub fn get(&self, reader: &str) -> Result<&T> {
        self.value
            .as_ref()
            .ok_or_else(|| CloudError::UnresolvedReference {
                from: reader.to_string(),
                target: self.name.clone(),
            })
    }
}
