use std::collections::HashMap;

use crate::{MlErr, Result, StructuredModel};

type Constructor<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Registry of models constructible by name.
pub type ModelRegistry = Registry<Box<dyn StructuredModel>>;

/// Maps configured names to zero-argument constructors.
///
/// Filled once at start-up, looked up whenever a peer needs a fresh instance.
pub struct Registry<T> {
    kind: &'static str,
    constructors: HashMap<String, Constructor<T>>,
}

impl<T> Registry<T> {
    /// Creates an empty `Registry`.
    ///
    /// # Arguments
    /// * `kind` - What the registry builds, used in error messages.
    ///
    /// # Returns
    /// A new `Registry` instance.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            constructors: HashMap::new(),
        }
    }

    /// Registers `constructor` under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
        self
    }

    /// Builds a new instance of whatever is registered under `name`.
    ///
    /// # Returns
    /// The instance or `MlErr::UnknownFactory` if nothing is registered under `name`.
    pub fn build(&self, name: &str) -> Result<T> {
        match self.constructors.get(name) {
            Some(constructor) => Ok(constructor()),
            None => Err(MlErr::UnknownFactory {
                kind: self.kind,
                name: name.to_string(),
            }),
        }
    }

    /// The registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
