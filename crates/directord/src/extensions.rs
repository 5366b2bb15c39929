//! Optional handler bundles enabled from the command line.
//!
//! An extension installs one or more handlers into the registry. Extensions
//! are enabled once, after the built-in handlers and before the listener
//! starts; an extension that is unknown or cannot load is reported and
//! skipped so the rest of the server still comes up.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use director_config::UE_PYTHON_EXTENSION;

use crate::health::HealthReporter;
use crate::registry::HandlerRegistry;

/// Errors raised while enabling an extension.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtensionError {
    /// No extension with this name is known.
    #[error("unknown extension '{name}'")]
    Unknown {
        /// Requested name.
        name: String,
    },
    /// The extension exists but cannot run in this process.
    #[error("extension '{name}' is unavailable: {reason}")]
    Unavailable {
        /// Extension name.
        name: String,
        /// Why it cannot be loaded.
        reason: String,
    },
}

impl ExtensionError {
    /// Name of the extension that failed.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Unknown { name } | Self::Unavailable { name, .. } => name,
        }
    }
}

/// A named bundle of handlers.
pub trait Extension: Send + Sync {
    /// Name used on the command line.
    fn name(&self) -> &'static str;

    /// Installs the extension's handlers and returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns [`ExtensionError::Unavailable`] when the extension cannot run.
    fn register(&self, registry: &HandlerRegistry) -> Result<usize, ExtensionError>;
}

/// Bridge to the Unreal Editor's embedded Python API.
///
/// The bridge can only be loaded from inside the editor process, so a
/// standalone daemon always reports it unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UePythonExtension;

impl Extension for UePythonExtension {
    fn name(&self) -> &'static str {
        UE_PYTHON_EXTENSION
    }

    fn register(&self, _registry: &HandlerRegistry) -> Result<usize, ExtensionError> {
        Err(ExtensionError::Unavailable {
            name: UE_PYTHON_EXTENSION.to_owned(),
            reason: "the editor Python API is only reachable from inside the editor process"
                .to_owned(),
        })
    }
}

/// Extensions available to the server, keyed by name.
#[derive(Default, Clone)]
pub struct ExtensionCatalog {
    extensions: BTreeMap<String, Arc<dyn Extension>>,
}

impl fmt::Debug for ExtensionCatalog {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ExtensionCatalog")
            .field("names", &self.names())
            .finish()
    }
}

impl ExtensionCatalog {
    /// Creates an empty catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogue of the extensions shipped with the daemon.
    #[must_use]
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.add(UePythonExtension);
        catalog
    }

    /// Adds or replaces an extension.
    pub fn add<E: Extension + 'static>(&mut self, extension: E) {
        self.extensions
            .insert(extension.name().to_owned(), Arc::new(extension));
    }

    /// Known extension names in lexical order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.extensions.keys().map(String::as_str).collect()
    }

    /// Enables each requested extension, reporting failures to `reporter`.
    ///
    /// Returns the names that loaded successfully.
    pub fn enable(
        &self,
        requested: &[String],
        registry: &HandlerRegistry,
        reporter: &dyn HealthReporter,
    ) -> Vec<String> {
        let mut enabled = Vec::new();
        for name in requested {
            let outcome = self
                .extensions
                .get(name.as_str())
                .ok_or_else(|| ExtensionError::Unknown { name: name.clone() })
                .and_then(|extension| extension.register(registry));
            match outcome {
                Ok(handlers) => {
                    reporter.extension_enabled(name, handlers);
                    enabled.push(name.clone());
                }
                Err(error) => reporter.extension_failed(&error),
            }
        }
        enabled
    }
}
