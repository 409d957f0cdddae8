use crate::{DuplicateRegistrationError, Handler, HandlerDeclaration, ResolvedCapabilities, resolve};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Builds a handler instance from its unsecure and secure configuration.
pub type HandlerFactory = Arc<dyn Fn(&str, &str) -> Box<dyn Handler> + Send + Sync>;

/// A handler type: its static declaration plus the factory that constructs
/// instances of it.
///
/// Cloning is cheap and clones share one resolution cache, so the
/// declaration is resolved at most once per type.
#[derive(Clone)]
pub struct HandlerType {
    inner: Arc<Inner>,
}

struct Inner {
    declaration: HandlerDeclaration,
    factory: HandlerFactory,
    resolved: OnceLock<Result<ResolvedCapabilities, DuplicateRegistrationError>>,
}

impl HandlerType {
    pub fn new<F>(declaration: HandlerDeclaration, factory: F) -> Self
    where
        F: Fn(&str, &str) -> Box<dyn Handler> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                declaration,
                factory: Arc::new(factory),
                resolved: OnceLock::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.declaration.name()
    }

    pub fn display_name(&self) -> &str {
        self.inner.declaration.display_name()
    }

    pub fn declaration(&self) -> &HandlerDeclaration {
        &self.inner.declaration
    }

    /// The resolved registration set, computed on first access.
    pub fn capabilities(&self) -> Result<&ResolvedCapabilities, DuplicateRegistrationError> {
        self.inner
            .resolved
            .get_or_init(|| resolve(&self.inner.declaration))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Constructs and initializes one instance.
    pub fn instantiate(&self, unsecure: &str, secure: &str) -> Box<dyn Handler> {
        let mut handler = (self.inner.factory)(unsecure, secure);
        handler.initialize();
        handler
    }
}

impl fmt::Debug for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerType")
            .field("name", &self.name())
            .field("resolved", &self.inner.resolved.get().is_some())
            .finish()
    }
}
