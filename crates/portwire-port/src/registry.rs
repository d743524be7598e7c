use std::collections::HashMap;
use std::sync::Arc;

use crate::context::{CallContext, Handler, HandlerResult};
use crate::error::{PortError, Result};
use crate::pattern::NamePattern;
use crate::value::Arg;

/// Named handlers: exact names in a map, wildcard patterns in registration
/// order.
///
/// Lookup tries the exact name first, then the first matching pattern.
/// Registration under a taken name (or a pattern source already registered)
/// fails; removal is keyed the same way, so `remove("math.*")` removes the
/// pattern, never a literal.
pub(crate) struct HandlerRegistry {
    exact: HashMap<String, Arc<Handler>>,
    wildcards: Vec<(NamePattern, Arc<Handler>)>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            exact: HashMap::new(),
            wildcards: Vec::new(),
        }
    }

    /// Register under an exact name.
    pub fn add(&mut self, name: &str, handler: Arc<Handler>) -> Result<()> {
        if name.is_empty() {
            return Err(PortError::InvalidName(name.to_owned()));
        }
        if self.exact.contains_key(name) {
            return Err(PortError::DuplicateHandler(name.to_owned()));
        }
        self.exact.insert(name.to_owned(), handler);
        Ok(())
    }

    /// Register under a wildcard pattern. Patterns are tried in the order
    /// they were added.
    pub fn add_pattern(&mut self, pattern: NamePattern, handler: Arc<Handler>) -> Result<()> {
        if self.wildcards.iter().any(|(p, _)| p.source() == pattern.source()) {
            return Err(PortError::DuplicateHandler(pattern.source().to_owned()));
        }
        self.wildcards.push((pattern, handler));
        Ok(())
    }

    /// Register a batch under a common prefix, all or nothing. Names are
    /// validated (and checked against existing and in-batch duplicates)
    /// before anything is inserted.
    pub fn add_bulk(&mut self, prefix: &str, entries: Vec<(String, Arc<Handler>)>) -> Result<()> {
        let mut prefixed = Vec::with_capacity(entries.len());
        for (name, handler) in entries {
            if name.is_empty() {
                return Err(PortError::InvalidName(name));
            }
            let full = format!("{prefix}{name}");
            if self.exact.contains_key(&full)
                || prefixed.iter().any(|(taken, _)| *taken == full)
            {
                return Err(PortError::DuplicateHandler(full));
            }
            prefixed.push((full, handler));
        }
        for (name, handler) in prefixed {
            self.exact.insert(name, handler);
        }
        Ok(())
    }

    /// Remove by exact name or pattern source. Returns whether anything was
    /// registered there.
    pub fn remove(&mut self, name: &str) -> bool {
        if self.exact.remove(name).is_some() {
            return true;
        }
        let before = self.wildcards.len();
        self.wildcards.retain(|(p, _)| p.source() != name);
        self.wildcards.len() != before
    }

    /// Whether `name` is registered, as an exact name or a pattern source.
    pub fn has(&self, name: &str) -> bool {
        self.exact.contains_key(name) || self.wildcards.iter().any(|(p, _)| p.source() == name)
    }

    /// The handler for an inbound name: exact match first, then patterns in
    /// registration order.
    pub fn resolve(&self, name: &str) -> Option<Arc<Handler>> {
        if let Some(handler) = self.exact.get(name) {
            return Some(Arc::clone(handler));
        }
        self.wildcards
            .iter()
            .find(|(pattern, _)| pattern.matches(name))
            .map(|(_, handler)| Arc::clone(handler))
    }

    pub fn clear(&mut self) {
        self.exact.clear();
        self.wildcards.clear();
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcards.len()
    }
}

/// A named batch of handlers for bulk registration.
///
/// ```
/// use portwire_port::{Arg, Handlers, Reply};
///
/// let handlers = Handlers::new()
///     .with("add", |_ctx, args| {
///         let sum: i64 = args
///             .iter()
///             .filter_map(|a| a.as_value().and_then(|v| v.as_i64()))
///             .sum();
///         Ok(Reply::now(sum))
///     })
///     .with("noop", |_ctx, _args| Ok(Reply::now(Arg::null())));
/// assert_eq!(handlers.len(), 2);
/// ```
#[derive(Default)]
pub struct Handlers {
    entries: Vec<(String, Arc<Handler>)>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler under `name` (relative to the registration prefix).
    pub fn with<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut CallContext, Vec<Arg>) -> HandlerResult + Send + Sync + 'static,
    {
        self.entries.push((name.into(), Arc::new(handler)));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Arc<Handler>)> {
        self.entries
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.entries.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("Handlers").field("names", &names).finish()
    }
}
