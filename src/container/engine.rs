//! Engine scope: the tree root and its default virtual host.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::container::Container;

pub(crate) struct EngineScope {
    default_host: ArcSwapOption<String>,
}

impl EngineScope {
    pub(crate) fn new() -> Self {
        Self {
            default_host: ArcSwapOption::empty(),
        }
    }
}

/// Engine view of a [`Container`].
#[derive(Clone, Copy)]
pub struct Engine<'a> {
    container: &'a Container,
    scope: &'a EngineScope,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(container: &'a Container, scope: &'a EngineScope) -> Self {
        Self { container, scope }
    }

    pub fn container(&self) -> &'a Container {
        self.container
    }

    /// Host used when no name or alias matches. Stored lowercase.
    pub fn set_default_host(&self, name: &str) {
        let name = name.to_lowercase();
        tracing::debug!(engine = %self.container.label(), default_host = %name, "Default host set");
        self.scope.default_host.store(Some(Arc::new(name)));
    }

    pub fn clear_default_host(&self) {
        self.scope.default_host.store(None);
    }

    pub fn default_host(&self) -> Option<String> {
        self.scope.default_host.load().as_deref().cloned()
    }
}
