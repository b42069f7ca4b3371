//! Host scope: a virtual host name, its aliases and wildcard form.

use arc_swap::ArcSwap;

use crate::container::Container;
use crate::routing::matcher::HostMatcher;

pub(crate) struct HostScope {
    matcher: HostMatcher,
    aliases: ArcSwap<Vec<String>>,
}

impl HostScope {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            matcher: HostMatcher::new(name),
            aliases: ArcSwap::from_pointee(Vec::new()),
        }
    }
}

/// Host view of a [`Container`].
#[derive(Clone, Copy)]
pub struct Host<'a> {
    container: &'a Container,
    scope: &'a HostScope,
}

impl<'a> Host<'a> {
    pub(crate) fn new(container: &'a Container, scope: &'a HostScope) -> Self {
        Self { container, scope }
    }

    pub fn container(&self) -> &'a Container {
        self.container
    }

    /// True for hosts named `*.domain`.
    pub fn is_wildcard(&self) -> bool {
        self.scope.matcher.is_wildcard()
    }

    pub fn matches_wildcard(&self, host: &str) -> bool {
        self.scope.matcher.matches_wildcard(host)
    }

    /// Add an alternative name. Aliases are case-insensitive; duplicates are ignored.
    pub fn add_alias(&self, alias: &str) {
        let alias = alias.to_lowercase();
        let mut added = false;
        self.scope.aliases.rcu(|current| {
            let mut next = Vec::clone(current);
            added = !next.contains(&alias);
            if added {
                next.push(alias.clone());
            }
            next
        });
        if added {
            tracing::debug!(host = %self.container.label(), alias = %alias, "Alias added");
        }
    }

    pub fn remove_alias(&self, alias: &str) -> bool {
        let alias = alias.to_lowercase();
        let mut removed = false;
        self.scope.aliases.rcu(|current| {
            let next: Vec<String> = current.iter().filter(|a| **a != alias).cloned().collect();
            removed = next.len() != current.len();
            next
        });
        removed
    }

    pub fn aliases(&self) -> Vec<String> {
        self.scope.aliases.load().to_vec()
    }

    pub fn has_alias(&self, host: &str) -> bool {
        self.scope
            .aliases
            .load()
            .iter()
            .any(|a| a.eq_ignore_ascii_case(host))
    }
}
