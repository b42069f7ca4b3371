//! Container variants and the parent/child rules between them.

use std::fmt;

/// The four levels of the scope tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Engine,
    Host,
    Context,
    Wrapper,
}

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Engine => "Engine",
            ContainerKind::Host => "Host",
            ContainerKind::Context => "Context",
            ContainerKind::Wrapper => "Wrapper",
        }
    }

    /// The only variant this one may hold as children.
    pub fn child_kind(&self) -> Option<ContainerKind> {
        match self {
            ContainerKind::Engine => Some(ContainerKind::Host),
            ContainerKind::Host => Some(ContainerKind::Context),
            ContainerKind::Context => Some(ContainerKind::Wrapper),
            ContainerKind::Wrapper => None,
        }
    }

    pub fn can_contain(&self, child: ContainerKind) -> bool {
        self.child_kind() == Some(child)
    }

    /// Name of the routing level this variant's mapper resolves, for logs and metrics.
    pub fn routing_level(&self) -> &'static str {
        match self {
            ContainerKind::Engine => "host",
            ContainerKind::Host => "context",
            ContainerKind::Context => "handler",
            ContainerKind::Wrapper => "none",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
