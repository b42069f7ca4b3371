//! Structural change notifications.

use std::fmt;
use std::sync::Arc;

/// What changed on a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerEventKind {
    AddChild,
    RemoveChild,
    AddValve,
    RemoveValve,
}

impl fmt::Display for ContainerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerEventKind::AddChild => "add_child",
            ContainerEventKind::RemoveChild => "remove_child",
            ContainerEventKind::AddValve => "add_valve",
            ContainerEventKind::RemoveValve => "remove_valve",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContainerEvent<'a> {
    pub kind: ContainerEventKind,
    /// Label of the container that changed, e.g. `Host[a]`.
    pub container: &'a str,
    /// Name of the child or valve added or removed.
    pub subject: &'a str,
}

/// Receives container events synchronously on the mutating thread.
pub trait ContainerListener: Send + Sync {
    fn container_event(&self, event: &ContainerEvent<'_>);
}

impl<F> ContainerListener for F
where
    F: Fn(&ContainerEvent<'_>) + Send + Sync,
{
    fn container_event(&self, event: &ContainerEvent<'_>) {
        self(event)
    }
}

pub type SharedContainerListener = Arc<dyn ContainerListener>;
