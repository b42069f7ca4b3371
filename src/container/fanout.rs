//! Bounded fan-out of child start/stop.
//!
//! With one worker the children are processed in order on the calling
//! thread. Otherwise up to `workers` scoped threads pull children from a
//! shared index; the call returns only after every child was processed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::container::Container;
use crate::error::{Error, Result};

/// Apply `op` to every child. All children are attempted; the failure of the
/// first child (in the given order) is returned.
pub(crate) fn for_each_child<F>(
    children: &[Arc<Container>],
    workers: usize,
    phase: &'static str,
    op: F,
) -> Result<()>
where
    F: Fn(&Container) -> Result<()> + Sync,
{
    let wrap = |child: &Container, source: Error| Error::ChildLifecycle {
        child: child.label().to_string(),
        phase,
        source: Box::new(source),
    };

    if workers <= 1 || children.len() <= 1 {
        let mut first_error = None;
        for child in children {
            if let Err(e) = op(&**child) {
                first_error.get_or_insert_with(|| wrap(&**child, e));
            }
        }
        return first_error.map_or(Ok(()), Err);
    }

    let next = AtomicUsize::new(0);
    let failures = Mutex::new(Vec::new());
    std::thread::scope(|scope| {
        for _ in 0..workers.min(children.len()) {
            scope.spawn(|| loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(child) = children.get(index) else {
                    break;
                };
                if let Err(e) = op(&**child) {
                    failures
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push((index, e));
                }
            });
        }
    });

    let mut failures = failures.into_inner().unwrap_or_else(PoisonError::into_inner);
    failures.sort_by_key(|(index, _)| *index);
    match failures.into_iter().next() {
        Some((index, e)) => Err(wrap(&*children[index], e)),
        None => Ok(()),
    }
}
