//! In-memory value collection

use parking_lot::Mutex;
use std::sync::Arc;

use crate::result::{EntityRef, ValueAnnotation, ValueCollector};

/// A value collector that keeps every annotation in memory, in insertion
/// order.
///
/// Child collectors created with [`ValueCollector::with`] share the same
/// underlying list, so annotations from nested blocks end up interleaved
/// with their siblings exactly as they were emitted. The collector can be
/// reused across validations if it is [`reset`](Self::reset) between runs.
#[derive(Clone, Default)]
pub struct DefaultValueCollector {
    annotations: Arc<Mutex<Vec<ValueAnnotation>>>,
    path: Vec<EntityRef>,
}

impl DefaultValueCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all annotations collected so far.
    #[must_use]
    pub fn values(&self) -> Vec<ValueAnnotation> {
        self.annotations.lock().clone()
    }

    /// Drop all collected annotations.
    pub fn reset(&self) {
        self.annotations.lock().clear();
    }
}

impl ValueCollector for DefaultValueCollector {
    fn collect_value(&self, mut annotation: ValueAnnotation) {
        if !self.path.is_empty() {
            let mut refs = Vec::with_capacity(self.path.len() + annotation.refs.len());

            refs.extend(self.path.iter().cloned());
            refs.append(&mut annotation.refs);

            annotation.refs = refs;
        }

        self.annotations.lock().push(annotation);
    }

    fn with(&self, entity: EntityRef) -> Arc<dyn ValueCollector> {
        let mut path = self.path.clone();

        path.push(entity);

        Arc::new(Self {
            annotations: Arc::clone(&self.annotations),
            path,
        })
    }
}
