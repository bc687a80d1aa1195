//! Append-only destinations shared by consumers

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Destination that consumers append into
///
/// Implementations synchronize internally; callers never hold the queue lock
/// while appending.
pub trait Sink<T>: Send + Sync {
    /// Append one item at the tail
    fn append(&self, item: T);

    /// Number of items appended so far
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock-guarded vector sink
#[derive(Debug)]
pub struct VecSink<T> {
    items: Mutex<Vec<T>>,
}

impl<T> VecSink<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    /// Copy of the current contents, in append order
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.lock().clone()
    }

    /// Move every item out, leaving the sink empty
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for VecSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Sink<T> for VecSink<T> {
    fn append(&self, item: T) {
        self.lock().push(item);
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_append_preserves_order() {
        let sink = VecSink::new();
        sink.append("a");
        sink.append("b");

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.snapshot(), vec!["a", "b"]);
    }

    #[test]
    fn test_drain_empties_sink() {
        let sink = VecSink::new();
        sink.append(1);

        assert_eq!(sink.drain(), vec![1]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_concurrent_appends_not_lost() {
        let sink: Arc<VecSink<usize>> = Arc::new(VecSink::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for i in 0..100 {
                        sink.append(t * 100 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut items = sink.drain();
        items.sort_unstable();
        assert_eq!(items, (0..800).collect::<Vec<_>>());
    }
}
