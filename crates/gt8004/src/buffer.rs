// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

//! Pending entries waiting for the next flush.

use std::mem;
use std::sync::{Mutex, PoisonError};

use crate::entry::Entry;
use crate::errors::TransportError;

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<Entry>,
    sealed: bool,
}

/// Mutex-guarded accumulator shared by every `record()` caller and the flush task.
///
/// The lock is only held for a push or a swap, never across I/O.
#[derive(Debug)]
pub struct Buffer {
    batch_size: usize,
    inner: Mutex<Inner>,
}

impl Buffer {
    #[must_use]
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            inner: Mutex::new(Inner {
                entries: Vec::with_capacity(batch_size),
                sealed: false,
            }),
        }
    }

    /// Appends an entry and reports whether the buffer reached the flush threshold.
    ///
    /// # Errors
    /// Returns [`TransportError::Closed`] once the buffer has been sealed.
    pub fn append(&self, entry: Entry) -> Result<bool, TransportError> {
        let mut inner = self.lock();
        if inner.sealed {
            return Err(TransportError::Closed);
        }
        inner.entries.push(entry);
        Ok(inner.entries.len() >= self.batch_size)
    }

    /// Takes every pending entry in insertion order, leaving the buffer empty.
    pub fn drain(&self) -> Vec<Entry> {
        let mut inner = self.lock();
        let capacity = if inner.sealed { 0 } else { self.batch_size };
        mem::replace(&mut inner.entries, Vec::with_capacity(capacity))
    }

    /// Rejects all further appends. Entries already held stay drainable.
    pub fn seal(&self) {
        self.lock().sealed = true;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn entry(id: usize) -> Entry {
        Entry::builder("POST", "/mcp")
            .request_id(id.to_string())
            .build()
    }

    #[test]
    fn test_append_reports_threshold() {
        let buffer = Buffer::new(2);

        assert!(!buffer.append(entry(0)).unwrap());
        assert!(buffer.append(entry(1)).unwrap());
        // Staying above the threshold keeps signalling.
        assert!(buffer.append(entry(2)).unwrap());
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_drain_empties_in_order() {
        let buffer = Buffer::new(10);
        for i in 0..5 {
            buffer.append(entry(i)).unwrap();
        }

        let drained: Vec<_> = buffer
            .drain()
            .iter()
            .map(|e| e.request_id().to_string())
            .collect();

        assert_eq!(drained, vec!["0", "1", "2", "3", "4"]);
        assert!(buffer.is_empty());
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_sealed_buffer_rejects_appends_but_drains() {
        let buffer = Buffer::new(10);
        buffer.append(entry(0)).unwrap();
        buffer.seal();

        assert!(matches!(
            buffer.append(entry(1)),
            Err(TransportError::Closed)
        ));
        assert_eq!(buffer.drain().len(), 1);
    }

    #[test]
    fn test_concurrent_appends_and_drains_lose_nothing() {
        let buffer = Arc::new(Buffer::new(16));
        let writers: Vec<_> = (0..8)
            .map(|w| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        buffer.append(entry(w * 1000 + i)).unwrap();
                    }
                })
            })
            .collect();

        let mut seen = Vec::new();
        while writers.iter().any(|w| !w.is_finished()) {
            seen.extend(buffer.drain());
        }
        for writer in writers {
            writer.join().unwrap();
        }
        seen.extend(buffer.drain());

        let ids: HashSet<_> = seen.iter().map(|e| e.request_id().to_string()).collect();
        assert_eq!(seen.len(), 8 * 250);
        assert_eq!(ids.len(), seen.len());
    }

    proptest! {
        #[test]
        fn prop_threshold_signal_matches_length(batch_size in 1usize..20, appends in 0usize..60) {
            let buffer = Buffer::new(batch_size);
            for i in 0..appends {
                let reached = buffer.append(entry(i)).unwrap();
                prop_assert_eq!(reached, i + 1 >= batch_size);
            }
            prop_assert_eq!(buffer.drain().len(), appends);
        }
    }
}
