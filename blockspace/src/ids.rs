//! Process-wide identities for vertices and graphs.
//!
//! Identities are handed out by an [`IdGenerator`] that is shared (via `Arc`) by everything that
//! creates vertices or graphs. Ids are unique for the lifetime of the generator, never reused, and
//! the counters can only move forward.

use derive_more::From;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(
    Hash, Eq, PartialEq, derive_more::Debug, derive_more::Display, Clone, Copy, PartialOrd, Ord, From,
)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("V({_0})")]
#[display("{_0}")]
pub struct VertexId(pub u64);

#[derive(
    Hash, Eq, PartialEq, derive_more::Debug, derive_more::Display, Clone, Copy, PartialOrd, Ord, From,
)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("G({_0})")]
#[display("{_0}")]
pub struct GraphId(pub u64);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("cannot reset the {counter} counter to {requested}: ids up to {issued} were already issued")]
    CounterRegression {
        counter: &'static str,
        requested: u64,
        issued: u64,
    },
}

/// Monotonic counters for vertex and graph ids. Both start at 1.
#[derive(Debug)]
pub struct IdGenerator {
    next_vertex: AtomicU64,
    next_graph: AtomicU64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        IdGenerator {
            next_vertex: AtomicU64::new(1),
            next_graph: AtomicU64::new(1),
        }
    }

    pub fn next_vertex_id(&self) -> VertexId {
        VertexId(self.next_vertex.fetch_add(1, Ordering::SeqCst))
    }

    pub fn next_graph_id(&self) -> GraphId {
        GraphId(self.next_graph.fetch_add(1, Ordering::SeqCst))
    }

    /// The id the next call to [`Self::next_vertex_id`] would return.
    pub fn peek_vertex_id(&self) -> VertexId {
        VertexId(self.next_vertex.load(Ordering::SeqCst))
    }

    /// Moves the vertex counter so the next issued id is `next`.
    ///
    /// Fails if `next` would re-issue an id that was already handed out.
    pub fn reset_vertex_counter(&self, next: u64) -> Result<(), IdError> {
        reset_counter(&self.next_vertex, next, "vertex")
    }

    pub fn reset_graph_counter(&self, next: u64) -> Result<(), IdError> {
        reset_counter(&self.next_graph, next, "graph")
    }

    /// Makes sure ids issued from now on are all larger than `seen`.
    ///
    /// Used when importing vertices that were numbered elsewhere.
    pub fn observe_vertex_id(&self, seen: VertexId) {
        self.next_vertex
            .fetch_max(seen.0.saturating_add(1), Ordering::SeqCst);
    }
}

fn reset_counter(counter: &AtomicU64, next: u64, name: &'static str) -> Result<(), IdError> {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            (next >= current).then_some(next)
        })
        .map(|_| ())
        .map_err(|current| IdError::CounterRegression {
            counter: name,
            requested: next,
            issued: current.saturating_sub(1),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn counters_start_at_one_and_increase() {
        let ids = IdGenerator::new();
        assert_eq!(ids.next_vertex_id(), VertexId(1));
        assert_eq!(ids.next_vertex_id(), VertexId(2));
        assert_eq!(ids.next_graph_id(), GraphId(1));
        assert_eq!(ids.peek_vertex_id(), VertexId(3));
    }

    #[test]
    fn reset_to_lower_value_is_rejected() {
        let ids = IdGenerator::new();
        for _ in 0..5 {
            ids.next_vertex_id();
        }
        let err = ids.reset_vertex_counter(3).unwrap_err();
        assert_eq!(
            err,
            IdError::CounterRegression {
                counter: "vertex",
                requested: 3,
                issued: 5
            }
        );
        ids.reset_vertex_counter(10).unwrap();
        assert_eq!(ids.next_vertex_id(), VertexId(10));
    }

    #[test]
    fn observing_external_ids_skips_past_them() {
        let ids = IdGenerator::new();
        ids.observe_vertex_id(VertexId(41));
        assert_eq!(ids.next_vertex_id(), VertexId(42));
        ids.observe_vertex_id(VertexId(7));
        assert_eq!(ids.next_vertex_id(), VertexId(43));
    }

    #[test]
    fn concurrent_issuing_never_repeats() {
        let ids = Arc::new(IdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..250).map(|_| ids.next_vertex_id()).collect::<Vec<_>>())
            })
            .collect();
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "{id:?} issued twice");
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}
