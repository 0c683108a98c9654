//! Graph-rewriting operators: growth, capping, mutation, crossover and scripted edits.
//!
//! Every operator works through a [`GraphOperators`] view, which borrows the shared
//! [`BlockSpace`] and the [`GrowthSettings`] of the run. Randomness is always passed in by the
//! caller.
//!
//! "Nothing to do" outcomes (no compatible block, growth declined by probability, no crossover
//! point) are never errors. Errors are reserved for misconfiguration, indices that do not address
//! anything, and requests that would break a graph's structure; they abort the operation.

use crate::graph::GraphError;
use crate::ids::IdGenerator;
use crate::library::{LibraryError, PortRef};
use crate::settings::GrowthSettings;
use crate::space::BlockSpace;
use crate::vertex::Vertex;
use error_stack::{Report, ResultExt};
use thiserror::Error;

pub mod capping;
pub mod crossover;
pub mod edit;
pub mod growth;
pub mod mutation;

pub use crossover::CrossoverPoint;
pub use edit::GraphEdit;
pub use growth::{ChainSelection, GrowthOptions, GrowthOutcome};

pub type OperatorResult<T> = error_stack::Result<T, OperatorError>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorError {
    #[error("the building-block space is not configured for this operation")]
    Configuration,
    #[error("an index does not refer to an existing block, port or vertex")]
    Index,
    #[error("the operation would leave the graph in an inconsistent state")]
    StructuralInconsistency,
}

/// Maps leaf errors onto the operator error taxonomy.
pub(crate) trait Classify: error_stack::Context + Sized {
    fn classify(&self) -> OperatorError;
}

impl Classify for GraphError {
    fn classify(&self) -> OperatorError {
        if self.is_index_error() {
            OperatorError::Index
        } else {
            OperatorError::StructuralInconsistency
        }
    }
}

impl Classify for LibraryError {
    fn classify(&self) -> OperatorError {
        match self {
            LibraryError::IndexOutOfRange { .. } | LibraryError::PortOutOfRange { .. } => {
                OperatorError::Index
            }
            LibraryError::NotConfigured
            | LibraryError::InvalidSymmetryGroup { .. }
            | LibraryError::CappingPortCount { .. } => OperatorError::Configuration,
        }
    }
}

pub(crate) trait ClassifyExt<T> {
    fn classified(self) -> OperatorResult<T>;
}

impl<T, E: Classify> ClassifyExt<T> for Result<T, E> {
    fn classified(self) -> OperatorResult<T> {
        self.map_err(|e| {
            let context = e.classify();
            Report::new(e).change_context(context)
        })
    }
}

/// The operators of one run, bound to a building-block space and growth settings.
#[derive(Clone, Copy, Debug)]
pub struct GraphOperators<'a> {
    space: &'a BlockSpace,
    settings: &'a GrowthSettings,
}

impl<'a> GraphOperators<'a> {
    pub fn new(space: &'a BlockSpace, settings: &'a GrowthSettings) -> Self {
        GraphOperators { space, settings }
    }

    pub fn space(&self) -> &'a BlockSpace {
        self.space
    }

    pub fn settings(&self) -> &'a GrowthSettings {
        self.settings
    }

    fn ids(&self) -> &'a IdGenerator {
        self.space.ids()
    }

    /// A fresh vertex for the block owning `port`, after checking that the port exists.
    fn instantiate(&self, port: PortRef) -> OperatorResult<Vertex> {
        let library = self.space.library();
        library
            .port_class(port)
            .classified()
            .attach_printable_lazy(|| format!("instantiating {port:?}"))?;
        library
            .get_block(port.block.pool, port.block.index)
            .classified()
    }
}
