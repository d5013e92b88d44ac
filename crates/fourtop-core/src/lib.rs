//! # fourtop-core
//!
//! This is an internal crate used by `fourtop`.
//!
//! It contains the two per-event algorithms (the decay-chain resolver in [`partons`] and the
//! greedy jet-parton matcher in [`matching`]) together with the event data model, the kinematic
//! selection, the batch [`pipeline`] and Parquet I/O.
#![warn(clippy::perf, clippy::style)]

use thiserror::Error;

/// Methods for loading, storing and writing [`Event`](crate::data::Event)-based data.
pub mod data;
/// Greedy nearest-neighbour assignment of reconstructed jets to truth partons.
pub mod matching;
/// Resolution of the final-state partons of a $`t\bar{t}`$ decay from generator records.
pub mod partons;
/// Batch processing of a [`Dataset`] through selection, resolution and matching.
pub mod pipeline;
/// Jet and event selection cuts and the resulting cut-flow.
pub mod selection;
/// Utility functions, enums and vectors.
pub mod utils;

pub use crate::data::{
    read_matched_parquet, read_parquet, write_matched_parquet, write_parquet, Dataset,
    DatasetWriteOptions, Event, Jet, MatchedDataset, MatchedEvent, Particle,
};
pub use crate::matching::{match_jets, MatchingOptions, PartonJetMatch, UNMATCHED};
pub use crate::partons::{resolve_partons, DecayTree, TopPartons, TopologyError};
pub use crate::pipeline::{process, ProcessOptions};
pub use crate::selection::{Cut, Cutflow, EventSelection, JetSelection};
pub use crate::utils::enums::{FloatPrecision, Parton, TopologyPolicy, N_PARTONS};
pub use crate::utils::vectors::{AngularPosition, Vec3, Vec4};

/// A [`Result`] with a [`FourTopError`] error type.
pub type FourTopResult<T> = Result<T, FourTopError>;

/// The error type used by all `fourtop` internal methods
#[derive(Error, Debug)]
pub enum FourTopError {
    /// An alias for [`std::io::Error`].
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
    /// An alias for [`parquet::errors::ParquetError`].
    #[error("Parquet Error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),
    /// An alias for [`arrow::error::ArrowError`].
    #[error("Arrow Error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),
    /// An alias for [`shellexpand::LookupError`].
    #[error("Failed to expand path: {0}")]
    LookupError(#[from] shellexpand::LookupError<std::env::VarError>),
    /// A required column was not present in the input file.
    #[error("Required column \"{name}\" was not found")]
    MissingColumn {
        /// Canonical name of the missing column
        name: String,
    },
    /// A column was present but had a data type which cannot be read.
    #[error("Column \"{name}\" has unsupported type {data_type}")]
    ColumnType {
        /// Name of the offending column
        name: String,
        /// The data type found in the file
        data_type: String,
    },
    /// Columns which must describe the same collection disagree in length.
    #[error("Length mismatch for {context}: expected {expected}, found {actual}")]
    LengthMismatch {
        /// What was being read when the mismatch occurred
        context: String,
        /// Expected length
        expected: usize,
        /// Length actually found
        actual: usize,
    },
    /// A list item which must be present was null.
    #[error("Column \"{name}\" contains a null value")]
    NullValue {
        /// Name of the offending column
        name: String,
    },
    /// An integer value does not fit into the type it is read as.
    #[error("Column \"{name}\" contains the out-of-range value {value}")]
    ValueOutOfRange {
        /// Name of the offending column
        name: String,
        /// The value found in the file
        value: String,
    },
    /// An error which occurs when the user tries to parse an invalid string of text, typically
    /// into an enum variant.
    #[error("Failed to parse string: \"{name}\" does not correspond to a valid \"{object}\"!")]
    ParseError {
        /// The string which was parsed
        name: String,
        /// The name of the object it failed to parse into
        object: String,
    },
    /// A decay-topology violation in one event, raised when processing runs with
    /// [`TopologyPolicy::Abort`].
    #[error("Decay topology violation in event {event}: {source}")]
    Topology {
        /// Index of the event in the input dataset
        event: usize,
        /// The underlying violation
        source: TopologyError,
    },
    /// An error type for [`rayon`] thread pools
    #[cfg(feature = "rayon")]
    #[error("Error building thread pool: {0}")]
    ThreadPoolError(#[from] rayon::ThreadPoolBuildError),
    /// A custom fallback error for errors too complex or too infrequent to warrant their own error
    /// category.
    #[error("{0}")]
    Custom(String),
}
