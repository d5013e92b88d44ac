//! `fourtop` matches reconstructed jets to the truth partons of fully hadronic top-quark pairs in
//! simulated four-top events.
//!
//! # Overview
//! For every event, two steps are performed:
//!
//! 1. The generator record is walked to find the six final partons of the $`t\bar{t}`$ decay:
//!    the bottom quark and the two W decay quarks on each side, after all radiation
//!    ([`resolve_partons`]).
//! 2. The partons are assigned to the event's selected jets by a greedy nearest-neighbour search
//!    in $`\Delta R`$ with a maximum distance ([`match_jets`]).
//!
//! The [`process`] function runs both steps over a whole [`Dataset`], after applying the jet
//! and event selection, and keeps the events in which every parton found a jet.
//!
//! # Quick Start
//! ```no_run
//! use fourtop::prelude::*;
//!
//! fn main() -> FourTopResult<()> {
//!     let dataset = read_parquet("events.parquet")?;
//!     let options = ProcessOptions::new()
//!         .matching(MatchingOptions::default().max_distance(0.3))
//!         .topology_policy(TopologyPolicy::Skip);
//!     let (matched, cutflow) = process(&dataset, &options)?;
//!     print!("{cutflow}");
//!     write_matched_parquet(&matched, "matched.parquet", &DatasetWriteOptions::default())?;
//!     Ok(())
//! }
//! ```
//!
//! # Data Format
//! Input files are Parquet files with one row per event and list columns for the particle and
//! jet collections:
//!
//! | column | type |
//! |---|---|
//! | `particle_pid`, `particle_status`, `particle_d1`, `particle_d2` | `list<int32>` or `list<int64>` |
//! | `particle_px`, `particle_py`, `particle_pz`, `particle_e` | `list<float32>` or `list<float64>` |
//! | `jet_pt`, `jet_eta`, `jet_phi`, `jet_mass` | `list<float32>` or `list<float64>` |
//! | `jet_btag` | `list<int32>`, `list<int64>` or `list<bool>` |
//!
//! Delphes branch names (`Particle.PID`, `Jet.PT`, ...) are recognised as well. The output has
//! the selected jets of every kept event in `jet_pt`, `jet_eta`, `jet_phi`, `jet_mass` and
//! `jet_btag`, and the index of each jet's parton (or `-1`) in `jet_parton_match`. Parton indices
//! follow the order of [`Parton`].
//!
//! # Command Line
//! The `fourtop-match` binary wraps [`process`]:
//! ```shell
//! fourtop-match -i events.parquet -o matched.parquet --max-distance 0.3
//! ```
#![warn(clippy::perf, clippy::style, missing_docs)]

/// Methods for loading, storing and writing events.
pub mod data {
    pub use fourtop_core::data::{
        io::JET_PARTON_MATCH_COLUMN, read_matched_parquet, read_parquet, test_dataset,
        test_event, write_matched_parquet, write_parquet, Dataset, DatasetWriteOptions, Event,
        Jet, MatchedDataset, MatchedEvent, Particle, DEFAULT_WRITE_BATCH_SIZE,
    };
}

/// Resolution of the truth partons from generator records.
pub mod partons {
    pub use fourtop_core::partons::*;
}

/// Jet-parton matching.
pub mod matching {
    pub use fourtop_core::matching::*;
}

/// Jet and event selection.
pub mod selection {
    pub use fourtop_core::selection::*;
}

/// Batch processing of datasets.
pub mod pipeline {
    pub use fourtop_core::pipeline::*;
}

/// Utility functions, enums and vectors.
pub mod utils {
    pub use fourtop_core::utils::*;
}

/// The most commonly used types and functions.
pub mod prelude {
    pub use fourtop_core::{
        match_jets, process, read_matched_parquet, read_parquet, resolve_partons,
        write_matched_parquet, write_parquet, AngularPosition, Cutflow, Dataset,
        DatasetWriteOptions, Event, EventSelection, FloatPrecision, FourTopError, FourTopResult,
        Jet, JetSelection, MatchedDataset, MatchedEvent, MatchingOptions, Parton, Particle,
        ProcessOptions, TopologyPolicy,
    };
}

pub use fourtop_core::{
    match_jets, process, read_matched_parquet, read_parquet, resolve_partons,
    write_matched_parquet, write_parquet, AngularPosition, Cut, Cutflow, Dataset,
    DatasetWriteOptions, DecayTree, Event, EventSelection, FloatPrecision, FourTopError,
    FourTopResult, Jet, JetSelection, MatchedDataset, MatchedEvent, MatchingOptions, Parton,
    PartonJetMatch, Particle, ProcessOptions, TopPartons, TopologyError, TopologyPolicy, Vec3,
    Vec4, N_PARTONS, UNMATCHED,
};
