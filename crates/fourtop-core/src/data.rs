use std::{fmt::Display, ops::Index, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::utils::{
    enums::FloatPrecision,
    vectors::{AngularPosition, Vec4},
};

/// Parquet reading and writing of [`Dataset`]s and [`MatchedDataset`]s.
pub mod io;

pub use io::{read_matched_parquet, read_parquet, write_matched_parquet, write_parquet};

/// Default number of events written per Parquet record batch.
pub const DEFAULT_WRITE_BATCH_SIZE: usize = 10_000;

/// One entry of an event's generator record.
///
/// Daughters are referenced by an inclusive index range `d1..=d2` into the same event's record. A
/// negative index or `d1 > d2` means the particle has no daughters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Signed PDG particle code.
    pub pid: i32,
    /// Generator status code.
    pub status: i32,
    /// Index of the first daughter.
    pub d1: i32,
    /// Index of the last daughter.
    pub d2: i32,
    /// The four-momentum of the particle.
    pub p4: Vec4,
}

impl Particle {
    /// Create a new [`Particle`].
    pub fn new(pid: i32, status: i32, d1: i32, d2: i32, p4: Vec4) -> Self {
        Self {
            pid,
            status,
            d1,
            d2,
            p4,
        }
    }
}

impl AngularPosition for Particle {
    fn eta(&self) -> f64 {
        self.p4.eta()
    }
    fn phi(&self) -> f64 {
        self.p4.phi()
    }
}

/// A reconstructed jet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Jet {
    /// Transverse momentum.
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuthal angle.
    pub phi: f64,
    /// Invariant mass.
    pub mass: f64,
    /// b-tagging flag, nonzero if tagged.
    pub btag: i32,
}

impl Jet {
    /// Create a new [`Jet`].
    pub fn new(pt: f64, eta: f64, phi: f64, mass: f64, btag: i32) -> Self {
        Self {
            pt,
            eta,
            phi,
            mass,
            btag,
        }
    }

    /// Whether the jet carries a b-tag.
    pub fn is_btagged(&self) -> bool {
        self.btag != 0
    }

    /// The four-momentum of the jet.
    pub fn p4(&self) -> Vec4 {
        Vec4::from_pt_eta_phi_m(self.pt, self.eta, self.phi, self.mass)
    }
}

impl AngularPosition for Jet {
    fn eta(&self) -> f64 {
        self.eta
    }
    fn phi(&self) -> f64 {
        self.phi
    }
}

/// A single collision event: its full generator record and its reconstructed jets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The generator record.
    pub particles: Vec<Particle>,
    /// The reconstructed jets, in detector order.
    pub jets: Vec<Jet>,
}

impl Event {
    /// Create a new [`Event`].
    pub fn new(particles: Vec<Particle>, jets: Vec<Jet>) -> Self {
        Self { particles, jets }
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Event:")?;
        writeln!(f, "  particles:")?;
        for (index, particle) in self.particles.iter().enumerate() {
            writeln!(
                f,
                "    [{index}] pid={} status={} daughters=({}, {}) p4={}",
                particle.pid,
                particle.status,
                particle.d1,
                particle.d2,
                particle.p4.to_p4_string()
            )?;
        }
        writeln!(f, "  jets:")?;
        for (index, jet) in self.jets.iter().enumerate() {
            writeln!(
                f,
                "    [{index}] pt={} eta={} phi={} mass={} btag={}",
                jet.pt, jet.eta, jet.phi, jet.mass, jet.btag
            )?;
        }
        Ok(())
    }
}

/// An ordered collection of [`Event`]s.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    events: Vec<Arc<Event>>,
}

impl Dataset {
    /// Create a new [`Dataset`] from a list of [`Event`]s.
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events: events.into_iter().map(Arc::new).collect(),
        }
    }

    /// The events in the [`Dataset`].
    pub fn events(&self) -> &[Arc<Event>] {
        &self.events
    }

    /// The number of events in the [`Dataset`].
    pub fn n_events(&self) -> usize {
        self.events.len()
    }

    /// Whether the [`Dataset`] holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate over the events in order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(AsRef::as_ref)
    }
}

impl Index<usize> for Dataset {
    type Output = Event;

    fn index(&self, index: usize) -> &Self::Output {
        &self.events[index]
    }
}

impl FromIterator<Event> for Dataset {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// An event which survived selection and was fully matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchedEvent {
    /// Position of the event in the input [`Dataset`]. Events loaded with
    /// [`read_matched_parquet`] are numbered by their row in the file instead.
    pub index: usize,
    /// The selected jets, in their original relative order.
    pub jets: Vec<Jet>,
    /// For each selected jet, the index of its parton or
    /// [`UNMATCHED`](crate::matching::UNMATCHED).
    pub jet_parton_match: Vec<i32>,
}

impl MatchedEvent {
    /// The jets which were matched to a parton, together with that parton.
    pub fn matched_jets(&self) -> impl Iterator<Item = (&Jet, usize)> {
        self.jets
            .iter()
            .zip(self.jet_parton_match.iter())
            .filter_map(|(jet, &parton)| usize::try_from(parton).ok().map(|parton| (jet, parton)))
    }
}

/// The output of [`process`](crate::pipeline::process): every kept event, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchedDataset {
    events: Vec<MatchedEvent>,
}

impl MatchedDataset {
    /// Create a new [`MatchedDataset`].
    pub fn new(events: Vec<MatchedEvent>) -> Self {
        Self { events }
    }

    /// The kept events.
    pub fn events(&self) -> &[MatchedEvent] {
        &self.events
    }

    /// The number of kept events.
    pub fn n_events(&self) -> usize {
        self.events.len()
    }

    /// Whether no event was kept.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate over the kept events.
    pub fn iter(&self) -> std::slice::Iter<'_, MatchedEvent> {
        self.events.iter()
    }
}

impl Index<usize> for MatchedDataset {
    type Output = MatchedEvent;

    fn index(&self, index: usize) -> &Self::Output {
        &self.events[index]
    }
}

/// Options for writing Parquet files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetWriteOptions {
    /// Number of events to include in each batch when writing.
    pub batch_size: usize,
    /// Floating-point precision to use for persisted columns.
    pub precision: FloatPrecision,
}

impl Default for DatasetWriteOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_WRITE_BATCH_SIZE,
            precision: FloatPrecision::default(),
        }
    }
}

impl DatasetWriteOptions {
    /// Override the batch size used for writing; defaults to 10_000.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Select the floating-point precision for persisted columns.
    pub fn precision(mut self, precision: FloatPrecision) -> Self {
        self.precision = precision;
        self
    }
}

/// A fully hadronic $`t\bar{t}`$ event that can be used to test the resolver and the matcher.
///
/// The record contains initial-state gluons, intermediate top copies, a bottom quark with three
/// radiation copies, a W boson which radiates a photon, and a light antiquark which radiates a
/// gluon. The resolved partons are the particles `[13, 17, 21, 8, 19, 20]`.
///
/// Of the nine jets, two fail the default jet selection (one too soft, one too forward) and one
/// passes it without being near any parton. The remaining six sit within $`\Delta R < 0.04`$ of
/// one parton each.
pub fn test_event() -> Event {
    let b_minus = Vec4::from_pt_eta_phi_m(150.0, 0.3, 0.4, 4.7);
    let q0 = Vec4::from_pt_eta_phi_m(115.0, -1.1, 1.6, 0.0);
    let q1 = Vec4::from_pt_eta_phi_m(95.0, 1.4, -2.1, 0.0);
    let b_plus = Vec4::from_pt_eta_phi_m(70.0, -0.6, -0.9, 4.7);
    let q2 = Vec4::from_pt_eta_phi_m(65.0, 1.9, 2.7, 0.0);
    let q3 = Vec4::from_pt_eta_phi_m(50.0, -1.8, -2.8, 0.0);
    let w_plus = q0 + q1;
    let w_minus = q2 + q3;
    let top = b_minus + w_plus;
    let antitop = b_plus + w_minus;
    let gluon = Vec4::default();
    let p = Particle::new;
    Event {
        particles: vec![
            p(21, 21, 2, 3, gluon),      // 0
            p(21, 21, 2, 3, gluon),      // 1
            p(6, 22, 4, 4, top),         // 2
            p(-6, 22, 5, 5, antitop),    // 3
            p(6, 62, 6, 7, top),         // 4
            p(-6, 62, 8, 9, antitop),    // 5
            p(24, 22, 10, 10, w_plus),   // 6
            p(5, 51, 11, 11, b_minus),   // 7
            p(-5, 23, 14, 14, b_plus),   // 8
            p(-24, 22, 15, 16, w_minus), // 9
            p(24, 52, 17, 18, w_plus),   // 10
            p(5, 51, 12, 12, b_minus),   // 11
            p(5, 51, 13, 13, b_minus),   // 12
            p(5, 23, -1, -1, b_minus),   // 13
            p(-5, 51, -1, -1, b_plus),   // 14
            p(-24, 52, 19, 20, w_minus), // 15
            p(22, 51, -1, -1, gluon),    // 16
            p(2, 23, -1, -1, q0),        // 17
            p(-1, 51, 21, 22, q1),       // 18
            p(1, 23, -1, -1, q2),        // 19
            p(-2, 23, -1, -1, q3),       // 20
            p(-1, 23, -1, -1, q1),       // 21
            p(21, 51, -1, -1, gluon),    // 22
        ],
        jets: vec![
            Jet::new(140.0, 0.32, 0.37, 12.0, 1),  // b-
            Jet::new(25.0, 0.28, 0.43, 5.0, 0),    // too soft
            Jet::new(110.0, -1.08, 1.57, 9.0, 0),  // q0
            Jet::new(90.0, 1.42, -2.13, 8.0, 0),   // q1
            Jet::new(80.0, 2.6, 0.0, 7.0, 0),      // too forward
            Jet::new(75.0, -0.58, -0.93, 10.0, 1), // b+
            Jet::new(35.0, 0.0, 3.0, 4.0, 0),      // stray
            Jet::new(60.0, 1.92, 2.67, 6.0, 0),    // q2
            Jet::new(45.0, -1.78, -2.83, 5.0, 0),  // q3
        ],
    }
}

/// A [`Dataset`] that can be used for testing: [`test_event`], a copy of it whose b-tags were
/// removed, and a copy with a broken generator record (the antitop is missing).
pub fn test_dataset() -> Dataset {
    let good = test_event();
    let mut untagged = test_event();
    for jet in untagged.jets.iter_mut() {
        jet.btag = 0;
    }
    let mut broken = test_event();
    broken.particles[5].status = 22;
    Dataset::new(vec![good, untagged, broken])
}
