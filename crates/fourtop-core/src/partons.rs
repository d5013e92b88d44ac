use std::ops::{Index, Range};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    data::Particle,
    utils::enums::{Parton, N_PARTONS},
};

/// PDG code of the top quark.
pub const TOP_PID: i32 = 6;
/// PDG code of the bottom quark.
pub const BOTTOM_PID: i32 = 5;
/// Generator status of particles outgoing from the hard process.
pub const STATUS_HARD_OUTGOING: i32 = 23;
/// Generator status of tops after all radiation, right before they decay.
pub const STATUS_TOP_DECAYING: i32 = 62;

/// A violation of the decay topology expected for a fully hadronic $`t\bar{t}`$ pair.
///
/// These are fatal for the event they occur in but say nothing about the other events in a
/// dataset; see [`TopologyPolicy`](crate::utils::enums::TopologyPolicy).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// There is not exactly one top and one antitop with [`STATUS_TOP_DECAYING`].
    #[error("expected one top and one antitop with status {status}, found pids {found:?}")]
    TopPair {
        /// The required status
        status: i32,
        /// The pids of every candidate found
        found: Vec<i32>,
    },
    /// A particle which must decay into two daughters has a different number of them.
    #[error("particle {index} (pid {pid}) has {found} daughters, expected {expected}")]
    DaughterCount {
        /// Index of the particle in the event
        index: usize,
        /// Its pid
        pid: i32,
        /// The required number of daughters
        expected: usize,
        /// The number of daughters found
        found: usize,
    },
    /// None of the daughters of a top is a bottom quark.
    #[error("no bottom quark among the daughters of particle {index} (pid {pid})")]
    MissingBottom {
        /// Index of the top in the event
        index: usize,
        /// Its pid
        pid: i32,
    },
    /// A particle has a single daughter of a different species, so the radiation chain cannot
    /// be followed.
    #[error(
        "particle {index} (pid {pid}) has a single daughter {daughter} with a different pid {daughter_pid}"
    )]
    BrokenRadiationChain {
        /// Index of the parent in the event
        index: usize,
        /// Pid of the parent
        pid: i32,
        /// Index of the daughter in the event
        daughter: usize,
        /// Pid of the daughter
        daughter_pid: i32,
    },
    /// A daughter range points past the end of the particle array.
    #[error("daughters {d1}..={d2} of particle {index} exceed the {n_particles} particles in the event")]
    DaughterOutOfRange {
        /// Index of the parent in the event
        index: usize,
        /// First daughter index
        d1: i32,
        /// Last daughter index
        d2: i32,
        /// Number of particles in the event
        n_particles: usize,
    },
    /// Following daughters from a particle revisits a particle.
    #[error("the radiation chain starting at particle {index} does not terminate")]
    CyclicChain {
        /// Index the traversal started from
        index: usize,
    },
}

/// A read-only view of one event's generator record as a decay graph.
///
/// Each [`Particle`] refers to its direct daughters with an inclusive index range
/// `d1..=d2` into the same array.
#[derive(Debug, Clone, Copy)]
pub struct DecayTree<'a> {
    particles: &'a [Particle],
}

impl<'a> DecayTree<'a> {
    /// Wrap an event's particle array.
    pub fn new(particles: &'a [Particle]) -> Self {
        Self { particles }
    }

    /// The underlying particle array.
    pub fn particles(&self) -> &'a [Particle] {
        self.particles
    }

    /// The indices of the direct daughters of the particle at `index`.
    ///
    /// A negative first index or a reversed range means the particle has no daughters.
    pub fn daughters(&self, index: usize) -> Result<Range<usize>, TopologyError> {
        let particle = &self.particles[index];
        let (d1, d2) = (particle.d1, particle.d2);
        if d1 < 0 || d2 < d1 {
            return Ok(0..0);
        }
        let range = d1 as usize..d2 as usize + 1;
        if range.end > self.particles.len() {
            return Err(TopologyError::DaughterOutOfRange {
                index,
                d1,
                d2,
                n_particles: self.particles.len(),
            });
        }
        Ok(range)
    }

    /// The two direct daughters of the particle at `index`, in record order.
    pub fn two_daughters(&self, index: usize) -> Result<[usize; 2], TopologyError> {
        let daughters = self.daughters(index)?;
        if daughters.len() != 2 {
            return Err(TopologyError::DaughterCount {
                index,
                pid: self.particles[index].pid,
                expected: 2,
                found: daughters.len(),
            });
        }
        Ok([daughters.start, daughters.start + 1])
    }

    /// Follow the radiation chain of the particle at `index` while `predicate` holds and return
    /// the index of the last copy.
    ///
    /// A step descends into a daughter with the same pid as the current particle. With one
    /// daughter of a different pid the chain is broken and an error is returned. With two
    /// daughters of which neither has the same pid, or with any other number of daughters, the
    /// current particle is the last one.
    pub fn find_last<P>(&self, index: usize, mut predicate: P) -> Result<usize, TopologyError>
    where
        P: FnMut(&Particle) -> bool,
    {
        let mut last = index;
        // a chain of distinct particles can't be longer than the record
        for _ in 0..=self.particles.len() {
            let particle = &self.particles[last];
            if !predicate(particle) {
                return Ok(last);
            }
            let mut daughters = self.daughters(last)?;
            match daughters.len() {
                1 => {
                    let daughter = daughters.start;
                    let daughter_pid = self.particles[daughter].pid;
                    if daughter_pid != particle.pid {
                        return Err(TopologyError::BrokenRadiationChain {
                            index: last,
                            pid: particle.pid,
                            daughter,
                            daughter_pid,
                        });
                    }
                    last = daughter;
                }
                2 => match daughters.find(|&daughter| self.particles[daughter].pid == particle.pid)
                {
                    Some(daughter) => last = daughter,
                    None => return Ok(last),
                },
                _ => return Ok(last),
            }
        }
        Err(TopologyError::CyclicChain { index })
    }

    /// The indices of the top and the antitop right before their decays.
    pub fn find_top_pair(&self) -> Result<(usize, usize), TopologyError> {
        let candidates: Vec<usize> = self
            .particles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.pid.abs() == TOP_PID && p.status == STATUS_TOP_DECAYING)
            .map(|(index, _)| index)
            .collect();
        let pids = || {
            candidates
                .iter()
                .map(|&i| self.particles[i].pid)
                .collect::<Vec<_>>()
        };
        let &[first, second] = candidates.as_slice() else {
            return Err(TopologyError::TopPair {
                status: STATUS_TOP_DECAYING,
                found: pids(),
            });
        };
        match (self.particles[first].pid, self.particles[second].pid) {
            (TOP_PID, pid) if pid == -TOP_PID => Ok((first, second)),
            (pid, TOP_PID) if pid == -TOP_PID => Ok((second, first)),
            _ => Err(TopologyError::TopPair {
                status: STATUS_TOP_DECAYING,
                found: pids(),
            }),
        }
    }

    /// Split the two daughters of a top into `(bottom, W)`.
    pub fn top_daughters(&self, top: usize) -> Result<(usize, usize), TopologyError> {
        let [first, second] = self.two_daughters(top)?;
        if self.particles[first].pid.abs() == BOTTOM_PID {
            Ok((first, second))
        } else if self.particles[second].pid.abs() == BOTTOM_PID {
            Ok((second, first))
        } else {
            Err(TopologyError::MissingBottom {
                index: top,
                pid: self.particles[top].pid,
            })
        }
    }

    /// The last copy of a quark before it leaves the hard process.
    fn last_hard_copy(&self, index: usize) -> Result<usize, TopologyError> {
        self.find_last(index, |p| p.status != STATUS_HARD_OUTGOING)
    }

    /// The two light quarks from the last copy of a W boson.
    fn w_quarks(&self, w: usize) -> Result<[usize; 2], TopologyError> {
        let last_w = self.find_last(w, |_| true)?;
        let [first, second] = self.two_daughters(last_w)?;
        Ok([self.last_hard_copy(first)?, self.last_hard_copy(second)?])
    }
}

/// The indices of the six resolved partons of one event, in [`Parton`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopPartons([usize; N_PARTONS]);

impl TopPartons {
    /// The particle indices in [`Parton`] order.
    pub fn indices(&self) -> [usize; N_PARTONS] {
        self.0
    }

    /// Iterate over `(parton, particle index)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Parton, usize)> + '_ {
        Parton::ALL.into_iter().zip(self.0.iter().copied())
    }

    /// Look the partons up in the particle array they were resolved from.
    pub fn particles<'a>(&self, particles: &'a [Particle]) -> [&'a Particle; N_PARTONS] {
        self.0.map(|index| &particles[index])
    }
}

impl Index<Parton> for TopPartons {
    type Output = usize;

    fn index(&self, parton: Parton) -> &Self::Output {
        &self.0[parton.index()]
    }
}

/// Resolve the six final partons of a fully hadronic $`t\bar{t}`$ decay from an event's generator
/// record.
///
/// The top and antitop are the particles with $`|\text{pid}| = 6`$ and status 62. Each has a
/// bottom quark and a W boson as daughters. The bottom quarks and the W decay products are
/// followed through their radiation chains until they reach the hard-process status 23; the W
/// bosons are followed to their last copy before decaying.
///
/// # Errors
///
/// Returns a [`TopologyError`] if the record does not have this structure.
pub fn resolve_partons(particles: &[Particle]) -> Result<TopPartons, TopologyError> {
    let tree = DecayTree::new(particles);
    let (top, antitop) = tree.find_top_pair()?;
    let (b_minus, w_plus) = tree.top_daughters(top)?;
    let (b_plus, w_minus) = tree.top_daughters(antitop)?;

    let b_minus = tree.last_hard_copy(b_minus)?;
    let b_plus = tree.last_hard_copy(b_plus)?;
    let [q0, q1] = tree.w_quarks(w_plus)?;
    let [q2, q3] = tree.w_quarks(w_minus)?;

    Ok(TopPartons([b_minus, q0, q1, b_plus, q2, q3]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_event;
    use crate::utils::vectors::Vec4;

    fn particle(pid: i32, status: i32, d1: i32, d2: i32) -> Particle {
        Particle {
            pid,
            status,
            d1,
            d2,
            p4: Vec4::default(),
        }
    }

    /// A minimal $`t\bar{t}`$ record with no radiation at all.
    fn bare_record() -> Vec<Particle> {
        vec![
            particle(6, 62, 2, 3),   // 0
            particle(-6, 62, 4, 5),  // 1
            particle(5, 23, -1, -1), // 2
            particle(24, 22, 6, 7),  // 3
            particle(-24, 22, 8, 9), // 4
            particle(-5, 23, -1, -1), // 5
            particle(2, 23, -1, -1), // 6
            particle(-1, 23, -1, -1), // 7
            particle(1, 23, -1, -1), // 8
            particle(-2, 23, -1, -1), // 9
        ]
    }

    #[test]
    fn test_resolve_bare_record() {
        let partons = resolve_partons(&bare_record()).unwrap();
        assert_eq!(partons.indices(), [2, 6, 7, 5, 8, 9]);
        assert_eq!(partons[Parton::BPlus], 5);
    }

    #[test]
    fn test_resolve_with_radiation() {
        let event = test_event();
        let partons = resolve_partons(&event.particles).unwrap();
        assert_eq!(partons.indices(), [13, 17, 21, 8, 19, 20]);
        let resolved = partons.particles(&event.particles);
        assert_eq!(resolved[0].pid, 5);
        assert_eq!(resolved[3].pid, -5);
        assert!(resolved.iter().all(|p| p.status == STATUS_HARD_OUTGOING));
    }

    #[test]
    fn test_bottom_chain_skips_three_copies() {
        let event = test_event();
        let tree = DecayTree::new(&event.particles);
        // 7 -> 11 -> 12 -> 13, all b quarks, only the last one has status 23
        let last = tree.find_last(7, |p| p.status != STATUS_HARD_OUTGOING).unwrap();
        assert_eq!(last, 13);
    }

    #[test]
    fn test_predicate_checked_before_descending() {
        let event = test_event();
        let tree = DecayTree::new(&event.particles);
        // the antibottom already has status 23 even though it has a daughter copy
        assert_eq!(tree.find_last(8, |p| p.status != 23).unwrap(), 8);
        assert_eq!(tree.find_last(8, |_| true).unwrap(), 14);
    }

    #[test]
    fn test_ambiguous_branch_stops() {
        let mut record = bare_record();
        // the W+ radiates into two particles, neither of which is a W+
        record[3].status = 44;
        let tree = DecayTree::new(&record);
        assert_eq!(tree.find_last(3, |_| true).unwrap(), 3);
    }

    #[test]
    fn test_two_daughter_step_takes_same_pid() {
        let event = test_event();
        let tree = DecayTree::new(&event.particles);
        // W- (9) -> [W- (15), photon (16)]
        assert_eq!(tree.find_last(9, |_| true).unwrap(), 15);
    }

    #[test]
    fn test_broken_radiation_chain() {
        let mut record = bare_record();
        record[2] = particle(5, 51, 6, 6);
        let err = resolve_partons(&record).unwrap_err();
        assert_eq!(
            err,
            TopologyError::BrokenRadiationChain {
                index: 2,
                pid: 5,
                daughter: 6,
                daughter_pid: 2,
            }
        );
    }

    #[test]
    fn test_missing_antitop() {
        let mut record = bare_record();
        record[1].status = 22;
        let err = resolve_partons(&record).unwrap_err();
        assert_eq!(
            err,
            TopologyError::TopPair {
                status: STATUS_TOP_DECAYING,
                found: vec![6],
            }
        );
    }

    #[test]
    fn test_two_tops_same_sign() {
        let mut record = bare_record();
        record[1].pid = 6;
        assert!(matches!(
            resolve_partons(&record),
            Err(TopologyError::TopPair { .. })
        ));
    }

    #[test]
    fn test_three_top_daughters() {
        let mut record = bare_record();
        record[0].d2 = 4;
        assert_eq!(
            resolve_partons(&record).unwrap_err(),
            TopologyError::DaughterCount {
                index: 0,
                pid: 6,
                expected: 2,
                found: 3,
            }
        );
    }

    #[test]
    fn test_w_with_three_daughters() {
        let mut record = bare_record();
        record[3].d2 = 8;
        assert_eq!(
            resolve_partons(&record).unwrap_err(),
            TopologyError::DaughterCount {
                index: 3,
                pid: 24,
                expected: 2,
                found: 3,
            }
        );
    }

    #[test]
    fn test_stable_w() {
        let mut record = bare_record();
        record[4].d1 = -1;
        record[4].d2 = -1;
        assert_eq!(
            resolve_partons(&record).unwrap_err(),
            TopologyError::DaughterCount {
                index: 4,
                pid: -24,
                expected: 2,
                found: 0,
            }
        );
    }

    #[test]
    fn test_top_without_bottom() {
        let mut record = bare_record();
        record[2].pid = 3;
        assert_eq!(
            resolve_partons(&record).unwrap_err(),
            TopologyError::MissingBottom { index: 0, pid: 6 }
        );
    }

    #[test]
    fn test_daughter_out_of_range() {
        let mut record = bare_record();
        record[4].d2 = 10;
        assert!(matches!(
            resolve_partons(&record),
            Err(TopologyError::DaughterOutOfRange { index: 4, .. })
        ));
    }

    #[test]
    fn test_cyclic_chain() {
        let mut record = bare_record();
        record[2] = particle(5, 51, 2, 2);
        assert_eq!(
            resolve_partons(&record).unwrap_err(),
            TopologyError::CyclicChain { index: 2 }
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let event = test_event();
        assert_eq!(
            resolve_partons(&event.particles),
            resolve_partons(&event.particles)
        );
    }
}
