use serde::{Deserialize, Serialize};

use crate::utils::vectors::AngularPosition;

/// The default maximum $`\Delta R`$ between a parton and the jet it is matched to.
pub const DEFAULT_MAX_DISTANCE: f64 = 0.3;

/// Sentinel used in integer outputs for "no match".
pub const UNMATCHED: i32 = -1;

/// Settings for [`match_jets`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchingOptions {
    /// Largest $`\Delta R`$ at which a parton and a jet may still be matched.
    pub max_distance: f64,
}

impl Default for MatchingOptions {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }
}

impl MatchingOptions {
    /// Override the maximum matching distance; defaults to 0.3.
    pub fn max_distance(mut self, max_distance: f64) -> Self {
        self.max_distance = max_distance;
        self
    }
}

/// The result of matching one event's partons to its jets.
///
/// Every parton has exactly one entry, which is either the index of its jet or `None`, and no
/// jet is used twice.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartonJetMatch {
    parton_to_jet: Vec<Option<usize>>,
    n_jets: usize,
}

impl PartonJetMatch {
    /// The jet matched to each parton, in parton order.
    pub fn parton_to_jet(&self) -> &[Option<usize>] {
        &self.parton_to_jet
    }

    /// The jet matched to a given parton.
    pub fn jet_for(&self, parton: usize) -> Option<usize> {
        self.parton_to_jet.get(parton).copied().flatten()
    }

    /// Number of partons that took part in the matching.
    pub fn n_partons(&self) -> usize {
        self.parton_to_jet.len()
    }

    /// Number of jets that took part in the matching.
    pub fn n_jets(&self) -> usize {
        self.n_jets
    }

    /// Number of partons which found a jet.
    pub fn n_matched(&self) -> usize {
        self.parton_to_jet.iter().flatten().count()
    }

    /// `true` if every parton found a jet.
    pub fn is_complete(&self) -> bool {
        self.parton_to_jet.iter().all(Option::is_some)
    }

    /// Iterate over matched `(parton, jet)` pairs in parton order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.parton_to_jet
            .iter()
            .enumerate()
            .filter_map(|(parton, jet)| jet.map(|jet| (parton, jet)))
    }

    /// The parton matched to each jet, in jet order.
    pub fn jet_to_parton(&self) -> Vec<Option<usize>> {
        let mut jet_to_parton = vec![None; self.n_jets];
        for (parton, jet) in self.pairs() {
            jet_to_parton[jet] = Some(parton);
        }
        jet_to_parton
    }

    /// The per-jet output array: the index of the matched parton or [`UNMATCHED`].
    pub fn jet_parton_match(&self) -> Vec<i32> {
        self.jet_to_parton()
            .into_iter()
            .map(|parton| parton.map_or(UNMATCHED, |parton| parton as i32))
            .collect()
    }
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    distance: f64,
    parton: usize,
    jet: usize,
}

/// All parton-jet pairs, ordered by increasing $`\Delta R`$. Equal distances keep parton-major
/// order.
fn sorted_candidates<P, J>(partons: &[P], jets: &[J]) -> Vec<Candidate>
where
    P: AngularPosition,
    J: AngularPosition,
{
    let mut candidates = Vec::with_capacity(partons.len() * jets.len());
    for (parton_index, parton) in partons.iter().enumerate() {
        for (jet_index, jet) in jets.iter().enumerate() {
            candidates.push(Candidate {
                distance: parton.delta_r(jet),
                parton: parton_index,
                jet: jet_index,
            });
        }
    }
    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    candidates
}

/// Match partons to jets by repeatedly taking the closest remaining pair.
///
/// All parton-jet pairs are ranked by $`\Delta R`$ across the whole event. Walking down that
/// ranking, the first pair whose parton and jet are both still free settles that parton: it is
/// matched to the jet if the distance is at most [`MatchingOptions::max_distance`], otherwise it
/// is marked as unmatched and the jet stays free. Partons with no free jet left are unmatched.
///
/// This is a greedy assignment, not an optimal one: a parton can lose its nearest jet to another
/// parton which is even closer to it.
pub fn match_jets<P, J>(partons: &[P], jets: &[J], options: &MatchingOptions) -> PartonJetMatch
where
    P: AngularPosition,
    J: AngularPosition,
{
    let mut parton_to_jet = vec![None; partons.len()];
    let mut parton_done = vec![false; partons.len()];
    let mut jet_taken = vec![false; jets.len()];
    let mut remaining = partons.len();
    for candidate in sorted_candidates(partons, jets) {
        if remaining == 0 {
            break;
        }
        if parton_done[candidate.parton] || jet_taken[candidate.jet] {
            continue;
        }
        parton_done[candidate.parton] = true;
        remaining -= 1;
        if candidate.distance <= options.max_distance {
            parton_to_jet[candidate.parton] = Some(candidate.jet);
            jet_taken[candidate.jet] = true;
        }
    }
    PartonJetMatch {
        parton_to_jet,
        n_jets: jets.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_event;
    use crate::partons::resolve_partons;
    use crate::selection::JetSelection;

    fn options() -> MatchingOptions {
        MatchingOptions::default()
    }

    /// Six partons spread out so that every cross distance is well above 0.3.
    fn six_partons() -> Vec<(f64, f64)> {
        vec![
            (0.3, 0.4),
            (-1.1, 1.6),
            (1.4, -2.1),
            (-0.6, -0.9),
            (1.9, 2.7),
            (-1.8, -2.8),
        ]
    }

    fn shifted(positions: &[(f64, f64)], deta: f64, dphi: f64) -> Vec<(f64, f64)> {
        positions
            .iter()
            .map(|(eta, phi)| (eta + deta, phi + dphi))
            .collect()
    }

    fn assert_invariants(result: &PartonJetMatch, partons: &[(f64, f64)], jets: &[(f64, f64)]) {
        assert_eq!(result.n_partons(), partons.len());
        let mut used = vec![false; jets.len()];
        for (parton, jet) in result.pairs() {
            assert!(!used[jet], "jet {jet} matched twice");
            used[jet] = true;
            assert!(partons[parton].delta_r(&jets[jet]) <= DEFAULT_MAX_DISTANCE);
        }
    }

    #[test]
    fn test_trivial_full_match() {
        let partons = six_partons();
        let jets = shifted(&partons, 0.05, -0.05);
        let result = match_jets(&partons, &jets, &options());
        assert_eq!(
            result.parton_to_jet(),
            &[Some(0), Some(1), Some(2), Some(3), Some(4), Some(5)]
        );
        assert!(result.is_complete());
        assert_eq!(result.jet_parton_match(), vec![0, 1, 2, 3, 4, 5]);
        assert_invariants(&result, &partons, &jets);
    }

    #[test]
    fn test_permuted_jets() {
        let partons = six_partons();
        let mut jets = shifted(&partons, -0.02, 0.03);
        jets.reverse();
        let result = match_jets(&partons, &jets, &options());
        assert_eq!(result.jet_parton_match(), vec![5, 4, 3, 2, 1, 0]);
        assert_eq!(result.jet_for(0), Some(5));
    }

    #[test]
    fn test_one_unmatchable_parton() {
        let partons = six_partons();
        let mut jets = shifted(&partons, 0.05, 0.0);
        // the jet of q1 drifts away to 0.5
        jets[2] = (partons[2].0 + 0.5, partons[2].1);
        jets.remove(5);
        let result = match_jets(&partons, &jets, &options());
        assert!(!result.is_complete());
        assert_eq!(result.jet_for(2), None);
        assert_eq!(result.jet_for(5), None);
        assert_eq!(result.n_matched(), 4);
        assert_eq!(result.jet_parton_match(), vec![0, 1, UNMATCHED, 3, 4]);
        assert_invariants(&result, &partons, &jets);
    }

    #[test]
    fn test_contested_jet() {
        let partons = vec![(0.0, 0.0), (0.0, 0.1)];
        // both partons are closest to jet 0; parton 1 is closer to it
        let jets = vec![(0.0, 0.08), (0.0, -0.15)];
        let result = match_jets(&partons, &jets, &options());
        assert_eq!(result.parton_to_jet(), &[Some(1), Some(0)]);
    }

    #[test]
    fn test_greedy_ranks_globally() {
        // parton 0 alone would pick jet 0, but parton 1 is closer to it
        let partons = vec![(0.0, 0.0), (0.0, 0.07)];
        let jets = vec![(0.0, 0.05), (0.0, -0.1)];
        assert!(partons[1].delta_r(&jets[0]) < partons[0].delta_r(&jets[0]));
        let result = match_jets(&partons, &jets, &options());
        assert_eq!(result.jet_for(1), Some(0));
        assert_eq!(result.jet_for(0), Some(1));
    }

    #[test]
    fn test_ties_keep_parton_order() {
        let partons = vec![(0.0, 0.1), (0.0, -0.1)];
        let jets = vec![(0.0, 0.0)];
        let result = match_jets(&partons, &jets, &options());
        assert_eq!(result.parton_to_jet(), &[Some(0), None]);
    }

    #[test]
    fn test_unmatched_parton_does_not_consume_jet() {
        let partons = vec![(0.0, 0.0), (1.0, 0.0)];
        let jets = vec![(0.5, 0.0), (1.1, 0.0)];
        let result = match_jets(&partons, &jets, &options().max_distance(0.45));
        // parton 1 takes jet 1, parton 0 is too far from jet 0 and jet 0 stays free
        assert_eq!(result.parton_to_jet(), &[None, Some(1)]);
        assert_eq!(result.jet_to_parton(), vec![None, Some(1)]);
    }

    #[test]
    fn test_distance_threshold_is_inclusive() {
        let partons = vec![(0.0, 0.0)];
        let jets = vec![(0.25, 0.0)];
        assert!(match_jets(&partons, &jets, &options().max_distance(0.25)).is_complete());
        assert!(!match_jets(&partons, &jets, &options().max_distance(0.2)).is_complete());
    }

    #[test]
    fn test_no_jets() {
        let partons = six_partons();
        let jets: Vec<(f64, f64)> = Vec::new();
        let result = match_jets(&partons, &jets, &options());
        assert_eq!(result.parton_to_jet(), &[None; 6]);
        assert!(result.jet_parton_match().is_empty());
    }

    #[test]
    fn test_fewer_jets_than_partons() {
        let partons = six_partons();
        let jets = shifted(&partons[..3], 0.01, 0.01);
        let result = match_jets(&partons, &jets, &options());
        assert_eq!(result.n_partons(), 6);
        assert_eq!(result.n_matched(), 3);
        assert_eq!(result.jet_parton_match(), vec![0, 1, 2]);
    }

    #[test]
    fn test_wrapped_phi_matches() {
        let partons = vec![(0.0, 3.1)];
        let jets = vec![(0.0, -3.1)];
        assert!(match_jets(&partons, &jets, &options()).is_complete());
    }

    #[test]
    fn test_matching_is_idempotent() {
        let partons = six_partons();
        let jets = shifted(&partons, 0.12, -0.1);
        assert_eq!(
            match_jets(&partons, &jets, &options()),
            match_jets(&partons, &jets, &options())
        );
    }

    /// Repeatedly take the closest remaining pair and strike out every pair sharing its parton
    /// or, if matched, its jet.
    fn match_by_removal(partons: &[(f64, f64)], jets: &[(f64, f64)]) -> Vec<Option<usize>> {
        let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
        for (parton_index, parton) in partons.iter().enumerate() {
            for (jet_index, jet) in jets.iter().enumerate() {
                pairs.push((parton.delta_r(jet), parton_index, jet_index));
            }
        }
        pairs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mut result = vec![None; partons.len()];
        while let Some(&(distance, parton, jet)) = pairs.first() {
            let jet = (distance <= DEFAULT_MAX_DISTANCE).then_some(jet);
            result[parton] = jet;
            pairs.retain(|&(_, other_parton, other_jet)| {
                other_parton != parton && Some(other_jet) != jet
            });
        }
        result
    }

    fn random_position(rng: &mut fastrand::Rng) -> (f64, f64) {
        (
            rng.f64() * 4.8 - 2.4,
            rng.f64() * std::f64::consts::TAU - std::f64::consts::PI,
        )
    }

    #[test]
    fn test_random_events_match_removal_loop() {
        let mut rng = fastrand::Rng::with_seed(42);
        for _ in 0..5_000 {
            let partons: Vec<(f64, f64)> = (0..6).map(|_| random_position(&mut rng)).collect();
            let n_jets = rng.usize(0..10);
            // most jets sit near some parton so that matches are contested
            let jets: Vec<(f64, f64)> = (0..n_jets)
                .map(|_| {
                    if rng.f64() < 0.8 {
                        let (eta, phi) = partons[rng.usize(0..partons.len())];
                        (eta + rng.f64() * 0.6 - 0.3, phi + rng.f64() * 0.6 - 0.3)
                    } else {
                        random_position(&mut rng)
                    }
                })
                .collect();
            let result = match_jets(&partons, &jets, &options());
            assert_eq!(
                result.parton_to_jet(),
                match_by_removal(&partons, &jets).as_slice(),
                "partons {partons:?}, jets {jets:?}"
            );
            assert_eq!(result.n_jets(), n_jets);
            assert_invariants(&result, &partons, &jets);
        }
    }

    #[test]
    fn test_test_event_matches() {
        let event = test_event();
        let partons = resolve_partons(&event.particles).unwrap();
        let jets = JetSelection::default().select(&event.jets);
        let result = match_jets(&partons.particles(&event.particles), &jets, &options());
        assert!(result.is_complete());
        assert_eq!(result.jet_parton_match(), vec![0, 1, 2, 3, UNMATCHED, 4, 5]);
    }
}
