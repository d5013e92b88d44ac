use std::fmt::Display;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{data::Jet, utils::efficiency};

/// Per-jet kinematic acceptance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JetSelection {
    /// Jets must have $`p_T`$ strictly above this value (GeV).
    pub min_pt: f64,
    /// Jets must have $`|\eta|`$ strictly below this value.
    pub max_abs_eta: f64,
}

impl Default for JetSelection {
    fn default() -> Self {
        Self {
            min_pt: 30.0,
            max_abs_eta: 2.4,
        }
    }
}

impl JetSelection {
    /// Override the minimum jet $`p_T`$; defaults to 30 GeV.
    pub fn min_pt(mut self, min_pt: f64) -> Self {
        self.min_pt = min_pt;
        self
    }

    /// Override the maximum jet $`|\eta|`$; defaults to 2.4.
    pub fn max_abs_eta(mut self, max_abs_eta: f64) -> Self {
        self.max_abs_eta = max_abs_eta;
        self
    }

    /// Whether a single jet passes.
    pub fn accepts(&self, jet: &Jet) -> bool {
        jet.pt > self.min_pt && jet.eta.abs() < self.max_abs_eta
    }

    /// The passing jets, in their original relative order.
    pub fn select(&self, jets: &[Jet]) -> Vec<Jet> {
        jets.iter().filter(|jet| self.accepts(jet)).copied().collect()
    }
}

/// The event-level cuts, in the order they are applied.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Cut {
    /// Enough selected jets.
    JetMultiplicity,
    /// The $`n`$-th hardest selected jet is hard enough.
    NthJetPt,
    /// Enough b-tagged selected jets.
    BTagMultiplicity,
    /// The scalar $`p_T`$ sum of the selected jets is large enough.
    HT,
}

impl Cut {
    /// All cuts in the order they are applied.
    pub const ALL: [Cut; 4] = [
        Cut::JetMultiplicity,
        Cut::NthJetPt,
        Cut::BTagMultiplicity,
        Cut::HT,
    ];
}

impl Display for Cut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cut::JetMultiplicity => write!(f, "jet multiplicity"),
            Cut::NthJetPt => write!(f, "nth jet pT"),
            Cut::BTagMultiplicity => write!(f, "b-tag multiplicity"),
            Cut::HT => write!(f, "HT"),
        }
    }
}

fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Scalar sum of the jets' transverse momenta.
pub fn ht(jets: &[Jet]) -> f64 {
    jets.iter().map(|jet| jet.pt).sum()
}

/// The transverse momentum of the `n`-th hardest jet (counting from 1), if there are that many.
pub fn nth_hardest_pt(jets: &[Jet], n: usize) -> Option<f64> {
    let mut pts: Vec<f64> = jets.iter().map(|jet| jet.pt).collect();
    pts.sort_by(|a, b| b.total_cmp(a));
    pts.get(n.checked_sub(1)?).copied()
}

/// Event-level cuts applied to the selected jets of an event.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventSelection {
    /// Minimum number of selected jets.
    pub min_jets: usize,
    /// Which jet, by decreasing $`p_T`$, the $`p_T`$ cut applies to.
    pub nth_jet: usize,
    /// That jet must have $`p_T`$ strictly above this value (GeV).
    pub nth_jet_min_pt: f64,
    /// Minimum number of b-tagged selected jets.
    pub min_btags: usize,
    /// $`H_T`$ must be strictly above this value (GeV).
    pub min_ht: f64,
}

impl Default for EventSelection {
    fn default() -> Self {
        Self {
            min_jets: 6,
            nth_jet: 6,
            nth_jet_min_pt: 40.0,
            min_btags: 1,
            min_ht: 450.0,
        }
    }
}

impl EventSelection {
    /// Override the minimum number of selected jets; defaults to 6.
    pub fn min_jets(mut self, min_jets: usize) -> Self {
        self.min_jets = min_jets;
        self
    }

    /// Override the $`n`$-th jet $`p_T`$ cut; defaults to the 6th jet above 40 GeV.
    pub fn nth_jet_pt(mut self, nth_jet: usize, min_pt: f64) -> Self {
        self.nth_jet = nth_jet;
        self.nth_jet_min_pt = min_pt;
        self
    }

    /// Override the minimum number of b-tagged jets; defaults to 1.
    pub fn min_btags(mut self, min_btags: usize) -> Self {
        self.min_btags = min_btags;
        self
    }

    /// Override the minimum $`H_T`$; defaults to 450 GeV.
    pub fn min_ht(mut self, min_ht: f64) -> Self {
        self.min_ht = min_ht;
        self
    }

    /// Whether the selected jets of an event pass one cut.
    pub fn passes(&self, cut: Cut, jets: &[Jet]) -> bool {
        match cut {
            Cut::JetMultiplicity => jets.len() >= self.min_jets,
            Cut::NthJetPt => nth_hardest_pt(jets, self.nth_jet)
                .is_some_and(|pt| pt > self.nth_jet_min_pt),
            Cut::BTagMultiplicity => {
                jets.iter().filter(|jet| jet.is_btagged()).count() >= self.min_btags
            }
            Cut::HT => ht(jets) > self.min_ht,
        }
    }

    /// The first cut the selected jets of an event fail, or `None` if they pass them all.
    pub fn first_failed_cut(&self, jets: &[Jet]) -> Option<Cut> {
        Cut::ALL.into_iter().find(|&cut| !self.passes(cut, jets))
    }

    /// The cut-flow label of a cut.
    pub fn describe(&self, cut: Cut) -> String {
        match cut {
            Cut::NthJetPt => format!("{} jet pT", ordinal(self.nth_jet)),
            _ => cut.to_string(),
        }
    }
}

/// The number of events surviving each stage of the processing, in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cutflow {
    total: usize,
    stages: IndexMap<String, usize>,
}

impl Cutflow {
    /// Start a cut-flow for `total` input events.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            stages: IndexMap::new(),
        }
    }

    /// Record the number of events which passed a stage.
    pub fn record<S: Into<String>>(&mut self, stage: S, passed: usize) {
        self.stages.insert(stage.into(), passed);
    }

    /// The number of input events.
    pub fn total(&self) -> usize {
        self.total
    }

    /// The number of events which passed a stage.
    pub fn passed(&self, stage: &str) -> Option<usize> {
        self.stages.get(stage).copied()
    }

    /// Percentage of the input events which passed a stage.
    pub fn efficiency(&self, stage: &str) -> Option<f64> {
        self.passed(stage)
            .map(|passed| efficiency(passed, self.total))
    }

    /// The recorded stages and their counts, in order.
    pub fn stages(&self) -> impl Iterator<Item = (&str, usize)> {
        self.stages
            .iter()
            .map(|(stage, passed)| (stage.as_str(), *passed))
    }

    /// The number of events which passed the last stage, or all of them if nothing was recorded.
    pub fn remaining(&self) -> usize {
        self.stages
            .last()
            .map_or(self.total, |(_, passed)| *passed)
    }
}

impl Display for Cutflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (stage, passed) in self.stages() {
            writeln!(
                f,
                "{stage} -> eff = {passed} / {} = {:.2} %",
                self.total,
                efficiency(passed, self.total)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_event;
    use approx::assert_relative_eq;

    fn jet(pt: f64, btag: i32) -> Jet {
        Jet::new(pt, 0.0, 0.0, 1.0, btag)
    }

    #[test]
    fn test_jet_selection_thresholds() {
        let selection = JetSelection::default();
        assert!(selection.accepts(&Jet::new(30.1, 2.39, 0.0, 1.0, 0)));
        assert!(!selection.accepts(&Jet::new(30.0, 0.0, 0.0, 1.0, 0)));
        assert!(!selection.accepts(&Jet::new(50.0, -2.4, 0.0, 1.0, 0)));
        assert!(selection.min_pt(20.0).accepts(&Jet::new(25.0, 0.0, 0.0, 1.0, 0)));
        assert!(selection
            .max_abs_eta(3.0)
            .accepts(&Jet::new(50.0, -2.6, 0.0, 1.0, 0)));
    }

    #[test]
    fn test_jet_selection_keeps_order() {
        let selected = JetSelection::default().select(&test_event().jets);
        let pts: Vec<f64> = selected.iter().map(|jet| jet.pt).collect();
        assert_eq!(pts, vec![140.0, 110.0, 90.0, 75.0, 35.0, 60.0, 45.0]);
    }

    #[test]
    fn test_ht_and_nth_hardest() {
        let jets = JetSelection::default().select(&test_event().jets);
        assert_relative_eq!(ht(&jets), 555.0);
        assert_eq!(nth_hardest_pt(&jets, 1), Some(140.0));
        assert_eq!(nth_hardest_pt(&jets, 6), Some(45.0));
        assert_eq!(nth_hardest_pt(&jets, 8), None);
        assert_eq!(nth_hardest_pt(&jets, 0), None);
    }

    #[test]
    fn test_test_event_passes() {
        let jets = JetSelection::default().select(&test_event().jets);
        assert_eq!(EventSelection::default().first_failed_cut(&jets), None);
    }

    #[test]
    fn test_cuts_apply_in_order() {
        let selection = EventSelection::default();
        let five = vec![jet(100.0, 1); 5];
        assert_eq!(selection.first_failed_cut(&five), Some(Cut::JetMultiplicity));

        let mut soft_sixth = vec![jet(100.0, 1); 5];
        soft_sixth.push(jet(40.0, 0));
        assert_eq!(selection.first_failed_cut(&soft_sixth), Some(Cut::NthJetPt));

        let untagged = vec![jet(100.0, 0); 6];
        assert_eq!(selection.first_failed_cut(&untagged), Some(Cut::BTagMultiplicity));

        let low_ht = vec![jet(75.0, 1); 6];
        assert_eq!(selection.first_failed_cut(&low_ht), Some(Cut::HT));
        assert_eq!(selection.min_ht(449.0).first_failed_cut(&low_ht), None);
    }

    #[test]
    fn test_nth_jet_uses_hardest_ordering() {
        // six hard jets and one soft one: the 6th hardest is still hard
        let mut jets = vec![jet(10.0, 1)];
        jets.extend(vec![jet(80.0, 0); 6]);
        let selection = EventSelection::default();
        assert!(selection.passes(Cut::NthJetPt, &jets));
        assert!(!selection.nth_jet_pt(7, 40.0).passes(Cut::NthJetPt, &jets));
    }

    #[test]
    fn test_cut_labels() {
        let selection = EventSelection::default();
        let labels: Vec<String> = Cut::ALL.iter().map(|&cut| selection.describe(cut)).collect();
        assert_eq!(
            labels,
            vec!["jet multiplicity", "6th jet pT", "b-tag multiplicity", "HT"]
        );
        assert_eq!(selection.nth_jet_pt(2, 40.0).describe(Cut::NthJetPt), "2nd jet pT");
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(22), "22nd");
    }

    #[test]
    fn test_cutflow() {
        let mut cutflow = Cutflow::new(8);
        assert_eq!(cutflow.remaining(), 8);
        cutflow.record("jet multiplicity", 6);
        cutflow.record("HT", 3);
        assert_eq!(cutflow.total(), 8);
        assert_eq!(cutflow.passed("HT"), Some(3));
        assert_eq!(cutflow.passed("b-tag multiplicity"), None);
        assert_relative_eq!(cutflow.efficiency("jet multiplicity").unwrap(), 75.0);
        assert_eq!(cutflow.remaining(), 3);
        assert_eq!(
            cutflow.to_string(),
            "jet multiplicity -> eff = 6 / 8 = 75.00 %\nHT -> eff = 3 / 8 = 37.50 %\n"
        );
    }

    #[test]
    fn test_empty_cutflow_efficiency() {
        let mut cutflow = Cutflow::new(0);
        cutflow.record("HT", 0);
        assert_eq!(cutflow.to_string(), "HT -> eff = 0 / 0 = 0.00 %\n");
    }
}
