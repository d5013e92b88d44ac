use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
    data::{Dataset, Jet, MatchedDataset, MatchedEvent},
    matching::{match_jets, MatchingOptions},
    partons::{resolve_partons, TopPartons},
    selection::{Cut, Cutflow, EventSelection, JetSelection},
    utils::enums::TopologyPolicy,
    FourTopError, FourTopResult,
};

/// Cut-flow label of the events whose partons could be resolved.
pub const RESOLVED_STAGE: &str = "resolved partons";
/// Cut-flow label of the fully matched events.
pub const MATCHED_STAGE: &str = "matched events";

/// Settings for [`process`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProcessOptions {
    /// Per-jet acceptance.
    pub jet_selection: JetSelection,
    /// Event-level cuts on the accepted jets.
    pub event_selection: EventSelection,
    /// Settings for the jet-parton matching.
    pub matching: MatchingOptions,
    /// What to do with events whose generator record cannot be resolved.
    pub topology_policy: TopologyPolicy,
    /// Whether to draw progress bars.
    pub progress: bool,
    /// Size of a dedicated thread pool. `None` uses the global pool.
    pub threads: Option<usize>,
}

impl ProcessOptions {
    /// Create a new [`Default`] set of [`ProcessOptions`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-jet acceptance.
    pub fn jet_selection(mut self, jet_selection: JetSelection) -> Self {
        self.jet_selection = jet_selection;
        self
    }

    /// Set the event-level cuts.
    pub fn event_selection(mut self, event_selection: EventSelection) -> Self {
        self.event_selection = event_selection;
        self
    }

    /// Set the matching settings.
    pub fn matching(mut self, matching: MatchingOptions) -> Self {
        self.matching = matching;
        self
    }

    /// Set the [`TopologyPolicy`]; defaults to [`TopologyPolicy::Skip`].
    pub fn topology_policy(mut self, topology_policy: TopologyPolicy) -> Self {
        self.topology_policy = topology_policy;
        self
    }

    /// Enable or disable progress bars; disabled by default.
    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Run on a dedicated pool with this many threads.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}

fn progress_bar(len: usize, message: &'static str, enabled: bool) -> FourTopResult<ProgressBar> {
    if !enabled {
        return Ok(ProgressBar::hidden());
    }
    let style = ProgressStyle::with_template("{msg} [{elapsed_precise}] {wide_bar} {pos}/{len}")
        .map_err(|err| FourTopError::Custom(format!("Invalid progress bar template: {err}")))?;
    Ok(ProgressBar::new(len as u64)
        .with_style(style)
        .with_message(message))
}

/// Apply `op` to every item, keeping the order of the input, and tick the progress bar once per
/// item.
fn map_events<T, U, F>(items: &[T], progress: &ProgressBar, op: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    let tick = |item: &T| {
        let output = op(item);
        progress.inc(1);
        output
    };
    #[cfg(feature = "rayon")]
    let outputs = items.par_iter().map(tick).collect();
    #[cfg(not(feature = "rayon"))]
    let outputs = items.iter().map(tick).collect();
    progress.finish();
    outputs
}

struct SelectedEvent {
    index: usize,
    jets: Vec<Jet>,
}

struct ResolvedEvent {
    index: usize,
    jets: Vec<Jet>,
    partons: TopPartons,
}

/// Run the full analysis over a [`Dataset`].
///
/// Jets are first filtered with [`ProcessOptions::jet_selection`] and the events with
/// [`ProcessOptions::event_selection`]. The partons of every surviving event are resolved and
/// matched to its selected jets, and only events in which all six partons found a jet are kept.
/// Kept events are returned in input order together with the [`Cutflow`] of all stages.
///
/// # Errors
///
/// Returns [`FourTopError::Topology`] if an event's generator record cannot be resolved and the
/// [`TopologyPolicy`] is [`TopologyPolicy::Abort`], and [`FourTopError::ThreadPoolError`] if a
/// dedicated thread pool was requested but could not be built.
pub fn process(
    dataset: &Dataset,
    options: &ProcessOptions,
) -> FourTopResult<(MatchedDataset, Cutflow)> {
    #[cfg(feature = "rayon")]
    {
        if let Some(threads) = options.threads {
            debug!("Processing on a dedicated pool of {threads} threads");
            return rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?
                .install(|| process_events(dataset, options));
        }
    }
    #[cfg(not(feature = "rayon"))]
    {
        if options.threads.is_some() {
            debug!("Ignoring thread count, rayon support is disabled");
        }
    }
    process_events(dataset, options)
}

fn process_events(
    dataset: &Dataset,
    options: &ProcessOptions,
) -> FourTopResult<(MatchedDataset, Cutflow)> {
    let mut cutflow = Cutflow::new(dataset.n_events());

    info!("Running jet and event selection");
    let selection = map_events(
        dataset.events(),
        &ProgressBar::hidden(),
        |event| {
            let jets = options.jet_selection.select(&event.jets);
            let failed = options.event_selection.first_failed_cut(&jets);
            (jets, failed)
        },
    );
    for cut in Cut::ALL {
        let passed = selection
            .iter()
            .filter(|(_, failed)| failed.map_or(true, |failed| failed > cut))
            .count();
        cutflow.record(options.event_selection.describe(cut), passed);
    }
    let selected: Vec<SelectedEvent> = selection
        .into_iter()
        .enumerate()
        .filter(|(_, (_, failed))| failed.is_none())
        .map(|(index, (jets, _))| SelectedEvent { index, jets })
        .collect();

    info!("Finding partons");
    let bar = progress_bar(selected.len(), "finding partons", options.progress)?;
    let resolutions = map_events(&selected, &bar, |event| {
        resolve_partons(&dataset[event.index].particles)
    });
    let mut resolved = Vec::with_capacity(selected.len());
    for (event, resolution) in selected.into_iter().zip(resolutions) {
        match (resolution, options.topology_policy) {
            (Ok(partons), _) => resolved.push(ResolvedEvent {
                index: event.index,
                jets: event.jets,
                partons,
            }),
            (Err(err), TopologyPolicy::Skip) => {
                warn!("Skipping event {}: {}", event.index, err);
            }
            (Err(err), TopologyPolicy::Abort) => {
                return Err(FourTopError::Topology {
                    event: event.index,
                    source: err,
                });
            }
        }
    }
    cutflow.record(RESOLVED_STAGE, resolved.len());

    info!("Running jet-parton matching");
    let bar = progress_bar(resolved.len(), "running jet-parton matching", options.progress)?;
    let matches = map_events(&resolved, &bar, |event| {
        let particles = &dataset[event.index].particles;
        match_jets(&event.partons.particles(particles), &event.jets, &options.matching)
    });
    let events: Vec<MatchedEvent> = resolved
        .into_iter()
        .zip(matches)
        .filter(|(_, matching)| matching.is_complete())
        .map(|(event, matching)| MatchedEvent {
            index: event.index,
            jets: event.jets,
            jet_parton_match: matching.jet_parton_match(),
        })
        .collect();
    cutflow.record(MATCHED_STAGE, events.len());

    Ok((MatchedDataset::new(events), cutflow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{test_dataset, test_event, Event},
        matching::UNMATCHED,
        partons::TopologyError,
    };

    #[test]
    fn test_process_test_dataset() {
        let (matched, cutflow) = process(&test_dataset(), &ProcessOptions::new()).unwrap();
        assert_eq!(matched.n_events(), 1);
        assert_eq!(matched[0].index, 0);
        assert_eq!(
            matched[0].jet_parton_match,
            vec![0, 1, 2, 3, UNMATCHED, 4, 5]
        );
        assert_eq!(matched[0].jets.len(), 7);

        let stages: Vec<(&str, usize)> = cutflow.stages().collect();
        assert_eq!(
            stages,
            vec![
                ("jet multiplicity", 3),
                ("6th jet pT", 3),
                ("b-tag multiplicity", 2),
                ("HT", 2),
                (RESOLVED_STAGE, 1),
                (MATCHED_STAGE, 1),
            ]
        );
        assert_eq!(cutflow.total(), 3);
    }

    #[test]
    fn test_abort_on_topology_error() {
        let options = ProcessOptions::new().topology_policy(TopologyPolicy::Abort);
        let err = process(&test_dataset(), &options).unwrap_err();
        match err {
            FourTopError::Topology { event, source } => {
                assert_eq!(event, 2);
                assert!(matches!(source, TopologyError::TopPair { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_incomplete_matches_are_dropped() {
        let mut event = test_event();
        // pull the q3 jet away from its parton
        event.jets[8].eta = 0.5;
        let dataset = Dataset::new(vec![event, test_event()]);
        let (matched, cutflow) = process(&dataset, &ProcessOptions::new()).unwrap();
        assert_eq!(matched.n_events(), 1);
        assert_eq!(matched[0].index, 1);
        assert_eq!(cutflow.passed(RESOLVED_STAGE), Some(2));
        assert_eq!(cutflow.passed(MATCHED_STAGE), Some(1));
    }

    #[test]
    fn test_tighter_matching_distance() {
        let options =
            ProcessOptions::new().matching(MatchingOptions::default().max_distance(0.01));
        let (matched, cutflow) = process(&test_dataset(), &options).unwrap();
        assert!(matched.is_empty());
        assert_eq!(cutflow.remaining(), 0);
    }

    #[test]
    fn test_custom_selection() {
        let options = ProcessOptions::new()
            .event_selection(EventSelection::default().min_btags(0))
            .progress(false);
        let (matched, cutflow) = process(&test_dataset(), &options).unwrap();
        let indices: Vec<usize> = matched.iter().map(|event| event.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(cutflow.passed("b-tag multiplicity"), Some(3));
        assert_eq!(cutflow.passed(RESOLVED_STAGE), Some(2));
    }

    #[test]
    fn test_empty_dataset() {
        let (matched, cutflow) =
            process(&Dataset::new(Vec::<Event>::new()), &ProcessOptions::new()).unwrap();
        assert!(matched.is_empty());
        assert_eq!(cutflow.total(), 0);
        assert_eq!(cutflow.passed(MATCHED_STAGE), Some(0));
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_dedicated_thread_pool() {
        let options = ProcessOptions::new().threads(2);
        let (matched, _) = process(&test_dataset(), &options).unwrap();
        assert_eq!(matched.n_events(), 1);
    }
}
