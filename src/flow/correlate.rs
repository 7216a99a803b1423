//! Correlation detection: discovers typed relations between activity events.
//!
//! Four independent strategies run over the same input and their outputs are
//! unioned:
//!
//! | Strategy | Evidence | Strength |
//! |----------|----------|----------|
//! | **Temporal** | contiguous run inside a time window | `min(1, run / scale)` |
//! | **Causal** | adjacent events sharing type or source | base + gap bonuses |
//! | **Semantic** | token-set overlap of content | Jaccard similarity |
//! | **Contextual** | shared file / project / namespace / class / method | `min(1, base + size / scale)` |
//!
//! Detection is a pure function of its inputs. The input does not need to be
//! sorted; events are ordered by `(timestamp, id)` internally.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::str::FromStr;

use chrono::Duration;
use tracing::debug;

use crate::config::DetectionConfig;
use crate::error::{check_unit_interval, FlowError};
use crate::flow::tokenize::{jaccard, tokenize};
use crate::flow::types::{ActivityEvent, Relation, RelationType};

/// Metadata keys naming a file. The first one present on an event wins.
const FILE_KEYS: &[&str] = &["file", "filepath", "fileName"];

/// Broader context keys, each grouped independently.
const SCOPE_KEYS: &[&str] = &["project", "namespace", "class", "method"];

/// One correlation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
    Temporal,
    Causal,
    Semantic,
    Contextual,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Temporal,
        Strategy::Causal,
        Strategy::Semantic,
        Strategy::Contextual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temporal => "temporal",
            Self::Causal => "causal",
            Self::Semantic => "semantic",
            Self::Contextual => "contextual",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temporal" => Ok(Self::Temporal),
            "causal" => Ok(Self::Causal),
            "semantic" => Ok(Self::Semantic),
            "contextual" => Ok(Self::Contextual),
            other => Err(FlowError::InvalidArgument(format!(
                "unknown correlation strategy: {other}"
            ))),
        }
    }
}

/// The set of strategies a detection run should apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategies(BTreeSet<Strategy>);

impl Strategies {
    pub fn all() -> Self {
        Self(Strategy::ALL.into_iter().collect())
    }

    pub fn only(strategies: impl IntoIterator<Item = Strategy>) -> Self {
        Self(strategies.into_iter().collect())
    }

    pub fn contains(&self, strategy: Strategy) -> bool {
        self.0.contains(&strategy)
    }

    pub fn iter(&self) -> impl Iterator<Item = Strategy> + '_ {
        self.0.iter().copied()
    }
}

impl Default for Strategies {
    fn default() -> Self {
        Self::all()
    }
}

impl FromStr for Strategies {
    type Err = FlowError;

    /// Parses `"all"` or a comma-separated list such as `"temporal,semantic"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }
        let set = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Strategy::from_str)
            .collect::<Result<BTreeSet<_>, _>>()?;
        if set.is_empty() {
            return Err(FlowError::InvalidArgument(
                "at least one correlation strategy is required".into(),
            ));
        }
        Ok(Self(set))
    }
}

/// Detect relations between `events` using the selected strategies.
///
/// `min_strength` falls back to `config.min_strength` when `None`. Relations
/// weaker than the threshold are discarded. An empty input yields an empty
/// result.
pub fn detect_correlations(
    events: &[ActivityEvent],
    strategies: &Strategies,
    min_strength: Option<f64>,
    config: &DetectionConfig,
) -> Result<Vec<Relation>, FlowError> {
    config.validate()?;
    let threshold =
        check_unit_interval("min_strength", min_strength.unwrap_or(config.min_strength))?;

    if events.is_empty() {
        return Ok(Vec::new());
    }

    let sorted = sort_by_time(events);
    let mut relations = Vec::new();

    for strategy in strategies.iter() {
        let found = match strategy {
            Strategy::Temporal => detect_temporal(&sorted, threshold, config),
            Strategy::Causal => detect_causal(&sorted, threshold, config),
            Strategy::Semantic => detect_semantic(&sorted, threshold, config),
            Strategy::Contextual => detect_contextual(&sorted, threshold, config),
        };
        debug!(strategy = %strategy, relations = found.len(), "strategy finished");
        relations.extend(found);
    }

    tracing::info!(
        events = events.len(),
        relations = relations.len(),
        threshold,
        "correlation detection complete"
    );
    Ok(relations)
}

fn sort_by_time(events: &[ActivityEvent]) -> Vec<&ActivityEvent> {
    let mut sorted: Vec<&ActivityEvent> = events.iter().collect();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    sorted
}

fn ids(events: &[&ActivityEvent]) -> Vec<String> {
    events.iter().map(|e| e.id.clone()).collect()
}

// ── Temporal ─────────────────────────────────────────────────────────────────

/// Contiguous runs of events within the window of the run's first event.
///
/// After emitting a run the scan skips ahead by half the run length, which
/// bounds overlap between consecutive runs.
fn detect_temporal(
    sorted: &[&ActivityEvent],
    threshold: f64,
    config: &DetectionConfig,
) -> Vec<Relation> {
    let window = Duration::seconds(config.temporal_window_secs);
    let mut relations = Vec::new();
    let mut i = 0;

    while i < sorted.len() {
        let anchor = sorted[i].timestamp;
        let end = sorted[i..]
            .iter()
            .position(|e| e.timestamp - anchor > window)
            .map_or(sorted.len(), |offset| i + offset);
        let run = &sorted[i..end];

        if run.len() >= 2 {
            let strength = (run.len() as f64 / config.temporal_run_scale).min(1.0);
            if strength >= threshold {
                relations.push(
                    Relation::new(
                        RelationType::Temporal,
                        ids(run),
                        strength,
                        format!(
                            "{} events within {}s",
                            run.len(),
                            config.temporal_window_secs
                        ),
                    )
                    .with_tags(["temporal".to_string()]),
                );
                i += (run.len() / 2).max(1);
                continue;
            }
        }
        i += 1;
    }

    relations
}

// ── Causal ───────────────────────────────────────────────────────────────────

/// Adjacent pairs sharing an activity type or source, scored by their gap.
fn detect_causal(
    sorted: &[&ActivityEvent],
    threshold: f64,
    config: &DetectionConfig,
) -> Vec<Relation> {
    let mut relations = Vec::new();

    for pair in sorted.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let same_type = prev.activity_type == next.activity_type;
        let same_source = prev.source == next.source;
        if !same_type && !same_source {
            continue;
        }

        let gap = next.timestamp - prev.timestamp;
        let strength = causal_strength(gap, config);
        if strength < threshold {
            continue;
        }

        let shared = if same_type {
            format!("type {}", prev.activity_type)
        } else {
            format!("source {}", prev.source)
        };
        let gap_secs = gap.num_milliseconds() as f64 / 1000.0;
        relations.push(
            Relation::new(
                RelationType::Causal,
                vec![prev.id.clone(), next.id.clone()],
                strength,
                format!("{shared} followed within {gap_secs:.1}s"),
            )
            .with_tags(["causal".to_string()]),
        );
    }

    relations
}

/// Base strength plus cumulative bonuses for short and medium gaps, capped at 1.
///
/// Gaps are compared at full precision: 30.9s is not within a 30s limit.
pub fn causal_strength(gap: Duration, config: &DetectionConfig) -> f64 {
    let mut bonus = 0.0;
    if gap <= Duration::seconds(config.causal_short_gap_secs) {
        bonus += config.causal_short_bonus;
    }
    if gap <= Duration::seconds(config.causal_long_gap_secs) {
        bonus += config.causal_long_bonus;
    }
    (config.causal_base + bonus).min(1.0)
}

// ── Semantic ─────────────────────────────────────────────────────────────────

/// Every pair of events whose content token sets overlap enough. O(n²).
fn detect_semantic(
    sorted: &[&ActivityEvent],
    threshold: f64,
    config: &DetectionConfig,
) -> Vec<Relation> {
    let tokens: Vec<HashSet<String>> = sorted
        .iter()
        .map(|e| tokenize(&e.content, config.semantic_min_token_len))
        .collect();
    let mut relations = Vec::new();

    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            let similarity = jaccard(&tokens[i], &tokens[j]);
            if similarity >= threshold {
                relations.push(
                    Relation::new(
                        RelationType::Semantic,
                        vec![sorted[i].id.clone(), sorted[j].id.clone()],
                        similarity,
                        format!("content similarity {similarity:.2}"),
                    )
                    .with_tags(["semantic".to_string()]),
                );
            }
        }
    }

    relations
}

// ── Contextual ───────────────────────────────────────────────────────────────

/// Groups of events sharing a metadata context value.
fn detect_contextual(
    sorted: &[&ActivityEvent],
    threshold: f64,
    config: &DetectionConfig,
) -> Vec<Relation> {
    let mut relations = Vec::new();

    let by_file = group_by(sorted, |e| {
        FILE_KEYS
            .iter()
            .find_map(|k| e.metadata.get(*k))
            .map(|v| v.as_key())
    });
    emit_context_groups(
        &mut relations,
        "file",
        by_file,
        config.contextual_file_base,
        config.contextual_file_scale,
        threshold,
    );

    for key in SCOPE_KEYS {
        let groups = group_by(sorted, |e| e.metadata.get(*key).map(|v| v.as_key()));
        emit_context_groups(
            &mut relations,
            key,
            groups,
            config.contextual_other_base,
            config.contextual_other_scale,
            threshold,
        );
    }

    relations
}

fn group_by<'a>(
    sorted: &[&'a ActivityEvent],
    key_of: impl Fn(&ActivityEvent) -> Option<String>,
) -> BTreeMap<String, Vec<&'a ActivityEvent>> {
    let mut groups: BTreeMap<String, Vec<&'a ActivityEvent>> = BTreeMap::new();
    for &event in sorted {
        if let Some(value) = key_of(event) {
            groups.entry(value).or_default().push(event);
        }
    }
    groups
}

fn emit_context_groups(
    out: &mut Vec<Relation>,
    key: &str,
    groups: BTreeMap<String, Vec<&ActivityEvent>>,
    base: f64,
    scale: f64,
    threshold: f64,
) {
    for (value, members) in groups {
        if members.len() < 2 {
            continue;
        }
        let strength = (base + members.len() as f64 / scale).min(1.0);
        if strength < threshold {
            continue;
        }
        out.push(
            Relation::new(
                RelationType::Contextual,
                ids(&members),
                strength,
                format!("{} events share {key} {value}", members.len()),
            )
            .with_tags(["contextual".to_string(), key.to_string(), value]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event_at(secs: i64, activity_type: &str, source: &str, content: &str) -> ActivityEvent {
        ActivityEvent::new(activity_type, content, source, "session-1")
            .at(Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap())
    }

    fn only(strategy: Strategy) -> Strategies {
        Strategies::only([strategy])
    }

    fn config() -> DetectionConfig {
        DetectionConfig::default()
    }

    #[test]
    fn empty_input_yields_nothing() {
        let result = detect_correlations(&[], &Strategies::all(), None, &config()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let events = vec![event_at(0, "a", "s", "x")];
        let err = detect_correlations(&events, &Strategies::all(), Some(1.2), &config())
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidArgument(_)));
    }

    #[test]
    fn strategies_parse() {
        assert_eq!("all".parse::<Strategies>().unwrap(), Strategies::all());
        let s: Strategies = "temporal, Semantic".parse().unwrap();
        assert!(s.contains(Strategy::Temporal));
        assert!(s.contains(Strategy::Semantic));
        assert!(!s.contains(Strategy::Causal));
        assert!("temporal,bogus".parse::<Strategies>().is_err());
        assert!("".parse::<Strategies>().is_err());
    }

    #[test]
    fn temporal_run_of_four_scores_point_four() {
        let events: Vec<_> = (0..4)
            .map(|m| event_at(m * 60, "code_edit", "editor", "x"))
            .collect();

        let at_default =
            detect_correlations(&events, &only(Strategy::Temporal), None, &config()).unwrap();
        assert!(at_default.is_empty(), "4/10 = 0.4 is below the 0.5 default");

        let relaxed =
            detect_correlations(&events, &only(Strategy::Temporal), Some(0.4), &config())
                .unwrap();
        assert_eq!(relaxed.len(), 1);
        assert_eq!(relaxed[0].related_event_ids.len(), 4);
        assert!((relaxed[0].strength - 0.4).abs() < 1e-12);
    }

    #[test]
    fn temporal_window_is_inclusive_and_sorts_input() {
        // Reverse order on purpose; 0s and 300s are exactly one window apart.
        let events = vec![
            event_at(300, "a", "s", "x"),
            event_at(0, "a", "s", "x"),
        ];
        let result =
            detect_correlations(&events, &only(Strategy::Temporal), Some(0.2), &config())
                .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].related_event_ids, vec![events[1].id.clone(), events[0].id.clone()]);
    }

    #[test]
    fn temporal_advances_by_half_run() {
        let events: Vec<_> = (0..6)
            .map(|m| event_at(m * 60, "a", "s", "x"))
            .collect();
        let result =
            detect_correlations(&events, &only(Strategy::Temporal), Some(0.2), &config())
                .unwrap();
        let lens: Vec<usize> = result.iter().map(|r| r.related_event_ids.len()).collect();
        // run of 6 from index 0, skip 3 → run of 3 from index 3, then run of 2.
        assert_eq!(lens, vec![6, 3, 2]);
    }

    #[test]
    fn temporal_gap_splits_runs() {
        let events = vec![
            event_at(0, "a", "s", "x"),
            event_at(10, "a", "s", "x"),
            event_at(10_000, "a", "s", "x"),
        ];
        let result =
            detect_correlations(&events, &only(Strategy::Temporal), Some(0.2), &config())
                .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].related_event_ids.len(), 2);
    }

    #[test]
    fn causal_strength_boundaries() {
        let c = config();
        let secs = Duration::seconds;
        assert!((causal_strength(secs(0), &c) - 1.0).abs() < 1e-12);
        assert!((causal_strength(secs(30), &c) - 1.0).abs() < 1e-12);
        assert!((causal_strength(secs(31), &c) - 0.7).abs() < 1e-12);
        assert!((causal_strength(secs(300), &c) - 0.7).abs() < 1e-12);
        assert!((causal_strength(secs(301), &c) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn causal_strength_counts_fractional_seconds() {
        let c = config();
        let ms = Duration::milliseconds;
        assert!((causal_strength(ms(30_000), &c) - 1.0).abs() < 1e-12);
        assert!((causal_strength(ms(30_900), &c) - 0.7).abs() < 1e-12);
        assert!((causal_strength(ms(300_500), &c) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn sub_second_gap_just_past_the_limit_loses_the_bonus() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let first = ActivityEvent::new("code_edit", "x", "editor", "s1").at(start);
        let second = ActivityEvent::new("code_edit", "y", "editor", "s1")
            .at(start + Duration::milliseconds(30_900));
        let result = detect_correlations(
            &[first, second],
            &only(Strategy::Causal),
            None,
            &config(),
        )
        .unwrap();
        assert_eq!(result.len(), 1);
        assert!((result[0].strength - 0.7).abs() < 1e-12);
    }

    #[test]
    fn causal_requires_shared_type_or_source() {
        let events = vec![
            event_at(0, "code_edit", "editor", "x"),
            event_at(10, "code_edit", "browser", "x"),
            event_at(20, "navigation", "browser", "x"),
            event_at(30, "search", "terminal", "x"),
        ];
        let result =
            detect_correlations(&events, &only(Strategy::Causal), None, &config()).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|r| r.relation_type == RelationType::Causal));
        assert_eq!(
            result[0].related_event_ids,
            vec![events[0].id.clone(), events[1].id.clone()]
        );
        assert_eq!(
            result[1].related_event_ids,
            vec![events[1].id.clone(), events[2].id.clone()]
        );
    }

    #[test]
    fn causal_long_gap_passes_default_but_not_stricter_threshold() {
        let events = vec![
            event_at(0, "code_edit", "editor", "x"),
            event_at(3_600, "code_edit", "editor", "x"),
        ];
        let default =
            detect_correlations(&events, &only(Strategy::Causal), None, &config()).unwrap();
        assert_eq!(default.len(), 1);
        assert!((default[0].strength - 0.6).abs() < 1e-12);

        let strict =
            detect_correlations(&events, &only(Strategy::Causal), Some(0.65), &config())
                .unwrap();
        assert!(strict.is_empty());
    }

    #[test]
    fn semantic_pairs_by_jaccard() {
        let events = vec![
            event_at(0, "a", "s", "refactor parser module"),
            event_at(1, "b", "t", "refactor parser tests"),
            event_at(2, "c", "u", "lunch break"),
        ];
        let result =
            detect_correlations(&events, &only(Strategy::Semantic), None, &config()).unwrap();
        assert_eq!(result.len(), 1);
        assert!((result[0].strength - 0.5).abs() < 1e-12);
        assert_eq!(
            result[0].related_event_ids,
            vec![events[0].id.clone(), events[1].id.clone()]
        );
    }

    #[test]
    fn semantic_zero_threshold_links_disjoint_pairs() {
        let events = vec![
            event_at(0, "a", "s", "alpha beta"),
            event_at(1, "a", "s", "gamma delta"),
        ];
        let result =
            detect_correlations(&events, &only(Strategy::Semantic), Some(0.0), &config())
                .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].strength, 0.0);
    }

    #[test]
    fn contextual_groups_file_aliases() {
        let events = vec![
            event_at(0, "a", "s", "x").with_meta("file", "src/lib.rs"),
            event_at(1, "b", "t", "y").with_meta("filepath", "src/lib.rs"),
            event_at(2, "c", "u", "z").with_meta("fileName", "src/lib.rs"),
            event_at(3, "d", "v", "w").with_meta("file", "src/main.rs"),
        ];
        let result =
            detect_correlations(&events, &only(Strategy::Contextual), None, &config()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].related_event_ids.len(), 3);
        // 0.7 + 3/20
        assert!((result[0].strength - 0.85).abs() < 1e-12);
        assert!(result[0].tags.contains(&"file".to_string()));
    }

    #[test]
    fn contextual_emits_per_key() {
        let events = vec![
            event_at(0, "a", "s", "x")
                .with_meta("project", "loci")
                .with_meta("class", "Parser"),
            event_at(1, "b", "t", "y")
                .with_meta("project", "loci")
                .with_meta("class", "Parser"),
        ];
        let result =
            detect_correlations(&events, &only(Strategy::Contextual), None, &config()).unwrap();
        assert_eq!(result.len(), 2);
        for r in &result {
            // 0.6 + 2/30
            assert!((r.strength - (0.6 + 2.0 / 30.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn all_strategies_union() {
        let events = vec![
            event_at(0, "code_edit", "editor", "refactor parser module")
                .with_meta("file", "src/parser.rs"),
            event_at(20, "code_edit", "editor", "refactor parser module")
                .with_meta("file", "src/parser.rs"),
        ];
        let result =
            detect_correlations(&events, &Strategies::all(), Some(0.2), &config()).unwrap();
        let kinds: BTreeSet<String> = result
            .iter()
            .map(|r| r.relation_type.to_string())
            .collect();
        let expected: BTreeSet<String> = ["temporal", "causal", "semantic", "contextual"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(kinds, expected);
    }
}
