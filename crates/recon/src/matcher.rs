use serde::Serialize;

use crate::config::ReconConfig;
use crate::harmonize::formats_compatible;
use crate::model::{ScrapedFormat, StreamFormat, StreamKind, StreamRecord, ETAL, UNAV};

pub type DeclaredStreamRecord = StreamRecord<StreamFormat>;
pub type ScrapedStreamRecord = StreamRecord<ScrapedFormat>;

/// Outcome of pairing declared sub-streams with scraped ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMatch {
    /// `pairs` holds (declared index, scraped index), ordered by declared index.
    Matched {
        pairs: Vec<(usize, usize)>,
        notes: Vec<String>,
    },
    NoMatch,
}

impl StreamMatch {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

/// Compare one declared stream against one scraped stream.
///
/// Returns `None` when they are incompatible, otherwise the notes for
/// values the declared side left unavailable but the scraper resolved.
pub fn compare_streams(
    declared: &DeclaredStreamRecord,
    scraped: &ScrapedStreamRecord,
    rules: &ReconConfig,
) -> Option<Vec<String>> {
    if !formats_compatible(&declared.format, &scraped.format, false, rules) {
        return None;
    }

    let mut notes = Vec::new();
    for (key, declared_value) in &declared.attrs {
        // Declared metadata may carry keys the scraper never produces.
        let Some(scraped_value) = scraped.attrs.get(key) else {
            continue;
        };
        if declared_value == scraped_value {
            continue;
        }
        if rules.is_unavailable(declared_value) {
            if scraped_value != UNAV {
                notes.push(format!(
                    "Found value for {key} -- declared: {declared_value}, scraped: {scraped_value}."
                ));
            }
            continue;
        }
        if scraped_value == UNAV {
            continue;
        }
        if declared_value == ETAL && rules.etal_allowed(key) {
            continue;
        }
        return None;
    }

    Some(notes)
}

/// Pair every declared stream with exactly one compatible scraped stream.
///
/// Compatibility is neither symmetric nor transitive, so a greedy pass can
/// strand a stream; the search backtracks and stops at the first complete
/// assignment in input order.
pub fn match_streams(
    declared: &[DeclaredStreamRecord],
    scraped: &[ScrapedStreamRecord],
    kind: StreamKind,
    rules: &ReconConfig,
) -> StreamMatch {
    if declared.len() != scraped.len() {
        log::debug!(
            "{kind} stream count differs: declared {}, scraped {}",
            declared.len(),
            scraped.len()
        );
        return StreamMatch::NoMatch;
    }

    let compat: Vec<Vec<Option<Vec<String>>>> = declared
        .iter()
        .map(|d| scraped.iter().map(|s| compare_streams(d, s, rules)).collect())
        .collect();

    // Any declared stream with no candidate dooms the search up front.
    if compat.iter().any(|row| row.iter().all(Option::is_none)) {
        return StreamMatch::NoMatch;
    }

    let mut used = vec![false; scraped.len()];
    let mut assignment: Vec<usize> = Vec::with_capacity(declared.len());
    let mut nodes_visited: u64 = 0;

    fn assign(
        compat: &[Vec<Option<Vec<String>>>],
        row: usize,
        used: &mut [bool],
        assignment: &mut Vec<usize>,
        nodes_visited: &mut u64,
    ) -> bool {
        if row == compat.len() {
            return true;
        }

        for col in 0..used.len() {
            if used[col] || compat[row][col].is_none() {
                continue;
            }
            *nodes_visited += 1;

            used[col] = true;
            assignment.push(col);
            if assign(compat, row + 1, used, assignment, nodes_visited) {
                return true;
            }
            assignment.pop();
            used[col] = false;
        }

        false
    }

    let found = assign(&compat, 0, &mut used, &mut assignment, &mut nodes_visited);
    log::trace!(
        "{kind} stream search: {} declared, {nodes_visited} nodes, matched={found}",
        declared.len()
    );

    if !found {
        return StreamMatch::NoMatch;
    }

    let pairs: Vec<(usize, usize)> = assignment.into_iter().enumerate().collect();
    let notes = pairs
        .iter()
        .flat_map(|&(d, s)| compat[d][s].iter().flatten().cloned())
        .collect();

    StreamMatch::Matched { pairs, notes }
}
