//! Query engine - filter, sort, and page over the loaded dataset
//!
//! A [`PuzzleQuery`] compiles to a predicate (rating range AND theme clause),
//! a stable multi-key sort, and a contiguous result window, evaluated against
//! the record arena. Inputs are already typed; validating raw user text is
//! the caller's job.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::store::{Dataset, Puzzle, PuzzleRecord};

/// Default page size applied by [`PuzzleQuery::default`]
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Theme membership filter
///
/// The two variants treat an empty theme set with opposite polarity, and this
/// asymmetry is contractual: `Any` of nothing is an always-false clause (no
/// puzzle shares a theme with the empty set), while `All` of nothing is a
/// vacuously true conjunction that matches every puzzle. Callers passing
/// user-assembled sets should expect this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThemeFilter {
    /// Match puzzles tagged with at least one of the given themes
    Any(HashSet<String>),
    /// Match puzzles tagged with every one of the given themes
    All(HashSet<String>),
}

impl ThemeFilter {
    fn matches(&self, record: &PuzzleRecord) -> bool {
        match self {
            // Empty set: intersection is empty for every puzzle
            Self::Any(themes) => record.themes.iter().any(|t| themes.contains(t)),
            // Empty set: conjunction over zero clauses holds for every puzzle
            Self::All(themes) => themes
                .iter()
                .all(|t| record.themes.iter().any(|tag| tag == t)),
        }
    }
}

/// A single sort key; multiple keys apply as successive tie-breakers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    /// Order by estimated rating
    ByRating { ascending: bool },
    /// Order by puzzle id
    ById { ascending: bool },
}

impl SortKey {
    fn compare(&self, a: &PuzzleRecord, b: &PuzzleRecord) -> Ordering {
        let (ordering, ascending) = match self {
            Self::ByRating { ascending } => (a.rating.cmp(&b.rating), *ascending),
            Self::ById { ascending } => (a.id.cmp(&b.id), *ascending),
        };
        if ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

/// A filtered, sorted, paged puzzle query
///
/// Absent components impose no constraint: no rating range and no theme
/// filter match everything, no sort keys leave results in store-native order
/// (which callers must not rely on), and `page_size: None` returns every
/// matching row. The default query carries a page size of
/// [`DEFAULT_PAGE_SIZE`], so unbounded result sets are an explicit opt-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleQuery {
    /// Inclusive rating bounds
    pub rating_range: Option<RangeInclusive<i32>>,
    /// Theme membership clause
    pub theme_filter: Option<ThemeFilter>,
    /// Sort keys, applied in order as tie-breakers
    pub sort: Vec<SortKey>,
    /// Maximum number of returned rows; `None` means no cap
    pub page_size: Option<usize>,
    /// Start of the result window; `None` means 0. Callers paging by index
    /// compute `offset = page_index * page_size` themselves.
    pub offset: Option<usize>,
}

impl Default for PuzzleQuery {
    fn default() -> Self {
        Self {
            rating_range: None,
            theme_filter: None,
            sort: Vec::new(),
            page_size: Some(DEFAULT_PAGE_SIZE),
            offset: None,
        }
    }
}

impl PuzzleQuery {
    /// A query matching every puzzle, with the default page size
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict results to an inclusive rating range
    pub fn rating_range(mut self, range: RangeInclusive<i32>) -> Self {
        self.rating_range = Some(range);
        self
    }

    /// Require at least one of the given themes
    pub fn any_theme<I: IntoIterator<Item = S>, S: Into<String>>(mut self, themes: I) -> Self {
        self.theme_filter = Some(ThemeFilter::Any(
            themes.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Require every one of the given themes
    pub fn all_themes<I: IntoIterator<Item = S>, S: Into<String>>(mut self, themes: I) -> Self {
        self.theme_filter = Some(ThemeFilter::All(
            themes.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Append a sort key
    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    /// Set the result window
    pub fn window(mut self, offset: usize, page_size: usize) -> Self {
        self.offset = Some(offset);
        self.page_size = Some(page_size);
        self
    }

    /// Remove the page size cap, returning every matching row
    pub fn unbounded(mut self) -> Self {
        self.page_size = None;
        self
    }

    /// Whether a record satisfies the filter components of this query
    fn matches(&self, record: &PuzzleRecord) -> bool {
        if let Some(range) = &self.rating_range {
            if !range.contains(&record.rating) {
                return false;
            }
        }
        if let Some(filter) = &self.theme_filter {
            if !filter.matches(record) {
                return false;
            }
        }
        true
    }
}

/// Execute a query: filter, sort, then slice the window
pub fn execute(dataset: &Dataset, query: &PuzzleQuery) -> Vec<Puzzle> {
    let mut matched: Vec<&PuzzleRecord> = dataset
        .records()
        .iter()
        .filter(|record| query.matches(record))
        .collect();

    if !query.sort.is_empty() {
        // Stable sort: full ties keep store-native order, so identical
        // queries always return identical sequences
        matched.sort_by(|a, b| {
            query
                .sort
                .iter()
                .map(|key| key.compare(a, b))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    let offset = query.offset.unwrap_or(0);
    let window = matched.into_iter().skip(offset);
    match query.page_size {
        Some(page_size) => window.take(page_size).map(Puzzle::from).collect(),
        None => window.map(Puzzle::from).collect(),
    }
}

/// Count the puzzles matching a query's filters, ignoring sort and window
pub fn count(dataset: &Dataset, query: &PuzzleQuery) -> usize {
    dataset
        .records()
        .iter()
        .filter(|record| query.matches(record))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Dataset;

    fn record(id: &str, rating: i32, themes: &[&str]) -> PuzzleRecord {
        PuzzleRecord {
            id: id.to_string(),
            fen: "8/8/8/8/8/8/8/8 w - - 0 1".to_string(),
            moves: vec!["a2a3".to_string()],
            rating,
            rating_deviation: 75,
            popularity: 50,
            themes: themes.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn sample_dataset() -> Dataset {
        Dataset::from_records(vec![
            record("d1", 900, &["endgame"]),
            record("a1", 1050, &["fork", "middlegame"]),
            record("c1", 1190, &["fork"]),
            record("b1", 1190, &["pin", "endgame"]),
            record("e1", 1300, &["middlegame"]),
        ])
        .unwrap()
    }

    fn ids(puzzles: &[Puzzle]) -> Vec<&str> {
        puzzles.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_rating_range_inclusive_both_ends() {
        let dataset = sample_dataset();
        let query = PuzzleQuery::new().rating_range(1050..=1190).unbounded();

        let results = execute(&dataset, &query);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|p| p.rating >= 1050 && p.rating <= 1190));
        assert_eq!(count(&dataset, &query), 3);
    }

    #[test]
    fn test_any_matches_intersection() {
        let dataset = sample_dataset();
        let query = PuzzleQuery::new().any_theme(["fork", "pin"]).unbounded();

        let mut result_ids: Vec<String> =
            execute(&dataset, &query).into_iter().map(|p| p.id).collect();
        result_ids.sort();
        assert_eq!(result_ids, vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn test_any_of_empty_set_matches_nothing() {
        let dataset = sample_dataset();
        let query = PuzzleQuery::new().any_theme(Vec::<String>::new());

        assert!(execute(&dataset, &query).is_empty());
        assert_eq!(count(&dataset, &query), 0);
    }

    #[test]
    fn test_all_matches_superset() {
        let dataset = sample_dataset();
        let query = PuzzleQuery::new()
            .all_themes(["fork", "middlegame"])
            .unbounded();

        assert_eq!(ids(&execute(&dataset, &query)), vec!["a1"]);
    }

    #[test]
    fn test_all_of_empty_set_matches_everything() {
        let dataset = sample_dataset();
        let query = PuzzleQuery::new().all_themes(Vec::<String>::new());

        assert_eq!(count(&dataset, &query), dataset.len());
    }

    #[test]
    fn test_rating_and_theme_clauses_conjoin() {
        let dataset = sample_dataset();
        let query = PuzzleQuery::new()
            .rating_range(1000..=1200)
            .any_theme(["endgame"])
            .unbounded();

        assert_eq!(ids(&execute(&dataset, &query)), vec!["b1"]);
    }

    #[test]
    fn test_sort_rating_desc_id_asc_breaks_ties() {
        let dataset = sample_dataset();
        let query = PuzzleQuery::new()
            .sort_by(SortKey::ByRating { ascending: false })
            .sort_by(SortKey::ById { ascending: true })
            .unbounded();

        let results = execute(&dataset, &query);
        assert_eq!(ids(&results), vec!["e1", "b1", "c1", "a1", "d1"]);

        // Determinism: the identical query yields the identical sequence
        assert_eq!(execute(&dataset, &query), results);
    }

    #[test]
    fn test_no_sort_keeps_store_order() {
        let dataset = sample_dataset();
        let query = PuzzleQuery::new().unbounded();

        assert_eq!(ids(&execute(&dataset, &query)), vec!["d1", "a1", "c1", "b1", "e1"]);
    }

    #[test]
    fn test_pagination_concatenates_without_gaps() {
        let dataset = sample_dataset();
        let sorted = PuzzleQuery::new()
            .sort_by(SortKey::ById { ascending: true })
            .unbounded();
        let full = execute(&dataset, &sorted);

        let mut paged = Vec::new();
        let page_size = 2;
        let mut offset = 0;
        loop {
            let page = execute(
                &dataset,
                &PuzzleQuery::new()
                    .sort_by(SortKey::ById { ascending: true })
                    .window(offset, page_size),
            );
            let len = page.len();
            paged.extend(page);
            if len < page_size {
                break;
            }
            offset += page_size;
        }

        assert_eq!(paged, full);
    }

    #[test]
    fn test_offset_defaults_to_zero() {
        let dataset = sample_dataset();
        let mut query = PuzzleQuery::new().sort_by(SortKey::ById { ascending: true });
        query.page_size = Some(2);

        assert_eq!(ids(&execute(&dataset, &query)), vec!["a1", "b1"]);
    }

    #[test]
    fn test_default_page_size_caps_results() {
        let records = (0..250)
            .map(|i| record(&format!("p{i:04}"), 1000 + i, &[]))
            .collect();
        let dataset = Dataset::from_records(records).unwrap();

        let results = execute(&dataset, &PuzzleQuery::default());
        assert_eq!(results.len(), DEFAULT_PAGE_SIZE);

        let all = execute(&dataset, &PuzzleQuery::new().unbounded());
        assert_eq!(all.len(), 250);
    }

    #[test]
    fn test_count_ignores_window() {
        let dataset = sample_dataset();
        let query = PuzzleQuery::new().window(1, 2);

        assert_eq!(count(&dataset, &query), dataset.len());
    }

    #[test]
    fn test_offset_past_end_is_empty() {
        let dataset = sample_dataset();
        let query = PuzzleQuery::new().window(100, 10);

        assert!(execute(&dataset, &query).is_empty());
    }
}
