use crate::stage::{DisplayBucket, StageMetric, StageSet, OTHER_LABEL, OTHER_STAGE};
use crate::Error;

/// Number of named buckets the dashboard shows by default
pub const DEFAULT_MAX_VISIBLE: usize = 3;

/// Reduces a [`StageSet`] to a bounded, normalized, ranked breakdown.
///
/// The reducer keeps the `max_visible` largest stages as named buckets and
/// folds everything else into a single `other` bucket. Bucket widths are
/// rescaled so that they always sum to 100, even when the reported
/// percentages do not (rounding, omitted stages, instrumentation gaps).
///
/// # Examples
///
/// ```
/// use breakdown::{StageBreakdownReducer, StageSet};
///
/// let reducer = StageBreakdownReducer::new(2).unwrap();
/// let stages: StageSet = [("tokenize", 20.0), ("inference", 60.0), ("queue", 10.0)]
///     .into_iter()
///     .collect();
///
/// let buckets = reducer.reduce(&stages);
/// assert_eq!(buckets.len(), 3);
/// assert_eq!(buckets[0].name, "inference");
/// assert_eq!(buckets[2].name, "other");
/// assert_eq!(buckets[2].raw_percentage, 10.0);
///
/// let total: f64 = buckets.iter().map(|b| b.normalized_percentage).sum();
/// assert!((total - 100.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageBreakdownReducer {
    max_visible: usize,
}

impl Default for StageBreakdownReducer {
    fn default() -> Self {
        Self {
            max_visible: DEFAULT_MAX_VISIBLE,
        }
    }
}

impl StageBreakdownReducer {
    /// Creates a reducer showing at most `max_visible` named buckets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZeroMaxVisible`] if `max_visible` is 0.
    pub fn new(max_visible: usize) -> Result<Self, Error> {
        if max_visible == 0 {
            return Err(Error::ZeroMaxVisible);
        }
        Ok(Self { max_visible })
    }

    pub fn max_visible(&self) -> usize {
        self.max_visible
    }

    /// Produces the display buckets for one snapshot.
    ///
    /// The result holds at most `max_visible + 1` buckets, ordered by rank.
    /// Returns an empty list when no stage has a positive percentage.
    pub fn reduce(&self, stages: &StageSet) -> Vec<DisplayBucket> {
        let mut ranked: Vec<&StageMetric> = stages.iter().filter(|s| s.percentage > 0.0).collect();

        // Stable sort: equal percentages keep insertion order
        ranked.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));

        let (head, tail) = ranked.split_at(ranked.len().min(self.max_visible));

        // Percentages relative to the largest stage; summing these cannot
        // overflow even when the raw sums do
        let peak = match ranked.first() {
            Some(top) => top.percentage,
            None => return Vec::new(),
        };

        let mut entries: Vec<Entry<'_>> = head
            .iter()
            .map(|s| Entry {
                name: &s.name,
                label: &s.label,
                raw: s.percentage,
                relative: s.percentage / peak,
            })
            .collect();

        // A literal `other` in the tail is part of the tail sum exactly once
        let folded: f64 = tail.iter().map(|s| s.percentage).sum();
        let folded_relative: f64 = tail.iter().map(|s| s.percentage / peak).sum();
        if folded > 0.0 {
            match entries.iter_mut().find(|e| e.name == OTHER_STAGE) {
                Some(other) => {
                    other.raw += folded;
                    other.relative += folded_relative;
                }
                None => entries.push(Entry {
                    name: OTHER_STAGE,
                    label: OTHER_LABEL,
                    raw: folded,
                    relative: folded_relative,
                }),
            }
        }

        let display_total: f64 = entries.iter().map(|e| e.raw).sum();
        if display_total <= 0.0 {
            return Vec::new();
        }

        let overflowed = !display_total.is_finite();
        let scale_factor = if overflowed {
            100.0 / entries.iter().map(|e| e.relative).sum::<f64>()
        } else {
            100.0 / display_total
        };

        entries
            .into_iter()
            .enumerate()
            .map(|(rank, entry)| DisplayBucket {
                name: entry.name.to_string(),
                label: entry.label.to_string(),
                raw_percentage: entry.raw.min(f64::MAX),
                normalized_percentage: if overflowed {
                    entry.relative * scale_factor
                } else {
                    entry.raw * scale_factor
                },
                rank,
            })
            .collect()
    }
}

struct Entry<'a> {
    name: &'a str,
    label: &'a str,
    raw: f64,
    /// `raw` divided by the largest stage percentage
    relative: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn names(buckets: &[DisplayBucket]) -> Vec<&str> {
        buckets.iter().map(|b| b.name.as_str()).collect()
    }

    fn normalized_total(buckets: &[DisplayBucket]) -> f64 {
        buckets.iter().map(|b| b.normalized_percentage).sum()
    }

    #[test]
    fn test_zero_max_visible_rejected() {
        assert_eq!(StageBreakdownReducer::new(0), Err(Error::ZeroMaxVisible));
        assert_eq!(StageBreakdownReducer::new(1).unwrap().max_visible(), 1);
        assert_eq!(StageBreakdownReducer::default().max_visible(), 3);
    }

    #[test]
    fn test_top_three_plus_other() {
        let stages: StageSet = [
            ("tokenize", 50.0),
            ("queue", 30.0),
            ("inference", 15.0),
            ("overhead", 5.0),
        ]
        .into_iter()
        .collect();

        let buckets = StageBreakdownReducer::default().reduce(&stages);

        assert_eq!(names(&buckets), ["tokenize", "queue", "inference", "other"]);
        assert_eq!(buckets[3].raw_percentage, 5.0);
        assert_eq!(buckets[3].label, OTHER_LABEL);
        for (i, bucket) in buckets.iter().enumerate() {
            assert_eq!(bucket.rank, i);
        }
        assert!((normalized_total(&buckets) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_literal_other_in_tail_not_double_counted() {
        let stages: StageSet = [("a", 10.0), ("b", 10.0), ("c", 10.0), ("d", 10.0), ("other", 5.0)]
            .into_iter()
            .collect();

        let buckets = StageBreakdownReducer::default().reduce(&stages);

        assert_eq!(names(&buckets), ["a", "b", "c", "other"]);
        assert_eq!(buckets.iter().filter(|b| b.is_other()).count(), 1);
        assert_eq!(buckets[3].raw_percentage, 15.0);
        assert!((normalized_total(&buckets) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_literal_other_in_head_absorbs_tail() {
        let stages: StageSet = [
            StageMetric::new("inference", "Inference", 30.0),
            StageMetric::new("other", "Unaccounted", 40.0),
            StageMetric::new("tokenize", "Tokenize", 20.0),
            StageMetric::new("queue", "Queue Wait", 10.0),
        ]
        .into_iter()
        .collect();

        let buckets = StageBreakdownReducer::default().reduce(&stages);

        assert_eq!(names(&buckets), ["other", "inference", "tokenize"]);
        assert_eq!(buckets[0].raw_percentage, 50.0);
        assert_eq!(buckets[0].label, "Unaccounted");
        assert!((normalized_total(&buckets) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_literal_other_in_head_without_tail_unchanged() {
        let stages: StageSet = [("other", 30.0), ("inference", 70.0)].into_iter().collect();

        let buckets = StageBreakdownReducer::default().reduce(&stages);

        assert_eq!(names(&buckets), ["inference", "other"]);
        assert_eq!(buckets[1].raw_percentage, 30.0);
    }

    #[test]
    fn test_all_zero_returns_empty() {
        let stages: StageSet = [("tokenize", 0.0), ("inference", -1.0), ("queue", f64::NAN)]
            .into_iter()
            .collect();

        assert!(StageBreakdownReducer::default().reduce(&stages).is_empty());
        assert!(StageBreakdownReducer::default().reduce(&StageSet::new()).is_empty());
    }

    #[test]
    fn test_zero_entries_excluded() {
        let stages: StageSet = [("tokenize", 0.0), ("inference", 80.0), ("queue", 0.0)]
            .into_iter()
            .collect();

        let buckets = StageBreakdownReducer::default().reduce(&stages);

        assert_eq!(names(&buckets), ["inference"]);
        assert_eq!(buckets[0].normalized_percentage, 100.0);
        assert_eq!(buckets[0].raw_percentage, 80.0);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let stages: StageSet = [("queue", 25.0), ("tokenize", 25.0), ("inference", 50.0)]
            .into_iter()
            .collect();

        let buckets = StageBreakdownReducer::default().reduce(&stages);

        assert_eq!(names(&buckets), ["inference", "queue", "tokenize"]);
        assert_eq!(buckets[1].rank, 1);
        assert_eq!(buckets[2].rank, 2);
    }

    #[test]
    fn test_raw_preserved_when_inputs_do_not_sum_to_100() {
        let stages: StageSet = [("tokenize", 20.0), ("inference", 20.0)].into_iter().collect();

        let buckets = StageBreakdownReducer::default().reduce(&stages);

        assert_eq!(buckets[0].raw_percentage, 20.0);
        assert_eq!(buckets[0].normalized_percentage, 50.0);
        assert_eq!(buckets[1].normalized_percentage, 50.0);
    }

    #[rstest]
    #[case(3, &[("a", 1e308), ("b", 1e308), ("c", 1.0)], &[50.0, 50.0, 0.0])]
    #[case(1, &[("a", 1e308), ("b", 1e308), ("c", 1e308)], &[100.0 / 3.0, 200.0 / 3.0])]
    #[case(2, &[("a", f64::MAX), ("b", 1.0)], &[100.0, 0.0])]
    fn test_huge_percentages_still_normalize(
        #[case] max_visible: usize,
        #[case] pairs: &[(&str, f64)],
        #[case] expected: &[f64],
    ) {
        let stages: StageSet = pairs.iter().copied().collect();

        let buckets = StageBreakdownReducer::new(max_visible).unwrap().reduce(&stages);

        assert_eq!(buckets.len(), expected.len());
        for (bucket, want) in buckets.iter().zip(expected) {
            assert!(
                (bucket.normalized_percentage - want).abs() < 1e-6,
                "{} normalized to {}, expected {}",
                bucket.name,
                bucket.normalized_percentage,
                want
            );
            assert!(bucket.raw_percentage.is_finite());
        }
        assert!((normalized_total(&buckets) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_huge_percentages_keep_raw_values() {
        let stages: StageSet = [("a", 1e308), ("b", 1e308), ("c", 1.0)].into_iter().collect();

        let buckets = StageBreakdownReducer::default().reduce(&stages);

        assert_eq!(names(&buckets), ["a", "b", "c"]);
        assert_eq!(buckets[0].raw_percentage, 1e308);
        assert_eq!(buckets[2].raw_percentage, 1.0);
    }

    #[rstest]
    #[case(1, 2)]
    #[case(2, 3)]
    #[case(3, 4)]
    #[case(5, 6)]
    #[case(6, 6)]
    #[case(10, 6)]
    fn test_output_bounded_by_max_visible(#[case] max_visible: usize, #[case] expected_len: usize) {
        let stages: StageSet = [
            ("s1", 30.0),
            ("s2", 25.0),
            ("s3", 20.0),
            ("s4", 15.0),
            ("s5", 7.0),
            ("s6", 3.0),
        ]
        .into_iter()
        .collect();

        let buckets = StageBreakdownReducer::new(max_visible).unwrap().reduce(&stages);

        assert_eq!(buckets.len(), expected_len);
        assert!(buckets.len() <= max_visible + 1);
        assert!((normalized_total(&buckets) - 100.0).abs() < 1e-6);
    }
}
