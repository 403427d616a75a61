//! Day-over-day diff between two roster snapshots.
//!
//! The diff is a left outer join of the current roster against the prior
//! snapshot, keyed by member name. Output follows the current roster: one
//! record per current member, in order. Members absent from the prior
//! snapshot get zero prior counters; members that left are not reported.

use std::collections::{HashMap, HashSet};

use crate::models::{DiffRecord, DiffSummary, Snapshot};

/// Join `current` against `prior` into per-member deltas.
pub fn calculate_diff(prior: &Snapshot, current: &Snapshot) -> Vec<DiffRecord> {
    let prior_counts: HashMap<&str, (u64, u64)> = prior
        .iter()
        .map(|m| (m.name.as_str(), (m.contributions, m.posts)))
        .collect();

    current
        .iter()
        .map(|member| {
            let (contributions, posts) = prior_counts
                .get(member.name.as_str())
                .copied()
                .unwrap_or_default();
            DiffRecord::new(member, contributions, posts)
        })
        .collect()
}

/// Summarize a diff computed by [`calculate_diff`].
pub fn summarize(prior: &Snapshot, current: &Snapshot, diffs: &[DiffRecord]) -> DiffSummary {
    let prior_names: HashSet<&str> = prior.iter().map(|m| m.name.as_str()).collect();
    let current_names: HashSet<&str> = current.iter().map(|m| m.name.as_str()).collect();

    DiffSummary {
        members: diffs.len(),
        new_members: current_names.difference(&prior_names).count(),
        departed_members: prior_names.difference(&current_names).count(),
        changed_members: diffs.iter().filter(|d| d.has_changes()).count(),
        total_delta_contributions: saturating_total(diffs.iter().map(|d| d.delta_contributions)),
        total_delta_posts: saturating_total(diffs.iter().map(|d| d.delta_posts)),
    }
}

fn saturating_total(deltas: impl Iterator<Item = i64>) -> i64 {
    deltas.fold(0, i64::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MAX_COUNTER, Member};

    fn snapshot(members: &[(&str, u64, u64)]) -> Snapshot {
        members
            .iter()
            .map(|&(name, contributions, posts)| Member::new(name, contributions, posts))
            .collect::<Vec<_>>()
            .into()
    }

    fn record(name: &str, values: [i64; 6]) -> DiffRecord {
        DiffRecord {
            name: name.to_string(),
            contributions: values[0] as u64,
            posts: values[1] as u64,
            prior_contributions: values[2] as u64,
            prior_posts: values[3] as u64,
            delta_contributions: values[4],
            delta_posts: values[5],
        }
    }

    #[test]
    fn test_end_to_end_example() {
        let prior = snapshot(&[("A", 5, 2), ("B", 3, 1)]);
        let current = snapshot(&[("A", 8, 2), ("C", 1, 0)]);

        let diffs = calculate_diff(&prior, &current);
        assert_eq!(
            diffs,
            vec![record("A", [8, 2, 5, 2, 3, 0]), record("C", [1, 0, 0, 0, 1, 0])]
        );
    }

    #[test]
    fn test_output_follows_current_roster() {
        let prior = snapshot(&[("c", 1, 1), ("b", 1, 1), ("a", 1, 1), ("gone", 9, 9)]);
        let current = snapshot(&[("a", 1, 1), ("b", 2, 1), ("c", 1, 3), ("new", 4, 0)]);

        let diffs = calculate_diff(&prior, &current);
        assert_eq!(diffs.len(), current.len());
        let names: Vec<&str> = diffs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "new"]);
    }

    #[test]
    fn test_new_member_gets_full_counts_as_delta() {
        let diffs = calculate_diff(&Snapshot::default(), &snapshot(&[("a", 7, 3)]));
        assert_eq!(diffs[0].prior_contributions, 0);
        assert_eq!(diffs[0].prior_posts, 0);
        assert_eq!(diffs[0].delta_contributions, 7);
        assert_eq!(diffs[0].delta_posts, 3);
    }

    #[test]
    fn test_unchanged_members_have_zero_deltas() {
        let roster = snapshot(&[("a", 7, 3), ("b", 0, 0)]);
        let diffs = calculate_diff(&roster, &roster);
        assert!(diffs.iter().all(|d| !d.has_changes()));
    }

    #[test]
    fn test_negative_deltas_are_kept() {
        let diffs = calculate_diff(&snapshot(&[("a", 10, 4)]), &snapshot(&[("a", 9, 2)]));
        assert_eq!(diffs[0].delta_contributions, -1);
        assert_eq!(diffs[0].delta_posts, -2);
    }

    #[test]
    fn test_empty_current_gives_empty_diff() {
        let diffs = calculate_diff(&snapshot(&[("a", 1, 1)]), &Snapshot::default());
        assert!(diffs.is_empty());
    }

    #[test]
    fn test_summary_counts() {
        let prior = snapshot(&[("A", 5, 2), ("B", 3, 1)]);
        let current = snapshot(&[("A", 8, 2), ("C", 1, 0), ("D", 0, 0)]);
        let diffs = calculate_diff(&prior, &current);

        let summary = summarize(&prior, &current, &diffs);
        assert_eq!(
            summary,
            DiffSummary {
                members: 3,
                new_members: 2,
                departed_members: 1,
                changed_members: 2,
                total_delta_contributions: 4,
                total_delta_posts: 0,
            }
        );
    }

    #[test]
    fn test_huge_counters_do_not_wrap() {
        let prior = Snapshot::default();
        let current = snapshot(&[("big", u64::MAX, 0), ("max", MAX_COUNTER, MAX_COUNTER)]);

        let diffs = calculate_diff(&prior, &current);
        assert_eq!(diffs[0].delta_contributions, i64::MAX);
        assert_eq!(diffs[1].delta_posts, i64::MAX);

        let summary = summarize(&prior, &current, &diffs);
        assert_eq!(summary.total_delta_contributions, i64::MAX);
    }
}
