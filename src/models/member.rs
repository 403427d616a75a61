// src/models/member.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Largest counter value a snapshot may hold, so deltas fit in `i64`.
pub const MAX_COUNTER: u64 = i64::MAX as u64;

/// A single organization member and their activity counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Member {
    pub name: String,
    pub contributions: u64,
    pub posts: u64,
}

impl Member {
    pub fn new(name: impl Into<String>, contributions: u64, posts: u64) -> Self {
        Self {
            name: name.into(),
            contributions,
            posts,
        }
    }
}

/// The roster at one point in time, in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    members: Vec<Member>,
}

impl Snapshot {
    pub fn new(members: Vec<Member>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn into_members(self) -> Vec<Member> {
        self.members
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Member> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Drop later occurrences of a repeated name, keeping the first.
    ///
    /// Returns the number of members removed.
    pub fn dedup_by_name(&mut self) -> usize {
        let before = self.members.len();
        let mut seen = HashSet::with_capacity(before);
        self.members.retain(|m| seen.insert(m.name.clone()));
        before - self.members.len()
    }

    /// Check that every member has a non-blank, unique name and counters
    /// no larger than [`MAX_COUNTER`].
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.members.len());
        for member in &self.members {
            if member.name.trim().is_empty() {
                return Err(AppError::validation("member with empty name"));
            }
            if member.contributions > MAX_COUNTER || member.posts > MAX_COUNTER {
                return Err(AppError::validation(format!(
                    "counters of '{}' exceed {}",
                    member.name, MAX_COUNTER
                )));
            }
            if !seen.insert(member.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate member name '{}'",
                    member.name
                )));
            }
        }
        Ok(())
    }
}

impl From<Vec<Member>> for Snapshot {
    fn from(members: Vec<Member>) -> Self {
        Self::new(members)
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Member;
    type IntoIter = std::slice::Iter<'a, Member>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

/// A current member joined with their counters from the prior snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiffRecord {
    pub name: String,
    pub contributions: u64,
    pub posts: u64,
    pub prior_contributions: u64,
    pub prior_posts: u64,
    pub delta_contributions: i64,
    pub delta_posts: i64,
}

impl DiffRecord {
    /// Build a record from the current member and the prior counters.
    pub fn new(member: &Member, prior_contributions: u64, prior_posts: u64) -> Self {
        Self {
            name: member.name.clone(),
            contributions: member.contributions,
            posts: member.posts,
            prior_contributions,
            prior_posts,
            delta_contributions: delta(member.contributions, prior_contributions),
            delta_posts: delta(member.posts, prior_posts),
        }
    }

    pub fn has_changes(&self) -> bool {
        self.delta_contributions != 0 || self.delta_posts != 0
    }
}

/// `current - prior`, saturating at the `i64` bounds.
fn delta(current: u64, prior: u64) -> i64 {
    let wide = i128::from(current) - i128::from(prior);
    i64::try_from(wide).unwrap_or(if wide < 0 { i64::MIN } else { i64::MAX })
}

/// Aggregate view of one diff run, used for logs and responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    /// Members in the current roster
    pub members: usize,
    /// Current members absent from the prior snapshot
    pub new_members: usize,
    /// Prior members absent from the current roster (not in the output)
    pub departed_members: usize,
    /// Members with a non-zero delta
    pub changed_members: usize,
    pub total_delta_contributions: i64,
    pub total_delta_posts: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_unique_names() {
        let snapshot = Snapshot::from(vec![Member::new("alice", 1, 2), Member::new("bob", 0, 0)]);
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let snapshot = Snapshot::from(vec![Member::new("alice", 1, 2), Member::new("alice", 3, 4)]);
        assert!(matches!(snapshot.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_blank_names() {
        let snapshot = Snapshot::from(vec![Member::new("  ", 1, 2)]);
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let mut snapshot = Snapshot::from(vec![
            Member::new("alice", 1, 2),
            Member::new("bob", 0, 0),
            Member::new("alice", 3, 4),
        ]);
        assert_eq!(snapshot.dedup_by_name(), 1);
        assert_eq!(
            snapshot.into_members(),
            vec![Member::new("alice", 1, 2), Member::new("bob", 0, 0)]
        );
    }

    #[test]
    fn test_diff_record_allows_negative_deltas() {
        let record = DiffRecord::new(&Member::new("alice", 3, 1), 5, 2);
        assert_eq!(record.delta_contributions, -2);
        assert_eq!(record.delta_posts, -1);
        assert!(record.has_changes());
    }

    #[test]
    fn test_validate_rejects_counter_above_max() {
        let snapshot = Snapshot::from(vec![Member::new("big", MAX_COUNTER + 1, 0)]);
        assert!(matches!(snapshot.validate(), Err(AppError::Validation(_))));

        let snapshot = Snapshot::from(vec![Member::new("big", MAX_COUNTER, MAX_COUNTER)]);
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn test_diff_record_deltas_do_not_wrap() {
        let record = DiffRecord::new(&Member::new("big", u64::MAX, 0), 0, u64::MAX);
        assert_eq!(record.delta_contributions, i64::MAX);
        assert_eq!(record.delta_posts, i64::MIN);

        let record = DiffRecord::new(&Member::new("edge", MAX_COUNTER, 0), 0, MAX_COUNTER);
        assert_eq!(record.delta_contributions, i64::MAX);
        assert_eq!(record.delta_posts, -i64::MAX);
    }
}
