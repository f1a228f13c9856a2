use serde::{Deserialize, Serialize};

/// Smallest group size ever suggested or used.
pub const MIN_GROUP_SIZE: usize = 2;
/// Largest group size considered by the recommender.
pub const MAX_CANDIDATE_SIZE: usize = 8;
/// Number of recommendations kept after ranking.
pub const MAX_RECOMMENDATIONS: usize = 4;

const PREFERRED_SIZES: std::ops::RangeInclusive<usize> = 3..=5;
const SWEET_SPOT: usize = 4;

/// A candidate group size with its desirability score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSizeRecommendation {
    /// Members per group.
    pub size: usize,
    /// Number of full groups.
    pub num_groups: usize,
    /// Names left over after the full groups.
    pub remainder: usize,
    /// Desirability in `[0, 115]`.
    pub score: u32,
    /// Divides evenly and lies in the preferred 3–5 band.
    pub is_optimal: bool,
    /// Human-readable summary.
    pub description: String,
}

impl GroupSizeRecommendation {
    fn candidate(total: usize, size: usize) -> Option<Self> {
        let num_groups = total / size;
        if num_groups == 0 {
            return None;
        }
        let remainder = total % size;
        let preferred = PREFERRED_SIZES.contains(&size);
        let mut score = if remainder == 0 {
            100
        } else {
            100u32.saturating_sub(u32::try_from(remainder).unwrap_or(u32::MAX).saturating_mul(20))
        };
        if preferred {
            score += 10;
        }
        if size == SWEET_SPOT {
            score += 5;
        }
        Some(Self {
            size,
            num_groups,
            remainder,
            score,
            is_optimal: remainder == 0 && preferred,
            description: describe(num_groups, size, remainder),
        })
    }
}

fn describe(num_groups: usize, size: usize, remainder: usize) -> String {
    if remainder == 0 {
        format!("{num_groups} equal groups of {size}")
    } else {
        format!(
            "{num_groups} groups of {size}, {remainder} {} left over",
            person_noun(remainder)
        )
    }
}

fn person_noun(count: usize) -> &'static str {
    if count > 1 {
        "persons"
    } else {
        "person"
    }
}

/// Ranks group sizes `2..=min(8, total)` for `total` names and keeps the best four.
///
/// Equal scores keep ascending size order.
#[must_use]
pub fn recommend(total: usize) -> Vec<GroupSizeRecommendation> {
    if total < MIN_GROUP_SIZE {
        return Vec::new();
    }
    let mut candidates: Vec<_> = (MIN_GROUP_SIZE..=MAX_CANDIDATE_SIZE.min(total))
        .filter_map(|size| GroupSizeRecommendation::candidate(total, size))
        .collect();
    // `sort_by` is stable.
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates.truncate(MAX_RECOMMENDATIONS);
    candidates
}

/// Upper bound of the size selector offered for `total` names.
#[must_use]
pub fn max_selectable_size(total: usize) -> usize {
    MIN_GROUP_SIZE.max(MAX_CANDIDATE_SIZE.min(total))
}

/// Sizing advice by headcount band.
#[must_use]
pub fn advice(total: usize) -> &'static str {
    match total {
        0..=5 => "For small groups, 2-3 people work well for close collaboration.",
        6..=11 => "Medium groups benefit from 3-4 people for balanced participation.",
        12..=19 => {
            "For larger groups, 4-5 people per group allows good discussion while staying manageable."
        }
        _ => "With many participants, 4-6 people per group ensures everyone can contribute effectively.",
    }
}

/// What a partition with a given size would look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPreview {
    /// Size the preview was computed for.
    pub group_size: usize,
    /// Full groups.
    pub full_groups: usize,
    /// Members of the trailing short group, zero when the split is even.
    pub left_over: usize,
}

impl GroupPreview {
    /// Computes the preview; a zero size is treated as the minimum size.
    #[must_use]
    pub fn new(total: usize, group_size: usize) -> Self {
        let group_size = group_size.max(MIN_GROUP_SIZE);
        Self {
            group_size,
            full_groups: total / group_size,
            left_over: total % group_size,
        }
    }

    /// "Will create ..." line shown next to the size selector.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut text = format!("Will create {} groups", self.full_groups);
        if self.left_over > 0 {
            text.push_str(&format!(
                " with {} {} left over",
                self.left_over,
                person_noun(self.left_over)
            ));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(recs: &[GroupSizeRecommendation]) -> Vec<usize> {
        recs.iter().map(|rec| rec.size).collect()
    }

    #[test]
    fn nothing_for_fewer_than_two() {
        assert!(recommend(0).is_empty());
        assert!(recommend(1).is_empty());
    }

    #[test]
    fn ten_names_rank_five_two_three_four() {
        let recs = recommend(10);
        assert_eq!(recs.len(), 4);
        assert_eq!(sizes(&recs), vec![5, 2, 3, 4]);
        assert_eq!(recs[0].score, 110);
        assert!(recs[0].is_optimal);
        assert_eq!(recs[0].description, "2 equal groups of 5");
        assert_eq!(recs[1].score, 100);
        assert!(!recs[1].is_optimal);
        assert_eq!(recs[2].score, 90);
        assert_eq!(recs[2].description, "3 groups of 3, 1 person left over");
        // 10 / 4 leaves two: 100 - 40 + 10 + 5.
        assert_eq!(recs[3].score, 75);
        assert_eq!(recs[3].remainder, 2);
        assert_eq!(recs[3].description, "2 groups of 4, 2 persons left over");
    }

    #[test]
    fn sweet_spot_reaches_top_score() {
        let recs = recommend(8);
        assert_eq!(recs[0].size, 4);
        assert_eq!(recs[0].score, 115);
        assert!(recs[0].is_optimal);
    }

    #[test]
    fn ties_keep_ascending_size() {
        // 12: sizes 2 and 6 both score 100, 3 scores 110, 4 scores 115.
        let recs = recommend(12);
        assert_eq!(sizes(&recs), vec![4, 3, 2, 6]);
        assert_eq!(recs[2].score, recs[3].score);
    }

    #[test]
    fn two_names_only_size_two() {
        let recs = recommend(2);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].size, 2);
        assert_eq!(recs[0].num_groups, 1);
        assert_eq!(recs[0].description, "1 equal groups of 2");
    }

    #[test]
    fn large_remainders_floor_at_zero_plus_bonus() {
        // 13 / 7 leaves 6: 100 - 120 floors at 0.
        let recs = recommend(13);
        assert!(recs.iter().all(|rec| rec.score <= 115));
        let all: Vec<_> = (2..=8)
            .filter_map(|size| GroupSizeRecommendation::candidate(13, size))
            .collect();
        let seven = all.iter().find(|rec| rec.size == 7).unwrap();
        assert_eq!(seven.score, 0);
        assert_eq!(seven.description, "1 groups of 7, 6 persons left over");
    }

    #[test]
    fn repeated_calls_agree() {
        for total in 0..40 {
            assert_eq!(recommend(total), recommend(total));
            for rec in recommend(total) {
                assert!(rec.remainder < rec.size);
                assert!(rec.num_groups >= 1);
                assert!(rec.score <= 115);
            }
        }
    }

    #[test]
    fn advice_bands() {
        assert!(advice(5).starts_with("For small groups"));
        assert!(advice(6).starts_with("Medium groups"));
        assert!(advice(19).starts_with("For larger groups"));
        assert!(advice(20).starts_with("With many participants"));
    }

    #[test]
    fn selector_bounds() {
        assert_eq!(max_selectable_size(0), 2);
        assert_eq!(max_selectable_size(5), 5);
        assert_eq!(max_selectable_size(30), 8);
    }

    #[test]
    fn preview_summaries() {
        assert_eq!(
            GroupPreview::new(7, 3).summary(),
            "Will create 2 groups with 1 person left over"
        );
        assert_eq!(
            GroupPreview::new(8, 3).summary(),
            "Will create 2 groups with 2 persons left over"
        );
        assert_eq!(GroupPreview::new(8, 4).summary(), "Will create 2 groups");
        assert_eq!(GroupPreview::new(8, 0).group_size, 2);
    }
}
