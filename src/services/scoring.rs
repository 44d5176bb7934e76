// ==================== SCORE AGGREGATION ====================
// Per-category and overall averages for one peer's scores.

use crate::{
    debug_log,
    models::{CategorizedQuestions, Scores},
};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct CategoryAverage {
    pub name: String,
    pub average: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, utoipa::ToSchema)]
pub struct PeerAverages {
    /// Keyed by category code
    pub category_averages: BTreeMap<String, CategoryAverage>,
    pub overall_average: f64,
}

impl PeerAverages {
    /// Category name → average, the shape stored on summarized evaluations.
    pub fn by_category_name(&self) -> BTreeMap<String, f64> {
        self.category_averages
            .values()
            .map(|category| (category.name.clone(), category.average))
            .collect()
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count > 0 {
        sum / count as f64
    } else {
        0.0
    }
}

/// Averages `scores` by category and overall.
///
/// The overall average runs over every finite score, whether or not its
/// question belongs to a known category. Non-finite scores are skipped with a
/// warning.
pub fn calculate_peer_averages(
    peer_id: &str,
    scores: &Scores,
    questions: &CategorizedQuestions,
) -> PeerAverages {
    debug_log!("scoring.calculate_peer_averages for peer: {}", peer_id);

    if scores.is_empty() {
        debug_log!("scoring.calculate_peer_averages: no scores for {}", peer_id);
        return PeerAverages::default();
    }

    if questions.is_empty() {
        log::warn!("Categorized questions are empty. Calculating overall average only.");
    }

    let mut aggregates: BTreeMap<String, (String, f64, usize)> = BTreeMap::new();
    let mut total = 0.0;
    let mut count = 0usize;

    for (question_id, &score) in scores {
        if !score.is_finite() {
            log::warn!("Invalid score for question {}: {}", question_id, score);
            continue;
        }

        match questions.category_of(question_id) {
            Some(category) => {
                let entry = aggregates
                    .entry(category.code.clone())
                    .or_insert_with(|| (category.display_name().to_string(), 0.0, 0));
                entry.1 += score;
                entry.2 += 1;
            }
            None if !questions.is_empty() => {
                log::warn!(
                    "Question ID {} not found in current categories for averaging.",
                    question_id
                );
            }
            None => {}
        }

        total += score;
        count += 1;
    }

    let category_averages = aggregates
        .into_iter()
        .map(|(code, (name, sum, n))| {
            (
                code,
                CategoryAverage {
                    name,
                    average: mean(sum, n),
                    count: n,
                },
            )
        })
        .collect();

    PeerAverages {
        category_averages,
        overall_average: mean(total, count),
    }
}
