use crate::catalog::LesionClass;
use crate::error::ClassifierError;
use serde::Serialize;

pub const TOP_K: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScore {
    pub class: LesionClass,
    pub probability: f32,
}

/// A ranked class as it appears in the response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPrediction {
    #[serde(skip)]
    pub rank: usize,
    pub class: LesionClass,
    pub confidence: f32,
    pub explanation: &'static str,
}

impl RankedPrediction {
    /// Attach rank (from 1) and catalog text to already ordered scores.
    pub fn from_scores(scores: &[ClassScore]) -> Vec<Self> {
        scores
            .iter()
            .enumerate()
            .map(|(i, score)| Self {
                rank: i + 1,
                class: score.class,
                confidence: score.probability,
                explanation: score.class.explanation(),
            })
            .collect()
    }
}

/// Pair scores with classes by position, sort descending and keep `k`.
/// Equal scores keep their class order.
pub fn rank(
    probabilities: &[f32],
    classes: &[LesionClass],
    k: usize,
) -> Result<Vec<ClassScore>, ClassifierError> {
    if probabilities.len() != classes.len() {
        return Err(ClassifierError::DataConsistency(format!(
            "model returned {} scores for {} classes",
            probabilities.len(),
            classes.len()
        )));
    }
    if let Some(i) = probabilities.iter().position(|p| !p.is_finite()) {
        return Err(ClassifierError::DataConsistency(format!(
            "score for '{}' is not finite ({})",
            classes[i], probabilities[i]
        )));
    }

    let mut scores: Vec<ClassScore> = classes
        .iter()
        .zip(probabilities)
        .map(|(&class, &probability)| ClassScore { class, probability })
        .collect();

    // sort_by is stable
    scores.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    scores.truncate(k);

    Ok(scores)
}
