//! Canonical sentiment result and the normaliser shared by every backend.
//!
//! Backends never produce a [`SentimentBucket`] directly. They produce a
//! [`RawOutput`] (an uppercase label plus a score) and the same threshold rule
//! in [`normalize`] turns it into a [`ClassificationResult`], so a confidence
//! value means the same thing whichever backend computed it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Label emitted for positive sentiment by both backends.
pub const POSITIVE: &str = "POSITIVE";
/// Label emitted for negative sentiment by both backends.
pub const NEGATIVE: &str = "NEGATIVE";
/// Label only the remote backend emits.
pub const NEUTRAL: &str = "NEUTRAL";

/// Scores at or below this value are never trusted as polar sentiment.
pub const POLARITY_THRESHOLD: f32 = 0.5;

/// One of the three canonical sentiment outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentBucket {
    Positive,
    Negative,
    Neutral,
}

impl SentimentBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for SentimentBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-independent classification of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub bucket: SentimentBucket,
    /// Confidence in `[0, 1]`, passed through from the backend unchanged.
    pub confidence: f32,
}

impl ClassificationResult {
    /// Confidence as a percentage, e.g. `98.0` for `0.98`.
    pub fn percent(&self) -> f32 {
        self.confidence * 100.0
    }
}

/// Intermediate shape every backend produces before normalisation.
///
/// The local pipeline yields `POSITIVE`/`NEGATIVE`; the remote parser may also
/// yield `NEUTRAL`. Labels are expected uppercase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOutput {
    pub label: String,
    pub score: f32,
}

impl RawOutput {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }

    /// Map this raw judgment onto the canonical result.
    pub fn normalize(&self) -> ClassificationResult {
        normalize(&self.label, self.score)
    }
}

/// Map a backend label/score pair onto a canonical bucket.
///
/// `POSITIVE` or `NEGATIVE` with a score strictly above 0.5 yields the matching
/// bucket. Everything else (`NEUTRAL`, weak scores, NaN, unknown labels) is
/// neutral. The score is carried through as the confidence.
pub fn normalize(label: &str, score: f32) -> ClassificationResult {
    let bucket = match label {
        POSITIVE if score > POLARITY_THRESHOLD => SentimentBucket::Positive,
        NEGATIVE if score > POLARITY_THRESHOLD => SentimentBucket::Negative,
        _ => SentimentBucket::Neutral,
    };
    ClassificationResult {
        bucket,
        confidence: score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRONG: &[f32] = &[0.501, 0.51, 0.7, 0.98, 1.0];
    const WEAK: &[f32] = &[0.0, 0.1, 0.3, 0.49, 0.5];

    #[test]
    fn strong_polar_scores_keep_their_bucket() {
        for &score in STRONG {
            assert_eq!(
                normalize(POSITIVE, score).bucket,
                SentimentBucket::Positive,
                "score {score}"
            );
            assert_eq!(
                normalize(NEGATIVE, score).bucket,
                SentimentBucket::Negative,
                "score {score}"
            );
        }
    }

    #[test]
    fn weak_polar_scores_are_neutral() {
        for &score in WEAK {
            assert_eq!(normalize(POSITIVE, score).bucket, SentimentBucket::Neutral);
            assert_eq!(normalize(NEGATIVE, score).bucket, SentimentBucket::Neutral);
        }
    }

    #[test]
    fn neutral_label_ignores_score() {
        for &score in STRONG.iter().chain(WEAK) {
            assert_eq!(normalize(NEUTRAL, score).bucket, SentimentBucket::Neutral);
        }
    }

    #[test]
    fn unknown_and_lowercase_labels_are_neutral() {
        assert_eq!(normalize("MIXED", 0.9).bucket, SentimentBucket::Neutral);
        assert_eq!(normalize("positive", 0.9).bucket, SentimentBucket::Neutral);
        assert_eq!(normalize("", 0.9).bucket, SentimentBucket::Neutral);
    }

    #[test]
    fn nan_score_is_neutral() {
        assert_eq!(normalize(POSITIVE, f32::NAN).bucket, SentimentBucket::Neutral);
    }

    #[test]
    fn confidence_passes_through() {
        let result = RawOutput::new(NEGATIVE, 0.83).normalize();
        assert_eq!(result.bucket, SentimentBucket::Negative);
        assert_eq!(result.confidence, 0.83);

        let weak = normalize(POSITIVE, 0.42);
        assert_eq!(weak.confidence, 0.42);
    }

    #[test]
    fn percent_rendering_value() {
        let result = normalize(POSITIVE, 0.98);
        assert_eq!(format!("{:.1}%", result.percent()), "98.0%");
    }

    #[test]
    fn bucket_serializes_lowercase() {
        let json = serde_json::to_string(&SentimentBucket::Negative).unwrap();
        assert_eq!(json, "\"negative\"");
    }
}
