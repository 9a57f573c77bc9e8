//! Keyword-based sentiment pipeline.
//!
//! Needs no model files, so it loads instantly. Used as the local pipeline when
//! no ONNX model directory is configured.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use sentiscope_core::sentiment::{NEGATIVE, POSITIVE};
use sentiscope_core::{LocalPipeline, PipelineLoader, RawOutput};

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "amazing", "wonderful", "fantastic", "superb",
    "outstanding", "brilliant", "love", "loved", "loving", "best", "better", "happy",
    "joy", "beautiful", "perfect", "awesome", "incredible", "delightful", "pleasant",
    "satisfied", "recommend", "recommended", "impressive", "exceptional", "reliable",
    "helpful", "sturdy", "fast", "easy", "comfortable", "worth", "nice",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "horrible", "poor", "worst", "worse", "hate",
    "hated", "dislike", "disappointing", "disappointed", "failure", "failed", "fail",
    "sad", "unhappy", "angry", "annoyed", "frustrated", "frustrating", "problem",
    "broken", "broke", "crash", "crashed", "useless", "waste", "scam", "fake",
    "unreliable", "slow", "difficult", "confusing", "overpriced", "worthless",
    "garbage", "trash", "refund", "cheap",
];

/// Counts positive and negative keywords and reports the dominant polarity.
///
/// Always emits `POSITIVE` or `NEGATIVE`, matching the ONNX pipeline's label
/// set. Text with no sentiment words scores `POSITIVE` at exactly 0.5, which
/// normalises to neutral.
pub struct LexiconPipeline {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
}

impl Default for LexiconPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconPipeline {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
        }
    }

    fn score(&self, text: &str) -> RawOutput {
        let lower = text.to_lowercase();
        let (mut pos, mut neg) = (0usize, 0usize);
        for word in lower.split(|c: char| !c.is_alphabetic()).filter(|w| !w.is_empty()) {
            if self.positive.contains(word) {
                pos += 1;
            } else if self.negative.contains(word) {
                neg += 1;
            }
        }

        let total = pos + neg;
        if total == 0 {
            return RawOutput::new(POSITIVE, 0.5);
        }

        let ratio = pos as f32 / total as f32;
        if ratio >= 0.5 {
            RawOutput::new(POSITIVE, ratio)
        } else {
            RawOutput::new(NEGATIVE, 1.0 - ratio)
        }
    }
}

impl LocalPipeline for LexiconPipeline {
    fn classify(&self, text: &str) -> anyhow::Result<RawOutput> {
        Ok(self.score(text))
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}

/// Loader for [`LexiconPipeline`]; completes immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconLoader;

#[async_trait]
impl PipelineLoader for LexiconLoader {
    async fn load(&self) -> anyhow::Result<Arc<dyn LocalPipeline>> {
        Ok(Arc::new(LexiconPipeline::new()))
    }
}
