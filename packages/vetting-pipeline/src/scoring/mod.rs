//! Deterministic scoring engine.
//!
//! Maps raw evidence text plus a tier designation to a bounded overall
//! score, per-category breakdown, and red-flag list. Pure and synchronous;
//! all policy lives in the injected [`ScoringRules`].

pub mod rules;

pub use rules::{CategoryRule, RedFlagRule, ScoringRules, StrengthWeights};

use std::collections::BTreeMap;

use crate::types::Tier;

/// Evidence strength of one keyword match, decided by markers co-occurring
/// in a window around the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrength {
    High,
    Medium,
    Low,
}

/// Output of one scoring run.
#[derive(Debug, Clone)]
pub struct ScoreResult {
    pub overall_score: f32,
    pub category_scores: BTreeMap<String, f32>,
    pub red_flags: Vec<String>,
    pub confidence_level: f32,
    pub tier_classification: String,
}

pub struct ScoringEngine {
    rules: ScoringRules,
}

impl ScoringEngine {
    pub fn new(rules: ScoringRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// Score evidence text against the tier's category set.
    ///
    /// Matching is case-insensitive substring matching, deliberately not
    /// word-bounded: a keyword inside a longer word matches.
    pub fn score(&self, evidence_text: &str, tier: Tier) -> ScoreResult {
        let text = evidence_text.to_lowercase();

        // No evidence at all: report the neutral classification rather than
        // letting a zero score read as "problematic".
        if text.trim().is_empty() {
            let category_scores = self
                .rules
                .categories_for(tier)
                .iter()
                .map(|c| (c.name.clone(), 0.0))
                .collect();
            return ScoreResult {
                overall_score: 0.0,
                category_scores,
                red_flags: Vec::new(),
                confidence_level: 0.0,
                tier_classification: "Tier 4: Basic Operators".to_string(),
            };
        }

        let mut category_scores = BTreeMap::new();
        let mut positive_total = 0.0f32;

        for category in self.rules.categories_for(tier) {
            let score = self.score_category(&text, category);
            positive_total += score;
            category_scores.insert(category.name.clone(), score);
        }

        let (red_flags, penalty_total) = self.detect_red_flags(&text);

        let overall_score = (positive_total - penalty_total).clamp(0.0, 100.0);
        let tier_classification = classify(overall_score).to_string();

        let confidence_level = self.rules.extraction_confidence;

        tracing::debug!(
            tier = tier.as_str(),
            overall_score,
            penalty_total,
            red_flags = red_flags.len(),
            classification = %tier_classification,
            "Scored evidence"
        );

        ScoreResult {
            overall_score,
            category_scores,
            red_flags,
            confidence_level,
            tier_classification,
        }
    }

    /// Accumulate weights for every matched keyword, saturating at the
    /// category cap.
    fn score_category(&self, text: &str, category: &CategoryRule) -> f32 {
        let mut accumulated = 0.0f32;

        for keyword in &category.keywords {
            let keyword = keyword.to_lowercase();
            let Some(pos) = text.find(&keyword) else {
                continue;
            };

            let strength = self.match_strength(text, pos, keyword.len());
            accumulated += match strength {
                MatchStrength::High => category.weights.high,
                MatchStrength::Medium => category.weights.medium,
                MatchStrength::Low => category.weights.low,
            };
        }

        accumulated.min(category.max_points)
    }

    /// Inspect a symmetric window around the first occurrence for strength
    /// markers.
    fn match_strength(&self, text: &str, pos: usize, keyword_len: usize) -> MatchStrength {
        let window = context_window(text, pos, keyword_len, self.rules.window_chars);

        if self.rules.high_markers.iter().any(|m| window.contains(m.as_str())) {
            MatchStrength::High
        } else if self
            .rules
            .medium_markers
            .iter()
            .any(|m| window.contains(m.as_str()))
        {
            MatchStrength::Medium
        } else {
            MatchStrength::Low
        }
    }

    /// Each red-flag category contributes its penalty once, no matter how
    /// many of its keywords match. The recorded flag names the first hit.
    fn detect_red_flags(&self, text: &str) -> (Vec<String>, f32) {
        let mut flags = Vec::new();
        let mut penalty_total = 0.0f32;

        for rule in &self.rules.red_flags {
            if let Some(keyword) = rule
                .keywords
                .iter()
                .find(|k| text.contains(k.to_lowercase().as_str()))
            {
                flags.push(format!("{}: {}", rule.category, keyword));
                penalty_total += rule.penalty;
            }
        }

        (flags, penalty_total)
    }
}

/// Fixed threshold ladder. The 20–40 band falling through to Tier 4 is
/// long-standing behavior; keep the branch order exactly as-is.
pub fn classify(overall_score: f32) -> &'static str {
    if overall_score >= 80.0 {
        "Tier 1: Conservation Leaders"
    } else if overall_score >= 60.0 {
        "Tier 2: Committed Operators"
    } else if overall_score >= 40.0 {
        "Tier 3: Emerging Operators"
    } else if overall_score < 20.0 {
        "Tier 5: Problematic Operators"
    } else {
        "Tier 4: Basic Operators"
    }
}

/// Slice a ±`radius`-char window around a byte-indexed match, snapping to
/// char boundaries so multi-byte text cannot panic.
fn context_window(text: &str, pos: usize, match_len: usize, radius: usize) -> &str {
    let mut start = pos.saturating_sub(radius);
    let mut end = (pos + match_len + radius).min(text.len());

    while start > 0 && !text.is_char_boundary(start) {
        start -= 1;
    }
    while end < text.len() && !text.is_char_boundary(end) {
        end += 1;
    }

    &text[start..end]
}
