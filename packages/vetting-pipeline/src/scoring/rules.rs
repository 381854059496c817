use serde::{Deserialize, Serialize};

use crate::types::Tier;

/// Points awarded per matched keyword, by evidence strength.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StrengthWeights {
    pub high: f32,
    pub medium: f32,
    pub low: f32,
}

impl Default for StrengthWeights {
    fn default() -> Self {
        Self {
            high: 8.0,
            medium: 5.0,
            low: 2.0,
        }
    }
}

/// One scoring category: keywords, a saturating point cap, and weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub keywords: Vec<String>,
    pub max_points: f32,
    pub weights: StrengthWeights,
}

impl CategoryRule {
    pub fn new(name: &str, max_points: f32, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            max_points,
            weights: StrengthWeights::default(),
        }
    }
}

/// A red-flag category. Any keyword match contributes the penalty once
/// per category, independent of positive scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedFlagRule {
    pub category: String,
    pub keywords: Vec<String>,
    pub penalty: f32,
}

impl RedFlagRule {
    pub fn new(category: &str, penalty: f32, keywords: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            penalty,
        }
    }
}

/// Immutable, versioned scoring configuration. Injected into the engine at
/// construction so rules are testable and swappable per tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRules {
    pub version: u32,
    pub tier1_categories: Vec<CategoryRule>,
    pub tier2_categories: Vec<CategoryRule>,
    /// Co-occurrence markers that upgrade a keyword match to high strength.
    pub high_markers: Vec<String>,
    /// Markers for medium strength; anything else is low.
    pub medium_markers: Vec<String>,
    pub red_flags: Vec<RedFlagRule>,
    /// Radius of the context window inspected around a keyword match.
    pub window_chars: usize,
    /// Confidence reported for evidence from the LLM-extraction path.
    pub extraction_confidence: f32,
}

impl ScoringRules {
    pub fn categories_for(&self, tier: Tier) -> &[CategoryRule] {
        match tier {
            Tier::Tier1 => &self.tier1_categories,
            Tier::Tier2 => &self.tier2_categories,
        }
    }

    /// Version 1 of the ruleset. Category caps per tier sum to 100.
    pub fn v1() -> Self {
        Self {
            version: 1,
            tier1_categories: vec![
                CategoryRule::new(
                    "certifications",
                    15.0,
                    &[
                        "b-corporation",
                        "b corp",
                        "gstc",
                        "global sustainable tourism",
                        "rainforest alliance",
                        "green globe",
                        "earthcheck",
                        "travelife",
                        "fair trade",
                    ],
                ),
                CategoryRule::new(
                    "conservation_partnerships",
                    20.0,
                    &[
                        "wwf",
                        "world wildlife fund",
                        "conservation international",
                        "nature conservancy",
                        "iucn",
                        "wildlife trust",
                        "research station",
                        "conservation partner",
                    ],
                ),
                CategoryRule::new(
                    "wildlife_policy",
                    20.0,
                    &[
                        "animal welfare policy",
                        "no captive wildlife",
                        "viewing distance",
                        "responsible wildlife",
                        "ethical wildlife",
                        "no-touch policy",
                    ],
                ),
                CategoryRule::new(
                    "habitat_protection",
                    15.0,
                    &[
                        "habitat restoration",
                        "reforestation",
                        "marine protected",
                        "protected area",
                        "anti-poaching",
                        "wildlife corridor",
                    ],
                ),
                CategoryRule::new(
                    "community_benefit",
                    15.0,
                    &[
                        "local employment",
                        "community fund",
                        "revenue sharing",
                        "indigenous",
                        "community-owned",
                    ],
                ),
                CategoryRule::new(
                    "transparency_reporting",
                    15.0,
                    &[
                        "impact report",
                        "annual report",
                        "sustainability report",
                        "carbon offset",
                        "audited",
                        "third-party",
                    ],
                ),
            ],
            tier2_categories: vec![
                CategoryRule::new(
                    "community_ownership",
                    25.0,
                    &[
                        "community-owned",
                        "locally owned",
                        "cooperative",
                        "family-run",
                        "village-based",
                    ],
                ),
                CategoryRule::new(
                    "local_employment",
                    20.0,
                    &[
                        "local guides",
                        "local staff",
                        "hires locally",
                        "local employment",
                        "trained locally",
                    ],
                ),
                CategoryRule::new(
                    "conservation_activity",
                    20.0,
                    &[
                        "tree planting",
                        "beach cleanup",
                        "wildlife monitoring",
                        "citizen science",
                        "habitat restoration",
                        "species survey",
                    ],
                ),
                CategoryRule::new(
                    "cultural_preservation",
                    15.0,
                    &[
                        "cultural heritage",
                        "traditional knowledge",
                        "indigenous",
                        "local artisans",
                        "language preservation",
                    ],
                ),
                CategoryRule::new(
                    "environmental_practices",
                    20.0,
                    &[
                        "solar power",
                        "composting",
                        "plastic-free",
                        "rainwater",
                        "low impact",
                        "leave no trace",
                    ],
                ),
            ],
            high_markers: vec![
                "certified".to_string(),
                "verified".to_string(),
                "official".to_string(),
                "partnership".to_string(),
            ],
            medium_markers: vec![
                "program".to_string(),
                "initiative".to_string(),
                "project".to_string(),
            ],
            red_flags: vec![
                RedFlagRule::new(
                    "animal_exploitation",
                    20.0,
                    &[
                        "elephant ride",
                        "elephant riding",
                        "tiger selfie",
                        "dolphin show",
                        "cub petting",
                        "walking with lions",
                    ],
                ),
                RedFlagRule::new(
                    "wildlife_trade",
                    25.0,
                    &["ivory", "trophy hunting", "exotic pets", "animal souvenirs"],
                ),
                RedFlagRule::new(
                    "greenwashing",
                    10.0,
                    &["100% eco", "zero impact", "completely sustainable", "guilt-free"],
                ),
                RedFlagRule::new("community_harm", 15.0, &["orphanage tour", "slum tour"]),
            ],
            window_chars: 100,
            extraction_confidence: 0.85,
        }
    }
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self::v1()
    }
}
