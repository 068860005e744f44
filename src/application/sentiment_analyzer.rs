//! Lexicon-based sentiment scoring for financial text.
//!
//! Three fixed lexicons cover weighted bullish terms, weighted bearish
//! terms, and unweighted neutral terms, mixing single tokens with
//! multi-word phrases. Scoring is a straight average of matched weights:
//! phrases are found by case-insensitive substring scan, tokens by
//! comparing each whitespace-split word with non-letters stripped.

use crate::domain::sentiment::SentimentResult;
use chrono::Utc;

/// Weighted bullish vocabulary. Phrases (entries containing a space) are
/// matched by substring; the rest match whole tokens.
const BULLISH_TERMS: &[(&str, f64)] = &[
    ("all-time high", 0.9),
    ("record high", 0.85),
    ("bull run", 0.85),
    ("strong breakout", 0.85),
    ("golden cross", 0.8),
    ("short squeeze", 0.7),
    ("higher high", 0.6),
    ("skyrocket", 0.95),
    ("skyrockets", 0.95),
    ("mooning", 0.9),
    ("moon", 0.85),
    ("soar", 0.8),
    ("soars", 0.8),
    ("bullish", 0.8),
    ("surge", 0.7),
    ("surges", 0.7),
    ("breakout", 0.7),
    ("breakthrough", 0.7),
    ("rally", 0.65),
    ("rallies", 0.65),
    ("accelerating", 0.65),
    ("adoption", 0.6),
    ("institutional", 0.6),
    ("outperform", 0.6),
    ("undervalued", 0.6),
    ("accumulation", 0.5),
    ("upgrade", 0.5),
    ("pump", 0.5),
    ("strong", 0.5),
    ("gain", 0.5),
    ("gains", 0.5),
    ("winning", 0.5),
    ("growth", 0.45),
    ("partnership", 0.4),
    ("profit", 0.4),
    ("opportunity", 0.35),
    ("support", 0.3),
];

/// Weighted bearish vocabulary, negative weights.
const BEARISH_TERMS: &[(&str, f64)] = &[
    ("collapse", -0.95),
    ("collapses", -0.95),
    ("rug pull", -0.9),
    ("crash", -0.9),
    ("crashes", -0.9),
    ("scam", -0.9),
    ("fraud", -0.85),
    ("all-time low", -0.85),
    ("death cross", -0.8),
    ("plunge", -0.8),
    ("plunges", -0.8),
    ("hack", -0.8),
    ("hacked", -0.8),
    ("bearish", -0.8),
    ("capitulation", -0.8),
    ("bear market", -0.75),
    ("stolen", -0.75),
    ("dump", -0.7),
    ("dumps", -0.7),
    ("panic", -0.7),
    ("liquidation", -0.7),
    ("liquidations", -0.7),
    ("sell-off", -0.65),
    ("selloff", -0.65),
    ("lawsuit", -0.6),
    ("ban", -0.6),
    ("breach", -0.6),
    ("manipulation", -0.6),
    ("lower low", -0.6),
    ("recession", -0.6),
    ("downturn", -0.6),
    ("overvalued", -0.55),
    ("fear", -0.5),
    ("losses", -0.5),
    ("weak", -0.45),
    ("resistance", -0.3),
];

/// Unweighted neutral vocabulary: matches count toward confidence and
/// dilute the score without moving it.
const NEUTRAL_TERMS: &[&str] = &[
    "sideways trading",
    "consolidation",
    "consolidating",
    "sideways",
    "stable",
    "unchanged",
    "steady",
    "flat",
    "ranging",
    "holding",
    "hold",
    "mixed",
];

/// Matches needed for full confidence.
const CONFIDENCE_SATURATION: f64 = 5.0;
/// Weight floor so zero-confidence texts still participate in the
/// multi-text average.
const FLOOR_WEIGHT: f64 = 0.1;
const EXCERPT_LIMIT: usize = 120;

#[derive(Debug, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Scores one text. Empty or matchless input yields the neutral
    /// zero-confidence result; otherwise score = sum / matches clamped to
    /// [-1, 1] and confidence = min(1, matches / 5).
    pub fn analyze_text(&self, text: &str) -> SentimentResult {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return SentimentResult::neutral();
        }
        let lower = trimmed.to_lowercase();

        let mut sum = 0.0;
        let mut matches = 0usize;
        let mut bullish: Vec<&'static str> = Vec::new();
        let mut bearish: Vec<&'static str> = Vec::new();
        let mut neutral: Vec<&'static str> = Vec::new();

        for &(term, weight) in BULLISH_TERMS.iter().filter(|(t, _)| t.contains(' ')) {
            if lower.contains(term) {
                sum += weight;
                matches += 1;
                push_unique(&mut bullish, term);
            }
        }
        for &(term, weight) in BEARISH_TERMS.iter().filter(|(t, _)| t.contains(' ')) {
            if lower.contains(term) {
                sum += weight;
                matches += 1;
                push_unique(&mut bearish, term);
            }
        }
        for &term in NEUTRAL_TERMS.iter().filter(|t| t.contains(' ')) {
            if lower.contains(term) {
                matches += 1;
                push_unique(&mut neutral, term);
            }
        }

        for raw in lower.split_whitespace() {
            let token: String = raw.chars().filter(|c| c.is_alphabetic()).collect();
            if token.is_empty() {
                continue;
            }
            if let Some(&(term, weight)) = BULLISH_TERMS
                .iter()
                .find(|(t, _)| !t.contains(' ') && *t == token)
            {
                sum += weight;
                matches += 1;
                push_unique(&mut bullish, term);
            } else if let Some(&(term, weight)) = BEARISH_TERMS
                .iter()
                .find(|(t, _)| !t.contains(' ') && *t == token)
            {
                sum += weight;
                matches += 1;
                push_unique(&mut bearish, term);
            } else if let Some(&term) = NEUTRAL_TERMS
                .iter()
                .find(|t| !t.contains(' ') && **t == token)
            {
                matches += 1;
                push_unique(&mut neutral, term);
            }
        }

        if matches == 0 {
            return SentimentResult::neutral();
        }

        SentimentResult {
            score: (sum / matches as f64).clamp(-1.0, 1.0),
            confidence: (matches as f64 / CONFIDENCE_SATURATION).min(1.0),
            bullish_keywords: bullish.into_iter().map(String::from).collect(),
            bearish_keywords: bearish.into_iter().map(String::from).collect(),
            neutral_keywords: neutral.into_iter().map(String::from).collect(),
            excerpts: vec![excerpt(trimmed)],
            timestamp: Utc::now(),
        }
    }

    /// Confidence-weighted average over several texts. Zero-confidence
    /// texts get a floor weight of 0.1 so they are never fully excluded;
    /// keyword sets and excerpts are unioned without duplicates.
    pub fn analyze_texts<S: AsRef<str>>(&self, texts: &[S]) -> SentimentResult {
        if texts.is_empty() {
            return SentimentResult::neutral();
        }

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        let mut confidence_sum = 0.0;
        let mut bullish: Vec<String> = Vec::new();
        let mut bearish: Vec<String> = Vec::new();
        let mut neutral: Vec<String> = Vec::new();
        let mut excerpts: Vec<String> = Vec::new();

        for text in texts {
            let result = self.analyze_text(text.as_ref());
            let weight = result.confidence.max(FLOOR_WEIGHT);
            weighted_sum += result.score * weight;
            weight_total += weight;
            confidence_sum += result.confidence;
            merge_unique(&mut bullish, result.bullish_keywords);
            merge_unique(&mut bearish, result.bearish_keywords);
            merge_unique(&mut neutral, result.neutral_keywords);
            merge_unique(&mut excerpts, result.excerpts);
        }

        SentimentResult {
            score: (weighted_sum / weight_total).clamp(-1.0, 1.0),
            confidence: (confidence_sum / texts.len() as f64).min(1.0),
            bullish_keywords: bullish,
            bearish_keywords: bearish,
            neutral_keywords: neutral,
            excerpts,
            timestamp: Utc::now(),
        }
    }
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_LIMIT {
        text.to_string()
    } else {
        let cut: String = text.chars().take(EXCERPT_LIMIT).collect();
        format!("{cut}…")
    }
}

fn push_unique(list: &mut Vec<&'static str>, term: &'static str) {
    if !list.contains(&term) {
        list.push(term);
    }
}

fn merge_unique(target: &mut Vec<String>, source: Vec<String>) {
    for item in source {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}
