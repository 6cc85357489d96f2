//! Rule-based refinement.
//!
//! Rewrites only the parts of a recommendation behind its failing
//! dimensions. Problems that cannot be fixed mechanically (a generic scope,
//! identical original and proposed content) are left for the next critique to
//! report again.

use crate::domain::models::{
    CritiqueResult, CritiqueRules, QualityDimension, Recommendation,
};

use super::rules::{find_ignore_case, find_phrase, instruction_length};

/// Replacement for a known vague phrase. Unknown phrases are dropped.
fn direct_form(phrase: &str) -> &'static str {
    match phrase {
        "review and fix" | "look into" => "fix",
        "make sure" => "ensure",
        "check if" | "double-check" => "verify that",
        _ => "",
    }
}

/// Replace every occurrence of `phrase` (any case) in `text`.
fn replace_ignore_case(text: &str, phrase: &str, replacement: &str) -> String {
    let needle = phrase.to_lowercase();
    if needle.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = 0;
    while let Some((start, end)) = find_ignore_case(text, &needle, rest) {
        out.push_str(&text[rest..start]);
        out.push_str(replacement);
        rest = end;
    }
    out.push_str(&text[rest..]);
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Cut `text` to at most `max` characters, preferring a word boundary.
fn truncate_at_word(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => cut[..pos].trim_end().to_string(),
        _ => cut,
    }
}

fn strip_vague_phrases(instruction: &str, rules: &CritiqueRules) -> String {
    let mut text = instruction.to_string();
    // Bounded: each pass removes at least one configured phrase.
    for _ in 0..rules.banned_phrases.len() {
        let Some(phrase) = find_phrase(&text, &rules.banned_phrases) else {
            break;
        };
        text = replace_ignore_case(&text, phrase, direct_form(&phrase.to_lowercase()));
    }
    capitalize(collapse_whitespace(&text).trim_matches(|c: char| c == ',' || c.is_whitespace()))
}

fn limit_risky_changes(instruction: &str, rules: &CritiqueRules) -> String {
    let mut text = instruction.to_string();
    for _ in 0..rules.risky_phrases.len() {
        let Some(phrase) = find_phrase(&text, &rules.risky_phrases) else {
            break;
        };
        let verb = phrase.split_whitespace().next().unwrap_or("change");
        text = replace_ignore_case(&text, phrase, &format!("{verb} only the affected"));
    }
    capitalize(&text)
}

fn anchor_to_scope(instruction: &str, recommendation: &Recommendation) -> String {
    let scope = recommendation.scope.trim();
    let mut text = instruction.trim_end_matches('.').to_string();
    if !scope.is_empty() && !text.to_lowercase().contains(&scope.to_lowercase()) {
        text = format!("{text} in {scope}");
    }
    if let Some(proposed) = recommendation
        .proposed_content
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        if !text.contains(proposed) {
            text = format!("{text}, changing it to \"{proposed}\"");
        }
    }
    text
}

fn derive_rationale(recommendation: &Recommendation) -> Option<String> {
    match (
        recommendation.issue_category.as_deref(),
        recommendation.issue_message.as_deref(),
    ) {
        (Some(category), Some(message)) => Some(format!("Resolves {category} issue: {message}")),
        (None, Some(message)) => Some(format!("Resolves reported issue: {message}")),
        _ => None,
    }
}

/// Produce a refined copy of `recommendation` addressing the dimensions
/// `critique` failed. The revision counter is incremented.
pub fn refine_with_rules(
    recommendation: &Recommendation,
    critique: &CritiqueResult,
    rules: &CritiqueRules,
) -> Recommendation {
    let failed = critique.failed_dimensions();
    let mut refined = recommendation.clone();
    let mut instruction = refined.instruction.trim().to_string();

    if failed.contains(&QualityDimension::Actionable) {
        instruction = strip_vague_phrases(&instruction, rules);
    }

    if failed.contains(&QualityDimension::SideEffects) {
        instruction = limit_risky_changes(&instruction, rules);
    }

    if failed.contains(&QualityDimension::FixesIssue) && !refined.has_rationale() {
        refined.rationale = derive_rationale(&refined);
    }

    refined.instruction = instruction;
    if failed.contains(&QualityDimension::Specific) {
        if instruction_length(&refined) < rules.min_instruction_length {
            refined.instruction = anchor_to_scope(&refined.instruction, &refined);
        }
        if instruction_length(&refined) > rules.max_instruction_length {
            refined.instruction =
                truncate_at_word(refined.instruction.trim(), rules.max_instruction_length);
        }
    }

    refined.revision += 1;
    refined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CritiqueSource, DimensionAssessment, RecommendationSeverity};

    fn failing(dims: &[QualityDimension]) -> CritiqueResult {
        let assess = |d: QualityDimension| {
            if dims.contains(&d) {
                DimensionAssessment::fail("failed")
            } else {
                DimensionAssessment::pass("ok")
            }
        };
        CritiqueResult {
            actionable: assess(QualityDimension::Actionable),
            fixes_issue: assess(QualityDimension::FixesIssue),
            specific: assess(QualityDimension::Specific),
            side_effects: assess(QualityDimension::SideEffects),
            quality_score: 0.5,
            should_discard: false,
            needs_refinement: true,
            source: CritiqueSource::Rules,
        }
    }

    #[test]
    fn vague_phrase_becomes_direct_and_short_instruction_gets_scope() {
        let rec = Recommendation::new(
            "review and fix the heading",
            "## Installation",
            RecommendationSeverity::Medium,
        );
        let refined = refine_with_rules(
            &rec,
            &failing(&[QualityDimension::Actionable, QualityDimension::Specific]),
            &CritiqueRules::default(),
        );

        assert_eq!(refined.instruction, "Fix the heading in ## Installation");
        assert_eq!(refined.revision, 1);
    }

    #[test]
    fn rationale_is_derived_from_source_issue() {
        let rec = Recommendation::new("x", "y", RecommendationSeverity::Low)
            .with_issue("broken_link", "Link to /docs/old returns 404");
        let refined = refine_with_rules(
            &rec,
            &failing(&[QualityDimension::FixesIssue]),
            &CritiqueRules::default(),
        );
        assert_eq!(
            refined.rationale.as_deref(),
            Some("Resolves broken_link issue: Link to /docs/old returns 404")
        );
    }

    #[test]
    fn risky_change_is_limited() {
        let rec = Recommendation::new(
            "Remove all duplicate badges from the header",
            "README header",
            RecommendationSeverity::Low,
        );
        let refined = refine_with_rules(
            &rec,
            &failing(&[QualityDimension::SideEffects]),
            &CritiqueRules::default(),
        );
        assert_eq!(
            refined.instruction,
            "Remove only the affected duplicate badges from the header"
        );
    }

    #[test]
    fn long_instruction_is_cut_at_word_boundary() {
        let rules = CritiqueRules {
            max_instruction_length: 20,
            ..CritiqueRules::default()
        };
        let rec = Recommendation::new(
            "Rewrite this paragraph using active voice throughout",
            "## Intro",
            RecommendationSeverity::Low,
        );
        let refined = refine_with_rules(&rec, &failing(&[QualityDimension::Specific]), &rules);
        assert_eq!(refined.instruction, "Rewrite this");
    }

    #[test]
    fn mixed_case_replacement_keeps_surrounding_text() {
        assert_eq!(
            replace_ignore_case("Please Make Sure the link works", "make sure", "ensure"),
            "Please ensure the link works"
        );
    }

    #[test]
    fn replacement_tracks_offsets_across_width_changing_characters() {
        // 'Ⱥ' grows and 'K' (Kelvin) shrinks when lowercased.
        assert_eq!(
            replace_ignore_case("\u{23a}CONSIDER\u{e9}\u{212a}\u{23a} consider", "consider", ""),
            "\u{23a}\u{e9}\u{212a}\u{23a} "
        );
        assert_eq!(
            replace_ignore_case("\u{212a}eep \u{e9}t\u{e9}: Make Sure", "make sure", "ensure"),
            "\u{212a}eep \u{e9}t\u{e9}: ensure"
        );
        assert_eq!(replace_ignore_case("\u{212a}ey", "key", "k"), "k");
    }

    #[test]
    fn vague_phrase_is_stripped_from_non_ascii_instruction() {
        let rec = Recommendation::new(
            "\u{23a}consider\u{e9}\u{212a}\u{23a}",
            "## Caf\u{e9}",
            RecommendationSeverity::Low,
        );
        let refined = refine_with_rules(
            &rec,
            &failing(&[QualityDimension::Actionable]),
            &CritiqueRules::default(),
        );
        assert_eq!(refined.instruction, "\u{23a}\u{e9}\u{212a}\u{23a}");
    }
}
