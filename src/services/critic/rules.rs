//! Rule-based quality checks, one per dimension.
//!
//! Phrase matching is case-insensitive substring matching. Lengths are
//! counted in characters of the trimmed instruction.

use crate::domain::models::{
    CritiqueRules, DimensionAssessment, QualityDimension, Recommendation,
};

/// End offset of a case-insensitive match of `needle` (already lowercased)
/// starting at byte `start` of `text`. Offsets are always char boundaries of
/// `text`, whatever lowercasing does to byte widths.
pub fn match_ignore_case_at(text: &str, start: usize, needle: &str) -> Option<usize> {
    let mut expected = needle.chars().peekable();
    expected.peek()?;
    for (offset, c) in text[start..].char_indices() {
        for lower in c.to_lowercase() {
            if expected.next() != Some(lower) {
                return None;
            }
        }
        if expected.peek().is_none() {
            return Some(start + offset + c.len_utf8());
        }
    }
    None
}

/// Byte range of the first case-insensitive match of `needle` at or after
/// `from`.
pub fn find_ignore_case(text: &str, needle: &str, from: usize) -> Option<(usize, usize)> {
    text[from..]
        .char_indices()
        .map(|(offset, _)| from + offset)
        .find_map(|start| match_ignore_case_at(text, start, needle).map(|end| (start, end)))
}

/// First phrase from `phrases` found in `text`, ignoring case.
pub fn find_phrase<'a>(text: &str, phrases: &'a [String]) -> Option<&'a str> {
    phrases
        .iter()
        .map(String::as_str)
        .find(|p| !p.is_empty() && find_ignore_case(text, &p.to_lowercase(), 0).is_some())
}

/// Whether `scope` is blank or one of the configured generic scopes.
pub fn is_generic_scope(scope: &str, rules: &CritiqueRules) -> bool {
    let scope = scope.trim().to_lowercase();
    scope.is_empty() || rules.generic_scopes.iter().any(|g| g.to_lowercase() == scope)
}

pub fn instruction_length(recommendation: &Recommendation) -> usize {
    recommendation.instruction.trim().chars().count()
}

/// Run the rule for one dimension.
pub fn check(
    dimension: QualityDimension,
    recommendation: &Recommendation,
    rules: &CritiqueRules,
) -> DimensionAssessment {
    match dimension {
        QualityDimension::Actionable => check_actionable(recommendation, rules),
        QualityDimension::FixesIssue => check_fixes_issue(recommendation),
        QualityDimension::Specific => check_specific(recommendation, rules),
        QualityDimension::SideEffects => check_side_effects(recommendation, rules),
    }
}

fn check_actionable(recommendation: &Recommendation, rules: &CritiqueRules) -> DimensionAssessment {
    match find_phrase(&recommendation.instruction, &rules.banned_phrases) {
        Some(phrase) => DimensionAssessment::fail(format!("vague phrase '{phrase}'")),
        None => DimensionAssessment::pass("instruction is direct"),
    }
}

fn check_fixes_issue(recommendation: &Recommendation) -> DimensionAssessment {
    if !recommendation.has_rationale() {
        return DimensionAssessment::fail("no rationale");
    }
    if let (Some(original), Some(proposed)) = (
        recommendation.original_content.as_deref(),
        recommendation.proposed_content.as_deref(),
    ) {
        if original.trim() == proposed.trim() {
            return DimensionAssessment::fail("proposed content is identical to the original");
        }
    }
    DimensionAssessment::pass("rationale given")
}

fn check_specific(recommendation: &Recommendation, rules: &CritiqueRules) -> DimensionAssessment {
    let len = instruction_length(recommendation);
    if len < rules.min_instruction_length {
        return DimensionAssessment::fail(format!(
            "instruction too short ({len} < {})",
            rules.min_instruction_length
        ));
    }
    if len > rules.max_instruction_length {
        return DimensionAssessment::fail(format!(
            "instruction too long ({len} > {})",
            rules.max_instruction_length
        ));
    }
    if is_generic_scope(&recommendation.scope, rules) {
        return DimensionAssessment::fail(format!(
            "scope '{}' is too broad",
            recommendation.scope.trim()
        ));
    }
    DimensionAssessment::pass("instruction and scope are specific")
}

fn check_side_effects(
    recommendation: &Recommendation,
    rules: &CritiqueRules,
) -> DimensionAssessment {
    if let Some(phrase) = find_phrase(&recommendation.instruction, &rules.risky_phrases) {
        return DimensionAssessment::fail(format!("risky phrase '{phrase}'"));
    }
    let original_present = recommendation
        .original_content
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty());
    let proposed_empty = recommendation
        .proposed_content
        .as_deref()
        .is_some_and(|c| c.trim().is_empty());
    if original_present && proposed_empty {
        return DimensionAssessment::fail("removes existing content entirely");
    }
    DimensionAssessment::pass("change is contained")
}
