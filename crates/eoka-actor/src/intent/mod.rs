//! Intent resolution: from a user request to something actionable.
//!
//! Two paths, tried in order:
//!
//! 1. **Structured.** Score every intent of an [`IntentCatalog`] by keyword
//!    overlap with the request. A match of at least medium confidence yields
//!    a [`StructuredIntent`] with extracted field values and a
//!    [`Validation`].
//! 2. **Heuristic.** Pick an action verb by keyword family and pull the
//!    target (and for typing, the literal text) out of the phrase. Yields a
//!    [`Command`].
//!
//! Field extraction looks for `<field>: value` or `<field> value` and takes a
//! single whitespace-delimited token, so multi-word values such as full
//! names are cut after the first word.

mod catalog;
mod heuristic;

pub use catalog::{ActionDef, Category, FieldDef, FieldType, IntentCatalog, IntentDef};
pub use heuristic::SCROLL_STEP;

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::debug;

use crate::action::ActionKind;

/// Score a structured intent needs for high confidence.
pub const STRUCTURED_HIGH: u32 = 50;
/// Score a structured intent needs for medium confidence.
pub const STRUCTURED_MEDIUM: u32 = 30;

const NAME_KEYWORD_WEIGHT: u32 = 30;
const FIELD_NAME_WEIGHT: u32 = 20;
const CONTENT_WORD_WEIGHT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Band a score: `>= high` is high, `>= medium` is medium.
    pub fn band(score: u32, high: u32, medium: u32) -> Self {
        if score >= high {
            Self::High
        } else if score >= medium {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of interpreting one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Structured(StructuredIntent),
    NaturalLanguage(Command),
    NoMatch { suggestion: String },
}

impl Resolution {
    pub fn as_command(&self) -> Option<&Command> {
        match self {
            Self::NaturalLanguage(cmd) => Some(cmd),
            _ => None,
        }
    }

    pub fn as_structured(&self) -> Option<&StructuredIntent> {
        match self {
            Self::Structured(s) => Some(s),
            _ => None,
        }
    }
}

/// A request matched against the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredIntent {
    pub category: String,
    pub intent: String,
    /// Catalog action that best fits the request.
    pub action: Option<String>,
    /// Extracted field values by field name.
    pub fields: BTreeMap<String, String>,
    pub validation: Validation,
    pub score: u32,
    pub confidence: Confidence,
}

/// Field problems of a structured match. Reported, never raised.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub missing_fields: Vec<String>,
    pub type_mismatches: Vec<TypeMismatch>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.missing_fields.is_empty() && self.type_mismatches.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeMismatch {
    pub field: String,
    pub expected: FieldType,
    pub value: String,
}

/// An action verb with its target, parsed from free text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub action: ActionKind,
    /// Normalized description of the element to act on.
    pub target: Option<String>,
    /// Literal text, for typing.
    pub text: Option<String>,
    /// Vertical pixels, for relative scrolling.
    pub delta: Option<f64>,
    pub confidence: Confidence,
}

impl Command {
    pub fn new(action: ActionKind, confidence: Confidence) -> Self {
        Self {
            action,
            target: None,
            text: None,
            delta: None,
            confidence,
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn maybe_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Resolve a user request, optionally limited to one catalog category.
pub fn resolve(catalog: &IntentCatalog, request: &str, category: Option<&str>) -> Resolution {
    let request = request.trim();
    if request.is_empty() {
        return Resolution::NoMatch {
            suggestion: "Describe what to do, e.g. \"click the submit button\"".into(),
        };
    }

    if let Some(found) = match_structured(catalog, request, category) {
        if found.confidence > Confidence::Low {
            debug!(
                intent = %found.intent,
                score = found.score,
                confidence = %found.confidence,
                "structured intent"
            );
            return Resolution::Structured(found);
        }
        debug!(intent = %found.intent, score = found.score, "structured match too weak");
    }

    match heuristic::parse(request) {
        Some(cmd) => {
            debug!(action = %cmd.action, target = ?cmd.target, "heuristic intent");
            Resolution::NaturalLanguage(cmd)
        }
        None => Resolution::NoMatch {
            suggestion: "Name the element to act on, e.g. \"click the login button\"".into(),
        },
    }
}

/// Lower-case alphanumeric tokens.
fn tokens(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn content_words(s: &str) -> HashSet<String> {
    tokens(s).filter(|w| w.chars().count() > 3).collect()
}

fn match_structured(
    catalog: &IntentCatalog,
    request: &str,
    category: Option<&str>,
) -> Option<StructuredIntent> {
    let lower = request.to_lowercase();
    let request_tokens: HashSet<String> = tokens(request).collect();
    let request_words = content_words(request);

    let mut best: Option<(u32, &Category, &IntentDef)> = None;
    for (cat, intent) in catalog.intents() {
        if category.is_some_and(|c| !cat.name.eq_ignore_ascii_case(c)) {
            continue;
        }
        let score = score_intent(intent, &lower, &request_tokens, &request_words);
        if best.map_or(true, |(s, _, _)| score > s) {
            best = Some((score, cat, intent));
        }
    }

    let (score, cat, intent) = best?;
    let fields = extract_fields(intent, request);
    let validation = validate_fields(intent, &fields);
    Some(StructuredIntent {
        category: cat.name.clone(),
        intent: intent.name.clone(),
        action: pick_action(intent, &request_words),
        fields,
        validation,
        score,
        confidence: Confidence::band(score, STRUCTURED_HIGH, STRUCTURED_MEDIUM),
    })
}

fn score_intent(
    intent: &IntentDef,
    lower: &str,
    request_tokens: &HashSet<String>,
    request_words: &HashSet<String>,
) -> u32 {
    let keywords: HashSet<String> = tokens(&intent.name).collect();
    let name_hits = keywords.iter().filter(|k| request_tokens.contains(*k)).count() as u32;

    let field_hits = intent
        .fields
        .iter()
        .filter(|f| lower.contains(&f.name.to_lowercase()))
        .count() as u32;

    let described: HashSet<String> = intent
        .actions
        .iter()
        .flat_map(|a| content_words(&a.description))
        .collect();
    let shared = request_words.intersection(&described).count() as u32;

    name_hits * NAME_KEYWORD_WEIGHT + field_hits * FIELD_NAME_WEIGHT + shared * CONTENT_WORD_WEIGHT
}

fn pick_action(intent: &IntentDef, request_words: &HashSet<String>) -> Option<String> {
    let mut best: Option<(usize, &ActionDef)> = None;
    for action in &intent.actions {
        let shared = content_words(&action.description)
            .intersection(request_words)
            .count();
        if best.map_or(true, |(s, _)| shared > s) {
            best = Some((shared, action));
        }
    }
    best.map(|(_, a)| a.name.clone())
}

fn extract_fields(intent: &IntentDef, request: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for field in &intent.fields {
        let pattern = format!(r"(?i)\b{}[:\s]\s*(\S+)", regex::escape(&field.name));
        let Ok(re) = Regex::new(&pattern) else {
            debug!(field = %field.name, "unusable field name");
            continue;
        };
        if let Some(value) = re.captures(request).and_then(|c| c.get(1)) {
            let value = value.as_str().trim_end_matches([',', ';']);
            if !value.is_empty() {
                out.insert(field.name.clone(), value.to_string());
            }
        }
    }
    out
}

fn validate_fields(intent: &IntentDef, values: &BTreeMap<String, String>) -> Validation {
    let mut validation = Validation::default();
    for field in &intent.fields {
        match values.get(&field.name) {
            None if field.required => validation.missing_fields.push(field.name.clone()),
            None => {}
            Some(v) if !field.kind.accepts(v) => validation.type_mismatches.push(TypeMismatch {
                field: field.name.clone(),
                expected: field.kind,
                value: v.clone(),
            }),
            Some(_) => {}
        }
    }
    validation
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> IntentCatalog {
        IntentCatalog::builtin().unwrap()
    }

    #[test]
    fn confidence_bands() {
        assert_eq!(Confidence::band(50, 50, 30), Confidence::High);
        assert_eq!(Confidence::band(49, 50, 30), Confidence::Medium);
        assert_eq!(Confidence::band(30, 50, 30), Confidence::Medium);
        assert_eq!(Confidence::band(29, 50, 30), Confidence::Low);
    }

    #[test]
    fn structured_match_extracts_fields() {
        let r = resolve(
            &builtin(),
            "Put me on the newsletter, email: jane@example.org",
            None,
        );
        let s = r.as_structured().expect("structured");
        assert_eq!(s.intent, "newsletter_signup");
        assert_eq!(s.category, "newsletter");
        // newsletter (+30) and the email field (+20)
        assert_eq!(s.score, 50);
        assert_eq!(s.confidence, Confidence::High);
        assert_eq!(s.fields.get("email").map(String::as_str), Some("jane@example.org"));
        assert!(s.validation.is_valid());
        assert_eq!(s.action.as_deref(), Some("subscribe"));
    }

    #[test]
    fn missing_and_mistyped_fields_are_reported() {
        let r = resolve(&builtin(), "newsletter signup please", None);
        let s = r.as_structured().expect("structured");
        assert_eq!(s.validation.missing_fields, ["email"]);

        let r = resolve(&builtin(), "newsletter signup with email: nope", None);
        let s = r.as_structured().expect("structured");
        assert!(s.validation.missing_fields.is_empty());
        assert_eq!(s.validation.type_mismatches.len(), 1);
        assert_eq!(s.validation.type_mismatches[0].field, "email");
        assert_eq!(s.validation.type_mismatches[0].expected, FieldType::Email);
    }

    #[test]
    fn field_values_are_single_tokens() {
        let catalog = IntentCatalog::from_yaml(
            r#"
categories:
  - name: people
    intents:
      - name: add_contact
        fields:
          - { name: fullname, required: true }
"#,
        )
        .unwrap();
        let r = resolve(&catalog, "add contact fullname: Jane Doe", None);
        let s = r.as_structured().expect("structured");
        assert_eq!(s.fields.get("fullname").map(String::as_str), Some("Jane"));
    }

    #[test]
    fn category_hint_limits_the_search() {
        let r = resolve(
            &builtin(),
            "Put me on the newsletter, email: jane@example.org",
            Some("support"),
        );
        assert!(r.as_structured().is_none());
    }

    #[test]
    fn weak_structured_match_falls_through() {
        // Only the email field name hits (+20): low, so the heuristic path answers.
        let r = resolve(&builtin(), "type john@example.com into the email field", None);
        let cmd = r.as_command().expect("heuristic");
        assert_eq!(cmd.action, ActionKind::Type);
        assert_eq!(cmd.text.as_deref(), Some("john@example.com"));
        assert_eq!(cmd.target.as_deref(), Some("email"));
    }

    #[test]
    fn click_submit_resolves_heuristically() {
        let r = resolve(&builtin(), "click the submit button", None);
        let cmd = r.as_command().expect("heuristic");
        assert_eq!(cmd.action, ActionKind::Click);
        assert_eq!(cmd.target.as_deref(), Some("submit"));
    }

    #[test]
    fn empty_request_is_no_match() {
        assert!(matches!(
            resolve(&builtin(), "   ", None),
            Resolution::NoMatch { .. }
        ));
        assert!(matches!(
            resolve(&IntentCatalog::default(), "the", None),
            Resolution::NoMatch { .. }
        ));
    }
}
