//! Binding a target description to one affordance.
//!
//! A plain lexical scorer with fixed weights, so results are reproducible:
//!
//! | rule | points |
//! |---|---|
//! | name equals target (case-insensitive) | 100 |
//! | name contains target or target contains name | 80 |
//! | tag named by target | 60 |
//! | otherwise, per target token shared with name/tag | 20 |
//! | action fits the tag (only when already scoring) | +10 |

use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use crate::action::ActionKind;
use crate::affordance::Affordance;
use crate::intent::Confidence;

pub const EXACT_NAME_SCORE: u32 = 100;
pub const SUBSTRING_SCORE: u32 = 80;
pub const TAG_SCORE: u32 = 60;
pub const SHARED_TOKEN_SCORE: u32 = 20;
pub const ACTION_BONUS: u32 = 10;

pub const HIGH_CONFIDENCE: u32 = 80;
pub const MEDIUM_CONFIDENCE: u32 = 40;

/// The chosen affordance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectorMatch {
    pub name: Option<String>,
    pub tag: String,
    pub selector: String,
    #[serde(skip)]
    pub index: usize,
    #[serde(skip)]
    pub score: u32,
    #[serde(skip)]
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Match(SelectorMatch),
    NoMatch { suggestion: String },
}

impl MatchOutcome {
    pub fn best(&self) -> Option<&SelectorMatch> {
        match self {
            Self::Match(m) => Some(m),
            Self::NoMatch { .. } => None,
        }
    }
}

fn words(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Score one affordance against a target description.
pub fn score(target: &str, action: ActionKind, affordance: &Affordance) -> u32 {
    let target = target.trim().to_lowercase();
    if target.is_empty() {
        return 0;
    }
    let name = affordance
        .name
        .as_deref()
        .map(|n| n.trim().to_lowercase())
        .unwrap_or_default();
    let tag = affordance.tag.to_lowercase();
    let target_words = words(&target);

    let base = if !name.is_empty() && name == target {
        EXACT_NAME_SCORE
    } else if !name.is_empty() && (name.contains(&target) || target.contains(&name)) {
        SUBSTRING_SCORE
    } else if !tag.is_empty()
        && (target_words.contains(&tag) || (tag.len() >= 3 && target.contains(&tag)))
    {
        TAG_SCORE
    } else {
        let mut known = words(&name);
        known.insert(tag.clone());
        target_words.intersection(&known).count() as u32 * SHARED_TOKEN_SCORE
    };

    if base == 0 {
        return 0;
    }
    let fits = (action.is_click_like() && matches!(tag.as_str(), "button" | "a" | "input"))
        || (action.is_type_like() && matches!(tag.as_str(), "input" | "textarea"));
    if fits {
        base + ACTION_BONUS
    } else {
        base
    }
}

/// Best affordance for `target`. Ties go to the earliest in document order.
pub fn match_target(target: &str, action: ActionKind, affordances: &[Affordance]) -> MatchOutcome {
    let mut best: Option<(usize, u32)> = None;
    for (i, a) in affordances.iter().enumerate() {
        let s = score(target, action, a);
        if s > best.map_or(0, |(_, b)| b) {
            best = Some((i, s));
        }
    }

    let Some((index, score)) = best else {
        debug!(wanted = %target, candidates = affordances.len(), "no affordance matched");
        return MatchOutcome::NoMatch {
            suggestion: format!(
                "No element matches \"{}\". Be more specific, e.g. use the visible label of the element.",
                target.trim()
            ),
        };
    };

    let a = &affordances[index];
    let confidence = Confidence::band(score, HIGH_CONFIDENCE, MEDIUM_CONFIDENCE);
    debug!(wanted = %target, selector = %a.selector, score, %confidence, "matched affordance");
    MatchOutcome::Match(SelectorMatch {
        name: a.name.clone(),
        tag: a.tag.clone(),
        selector: a.selector.clone(),
        index,
        score,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aff(name: Option<&str>, tag: &str, selector: &str) -> Affordance {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "tag": tag,
            "selector": selector,
        }))
        .unwrap()
    }

    #[test]
    fn exact_name_is_high() {
        let list = [aff(Some("Submit"), "BUTTON", "[data-id=x1]")];
        let m = match_target("submit", ActionKind::Click, &list);
        let m = m.best().unwrap();
        assert_eq!(m.score, EXACT_NAME_SCORE + ACTION_BONUS);
        assert_eq!(m.confidence, Confidence::High);
        assert_eq!(m.selector, "[data-id=x1]");

        let m = match_target("Submit", ActionKind::ScrollToElement, &list);
        assert_eq!(m.best().unwrap().score, EXACT_NAME_SCORE);
    }

    #[test]
    fn weights() {
        let a = aff(Some("Email address"), "input", "#e");
        assert_eq!(score("email", ActionKind::WaitForElement, &a), SUBSTRING_SCORE);
        assert_eq!(score("your email address please", ActionKind::WaitForElement, &a), SUBSTRING_SCORE);
        assert_eq!(score("email", ActionKind::Type, &a), SUBSTRING_SCORE + ACTION_BONUS);

        let b = aff(None, "textarea", "#t");
        assert_eq!(score("comment textarea", ActionKind::Focus, &b), TAG_SCORE);
        assert_eq!(score("comment textarea", ActionKind::TypeFast, &b), TAG_SCORE + ACTION_BONUS);

        let c = aff(Some("Save draft now"), "div", "#s");
        assert_eq!(score("draft save", ActionKind::Click, &c), 2 * SHARED_TOKEN_SCORE);
        assert_eq!(score("nothing here", ActionKind::Click, &c), 0);
    }

    #[test]
    fn bonus_needs_a_base_score() {
        let a = aff(Some("Go"), "button", "#go");
        assert_eq!(score("unrelated", ActionKind::Click, &a), 0);
    }

    #[test]
    fn ties_go_to_first() {
        let list = [
            aff(Some("Next"), "button", "#first"),
            aff(Some("Next"), "button", "#second"),
        ];
        let m = match_target("next", ActionKind::Click, &list);
        assert_eq!(m.best().unwrap().selector, "#first");
        assert_eq!(m.best().unwrap().index, 0);
    }

    #[test]
    fn better_later_candidate_wins() {
        let list = [
            aff(Some("Sign up for news"), "a", "#news"),
            aff(Some("Sign up"), "button", "#signup"),
        ];
        let m = match_target("sign up", ActionKind::Click, &list);
        assert_eq!(m.best().unwrap().selector, "#signup");
    }

    #[test]
    fn medium_and_low_bands() {
        let list = [aff(Some("Save draft now"), "div", "#s")];
        let m = match_target("draft save", ActionKind::Focus, &list);
        assert_eq!(m.best().unwrap().confidence, Confidence::Medium);
        let m = match_target("draft copy", ActionKind::Focus, &list);
        assert_eq!(m.best().unwrap().score, SHARED_TOKEN_SCORE);
        assert_eq!(m.best().unwrap().confidence, Confidence::Low);
        let m = match_target("draft", ActionKind::Focus, &[aff(Some("Drafts and more"), "div", "#d")]);
        // "draft" is a substring of the name
        assert_eq!(m.best().unwrap().confidence, Confidence::High);
        let m = match_target("old draft", ActionKind::Focus, &[aff(Some("Draft"), "div", "#d")]);
        assert_eq!(m.best().unwrap().score, SUBSTRING_SCORE);
        let m = match_target("x y draft", ActionKind::Focus, &[aff(Some("Drafts"), "span", "#d")]);
        assert!(m.best().is_none());
    }

    #[test]
    fn no_shared_tokens_is_no_match() {
        let list = [aff(Some("Submit"), "button", "#s"), aff(Some("Cancel"), "a", "#c")];
        match match_target("shopping cart", ActionKind::Click, &list) {
            MatchOutcome::NoMatch { suggestion } => assert!(suggestion.contains("more specific")),
            other => panic!("Expected NoMatch, got {:?}", other),
        }
        assert!(match_target("", ActionKind::Click, &list).best().is_none());
    }
}
