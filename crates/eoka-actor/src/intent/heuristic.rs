//! Lexical fallback: verb families and target phrases from free text.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Command, Confidence};
use crate::action::ActionKind;

/// Pixels per `scroll down` / `scroll up`.
pub const SCROLL_STEP: f64 = 400.0;

const ARTICLES: &[&str] = &["the", "a", "an"];
const LEADING_PREPOSITIONS: &[&str] = &["on", "for"];
const GENERIC_NOUNS: &[&str] = &["button", "link", "field", "element"];

static QUOTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([^"]+)"|“([^”]+)”|(?:^|\s)'([^']+)'"#).expect("quoted pattern")
});
static INTO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:in|into)\s+(.+)$").expect("into pattern"));
static FILL_WITH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^fill(?:\s+(?:in|out))?\s+(.+?)\s+with\s+(.+)$").expect("fill pattern")
});
static POSITIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:type|enter|input|fill)\s+(.+?)\s+(?:in|into)\s+(.+)$")
        .expect("positional pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Click,
    Type,
    Clear,
    Focus,
    Scroll,
    Wait,
}

fn family(word: &str) -> Option<Family> {
    Some(match word {
        "click" | "press" | "tap" => Family::Click,
        "type" | "enter" | "input" | "fill" => Family::Type,
        "clear" | "empty" | "delete" => Family::Clear,
        "focus" | "select" => Family::Focus,
        "scroll" => Family::Scroll,
        "wait" | "find" => Family::Wait,
        _ => return None,
    })
}

fn bare(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Parse a free-text request. `None` when nothing usable remains.
pub(super) fn parse(request: &str) -> Option<Command> {
    let words: Vec<&str> = request.split_whitespace().collect();
    let lower: Vec<String> = words.iter().map(|w| bare(w)).collect();

    let Some((at, fam)) = lower
        .iter()
        .enumerate()
        .find_map(|(i, w)| family(w).map(|f| (i, f)))
    else {
        let target = normalize_target(&words.join(" "))?;
        return Some(Command::new(ActionKind::Click, Confidence::Low).target(target));
    };

    let tail = words[at..].join(" ");
    let rest = words[at + 1..].join(" ");
    let command = |kind| Command::new(kind, Confidence::Medium);

    let cmd = match fam {
        Family::Click => command(ActionKind::Click).maybe_target(normalize_target(&rest)),
        Family::Focus => command(ActionKind::Focus).maybe_target(normalize_target(&rest)),
        Family::Clear => command(ActionKind::Clear).maybe_target(normalize_target(&rest)),
        Family::Wait => {
            command(ActionKind::WaitForElement).maybe_target(normalize_target(&rest))
        }
        Family::Type => parse_type(&tail, &rest, &lower[at]),
        Family::Scroll => parse_scroll(&lower[at + 1..], &words[at + 1..]),
    };
    Some(cmd)
}

fn parse_type(tail: &str, rest: &str, verb: &str) -> Command {
    let cmd = Command::new(ActionKind::Type, Confidence::Medium);

    if let Some(caps) = QUOTED.captures(tail) {
        let text = caps
            .iter()
            .skip(1)
            .flatten()
            .next()
            .map(|m| m.as_str().to_string());
        let after = caps.get(0).map_or("", |m| &tail[m.end()..]);
        let target = INTO
            .captures(after)
            .and_then(|c| c.get(1))
            .and_then(|m| normalize_target(m.as_str()));
        return Command {
            text,
            target,
            ..cmd
        };
    }

    if let Some(caps) = FILL_WITH.captures(tail) {
        return cmd
            .maybe_target(caps.get(1).and_then(|m| normalize_target(m.as_str())))
            .text(trim_value(caps.get(2).map_or("", |m| m.as_str())));
    }

    if let Some(caps) = POSITIONAL.captures(tail) {
        return cmd
            .text(caps.get(1).map_or("", |m| m.as_str()))
            .maybe_target(caps.get(2).and_then(|m| normalize_target(m.as_str())));
    }

    // "fill the email field" names a target, "type hello" names text.
    if verb == "fill" {
        return cmd.maybe_target(normalize_target(rest));
    }
    if rest.is_empty() {
        cmd
    } else {
        cmd.text(rest)
    }
}

fn parse_scroll(lower: &[String], words: &[&str]) -> Command {
    let has = |w: &str| lower.iter().any(|l| l == w);
    let cmd = |kind| Command::new(kind, Confidence::Medium);

    if has("top") {
        return cmd(ActionKind::ScrollToTop);
    }
    if has("bottom") {
        return cmd(ActionKind::ScrollToBottom);
    }
    if let Some(to) = lower.iter().position(|l| l == "to") {
        if let Some(target) = normalize_target(&words[to + 1..].join(" ")) {
            return cmd(ActionKind::ScrollTo).target(target);
        }
    }
    let dy = if has("up") { -SCROLL_STEP } else { SCROLL_STEP };
    Command {
        delta: Some(dy),
        ..cmd(ActionKind::ScrollBy)
    }
}

fn trim_value(s: &str) -> &str {
    s.trim().trim_end_matches(['.', '!', '?'])
}

/// Collapse whitespace, drop trailing punctuation and leading articles,
/// strip one trailing generic noun, lower-case.
pub(super) fn normalize_target(raw: &str) -> Option<String> {
    let cleaned = raw
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'));
    let mut words: Vec<String> = cleaned
        .split_whitespace()
        .map(|w| w.trim_matches(|c| c == '"' || c == '\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();

    if words
        .first()
        .is_some_and(|w| LEADING_PREPOSITIONS.contains(&w.as_str()))
    {
        words.remove(0);
    }
    while words
        .first()
        .is_some_and(|w| ARTICLES.contains(&w.as_str()))
    {
        words.remove(0);
    }
    if words.len() > 1
        && words
            .last()
            .is_some_and(|w| GENERIC_NOUNS.contains(&w.as_str()))
    {
        words.pop();
    }

    let target = words.join(" ");
    (!target.is_empty()).then_some(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Command {
        parse(s).unwrap()
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_target("  the   Submit button. ").as_deref(), Some("submit"));
        assert_eq!(normalize_target("on the Sign In link").as_deref(), Some("sign in"));
        assert_eq!(normalize_target("the button").as_deref(), Some("button"));
        assert_eq!(normalize_target("the"), None);
        assert_eq!(normalize_target(""), None);
    }

    #[test]
    fn click_family() {
        for req in ["click the submit button", "Press the Submit button", "tap submit"] {
            let cmd = p(req);
            assert_eq!(cmd.action, ActionKind::Click, "{req}");
            assert_eq!(cmd.target.as_deref(), Some("submit"), "{req}");
            assert_eq!(cmd.confidence, Confidence::Medium);
        }
    }

    #[test]
    fn first_verb_wins() {
        let cmd = p("please click the delete button");
        assert_eq!(cmd.action, ActionKind::Click);
        assert_eq!(cmd.target.as_deref(), Some("delete"));
    }

    #[test]
    fn type_positional() {
        let cmd = p("type john@example.com into the email field");
        assert_eq!(cmd.action, ActionKind::Type);
        assert_eq!(cmd.text.as_deref(), Some("john@example.com"));
        assert_eq!(cmd.target.as_deref(), Some("email"));
    }

    #[test]
    fn type_quoted() {
        let cmd = p(r#"Enter "New York, NY" in the city field"#);
        assert_eq!(cmd.text.as_deref(), Some("New York, NY"));
        assert_eq!(cmd.target.as_deref(), Some("city"));

        let cmd = p("type 'hello world'");
        assert_eq!(cmd.text.as_deref(), Some("hello world"));
        assert_eq!(cmd.target, None);
    }

    #[test]
    fn fill_with() {
        let cmd = p("fill in the name field with Jane Doe.");
        assert_eq!(cmd.action, ActionKind::Type);
        assert_eq!(cmd.target.as_deref(), Some("name"));
        assert_eq!(cmd.text.as_deref(), Some("Jane Doe"));

        let cmd = p("fill the email field");
        assert_eq!(cmd.target.as_deref(), Some("email"));
        assert_eq!(cmd.text, None);
    }

    #[test]
    fn clear_focus_wait() {
        assert_eq!(p("clear the search box").action, ActionKind::Clear);
        assert_eq!(p("select the country dropdown").action, ActionKind::Focus);
        let cmd = p("wait for the results list");
        assert_eq!(cmd.action, ActionKind::WaitForElement);
        assert_eq!(cmd.target.as_deref(), Some("results list"));
    }

    #[test]
    fn scroll_family() {
        assert_eq!(p("scroll to the top").action, ActionKind::ScrollToTop);
        assert_eq!(p("scroll all the way to the bottom").action, ActionKind::ScrollToBottom);

        let cmd = p("scroll to the pricing section");
        assert_eq!(cmd.action, ActionKind::ScrollTo);
        assert_eq!(cmd.target.as_deref(), Some("pricing section"));

        let down = p("scroll down");
        assert_eq!(down.action, ActionKind::ScrollBy);
        assert_eq!(down.delta, Some(SCROLL_STEP));
        assert_eq!(p("scroll up a bit").delta, Some(-SCROLL_STEP));
        assert_eq!(p("scroll").delta, Some(SCROLL_STEP));
    }

    #[test]
    fn no_verb_defaults_to_click() {
        let cmd = p("the Checkout link");
        assert_eq!(cmd.action, ActionKind::Click);
        assert_eq!(cmd.target.as_deref(), Some("checkout"));
        assert_eq!(cmd.confidence, Confidence::Low);
        assert!(parse("the").is_none());
    }
}
