//! Compound CSS selectors for [`MemoryDom`](super::MemoryDom).
//!
//! Supports selector lists of compounds built from `tag`, `*`, `#id`,
//! `.class`, `[attr]` and `[attr=value]` (quoted or bare). Combinators and
//! pseudo-classes are rejected.

use crate::{Error, Result};

/// Anything a selector can be tested against.
pub(crate) trait Subject {
    fn tag(&self) -> &str;
    fn attr(&self, name: &str) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectorList(Vec<Compound>);

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl SelectorList {
    pub(crate) fn parse(input: &str) -> Result<Self> {
        let mut compounds = Vec::new();
        for part in split_list(input)? {
            compounds.push(parse_compound(part.trim(), input)?);
        }
        if compounds.is_empty() {
            return Err(Error::InvalidSelector(input.to_string()));
        }
        Ok(Self(compounds))
    }

    pub(crate) fn matches(&self, subject: &impl Subject) -> bool {
        self.0.iter().any(|c| c.matches(subject))
    }
}

impl Compound {
    fn matches(&self, s: &impl Subject) -> bool {
        if let Some(ref tag) = self.tag {
            if !s.tag().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(ref id) = self.id {
            if s.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let list = s.attr("class").unwrap_or("");
            if !self
                .classes
                .iter()
                .all(|c| list.split_whitespace().any(|have| have == c))
            {
                return false;
            }
        }
        self.attrs.iter().all(|(name, want)| match (s.attr(name), want) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(have), Some(want)) => have == want,
        })
    }
}

/// Split on top-level commas, ignoring commas inside quotes or brackets.
fn split_list(input: &str) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut start = 0;
    let mut escaped = false;

    for (i, ch) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, ch) {
            (_, '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() || depth != 0 {
        return Err(Error::InvalidSelector(input.to_string()));
    }
    parts.push(&input[start..]);
    Ok(parts)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn parse_compound(s: &str, whole: &str) -> Result<Compound> {
    let invalid = || Error::InvalidSelector(whole.to_string());
    if s.is_empty() {
        return Err(invalid());
    }

    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    let mut c = Compound::default();

    let ident = |i: &mut usize| -> String {
        let begin = *i;
        while *i < chars.len() && is_ident_char(chars[*i]) {
            *i += 1;
        }
        chars[begin..*i].iter().collect()
    };

    let tag = ident(&mut i);
    if !tag.is_empty() {
        c.tag = Some(tag.to_ascii_lowercase());
    } else if chars[0] == '*' {
        i = 1;
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                i += 1;
                let id = ident(&mut i);
                if id.is_empty() {
                    return Err(invalid());
                }
                c.id = Some(id);
            }
            '.' => {
                i += 1;
                let class = ident(&mut i);
                if class.is_empty() {
                    return Err(invalid());
                }
                c.classes.push(class);
            }
            '[' => {
                i += 1;
                skip_ws(&chars, &mut i);
                let name = ident(&mut i);
                if name.is_empty() {
                    return Err(invalid());
                }
                skip_ws(&chars, &mut i);
                match chars.get(i) {
                    Some(']') => {
                        i += 1;
                        c.attrs.push((name, None));
                    }
                    Some('=') => {
                        i += 1;
                        skip_ws(&chars, &mut i);
                        let value = attr_value(&chars, &mut i).ok_or_else(invalid)?;
                        skip_ws(&chars, &mut i);
                        if chars.get(i) != Some(&']') {
                            return Err(invalid());
                        }
                        i += 1;
                        c.attrs.push((name, Some(value)));
                    }
                    _ => return Err(invalid()),
                }
            }
            _ => return Err(invalid()),
        }
    }
    Ok(c)
}

fn skip_ws(chars: &[char], i: &mut usize) {
    while *i < chars.len() && chars[*i].is_whitespace() {
        *i += 1;
    }
}

fn attr_value(chars: &[char], i: &mut usize) -> Option<String> {
    let mut out = String::new();
    match chars.get(*i) {
        Some(&q) if q == '"' || q == '\'' => {
            *i += 1;
            while let Some(&ch) = chars.get(*i) {
                *i += 1;
                if ch == '\\' {
                    out.push(*chars.get(*i)?);
                    *i += 1;
                } else if ch == q {
                    return Some(out);
                } else {
                    out.push(ch);
                }
            }
            None
        }
        Some(_) => {
            while *i < chars.len() && is_ident_char(chars[*i]) {
                out.push(chars[*i]);
                *i += 1;
            }
            (!out.is_empty()).then_some(out)
        }
        None => None,
    }
}
