//! Scoped stylesheet emission.
//!
//! Guest style arrives as a template: literal parts with a hole between each
//! pair. The holes are filled with the module's scoping token, so a rule can
//! only ever select inside the module's own markup.

use tracing::debug;

use crate::parser::parse_stylesheet;
use crate::runner::ds::error::MembraneError;
use crate::runner::emit::token::ScopingToken;

pub struct StyleScoper {
    token: ScopingToken,
    rules: Vec<String>,
    poisoned: bool,
}

impl StyleScoper {
    pub fn new(token: ScopingToken) -> Self {
        StyleScoper {
            token,
            rules: Vec::new(),
            poisoned: false,
        }
    }

    pub fn token(&self) -> &ScopingToken {
        &self.token
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn violation(&mut self, reason: String) -> MembraneError {
        debug!(token = %self.token, %reason, "style scoper poisoned");
        self.poisoned = true;
        self.rules.clear();
        MembraneError::StructuralViolation(reason)
    }

    /// Joins `parts` with the token and appends the resulting rules. Every
    /// top-level selector must open with `.TOKEN` or `#name-TOKEN`, must not
    /// leave that element through a sibling combinator, and must not mention
    /// the token anywhere else.
    pub fn emit_style_rules<S: AsRef<str>>(&mut self, parts: &[S]) -> Result<(), MembraneError> {
        if self.poisoned {
            return Err(MembraneError::structural("style scoper already aborted"));
        }
        let css = parts
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<&str>>()
            .join(self.token.as_str());
        let rules = match parse_stylesheet(&css) {
            Ok(rules) => rules,
            Err(e) => return Err(self.violation(format!("unparseable stylesheet: {}", e))),
        };
        let mut accepted = Vec::with_capacity(rules.len());
        for rule in rules {
            for selector in &rule.selectors {
                if let Err(reason) = check_confined(selector, self.token.as_str()) {
                    return Err(self.violation(reason));
                }
            }
            accepted.push(rule.to_css());
        }
        debug!(token = %self.token, rules = accepted.len(), "style rules emitted");
        self.rules.extend(accepted);
        Ok(())
    }

    pub fn stylesheet(&self) -> String {
        self.rules.join("\n")
    }

    pub fn finish(self) -> Result<String, MembraneError> {
        if self.poisoned {
            return Err(MembraneError::structural("style scoper already aborted"));
        }
        Ok(self.stylesheet())
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Rest of `s` after the compound selector it starts with. Brackets, parens
/// and quoted strings are skipped whole.
fn skip_compound(s: &str) -> &str {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '(') | (None, '[') => depth += 1,
            (None, ')') | (None, ']') => depth = depth.saturating_sub(1),
            (None, c) if depth == 0 && (c.is_whitespace() || matches!(c, '>' | '~' | '+')) => {
                return &s[i..];
            }
            _ => {}
        }
    }
    ""
}

/// A selector may only match the module's container or its scoped ids and
/// their descendants.
fn check_confined(selector: &str, token: &str) -> Result<(), String> {
    let selector = selector.trim();
    let count = selector.matches(token).count();
    if count != 1 {
        return Err(format!(
            "selector '{}' mentions the scoping token {} times",
            selector, count
        ));
    }
    let rest = if let Some(rest) = selector.strip_prefix('.').and_then(|s| s.strip_prefix(token)) {
        match rest.chars().next() {
            None => return Ok(()),
            Some(c) if c.is_whitespace() || c == '>' => rest,
            Some(_) => {
                return Err(format!(
                    "selector '{}' must follow the scoping class with a combinator",
                    selector
                ))
            }
        }
    } else if let Some(id) = selector.strip_prefix('#') {
        let at = id.find(token).unwrap_or(0);
        let local = match id[..at].strip_suffix('-') {
            Some(local) if !local.is_empty() && local.chars().all(is_ident_char) => local,
            _ => {
                return Err(format!(
                    "selector '{}' must open with a scoped id",
                    selector
                ))
            }
        };
        let after = &id[at + token.len()..];
        if after.starts_with(is_ident_char) {
            return Err(format!(
                "selector '{}' extends the scoped id '{}'",
                selector, local
            ));
        }
        skip_compound(after)
    } else {
        return Err(format!(
            "selector '{}' must open with the scoping class or a scoped id",
            selector
        ));
    };
    match rest.trim_start().chars().next() {
        Some('~') | Some('+') => Err(format!(
            "selector '{}' reaches siblings outside the module",
            selector
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::emit::token::DEFAULT_TOKEN_PREFIX;

    fn scoper() -> StyleScoper {
        StyleScoper::new(ScopingToken::generate(DEFAULT_TOKEN_PREFIX).unwrap())
    }

    #[test]
    fn test_template_holes_filled_with_token() {
        let mut s = scoper();
        let token = s.token().clone();
        s.emit_style_rules(&[".", " p { color: red }"]).unwrap();
        assert_eq!(s.stylesheet(), format!(".{} p {{ color: red; }}", token));
    }

    #[test]
    fn test_unscoped_selector_poisons() {
        let mut s = scoper();
        assert!(s.emit_style_rules(&["p { color: red }"]).is_err());
        assert!(s.is_poisoned());
        assert!(s.emit_style_rules(&[".", " p {}"]).is_err());
        assert!(s.finish().is_err());
    }

    #[test]
    fn test_confined_selector_shapes() {
        let t = "guest-abc";
        assert!(check_confined(".guest-abc", t).is_ok());
        assert!(check_confined(".guest-abc p > a:hover", t).is_ok());
        assert!(check_confined(".guest-abc>p", t).is_ok());
        assert!(check_confined(".guest-abc li ~ li", t).is_ok());
        assert!(check_confined("#intro-guest-abc", t).is_ok());
        assert!(check_confined("#intro-guest-abc:nth-child(2n+1) em", t).is_ok());
        assert!(check_confined("#intro-guest-abc[title=\"a ~ b\"] > em", t).is_ok());

        assert!(check_confined("*:not(.guest-abc)", t).is_err());
        assert!(check_confined(".guest-abc ~ p", t).is_err());
        assert!(check_confined(".guest-abc + p", t).is_err());
        assert!(check_confined(".guest-abc.x", t).is_err());
        assert!(check_confined("body[title=\"guest-abc\"]", t).is_err());
        assert!(check_confined("p .guest-abc", t).is_err());
        assert!(check_confined("#intro-guest-abc ~ p", t).is_err());
        assert!(check_confined("#intro-guest-abcd", t).is_err());
        assert!(check_confined("#-guest-abc", t).is_err());
        assert!(check_confined("#a p.guest-abc", t).is_err());
    }

    #[test]
    fn test_every_selector_in_a_list_checked() {
        let mut s = scoper();
        let result = s.emit_style_rules(&[".", " a, b { color: red }"]);
        assert!(matches!(result, Err(MembraneError::StructuralViolation(_))));
    }
}
