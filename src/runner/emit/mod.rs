//! Emission sandbox: the only way a guest module produces document content.
//!
//! Each module instance owns one sandbox, keyed by a fresh [`ScopingToken`]:
//!
//! ```text
//! module instance ──► EmissionSandbox { token }
//!                        ├── MarkupBuilder  ids become  <local>-<token>
//!                        └── StyleScoper    holes become <token>
//! ```
//!
//! A structural violation aborts the sandbox it happened in and nothing else.

pub mod markup;
pub mod style;
pub mod token;

use tracing::error;

use crate::runner::ds::error::MembraneError;
use crate::runner::emit::markup::{MarkupBuilder, SafeMarkup};
use crate::runner::emit::style::StyleScoper;
use crate::runner::emit::token::ScopingToken;

/// Everything one module instance emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionOutput {
    pub token: ScopingToken,
    pub markup: SafeMarkup,
    pub stylesheet: String,
}
impl EmissionOutput {
    /// The markup inside a container carrying the token as its class, which is
    /// what scoped selectors of the form `.<token> ...` match against.
    pub fn wrapped_markup(&self) -> String {
        format!("<div class=\"{}\">{}</div>", self.token, self.markup)
    }
}

pub struct EmissionSandbox {
    token: ScopingToken,
    markup: MarkupBuilder,
    style: StyleScoper,
    aborted: Option<String>,
}

impl EmissionSandbox {
    pub fn new(token: ScopingToken) -> Self {
        EmissionSandbox {
            markup: MarkupBuilder::new(token.clone()),
            style: StyleScoper::new(token.clone()),
            token,
            aborted: None,
        }
    }

    pub fn scoping_token(&self) -> &ScopingToken {
        &self.token
    }

    pub fn scoped_id(&self, local: &str) -> String {
        self.token.scoped_id(local)
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Marks the sandbox unusable; its output will never be released.
    pub fn abort(&mut self, reason: impl Into<String>) {
        if self.aborted.is_none() {
            let reason = reason.into();
            error!(token = %self.token, %reason, "emission aborted");
            self.aborted = Some(reason);
        }
    }

    fn guard<T>(&mut self, result: Result<T, MembraneError>) -> Result<T, MembraneError> {
        if let Err(MembraneError::StructuralViolation(reason)) = &result {
            let reason = reason.clone();
            self.abort(reason);
        }
        result
    }

    fn check_live(&self) -> Result<(), MembraneError> {
        match &self.aborted {
            Some(reason) => Err(MembraneError::structural(format!(
                "emission already aborted: {}",
                reason
            ))),
            None => Ok(()),
        }
    }

    /// A separate builder for a fragment to be spliced in with `raw_inner`.
    pub fn fragment(&self) -> MarkupBuilder {
        MarkupBuilder::new(self.token.clone())
    }

    pub fn begin_tag(&mut self, name: &str) -> Result<(), MembraneError> {
        self.check_live()?;
        let r = self.markup.begin_tag(name);
        self.guard(r)
    }

    pub fn attribute(&mut self, name: &str, value: &str) -> Result<(), MembraneError> {
        self.check_live()?;
        let r = self.markup.attribute(name, value);
        self.guard(r)
    }

    /// `id` attribute with the value scoped to this module.
    pub fn scoped_id_attribute(&mut self, local: &str) -> Result<(), MembraneError> {
        let id = self.scoped_id(local);
        self.attribute("id", &id)
    }

    pub fn finish_open_tag(&mut self, self_closing: bool) -> Result<(), MembraneError> {
        self.check_live()?;
        let r = self.markup.finish_open_tag(self_closing);
        self.guard(r)
    }

    pub fn text(&mut self, text: &str) -> Result<(), MembraneError> {
        self.check_live()?;
        let r = self.markup.text(text);
        self.guard(r)
    }

    pub fn raw_inner(&mut self, markup: &SafeMarkup) -> Result<(), MembraneError> {
        self.check_live()?;
        let r = self.markup.raw_inner(markup);
        self.guard(r)
    }

    pub fn end_tag(&mut self, name: &str) -> Result<(), MembraneError> {
        self.check_live()?;
        let r = self.markup.end_tag(name);
        self.guard(r)
    }

    pub fn emit_style_rules<S: AsRef<str>>(&mut self, parts: &[S]) -> Result<(), MembraneError> {
        self.check_live()?;
        let r = self.style.emit_style_rules(parts);
        self.guard(r)
    }

    pub fn finish(self) -> Result<EmissionOutput, MembraneError> {
        self.check_live()?;
        let markup = self.markup.finish()?;
        let stylesheet = self.style.finish()?;
        Ok(EmissionOutput {
            token: self.token,
            markup,
            stylesheet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::emit::token::DEFAULT_TOKEN_PREFIX;

    fn sandbox() -> EmissionSandbox {
        EmissionSandbox::new(ScopingToken::generate(DEFAULT_TOKEN_PREFIX).unwrap())
    }

    #[test]
    fn test_fragment_spliced_into_document() {
        let mut s = sandbox();
        let mut fragment = s.fragment();
        fragment.begin_tag("b").unwrap();
        fragment.finish_open_tag(false).unwrap();
        fragment.text("bold").unwrap();
        fragment.end_tag("b").unwrap();
        let fragment = fragment.finish().unwrap();

        s.begin_tag("p").unwrap();
        s.scoped_id_attribute("intro").unwrap();
        s.finish_open_tag(false).unwrap();
        s.raw_inner(&fragment).unwrap();
        s.end_tag("p").unwrap();
        let token = s.scoping_token().clone();
        let out = s.finish().unwrap();
        assert_eq!(
            out.markup.as_str(),
            format!("<p id=\"intro-{}\"><b>bold</b></p>", token)
        );
    }

    #[test]
    fn test_style_violation_aborts_markup_too() {
        let mut s = sandbox();
        assert!(s.emit_style_rules(&["body { color: red }"]).is_err());
        assert!(s.is_aborted());
        assert!(s.begin_tag("p").is_err());
        assert!(s.finish().is_err());
    }
}
