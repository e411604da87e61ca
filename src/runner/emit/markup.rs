//! Well-formed markup emission.
//!
//! The builder tracks open elements on a stack. Any out-of-order operation
//! poisons it: the error is a structural violation and nothing it built so far
//! is ever released.

use std::fmt;
use std::fmt::{Display, Formatter};

use tracing::debug;

use crate::parser::is_markup_name;
use crate::runner::ds::error::MembraneError;
use crate::runner::emit::token::ScopingToken;

/// Markup known to be balanced and escaped. Only a finished builder makes one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SafeMarkup(String);
impl SafeMarkup {
    pub fn empty() -> Self {
        SafeMarkup(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl Display for SafeMarkup {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub struct MarkupBuilder {
    token: ScopingToken,
    out: String,
    open: Vec<String>,
    pending_tag: Option<String>,
    poisoned: bool,
}

impl MarkupBuilder {
    pub fn new(token: ScopingToken) -> Self {
        MarkupBuilder {
            token,
            out: String::new(),
            open: Vec::new(),
            pending_tag: None,
            poisoned: false,
        }
    }

    pub fn token(&self) -> &ScopingToken {
        &self.token
    }

    pub fn scoped_id(&self, local: &str) -> String {
        self.token.scoped_id(local)
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Elements opened and not yet closed, outermost first.
    pub fn open_elements(&self) -> &[String] {
        &self.open
    }

    fn violation(&mut self, reason: String) -> MembraneError {
        debug!(token = %self.token, %reason, "markup builder poisoned");
        self.poisoned = true;
        self.out.clear();
        MembraneError::StructuralViolation(reason)
    }

    fn check_usable(&mut self) -> Result<(), MembraneError> {
        if self.poisoned {
            return Err(MembraneError::structural("markup builder already aborted"));
        }
        Ok(())
    }

    fn check_no_pending(&mut self, op: &str) -> Result<(), MembraneError> {
        self.check_usable()?;
        if let Some(tag) = &self.pending_tag {
            let reason = format!("{} while the start tag of <{}> is still open", op, tag);
            return Err(self.violation(reason));
        }
        Ok(())
    }

    fn check_name(&mut self, name: &str) -> Result<(), MembraneError> {
        if !is_markup_name(name) {
            return Err(self.violation(format!("'{}' is not a valid markup name", name)));
        }
        Ok(())
    }

    pub fn begin_tag(&mut self, name: &str) -> Result<(), MembraneError> {
        self.check_no_pending("begin_tag")?;
        self.check_name(name)?;
        self.out.push('<');
        self.out.push_str(name);
        self.pending_tag = Some(name.to_string());
        Ok(())
    }

    pub fn attribute(&mut self, name: &str, value: &str) -> Result<(), MembraneError> {
        self.check_usable()?;
        if self.pending_tag.is_none() {
            return Err(self.violation(format!("attribute '{}' outside a start tag", name)));
        }
        self.check_name(name)?;
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        self.out.push_str(&escape_attribute(value));
        self.out.push('"');
        Ok(())
    }

    pub fn finish_open_tag(&mut self, self_closing: bool) -> Result<(), MembraneError> {
        self.check_usable()?;
        let tag = match self.pending_tag.take() {
            Some(tag) => tag,
            None => return Err(self.violation("no start tag to finish".to_string())),
        };
        if self_closing {
            self.out.push_str("/>");
        } else {
            self.out.push('>');
            self.open.push(tag);
        }
        Ok(())
    }

    pub fn text(&mut self, text: &str) -> Result<(), MembraneError> {
        self.check_no_pending("text")?;
        self.out.push_str(&escape_text(text));
        Ok(())
    }

    /// Splices in markup that was already checked by another builder.
    pub fn raw_inner(&mut self, markup: &SafeMarkup) -> Result<(), MembraneError> {
        self.check_no_pending("raw_inner")?;
        self.out.push_str(markup.as_str());
        Ok(())
    }

    pub fn end_tag(&mut self, name: &str) -> Result<(), MembraneError> {
        self.check_no_pending("end_tag")?;
        match self.open.last().cloned() {
            Some(top) if top == name => {
                self.open.pop();
                self.out.push_str("</");
                self.out.push_str(name);
                self.out.push('>');
                Ok(())
            }
            Some(top) => {
                let reason = format!("</{}> does not close the open <{}>", name, top);
                Err(self.violation(reason))
            }
            None => Err(self.violation(format!("</{}> with no open element", name))),
        }
    }

    /// Releases the markup, provided every element was closed.
    pub fn finish(mut self) -> Result<SafeMarkup, MembraneError> {
        self.check_no_pending("finish")?;
        if let Some(top) = self.open.last().cloned() {
            return Err(self.violation(format!("<{}> is never closed", top)));
        }
        Ok(SafeMarkup(self.out))
    }
}
