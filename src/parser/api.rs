use pest::error::{Error, ErrorVariant};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "parser/style_grammar.pest"] // relative to src
pub struct StyleParser;

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

/// One top-level rule: its comma-separated selectors and declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub selectors: Vec<String>,
    pub declarations: Vec<Declaration>,
}
impl StyleRule {
    /// Canonical text form, one rule per line.
    pub fn to_css(&self) -> String {
        let declarations: Vec<String> = self
            .declarations
            .iter()
            .map(|d| format!("{}: {};", d.property, d.value))
            .collect();
        format!(
            "{} {{ {} }}",
            self.selectors.join(", "),
            declarations.join(" ")
        )
    }
}

pub fn parse_stylesheet(css: &str) -> Result<Vec<StyleRule>, Error<Rule>> {
    let mut rules = vec![];
    let pairs = StyleParser::parse(Rule::stylesheet, css)?;
    for pair in pairs {
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::rule => rules.push(build_rule(inner)?),
                Rule::EOI => {}
                _ => return Err(get_unexpected_error(1, &inner)),
            }
        }
    }
    Ok(rules)
}

fn build_rule(pair: Pair<Rule>) -> Result<StyleRule, Error<Rule>> {
    let mut selectors = vec![];
    let mut declarations = vec![];
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::selector_list => {
                for selector in inner.into_inner() {
                    selectors.push(selector.as_str().trim().to_string());
                }
            }
            Rule::declaration_block => {
                for declaration in inner.into_inner() {
                    declarations.push(build_declaration(declaration)?);
                }
            }
            _ => return Err(get_unexpected_error(2, &inner)),
        }
    }
    Ok(StyleRule {
        selectors,
        declarations,
    })
}

fn build_declaration(pair: Pair<Rule>) -> Result<Declaration, Error<Rule>> {
    let err = get_unexpected_error(3, &pair);
    let mut inner = pair.into_inner();
    let property = inner.next().ok_or_else(|| err.clone())?;
    let value = inner.next().ok_or(err)?;
    Ok(Declaration {
        property: property.as_str().to_string(),
        value: value.as_str().trim().to_string(),
    })
}

/// Whether `name` may be used as an element or attribute name.
pub fn is_markup_name(name: &str) -> bool {
    StyleParser::parse(Rule::markup_name, name).is_ok()
}

pub fn is_css_identifier(name: &str) -> bool {
    StyleParser::parse(Rule::css_identifier_only, name).is_ok()
}

fn get_unexpected_error(id: i32, pair: &Pair<Rule>) -> Error<Rule> {
    let message = format!("Unexpected state reached [{:?}] - {}", pair.as_rule(), id);
    Error::new_from_span(ErrorVariant::CustomError { message }, pair.as_span())
}
