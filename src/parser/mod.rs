mod api;

pub use api::{
    is_css_identifier, is_markup_name, parse_stylesheet, Declaration, Rule, StyleParser,
    StyleRule,
};
