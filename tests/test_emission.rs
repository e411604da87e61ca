extern crate membrane;

use membrane::parser::parse_stylesheet;
use membrane::runner::ds::error::MembraneError;
use membrane::runner::emit::markup::MarkupBuilder;
use membrane::runner::emit::style::StyleScoper;
use membrane::runner::emit::token::{ScopingToken, DEFAULT_TOKEN_PREFIX};
use membrane::runner::plugin::loader::ModuleLoader;
use membrane::runner::plugin::registry::GrantRegistry;
use membrane::runner::plugin::types::{GuestModule, ModuleOutcome};
use proptest::prelude::*;

fn token() -> ScopingToken {
    ScopingToken::generate(DEFAULT_TOKEN_PREFIX).unwrap()
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Void(String),
    Element {
        tag: String,
        id: Option<String>,
        children: Vec<Node>,
    },
}

fn tag_name() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["div", "p", "span", "ul", "li", "em", "section"])
        .prop_map(String::from)
}

fn tree() -> impl Strategy<Value = Node> {
    let leaf = prop_oneof![
        "[a-zA-Z0-9 <>&.,!?]{0,12}".prop_map(Node::Text),
        prop::sample::select(vec!["br", "hr", "img"]).prop_map(|t| Node::Void(t.to_string())),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        (
            tag_name(),
            proptest::option::of("[a-z]{1,6}"),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(tag, id, children)| Node::Element { tag, id, children })
    })
}

fn emit(builder: &mut MarkupBuilder, node: &Node) -> Result<(), MembraneError> {
    match node {
        Node::Text(t) => builder.text(t),
        Node::Void(tag) => {
            builder.begin_tag(tag)?;
            builder.finish_open_tag(true)
        }
        Node::Element { tag, id, children } => {
            builder.begin_tag(tag)?;
            if let Some(id) = id {
                let scoped = builder.scoped_id(id);
                builder.attribute("id", &scoped)?;
            }
            builder.finish_open_tag(false)?;
            for child in children {
                emit(builder, child)?;
            }
            builder.end_tag(tag)
        }
    }
}

fn count_elements(node: &Node) -> usize {
    match node {
        Node::Text(_) => 0,
        Node::Void(_) => 1,
        Node::Element { children, .. } => 1 + children.iter().map(count_elements).sum::<usize>(),
    }
}

/// Helper to check that start and end tags in `markup` pair up. Returns the
/// number of elements seen.
fn check_balanced(markup: &str) -> Result<usize, String> {
    let mut stack: Vec<String> = vec![];
    let mut elements = 0;
    let mut rest = markup;
    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let end = after.find('>').ok_or("unterminated tag")?;
        let inner = &after[..end];
        if let Some(name) = inner.strip_prefix('/') {
            match stack.pop() {
                Some(open) if open == name => {}
                other => return Err(format!("</{}> closes {:?}", name, other)),
            }
        } else {
            let name: String = inner
                .chars()
                .take_while(|c| !c.is_whitespace() && *c != '/')
                .collect();
            elements += 1;
            if !inner.ends_with('/') {
                stack.push(name);
            }
        }
        rest = &after[end + 1..];
    }
    if stack.is_empty() {
        Ok(elements)
    } else {
        Err(format!("unclosed {:?}", stack))
    }
}

// ── Markup ───────────────────────────────────────────────────────────

#[test]
fn test_mismatched_end_tag_yields_no_output() {
    let mut builder = MarkupBuilder::new(token());
    builder.begin_tag("div").unwrap();
    builder.finish_open_tag(false).unwrap();
    builder.text("hi").unwrap();
    assert!(matches!(
        builder.end_tag("span"),
        Err(MembraneError::StructuralViolation(_))
    ));
    assert!(builder.is_poisoned());
    assert!(builder.text("more").is_err());
    assert!(builder.finish().is_err());
}

#[test]
fn test_text_and_attributes_are_escaped() {
    let mut builder = MarkupBuilder::new(token());
    builder.begin_tag("a").unwrap();
    builder.attribute("title", "\"><script>").unwrap();
    builder.finish_open_tag(false).unwrap();
    builder.text("<b>&</b>").unwrap();
    builder.end_tag("a").unwrap();
    let markup = builder.finish().unwrap();
    assert_eq!(
        markup.as_str(),
        "<a title=\"&quot;&gt;&lt;script&gt;\">&lt;b&gt;&amp;&lt;/b&gt;</a>"
    );
}

#[test]
fn test_fragment_spliced_with_raw_inner() {
    let loader = ModuleLoader::new(GrantRegistry::new());
    let mut ctx = loader.new_context("frag").unwrap();
    let mut fragment = ctx.emission().fragment();
    fragment.begin_tag("li").unwrap();
    fragment.finish_open_tag(false).unwrap();
    fragment.text("one").unwrap();
    fragment.end_tag("li").unwrap();
    let fragment = fragment.finish().unwrap();

    let sandbox = ctx.emission_mut();
    sandbox.begin_tag("ul").unwrap();
    sandbox.finish_open_tag(false).unwrap();
    sandbox.raw_inner(&fragment).unwrap();
    sandbox.end_tag("ul").unwrap();
    assert!(!sandbox.is_aborted());
}

// ── Style ────────────────────────────────────────────────────────────

#[test]
fn test_unscoped_rule_is_rejected() {
    let mut scoper = StyleScoper::new(token());
    assert!(matches!(
        scoper.emit_style_rules(&["p { color: red }"]),
        Err(MembraneError::StructuralViolation(_))
    ));
    assert!(scoper.finish().is_err());
}

#[test]
fn test_token_twice_in_one_selector_is_rejected() {
    let mut scoper = StyleScoper::new(token());
    assert!(scoper
        .emit_style_rules(&[".", " .", " p { color: red }"])
        .is_err());
}

#[test]
fn test_selector_list_checked_selector_by_selector() {
    let t = token();
    let mut scoper = StyleScoper::new(t.clone());
    scoper
        .emit_style_rules(&[".", " .a, .", " .b { margin: 0 }"])
        .unwrap();
    assert_eq!(
        scoper.stylesheet(),
        format!(".{0} .a, .{0} .b {{ margin: 0; }}", t)
    );
    let mut scoper = StyleScoper::new(token());
    assert!(scoper
        .emit_style_rules(&[".", " .a, .b { margin: 0 }"])
        .is_err());
}

#[test]
fn test_selectors_escaping_the_module_subtree_are_rejected() {
    let escapes: Vec<Vec<&str>> = vec![
        vec!["*:not(.", ") { color: red }"],
        vec![".", " ~ p { color: red }"],
        vec![".", " + p { color: red }"],
        vec!["body[title=\"", "\"] { display: none }"],
        vec!["p .", " { color: red }"],
        vec![".", ".wide { color: red }"],
        vec!["#intro-", " ~ aside { color: red }"],
        vec!["#intro-", ":hover + p { color: red }"],
    ];
    for parts in escapes {
        let mut scoper = StyleScoper::new(token());
        let result = scoper.emit_style_rules(&parts);
        assert!(
            matches!(result, Err(MembraneError::StructuralViolation(_))),
            "accepted {:?}",
            parts
        );
        assert!(scoper.finish().is_err());
    }
}

#[test]
fn test_selectors_inside_the_module_subtree_are_accepted() {
    let t = token();
    let mut scoper = StyleScoper::new(t.clone());
    scoper
        .emit_style_rules(&[
            ".",
            " { padding: 0 }\n.",
            " > ul li + li { margin: 0 }\n#intro-",
            ":hover em { color: blue }",
        ])
        .unwrap();
    assert_eq!(
        scoper.finish().unwrap(),
        format!(
            ".{0} {{ padding: 0; }}\n.{0} > ul li + li {{ margin: 0; }}\n#intro-{0}:hover em {{ color: blue; }}",
            t
        )
    );
}

// ── Isolation ────────────────────────────────────────────────────────

#[test]
fn test_sibling_modules_are_isolated() {
    let loader = ModuleLoader::new(GrantRegistry::new());
    let broken = GuestModule::new("broken", |ctx, _| {
        let sandbox = ctx.emission_mut();
        sandbox.begin_tag("p")?;
        sandbox.finish_open_tag(false)?;
        sandbox.end_tag("div")?;
        Ok(ModuleOutcome::NoResult)
    });
    let healthy = GuestModule::new("healthy", |ctx, _| {
        let sandbox = ctx.emission_mut();
        sandbox.begin_tag("p")?;
        sandbox.scoped_id_attribute("intro")?;
        sandbox.finish_open_tag(false)?;
        sandbox.text("ok")?;
        sandbox.end_tag("p")?;
        sandbox.emit_style_rules(&["#intro-", " { color: blue }"])?;
        Ok(ModuleOutcome::NoResult)
    });

    let a = loader.load_module(&broken, vec![]).unwrap();
    let b = loader.load_module(&healthy, vec![]).unwrap();

    assert!(a.output.is_none());
    assert!(a.uncaught.is_some());
    let out = b.output.unwrap();
    assert!(b.uncaught.is_none());
    assert_eq!(
        out.markup.as_str(),
        format!("<p id=\"intro-{}\">ok</p>", out.token)
    );
    assert_eq!(out.stylesheet, format!("#intro-{} {{ color: blue; }}", out.token));
    assert!(out.wrapped_markup().starts_with(&format!("<div class=\"{}\">", out.token)));
}

#[test]
fn test_guest_cannot_catch_a_structural_violation() {
    let loader = ModuleLoader::new(GrantRegistry::new());
    let module = GuestModule::new("sneaky", |ctx, _| {
        let caught = ctx.catch_guest(|ctx| {
            ctx.emission_mut().end_tag("div")?;
            Ok(membrane::runner::ds::value::Value::Undefined)
        });
        assert!(caught.is_err());
        caught?;
        Ok(ModuleOutcome::NoResult)
    });
    let loaded = loader.load_module(&module, vec![]).unwrap();
    assert!(loaded.output.is_none());
}

#[test]
fn test_unclosed_element_withholds_output() {
    let loader = ModuleLoader::new(GrantRegistry::new());
    let module = GuestModule::new("unclosed", |ctx, _| {
        ctx.emission_mut().begin_tag("div")?;
        ctx.emission_mut().finish_open_tag(false)?;
        Ok(ModuleOutcome::NoResult)
    });
    let loaded = loader.load_module(&module, vec![]).unwrap();
    assert!(loaded.uncaught.is_none());
    assert!(loaded.output.is_none());
}

proptest! {
    #[test]
    fn prop_well_formed_trees_emit_balanced_markup(root in tree()) {
        let t = token();
        let mut builder = MarkupBuilder::new(t.clone());
        emit(&mut builder, &root).unwrap();
        let markup = builder.finish().unwrap();
        let elements = check_balanced(markup.as_str());
        prop_assert_eq!(elements, Ok(count_elements(&root)));
        for piece in markup.as_str().split("id=\"").skip(1) {
            let value = piece.split('"').next().unwrap_or("");
            let suffix = format!("-{}", t);
            prop_assert!(value.ends_with(&suffix));
        }
    }

    #[test]
    fn prop_every_emitted_selector_carries_the_token_once(
        classes in prop::collection::vec("[a-z][a-z0-9-]{0,8}", 1..5),
    ) {
        let t = token();
        let mut scoper = StyleScoper::new(t.clone());
        for class in &classes {
            let tail = format!(" .{} {{ color: red }}", class);
            scoper.emit_style_rules(&[".", tail.as_str()]).unwrap();
        }
        let rules = parse_stylesheet(&scoper.finish().unwrap()).unwrap();
        prop_assert_eq!(rules.len(), classes.len());
        for rule in rules {
            for selector in rule.selectors {
                prop_assert_eq!(selector.matches(t.as_str()).count(), 1);
            }
        }
    }
}
