//! Pure HTML sanitization.
//!
//! Captured fragments pass through a fixed sequence of cleanup rules before
//! they leave the service: scripts and interactive chrome go away, inline
//! presentation is stripped, anchors collapse to their text, and whitespace
//! is normalized. SVG subtrees are exempt from the presentation rules, since
//! stripping `class`/`style` there would destroy the rendered graphic.
//!
//! The transform is deterministic and idempotent; it never touches the
//! network or the browser.

use std::sync::LazyLock;

use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;
use regex::Regex;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap_or_else(|e| panic!("whitespace regex: {}", e)));
static INTER_TAG_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").unwrap_or_else(|e| panic!("inter-tag regex: {}", e)));
static BLOCK_TAG_GAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(</?(?:div|p|ul|ol|li|table|tr|td|th|h[1-6]|section|article)\b[^>]*>)\s*")
        .unwrap_or_else(|e| panic!("block-tag regex: {}", e))
});

const REMOVED_ELEMENTS: &[&str] = &["img", "button", "form", "input", "iframe", "frame"];
const STRIPPED_ATTRIBUTES: &[&str] = &["style", "class", "href", "src", "id", "target", "rel"];

fn within_svg(node: &NodeRef) -> bool {
    node.inclusive_ancestors().any(|a| {
        a.as_element()
            .map(|e| e.name.local.as_ref().eq_ignore_ascii_case("svg"))
            .unwrap_or(false)
    })
}

fn detach_all(root: &NodeRef, selector: &str, exempt_svg: bool) {
    let matches: Vec<NodeRef> = match root.select(selector) {
        Ok(iter) => iter.map(|m| m.as_node().clone()).collect(),
        Err(_) => return,
    };
    for node in matches {
        if exempt_svg && within_svg(&node) {
            continue;
        }
        node.detach();
    }
}

fn strip_attributes(root: &NodeRef) {
    let elements: Vec<NodeRef> = match root.select("*") {
        Ok(iter) => iter.map(|m| m.as_node().clone()).collect(),
        Err(_) => return,
    };
    for node in elements {
        let in_svg = within_svg(&node);
        if let Some(element) = node.as_element() {
            let mut attrs = element.attributes.borrow_mut();
            attrs.map.retain(|name, _| {
                let local = name.local.as_ref();
                if local.starts_with("on") {
                    return false;
                }
                if in_svg {
                    return true;
                }
                !STRIPPED_ATTRIBUTES.contains(&local)
            });
        }
    }
}

fn flatten_anchors(root: &NodeRef) {
    let anchors: Vec<NodeRef> = match root.select("a") {
        Ok(iter) => iter.map(|m| m.as_node().clone()).collect(),
        Err(_) => return,
    };
    for anchor in anchors {
        if within_svg(&anchor) {
            continue;
        }
        let text = anchor.text_contents();
        if !text.trim().is_empty() {
            anchor.insert_before(NodeRef::new_text(text));
        }
        anchor.detach();
    }
}

fn serialize_children(body: &NodeRef) -> String {
    let mut out = Vec::new();
    for child in body.children() {
        let _ = child.serialize(&mut out);
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn collapse_whitespace(html: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(html, " ");
    let collapsed = INTER_TAG_GAP.replace_all(&collapsed, "><");
    // Text abutting a block-level tag keeps no gap either; block boundaries
    // carry the separation on render.
    let collapsed = BLOCK_TAG_GAP.replace_all(&collapsed, "$1");
    collapsed.trim().to_string()
}

/// Apply the full cleanup sequence to an HTML fragment and return the
/// sanitized markup. Rule order matters: anchors are flattened after their
/// attributes would no longer be needed, and whitespace collapse runs last
/// over the serialized result.
pub fn sanitize_fragment(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let document = kuchiki::parse_html().one(html.to_string());
    let body = match document.select_first("body") {
        Ok(body) => body.as_node().clone(),
        Err(_) => document,
    };

    // 1. Scripts go away everywhere, SVG included.
    detach_all(&body, "script", false);
    // 2. Style elements, except inside a graphic.
    detach_all(&body, "style", true);
    // 3. Presentation attributes, except inside a graphic.
    // 6. Event handlers and navigation attributes (same traversal).
    strip_attributes(&body);
    // 4. Anchors become their visible text.
    flatten_anchors(&body);
    // 5. Interactive and embedded chrome.
    for name in REMOVED_ELEMENTS {
        detach_all(&body, name, false);
    }
    // 7. Serialize and normalize whitespace.
    collapse_whitespace(&serialize_children(&body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_and_styles() {
        let out = sanitize_fragment(
            "<div><script>alert(1)</script><style>.x{color:red}</style><p>kept</p></div>",
        );
        assert!(!out.contains("script"));
        assert!(!out.contains("alert"));
        assert!(!out.contains("color:red"));
        assert!(out.contains("<p>kept</p>"));
    }

    #[test]
    fn strips_presentation_and_navigation_attributes() {
        let out = sanitize_fragment(
            r#"<div id="main" class="wide" style="color:red" onclick="x()" data-row="7">text</div>"#,
        );
        assert!(!out.contains("id="));
        assert!(!out.contains("class="));
        assert!(!out.contains("style="));
        assert!(!out.contains("onclick"));
        assert!(out.contains(r#"data-row="7""#));
    }

    #[test]
    fn anchors_collapse_to_text() {
        let out = sanitize_fragment(r#"<p>See <a href="/company/1">Acme Corp</a> for details</p>"#);
        assert!(!out.contains("<a"));
        assert!(!out.contains("href"));
        assert!(out.contains("Acme Corp"));
    }

    #[test]
    fn empty_anchors_vanish() {
        let out = sanitize_fragment(r#"<p>before<a href="/x">  </a>after</p>"#);
        assert!(!out.contains("<a"));
        assert!(out.contains("before"));
        assert!(out.contains("after"));
    }

    #[test]
    fn interactive_elements_removed() {
        let out = sanitize_fragment(
            r#"<div><form action="/s"><input name="q"><button>Go</button></form><img src="/x.png"><iframe src="/f"></iframe><p>ok</p></div>"#,
        );
        for tag in ["<form", "<input", "<button", "<img", "<iframe"] {
            assert!(!out.contains(tag), "{} survived: {}", tag, out);
        }
        assert!(out.contains("<p>ok</p>"));
    }

    #[test]
    fn svg_subtree_keeps_presentation() {
        let out = sanitize_fragment(
            r#"<div class="wrap"><svg class="chart"><g style="stroke:blue"><circle class="dot" r="4"/></g><style>.dot{fill:red}</style></svg></div>"#,
        );
        assert!(!out.contains(r#"class="wrap""#));
        assert!(out.contains(r#"class="chart""#));
        assert!(out.contains("stroke:blue"));
        assert!(out.contains(r#"class="dot""#));
        assert!(out.contains(".dot{fill:red}"));
    }

    #[test]
    fn scripts_removed_even_inside_svg() {
        let out = sanitize_fragment(r#"<svg><script>evil()</script><circle r="1"/></svg>"#);
        assert!(!out.contains("script"));
        assert!(out.contains("circle"));
    }

    #[test]
    fn whitespace_collapses() {
        let out = sanitize_fragment("<div>\n    <p>a   b</p>\n    <p>c</p>\n</div>");
        assert_eq!(out, "<div><p>a b</p><p>c</p></div>");
    }

    #[test]
    fn block_tag_adjacent_whitespace_removed() {
        let out = sanitize_fragment("<div>intro text\n<p>body</p>\n tail</div>");
        assert_eq!(out, "<div>intro text<p>body</p>tail</div>");
        let out = sanitize_fragment("<section> heading\n<table><tr><td>cell </td></tr></table>\nafter </section>");
        assert_eq!(out, "<section>heading<table><tbody><tr><td>cell</td></tr></tbody></table>after</section>");
        // Text inside inline tags is untouched.
        let out = sanitize_fragment("<p><b>one two</b> three</p>");
        assert!(out.contains("one two"));
        assert!(out.contains("</b> three"));
    }

    #[test]
    fn idempotent() {
        let input = r#"<div class="x"><a href="/y">link text</a><script>s()</script><p>  body  </p></div>"#;
        let once = sanitize_fragment(input);
        let twice = sanitize_fragment(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(sanitize_fragment(""), "");
        assert_eq!(sanitize_fragment("   \n  "), "");
    }
}
