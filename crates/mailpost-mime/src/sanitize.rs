//! Plain-text rendering of HTML bodies.
//!
//! Tags are stripped and entities decoded. Block elements and `<br>` end a
//! line; runs of whitespace inside a line collapse to one space. Nothing
//! inside `head`, `script`, `style` or `template` is kept.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::error::{Error, Result};

const SKIPPED: &[&str] = &["head", "script", "style", "template", "title"];

const BLOCKS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// Strips the tags from an HTML document, keeping its text.
///
/// # Errors
///
/// Returns [`Error::Sanitize`] if the document cannot be read.
pub fn html_to_text(html: &str) -> Result<String> {
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| Error::Sanitize(e.to_string()))?;

    let mut out = String::new();
    walk(&dom.document, &mut out);

    let lines: Vec<&str> = out
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    Ok(lines.join("\n"))
}

fn walk(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Document => walk_children(node, out),
        NodeData::Text { contents } => push_text(&contents.borrow(), out),
        NodeData::Element { name, .. } => {
            let tag: &str = &name.local;
            if SKIPPED.contains(&tag) {
                return;
            }
            if tag == "br" {
                out.push('\n');
                return;
            }
            let block = BLOCKS.contains(&tag);
            if block {
                out.push('\n');
            }
            walk_children(node, out);
            if block {
                out.push('\n');
            }
        }
        _ => {}
    }
}

fn walk_children(node: &Handle, out: &mut String) {
    for child in node.children.borrow().iter() {
        walk(child, out);
    }
}

fn push_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        if !ch.is_whitespace() {
            out.push(ch);
        } else if !out.is_empty() && !out.ends_with(|c: char| c == ' ' || c == '\n') {
            out.push(' ');
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_inline_markup() {
        let html = r#"<h1>Title</h1><p>Hello <b>there</b> <a href="http://x.y">link</a></p>"#;
        assert_eq!(html_to_text(html).unwrap(), "Title\nHello there link");
    }

    #[test]
    fn test_decodes_entities() {
        assert_eq!(
            html_to_text("<p>Fish &amp; chips &lt;3 &quot;caf&eacute;&quot;</p>").unwrap(),
            "Fish & chips <3 \"café\""
        );
    }

    #[test]
    fn test_line_breaks_and_lists() {
        let html = "<div>one<br>two</div>\n  <ul>\n <li>a</li>\n <li>b</li>\n</ul>";
        assert_eq!(html_to_text(html).unwrap(), "one\ntwo\na\nb");
    }

    #[test]
    fn test_skips_scripts_and_styles() {
        let html = "<html><head><title>T</title><style>p { color: red }</style></head>\
                    <body><script>alert(1)</script><p>visible</p></body></html>";
        assert_eq!(html_to_text(html).unwrap(), "visible");
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(html_to_text("just   text\n here").unwrap(), "just text here");
        assert_eq!(html_to_text("").unwrap(), "");
    }
}
