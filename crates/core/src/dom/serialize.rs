use sxd_document::dom::{ChildOfElement, Element};

const VOID_ELEMENTS: &[&str] =
    &["area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr"];

/// Elements whose text children html5ever reads verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "xmp", "iframe", "noembed", "noframes", "noscript", "plaintext"];

enum Step<'d> {
    Node(ChildOfElement<'d>, bool),
    Close(&'d str),
}

/// Serialize an element including its own tag.
pub fn outer_html(el: Element<'_>) -> String {
    let mut out = String::new();
    write_nodes(&mut out, vec![ChildOfElement::Element(el)], false);
    out
}

/// Serialize the children of an element.
pub fn inner_html(el: Element<'_>) -> String {
    let mut out = String::new();
    let raw = RAW_TEXT_ELEMENTS.contains(&el.name().local_part());
    write_nodes(&mut out, el.children(), raw);
    out
}

/// Concatenated text of every descendant text node.
pub fn text_content(el: Element<'_>) -> String {
    let mut out = String::new();
    let mut stack: Vec<ChildOfElement<'_>> = el.children().into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        match node {
            ChildOfElement::Text(t) => out.push_str(t.text()),
            ChildOfElement::Element(e) => stack.extend(e.children().into_iter().rev()),
            _ => {}
        }
    }
    out
}

fn write_nodes(out: &mut String, nodes: Vec<ChildOfElement<'_>>, raw: bool) {
    let mut stack: Vec<Step<'_>> = nodes.into_iter().rev().map(|n| Step::Node(n, raw)).collect();

    while let Some(step) = stack.pop() {
        match step {
            Step::Close(name) => {
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            Step::Node(ChildOfElement::Text(t), raw) => {
                if raw {
                    out.push_str(t.text());
                } else {
                    escape_text(out, t.text());
                }
            }
            Step::Node(ChildOfElement::Comment(c), _) => {
                out.push_str("<!--");
                out.push_str(c.text());
                out.push_str("-->");
            }
            Step::Node(ChildOfElement::ProcessingInstruction(_), _) => {}
            Step::Node(ChildOfElement::Element(e), _) => {
                let name = e.name().local_part();
                out.push('<');
                out.push_str(name);
                for attr in e.attributes() {
                    out.push(' ');
                    out.push_str(attr.name().local_part());
                    out.push_str("=\"");
                    escape_attr(out, attr.value());
                    out.push('"');
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&name) {
                    continue;
                }
                let raw = RAW_TEXT_ELEMENTS.contains(&name);
                stack.push(Step::Close(name));
                stack.extend(e.children().into_iter().rev().map(|c| Step::Node(c, raw)));
            }
        }
    }
}

fn escape_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}
