use sxd_document::dom::{ChildOfElement, Document, Element, ParentOfChild};

/// Lowercase local name of an element.
pub fn tag_name<'d>(el: Element<'d>) -> &'d str {
    el.name().local_part()
}

pub fn is_element_named(el: Element<'_>, names: &[&str]) -> bool {
    let name = tag_name(el);
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}

pub fn child_elements(el: Element<'_>) -> Vec<Element<'_>> {
    el.children().into_iter().filter_map(|c| c.element()).collect()
}

/// All descendant elements of `el` in document order, excluding `el` itself.
pub fn descendant_elements(el: Element<'_>) -> Vec<Element<'_>> {
    let mut out = Vec::new();
    let mut stack: Vec<Element<'_>> = child_elements(el).into_iter().rev().collect();
    while let Some(current) = stack.pop() {
        out.push(current);
        stack.extend(child_elements(current).into_iter().rev());
    }
    out
}

/// Descendants of `el` (and `el` itself) whose tag is one of `names`, in document order.
pub fn elements_by_tag<'d>(el: Element<'d>, names: &[&str]) -> Vec<Element<'d>> {
    std::iter::once(el)
        .chain(descendant_elements(el))
        .filter(|e| is_element_named(*e, names))
        .collect()
}

/// Element ancestors, nearest first.
pub fn ancestors(el: Element<'_>) -> Vec<Element<'_>> {
    let mut out = Vec::new();
    let mut current = el.parent().and_then(|p| p.element());
    while let Some(parent) = current {
        out.push(parent);
        current = parent.parent().and_then(|p| p.element());
    }
    out
}

pub fn has_ancestor(el: Element<'_>, ancestor: Element<'_>) -> bool {
    ancestors(el).contains(&ancestor)
}

/// Replace `el` with its children.
pub fn unwrap_element(el: Element<'_>) {
    let Some(ParentOfChild::Element(parent)) = el.parent() else {
        return;
    };
    let mut children = Vec::new();
    for child in parent.children() {
        if child == ChildOfElement::Element(el) {
            children.extend(el.children());
        } else {
            children.push(child);
        }
    }
    parent.replace_children(children);
}

/// Insert `node` immediately before `reference`.
pub fn insert_before<'d>(reference: Element<'d>, node: impl Into<ChildOfElement<'d>>) {
    let Some(ParentOfChild::Element(parent)) = reference.parent() else {
        return;
    };
    let node = node.into();
    let mut children = Vec::new();
    for child in parent.children() {
        if child == node {
            continue;
        }
        if child == ChildOfElement::Element(reference) {
            children.push(node);
        }
        children.push(child);
    }
    parent.replace_children(children);
}

/// Detach `el` from its parent.
pub fn remove_element(el: Element<'_>) {
    if let Some(ParentOfChild::Element(parent)) = el.parent() {
        parent.remove_child(el);
    }
}

/// Rename an element in place.
pub fn rename(el: Element<'_>, name: &str) {
    el.set_name(name);
}

/// Remove every direct child of `el` for which `predicate` holds.
pub fn remove_children_matching<'d>(el: Element<'d>, predicate: impl Fn(&ChildOfElement<'d>) -> bool) {
    for child in el.children() {
        if predicate(&child) {
            el.remove_child(child);
        }
    }
}

/// Deep-copy `source` (which may live in another document) into `doc`.
///
/// The copy is detached; the caller appends it where needed.
pub fn import_element<'d>(doc: Document<'d>, source: Element<'_>) -> Element<'d> {
    let copy = shallow_copy(doc, source);
    let mut stack = vec![(source, copy)];
    while let Some((from, to)) = stack.pop() {
        for child in from.children() {
            match child {
                ChildOfElement::Element(e) => {
                    let c = shallow_copy(doc, e);
                    to.append_child(c);
                    stack.push((e, c));
                }
                ChildOfElement::Text(t) => to.append_child(doc.create_text(t.text())),
                ChildOfElement::Comment(c) => to.append_child(doc.create_comment(c.text())),
                ChildOfElement::ProcessingInstruction(_) => {}
            }
        }
    }
    copy
}

fn shallow_copy<'d>(doc: Document<'d>, source: Element<'_>) -> Element<'d> {
    let copy = doc.create_element(source.name().local_part());
    for attr in source.attributes() {
        copy.set_attribute_value(attr.name().local_part(), attr.value());
    }
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Dom, inner_html, outer_html};

    #[test]
    fn test_descendants_in_document_order() {
        let dom = Dom::parse_fragment("<div><p>a</p><span><i>b</i></span></div><b>c</b>");
        let names: Vec<_> = descendant_elements(dom.root_element().unwrap()).into_iter().map(tag_name).collect();
        assert_eq!(names, vec!["div", "p", "span", "i", "b"]);
    }

    #[test]
    fn test_unwrap_element_keeps_position() {
        let dom = Dom::parse_fragment("<p>x</p><a href='#'>one <b>two</b></a><p>y</p>");
        let root = dom.root_element().unwrap();
        unwrap_element(elements_by_tag(root, &["a"])[0]);
        assert_eq!(inner_html(root), "<p>x</p>one <b>two</b><p>y</p>");
    }

    #[test]
    fn test_insert_before() {
        let dom = Dom::parse_fragment("<p>a</p><p>b</p>");
        let root = dom.root_element().unwrap();
        let second = elements_by_tag(root, &["p"])[1];
        let hr = dom.document().create_element("hr");
        insert_before(second, hr);
        assert_eq!(inner_html(root), "<p>a</p><hr><p>b</p>");
    }

    #[test]
    fn test_import_element_across_documents() {
        let source = Dom::parse_fragment(r#"<div id="x"><p>keep <em>me</em></p><!--note--></div>"#);
        let target = Dom::with_root("section");
        let div = elements_by_tag(source.root_element().unwrap(), &["div"])[1];
        let copy = import_element(target.document(), div);
        target.root_element().unwrap().append_child(copy);

        assert_eq!(outer_html(target.root_element().unwrap()), r#"<section><div id="x"><p>keep <em>me</em></p><!--note--></div></section>"#);
        assert_eq!(elements_by_tag(source.root_element().unwrap(), &["p"]).len(), 1);
    }

    #[test]
    fn test_ancestors_and_has_ancestor() {
        let dom = Dom::parse_fragment("<article><section><p>t</p></section></article>");
        let root = dom.root_element().unwrap();
        let p = elements_by_tag(root, &["p"])[0];
        let article = elements_by_tag(root, &["article"])[0];
        assert_eq!(ancestors(p).len(), 3);
        assert!(has_ancestor(p, article));
        assert!(!has_ancestor(article, p));
    }
}
