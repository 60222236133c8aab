//! Lenient markup clean-up run before a document is parsed for extraction.
//!
//! The pass streams the raw HTML through lol_html. Comments go away and
//! presentational tags are unwrapped or renamed to their semantic
//! counterparts. html5ever repairs the structure when the output is parsed
//! afterwards.

/// Clean `html`. Returns `None` when the rewriter rejects the input, in which
/// case the caller keeps the original markup.
pub fn tidy_html(html: &str) -> Option<String> {
    let mut output = String::with_capacity(html.len());
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            document_content_handlers: vec![lol_html::doc_comments!(|c| {
                c.remove();
                Ok(())
            })],
            element_content_handlers: vec![
                lol_html::element!("font, big", |el| {
                    el.remove_and_keep_content();
                    Ok(())
                }),
                lol_html::element!("center", |el| {
                    el.set_tag_name("div")?;
                    Ok(())
                }),
                lol_html::element!("b", |el| {
                    el.set_tag_name("strong")?;
                    Ok(())
                }),
                lol_html::element!("i", |el| {
                    el.set_tag_name("em")?;
                    Ok(())
                }),
            ],
            ..Default::default()
        },
        |c: &[u8]| {
            output.push_str(&String::from_utf8_lossy(c));
        },
    );

    if let Err(e) = rewriter.write(html.as_bytes()) {
        tracing::debug!(error = %e, "tidy pass failed");
        return None;
    }
    if let Err(e) = rewriter.end() {
        tracing::debug!(error = %e, "tidy pass failed");
        return None;
    }

    if output.is_empty() && !html.is_empty() { None } else { Some(output) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tidy_removes_comments() {
        let out = tidy_html("<p>a<!-- hidden -->b</p>").unwrap();
        assert_eq!(out, "<p>ab</p>");
    }

    #[test]
    fn test_tidy_renames_presentational_tags() {
        let out = tidy_html("<p><b>bold</b> and <i>italic</i></p><center>c</center>").unwrap();
        assert_eq!(out, "<p><strong>bold</strong> and <em>italic</em></p><div>c</div>");
    }

    #[test]
    fn test_tidy_unwraps_font() {
        let out = tidy_html(r#"<p><font color="red">warm</font> words</p>"#).unwrap();
        assert_eq!(out, "<p>warm words</p>");
    }

    #[test]
    fn test_tidy_empty_input() {
        assert_eq!(tidy_html(""), Some(String::new()));
    }
}
