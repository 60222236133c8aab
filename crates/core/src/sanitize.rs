use std::sync::LazyLock;

/// Structural HTML5 and embed tags allowed on top of ammonia's defaults.
const EXTRA_TAGS: &[&str] =
    &["article", "section", "main", "header", "footer", "figure", "figcaption", "iframe", "video", "audio", "source", "picture"];

static SANITIZER: LazyLock<ammonia::Builder<'static>> = LazyLock::new(|| {
    let mut builder = ammonia::Builder::default();
    builder
        .add_tags(EXTRA_TAGS.iter().copied())
        .add_generic_attributes(["class", "id"])
        .add_tag_attributes("iframe", ["src", "width", "height", "allowfullscreen", "frameborder"])
        .add_tag_attributes("video", ["src", "poster", "controls", "width", "height"])
        .add_tag_attributes("audio", ["src", "controls"])
        .add_tag_attributes("source", ["src", "srcset", "type", "media"])
        .add_tag_attributes("img", ["srcset", "sizes"])
        .link_rel(None);
    builder
});

/// Remove scripts, styles, event handlers and unknown markup from article HTML.
///
/// Classes, ids, structural HTML5 tags and iframes survive.
pub fn sanitize(html: &str) -> String {
    SANITIZER.clean(html).to_string()
}
