use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use folio_core::dom::Dom;
use folio_core::postprocess::assemble;
use folio_core::{ConfigParser, ContentExtractor, ContentLinks, ExtractorConfig, SiteConfig, sanitize};
use url::Url;

/// A synthetic article page with `paragraphs` paragraphs surrounded by boilerplate.
fn article(paragraphs: usize) -> String {
    let mut html = String::from(
        r#"<html><head><title>Benchmark article</title><meta name="author" content="Ann Writer"></head><body>
<nav><ul><li><a href="/">Home</a></li><li><a href="/news">News</a></li></ul></nav>
<div class="sidebar"><a href="/a">Related</a> <a href="/b">Popular</a></div>
<article class="post"><h1>Benchmark article</h1><div class="entry-content">"#,
    );
    for i in 0..paragraphs {
        html.push_str(&format!(
            "<p>Paragraph {} of the benchmark article, with enough prose to look like content, \
             a <a href=\"/link/{}\">relative link</a>, and a few commas, to feed the scorer.</p>",
            i, i
        ));
    }
    html.push_str("</div></article><footer>Copyright</footer></body></html>");
    html
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for size in [10, 100, 1000] {
        let html = article(size);
        group.bench_with_input(BenchmarkId::new("paragraphs", size), &html, |b, html| {
            b.iter(|| Dom::parse_html(black_box(html)))
        });
    }

    group.finish();
}

fn bench_extraction(c: &mut Criterion) {
    let url = Url::parse("https://example.com/post").unwrap();
    let autodetect = SiteConfig::default();
    let rules = ConfigParser::parse_string("title: //h1\nbody: //div[@class='entry-content']\n").unwrap();

    let mut group = c.benchmark_group("extract");

    for size in [10, 100] {
        let html = article(size);
        group.bench_with_input(BenchmarkId::new("readability", size), &html, |b, html| {
            b.iter(|| {
                let mut extractor = ContentExtractor::new(ExtractorConfig::default());
                extractor.process(black_box(html), &url, &autodetect, false)
            })
        });
        group.bench_with_input(BenchmarkId::new("site_rules", size), &html, |b, html| {
            b.iter(|| {
                let mut extractor = ContentExtractor::new(ExtractorConfig::default());
                extractor.process(black_box(html), &url, &rules, false)
            })
        });
    }

    group.finish();
}

fn bench_finish(c: &mut Criterion) {
    let url = Url::parse("https://example.com/post").unwrap();
    let mut extractor = ContentExtractor::new(ExtractorConfig::default());
    extractor.process(&article(100), &url, &SiteConfig::default(), false);
    let body = extractor.into_content().body.unwrap_or_default();

    c.bench_function("assemble_and_sanitize", |b| {
        b.iter(|| sanitize(&assemble(black_box(&body), Some(&url), ContentLinks::Footnotes)))
    });
}

criterion_group!(benches, bench_parse, bench_extraction, bench_finish);
criterion_main!(benches);
