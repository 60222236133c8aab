//! CLI integration tests
use httpmock::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

const ARTICLE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><title>Hello Folio | Example</title></head>
<body>
  <nav><a href="/">Home</a></nav>
  <h1 class="headline">Hello Folio</h1>
  <div id="article">
    <p>Readable articles are extracted from noisy pages with per-site rules.</p>
    <p>Links such as <a href="/more">this one</a> are resolved against the page.</p>
  </div>
  <footer>Copyright</footer>
</body>
</html>"#;

fn cmd() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("folio")
}

/// A mock server with one article page and a site config directory for it.
fn setup() -> (MockServer, TempDir) {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/article");
        then.status(200).header("content-type", "text/html; charset=utf-8").body(ARTICLE);
    });
    server.mock(|when, then| {
        when.method(GET).path("/archive.zip");
        then.status(200).header("content-type", "application/zip").body("PK");
    });

    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("127.0.0.1.txt"),
        "title: //h1[@class='headline']\nbody: //div[@id='article']\n",
    )
    .unwrap();
    (server, dir)
}

fn base_args(dir: &TempDir) -> Vec<String> {
    vec![
        "--allow-private".to_string(),
        "--site-config".to_string(),
        dir.path().display().to_string(),
    ]
}

#[test]
fn test_cli_html_format() {
    let (server, dir) = setup();
    cmd()
        .args(base_args(&dir))
        .arg(server.url("/article"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Readable articles are extracted"))
        .stdout(predicate::str::contains(format!("href=\"{}\"", server.url("/more"))))
        .stdout(predicate::str::contains("Copyright").not());
}

#[test]
fn test_cli_json_format() {
    let (server, dir) = setup();
    let output = cmd()
        .args(base_args(&dir))
        .args(["-f", "json"])
        .arg(server.url("/article"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], 200);
    assert_eq!(json["title"], "Hello Folio");
    assert_eq!(json["url"], server.url("/article"));
    assert_eq!(json["native_ad"], false);
    assert!(json["summary"].as_str().unwrap().starts_with("Readable articles"));
}

#[test]
fn test_cli_text_format() {
    let (server, dir) = setup();
    cmd()
        .args(base_args(&dir))
        .args(["-f", "text"])
        .arg(server.url("/article"))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Hello Folio\n==========="))
        .stdout(predicate::str::contains("<p>").not());
}

#[test]
fn test_cli_markdown_format() {
    let (server, dir) = setup();
    cmd()
        .args(base_args(&dir))
        .args(["-f", "markdown"])
        .arg(server.url("/article"))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("+++"))
        .stdout(predicate::str::contains("title = \"Hello Folio\""))
        .stdout(predicate::str::contains("# Hello Folio"));
}

#[test]
fn test_cli_content_links_remove() {
    let (server, dir) = setup();
    cmd()
        .args(base_args(&dir))
        .args(["--content-links", "remove"])
        .arg(server.url("/article"))
        .assert()
        .success()
        .stdout(predicate::str::contains("this one"))
        .stdout(predicate::str::contains("<a ").not());
}

#[test]
fn test_cli_output_file() {
    let (server, dir) = setup();
    let output = dir.path().join("output.html");

    cmd()
        .args(base_args(&dir))
        .args(["-o", output.to_str().unwrap()])
        .arg(server.url("/article"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Output written to"));

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.contains("Readable articles"));
}

#[test]
fn test_cli_config_file() {
    let (server, dir) = setup();
    let config = dir.path().join("folio.json");
    std::fs::write(&config, r#"{"blocked_urls": ["/article"]}"#).unwrap();

    cmd()
        .args(base_args(&dir))
        .arg("--config")
        .arg(&config)
        .arg(server.url("/article"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("blocked"));
}

#[test]
fn test_cli_invalid_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("folio.json");
    std::fs::write(&config, r#"{"max_pages": 0}"#).unwrap();

    cmd()
        .arg("--config")
        .arg(&config)
        .arg("https://example.com/")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_cli_excluded_content_type() {
    let (server, dir) = setup();
    cmd()
        .args(base_args(&dir))
        .arg(server.url("/archive.zip"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("application/zip"));
}

#[test]
fn test_cli_private_address_rejected_by_default() {
    let (server, _dir) = setup();
    cmd().arg(server.url("/article")).assert().failure();
}

#[test]
fn test_cli_invalid_url() {
    cmd().arg("http://").assert().failure().stderr(predicate::str::contains("Invalid URL"));
}

#[test]
fn test_cli_invalid_format() {
    cmd().args(["-f", "pdf", "https://example.com/"]).assert().failure();
}

#[test]
fn test_cli_verbose() {
    let (server, dir) = setup();
    cmd()
        .args(base_args(&dir))
        .arg("-v")
        .arg(server.url("/article"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Folio"))
        .stderr(predicate::str::contains("Title:"));
}
