// ABOUTME: Integration tests for the glean CLI binary.
// ABOUTME: Tests selector queries, schema files, container lists, pagination and fetched input.

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::CommandCargoExt;
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Shop</title></head>
<body>
<h1>Catalog</h1>
<ul>
  <li class="p"><a href="/a">First</a><span class="price">$12</span></li>
  <li class="p"><a href="/b">Second</a><span class="price">$7</span></li>
</ul>
<div class="pager"><a href="/page/2">2</a><a href="">…</a></div>
</body>
</html>"#;

fn glean_cmd() -> Command {
    Command::cargo_bin("glean").unwrap()
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn single_selector_query() {
    let dir = TempDir::new().unwrap();
    let html = write(&dir, "page.html", PAGE);

    glean_cmd()
        .arg("--html")
        .arg(&html)
        .arg("--selector")
        .arg("//h1")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Catalog\""));
}

#[test]
fn multiple_attributes_with_css() {
    let dir = TempDir::new().unwrap();
    let html = write(&dir, "page.html", PAGE);

    let value = stdout_json(
        glean_cmd()
            .arg("--html")
            .arg(&html)
            .args(["--kind", "css", "--selector", "li.p a", "--attribute", "href", "--multiple"]),
    );
    assert_eq!(value, json!(["/a", "/b"]));
}

#[test]
fn count_and_exists() {
    let dir = TempDir::new().unwrap();
    let html = write(&dir, "page.html", PAGE);

    let count = stdout_json(glean_cmd().arg("--html").arg(&html).args(["--selector", "//li", "--count"]));
    assert_eq!(count, json!(2));

    let exists = stdout_json(
        glean_cmd()
            .arg("--html")
            .arg(&html)
            .args(["--selector", "table", "--kind", "css", "--exists"]),
    );
    assert_eq!(exists, json!(false));
}

#[test]
fn schema_list_with_base_url() {
    let dir = TempDir::new().unwrap();
    let html = write(&dir, "page.html", PAGE);
    let schema = write(
        &dir,
        "schema.json",
        r#"{
            "name": {"selector": "a/text()"},
            "url": {"selector": "a/@href", "transform": {"type": "absolute_url"}},
            "price": {"selector": ".price", "kind": "css",
                      "transform": [{"type": "replace", "pattern": "\\$", "with": ""}, {"type": "parse_int"}]}
        }"#,
    );

    let value = stdout_json(
        glean_cmd()
            .arg("--html")
            .arg(&html)
            .arg("--schema")
            .arg(&schema)
            .args(["--container", "li.p", "--kind", "css", "--base-url", "https://shop.example"]),
    );
    assert_eq!(
        value,
        json!([
            {"name": "First", "url": "https://shop.example/a", "price": 12},
            {"name": "Second", "url": "https://shop.example/b", "price": 7}
        ])
    );
}

#[test]
fn pagination_to_output_file() {
    let dir = TempDir::new().unwrap();
    let html = write(&dir, "page.html", PAGE);
    let out = dir.path().join("pages.json");

    glean_cmd()
        .arg("--html")
        .arg(&html)
        .args(["--pagination", "//div[@class='pager']/a"])
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    let value: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(value, json!([{"href": "/page/2", "text": "2"}]));
}

#[test]
fn invalid_schema_fails() {
    let dir = TempDir::new().unwrap();
    let html = write(&dir, "page.html", PAGE);
    let schema = write(&dir, "schema.json", r#"{"x": {"selector": "//a", "transform": {"type": "regex", "pattern": "("}}}"#);

    glean_cmd()
        .arg("--html")
        .arg(&html)
        .arg("--schema")
        .arg(&schema)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn missing_mode_fails() {
    let dir = TempDir::new().unwrap();
    let html = write(&dir, "page.html", PAGE);

    glean_cmd()
        .arg("--html")
        .arg(&html)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--selector"));
}

#[test]
fn fetch_mode_uses_url_as_base() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/list");
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body(PAGE);
    });

    let value = stdout_json(
        glean_cmd()
            .arg("--fetch")
            .arg(server.url("/list"))
            .args(["--pagination", "div.pager a", "--kind", "css", "--retries", "0"]),
    );
    mock.assert();
    assert_eq!(value, json!([{"href": server.url("/page/2"), "text": "2"}]));
}

#[test]
fn fetch_failure_exits_with_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/gone");
        then.status(410);
    });

    glean_cmd()
        .arg("--fetch")
        .arg(server.url("/gone"))
        .args(["--selector", "//h1", "--retries", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("status code 410"));
}
