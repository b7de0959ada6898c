use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn grog_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("grog"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove("GROG_CONFIG")
        .env_remove("GROG_ASSET_DIR")
        .env_remove("RUST_LOG");
    cmd
}

/// A small site: an index paginating a configured query, a post page and a
/// shared footer.
fn write_site(root: &Path) {
    let assets = root.join("assets");
    fs::create_dir_all(assets.join("partials")).expect("create assets");
    fs::write(
        assets.join("index.html"),
        "{query:recent-posts|pagination posts 2}\
<ul>{.repeated section posts-page}<li>{title|html} ({created|shortdate})</li>{.end}</ul>\n\
{.section posts-next-page}<a href=\"?posts-page={@}\">older</a>{.end}\n\
{.include partials/footer.html}",
    )
    .expect("write index");
    fs::write(
        assets.join("post.html"),
        "<h1>{model.title|html}</h1>{.repeated section model.tags}#{@|url}{.alternates with} {.end}",
    )
    .expect("write post");
    fs::write(assets.join("partials/footer.html"), "<footer>grog</footer>\n").expect("write footer");

    fs::write(
        root.join("config.yaml"),
        concat!(
            "assets: assets\n",
            "queries:\n",
            "  recent-posts:\n",
            "    rows:\n",
            "      - { title: \"Fish & chips\", created: 1700000000 }\n",
            "      - { title: Second, created: 1700086400 }\n",
            "      - { title: Third, created: nope }\n",
        ),
    )
    .expect("write config");
}

#[test]
fn render_paginates_configured_query() {
    let home = TempDir::new().expect("home");
    let site = TempDir::new().expect("site");
    write_site(site.path());

    grog_cmd(home.path())
        .arg("--config")
        .arg(site.path().join("config.yaml"))
        .args(["render", "index.html"])
        .assert()
        .success()
        .stdout(contains(
            "<li>Fish &amp; chips (November 14 2023)</li><li>Second (November 15 2023)</li>",
        ))
        .stdout(contains("<a href=\"?posts-page=2\">older</a>"))
        .stdout(contains("<footer>grog</footer>"));

    grog_cmd(home.path())
        .arg("--config")
        .arg(site.path().join("config.yaml"))
        .args(["render", "index.html", "--query", "posts-page=2"])
        .assert()
        .success()
        .stdout(contains("<li>Third (nope)</li>"))
        .stdout(contains("older").not());
}

#[test]
fn render_binds_data_file_as_model() {
    let home = TempDir::new().expect("home");
    let site = TempDir::new().expect("site");
    write_site(site.path());
    let data = site.path().join("post.yaml");
    fs::write(&data, "title: \"Tom & Jerry\"\ntags: [rust lang, web]\n").expect("write data");
    let out = site.path().join("out.html");

    grog_cmd(home.path())
        .arg("--assets")
        .arg(site.path().join("assets"))
        .args(["render", "post.html", "--data"])
        .arg(&data)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    let written = fs::read_to_string(&out).expect("read output");
    assert_eq!(written, "<h1>Tom &amp; Jerry</h1>#rust+lang #web");
}

#[test]
fn render_reports_missing_template() {
    let home = TempDir::new().expect("home");
    let site = TempDir::new().expect("site");
    write_site(site.path());

    grog_cmd(home.path())
        .env("GROG_ASSET_DIR", site.path().join("assets"))
        .args(["render", "missing.html"])
        .assert()
        .failure()
        .stderr(contains("missing.html"));
}

#[test]
fn check_passes_on_a_clean_site() {
    let home = TempDir::new().expect("home");
    let site = TempDir::new().expect("site");
    write_site(site.path());

    grog_cmd(home.path())
        .env("GROG_CONFIG", site.path().join("config.yaml"))
        .arg("check")
        .assert()
        .success()
        .stdout(contains("✓ index.html"))
        .stdout(contains("✓ partials/footer.html"))
        .stdout(contains("3 templates OK"));
}

#[test]
fn check_fails_on_broken_template() {
    let home = TempDir::new().expect("home");
    let site = TempDir::new().expect("site");
    write_site(site.path());
    fs::write(
        site.path().join("assets/broken.html"),
        "fine\n{.section model}never closed",
    )
    .expect("write broken");

    grog_cmd(home.path())
        .arg("--config")
        .arg(site.path().join("config.yaml"))
        .arg("check")
        .assert()
        .failure()
        .stdout(contains("✗ broken.html"))
        .stdout(contains("✓ post.html"))
        .stderr(contains("1 of 4 templates failed to compile"));

    let output = grog_cmd(home.path())
        .arg("--config")
        .arg(site.path().join("config.yaml"))
        .args(["check", "broken.html", "--json"])
        .output()
        .expect("run check --json");
    assert!(!output.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("check --json prints JSON");
    assert_eq!(report["failed"], 1);
    assert_eq!(report["templates"][0]["name"], "broken.html");
    assert_eq!(report["templates"][0]["line"], 2);
}

#[test]
fn missing_asset_directory_is_reported() {
    let home = TempDir::new().expect("home");
    let site = TempDir::new().expect("site");

    grog_cmd(home.path())
        .current_dir(site.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(contains("asset directory").and(contains("does not exist")));
}

#[test]
fn malformed_cookie_is_rejected() {
    let home = TempDir::new().expect("home");
    let site = TempDir::new().expect("site");
    write_site(site.path());

    grog_cmd(home.path())
        .arg("--assets")
        .arg(site.path().join("assets"))
        .args(["render", "post.html", "--cookie", "theme=dark", "--cookie", "bad"])
        .assert()
        .failure()
        .stderr(contains("NAME=VALUE"));
}
