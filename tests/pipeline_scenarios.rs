// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! End-to-end pipeline behaviour on real files

use chrono::{DateTime, FixedOffset, TimeZone};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assetflow::notifier::{Level, MemoryNotifier};
use assetflow::sourcemap::SourceMap;
use assetflow::watch::{OverlapPolicy, TaskScheduler, WatchBindings};
use assetflow::{BuildFile, Runner};

const BUILD: &str = r#"
banner: "/*! {{ pkg.name }} v{{ pkg.version }} ({{ date }}) */\n"
tasks:
  scripts:
    src: js/src/*.js
    stages:
      - type: concat
        file: app.js
      - type: banner
      - type: dest
        dir: js
      - type: rename
        file: app.min.js
      - type: minify
      - type: banner
      - type: sourcemaps
        dir: maps
        source_root: /js/src
      - type: dest
        dir: js

  banner-then-minify:
    src: js/src/a.js
    stages:
      - type: banner
      - type: minify
      - type: dest
        dir: order/first

  minify-then-banner:
    src: js/src/a.js
    stages:
      - type: minify
      - type: banner
      - type: dest
        dir: order/second

  plugin-styles:
    src: css/plugins/*.css
    stages:
      - type: concat
        file: plugins.min.css
      - type: minify
      - type: dest
        dir: css

  site-styles:
    src: css/site/*.css
    stages:
      - type: concat
        file: site.css
      - type: autoprefix
        browsers:
          safari: "5"
      - type: minify
      - type: sourcemaps
        dir: maps
      - type: dest
        dir: out/site

  styles:
    src: css/**/*.scss
    stages:
      - type: compile
        command: sh
        args: ['-c', 'f=$(cat); n=$(printf "%s\n" "$f" | grep -n "@@" | cut -d: -f1 | head -n 1); if [ -n "$n" ]; then echo "Error: unexpected @@" >&2; echo "line $n" >&2; exit 1; fi; printf "%s" "$f"']
        extension: css
        label: FakeSass
      - type: dest
        dir: out/css
"#;

fn build_date() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
        .unwrap()
}

fn write(dir: &Path, path: &str, text: &str) {
    let full = dir.join(path);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(full, text).unwrap();
}

fn read(dir: &Path, path: &str) -> String {
    std::fs::read_to_string(dir.join(path)).unwrap()
}

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "package.json", r#"{ "name": "demo", "version": "1.2.3" }"#);
    write(dir.path(), "js/src/a.js", "var x = 1;");
    write(dir.path(), "js/src/b.js", "var y = 2;");
    dir
}

fn runner(dir: &Path) -> (Runner, MemoryNotifier) {
    let notifier = MemoryNotifier::new();
    let runner = Runner::builder(BuildFile::from_yaml(BUILD).unwrap(), dir)
        .notifier(Arc::new(notifier.clone()))
        .timestamp(build_date())
        .build()
        .unwrap();
    (runner, notifier)
}

const BANNER: &str = "/*! demo v1.2.3 (2024-01-02 03:04:05 +0000) */\n";

#[tokio::test]
async fn test_scripts_concat_and_minify_after_banner() {
    let dir = project();
    let (runner, _) = runner(dir.path());

    runner.run("scripts").await.unwrap();

    let app = read(dir.path(), "js/app.js");
    assert_eq!(app, format!("{}var x = 1;\nvar y = 2;", BANNER));

    let min = read(dir.path(), "js/app.min.js");
    assert!(min.starts_with(&format!("{}var x=1;var y=2;", BANNER)), "{}", min);
    assert!(min.ends_with("\n//# sourceMappingURL=maps/app.min.js.map"));

    let app_code = app.strip_prefix(BANNER).unwrap();
    let min_code = min.strip_prefix(BANNER).unwrap().lines().next().unwrap();
    assert!(min_code.len() < app_code.len());
}

#[tokio::test]
async fn test_source_map_resolves_to_original_file() {
    let dir = project();
    let (runner, _) = runner(dir.path());
    runner.run("scripts").await.unwrap();

    let map: SourceMap = serde_json::from_str(&read(dir.path(), "js/maps/app.min.js.map")).unwrap();
    assert_eq!(map.version, 3);
    assert_eq!(map.file, "app.min.js");
    assert_eq!(map.source_root.as_deref(), Some("/js/src"));
    assert!(map.sources_content.is_none());

    // Line 1 holds the minified code, right after the one-line banner
    let x = map.lookup(1, 0).unwrap().unwrap();
    assert!(x.source.ends_with("a.js"), "{:?}", x);
    assert_eq!(x.line, 0);

    let y = map.lookup(1, 10).unwrap().unwrap();
    assert!(y.source.ends_with("b.js"), "{:?}", y);
    assert_eq!(y.line, 0);

    assert!(map.lookup(0, 3).unwrap().is_none());
}

#[tokio::test]
async fn test_runs_are_idempotent() {
    let dir = project();
    let (runner, _) = runner(dir.path());

    runner.run("scripts").await.unwrap();
    let first: Vec<String> = ["js/app.js", "js/app.min.js", "js/maps/app.min.js.map"]
        .iter()
        .map(|p| read(dir.path(), p))
        .collect();
    let modified = std::fs::metadata(dir.path().join("js/app.js"))
        .unwrap()
        .modified()
        .unwrap();

    runner.run("scripts").await.unwrap();
    let second: Vec<String> = ["js/app.js", "js/app.min.js", "js/maps/app.min.js.map"]
        .iter()
        .map(|p| read(dir.path(), p))
        .collect();

    assert_eq!(first, second);
    // Unchanged output is not rewritten
    assert_eq!(
        std::fs::metadata(dir.path().join("js/app.js"))
            .unwrap()
            .modified()
            .unwrap(),
        modified
    );
}

#[tokio::test]
async fn test_stage_order_changes_output() {
    let dir = project();
    let (runner, _) = runner(dir.path());

    runner.run("banner-then-minify").await.unwrap();
    runner.run("minify-then-banner").await.unwrap();

    // The minifier drops the banner comment when it runs second
    assert_eq!(read(dir.path(), "order/first/a.js"), "var x=1;");
    assert_eq!(
        read(dir.path(), "order/second/a.js"),
        format!("{}var x=1;", BANNER)
    );
}

#[tokio::test]
async fn test_files_outside_globs_are_untouched() {
    let dir = project();
    write(dir.path(), "js/src/nested/c.js", "var nested = 3;");
    write(dir.path(), "js/other/d.js", "var other = 4;");
    let (runner, _) = runner(dir.path());

    runner.run("scripts").await.unwrap();

    let app = read(dir.path(), "js/app.js");
    assert!(!app.contains("nested"));
    assert!(!app.contains("other"));
    assert!(!dir.path().join("js/nested").exists());
    assert!(!dir.path().join("js/other/app.js").exists());
    assert_eq!(read(dir.path(), "js/other/d.js"), "var other = 4;");
}

#[tokio::test]
async fn test_compile_error_names_file_and_line() {
    let dir = project();
    write(dir.path(), "css/site.scss", "a {\n  color: red;\n}");
    write(dir.path(), "css/parts/bad.scss", "b {\n  margin: 0;\n  @@\n}");
    let (runner, notifier) = runner(dir.path());

    let err = runner.run("styles").await.unwrap_err();
    assert_eq!(err.task(), Some("styles"));

    let errors = notifier.at_level(Level::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].file.as_deref(), Some(Path::new("css/parts/bad.scss")));
    assert_eq!(errors[0].line, Some(3));

    let message = &errors[0].message;
    assert!(message.starts_with("Error compiling FakeSass in task 'styles'."), "{}", message);
    assert!(message.contains("File: css/parts/bad.scss"));
    assert!(message.contains("Line: 3"));
    assert!(message.contains("unexpected @@"));
}

#[tokio::test]
async fn test_script_syntax_error_names_source_file_and_line() {
    let dir = project();
    write(dir.path(), "js/src/a.js", "var x = 1;\nvar y = 2;\nvar s = 'broken;\n");
    let (runner, notifier) = runner(dir.path());

    let err = runner.run("scripts").await.unwrap_err();
    assert_eq!(err.task(), Some("scripts"));

    let errors = notifier.at_level(Level::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].file.as_deref(), Some(Path::new("js/src/a.js")));
    assert_eq!(errors[0].line, Some(3));
    assert!(errors[0].message.contains("unterminated string"), "{}", errors[0].message);
    assert!(!dir.path().join("js/app.min.js").exists());
}

#[tokio::test]
async fn test_compile_success_and_partials() {
    let dir = project();
    write(dir.path(), "css/site.scss", "a { color: red; }");
    write(dir.path(), "css/_vars.scss", "$c: red;");
    let (runner, _) = runner(dir.path());

    runner.run("styles").await.unwrap();

    assert_eq!(read(dir.path(), "out/css/site.css"), "a { color: red; }");
    assert!(!dir.path().join("out/css/_vars.css").exists());
}

#[tokio::test]
async fn test_plugin_styles_minified() {
    let dir = project();
    write(dir.path(), "css/plugins/a.css", "a {\n  color: red;\n}\n");
    write(dir.path(), "css/plugins/b.css", "/* note */\nb {\n  color: blue;\n}\n");
    let (runner, _) = runner(dir.path());

    runner.run("plugin-styles").await.unwrap();

    let css = read(dir.path(), "css/plugins.min.css");
    assert!(css.starts_with("a{color:red}"), "{}", css);
    assert!(css.contains("b{color:"));
    assert!(!css.contains("note"));
}

#[tokio::test]
async fn test_style_map_resolves_rules_to_their_files() {
    let dir = project();
    write(dir.path(), "css/site/a.css", "a {\n  color: red;\n}\n");
    write(
        dir.path(),
        "css/site/b.css",
        "b {\n  margin: 0;\n}\n\n.c {\n  user-select: none;\n}\n",
    );
    let (runner, _) = runner(dir.path());

    runner.run("site-styles").await.unwrap();

    let css = read(dir.path(), "out/site/site.css");
    let code = css.lines().next().unwrap();
    let map: SourceMap = serde_json::from_str(&read(dir.path(), "out/site/maps/site.css.map")).unwrap();

    let a = map.lookup(0, code.find("a{").unwrap() as u32).unwrap().unwrap();
    assert!(a.source.ends_with("a.css"), "{:?}", a);
    assert_eq!(a.line, 0);

    let b = map.lookup(0, code.find("b{").unwrap() as u32).unwrap().unwrap();
    assert!(b.source.ends_with("b.css"), "{:?}", b);
    assert_eq!(b.line, 0);

    let c = map.lookup(0, code.find(".c{").unwrap() as u32).unwrap().unwrap();
    assert!(c.source.ends_with("b.css"), "{:?}", c);
    assert_eq!(c.line, 4);
}

#[tokio::test]
async fn test_disjoint_watch_triggers_run_independently() {
    let dir = project();
    write(dir.path(), "css/plugins/a.css", "a { color: red; }");
    let (runner, notifier) = runner(dir.path());

    let build = BuildFile::from_yaml(BUILD).unwrap();
    let bindings = WatchBindings::from_build(&build, &["scripts".into(), "plugin-styles".into()]).unwrap();

    let changed: Vec<PathBuf> = vec![
        dir.path().join("js/src/a.js"),
        dir.path().join("css/plugins/a.css"),
        dir.path().join("README.md"),
    ];
    let tasks = bindings.tasks_for_changes(&changed, dir.path());
    assert_eq!(tasks.len(), 2);
    assert!(tasks.contains(&"scripts".to_string()));
    assert!(tasks.contains(&"plugin-styles".to_string()));

    let scheduler = TaskScheduler::new(runner, OverlapPolicy::Queue);
    for task in &tasks {
        scheduler.trigger(task);
    }
    scheduler.idle().await;

    assert!(dir.path().join("js/app.min.js").exists());
    assert!(dir.path().join("css/plugins.min.css").exists());
    assert!(notifier.at_level(Level::Error).is_empty());
}
