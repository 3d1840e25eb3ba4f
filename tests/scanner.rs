use std::fs;
use std::path::Path;
use tempfile::TempDir;

use file_catalog::config::Config;
use file_catalog::scanner::Scanner;
use file_catalog_core::formats::ScanMode;
use file_catalog_core::record::{FileKind, FilePayload};

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn write_png(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    image::RgbImage::from_pixel(8, 8, image::Rgb([200, 10, 10]))
        .save(path)
        .unwrap();
}

fn scanner(tmp: &TempDir) -> Scanner {
    Scanner::new(&Config::new(
        tmp.path().join("catalog.sqlite"),
        tmp.path().join("storage"),
    ))
    .unwrap()
}

fn sample_tree(root: &Path) {
    write(&root.join("README.md"), b"# Title\n\nBody");
    write(&root.join("data/config.json"), b"{\"a\": 1}");
    write(&root.join("notes/todo.txt"), b"one\ntwo\n");
    write_png(&root.join("pics/red.png"));
}

#[tokio::test]
async fn unchanged_tree_scans_to_identical_ids() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("tree");
    sample_tree(&root);

    let s = scanner(&tmp);
    let first = s.scan(&root, ScanMode::All).await.unwrap();
    let second = s.scan(&root, ScanMode::All).await.unwrap();

    assert_eq!(first.records.len(), 4);
    assert_eq!(first.record_ids(), second.record_ids());
    assert!(first.skipped.is_empty());
}

#[tokio::test]
async fn changed_content_gets_a_new_id() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("tree");
    write(&root.join("a.txt"), b"before");

    let s = scanner(&tmp);
    let before = s.scan(&root, ScanMode::All).await.unwrap();
    write(&root.join("a.txt"), b"after");
    let after = s.scan(&root, ScanMode::All).await.unwrap();

    assert_ne!(before.records[0].id(), after.records[0].id());
    assert_eq!(before.records[0].path(), after.records[0].path());
}

#[tokio::test]
async fn ignored_parts_and_extensions_are_never_visited() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("tree");
    write(&root.join("index.js"), b"console.log(1)");
    write(&root.join("node_modules/left-pad/SENTINEL.txt"), b"never");
    write(&root.join("__pycache__/mod.cpython-311.pyc"), b"\0\0");
    write(&root.join("src/mod.pyc"), b"\0\0");
    write(&root.join("src/mod.py"), b"print(1)");

    let result = scanner(&tmp).scan(&root, ScanMode::All).await.unwrap();
    let paths: Vec<&str> = result
        .records
        .iter()
        .map(|r| r.path().full.as_str())
        .collect();

    assert_eq!(result.records.len(), 2);
    assert!(paths.iter().all(|p| !p.contains("SENTINEL")));
    assert!(paths.iter().all(|p| !p.ends_with(".pyc")));
}

#[tokio::test]
async fn corrupt_image_is_skipped_and_scan_continues() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("tree");
    write(&root.join("a_broken.png"), b"definitely not a png");
    write_png(&root.join("b_good.png"));
    write(&root.join("c.md"), b"still here");

    let result = scanner(&tmp).scan(&root, ScanMode::All).await.unwrap();

    assert_eq!(result.records.len(), 2);
    assert_eq!(result.skipped.len(), 1);
    assert!(result.skipped[0].path.ends_with("a_broken.png"));

    let image = &result.records[0];
    assert_eq!(image.kind(), FileKind::Image);
    match image.payload() {
        FilePayload::Image(img) => {
            assert_eq!((img.width, img.height), (8, 8));
            assert_eq!(img.format, "png");
            assert!(!img.thumbnail.is_empty());
        }
        other => panic!("expected image payload, got {:?}", other.kind()),
    }
}

#[tokio::test]
async fn mode_filter_limits_kinds() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("tree");
    sample_tree(&root);

    let s = scanner(&tmp);
    let images = s.scan(&root, ScanMode::Image).await.unwrap();
    assert_eq!(images.records.len(), 1);
    assert_eq!(images.records[0].kind(), FileKind::Image);

    let docs = s.scan(&root, ScanMode::Docs).await.unwrap();
    let kinds: Vec<FileKind> = docs.records.iter().map(|r| r.kind()).collect();
    assert_eq!(kinds, vec![FileKind::Text, FileKind::Text]);
}

#[tokio::test]
async fn blank_lines_are_kept_in_text_records() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("tree");
    write(&root.join("note.md"), b"# Title\n\nBody");

    let result = scanner(&tmp).scan(&root, ScanMode::All).await.unwrap();
    let lines = result.records[0].lines().unwrap();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].is_empty);
    assert_eq!(lines[2].content, "Body");
}
