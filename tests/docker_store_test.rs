//! Drives `DockerStore` against a scripted stand-in for the `docker` CLI.
#![cfg(unix)]

use anyhow::Result;
use std::fs;
use std::os::unix::fs::PermissionsExt;

use image_du::{DiskUsageProcessor, DockerStore, ImagesOptions, Notifier, Store, StoreError};

// Lists an image twice (two tags) and one image removed before it could be inspected
const FAKE_DOCKER: &str = r#"#!/bin/sh
case "$*" in
    version*)
        echo "27.3.1" ;;
    "image ls --quiet --no-trunc")
        printf 'sha256:aaa\nsha256:gone\nsha256:aaa\n' ;;
    "image inspect sha256:aaa")
        echo '[{"Id":"sha256:aaa","Parent":"","RepoTags":["a:latest"],"Size":1048576}]' ;;
    "image inspect sha256:bad")
        echo 'not json' ;;
    "image inspect "*)
        echo "Error response from daemon: No such image: ${3}" >&2
        exit 1 ;;
    *)
        echo "unexpected arguments: $*" >&2
        exit 2 ;;
esac
"#;

// Everything lives in one test so the script is never executed while another thread writes it
#[test]
fn test_docker_cli_listing_and_inspection() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let program = dir.path().join("docker");
    fs::write(&program, FAKE_DOCKER)?;
    fs::set_permissions(&program, fs::Permissions::from_mode(0o755))?;

    let absent = DockerStore::unchecked(None).with_program(dir.path().join("absent"));
    assert!(absent.probe().err().unwrap().is_fatal());

    let store = DockerStore::unchecked(None).with_program(&program).probe()?;

    // One id per image, in listing order
    assert_eq!(store.list_ids(false)?, vec!["sha256:aaa", "sha256:gone"]);

    let record = store.inspect("sha256:aaa")?;
    assert_eq!(record.tags, vec!["a:latest"]);
    assert_eq!(record.parent_id, None);
    assert_eq!(record.cumulative_size, 1048576);

    assert!(matches!(
        store.inspect("sha256:gone"),
        Err(StoreError::NotFound(id)) if id == "sha256:gone"
    ));
    assert!(matches!(
        store.inspect("sha256:bad"),
        Err(StoreError::Malformed(_))
    ));
    assert!(matches!(
        store.list_ids(true),
        Err(StoreError::CommandFailed(_))
    ));

    // The batch fails on the removed image; the run resolves the rest one by one
    let ids = store.list_ids(false)?;
    assert!(matches!(
        store.inspect_many(&ids),
        Err(StoreError::NotFound(_))
    ));

    let processor = DiskUsageProcessor::new(store, Notifier::new(1));
    let mut out = Vec::new();
    let summary = processor.images(&ImagesOptions::default(), &mut out)?;
    let text = String::from_utf8(out)?;

    assert_eq!(summary.listed, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.layers, 1);
    assert!(text.starts_with("aaa"));
    assert!(text.ends_with(
        "Trees: 1  Images: 2  Layers: 1  Disk usage: 1 MB\nSkipped images: 1\n"
    ));
    Ok(())
}
