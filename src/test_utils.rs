//! Shared test utilities used across multiple test modules.

use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Build an in-memory zip shaped like a GitHub tag archive: everything under
/// `root/`, with a `manifest.json` declaring `version` and one script.
pub fn extension_zip(root: &str, version: &str) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.add_directory(format!("{root}/"), options)
        .expect("add root dir");
    zip.start_file(format!("{root}/manifest.json"), options)
        .expect("start manifest");
    zip.write_all(
        format!(r#"{{"name":"WA Incognito","version":"{version}","manifest_version":3}}"#)
            .as_bytes(),
    )
    .expect("write manifest");
    zip.add_directory(format!("{root}/js/"), options)
        .expect("add js dir");
    zip.start_file(format!("{root}/js/core.js"), options)
        .expect("start script");
    zip.write_all(b"console.log('incognito');")
        .expect("write script");

    zip.finish().expect("finish zip").into_inner()
}

/// Write a `manifest.json` declaring `version` into `dir`, creating it.
pub fn write_manifest(dir: &std::path::Path, version: &str) {
    std::fs::create_dir_all(dir).expect("create extension dir");
    std::fs::write(
        dir.join("manifest.json"),
        format!(r#"{{"version":"{version}"}}"#),
    )
    .expect("write manifest");
}
