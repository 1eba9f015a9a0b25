#![allow(dead_code)]

pub mod config_test_utils;

use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use wormsave::receive::ReceiveOptions;
use zip::write::FileOptions;

pub fn setup_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Options with both holds removed and fast sampling.
pub fn fast_options(save_dir: &Path) -> ReceiveOptions {
    let mut options = ReceiveOptions::new(save_dir).without_delays();
    options.sample_interval = Duration::from_millis(1);
    options
}

pub enum Entry<'a> {
    File(&'a str, &'a [u8]),
    Dir(&'a str),
}

/// Builds a zip in memory. Entry names are written verbatim, so hostile
/// names like `../../evil.sh` end up in the archive as-is.
pub fn zip_bytes(entries: &[Entry<'_>]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for entry in entries {
        match entry {
            Entry::File(name, contents) => {
                writer.start_file(*name, options).expect("start zip entry");
                writer.write_all(contents).expect("write zip entry");
            }
            Entry::Dir(name) => writer.add_directory(*name, options).expect("add zip directory"),
        }
    }

    writer.finish().expect("finish zip").into_inner()
}

/// Every path below `dir`, relative and sorted.
pub fn tree(dir: &Path) -> Vec<String> {
    let mut entries: Vec<String> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap_or(e.path())
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    entries.sort();
    entries
}
