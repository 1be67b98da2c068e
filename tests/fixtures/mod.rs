//! Archive fixtures for integration tests
//!
//! Most archives are built in memory with the zip writer. Archives no
//! well-behaved writer would produce (zip64 bombs) are assembled byte by
//! byte.

#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use codebase_ingest::config::WorkdirSettings;
use codebase_ingest::IngestConfig;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// 10 GiB
pub const BOMB_UNCOMPRESSED_SIZE: u64 = 10 * 1024 * 1024 * 1024;

/// One archive entry
pub enum Entry<'a> {
    File(&'a str, &'a [u8]),
    Stored(&'a str, &'a [u8]),
    Dir(&'a str),
    Symlink(&'a str, &'a str),
}

/// Build an archive from `entries`, in order.
pub fn archive(entries: &[Entry<'_>]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for entry in entries {
        match entry {
            Entry::File(name, data) => {
                writer.start_file(*name, deflated).unwrap();
                writer.write_all(data).unwrap();
            }
            Entry::Stored(name, data) => {
                writer.start_file(*name, stored).unwrap();
                writer.write_all(data).unwrap();
            }
            Entry::Dir(name) => writer.add_directory(*name, stored).unwrap(),
            Entry::Symlink(name, target) => writer.add_symlink(*name, *target, stored).unwrap(),
        }
    }
    writer.finish().unwrap().into_inner()
}

/// a.txt (10 bytes), b/c.txt (20), b/d.txt (5) and the empty directory e/
pub fn sample_project() -> Vec<u8> {
    archive(&[
        Entry::File("a.txt", &[b'a'; 10]),
        Entry::File("b/c.txt", &[b'c'; 20]),
        Entry::File("b/d.txt", &[b'd'; 5]),
        Entry::Dir("e/"),
    ])
}

/// A small but realistic source tree under one top-level directory
pub fn nested_project() -> Vec<u8> {
    archive(&[
        Entry::Dir("app/"),
        Entry::File("app/README.md", b"# app\n"),
        Entry::File("app/Cargo.toml", b"[package]\nname = \"app\"\n"),
        Entry::Dir("app/src/"),
        Entry::File("app/src/main.rs", b"fn main() {\n    println!(\"hi\");\n}\n"),
        Entry::File("app/src/lib.rs", b"pub fn add(a: u32, b: u32) -> u32 { a + b }\n"),
        Entry::Stored("app/src/data.bin", &[0u8, 1, 2, 3, 4, 5, 6, 7]),
        Entry::Dir("app/web/"),
        Entry::File("app/web/index.ts", b"export const x = 1;\n"),
        Entry::File("app/web/style.css", b"body { margin: 0 }\n"),
    ])
}

/// One deflated entry, `bomb.bin`, declaring 1 byte compressed and
/// 10 GiB uncompressed through the zip64 extra field.
pub fn zip64_bomb() -> Vec<u8> {
    let name = b"bomb.bin";
    let data = [0x03u8];

    let mut extra = Vec::new();
    extra.extend_from_slice(&0x0001u16.to_le_bytes());
    extra.extend_from_slice(&16u16.to_le_bytes());
    extra.extend_from_slice(&BOMB_UNCOMPRESSED_SIZE.to_le_bytes());
    extra.extend_from_slice(&(data.len() as u64).to_le_bytes());

    let mut out = Vec::new();

    // local file header
    out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
    out.extend_from_slice(&45u16.to_le_bytes()); // version needed
    out.extend_from_slice(&0u16.to_le_bytes()); // flags
    out.extend_from_slice(&8u16.to_le_bytes()); // deflate
    out.extend_from_slice(&0u16.to_le_bytes()); // mod time
    out.extend_from_slice(&0x0021u16.to_le_bytes()); // mod date (1980-01-01)
    out.extend_from_slice(&0u32.to_le_bytes()); // crc32
    out.extend_from_slice(&u32::MAX.to_le_bytes()); // compressed, see zip64
    out.extend_from_slice(&u32::MAX.to_le_bytes()); // uncompressed, see zip64
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(&extra);
    out.extend_from_slice(&data);

    let cd_offset = out.len() as u32;

    // central directory header
    out.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
    out.extend_from_slice(&0x032Du16.to_le_bytes()); // made by: unix, 4.5
    out.extend_from_slice(&45u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&8u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0x0021u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&u32::MAX.to_le_bytes());
    out.extend_from_slice(&u32::MAX.to_le_bytes());
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // comment length
    out.extend_from_slice(&0u16.to_le_bytes()); // disk number start
    out.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
    out.extend_from_slice(&(0o100644u32 << 16).to_le_bytes()); // external attributes
    out.extend_from_slice(&0u32.to_le_bytes()); // local header offset
    out.extend_from_slice(name);
    out.extend_from_slice(&extra);

    let cd_size = out.len() as u32 - cd_offset;

    // end of central directory
    out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());

    out
}

/// Default configuration with working directories created under `parent`
pub fn config_in(parent: &Path) -> IngestConfig {
    IngestConfig {
        workdir: WorkdirSettings {
            root: Some(parent.to_path_buf()),
            prefix: "ingest-".to_string(),
        },
        ..IngestConfig::default()
    }
}

/// Number of entries directly under `dir`
pub fn entry_count(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
