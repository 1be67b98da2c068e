//! Helpers shared by unit tests

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One entry to put into a test archive
pub struct ZipSpec {
    pub name: String,
    pub data: Vec<u8>,
    pub method: CompressionMethod,
    pub directory: bool,
}

impl ZipSpec {
    pub fn file(name: &str, data: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            data: data.to_vec(),
            method: CompressionMethod::Deflated,
            directory: false,
        }
    }

    pub fn stored(name: &str, data: &[u8]) -> Self {
        Self {
            method: CompressionMethod::Stored,
            ..Self::file(name, data)
        }
    }

    pub fn dir(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: Vec::new(),
            method: CompressionMethod::Stored,
            directory: true,
        }
    }
}

/// Build an in-memory zip archive from `specs`, in order.
pub fn zip_bytes(specs: &[ZipSpec]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for spec in specs {
        let options = SimpleFileOptions::default().compression_method(spec.method);
        if spec.directory {
            writer.add_directory(spec.name.as_str(), options).unwrap();
        } else {
            writer.start_file(spec.name.as_str(), options).unwrap();
            writer.write_all(&spec.data).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// The three-file, one-empty-directory archive used across tests.
pub fn sample_project() -> Vec<u8> {
    zip_bytes(&[
        ZipSpec::file("a.txt", &[b'a'; 10]),
        ZipSpec::file("b/c.txt", &[b'c'; 20]),
        ZipSpec::file("b/d.txt", &[b'd'; 5]),
        ZipSpec::dir("e/"),
    ])
}
