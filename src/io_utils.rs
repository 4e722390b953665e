//! I/O utilities for source access: delimiter and encoding resolution, CSV
//! reader construction, source-format detection, directory walks, and content
//! digests.
//!
//! All file access in datasmith flows through this module. Format detection
//! is extension-first with a content sniff for images, so a mislabelled file
//! still resolves to the right pipeline.

use std::{
    fs::{self, File},
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use sha2::{Digest, Sha256};

use crate::{
    dataset::SourceFormat,
    error::{DatasetError, Result as DsResult},
    image,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// Number of leading bytes read when sniffing file content.
const SNIFF_BYTES: usize = 64;

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
    has_headers: bool,
) -> Result<csv::Reader<BufReader<File>>> {
    let reader =
        BufReader::new(File::open(path).with_context(|| format!("Opening input file {path:?}"))?);
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    Ok(builder.from_reader(reader))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Resolves the source format of a path. Directories are image sources;
/// files resolve by extension, then by content sniff, so a PNG named
/// `photo.dat` is still recognized.
pub fn resolve_format(path: &Path) -> DsResult<SourceFormat> {
    if path.is_dir() {
        return Ok(SourceFormat::Images);
    }
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("csv" | "tsv") => return Ok(SourceFormat::Csv),
        Some("json" | "jsonl" | "ndjson") => return Ok(SourceFormat::Json),
        _ => {}
    }
    let prefix = read_prefix(path, SNIFF_BYTES)
        .map_err(|err| DatasetError::unreadable(path, err))?;
    if image::sniff_format(&prefix).is_some() {
        return Ok(SourceFormat::Images);
    }
    Err(DatasetError::UnsupportedFormat {
        path: path.to_path_buf(),
    })
}

pub fn read_prefix(path: &Path, limit: usize) -> Result<Vec<u8>> {
    let file = File::open(path).with_context(|| format!("Opening {path:?}"))?;
    let mut buf = Vec::with_capacity(limit);
    file.take(limit as u64)
        .read_to_end(&mut buf)
        .with_context(|| format!("Reading {path:?}"))?;
    Ok(buf)
}

/// Walks an image directory depth-first and returns every recognized image
/// file in sorted order. The second tuple element is the class label: the
/// path of the containing directory relative to the root, or `root` for
/// top-level files.
pub fn collect_image_files(root: &Path) -> Result<Vec<(PathBuf, String)>> {
    if root.is_file() {
        // A lone image file (often found via content sniff) is a one-item
        // source with the default class.
        return Ok(vec![(root.to_path_buf(), String::from("root"))]);
    }
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir)
            .with_context(|| format!("Reading directory {dir:?}"))?
            .collect::<std::io::Result<Vec<_>>>()
            .with_context(|| format!("Reading directory {dir:?}"))?;
        entries.sort_by_key(|entry| entry.file_name());
        for entry in entries {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if image::has_image_extension(&entry.file_name().to_string_lossy()) {
                let class = path
                    .parent()
                    .and_then(|parent| parent.strip_prefix(root).ok())
                    .filter(|rel| !rel.as_os_str().is_empty())
                    .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_else(|| String::from("root"));
                files.push((path, class));
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Total size of a source in bytes: the file length, or the sum over an
/// image directory.
pub fn source_size(path: &Path) -> Result<u64> {
    if path.is_dir() {
        let mut total = 0u64;
        for (file, _) in collect_image_files(path)? {
            total += fs::metadata(&file)
                .with_context(|| format!("Reading metadata for {file:?}"))?
                .len();
        }
        Ok(total)
    } else {
        Ok(fs::metadata(path)
            .with_context(|| format!("Reading metadata for {path:?}"))?
            .len())
    }
}

/// SHA-256 fingerprint of source content. For directories the digest covers
/// each image file's relative path and bytes in sorted order, so the result
/// is stable across filesystems.
pub fn source_digest(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    if path.is_dir() {
        for (file, _) in collect_image_files(path)? {
            let rel = file.strip_prefix(path).unwrap_or(&file);
            hasher.update(rel.to_string_lossy().replace('\\', "/").as_bytes());
            hasher.update([0u8]);
            digest_file(&mut hasher, &file)?;
        }
    } else {
        digest_file(&mut hasher, path)?;
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn digest_file(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let mut file = File::open(path).with_context(|| format!("Opening {path:?}"))?;
    let mut buf = [0u8; 8192];
    loop {
        let read = file
            .read(&mut buf)
            .with_context(|| format!("Reading {path:?}"))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(())
}
