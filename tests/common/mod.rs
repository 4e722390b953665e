#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    /// Writes raw bytes, creating parent directories as needed.
    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}

/// Minimal but well-formed PNG header: signature plus IHDR, enough for the
/// dimension probe. The pixel data is absent; the probe never reads it.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.push(8); // bit depth
    bytes.push(2); // rgb
    bytes.extend_from_slice(&[0, 0, 0]);
    bytes.extend_from_slice(&[0; 4]);
    bytes
}

/// Lays out an image directory with one subdirectory per class.
pub fn write_image_tree(workspace: &TestWorkspace, classes: &[(&str, usize)]) -> PathBuf {
    let root = workspace.path().join("images");
    for (class, count) in classes {
        for idx in 0..*count {
            let name = format!("images/{class}/img_{idx}.png");
            workspace.write_bytes(&name, &png_bytes(64, 64));
        }
    }
    root
}

/// A hundred-row CSV with ages spanning 18..=65 and a three-class label.
pub fn ages_csv() -> String {
    let mut contents = String::from("age,label\n");
    for row in 0..100u32 {
        let age = 18 + (row % 48);
        let label = match row % 3 {
            0 => "cat",
            1 => "dog",
            _ => "bird",
        };
        contents.push_str(&format!("{age},{label}\n"));
    }
    contents
}
