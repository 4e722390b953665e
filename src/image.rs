//! Image header probing.
//!
//! Image sources are identified by content, not extension: a small prefix of
//! each file is checked against the magic numbers of the supported encodings
//! and, where the header allows it, pixel dimensions and channel count are
//! read directly. No decoder is involved; only fixed-layout header fields are
//! parsed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Encodings the probe understands. Matches the set the desktop tool imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Webp,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Webp => "webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// File extensions accepted when scanning an image directory. Files whose
/// header fails the sniff are still counted only if the magic bytes match.
pub fn has_image_extension(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    [".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp"]
        .iter()
        .any(|ext| lowered.ends_with(ext))
}

/// Header fields recovered from a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageProbe {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

/// Probes the leading bytes of a file. Returns `None` when the content does
/// not match any supported encoding or the header is truncated.
pub fn probe(bytes: &[u8]) -> Option<ImageProbe> {
    sniff_format(bytes).and_then(|format| match format {
        ImageFormat::Png => probe_png(bytes),
        ImageFormat::Jpeg => probe_jpeg(bytes),
        ImageFormat::Gif => probe_gif(bytes),
        ImageFormat::Bmp => probe_bmp(bytes),
        ImageFormat::Webp => probe_webp(bytes),
    })
}

/// Magic-number check only; cheaper than a full probe.
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some(ImageFormat::Png)
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageFormat::Jpeg)
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some(ImageFormat::Gif)
    } else if bytes.starts_with(b"BM") && bytes.len() >= 30 {
        Some(ImageFormat::Bmp)
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(ImageFormat::Webp)
    } else {
        None
    }
}

fn be_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let slice = bytes.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn le_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let slice = bytes.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([slice[0], slice[1]]))
}

fn le_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let slice = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn probe_png(bytes: &[u8]) -> Option<ImageProbe> {
    // Signature (8) + IHDR length (4) + "IHDR" (4), then width/height.
    if bytes.get(12..16)? != b"IHDR" {
        return None;
    }
    let width = be_u32(bytes, 16)?;
    let height = be_u32(bytes, 20)?;
    let color_type = *bytes.get(25)?;
    let channels = match color_type {
        0 => 1, // grayscale
        2 => 3,
        3 => 1, // palette index
        4 => 2,
        6 => 4,
        _ => return None,
    };
    (width > 0 && height > 0).then_some(ImageProbe {
        format: ImageFormat::Png,
        width,
        height,
        channels,
    })
}

fn probe_jpeg(bytes: &[u8]) -> Option<ImageProbe> {
    // Walk marker segments until a start-of-frame marker carries dimensions.
    let mut pos = 2usize;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        match marker {
            // Padding and restart markers have no payload.
            0xFF => {
                pos += 1;
                continue;
            }
            0xD0..=0xD7 | 0x01 => {
                pos += 2;
                continue;
            }
            _ => {}
        }
        let length = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        if length < 2 {
            return None;
        }
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let height = u16::from_be_bytes([*bytes.get(pos + 5)?, *bytes.get(pos + 6)?]);
            let width = u16::from_be_bytes([*bytes.get(pos + 7)?, *bytes.get(pos + 8)?]);
            let components = *bytes.get(pos + 9)?;
            if width == 0 || height == 0 {
                return None;
            }
            return Some(ImageProbe {
                format: ImageFormat::Jpeg,
                width: u32::from(width),
                height: u32::from(height),
                channels: components,
            });
        }
        pos += 2 + length;
    }
    None
}

fn probe_gif(bytes: &[u8]) -> Option<ImageProbe> {
    let width = le_u16(bytes, 6)?;
    let height = le_u16(bytes, 8)?;
    (width > 0 && height > 0).then_some(ImageProbe {
        format: ImageFormat::Gif,
        width: u32::from(width),
        height: u32::from(height),
        channels: 3,
    })
}

fn probe_bmp(bytes: &[u8]) -> Option<ImageProbe> {
    let width = le_u32(bytes, 18)? as i32;
    let height = le_u32(bytes, 22)? as i32;
    let bits = le_u16(bytes, 28)?;
    if width <= 0 || height == 0 {
        return None;
    }
    let channels = match bits {
        1 | 4 | 8 => 1,
        16 | 24 => 3,
        32 => 4,
        _ => return None,
    };
    Some(ImageProbe {
        format: ImageFormat::Bmp,
        width: width as u32,
        height: height.unsigned_abs(),
        channels,
    })
}

fn probe_webp(bytes: &[u8]) -> Option<ImageProbe> {
    let chunk = bytes.get(12..16)?;
    match chunk {
        b"VP8 " => {
            // Lossy bitstream: 3-byte frame tag, 3-byte sync code, then
            // 14-bit width and height.
            if bytes.get(23..26)? != [0x9D, 0x01, 0x2A] {
                return None;
            }
            let width = le_u16(bytes, 26)? & 0x3FFF;
            let height = le_u16(bytes, 28)? & 0x3FFF;
            (width > 0 && height > 0).then_some(ImageProbe {
                format: ImageFormat::Webp,
                width: u32::from(width),
                height: u32::from(height),
                channels: 3,
            })
        }
        b"VP8L" => {
            if *bytes.get(20)? != 0x2F {
                return None;
            }
            let packed = le_u32(bytes, 21)?;
            let width = (packed & 0x3FFF) + 1;
            let height = ((packed >> 14) & 0x3FFF) + 1;
            Some(ImageProbe {
                format: ImageFormat::Webp,
                width,
                height,
                channels: 4,
            })
        }
        b"VP8X" => {
            let slice = bytes.get(24..30)?;
            let width = 1 + (u32::from(slice[0])
                | u32::from(slice[1]) << 8
                | u32::from(slice[2]) << 16);
            let height = 1 + (u32::from(slice[3])
                | u32::from(slice[4]) << 8
                | u32::from(slice[5]) << 16);
            Some(ImageProbe {
                format: ImageFormat::Webp,
                width,
                height,
                channels: 4,
            })
        }
        _ => None,
    }
}
