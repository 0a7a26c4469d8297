//! TUM RGB-D dataset loading.
//!
//! Expects a sequence directory containing an `associate.txt` file with
//! whitespace-separated `rgb_ts rgb_path depth_ts depth_path` lines (the
//! output of the benchmark's association script) and the referenced image
//! files.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use csv::ReaderBuilder;
use opencv::core::Mat;
use opencv::imgcodecs;
use opencv::prelude::*;
use serde::Deserialize;

/// One line of the association file.
#[derive(Debug, Deserialize)]
struct AssociationRow {
    rgb_timestamp: f64,
    rgb_path: String,
    #[allow(dead_code)]
    depth_timestamp: f64,
    depth_path: String,
}

/// One associated color/depth entry of the sequence.
#[derive(Debug, Clone)]
pub struct FrameEntry {
    pub timestamp: f64,
    pub rgb_path: String,
    pub depth_path: String,
}

/// A decoded color/depth image pair.
#[derive(Debug)]
pub struct RgbdPair {
    pub timestamp: f64,
    pub color: Mat,
    pub depth: Mat,
}

/// Lazily-decoding TUM RGB-D sequence reader.
#[derive(Debug)]
pub struct TumRgbdDataset {
    root: PathBuf,
    entries: Vec<FrameEntry>,
}

impl TumRgbdDataset {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let assoc_path = root.join("associate.txt");
        let file = File::open(&assoc_path)
            .with_context(|| format!("cannot open association list {}", assoc_path.display()))?;

        let entries = parse_association_list(file)
            .with_context(|| format!("malformed association list {}", assoc_path.display()))?;
        if entries.is_empty() {
            bail!("association list {} contains no frames", assoc_path.display());
        }

        Ok(Self { root, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn timestamp(&self, idx: usize) -> Option<f64> {
        self.entries.get(idx).map(|e| e.timestamp)
    }

    /// Decode the color and depth images of one entry.
    ///
    /// The depth image is read unchanged to preserve its 16-bit raw units.
    pub fn frame(&self, idx: usize) -> Result<RgbdPair> {
        let entry = self
            .entries
            .get(idx)
            .with_context(|| format!("no frame at index {}", idx))?;

        let color = self.read_image(&entry.rgb_path, imgcodecs::IMREAD_COLOR)?;
        let depth = self.read_image(&entry.depth_path, imgcodecs::IMREAD_UNCHANGED)?;

        Ok(RgbdPair {
            timestamp: entry.timestamp,
            color,
            depth,
        })
    }

    fn read_image(&self, relative: &str, flags: i32) -> Result<Mat> {
        let path = self.root.join(relative);
        let path_str = path
            .to_str()
            .with_context(|| format!("non-UTF-8 image path {}", path.display()))?;

        let image = imgcodecs::imread(path_str, flags)?;
        if image.empty() {
            bail!("could not read image {}", path.display());
        }
        Ok(image)
    }
}

fn parse_association_list<R: Read>(reader: R) -> Result<Vec<FrameEntry>> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b' ')
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut entries = Vec::new();
    for record in csv_reader.deserialize::<AssociationRow>() {
        let row = record?;
        entries.push(FrameEntry {
            timestamp: row.rgb_timestamp,
            rgb_path: row.rgb_path,
            depth_path: row.depth_path,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_association_list() {
        let data = b"\
# color images and depth images
# timestamp filename timestamp filename
1311868164.363181 rgb/1311868164.363181.png 1311868164.373557 depth/1311868164.373557.png
1311868164.399026 rgb/1311868164.399026.png 1311868164.406020 depth/1311868164.406020.png
";
        let entries = parse_association_list(&data[..]).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].rgb_path, "rgb/1311868164.363181.png");
        assert_eq!(entries[1].depth_path, "depth/1311868164.406020.png");
        assert!((entries[0].timestamp - 1311868164.363181).abs() < 1e-6);
    }

    #[test]
    fn test_parse_rejects_short_lines() {
        let data = b"1311868164.363181 rgb/a.png\n";
        assert!(parse_association_list(&data[..]).is_err());
    }
}
