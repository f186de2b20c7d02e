//! Tile position manifest in the `TileConfiguration.txt` format read by
//! grid/collection stitching tools.
//!
//! ```text
//!
//! dim = 2
//! tile_0001.tif; ; (30000, 370300)
//! ```

use scanscope_core::Position;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    pub filename: String,
    pub position: Position,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ManifestParseError {
    #[error("missing 'dim = 2' header")]
    MissingHeader,
    #[error("line {line}: malformed tile entry '{text}'")]
    MalformedEntry { line: usize, text: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TileConfiguration {
    pub entries: Vec<ManifestEntry>,
}

impl TileConfiguration {
    pub fn file_name(timestamp: &str) -> String {
        format!("TileConfiguration_{timestamp}.txt")
    }

    /// Write the manifest into `dir` and return its path.
    pub fn write(&self, dir: &Path, timestamp: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::file_name(timestamp));
        fs::write(&path, self.to_string())?;
        Ok(path)
    }

    pub fn parse(text: &str) -> Result<Self, ManifestParseError> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty());
        match lines.next() {
            Some((_, l)) if l.replace(' ', "") == "dim=2" => {}
            _ => return Err(ManifestParseError::MissingHeader),
        }

        let entries = lines
            .map(|(i, l)| {
                parse_entry(l).ok_or_else(|| ManifestParseError::MalformedEntry {
                    line: i + 1,
                    text: l.to_owned(),
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { entries })
    }
}

fn parse_entry(line: &str) -> Option<ManifestEntry> {
    let mut parts = line.splitn(3, ';');
    let filename = parts.next()?.trim();
    let _ = parts.next()?;
    let coords = parts.next()?.trim();
    let inner = coords.strip_prefix('(')?.strip_suffix(')')?;
    let (x, y) = inner.split_once(',')?;
    Some(ManifestEntry {
        filename: filename.to_owned(),
        position: Position::new(x.trim().parse().ok()?, y.trim().parse().ok()?),
    })
}

impl fmt::Display for TileConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Stitching readers expect a blank first line.
        writeln!(f)?;
        writeln!(f, "dim = 2")?;
        for e in &self.entries {
            writeln!(f, "{}; ; ({}, {})", e.filename, e.position.x, e.position.y)?;
        }
        Ok(())
    }
}
