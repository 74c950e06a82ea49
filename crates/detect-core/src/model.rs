//! Model artifact parsing: the darknet-style config file that declares the
//! network input size, and the class-names list.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Input geometry a model expects, read from its config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub width: u32,
    pub height: u32,
}

impl ModelSpec {
    pub fn from_cfg(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read model config {}", path.display()))?;
        Self::parse(&text)
            .with_context(|| format!("invalid model config {}", path.display()))
    }

    /// Scan `key=value` lines for the network width and height. Sections and
    /// comments are skipped; the first occurrence of each key wins.
    pub fn parse(text: &str) -> Result<Self> {
        let mut width = None;
        let mut height = None;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let slot = match key.trim() {
                "width" => &mut width,
                "height" => &mut height,
                _ => continue,
            };
            if slot.is_none() {
                let parsed: u32 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("bad value for {}", key.trim()))?;
                if parsed == 0 {
                    bail!("{} must be positive", key.trim());
                }
                *slot = Some(parsed);
            }
        }
        match (width, height) {
            (Some(width), Some(height)) => Ok(Self { width, height }),
            _ => bail!("config declares no input width/height"),
        }
    }
}

/// Read one class name per line, skipping blanks.
pub fn load_names(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read class names {}", path.display()))?;
    let names: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();
    if names.is_empty() {
        bail!("class names file {} is empty", path.display());
    }
    Ok(names)
}
