//! Command handlers

pub mod resolve;
pub mod tracev3;
pub mod uuidtext;

use anyhow::Context;
use std::path::Path;

/// Read a whole input file, naming it in the error
pub(crate) fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    tracing::debug!(path = %path.display(), size = data.len(), "read input file");
    Ok(data)
}
