//! Dump files: a JSON object keyed by document path

use anyhow::{Context, Result};
use sheetwork_store::{Dump, MemoryStore};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Load `path` into a fresh in-memory store; a missing file yields an empty one
pub(crate) fn load(path: &Path) -> Result<Arc<MemoryStore>> {
    if !path.exists() {
        debug!(path = %path.display(), "no dump file, starting empty");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let dump: Dump =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    debug!(path = %path.display(), documents = dump.len(), "dump loaded");
    Ok(Arc::new(MemoryStore::new().with_dump(dump)))
}

/// Write the store's documents back to `path`
pub(crate) fn save(store: &MemoryStore, path: &Path) -> Result<()> {
    let dump = store.dump();
    let text = serde_json::to_string_pretty(&dump)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    debug!(path = %path.display(), documents = dump.len(), "dump saved");
    Ok(())
}
