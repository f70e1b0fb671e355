use crate::error::Result;
use crate::infrastructure::in_memory::{CatalogSnapshot, InMemoryCatalog};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

/// Loads a JSON catalog (`{"products": [...], "variants": [...], "modifiers": [...]}`)
/// from disk.
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<InMemoryCatalog> {
    let file = File::open(path.as_ref())?;
    read_catalog(BufReader::new(file))
}

pub fn read_catalog<R: Read>(source: R) -> Result<InMemoryCatalog> {
    let snapshot: CatalogSnapshot = serde_json::from_reader(source)?;
    info!(
        products = snapshot.products.len(),
        variants = snapshot.variants.len(),
        modifiers = snapshot.modifiers.len(),
        "catalog loaded"
    );
    Ok(InMemoryCatalog::from_snapshot(snapshot))
}
