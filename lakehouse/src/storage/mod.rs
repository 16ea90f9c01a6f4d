pub mod object;

pub use object::{ObjectStorage, ObjectStoreStorage};

use common::{Error, Result};
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Opens the warehouse named by `location`: a directory path, a `file://` URL,
/// or `memory://` for a throwaway in-process store.
pub async fn open_warehouse(location: &str) -> Result<Arc<dyn ObjectStorage>> {
    if location.starts_with("memory://") {
        return Ok(Arc::new(ObjectStoreStorage::in_memory()));
    }

    let dir = local_dir(location)?;
    tokio::fs::create_dir_all(&dir).await?;

    let store = LocalFileSystem::new_with_prefix(&dir)?;
    debug!(warehouse = %dir.display(), "Opened local warehouse");

    Ok(Arc::new(ObjectStoreStorage::new(
        Arc::new(store),
        Path::default(),
        location,
    )))
}

fn local_dir(location: &str) -> Result<PathBuf> {
    if location.contains("://") {
        let url = Url::parse(location)
            .map_err(|e| Error::InvalidInput(format!("URL parse error: {}", e)))?;

        if url.scheme() != "file" {
            return Err(Error::InvalidInput(format!(
                "Warehouse '{}' is not supported (expected a directory or file:// URL)",
                location
            )));
        }

        return url.to_file_path().map_err(|_| {
            Error::InvalidInput(format!("Warehouse URL '{}' is not a local path", location))
        });
    }

    if location.is_empty() {
        return Err(Error::InvalidInput("Warehouse location is empty".to_string()));
    }

    Ok(PathBuf::from(location))
}
