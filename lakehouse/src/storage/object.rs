use async_trait::async_trait;
use common::Result;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload};
use std::sync::Arc;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(&self, key: &str, data: &[u8]) -> Result<()>;
    /// Writes `data` only if `key` is free. Returns `false` when it was taken.
    async fn put_object_if_absent(&self, key: &str, data: &[u8]) -> Result<bool>;
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;
    /// Keys below the `prefix` directory, relative to the storage root, sorted.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;
    async fn check_file_exists(&self, key: &str) -> Result<bool>;
    async fn delete_object(&self, key: &str) -> Result<()>;
    fn location(&self) -> &str;
}

/// [`ObjectStorage`] over any `object_store` backend, rooted at a fixed prefix.
pub struct ObjectStoreStorage {
    store: Arc<dyn ObjectStore>,
    root: Path,
    location: String,
}

impl ObjectStoreStorage {
    pub fn new(store: Arc<dyn ObjectStore>, root: Path, location: &str) -> Self {
        Self {
            store,
            root,
            location: location.to_string(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(object_store::memory::InMemory::new()),
            Path::default(),
            "memory://",
        )
    }

    fn path(&self, key: &str) -> Result<Path> {
        let key = key.trim_matches('/');
        if self.root.as_ref().is_empty() {
            Ok(Path::parse(key)?)
        } else {
            Ok(Path::parse(format!("{}/{}", self.root, key))?)
        }
    }

    fn relative_key(&self, path: &Path) -> String {
        let full = path.as_ref();
        if self.root.as_ref().is_empty() {
            return full.to_string();
        }
        full.strip_prefix(self.root.as_ref())
            .map(|rest| rest.trim_start_matches('/').to_string())
            .unwrap_or_else(|| full.to_string())
    }
}

#[async_trait]
impl ObjectStorage for ObjectStoreStorage {
    async fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path(key)?;
        self.store
            .put(&path, PutPayload::from(data.to_vec()))
            .await?;
        Ok(())
    }

    async fn put_object_if_absent(&self, key: &str, data: &[u8]) -> Result<bool> {
        let path = self.path(key)?;
        let options = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };

        match self
            .store
            .put_opts(&path, PutPayload::from(data.to_vec()), options)
            .await
        {
            Ok(_) => Ok(true),
            Err(object_store::Error::AlreadyExists { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path(key)?;
        let data = self.store.get(&path).await?.bytes().await?;
        Ok(data.to_vec())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = self.path(prefix)?;
        let prefix = if prefix.as_ref().is_empty() {
            None
        } else {
            Some(prefix)
        };

        let metas: Vec<_> = self.store.list(prefix.as_ref()).try_collect().await?;
        let mut objects: Vec<String> = metas
            .iter()
            .map(|meta| self.relative_key(&meta.location))
            .collect();
        objects.sort();

        Ok(objects)
    }

    async fn check_file_exists(&self, key: &str) -> Result<bool> {
        let path = self.path(key)?;
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let path = self.path(key)?;
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn location(&self) -> &str {
        &self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn put_get_and_list_round_trip() {
        let storage = ObjectStoreStorage::in_memory();
        storage.put_object("db.db/t/_log/1.json", b"{}").await.unwrap();
        storage.put_object("db.db/t/_log/0.json", b"[]").await.unwrap();
        storage.put_object("other.db/_database.json", b"{}").await.unwrap();

        assert_eq!(storage.get_object("db.db/t/_log/0.json").await.unwrap(), b"[]");
        assert_eq!(
            storage.list_objects("db.db/t/_log").await.unwrap(),
            vec!["db.db/t/_log/0.json", "db.db/t/_log/1.json"]
        );
        assert_eq!(storage.list_objects("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn create_only_put_refuses_existing_key() {
        let storage = ObjectStoreStorage::in_memory();
        assert!(storage.put_object_if_absent("k", b"first").await.unwrap());
        assert!(!storage.put_object_if_absent("k", b"second").await.unwrap());
        assert_eq!(storage.get_object("k").await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn missing_objects() {
        let storage = ObjectStoreStorage::in_memory();
        assert!(!storage.check_file_exists("nope").await.unwrap());
        assert!(matches!(
            storage.get_object("nope").await,
            Err(common::Error::NotFound(_))
        ));
        storage.delete_object("nope").await.unwrap();
        assert!(storage.list_objects("nothing/here").await.unwrap().is_empty());
    }
}
