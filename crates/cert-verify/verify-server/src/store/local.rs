use std::{
    io::ErrorKind,
    path::{
        Component,
        Path,
        PathBuf,
    },
};

use async_trait::async_trait;
use bytes::Bytes;

use super::{
    ContentStore,
    StoreError,
};

/// Store backed by a directory tree, `{root}/{container}/{path}`.
#[derive(Debug, Clone)]
pub struct LocalContentStore {
    root: PathBuf,
    container: String,
}

impl LocalContentStore {
    pub fn new(root: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            container: container.into(),
        }
    }

    fn object_path(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(&self.container).join(relative))
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    async fn get(&self, path: &str) -> Result<Bytes, StoreError> {
        let object = self.object_path(path)?;
        match tokio::fs::read(&object).await {
            Ok(contents) => Ok(Bytes::from(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_string()))
            }
            Err(err) => Err(StoreError::Backend(err.to_string())),
        }
    }
}
