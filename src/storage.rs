use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed state file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A single JSON document under the data directory.
///
/// A missing file reads as `None`; the parent directory is created on first save.
/// Saves go through a sibling `.tmp` file and a rename, so readers never see a
/// partial document. Callers serialize their own saves.
#[derive(Debug, Clone)]
pub struct JsonFile<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(data_dir: &Path, name: &str) -> Self {
        Self {
            path: data_dir.join(name),
            _marker: PhantomData,
        }
    }

    pub async fn load(&self) -> Result<Option<T>, StorageError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let value = serde_json::from_str(&content).map_err(|source| StorageError::Json {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(value))
    }

    pub async fn save(&self, value: &T) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(value).map_err(|source| StorageError::Json {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .map_err(|source| StorageError::Io {
                path: tmp.clone(),
                source,
            })?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StorageError::Io {
                path: self.path.clone(),
                source,
            })?;
        debug!("Saved {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        items: Vec<String>,
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<Doc> = JsonFile::new(dir.path(), "doc.json");
        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_creates_directory_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        let file: JsonFile<Doc> = JsonFile::new(&nested, "doc.json");

        let doc = Doc {
            items: vec!["one".into(), "two".into()],
        };
        file.save(&doc).await.unwrap();

        assert_eq!(file.load().await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn save_replaces_whole_document() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<Doc> = JsonFile::new(dir.path(), "doc.json");

        let long = Doc {
            items: (0..50).map(|i| format!("item {i}")).collect(),
        };
        file.save(&long).await.unwrap();
        let short = Doc {
            items: vec!["only".into()],
        };
        file.save(&short).await.unwrap();

        assert_eq!(file.load().await.unwrap(), Some(short));
        assert!(!dir.path().join("doc.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.json"), "{not json").unwrap();
        let file: JsonFile<Doc> = JsonFile::new(dir.path(), "doc.json");

        assert!(matches!(
            file.load().await,
            Err(StorageError::Json { .. })
        ));
    }
}
