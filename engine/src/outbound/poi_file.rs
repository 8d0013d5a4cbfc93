//! POI source backed by a JSON file on disk.
//!
//! The file holds a JSON array of POIs in the API's camelCase shape. It is
//! read once through `cap_std`; queries are then answered in memory.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cap_std::{ambient_authority, fs::Dir};
use thiserror::Error;
use tracing::info;

use crate::domain::poi::Poi;
use crate::domain::ports::{FixturePoiSource, NearbyQuery, NetworkError, PoiSource};

/// Errors returned while loading a POI file.
#[derive(Debug, Error)]
pub enum PoiFileError {
    /// File could not be read.
    #[error("failed to read POI file at {path}: {source}")]
    Read {
        /// Path to the POI file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// File contents are not a JSON array of POIs.
    #[error("invalid POI file at {path}: {source}")]
    Parse {
        /// Path to the POI file.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// In-memory POI source loaded from a JSON file.
#[derive(Debug, Clone)]
pub struct PoiFileSource {
    pois: Vec<Poi>,
    inner: FixturePoiSource,
}

impl PoiFileSource {
    /// Load and decode the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PoiFileError`] when the file is unreadable or malformed.
    pub fn open(path: &Path) -> Result<Self, PoiFileError> {
        let read_error = |source| PoiFileError::Read {
            path: path.to_path_buf(),
            source,
        };
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file_name = path.file_name().ok_or_else(|| {
            read_error(io::Error::new(
                io::ErrorKind::InvalidInput,
                "POI path must be a file",
            ))
        })?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_error)?;
        let contents = dir.read_to_string(Path::new(file_name)).map_err(read_error)?;
        let pois: Vec<Poi> =
            serde_json::from_str(&contents).map_err(|source| PoiFileError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        info!(path = %path.display(), count = pois.len(), "loaded POI file");
        Ok(Self::from_pois(pois))
    }

    /// Serve an already decoded snapshot.
    pub fn from_pois(pois: Vec<Poi>) -> Self {
        Self {
            inner: FixturePoiSource::new(pois.clone()),
            pois,
        }
    }

    /// Every POI in the file, in file order.
    pub fn pois(&self) -> &[Poi] {
        &self.pois
    }
}

#[async_trait]
impl PoiSource for PoiFileSource {
    async fn nearby(&self, query: &NearbyQuery) -> Result<Vec<Poi>, NetworkError> {
        self.inner.nearby(query).await
    }

    async fn search(&self, query: &str) -> Result<Vec<Poi>, NetworkError> {
        self.inner.search(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::Coordinate;
    use crate::test_support::{PoiFixture, poi_file};
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn loads_and_serves_a_snapshot() {
        let pois = vec![
            PoiFixture::new("1", "Chez Wou", "restaurant")
                .at(3.8490, 11.5030)
                .build(),
            PoiFixture::new("2", "Kribi Beach", "attraction")
                .at(2.9400, 9.9100)
                .build(),
        ];
        let (_guard, path) = poi_file(&pois).expect("fixture file");

        let source = PoiFileSource::open(&path).expect("file loads");
        let nearby = source
            .nearby(&NearbyQuery {
                center: Coordinate::new(3.8480, 11.5021),
                radius_km: 5.0,
                limit: 10,
            })
            .await
            .expect("in-memory query");

        assert_eq!(source.pois(), pois.as_slice());
        assert_eq!(nearby.len(), 1);
        assert_eq!(source.search("kribi").await.expect("search").len(), 1);
    }

    #[rstest]
    fn missing_files_are_read_errors() {
        let directory = tempfile::tempdir().expect("temp dir");
        let error = PoiFileSource::open(&directory.path().join("absent.json"))
            .expect_err("no such file");
        assert!(matches!(error, PoiFileError::Read { .. }));
    }

    #[rstest]
    fn malformed_files_are_parse_errors() {
        let directory = tempfile::tempdir().expect("temp dir");
        let path = directory.path().join("pois.json");
        let root = Dir::open_ambient_dir(directory.path(), ambient_authority()).expect("dir");
        root.write("pois.json", b"{\"data\": []}").expect("write");

        let error = PoiFileSource::open(&path).expect_err("object is not an array");
        assert!(matches!(error, PoiFileError::Parse { .. }));
    }
}
