//! Document-store backed hierarchy store.
//!
//! The store is a directory with one flat JSON collection per level, each
//! an array of documents:
//!
//! ```text
//! <dir>/geo_divisions.json   [{"id","name","bn_name",...}, ...]
//! <dir>/geo_districts.json   [{"id","division_id","name","bn_name","lat","lon",...}, ...]
//! <dir>/geo_upazilas.json    [{"id","district_id","name","bn_name",...}, ...]
//! <dir>/geo_unions.json      [{"id","upazila_id","name","bn_name",...}, ...]
//! ```
//!
//! Collections are read on every query and never written by the server.
//! Every read is bounded by the configured timeout.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use bdgeo_core::constants::{
    COLLECTIONS, DISTRICTS_COLLECTION, DIVISIONS_COLLECTION, UNIONS_COLLECTION,
    UPAZILAS_COLLECTION,
};
use bdgeo_core::error::{GeoError, Result};
use bdgeo_core::names::{normalize_name, same_name};
use bdgeo_core::traits::HierarchyStore;
use bdgeo_core::types::{Dataset, District, Division, Named, Union, Upazila};

use crate::memory::non_empty;

/// Hierarchy store over a directory of JSON collections.
#[derive(Clone, Debug)]
pub struct DocumentStore {
    /// Directory holding the collections
    dir: PathBuf,
    /// Upper bound for a single collection read
    timeout: Duration,
}

fn collection_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}

impl DocumentStore {
    /// Opens the store, checking that every collection is present.
    #[instrument(skip(dir), fields(dir = %dir.as_ref().display()))]
    pub async fn connect(dir: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let store = Self {
            dir: dir.as_ref().to_path_buf(),
            timeout,
        };

        for name in COLLECTIONS {
            let meta = store
                .bounded(name, fs::metadata(collection_path(&store.dir, name)))
                .await?;
            if !meta.is_file() {
                return Err(GeoError::UpstreamUnavailable(format!(
                    "collection {name} is not a file"
                )));
            }
        }

        info!("Document store connected");
        Ok(store)
    }

    /// Returns the store directory.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Returns the per-read timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reads every collection into a dataset and validates it.
    pub async fn snapshot(&self) -> Result<Dataset> {
        let dataset = Dataset {
            divisions: self.collection(DIVISIONS_COLLECTION).await?,
            districts: self.collection(DISTRICTS_COLLECTION).await?,
            upazilas: self.collection(UPAZILAS_COLLECTION).await?,
            unions: self.collection(UNIONS_COLLECTION).await?,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    fn timed_out(&self, name: &str) -> GeoError {
        warn!(collection = name, timeout_ms = self.timeout.as_millis() as u64, "Store read timed out");
        GeoError::UpstreamUnavailable(format!(
            "timed out reading {name} after {}ms",
            self.timeout.as_millis()
        ))
    }

    /// Runs one filesystem operation on `name` under the read timeout.
    async fn bounded<T>(
        &self,
        name: &str,
        op: impl Future<Output = std::io::Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| self.timed_out(name))?
            .map_err(|e| GeoError::UpstreamUnavailable(format!("cannot read collection {name}: {e}")))
    }

    /// Reads and parses one collection.
    async fn collection<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let bytes = self
            .bounded(name, fs::read(collection_path(&self.dir, name)))
            .await?;

        let docs: Vec<T> = serde_json::from_slice(&bytes)
            .map_err(|e| GeoError::Internal(format!("malformed collection {name}: {e}")))?;

        debug!(collection = name, count = docs.len(), "Read collection");
        Ok(docs)
    }

    async fn ordered_districts(&self) -> Result<Vec<District>> {
        let divisions: Vec<Division> = self.collection(DIVISIONS_COLLECTION).await?;
        let districts = self.collection(DISTRICTS_COLLECTION).await?;
        Ok(order_by_parent(districts, &divisions))
    }

    async fn ordered_upazilas(&self) -> Result<Vec<Upazila>> {
        let districts = self.ordered_districts().await?;
        let upazilas = self.collection(UPAZILAS_COLLECTION).await?;
        Ok(order_by_parent(upazilas, &districts))
    }
}

/// Stable-sorts children so they follow their parents' order.
fn order_by_parent<C: Named, P: Named>(mut children: Vec<C>, parents: &[P]) -> Vec<C> {
    let position: HashMap<&str, usize> = parents
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id(), i))
        .collect();
    children.sort_by_key(|c| {
        c.parent_id()
            .and_then(|id| position.get(id).copied())
            .unwrap_or(usize::MAX)
    });
    children
}

/// Resolves a parent by exact id, then by normalized name.
fn resolve<'a, P: Named>(parents: &'a [P], key: &str) -> Option<&'a P> {
    parents.iter().find(|p| p.id() == key).or_else(|| {
        let name = normalize_name(key);
        parents.iter().find(|p| same_name(p.name(), &name))
    })
}

#[async_trait]
impl HierarchyStore for DocumentStore {
    fn backend(&self) -> &'static str {
        "document"
    }

    async fn divisions(&self) -> Result<Vec<Division>> {
        self.collection(DIVISIONS_COLLECTION).await
    }

    async fn districts(&self) -> Result<Vec<District>> {
        self.ordered_districts().await
    }

    async fn upazilas(&self) -> Result<Vec<Upazila>> {
        self.ordered_upazilas().await
    }

    async fn unions(&self) -> Result<Vec<Union>> {
        let upazilas = self.ordered_upazilas().await?;
        let unions = self.collection(UNIONS_COLLECTION).await?;
        Ok(order_by_parent(unions, &upazilas))
    }

    #[instrument(skip(self))]
    async fn districts_of(&self, division: &str) -> Result<Vec<District>> {
        let divisions: Vec<Division> = self.collection(DIVISIONS_COLLECTION).await?;
        let districts = match resolve(&divisions, division) {
            Some(parent) => self
                .collection::<District>(DISTRICTS_COLLECTION)
                .await?
                .into_iter()
                .filter(|d| d.division_id == parent.id)
                .collect(),
            None => Vec::new(),
        };
        non_empty(districts, || format!("No districts found for division: {division}."))
    }

    #[instrument(skip(self))]
    async fn upazilas_of(&self, district: &str) -> Result<Vec<Upazila>> {
        let districts = self.ordered_districts().await?;
        let upazilas = match resolve(&districts, district) {
            Some(parent) => self
                .collection::<Upazila>(UPAZILAS_COLLECTION)
                .await?
                .into_iter()
                .filter(|u| u.district_id == parent.id)
                .collect(),
            None => Vec::new(),
        };
        non_empty(upazilas, || format!("No upazilas found for district: {district}."))
    }

    #[instrument(skip(self))]
    async fn unions_of(&self, upazila_id: &str) -> Result<Vec<Union>> {
        let unions = self
            .collection::<Union>(UNIONS_COLLECTION)
            .await?
            .into_iter()
            .filter(|u| u.upazila_id == upazila_id)
            .collect();
        non_empty(unions, || format!("No unions found for upazila ID: {upazila_id}."))
    }
}

/// Writes a dataset as document collections into `dir`.
///
/// Each collection is written to a temp file and renamed into place, so a
/// running server never reads a half-written collection.
#[instrument(skip(dataset, dir), fields(dir = %dir.as_ref().display()))]
pub async fn export_dataset(dataset: &Dataset, dir: impl AsRef<Path>) -> Result<()> {
    dataset.validate()?;
    let dir = dir.as_ref();
    fs::create_dir_all(dir).await?;

    write_collection(dir, DIVISIONS_COLLECTION, &dataset.divisions).await?;
    write_collection(dir, DISTRICTS_COLLECTION, &dataset.districts).await?;
    write_collection(dir, UPAZILAS_COLLECTION, &dataset.upazilas).await?;
    write_collection(dir, UNIONS_COLLECTION, &dataset.unions).await?;

    let counts = dataset.counts();
    info!(
        divisions = counts.divisions,
        districts = counts.districts,
        upazilas = counts.upazilas,
        unions = counts.unions,
        "Exported dataset"
    );
    Ok(())
}

async fn write_collection<T: Serialize>(dir: &Path, name: &str, docs: &[T]) -> Result<()> {
    let serialized = serde_json::to_vec_pretty(docs)?;
    let path = collection_path(dir, name);
    let temp_path = path.with_extension("json.tmp");

    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(&serialized).await?;
    file.sync_all().await?;
    fs::rename(&temp_path, &path).await?;

    debug!(collection = name, count = docs.len(), "Wrote collection");
    Ok(())
}
