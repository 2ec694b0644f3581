//! Release-host and package-index interfaces.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reversion_schema::wheel::strip_local_version;
use thiserror::Error;

/// Tag prefix of release tags, as in `release_2.18.0`.
pub const RELEASE_TAG_PREFIX: &str = "release_";

/// Failure reported by a collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The referenced asset or release does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service refused or failed the request.
    #[error("request failed: {0}")]
    Request(String),
}

/// Which release to operate on, and with what credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct ReleaseTarget {
    /// `owner/name` of the hosting repository.
    pub repository: String,
    /// Host-assigned release identifier.
    pub release_id: u64,
    /// Bearer token, if the host requires one.
    pub token: Option<String>,
}

impl ReleaseTarget {
    /// A target without credentials.
    pub fn new(repository: impl Into<String>, release_id: u64) -> Self {
        Self {
            repository: repository.into(),
            release_id,
            token: None,
        }
    }

    /// Attach a bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// The version named by a `release_<version>` tag.
    pub fn version_of_tag(tag: &str) -> Option<&str> {
        tag.strip_prefix(RELEASE_TAG_PREFIX).filter(|v| !v.is_empty())
    }
}

impl fmt::Debug for ReleaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseTarget")
            .field("repository", &self.repository)
            .field("release_id", &self.release_id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// An asset attached to a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Host-assigned identifier.
    pub id: u64,
    /// File name, unique within a release.
    pub name: String,
}

/// A file the package index serves for a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    /// Download URL.
    pub url: String,
    /// File name.
    pub filename: String,
}

impl IndexedFile {
    /// Build an entry.
    pub fn new(url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: filename.into(),
        }
    }
}

/// Release host that stores assets by name.
#[async_trait]
pub trait ReleaseAssetStore: Send + Sync {
    /// Assets currently attached to the release.
    async fn list_assets(&self, release: &ReleaseTarget) -> Result<Vec<Asset>, CollaboratorError>;

    /// Upload `bytes` as asset `name`.
    async fn put_asset(
        &self,
        release: &ReleaseTarget,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<Asset, CollaboratorError>;

    /// Remove an asset.
    async fn delete_asset(
        &self,
        release: &ReleaseTarget,
        asset_id: u64,
    ) -> Result<(), CollaboratorError>;
}

/// Package index that lists the files published for a version.
#[async_trait]
pub trait PackageIndex: Send + Sync {
    /// Files published for `version`; empty if none.
    async fn resolve_version(&self, version: &str) -> Result<Vec<IndexedFile>, CollaboratorError>;
}

/// Upload `bytes` as `name`, first deleting any asset already holding that
/// name. Repeating the call leaves exactly one asset named `name`.
///
/// # Errors
///
/// Propagates the first collaborator failure.
pub async fn replace_asset<S>(
    store: &S,
    release: &ReleaseTarget,
    name: &str,
    bytes: Vec<u8>,
) -> Result<Asset, CollaboratorError>
where
    S: ReleaseAssetStore + ?Sized,
{
    for existing in store.list_assets(release).await? {
        if existing.name == name {
            tracing::debug!(asset = %name, id = existing.id, "deleting existing asset");
            store.delete_asset(release, existing.id).await?;
        }
    }
    let asset = store.put_asset(release, name, bytes).await?;
    tracing::info!(asset = %name, id = asset.id, release = release.release_id, "uploaded asset");
    Ok(asset)
}

/// Where one release asset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossPost {
    /// File to download.
    pub source: IndexedFile,
    /// Whether the downloaded wheel carries a local version and must be
    /// reversioned before upload.
    pub needs_reversion: bool,
}

/// Decide, for every build of a version, whether to take the published copy
/// from the index or reversion the build itself.
///
/// A build is covered by a published file when [`strip_local_version`] maps
/// its name onto one.
pub fn plan_cross_posts(builds: &[IndexedFile], published: &[IndexedFile]) -> Vec<CrossPost> {
    let published: HashMap<&str, &IndexedFile> =
        published.iter().map(|f| (f.filename.as_str(), f)).collect();

    builds
        .iter()
        .map(|build| match published.get(strip_local_version(&build.filename).as_str()) {
            Some(file) => CrossPost {
                source: (*file).clone(),
                needs_reversion: false,
            },
            None => CrossPost {
                source: build.clone(),
                needs_reversion: true,
            },
        })
        .collect()
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    releases: HashMap<u64, BTreeMap<u64, (String, Vec<u8>)>>,
}

/// An in-process [`ReleaseAssetStore`].
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    state: Mutex<MemoryState>,
}

impl MemoryAssetStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of the asset named `name`, if any.
    pub fn contents(&self, release: &ReleaseTarget, name: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .releases
            .get(&release.release_id)?
            .values()
            .find(|(n, _)| n == name)
            .map(|(_, bytes)| bytes.clone())
    }
}

#[async_trait]
impl ReleaseAssetStore for MemoryAssetStore {
    async fn list_assets(&self, release: &ReleaseTarget) -> Result<Vec<Asset>, CollaboratorError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state
            .releases
            .get(&release.release_id)
            .map(|assets| {
                assets
                    .iter()
                    .map(|(&id, (name, _))| Asset {
                        id,
                        name: name.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn put_asset(
        &self,
        release: &ReleaseTarget,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<Asset, CollaboratorError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let assets = state.releases.entry(release.release_id).or_default();
        if assets.values().any(|(n, _)| n == name) {
            return Err(CollaboratorError::Request(format!(
                "asset {name} already exists"
            )));
        }
        state.next_id += 1;
        let id = state.next_id;
        state
            .releases
            .entry(release.release_id)
            .or_default()
            .insert(id, (name.to_string(), bytes));
        Ok(Asset {
            id,
            name: name.to_string(),
        })
    }

    async fn delete_asset(
        &self,
        release: &ReleaseTarget,
        asset_id: u64,
    ) -> Result<(), CollaboratorError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .releases
            .get_mut(&release.release_id)
            .and_then(|assets| assets.remove(&asset_id))
            .map(|_| ())
            .ok_or_else(|| CollaboratorError::NotFound(format!("asset {asset_id}")))
    }
}
