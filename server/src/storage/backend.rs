use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use dashmap::DashMap;
use futures::TryStreamExt;
use object_store::aws::{AmazonS3Builder, S3ConditionalPut};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutMode, PutPayload};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared_types::{ConfigItem, ConfigKey, ListFilter, Pagination, VersionRecord};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::StorageConfig;
use super::error::{StorageError, StorageResult};
use super::metadata::{KeyClaim, Tombstone};
use super::traits::{ConfigStorage, ItemDraft};

/// Attempts at claiming the next version before reporting a conflict
const MAX_VERSION_ATTEMPTS: u32 = 5;

/// Age after which an uncommitted ledger slot is treated as left by a crashed writer
pub const DEFAULT_ABANDON_AFTER: Duration = Duration::from_secs(60);

type LockMap<K> = DashMap<K, Arc<Mutex<()>>>;

/// `ConfigStorage` on top of any `object_store` backend.
///
/// Layout:
/// - `items/{id}.json` live item; writing it commits a mutation
/// - `keys/{app}/{namespace}/{key}` claim enforcing one item per key
/// - `versions/{id}/{version}.json` ledger, created with no-overwrite semantics
/// - `tombstones/{id}.json` last committed version of a deleted item
///
/// Every transition of an item, update or delete, first claims ledger slot
/// `version + 1`. Claiming is the only arbitration between writers, across
/// processes too: whoever holds the slot is the only one allowed to touch
/// `items/{id}.json` for that transition. Updates fill the slot with their
/// `VersionRecord`, deletes with their `Tombstone`.
///
/// Readers only see records up to the committed version, so a slot whose
/// item write failed is never observable and is retracted before the error
/// is returned. A slot left behind by a crashed writer is reclaimed once it
/// is older than `abandon_after`.
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    item_locks: LockMap<Uuid>,
    key_locks: LockMap<ConfigKey>,
    abandon_after: Duration,
}

impl ObjectStoreBackend {
    pub fn from_config(config: StorageConfig) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match config {
            StorageConfig::Memory => Arc::new(InMemory::new()),
            StorageConfig::Local { path } => Arc::new(LocalFileSystem::new_with_prefix(path)?),
            StorageConfig::S3 {
                bucket,
                region,
                endpoint,
                access_key_id,
                secret_access_key,
                allow_http,
            } => {
                let mut builder = AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_allow_http(allow_http)
                    .with_conditional_put(S3ConditionalPut::ETagMatch);
                if let Some(region) = region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                if let Some(access_key_id) = access_key_id {
                    builder = builder.with_access_key_id(access_key_id);
                }
                if let Some(secret_access_key) = secret_access_key {
                    builder = builder.with_secret_access_key(secret_access_key);
                }
                Arc::new(builder.build()?)
            }
        };
        Ok(Self::new(store))
    }

    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            item_locks: DashMap::new(),
            key_locks: DashMap::new(),
            abandon_after: DEFAULT_ABANDON_AFTER,
        }
    }

    pub fn with_abandon_after(mut self, abandon_after: Duration) -> Self {
        self.abandon_after = abandon_after;
        self
    }

    fn item_path(&self, id: Uuid) -> Path {
        Path::from(format!("items/{id}.json"))
    }

    fn claim_path(&self, key: &ConfigKey) -> Path {
        // Each part is encoded on its own so a '/' inside a key cannot alias another key
        Path::from_iter([
            "keys",
            key.app_id.as_str(),
            key.namespace.as_str(),
            key.key.as_str(),
        ])
    }

    fn version_prefix(&self, id: Uuid) -> Path {
        Path::from(format!("versions/{id}"))
    }

    fn version_path(&self, id: Uuid, version: u64) -> Path {
        Path::from(format!("versions/{id}/{version:020}.json"))
    }

    fn tombstone_path(&self, id: Uuid) -> Path {
        Path::from(format!("tombstones/{id}.json"))
    }

    fn lock_for<K: Hash + Eq + Clone>(locks: &LockMap<K>, key: &K) -> Arc<Mutex<()>> {
        Arc::clone(&locks.entry(key.clone()).or_default())
    }

    /// Drops the lock entry once nobody but the map holds it
    fn prune_lock<K: Hash + Eq>(locks: &LockMap<K>, key: &K) {
        locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Version encoded in a ledger object name
    fn slot_version(path: &Path) -> Option<u64> {
        path.filename()?.strip_suffix(".json")?.parse().ok()
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> StorageResult<Option<T>> {
        match self.store.get(path).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(value)?;
        self.store.put(path, PutPayload::from(json)).await?;
        Ok(())
    }

    /// Writes only if nothing exists at `path`. Returns `false` when it was taken.
    async fn create_json<T: Serialize>(&self, path: &Path, value: &T) -> StorageResult<bool> {
        let json = serde_json::to_vec_pretty(value)?;
        match self
            .store
            .put_opts(path, PutPayload::from(json), PutMode::Create.into())
            .await
        {
            Ok(_) => Ok(true),
            Err(object_store::Error::AlreadyExists { .. })
            | Err(object_store::Error::Precondition { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, path: &Path) -> StorageResult<()> {
        match self.store.delete(path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Undo a step of a failed unit of work. The original error is what the caller sees.
    async fn retract(&self, path: &Path) {
        if let Err(e) = self.remove(path).await {
            warn!(%path, error = %e, "Failed to retract object after aborted write");
        }
    }

    async fn read_item(&self, id: Uuid) -> StorageResult<Option<ConfigItem>> {
        self.read_json(&self.item_path(id)).await
    }

    async fn read_tombstone(&self, id: Uuid) -> StorageResult<Option<Tombstone>> {
        self.read_json(&self.tombstone_path(id)).await
    }

    /// Take ownership of `key` for `id`.
    ///
    /// A claim left behind by a deleted item (recognised by its tombstone) is
    /// replaced; a claim with neither item nor tombstone belongs to a create
    /// still in flight and is respected.
    async fn claim_key(&self, key: &ConfigKey, id: Uuid) -> StorageResult<()> {
        let path = self.claim_path(key);
        let claim = KeyClaim { id };

        for _ in 0..2 {
            if self.create_json(&path, &claim).await? {
                return Ok(());
            }

            let Some(existing) = self.read_json::<KeyClaim>(&path).await? else {
                // Released between our attempt and the read
                continue;
            };

            let live = self.read_item(existing.id).await?.is_some();
            if !live && self.read_tombstone(existing.id).await?.is_some() {
                debug!(%key, stale = %existing.id, "Replacing stale key claim");
                self.write_json(&path, &claim).await?;
                return Ok(());
            }
            break;
        }

        Err(StorageError::AlreadyExists(key.to_string()))
    }

    /// Ledger half of the unit of work. `false` means the version is taken.
    async fn append_version(&self, record: &VersionRecord) -> StorageResult<bool> {
        self.create_json(&self.version_path(record.config_id, record.version), record)
            .await
    }

    /// Whether slot `seen + 1` is held by a writer that will never commit it.
    ///
    /// Only true while the item is still at `seen` and the slot is older than
    /// `abandon_after`.
    async fn slot_is_abandoned(&self, id: Uuid, seen: u64) -> StorageResult<bool> {
        match self.read_item(id).await? {
            Some(item) if item.version == seen => {}
            _ => return Ok(false),
        }

        let meta = match self.store.head(&self.version_path(id, seen + 1)).await {
            Ok(meta) => meta,
            Err(object_store::Error::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let limit = TimeDelta::from_std(self.abandon_after).unwrap_or(TimeDelta::MAX);
        Ok(Utc::now() - meta.last_modified >= limit)
    }

    /// Claim the ledger slot for the next transition of `id`.
    ///
    /// `build` turns the current item into the transition's result and the
    /// entry stored in the slot. It is re-run against a fresh read whenever
    /// another writer got the slot first. Returns the current item, the
    /// result and the claimed version.
    async fn claim_next_slot<T, S>(
        &self,
        id: Uuid,
        build: impl Fn(&ConfigItem) -> (T, S) + Send + Sync,
    ) -> StorageResult<(ConfigItem, T, u64)>
    where
        T: Send,
        S: Serialize + Send + Sync,
    {
        let mut attempted = 0;
        for attempt in 1..=MAX_VERSION_ATTEMPTS {
            let current = self
                .read_item(id)
                .await?
                .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

            let slot = current.version + 1;
            attempted = slot;
            let (result, entry) = build(&current);

            if self.create_json(&self.version_path(id, slot), &entry).await? {
                return Ok((current, result, slot));
            }

            if self.slot_is_abandoned(id, current.version).await? {
                warn!(%id, version = slot, "Reclaiming abandoned ledger slot");
                self.remove(&self.version_path(id, slot)).await?;
                continue;
            }

            warn!(%id, version = slot, attempt, "Version already claimed, re-reading");
            tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
        }

        Err(StorageError::VersionConflict {
            id,
            version: attempted,
        })
    }

    /// Commit half of the unit of work; retracts the ledger record on failure.
    async fn publish(&self, item: &ConfigItem) -> StorageResult<()> {
        if let Err(e) = self.write_json(&self.item_path(item.id), item).await {
            self.retract(&self.version_path(item.id, item.version)).await;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStorage for ObjectStoreBackend {
    async fn create(&self, key: &ConfigKey, draft: ItemDraft) -> StorageResult<ConfigItem> {
        let lock = Self::lock_for(&self.key_locks, key);
        let guard = lock.lock().await;

        let created = async {
            let id = Uuid::new_v4();
            self.claim_key(key, id).await?;

            let now = Utc::now();
            let item = draft.into_item(id, key.clone(), 1, now, now);

            let committed = match self.append_version(&item.version_record()).await {
                Ok(true) => self.publish(&item).await,
                Ok(false) => Err(StorageError::VersionConflict { id, version: 1 }),
                Err(e) => Err(e),
            };
            if let Err(e) = committed {
                self.retract(&self.claim_path(key)).await;
                return Err(e);
            }
            Ok::<_, StorageError>(item)
        }
        .await;

        drop(guard);
        drop(lock);
        Self::prune_lock(&self.key_locks, key);

        let item = created?;
        debug!(%key, id = %item.id, "Created config item");
        Ok(item)
    }

    async fn update(&self, id: Uuid, draft: ItemDraft) -> StorageResult<ConfigItem> {
        let lock = Self::lock_for(&self.item_locks, &id);
        let guard = lock.lock().await;

        let updated = async {
            // The no-overwrite slot write is the compare-and-swap on the version:
            // only one writer, in this process or another, can win it.
            let (_, next, _) = self
                .claim_next_slot(id, |current| {
                    let next = draft.clone().into_item(
                        id,
                        current.config_key.clone(),
                        current.version + 1,
                        current.created_at,
                        Utc::now(),
                    );
                    let record = next.version_record();
                    (next, record)
                })
                .await?;

            self.publish(&next).await?;
            Ok::<_, StorageError>(next)
        }
        .await;

        drop(guard);
        drop(lock);
        Self::prune_lock(&self.item_locks, &id);

        let next = updated?;
        debug!(%id, version = next.version, "Updated config item");
        Ok(next)
    }

    async fn delete(&self, id: Uuid) -> StorageResult<ConfigKey> {
        let lock = Self::lock_for(&self.item_locks, &id);
        let guard = lock.lock().await;

        let deleted = async {
            // Holding the next slot keeps any concurrent update from republishing the item
            let (item, tombstone, slot) = self
                .claim_next_slot(id, |current| {
                    let tombstone =
                        Tombstone::new(id, current.config_key.clone(), current.version);
                    (tombstone.clone(), tombstone)
                })
                .await?;
            let slot_path = self.version_path(id, slot);

            let tombstone_path = self.tombstone_path(id);
            if let Err(e) = self.write_json(&tombstone_path, &tombstone).await {
                self.retract(&slot_path).await;
                return Err(e);
            }

            if let Err(e) = self.remove(&self.item_path(id)).await {
                self.retract(&tombstone_path).await;
                self.retract(&slot_path).await;
                return Err(e);
            }

            // A claim that survives here is recognised as stale through the tombstone
            if let Err(e) = self.remove(&self.claim_path(&item.config_key)).await {
                warn!(key = %item.config_key, error = %e, "Failed to release key claim");
            }
            Ok::<_, StorageError>(item)
        }
        .await;

        drop(guard);
        drop(lock);
        Self::prune_lock(&self.item_locks, &id);

        let item = deleted?;
        debug!(key = %item.config_key, %id, "Deleted config item");
        Ok(item.config_key)
    }

    async fn get(&self, id: Uuid) -> StorageResult<ConfigItem> {
        self.read_item(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn get_active_by_key(&self, key: &ConfigKey) -> StorageResult<ConfigItem> {
        let not_found = || StorageError::NotFound(key.to_string());

        let claim = self
            .read_json::<KeyClaim>(&self.claim_path(key))
            .await?
            .ok_or_else(not_found)?;

        let item = self.read_item(claim.id).await?.ok_or_else(not_found)?;
        if item.config_key != *key || !item.is_active {
            return Err(not_found());
        }
        Ok(item)
    }

    async fn list(&self, filter: &ListFilter, page: Pagination) -> StorageResult<Vec<ConfigItem>> {
        let prefix = Path::from("items");
        let locations: Vec<Path> = self
            .store
            .list(Some(&prefix))
            .map_ok(|meta| meta.location)
            .try_collect()
            .await?;

        let reads = locations.iter().map(|path| self.read_json::<ConfigItem>(path));
        let mut items: Vec<ConfigItem> = futures::future::try_join_all(reads)
            .await?
            .into_iter()
            // Deleted between listing and reading
            .flatten()
            .filter(|item| filter.matches(&item.config_key))
            .collect();

        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(items
            .into_iter()
            .skip(page.offset())
            .take(page.size)
            .collect())
    }

    async fn history(&self, id: Uuid) -> StorageResult<Vec<VersionRecord>> {
        let committed = match self.read_item(id).await? {
            Some(item) => item.version,
            None => match self.read_tombstone(id).await? {
                Some(tombstone) => tombstone.version,
                None => return Ok(Vec::new()),
            },
        };

        let prefix = self.version_prefix(id);
        let locations: Vec<Path> = self
            .store
            .list(Some(&prefix))
            .map_ok(|meta| meta.location)
            .try_collect()
            .await?;

        // Slots above the committed version are pending or hold a deletion
        let reads = locations
            .iter()
            .filter(|path| Self::slot_version(path).is_some_and(|v| v <= committed))
            .map(|path| self.read_json::<VersionRecord>(path));
        let mut records: Vec<VersionRecord> = futures::future::try_join_all(reads)
            .await?
            .into_iter()
            .flatten()
            .collect();

        records.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(records)
    }
}
