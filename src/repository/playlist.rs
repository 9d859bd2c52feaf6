use crate::error::{MusicError, StoreError};
use crate::services::music::track::Track;
use serde::{Deserialize, Serialize};
use serenity::all::UserId;
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const PLAYLIST_CAPACITY: usize = 25;

/// On-disk value for one playlist, keyed by name in the owner's file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistRecord {
    pub public: bool,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

type OwnerRecords = BTreeMap<String, PlaylistRecord>;

#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub owner: UserId,
    pub public: bool,
    pub tracks: Vec<Track>,
}

impl Playlist {
    fn from_record(owner: UserId, name: &str, record: &PlaylistRecord) -> Self {
        Self {
            id: playlist_id(owner, name),
            name: name.to_string(),
            owner,
            public: record.public,
            tracks: record.tracks.clone(),
        }
    }
}

/// Name-derived id, so a rename yields a new id.
pub fn playlist_id(owner: UserId, name: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, format!("{}{}", owner.get(), name).as_bytes())
        .simple()
        .to_string()
}

fn name_for(records: &OwnerRecords, owner: UserId, id: &str) -> Result<String, MusicError> {
    records
        .keys()
        .find(|name| playlist_id(owner, name) == id)
        .cloned()
        .ok_or(MusicError::NotFound)
}

/// Playlists stored as one `{owner_id}.json` file per owner.
pub struct PlaylistStore {
    dir: PathBuf,
    locks: parking_lot::Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl PlaylistStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, owner: UserId) -> PathBuf {
        self.dir.join(format!("{}.json", owner.get()))
    }

    fn owner_lock(&self, owner: UserId) -> Arc<Mutex<()>> {
        self.locks.lock().entry(owner).or_default().clone()
    }

    async fn read(&self, owner: UserId) -> Result<OwnerRecords, StoreError> {
        read_file(&self.path(owner)).await
    }

    async fn write(&self, owner: UserId, records: &OwnerRecords) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(owner);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read-modify-write of one owner's file under that owner's lock. Nothing
    /// is written when `change` rejects.
    async fn mutate<T>(
        &self,
        owner: UserId,
        change: impl FnOnce(&mut OwnerRecords) -> Result<T, MusicError>,
    ) -> Result<T, StoreError> {
        let lock = self.owner_lock(owner);
        let _guard = lock.lock().await;

        let mut records = self.read(owner).await?;
        let out = change(&mut records)?;
        self.write(owner, &records).await?;
        Ok(out)
    }

    pub async fn create(
        &self,
        owner: UserId,
        name: &str,
        public: bool,
    ) -> Result<Playlist, StoreError> {
        let name = name.trim().to_string();
        self.mutate(owner, |records| {
            if records.contains_key(&name) {
                return Err(MusicError::DuplicateName(name.clone()));
            }
            let record = PlaylistRecord {
                public,
                tracks: Vec::new(),
            };
            let playlist = Playlist::from_record(owner, &name, &record);
            records.insert(name, record);
            Ok(playlist)
        })
        .await
    }

    pub async fn list(&self, owner: UserId) -> Result<Vec<Playlist>, StoreError> {
        let records = self.read(owner).await?;
        Ok(records
            .iter()
            .map(|(name, record)| Playlist::from_record(owner, name, record))
            .collect())
    }

    pub async fn rename(
        &self,
        owner: UserId,
        id: &str,
        new_name: &str,
    ) -> Result<Playlist, StoreError> {
        let new_name = new_name.trim().to_string();
        self.mutate(owner, |records| {
            let name = name_for(records, owner, id)?;
            if name != new_name && records.contains_key(&new_name) {
                return Err(MusicError::DuplicateName(new_name.clone()));
            }
            let record = records.remove(&name).unwrap_or_default();
            let playlist = Playlist::from_record(owner, &new_name, &record);
            records.insert(new_name, record);
            Ok(playlist)
        })
        .await
    }

    pub async fn set_visibility(
        &self,
        owner: UserId,
        id: &str,
        public: bool,
    ) -> Result<Playlist, StoreError> {
        self.mutate(owner, |records| {
            let name = name_for(records, owner, id)?;
            let record = records.entry(name.clone()).or_default();
            record.public = public;
            Ok(Playlist::from_record(owner, &name, record))
        })
        .await
    }

    /// Appends `tracks`, returning the new length.
    pub async fn append(
        &self,
        owner: UserId,
        id: &str,
        tracks: Vec<Track>,
    ) -> Result<usize, StoreError> {
        self.mutate(owner, |records| {
            let name = name_for(records, owner, id)?;
            let record = records.entry(name).or_default();
            if tracks.len() > PLAYLIST_CAPACITY
                || record.tracks.len() + tracks.len() > PLAYLIST_CAPACITY
            {
                return Err(MusicError::CapacityExceeded {
                    limit: PLAYLIST_CAPACITY,
                });
            }
            record.tracks.extend(tracks);
            Ok(record.tracks.len())
        })
        .await
    }

    /// Removes the track at 1-based `position`.
    pub async fn remove_track_at(
        &self,
        owner: UserId,
        id: &str,
        position: usize,
    ) -> Result<Track, StoreError> {
        self.mutate(owner, |records| {
            let name = name_for(records, owner, id)?;
            let record = records.entry(name).or_default();
            if position == 0 || position > record.tracks.len() {
                return Err(MusicError::InvalidPosition {
                    position,
                    len: record.tracks.len(),
                });
            }
            Ok(record.tracks.remove(position - 1))
        })
        .await
    }

    pub async fn delete(&self, owner: UserId, id: &str) -> Result<Playlist, StoreError> {
        self.mutate(owner, |records| {
            let name = name_for(records, owner, id)?;
            let record = records.remove(&name).unwrap_or_default();
            Ok(Playlist::from_record(owner, &name, &record))
        })
        .await
    }

    /// Finds a playlist by id across all owners. Private playlists are only
    /// visible to their owner.
    pub async fn resolve(&self, id: &str, requester: UserId) -> Result<Playlist, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(MusicError::NotFound.into());
            }
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(owner) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|id| *id != 0)
                .map(UserId::new)
            else {
                continue;
            };

            let records = match read_file(&path).await {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable playlist file");
                    continue;
                }
            };
            if let Some((name, record)) = records
                .iter()
                .find(|(name, _)| playlist_id(owner, name) == id)
            {
                if !record.public && owner != requester {
                    return Err(MusicError::NotPublicAndNotOwner.into());
                }
                return Ok(Playlist::from_record(owner, name, record));
            }
        }

        Err(MusicError::NotFound.into())
    }
}

async fn read_file(path: &Path) -> Result<OwnerRecords, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(OwnerRecords::new()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::music::track::fixtures::track;
    use tempfile::TempDir;

    const ALICE: UserId = UserId::new(111);
    const BOB: UserId = UserId::new(222);

    fn store() -> (TempDir, PlaylistStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new(dir.path());
        (dir, store)
    }

    fn rejection(err: StoreError) -> MusicError {
        match err {
            StoreError::Rejected(e) => e,
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let (_dir, store) = store();
        store.create(ALICE, "chill", false).await.unwrap();
        let err = store.create(ALICE, "chill", true).await.unwrap_err();
        assert_eq!(rejection(err), MusicError::DuplicateName("chill".into()));

        // Names are scoped per owner.
        store.create(BOB, "chill", false).await.unwrap();
    }

    #[tokio::test]
    async fn rename_changes_id() {
        let (_dir, store) = store();
        let created = store.create(ALICE, "old", false).await.unwrap();
        let renamed = store.rename(ALICE, &created.id, "new").await.unwrap();

        assert_ne!(created.id, renamed.id);
        assert_eq!(renamed.id, playlist_id(ALICE, "new"));
        let err = store.rename(ALICE, &created.id, "other").await.unwrap_err();
        assert_eq!(rejection(err), MusicError::NotFound);
    }

    #[tokio::test]
    async fn capacity_is_enforced_per_batch_and_total() {
        let (_dir, store) = store();
        let id = store.create(ALICE, "mix", false).await.unwrap().id;

        let big: Vec<_> = (0..PLAYLIST_CAPACITY + 1).map(|i| track(&format!("t{i}"))).collect();
        let err = store.append(ALICE, &id, big).await.unwrap_err();
        assert!(matches!(rejection(err), MusicError::CapacityExceeded { .. }));

        let most: Vec<_> = (0..PLAYLIST_CAPACITY - 1).map(|i| track(&format!("t{i}"))).collect();
        assert_eq!(store.append(ALICE, &id, most).await.unwrap(), PLAYLIST_CAPACITY - 1);

        let err = store
            .append(ALICE, &id, vec![track("x"), track("y")])
            .await
            .unwrap_err();
        assert!(matches!(rejection(err), MusicError::CapacityExceeded { .. }));
        assert_eq!(store.append(ALICE, &id, vec![track("x")]).await.unwrap(), PLAYLIST_CAPACITY);
    }

    #[tokio::test]
    async fn private_playlists_resolve_only_for_owner() {
        let (_dir, store) = store();
        let id = store.create(ALICE, "secret", false).await.unwrap().id;

        assert_eq!(store.resolve(&id, ALICE).await.unwrap().name, "secret");
        let err = store.resolve(&id, BOB).await.unwrap_err();
        assert_eq!(rejection(err), MusicError::NotPublicAndNotOwner);

        store.set_visibility(ALICE, &id, true).await.unwrap();
        assert_eq!(store.resolve(&id, BOB).await.unwrap().owner, ALICE);

        let err = store.resolve("missing", BOB).await.unwrap_err();
        assert_eq!(rejection(err), MusicError::NotFound);
    }

    #[tokio::test]
    async fn remove_track_positions_are_one_based() {
        let (_dir, store) = store();
        let id = store.create(ALICE, "list", true).await.unwrap().id;
        store
            .append(ALICE, &id, vec![track("a"), track("b"), track("c")])
            .await
            .unwrap();

        let removed = store.remove_track_at(ALICE, &id, 2).await.unwrap();
        assert_eq!(removed.info.identifier, "b");

        let err = store.remove_track_at(ALICE, &id, 0).await.unwrap_err();
        assert_eq!(rejection(err), MusicError::InvalidPosition { position: 0, len: 2 });

        let titles: Vec<_> = store.list(ALICE).await.unwrap()[0]
            .tracks
            .iter()
            .map(|t| t.info.identifier.clone())
            .collect();
        assert_eq!(titles, ["a", "c"]);
    }

    #[tokio::test]
    async fn file_layout_matches_node_tracks() {
        let (dir, store) = store();
        let id = store.create(ALICE, "wire", false).await.unwrap().id;
        store.append(ALICE, &id, vec![track("a")]).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("111.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let stored = &value["wire"]["tracks"][0];
        assert_eq!(stored["encoded"], "enc-a");
        assert_eq!(stored["info"]["sourceName"], "youtube");
        assert_eq!(stored["info"]["isSeekable"], true);
        assert!(!dir.path().join("111.json.tmp").exists());
    }

    #[tokio::test]
    async fn delete_then_list_is_empty() {
        let (_dir, store) = store();
        let id = store.create(ALICE, "gone", false).await.unwrap().id;
        store.delete(ALICE, &id).await.unwrap();
        assert!(store.list(ALICE).await.unwrap().is_empty());
    }
}
