//! Browse screen: cached listing, background poster frames, deletion
//!
//! The listing is read once when the gallery opens. Each entry carries its
//! own poster state, so removing an entry can never leave posters shifted
//! onto the wrong clip.

use crate::errors::DiaryError;
use crate::poster::{PosterDecoder, PosterFrame};
use crate::storage::VideoStore;
use crate::types::VideoRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq)]
pub enum PosterState {
    /// Not requested yet
    Pending,
    Decoding,
    Ready(Arc<PosterFrame>),
    /// Decoding failed; never retried
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub record: VideoRecord,
    pub poster: PosterState,
}

type PosterResult = (PathBuf, Result<PosterFrame, DiaryError>);

pub struct Gallery {
    store: Arc<VideoStore>,
    decoder: Arc<dyn PosterDecoder>,
    entries: Vec<GalleryEntry>,
    tasks: JoinSet<PosterResult>,
    closed: bool,
}

impl Gallery {
    /// List the store once and cache the result
    pub fn open(store: Arc<VideoStore>, decoder: Arc<dyn PosterDecoder>) -> Self {
        let entries = store
            .records()
            .into_iter()
            .map(|record| GalleryEntry {
                record,
                poster: PosterState::Pending,
            })
            .collect::<Vec<_>>();
        log::debug!("Gallery opened with {} clips", entries.len());

        Self {
            store,
            decoder,
            entries,
            tasks: JoinSet::new(),
            closed: false,
        }
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start decoding every poster that has not been requested yet
    ///
    /// Must be called from within a tokio runtime. Returns how many decodes
    /// were started.
    pub fn request_posters(&mut self) -> usize {
        if self.closed {
            return 0;
        }

        let mut started = 0;
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.poster == PosterState::Pending)
        {
            entry.poster = PosterState::Decoding;
            let path = entry.record.path.clone();
            let decoder = self.decoder.clone();
            self.tasks.spawn_blocking(move || {
                let result = decoder.decode(&path);
                (path, result)
            });
            started += 1;
        }
        started
    }

    /// Wait for the next poster and apply it
    ///
    /// Returns the clip it belonged to, or `None` once nothing is in flight.
    /// Results for clips deleted in the meantime are dropped, and so is
    /// everything once the gallery is closed.
    pub async fn next_poster(&mut self) -> Option<PathBuf> {
        if self.closed {
            return None;
        }
        while let Some(joined) = self.tasks.join_next().await {
            let (path, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    log::debug!("Poster task ended early: {}", e);
                    continue;
                }
            };

            let Some(entry) = self.entries.iter_mut().find(|e| e.record.path == path) else {
                log::debug!("Dropping poster for removed clip {:?}", path);
                continue;
            };

            entry.poster = match result {
                Ok(frame) => PosterState::Ready(Arc::new(frame)),
                Err(e) => {
                    log::warn!("Poster decode failed for {:?}: {}", path, e);
                    PosterState::Placeholder
                }
            };
            return Some(path);
        }
        None
    }

    /// Request every poster and wait for all of them
    pub async fn load_posters(&mut self) {
        self.request_posters();
        while self.next_poster().await.is_some() {}
    }

    pub fn poster(&self, index: usize) -> Option<&PosterState> {
        self.entries.get(index).map(|e| &e.poster)
    }

    /// Path of the clip to play
    pub fn select(&self, index: usize) -> Option<&Path> {
        self.entries.get(index).map(|e| e.record.path.as_path())
    }

    /// Delete clip `index` from the store and from the listing
    pub fn delete(&mut self, index: usize) -> Option<GalleryEntry> {
        if index >= self.entries.len() {
            return None;
        }
        let entry = self.entries.remove(index);
        self.store.delete(&entry.record.path);
        log::info!("Deleted {:?}", entry.record.path);
        Some(entry)
    }

    /// Delete several clips at once; out-of-range indices are ignored
    pub fn delete_many(&mut self, indices: &[usize]) -> Vec<GalleryEntry> {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        sorted
            .into_iter()
            .filter_map(|index| self.delete(index))
            .collect()
    }

    /// Leave the screen; outstanding decodes are cancelled
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.tasks.abort_all();
        log::debug!("Gallery closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for Gallery {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedPosterDecoder;
    use std::fs;

    fn store_with(names: &[&str]) -> (tempfile::TempDir, Arc<VideoStore>) {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            fs::write(dir.path().join(name), b"clip").unwrap();
        }
        let store = Arc::new(VideoStore::new(dir.path()));
        (dir, store)
    }

    #[tokio::test]
    async fn test_posters_load_and_failures_become_placeholders() {
        let (_dir, store) = store_with(&["video-2.000000.mp4", "video-1.000000-broken.mp4"]);
        let mut gallery = Gallery::open(store, Arc::new(FixedPosterDecoder::new()));

        gallery.load_posters().await;

        assert!(matches!(gallery.poster(0), Some(PosterState::Ready(_))));
        assert_eq!(gallery.poster(1), Some(&PosterState::Placeholder));
        assert_eq!(gallery.request_posters(), 0);
    }

    #[tokio::test]
    async fn test_delete_out_of_range() {
        let (_dir, store) = store_with(&["video-1.000000.mp4"]);
        let mut gallery = Gallery::open(store, Arc::new(FixedPosterDecoder::new()));
        assert!(gallery.delete(3).is_none());
        assert_eq!(gallery.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_many_removes_each_index_once() {
        let (_dir, store) = store_with(&["30.mp4", "20.mp4", "10.mp4"]);
        let mut gallery = Gallery::open(store.clone(), Arc::new(FixedPosterDecoder::new()));

        let removed = gallery.delete_many(&[0, 2, 2]);
        assert_eq!(removed.len(), 2);
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.select(0).unwrap().file_name().unwrap(), "20.mp4");
        assert_eq!(store.list().len(), 1);
    }
}
