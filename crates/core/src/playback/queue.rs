use crate::catalog::Track;
use serde::Serialize;

/// Ordered tracks plus the index of the current one.
///
/// When the queue is non-empty, `current_index < tracks.len()` always holds.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Queue {
    tracks: Vec<Track>,
    current_index: usize,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// `None` when the queue is empty.
    pub fn current_index(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.current_index)
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.current_index = 0;
        self.check_invariant();
    }

    /// Appends to the tail; returns the index of the first appended track.
    pub fn extend(&mut self, tracks: Vec<Track>) -> usize {
        let first = self.tracks.len();
        self.tracks.extend(tracks);
        self.check_invariant();
        first
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current_index = 0;
    }

    pub fn next_index(&self) -> Option<usize> {
        let len = self.len();
        (len > 0).then(|| (self.current_index + 1) % len)
    }

    pub fn previous_index(&self) -> Option<usize> {
        let len = self.len();
        (len > 0).then(|| {
            if self.current_index == 0 {
                len - 1
            } else {
                self.current_index - 1
            }
        })
    }

    /// Moves to `index` and returns the track there.
    pub fn select(&mut self, index: usize) -> &Track {
        assert!(
            index < self.tracks.len(),
            "queue index {index} out of range for {} tracks",
            self.tracks.len()
        );
        self.current_index = index;
        &self.tracks[index]
    }

    fn check_invariant(&self) {
        assert!(
            self.tracks.is_empty() || self.current_index < self.tracks.len(),
            "queue index {} out of range for {} tracks",
            self.current_index,
            self.tracks.len()
        );
    }
}

#[cfg(test)]
pub(crate) fn track(id: &str, secs: u64) -> Track {
    Track {
        id: id.to_owned(),
        title: format!("Title {id}"),
        artist: "Artist".to_owned(),
        artwork_uri: None,
        stream_uri: format!("mem://{id}"),
        duration: std::time::Duration::from_secs(secs),
    }
}
