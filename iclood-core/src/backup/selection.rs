//! Candidate assets and the user's selection among them.

use crate::client::NewFilesResponse;
use crate::media::MediaAsset;
use std::collections::HashSet;

/// Candidate list plus the ordered selection list.
///
/// Every selected id belongs to a candidate whose `selected` flag is set,
/// and every flagged candidate is in the selection. Each mutation keeps
/// both views in step.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    candidates: Vec<MediaAsset>,
    selection: Vec<String>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything with `assets`, selecting those flagged `selected`.
    pub fn replace(&mut self, assets: Vec<MediaAsset>) {
        self.candidates.clear();
        self.selection.clear();
        self.append(assets);
    }

    /// Append a further page. Ids already present are skipped.
    /// Returns the number of assets added.
    pub fn append(&mut self, assets: Vec<MediaAsset>) -> usize {
        let mut known: HashSet<String> = self.candidates.iter().map(|a| a.id.clone()).collect();
        let mut added = 0;
        for asset in assets {
            if !known.insert(asset.id.clone()) {
                continue;
            }
            if asset.selected {
                self.selection.push(asset.id.clone());
            }
            self.candidates.push(asset);
            added += 1;
        }
        added
    }

    /// Flip the selection of `id`. Returns the new state, `None` for unknown ids.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let asset = self.candidates.iter_mut().find(|a| a.id == id)?;
        asset.selected = !asset.selected;
        if asset.selected {
            self.selection.push(asset.id.clone());
        } else {
            self.selection.retain(|s| s != id);
        }
        Some(asset.selected)
    }

    pub fn select_all(&mut self) {
        for asset in &mut self.candidates {
            asset.selected = true;
        }
        self.selection = self.candidates.iter().map(|a| a.id.clone()).collect();
    }

    pub fn deselect_all(&mut self) {
        for asset in &mut self.candidates {
            asset.selected = false;
        }
        self.selection.clear();
    }

    /// Drop the given ids from both lists. Returns how many candidates were removed.
    pub fn remove(&mut self, ids: &[String]) -> usize {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = self.candidates.len();
        self.candidates.retain(|a| !ids.contains(a.id.as_str()));
        self.selection.retain(|s| !ids.contains(s.as_str()));
        before - self.candidates.len()
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.selection.clear();
    }

    pub fn candidates(&self) -> &[MediaAsset] {
        &self.candidates
    }

    pub fn get(&self, id: &str) -> Option<&MediaAsset> {
        self.candidates.iter().find(|a| a.id == id)
    }

    /// Selected assets in selection order.
    pub fn selected(&self) -> Vec<MediaAsset> {
        self.selection
            .iter()
            .filter_map(|id| self.get(id).cloned())
            .collect()
    }

    pub fn selected_ids(&self) -> &[String] {
        &self.selection
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Whether the candidate flags and the selection list agree.
    pub fn is_consistent(&self) -> bool {
        let flagged: HashSet<&str> = self
            .candidates
            .iter()
            .filter(|a| a.selected)
            .map(|a| a.id.as_str())
            .collect();
        let listed: HashSet<&str> = self.selection.iter().map(String::as_str).collect();
        flagged == listed && listed.len() == self.selection.len()
    }
}

/// Keep the assets the server reports as new and not ignored.
pub fn retain_new(assets: Vec<MediaAsset>, response: &NewFilesResponse) -> Vec<MediaAsset> {
    let new_ids: HashSet<&str> = response.new_files.iter().map(|f| f.id.as_str()).collect();
    let ignored_ids: HashSet<&str> = response
        .ignored_files
        .iter()
        .map(|f| f.id.as_str())
        .collect();

    assets
        .into_iter()
        .filter(|a| new_ids.contains(a.id.as_str()) && !ignored_ids.contains(a.id.as_str()))
        .collect()
}
