use std::collections::HashSet;
use std::fmt;

use indexmap::IndexSet;

/// Snapshot reported to the progress callback.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PreloadProgress {
    pub loaded: usize,
    pub total: usize,
    /// `loaded / total`, or 1 for an empty manifest.
    pub progress: f32,
}

/// Tracks a preload manifest against settled loads.
///
/// A load counts once it completes, successfully or not. The load callback
/// fires at most once per dirty cycle, after a draw that happened with the
/// manifest satisfied; a manifest uri entering the compiled tree for the
/// first time re-arms it.
pub struct PreloadTracker {
    manifest: IndexSet<String>,
    loaded: HashSet<String>,
    seen: HashSet<String>,
    dirty_on_load: bool,
    on_progress: Option<Box<dyn FnMut(PreloadProgress)>>,
    on_load: Option<Box<dyn FnMut()>>,
}

impl fmt::Debug for PreloadTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreloadTracker")
            .field("manifest", &self.manifest)
            .field("loaded", &self.loaded)
            .field("dirty_on_load", &self.dirty_on_load)
            .finish_non_exhaustive()
    }
}

impl Default for PreloadTracker {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl PreloadTracker {
    pub fn new<I, S>(manifest: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            manifest: manifest.into_iter().map(Into::into).collect(),
            loaded: HashSet::new(),
            seen: HashSet::new(),
            dirty_on_load: true,
            on_progress: None,
            on_load: None,
        }
    }

    /// Replaces the manifest. Re-arms the load callback if the new manifest
    /// is not yet satisfied.
    pub fn set_manifest<I, S>(&mut self, manifest: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manifest = manifest.into_iter().map(Into::into).collect();
        if !self.is_satisfied() {
            self.dirty_on_load = true;
        }
    }

    pub fn set_on_progress(&mut self, cb: impl FnMut(PreloadProgress) + 'static) {
        self.on_progress = Some(Box::new(cb));
    }

    pub fn set_on_load(&mut self, cb: impl FnMut() + 'static) {
        self.on_load = Some(Box::new(cb));
    }

    pub fn manifest(&self) -> impl Iterator<Item = &str> {
        self.manifest.iter().map(String::as_str)
    }

    /// Records already-settled uris without reporting progress.
    pub fn seed<'a>(&mut self, uris: impl IntoIterator<Item = &'a str>) {
        self.loaded.extend(uris.into_iter().map(str::to_string));
    }

    /// Records a settled load and reports progress if the uri is in the manifest.
    pub fn mark_loaded(&mut self, uri: &str) {
        self.loaded.insert(uri.to_string());
        if !self.manifest.contains(uri) {
            return;
        }
        let progress = self.progress();
        log::debug!(
            "preload {}/{} ({uri})",
            progress.loaded,
            progress.total
        );
        if let Some(cb) = self.on_progress.as_mut() {
            cb(progress);
        }
    }

    /// Notes uris that entered the compiled tree.
    pub fn note_in_tree<'a>(&mut self, uris: impl IntoIterator<Item = &'a str>) {
        for uri in uris {
            if self.manifest.contains(uri) && self.seen.insert(uri.to_string()) {
                self.dirty_on_load = true;
            }
        }
    }

    pub fn progress(&self) -> PreloadProgress {
        let total = self.manifest.len();
        let loaded = self
            .manifest
            .iter()
            .filter(|uri| self.loaded.contains(uri.as_str()))
            .count();
        let progress = if total == 0 {
            1.0
        } else {
            loaded as f32 / total as f32
        };
        PreloadProgress {
            loaded,
            total,
            progress,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.manifest.iter().all(|uri| self.loaded.contains(uri))
    }

    /// Called after each draw. Fires the load callback when armed and
    /// satisfied; returns whether it fired.
    pub fn after_draw(&mut self) -> bool {
        if !self.dirty_on_load || !self.is_satisfied() {
            return false;
        }
        self.dirty_on_load = false;
        log::info!("preload complete ({} resources)", self.manifest.len());
        if let Some(cb) = self.on_load.as_mut() {
            cb();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn reports_progress_for_manifest_entries() {
        let reports: Rc<RefCell<Vec<PreloadProgress>>> = Rc::default();
        let sink = Rc::clone(&reports);
        let mut tracker = PreloadTracker::new(["a", "b", "c"]);
        tracker.set_on_progress(move |p| sink.borrow_mut().push(p));

        tracker.mark_loaded("a");
        tracker.mark_loaded("unrelated");
        tracker.mark_loaded("b");

        let reports = reports.borrow();
        assert_eq!(reports.len(), 2);
        let last = reports[1];
        assert_eq!((last.loaded, last.total), (2, 3));
        assert!((last.progress - 0.667).abs() < 1e-3);
        assert!(!tracker.is_satisfied());
    }

    #[test]
    fn load_fires_once_per_dirty_cycle() {
        let fired = Rc::new(RefCell::new(0));
        let count = Rc::clone(&fired);
        let mut tracker = PreloadTracker::new(["a"]);
        tracker.set_on_load(move || *count.borrow_mut() += 1);

        assert!(!tracker.after_draw());
        tracker.mark_loaded("a");
        assert!(tracker.after_draw());
        assert!(!tracker.after_draw());
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn unseen_manifest_entry_rearms() {
        let mut tracker = PreloadTracker::new(["a"]);
        tracker.mark_loaded("a");
        assert!(tracker.after_draw());

        tracker.note_in_tree(["a"]);
        assert!(tracker.after_draw());
        tracker.note_in_tree(["a", "other"]);
        assert!(!tracker.after_draw());
    }

    #[test]
    fn empty_manifest_is_satisfied() {
        let mut tracker = PreloadTracker::default();
        assert!(tracker.is_satisfied());
        assert_eq!(tracker.progress().progress, 1.0);
        assert!(tracker.after_draw());
    }

    #[test]
    fn seeded_uris_count_without_reporting() {
        let reported = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&reported);
        let mut tracker = PreloadTracker::new(["a"]);
        tracker.set_on_progress(move |_| *flag.borrow_mut() = true);
        tracker.seed(["a"]);
        assert!(tracker.is_satisfied());
        assert!(!*reported.borrow());
    }
}
