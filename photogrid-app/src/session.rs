use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use photogrid_loader::{
    Coordinator, DirectorySource, GridView, LoaderError, SlotId, ThumbnailDecoder,
};

use crate::export::{export_png, SheetMetadata};
use crate::preferences::{
    clamp_columns, clamp_resume, clamp_rows, clamp_thumbnail_size, AppPreferences,
};
use crate::sheet::{CellState, ContactSheet};

/// Upper bound on waiting for one round of background work.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Summary of what ended up on the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetReport {
    pub collection_len: usize,
    pub first_index: usize,
    pub rendered: usize,
    pub failed: usize,
    pub pending: usize,
    pub elapsed: Duration,
}

/// One open photo root: the coordinator plus the sheet it paints.
pub struct Session {
    root: PathBuf,
    coordinator: Coordinator,
    sheet: ContactSheet,
    first_index: usize,
    settle_timeout: Duration,
}

impl Session {
    /// Enumerate `root` and wait for the collection to be built.
    pub fn open(root: &Path, prefs: &AppPreferences) -> Result<Self, LoaderError> {
        let mut config = prefs.loader.clone();
        config.thumbnail_size = clamp_thumbnail_size(config.thumbnail_size);
        let decoder = ThumbnailDecoder::from_config(&config);
        let sheet = ContactSheet::new(
            clamp_columns(prefs.columns),
            clamp_rows(prefs.rows),
            config.thumbnail_size,
        );
        let mut coordinator = Coordinator::new(
            config,
            Arc::new(DirectorySource::single(root)),
            Arc::new(decoder),
        )?;

        info!(root = %root.display(), "Opening photo root");
        coordinator.build();
        let mut session = Self {
            root: root.to_path_buf(),
            coordinator,
            sheet,
            first_index: 0,
            settle_timeout: SETTLE_TIMEOUT,
        };
        session.settle();
        if !session.coordinator.is_ready() {
            warn!("Collection build did not finish in time");
            return Err(LoaderError::NotReady);
        }
        Ok(session)
    }

    pub fn len(&self) -> usize {
        self.coordinator.len()
    }

    pub fn first_index(&self) -> usize {
        self.first_index
    }

    pub fn sheet(&self) -> &ContactSheet {
        &self.sheet
    }

    /// Bind every slot to the page starting at `first` (clamped to the
    /// collection) and wait for the thumbnails.
    pub fn show_page(&mut self, first: usize) -> SheetReport {
        let start = Instant::now();
        self.first_index = clamp_resume(first, self.len());
        self.bind_page();
        self.settle();
        self.report(start.elapsed())
    }

    /// Re-enumerate the root. Returns whether the collection changed, or
    /// `None` if the scan did not finish in time.
    ///
    /// Visible slots are rebound by the coordinator itself; the page only
    /// moves if the collection shrank below the current first index.
    pub fn refresh(&mut self) -> Option<bool> {
        self.sheet.forget_refresh();
        self.coordinator.refresh();
        self.settle();
        let changed = self.sheet.last_refresh();
        if changed == Some(true) {
            let clamped = clamp_resume(self.first_index, self.len());
            if clamped != self.first_index {
                self.first_index = clamped;
                self.bind_page();
                self.settle();
            }
        }
        changed
    }

    /// Write the sheet as a PNG.
    pub fn export(&self, path: &Path) -> Result<(), String> {
        let canvas = self.sheet.canvas();
        let metadata = SheetMetadata {
            root: self.root.display().to_string(),
            first_index: self.first_index,
            collection_len: self.len(),
            columns: self.sheet.columns(),
            rows: self.sheet.rows(),
            thumbnail_size: self.coordinator.config().thumbnail_size,
            generation: self.coordinator.generation(),
        };
        export_png(
            canvas.as_raw(),
            canvas.width(),
            canvas.height(),
            path,
            &metadata,
        )
    }

    pub fn report(&self, elapsed: Duration) -> SheetReport {
        SheetReport {
            collection_len: self.len(),
            first_index: self.first_index,
            rendered: self.sheet.count(|c| matches!(c, CellState::Image(_))),
            failed: self.sheet.count(|c| *c == CellState::Failed),
            pending: self.sheet.count(|c| *c == CellState::Busy),
            elapsed,
        }
    }

    fn bind_page(&mut self) {
        let len = self.len();
        for k in 0..self.sheet.slot_count() {
            let slot = SlotId(k);
            let index = self.first_index + k;
            if index >= len {
                self.coordinator.release(slot);
                self.sheet.clear(slot);
                continue;
            }
            if let Err(e) = self.coordinator.bind(slot, index, &mut self.sheet) {
                warn!(?slot, index, "Bind failed: {e}");
            }
        }
    }

    fn settle(&mut self) {
        self.coordinator
            .drain_until_idle(&mut self.sheet, self.settle_timeout);
    }
}
