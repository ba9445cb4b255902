//! Contact-sheet canvas: a fixed `columns × rows` grid of slots painted into
//! one RGBA image. Stands in for the scrolling grid widget.

use std::sync::Arc;

use image::{imageops, Rgba, RgbaImage};
use tracing::{debug, warn};

use photogrid_core::{Rotation, Thumbnail};
use photogrid_loader::{DecodeError, GridView, SlotId};

/// Gap around each thumbnail, in pixels.
pub const CELL_PADDING: u32 = 4;

const BACKGROUND: Rgba<u8> = Rgba([24, 24, 24, 255]);
const BUSY: Rgba<u8> = Rgba([56, 56, 56, 255]);
const BUSY_MARK: Rgba<u8> = Rgba([140, 140, 140, 255]);
const FAILED: Rgba<u8> = Rgba([72, 24, 24, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Empty,
    Busy,
    Image(Rotation),
    Failed,
}

pub struct ContactSheet {
    columns: u32,
    rows: u32,
    thumb: u32,
    canvas: RgbaImage,
    cells: Vec<CellState>,
    built: Option<usize>,
    last_refresh: Option<bool>,
}

impl ContactSheet {
    pub fn new(columns: u32, rows: u32, thumbnail_size: u32) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(1);
        let cell = thumbnail_size + 2 * CELL_PADDING;
        Self {
            columns,
            rows,
            thumb: thumbnail_size,
            canvas: RgbaImage::from_pixel(columns * cell, rows * cell, BACKGROUND),
            cells: vec![CellState::Empty; (columns * rows) as usize],
            built: None,
            last_refresh: None,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.cells.len()
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    #[cfg(test)]
    pub fn cell_state(&self, slot: SlotId) -> Option<CellState> {
        self.cells.get(slot.0).copied()
    }

    /// Number of cells currently in `state`.
    pub fn count(&self, state: impl Fn(&CellState) -> bool) -> usize {
        self.cells.iter().filter(|c| state(c)).count()
    }

    #[cfg(test)]
    pub fn built_len(&self) -> Option<usize> {
        self.built
    }

    pub fn last_refresh(&self) -> Option<bool> {
        self.last_refresh
    }

    /// Forget the previous refresh outcome before asking for a new one.
    pub fn forget_refresh(&mut self) {
        self.last_refresh = None;
    }

    /// Top-left pixel of the thumbnail area for `slot`.
    pub fn thumb_origin(&self, slot: SlotId) -> (u32, u32) {
        let cell = self.thumb + 2 * CELL_PADDING;
        let col = slot.0 as u32 % self.columns;
        let row = slot.0 as u32 / self.columns;
        (col * cell + CELL_PADDING, row * cell + CELL_PADDING)
    }

    fn in_range(&self, slot: SlotId) -> bool {
        if slot.0 < self.cells.len() {
            true
        } else {
            warn!(?slot, slots = self.cells.len(), "Slot outside the sheet");
            false
        }
    }

    fn fill(&mut self, slot: SlotId, color: Rgba<u8>) {
        let (x0, y0) = self.thumb_origin(slot);
        for y in y0..y0 + self.thumb {
            for x in x0..x0 + self.thumb {
                self.canvas.put_pixel(x, y, color);
            }
        }
    }
}

fn to_image(thumbnail: &Thumbnail) -> Option<RgbaImage> {
    RgbaImage::from_raw(
        thumbnail.width,
        thumbnail.height,
        thumbnail.pixels().to_vec(),
    )
}

fn rotate(img: RgbaImage, rotation: Rotation) -> RgbaImage {
    match rotation {
        Rotation::None => img,
        Rotation::Cw90 => imageops::rotate90(&img),
        Rotation::Cw180 => imageops::rotate180(&img),
        Rotation::Cw270 => imageops::rotate270(&img),
    }
}

impl GridView for ContactSheet {
    fn show_busy(&mut self, slot: SlotId) {
        if !self.in_range(slot) {
            return;
        }
        self.fill(slot, BUSY);
        // Small centred square as the busy indicator.
        let (x0, y0) = self.thumb_origin(slot);
        let mark = (self.thumb / 6).max(1);
        let start = (self.thumb - mark) / 2;
        for y in 0..mark {
            for x in 0..mark {
                self.canvas.put_pixel(x0 + start + x, y0 + start + y, BUSY_MARK);
            }
        }
        self.cells[slot.0] = CellState::Busy;
    }

    fn show_image(&mut self, slot: SlotId, thumbnail: &Arc<Thumbnail>, rotation: Rotation) {
        if !self.in_range(slot) {
            return;
        }
        let Some(img) = to_image(thumbnail) else {
            warn!(?slot, "Thumbnail buffer does not match its size");
            return;
        };
        let img = rotate(img, rotation);
        self.fill(slot, BACKGROUND);

        let (x0, y0) = self.thumb_origin(slot);
        let dx = self.thumb.saturating_sub(img.width()) / 2;
        let dy = self.thumb.saturating_sub(img.height()) / 2;
        imageops::replace(&mut self.canvas, &img, (x0 + dx) as i64, (y0 + dy) as i64);
        self.cells[slot.0] = CellState::Image(rotation);
    }

    fn show_failed(&mut self, slot: SlotId, error: &DecodeError) {
        if !self.in_range(slot) {
            return;
        }
        debug!(?slot, "Marking failed cell: {error}");
        self.fill(slot, FAILED);
        self.cells[slot.0] = CellState::Failed;
    }

    fn clear(&mut self, slot: SlotId) {
        if !self.in_range(slot) {
            return;
        }
        self.fill(slot, BACKGROUND);
        self.cells[slot.0] = CellState::Empty;
    }

    fn on_build_complete(&mut self, len: usize) {
        self.built = Some(len);
    }

    fn on_refresh_complete(&mut self, changed: bool) {
        self.last_refresh = Some(changed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    /// Left half red, right half blue.
    fn split(side: u32) -> Arc<Thumbnail> {
        let mut pixels = Vec::with_capacity((side * side * 4) as usize);
        for _y in 0..side {
            for x in 0..side {
                pixels.extend_from_slice(if x < side / 2 { &RED } else { &BLUE });
            }
        }
        Arc::new(Thumbnail::from_rgba(side, side, pixels).unwrap())
    }

    fn at(sheet: &ContactSheet, slot: usize, x: u32, y: u32) -> [u8; 4] {
        let (x0, y0) = sheet.thumb_origin(SlotId(slot));
        sheet.canvas().get_pixel(x0 + x, y0 + y).0
    }

    #[test]
    fn canvas_covers_every_cell() {
        let sheet = ContactSheet::new(3, 2, 16);
        let cell = 16 + 2 * CELL_PADDING;
        assert_eq!(sheet.canvas().dimensions(), (3 * cell, 2 * cell));
        assert_eq!(sheet.slot_count(), 6);
        assert_eq!(sheet.thumb_origin(SlotId(4)), (cell + CELL_PADDING, cell + CELL_PADDING));
    }

    #[test]
    fn image_is_drawn_upright() {
        let mut sheet = ContactSheet::new(2, 1, 16);
        sheet.show_image(SlotId(1), &split(16), Rotation::None);
        assert_eq!(at(&sheet, 1, 1, 8), RED);
        assert_eq!(at(&sheet, 1, 14, 8), BLUE);
        assert_eq!(sheet.cell_state(SlotId(1)), Some(CellState::Image(Rotation::None)));
    }

    #[test]
    fn quarter_turn_moves_left_edge_to_top() {
        let mut sheet = ContactSheet::new(1, 1, 16);
        sheet.show_image(SlotId(0), &split(16), Rotation::Cw90);
        assert_eq!(at(&sheet, 0, 8, 1), RED);
        assert_eq!(at(&sheet, 0, 8, 14), BLUE);

        sheet.show_image(SlotId(0), &split(16), Rotation::Cw270);
        assert_eq!(at(&sheet, 0, 8, 1), BLUE);
        assert_eq!(at(&sheet, 0, 8, 14), RED);
    }

    #[test]
    fn busy_replaces_previous_image() {
        let mut sheet = ContactSheet::new(1, 1, 12);
        sheet.show_image(SlotId(0), &split(12), Rotation::None);
        sheet.show_busy(SlotId(0));
        assert_eq!(sheet.cell_state(SlotId(0)), Some(CellState::Busy));
        assert_eq!(at(&sheet, 0, 0, 0), BUSY.0);
        assert_eq!(at(&sheet, 0, 6, 6), BUSY_MARK.0);
    }

    #[test]
    fn refresh_outcome_can_be_forgotten() {
        let mut sheet = ContactSheet::new(1, 1, 8);
        sheet.on_refresh_complete(false);
        assert_eq!(sheet.last_refresh(), Some(false));
        sheet.forget_refresh();
        assert_eq!(sheet.last_refresh(), None);
    }

    #[test]
    fn out_of_range_slots_are_ignored() {
        let mut sheet = ContactSheet::new(1, 1, 8);
        sheet.show_busy(SlotId(5));
        sheet.show_image(SlotId(5), &split(8), Rotation::None);
        assert_eq!(sheet.count(|c| *c == CellState::Empty), 1);
    }
}
