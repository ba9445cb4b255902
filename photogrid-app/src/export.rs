//! PNG export of a contact sheet with embedded metadata (tEXt chunks).

use std::io::BufWriter;
use std::path::Path;

use tracing::debug;

/// What the sheet shows, embedded in the exported PNG as tEXt chunks.
pub struct SheetMetadata {
    pub root: String,
    pub first_index: usize,
    pub collection_len: usize,
    pub columns: u32,
    pub rows: u32,
    pub thumbnail_size: u32,
    pub generation: u64,
}

/// Write an RGBA pixel buffer as a PNG file with embedded sheet metadata.
///
/// Uses the `png` crate directly (rather than `image`) so custom tEXt chunks
/// can be attached.
pub fn export_png(
    pixels: &[u8],
    width: u32,
    height: u32,
    path: &Path,
    metadata: &SheetMetadata,
) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| format!("Failed to create directory: {e}"))?;
    }
    let file = std::fs::File::create(path).map_err(|e| format!("Failed to create file: {e}"))?;
    let writer = BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);

    encoder
        .add_text_chunk("Software".to_string(), "photogrid".to_string())
        .map_err(|e| format!("Failed to add text chunk: {e}"))?;
    encoder
        .add_text_chunk("Description".to_string(), build_description(metadata))
        .map_err(|e| format!("Failed to add text chunk: {e}"))?;
    for (key, value) in build_metadata_pairs(metadata) {
        encoder
            .add_text_chunk(key.clone(), value)
            .map_err(|e| format!("Failed to add text chunk '{key}': {e}"))?;
    }

    let mut png_writer = encoder
        .write_header()
        .map_err(|e| format!("Failed to write PNG header: {e}"))?;
    png_writer
        .write_image_data(pixels)
        .map_err(|e| format!("Failed to write PNG image data: {e}"))?;

    debug!("Exported sheet {}x{} to {}", width, height, path.display());
    Ok(())
}

fn build_description(meta: &SheetMetadata) -> String {
    let last = (meta.first_index + (meta.columns * meta.rows) as usize)
        .min(meta.collection_len);
    format!(
        "{} - images {}..{} of {}, {}x{} grid",
        meta.root, meta.first_index, last, meta.collection_len, meta.columns, meta.rows,
    )
}

fn build_metadata_pairs(meta: &SheetMetadata) -> Vec<(String, String)> {
    vec![
        ("Photogrid.Root".into(), meta.root.clone()),
        ("Photogrid.FirstIndex".into(), meta.first_index.to_string()),
        ("Photogrid.CollectionLen".into(), meta.collection_len.to_string()),
        ("Photogrid.Columns".into(), meta.columns.to_string()),
        ("Photogrid.Rows".into(), meta.rows.to_string()),
        ("Photogrid.ThumbnailSize".into(), meta.thumbnail_size.to_string()),
        ("Photogrid.Generation".into(), meta.generation.to_string()),
    ]
}
