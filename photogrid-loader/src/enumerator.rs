use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use photogrid_core::{Collection, ImageDescriptor};

/// Extensions the decoder is built to handle.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif",
];

/// The media index: lists every image, newest first.
///
/// Runs on a worker thread and may be slow. A missing or unreadable index
/// produces an empty collection, never an error.
pub trait CollectionSource: Send + Sync {
    fn enumerate(&self) -> Collection;
}

/// Lists images found under one or more directories.
///
/// "Date added" is the file's creation time where the filesystem records
/// it, otherwise its modification time. Orientation comes from the EXIF
/// `Orientation` tag, converted to clockwise degrees.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    roots: Vec<PathBuf>,
    recursive: bool,
}

impl DirectorySource {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            recursive: true,
        }
    }

    pub fn single(root: impl Into<PathBuf>) -> Self {
        Self::new(vec![root.into()])
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn scan_root(&self, root: &Path, found: &mut Vec<(PathBuf, SystemTime)>) {
        if !root.is_dir() {
            warn!("Image root {} is not a readable directory", root.display());
            return;
        }
        let walker = WalkDir::new(root)
            .follow_links(true)
            .max_depth(if self.recursive { usize::MAX } else { 1 });

        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() || !has_image_extension(entry.path()) {
                continue;
            }
            let added = entry
                .metadata()
                .ok()
                .and_then(|m| m.created().or_else(|_| m.modified()).ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((entry.into_path(), added));
        }
    }
}

impl CollectionSource for DirectorySource {
    fn enumerate(&self) -> Collection {
        let start = Instant::now();
        let mut found = Vec::new();
        for root in &self.roots {
            self.scan_root(root, &mut found);
        }

        // Newest first; the path keeps the order stable between scans.
        found.sort_by(|(pa, ta), (pb, tb)| tb.cmp(ta).then_with(|| pa.cmp(pb)));
        found.dedup_by(|a, b| a.0 == b.0);

        let items: Vec<ImageDescriptor> = found
            .into_par_iter()
            .map(|(path, _)| {
                let orientation = read_orientation(&path);
                ImageDescriptor::new(path, orientation)
            })
            .collect();

        info!(
            count = items.len(),
            roots = self.roots.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Enumerated images"
        );
        Collection::new(items)
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Clockwise display rotation for an EXIF orientation value.
///
/// Mirrored variants report the rotation part only.
pub fn exif_orientation_degrees(tag: u32) -> i32 {
    match tag {
        3 | 4 => 180,
        6 | 7 => 90,
        5 | 8 => 270,
        _ => 0,
    }
}

/// Orientation of the image at `path` in degrees; 0 when absent or unreadable.
fn read_orientation(path: &Path) -> i32 {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
            debug!("Cannot open {} for EXIF: {e}", path.display());
            return 0;
        }
    };
    let mut reader = BufReader::new(file);
    match exif::Reader::new().read_from_container(&mut reader) {
        Ok(data) => data
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(exif_orientation_degrees)
            .unwrap_or(0),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write_png(path: &Path) {
        image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 0, 255]))
            .save(path)
            .expect("write test png");
    }

    #[test]
    fn exif_tags_map_to_quarter_turns() {
        assert_eq!(exif_orientation_degrees(1), 0);
        assert_eq!(exif_orientation_degrees(3), 180);
        assert_eq!(exif_orientation_degrees(6), 90);
        assert_eq!(exif_orientation_degrees(8), 270);
        assert_eq!(exif_orientation_degrees(0), 0);
        assert_eq!(exif_orientation_degrees(42), 0);
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(has_image_extension(Path::new("/x/IMG_0001.JPG")));
        assert!(has_image_extension(Path::new("/x/a.webp")));
        assert!(!has_image_extension(Path::new("/x/notes.txt")));
        assert!(!has_image_extension(Path::new("/x/no_extension")));
    }

    #[test]
    fn missing_root_enumerates_empty() {
        let source = DirectorySource::single("/definitely/not/a/photo/dir");
        assert!(source.enumerate().is_empty());
    }

    #[test]
    fn newest_images_come_first_and_others_are_skipped() {
        let dir = std::env::temp_dir().join("photogrid_test_enumerate");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("nested")).unwrap();

        write_png(&dir.join("old.png"));
        std::thread::sleep(Duration::from_millis(20));
        write_png(&dir.join("nested").join("new.png"));
        fs::write(dir.join("readme.txt"), "not an image").unwrap();

        let collection = DirectorySource::single(&dir).enumerate();
        let names: Vec<_> = collection
            .iter()
            .map(|d| d.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["new.png", "old.png"]);
        assert!(collection.iter().all(|d| d.orientation == 0));

        let flat = DirectorySource::single(&dir).recursive(false).enumerate();
        assert_eq!(flat.len(), 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn repeated_scans_are_equal() {
        let dir = std::env::temp_dir().join("photogrid_test_enumerate_stable");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            write_png(&dir.join(name));
        }

        let source = DirectorySource::single(&dir);
        assert_eq!(source.enumerate(), source.enumerate());

        let _ = fs::remove_dir_all(&dir);
    }
}
