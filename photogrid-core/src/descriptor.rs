use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One image in a collection: where it lives and how it is stored rotated.
///
/// Identity is the path; an enumeration never yields the same path twice.
/// `orientation` is the clockwise rotation in degrees reported by the media
/// index and is kept verbatim so that two enumerations compare exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub path: PathBuf,
    pub orientation: i32,
}

impl ImageDescriptor {
    pub fn new(path: impl Into<PathBuf>, orientation: i32) -> Self {
        Self {
            path: path.into(),
            orientation,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Display rotation derived from the stored orientation.
    pub fn rotation(&self) -> Rotation {
        Rotation::from_degrees(self.orientation)
    }
}

/// Quarter-turn rotation applied when a thumbnail is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Normalise any degree value to the nearest quarter turn.
    ///
    /// Negative values wrap (`-90` is `Cw270`); values between quarter turns
    /// snap to the closest one, with halfway points rounding up.
    pub fn from_degrees(degrees: i32) -> Self {
        let normalised = degrees.rem_euclid(360);
        match ((normalised + 45) / 90) % 4 {
            0 => Self::None,
            1 => Self::Cw90,
            2 => Self::Cw180,
            _ => Self::Cw270,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }

    /// `true` when the rotation swaps width and height.
    pub fn is_transposing(self) -> bool {
        matches!(self, Self::Cw90 | Self::Cw270)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_index_orientations_map_directly() {
        assert_eq!(Rotation::from_degrees(0), Rotation::None);
        assert_eq!(Rotation::from_degrees(90), Rotation::Cw90);
        assert_eq!(Rotation::from_degrees(180), Rotation::Cw180);
        assert_eq!(Rotation::from_degrees(270), Rotation::Cw270);
    }

    #[test]
    fn out_of_range_orientations_wrap_and_snap() {
        assert_eq!(Rotation::from_degrees(360), Rotation::None);
        assert_eq!(Rotation::from_degrees(-90), Rotation::Cw270);
        assert_eq!(Rotation::from_degrees(450), Rotation::Cw90);
        assert_eq!(Rotation::from_degrees(100), Rotation::Cw90);
        assert_eq!(Rotation::from_degrees(135), Rotation::Cw180);
        assert_eq!(Rotation::from_degrees(350), Rotation::None);
    }

    #[test]
    fn degrees_round_trip_for_quarter_turns() {
        for deg in [0, 90, 180, 270] {
            assert_eq!(Rotation::from_degrees(deg).degrees(), deg as u32);
        }
    }

    #[test]
    fn descriptor_rotation_uses_orientation() {
        let d = ImageDescriptor::new("/b.jpg", 90);
        assert_eq!(d.rotation(), Rotation::Cw90);
        assert!(d.rotation().is_transposing());
        assert_eq!(d.path(), Path::new("/b.jpg"));
    }
}
