//! Device registry - deck model detection by PID
//!
//! Every supported model is described by a [`DeckKind`]. The kind carries
//! the key layout, the key image format and the protocol generation, so the
//! rest of the crate never branches on raw product IDs.

use crate::types::{ImageEncoding, KeyImageFormat};

/// Elgato vendor ID
pub const VENDOR_ID: u16 = 0x0FD9;

/// Wire protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
    /// Mini family: BMP images, 16-byte image header, 17-byte feature reports
    Gen1,
    /// V2/MK.2/XL/Plus family: JPEG images, 8-byte image header, 32-byte feature reports
    Gen2,
}

/// Known deck models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeckKind {
    OriginalV2,
    Mk2,
    Xl,
    XlV2,
    Plus,
    Mini,
    MiniMk2,
    Pedal,
}

impl DeckKind {
    /// All supported models
    pub const ALL: &'static [DeckKind] = &[
        DeckKind::OriginalV2,
        DeckKind::Mk2,
        DeckKind::Xl,
        DeckKind::XlV2,
        DeckKind::Plus,
        DeckKind::Mini,
        DeckKind::MiniMk2,
        DeckKind::Pedal,
    ];

    /// Resolve a model from its USB product ID
    pub fn from_pid(pid: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.pid() == pid)
    }

    /// USB product ID
    pub fn pid(&self) -> u16 {
        match self {
            DeckKind::OriginalV2 => 0x006D,
            DeckKind::Mk2 => 0x0080,
            DeckKind::Xl => 0x006C,
            DeckKind::XlV2 => 0x008F,
            DeckKind::Plus => 0x0084,
            DeckKind::Mini => 0x0063,
            DeckKind::MiniMk2 => 0x0090,
            DeckKind::Pedal => 0x0086,
        }
    }

    /// Human-readable model name
    pub fn display_name(&self) -> &'static str {
        match self {
            DeckKind::OriginalV2 => "Stream Deck Original V2",
            DeckKind::Mk2 => "Stream Deck MK.2",
            DeckKind::Xl => "Stream Deck XL",
            DeckKind::XlV2 => "Stream Deck XL V2",
            DeckKind::Plus => "Stream Deck +",
            DeckKind::Mini => "Stream Deck Mini",
            DeckKind::MiniMk2 => "Stream Deck Mini MK.2",
            DeckKind::Pedal => "Stream Deck Pedal",
        }
    }

    /// Wire protocol family
    pub fn generation(&self) -> Generation {
        match self {
            DeckKind::Mini | DeckKind::MiniMk2 => Generation::Gen1,
            _ => Generation::Gen2,
        }
    }

    /// Number of physical keys
    pub fn key_count(&self) -> u8 {
        match self {
            DeckKind::OriginalV2 | DeckKind::Mk2 => 15,
            DeckKind::Xl | DeckKind::XlV2 => 32,
            DeckKind::Plus => 8,
            DeckKind::Mini | DeckKind::MiniMk2 => 6,
            DeckKind::Pedal => 3,
        }
    }

    /// Keys per row
    pub fn columns(&self) -> u8 {
        match self {
            DeckKind::OriginalV2 | DeckKind::Mk2 => 5,
            DeckKind::Xl | DeckKind::XlV2 => 8,
            DeckKind::Plus => 4,
            DeckKind::Mini | DeckKind::MiniMk2 => 3,
            DeckKind::Pedal => 3,
        }
    }

    /// Whether the keys have displays
    pub fn is_visual(&self) -> bool {
        !matches!(self, DeckKind::Pedal)
    }

    /// Native key image format, `None` for models without displays
    pub fn image_format(&self) -> Option<KeyImageFormat> {
        let (side, encoding, rotation, flip_horizontal, flip_vertical) = match self {
            DeckKind::OriginalV2 | DeckKind::Mk2 => (72, ImageEncoding::Jpeg, 0, true, true),
            DeckKind::Xl | DeckKind::XlV2 => (96, ImageEncoding::Jpeg, 0, true, true),
            DeckKind::Plus => (120, ImageEncoding::Jpeg, 0, false, false),
            DeckKind::Mini | DeckKind::MiniMk2 => (80, ImageEncoding::Bmp, 90, false, true),
            DeckKind::Pedal => return None,
        };
        Some(KeyImageFormat {
            width: side,
            height: side,
            encoding,
            rotation,
            flip_horizontal,
            flip_vertical,
        })
    }
}

impl std::fmt::Display for DeckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Check if VID/PID identifies a supported deck
#[inline]
pub fn is_supported(vid: u16, pid: u16) -> bool {
    vid == VENDOR_ID && DeckKind::from_pid(pid).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_pids() {
        assert_eq!(DeckKind::from_pid(0x006D), Some(DeckKind::OriginalV2));
        assert_eq!(DeckKind::from_pid(0x0063), Some(DeckKind::Mini));
        assert_eq!(DeckKind::from_pid(0x0086), Some(DeckKind::Pedal));
        assert_eq!(DeckKind::from_pid(0x0060), None); // Original (gen 0), unsupported
    }

    #[test]
    fn test_pid_roundtrip_unique() {
        for kind in DeckKind::ALL {
            assert_eq!(DeckKind::from_pid(kind.pid()), Some(*kind));
        }
    }

    #[test]
    fn test_pedal_not_visual() {
        assert!(!DeckKind::Pedal.is_visual());
        assert!(DeckKind::Pedal.image_format().is_none());
        assert!(DeckKind::Xl.image_format().is_some());
    }

    #[test]
    fn test_generation_matches_encoding() {
        for kind in DeckKind::ALL.iter().filter(|k| k.is_visual()) {
            let format = kind.image_format().unwrap();
            let expected = match kind.generation() {
                Generation::Gen1 => ImageEncoding::Bmp,
                Generation::Gen2 => ImageEncoding::Jpeg,
            };
            assert_eq!(format.encoding, expected, "{kind}");
        }
    }

    #[test]
    fn test_layout_is_rectangular() {
        for kind in DeckKind::ALL {
            assert_eq!(kind.key_count() % kind.columns(), 0, "{kind}");
        }
    }

    #[test]
    fn test_vendor_filter() {
        assert!(is_supported(0x0FD9, 0x0080));
        assert!(!is_supported(0x3151, 0x0080));
    }
}
