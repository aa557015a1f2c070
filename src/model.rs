use bitflags::bitflags;

bitflags! {
    /// Capability bits of an ESC/P2 printer model, as carried by the PPD
    /// `ModelNumber`.
    pub struct ModelFlags: u32 {
        const DOTMATRIX   = 0x0001;
        const MICROWEAVE  = 0x0002;
        /// Color nozzles are staggered vertically on the head.
        const STAGGER     = 0x0004;
        /// Use the `ESC ( K` print mode command.
        const ESCK        = 0x0008;
        const EXT_UNITS   = 0x0010;
        const EXT_MARGINS = 0x0020;
        /// Exit USB packet mode at the start of every job.
        const USB         = 0x0040;
        const PAGE_SIZE   = 0x0080;
        /// Send raster data with `ESC i` instead of `ESC .`.
        const RASTER_ESCI = 0x0100;
        const REMOTE      = 0x1000;
    }
}

/// Ink set of the printer, i.e. how many color planes a scanline carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneLayout {
    K,
    Kk,
    Cmy,
    Cmyk,
    CcMmYk,
    CcMmYkk,
}

// Color codes per layout, indexed by plane. Bit 4 selects the extended
// `ESC ( r` form.
const COLOR_TABLE: [[u8; 7]; 6] = [
    [0, 0, 0, 0, 0, 0, 0],    // K
    [0, 16, 0, 0, 0, 0, 0],   // Kk
    [2, 1, 4, 0, 0, 0, 0],    // CMY
    [2, 1, 4, 0, 0, 0, 0],    // CMYK
    [2, 18, 1, 17, 4, 0, 0],  // CcMmYK
    [2, 18, 1, 17, 4, 0, 16], // CcMmYKk
];

impl PlaneLayout {
    pub fn from_planes(planes: usize) -> Option<Self> {
        match planes {
            1 => Some(Self::K),
            2 => Some(Self::Kk),
            3 => Some(Self::Cmy),
            4 => Some(Self::Cmyk),
            6 => Some(Self::CcMmYk),
            7 => Some(Self::CcMmYkk),
            _ => None,
        }
    }

    pub fn planes(&self) -> usize {
        match self {
            Self::K => 1,
            Self::Kk => 2,
            Self::Cmy => 3,
            Self::Cmyk => 4,
            Self::CcMmYk => 6,
            Self::CcMmYkk => 7,
        }
    }

    fn table_row(&self) -> usize {
        match self {
            Self::K => 0,
            Self::Kk => 1,
            Self::Cmy => 2,
            Self::Cmyk => 3,
            Self::CcMmYk => 4,
            Self::CcMmYkk => 5,
        }
    }

    /// Printer color code for `plane`.
    pub fn color_code(&self, plane: usize) -> u8 {
        COLOR_TABLE[self.table_row()][plane]
    }

    /// Ink names in plane order, used for logging.
    pub fn channel_names(&self) -> &'static [&'static str] {
        match self {
            Self::K => &["Black"],
            Self::Kk => &["Black", "LightBlack"],
            Self::Cmy => &["Cyan", "Magenta", "Yellow"],
            Self::Cmyk => &["Cyan", "Magenta", "Yellow", "Black"],
            Self::CcMmYk => &[
                "Cyan",
                "LightCyan",
                "Magenta",
                "LightMagenta",
                "Yellow",
                "Black",
            ],
            Self::CcMmYkk => &[
                "Cyan",
                "LightCyan",
                "Magenta",
                "LightMagenta",
                "Yellow",
                "Black",
                "LightBlack",
            ],
        }
    }
}
