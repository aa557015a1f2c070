//! Per-page print head geometry.
//!
//! A [`PageGeometry`] is derived once per page from the raster header and the
//! job [`Config`], and stays immutable until the page ends.

use log::{debug, warn};

use crate::{
    compress::Compression,
    error::Error,
    job::Config,
    model::{ModelFlags, PlaneLayout},
    pack::packed_len,
};

/// Most `(subrow, plane)` slot rows a head can interleave.
const MAX_SUBROWS: usize = 128;

/// Most nozzles per color on any supported head.
const MAX_ROW_COUNT: usize = 512;

/// Raster header values the driver consumes for one page.
#[derive(Debug, Clone, Default)]
pub struct PageHeader {
    /// `HWResolution`, horizontal then vertical, in dots per inch.
    pub resolution: [u32; 2],
    /// `cupsWidth` in pixels.
    pub width: u32,
    /// `cupsHeight` in scanlines.
    pub height: u32,
    /// `PageSize` in points.
    pub page_size: [u32; 2],
    /// `cupsRowCount`: nozzles used per pass, 0 or 1 for direct mode.
    pub row_count: u32,
    /// `cupsRowFeed`: rows to advance between passes, 0 to compute it.
    pub row_feed: u32,
    /// `cupsRowStep`: `ColStep * 100 + RowStep`.
    pub row_step: u32,
    /// `cupsCompression`: 0 for raw graphics, anything else for packbits.
    pub compression: u32,
    /// `cupsMediaType`
    pub media_type: u32,
    /// `MediaPosition`
    pub media_position: u32,
    /// `CutMedia`
    pub cut_media: u32,
}

impl PageHeader {
    pub fn new(resolution: [u32; 2], width: u32, height: u32) -> Self {
        PageHeader {
            resolution,
            width,
            height,
            ..Default::default()
        }
    }

    pub fn page_size(self, width: u32, length: u32) -> Self {
        PageHeader {
            page_size: [width, length],
            ..self
        }
    }

    /// Set the softweave parameters in raster header encoding.
    pub fn weave(self, row_count: u32, row_feed: u32, row_step: u32) -> Self {
        PageHeader {
            row_count,
            row_feed,
            row_step,
            ..self
        }
    }

    pub fn compression(self, compression: u32) -> Self {
        PageHeader {
            compression,
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageGeometry {
    pub resolution: [u32; 2],
    pub width: usize,
    pub layout: PlaneLayout,
    /// Bits per pixel per plane, 1 or 2.
    pub bit_planes: u8,
    pub flags: ModelFlags,
    pub compression: Compression,
    /// Rows each band holds before it is printed.
    pub row_count: usize,
    /// Rows between two nozzles of the head.
    pub row_step: usize,
    /// Column passes per row.
    pub col_step: usize,
    /// Rows the paper advances between passes.
    pub row_feed: usize,
    /// Vertical offset of each plane's nozzles on a staggered head.
    pub row_offsets: [usize; 7],
    /// Packed bytes in one band row.
    pub bytes_per_row: usize,
    /// Motion unit in dots per inch used by the resolution commands.
    pub units: u32,
    softweave: bool,
}

impl PageGeometry {
    pub fn new(header: &PageHeader, config: &Config) -> Result<Self, Error> {
        let [xres, yres] = header.resolution;
        if xres == 0 || yres == 0 {
            return Err(Error::InvalidConfig(format!(
                "resolution {}x{} dpi",
                xres, yres
            )));
        }
        if header.width == 0 {
            return Err(Error::InvalidConfig("page width is zero".to_string()));
        }

        let layout = config.layout()?;
        let bit_planes = config.bit_planes;
        if bit_planes != 1 && bit_planes != 2 {
            return Err(Error::InvalidConfig(format!(
                "{} bits per plane",
                bit_planes
            )));
        }
        let flags = config.flags;
        let softweave = header.row_count > 1;

        let (mut row_count, mut row_feed, mut row_step, mut col_step) = if softweave {
            (
                header.row_count as usize,
                header.row_feed as usize,
                (header.row_step % 100).max(1) as usize,
                (header.row_step / 100).max(1) as usize,
            )
        } else {
            (1, 1, 1, 1)
        };

        if softweave && header.row_step % 100 == 0 {
            warn!("Row step {} has no row component, using 1", header.row_step);
        }

        let mut row_offsets = [0usize; 7];

        if softweave {
            if layout.planes() == 1 {
                if let Some((count, step)) = config.black_head {
                    row_count = (count as usize).max(1);
                    row_step = (step as usize).max(1);
                }
            } else if flags.contains(ModelFlags::STAGGER) {
                debug!("Offset head detected");
                for (offset, value) in row_offsets.iter_mut().zip(config.head_offsets.iter()) {
                    *offset = *value as usize;
                }
            }

            if row_count > MAX_ROW_COUNT {
                warn!("Row count {} exceeds {} nozzles, clamping", row_count, MAX_ROW_COUNT);
                row_count = MAX_ROW_COUNT;
            }
            if row_step > MAX_SUBROWS {
                warn!("Row step {} exceeds {}, clamping", row_step, MAX_SUBROWS);
                row_step = MAX_SUBROWS;
            }
            if col_step > MAX_SUBROWS / row_step {
                let clamped = (MAX_SUBROWS / row_step).max(1);
                warn!("Column step {} exceeds {} subrows, using {}", col_step, MAX_SUBROWS, clamped);
                col_step = clamped;
            }

            if row_feed == 0 {
                row_feed = auto_row_feed(row_count, row_step, col_step);
                debug!(
                    "Auto row feed = {}, modrow = {}",
                    row_feed,
                    row_step * col_step
                );
            }
        }

        let mut units = 1440;
        while units < xres {
            units *= 2;
        }

        let geometry = PageGeometry {
            resolution: header.resolution,
            width: header.width as usize,
            layout,
            bit_planes,
            flags,
            compression: Compression::from_header(header.compression),
            row_count,
            row_step,
            col_step,
            row_feed,
            row_offsets,
            bytes_per_row: packed_len(header.width as usize / col_step, bit_planes),
            units,
            softweave,
        };

        let pool_bytes = if softweave {
            geometry
                .pool_size()
                .checked_mul(row_count)
                .and_then(|n| n.checked_mul(geometry.bytes_per_row))
        } else {
            geometry.planes().checked_mul(geometry.bytes_per_row)
        };
        if pool_bytes.is_none() {
            return Err(Error::InvalidConfig(format!(
                "band buffers for {} pixels x {} rows do not fit in memory",
                header.width, row_count
            )));
        }

        debug!("{:?}", geometry);

        Ok(geometry)
    }

    /// `true` when scanlines are interleaved across passes through bands.
    pub fn is_softweave(&self) -> bool {
        self.softweave
    }

    pub fn planes(&self) -> usize {
        self.layout.planes()
    }

    /// Number of `(subrow, plane)` slot rows, `RowStep * ColStep`.
    pub fn subrows(&self) -> usize {
        self.row_step * self.col_step
    }

    /// Bands allocated for the page.
    pub fn pool_size(&self) -> usize {
        self.subrows() * self.planes() * 4
    }

    /// Pixels in one column pass.
    pub fn sub_width(&self) -> usize {
        self.width / self.col_step
    }

    /// Packed bytes of one full-width input scanline.
    pub fn line_bytes(&self) -> usize {
        packed_len(self.width, self.bit_planes)
    }

    /// Horizontal dot spacing in 1/3600 inch.
    pub fn x_step(&self) -> u8 {
        (3600 * self.col_step as u32 / self.resolution[0]) as u8
    }

    /// Vertical dot spacing in 1/3600 inch.
    pub fn y_step(&self) -> u8 {
        (3600 * self.row_step as u32 / self.resolution[1]) as u8
    }
}

/// Compute the paper advance between passes when the header leaves it at 0.
///
/// Starts from `RowCount / ColStep - RowStep` and walks down until the feed
/// shares none of the factors 2, 3 and 5 with `RowCount` in the same way,
/// never going below 1. The resulting interleave is visible on paper.
pub fn auto_row_feed(row_count: usize, row_step: usize, col_step: usize) -> usize {
    let count = row_count as i64;
    let mut feed = count / col_step.max(1) as i64 - row_step as i64;

    while ((feed % 2 == 0) == (count % 2 == 0)
        || (feed % 3 == 0) == (count % 3 == 0)
        || (feed % 5 == 0) == (count % 5 == 0))
        && feed > 1
    {
        feed -= 1;
    }

    feed.max(1) as usize
}
