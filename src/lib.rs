//! ESC/P2 Raster Driver
//!
//! This crate turns dithered raster pages into ESC/P2 print data for Epson
//! inkjet and dot matrix printers. Pages printed with a multi-nozzle head are
//! interleaved by a softweave band scheduler; single-row pages go out line by
//! line.
//!
//! # Example
//!
//! ```rust,no_run
//! use escpx::{Config, Job, ModelFlags, PageHeader};
//!
//! let config = Config::new(ModelFlags::ESCK | ModelFlags::USB, 4);
//! let header = PageHeader::new([720, 720], 5760, 7920)
//!     .page_size(576, 792)
//!     .weave(32, 0, 8)
//!     .compression(1);
//!
//! let out = std::fs::File::create("page.prn").unwrap();
//! let mut job = Job::new(out, config).unwrap();
//! let blank = vec![vec![0u8; 720]; 4];
//! job.print_page(&header, std::iter::repeat(blank).take(7920)).unwrap();
//! job.finish().unwrap();
//! ```

mod band;
mod compress;
mod driver;
mod encoder;
mod error;
mod geometry;
mod job;
mod model;
mod pack;
mod usb;
mod weave;

pub use crate::{
    band::{Band, BandId, BandPool},
    compress::{compress, decompress, Compression, Encoding},
    driver::PageDriver,
    encoder::Encoder,
    error::Error,
    geometry::{auto_row_feed, PageGeometry, PageHeader},
    job::{Config, Job, RemoteMode},
    model::{ModelFlags, PlaneLayout},
    pack::{is_blank, pack_columns, pack_pixels, packed_len},
    usb::{UsbPrinter, EPSON_VENDOR_ID},
    weave::{BandScheduler, BandSink, WeaveStats},
};

/// Type alias for one dithered scanline.
///
/// Each inner `Vec<u8>` holds one color plane in the order of the job's
/// [`PlaneLayout`], with pixels packed MSB first at the configured bit depth.
pub type Scanline = Vec<Vec<u8>>;
