use log::{debug, info};
use std::io::Write;

use crate::{
    driver::PageDriver,
    encoder::Encoder,
    error::Error,
    geometry::{PageGeometry, PageHeader},
    model::{ModelFlags, PlaneLayout},
    weave::WeaveStats,
    Scanline,
};

const ESC: u8 = 0x1B;

/// Leaves USB packet mode on printers that power up in it.
const EXIT_PACKET_MODE: &[u8] = b"\x00\x00\x00\x1b\x01@EJL 1284.4\n@EJL     \n\x1b@";
const ENTER_REMOTE: &[u8] = b"\x1b(R\x08\x00\x00REMOTE1";
const EXIT_REMOTE: &[u8] = b"\x1b\x00\x00\x00";

/// Remote mode settings sent at the start of each page on `REMOTE` models.
///
/// Every field is optional; unset fields send nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteMode {
    /// Horizontal offset for borderless printing (`FP`).
    pub borderless_offset: Option<u16>,
    /// Feed sequence (`SN` function 0).
    pub feed_sequence: Option<u8>,
    /// Platen gap (`SN` function 1).
    pub platen_gap: Option<u8>,
    /// Paper feeding and ejecting sequence (`SN` function 2).
    pub eject_sequence: Option<u8>,
    /// Eject delay (`SN` function 6).
    pub eject_delay: Option<u8>,
    /// Media type (`MT`).
    pub media_type: Option<u8>,
    /// Paper thickness (`PH`).
    pub paper_thickness: Option<u8>,
    /// Paper check (`PC`).
    pub paper_check: Option<u8>,
    /// Paper path (`PP`).
    pub paper_path: Option<(u8, u8)>,
    /// Media position (`EX`).
    pub media_position: Option<u8>,
    /// Media size (`MS`). The page size code is derived from the page.
    pub media_size: Option<u8>,
    /// Enable or disable the cutter (`AC`).
    pub cutter: Option<u8>,
    /// Cutting method (`SN` function 0x80), only sent with `cutter`.
    pub cut_method: Option<u8>,
    /// Cutting pressure (`SN` function 0x81), only sent with `cutter`.
    pub cut_pressure: Option<u8>,
    /// Cutter options (`CO`).
    pub cutter_options: Option<u8>,
}

/// `MS` page size code for a page of `page_size` points.
///
/// Known sizes are matched on the page length; anything else is sent as a
/// custom size in 1/360 inch.
fn media_size_code(page_size: [u32; 2]) -> [u8; 6] {
    match page_size[1] {
        1191 => [0x01, 0x00, 0, 0, 0, 0], // A3
        1032 => [0x02, 0x00, 0, 0, 0, 0], // B4
        842 => [0x03, 0x00, 0, 0, 0, 0],  // A4
        595 => [0x03, 0x01, 0, 0, 0, 0],  // A4 transverse
        729 => [0x04, 0x00, 0, 0, 0, 0],  // B5
        516 => [0x04, 0x01, 0, 0, 0, 0],  // B5 transverse
        1369 => [0x20, 0x00, 0, 0, 0, 0], // Super A3/B
        792 => [0x08, 0x00, 0, 0, 0, 0],  // Letter
        612 => [0x08, 0x01, 0, 0, 0, 0],  // Letter transverse
        1004 => [0x0A, 0x00, 0, 0, 0, 0], // Legal
        1224 => [0x2D, 0x00, 0, 0, 0, 0], // Tabloid
        _ => {
            let [width_lo, width_hi] = ((360 * page_size[0] / 72) as u16).to_le_bytes();
            let [length_lo, length_hi] = ((360 * page_size[1] / 72) as u16).to_le_bytes();
            [0xFF, 0xFF, width_lo, width_hi, length_lo, length_hi]
        }
    }
}

impl RemoteMode {
    fn build(&self, page_size: [u32; 2], buf: &mut Vec<u8>) {
        buf.extend_from_slice(ENTER_REMOTE);

        // Disable status reporting
        buf.extend_from_slice(b"ST\x02\x00\x00\x00");

        if let Some(offset) = self.borderless_offset {
            buf.extend_from_slice(b"FP\x03\x00\x00");
            buf.extend_from_slice(&offset.to_le_bytes());
        }

        let sequences = [
            (0x00, self.feed_sequence),
            (0x01, self.platen_gap),
            (0x02, self.eject_sequence),
            (0x06, self.eject_delay),
        ];
        for (function, value) in sequences.iter() {
            if let Some(value) = value {
                buf.extend_from_slice(&[b'S', b'N', 3, 0, 0, *function, *value]);
            }
        }

        if let Some(media_type) = self.media_type {
            buf.extend_from_slice(&[b'M', b'T', 3, 0, 0, 0, media_type]);
        }

        if let Some(thickness) = self.paper_thickness {
            buf.extend_from_slice(&[b'P', b'H', 2, 0, 0, thickness]);
        }

        if let Some(check) = self.paper_check {
            buf.extend_from_slice(&[b'P', b'C', 2, 0, 0, check]);
        }

        if let Some((a, b)) = self.paper_path {
            buf.extend_from_slice(&[b'P', b'P', 3, 0, 0, a, b]);
        }

        if let Some(position) = self.media_position {
            buf.extend_from_slice(&[b'E', b'X', 6, 0, 0, 0, 0, 0, 5, position]);
        }

        if let Some(size) = self.media_size {
            buf.extend_from_slice(&[b'M', b'S', 8, 0, 0, size]);
            buf.extend_from_slice(&media_size_code(page_size));
        }

        if let Some(cutter) = self.cutter {
            buf.extend_from_slice(&[b'A', b'C', 2, 0, 0, cutter]);

            if let Some(method) = self.cut_method {
                buf.extend_from_slice(&[b'S', b'N', 3, 0, 0, 0x80, method]);
            }
            if let Some(pressure) = self.cut_pressure {
                buf.extend_from_slice(&[b'S', b'N', 3, 0, 0, 0x81, pressure]);
            }
        }

        if let Some(options) = self.cutter_options {
            buf.extend_from_slice(&[b'C', b'O', 8, 0, 0, 0, options, 0, 0, 0, 0, 0]);
        }

        buf.extend_from_slice(EXIT_REMOTE);
    }
}

/// Job configuration.
///
/// Holds the model capabilities and the PPD options the driver consumes.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) flags: ModelFlags,
    pub(crate) planes: usize,
    pub(crate) bit_planes: u8,
    pub(crate) black_head: Option<(u32, u32)>,
    pub(crate) head_offsets: [u32; 4],
    pub(crate) top_margin: u32,
    pub(crate) direction: Option<u8>,
    pub(crate) microweave: Option<u8>,
    pub(crate) dot_size: Option<u8>,
    pub(crate) remote: RemoteMode,
}

impl Config {
    /// Initialize configuration data with default values.
    ///
    /// `planes` is the number of inks: 1, 2, 3, 4, 6 or 7.
    ///
    /// # Example
    ///
    /// ```
    /// use escpx::{Config, ModelFlags};
    ///
    /// let config = Config::new(ModelFlags::STAGGER | ModelFlags::ESCK, 4)
    ///     .bit_planes(2)
    ///     .head_offsets([0, 0, 0, 0]);
    /// ```
    pub fn new(flags: ModelFlags, planes: usize) -> Config {
        Config {
            flags,
            planes,
            bit_planes: 1,
            black_head: None,
            head_offsets: [0; 4],
            top_margin: 0,
            direction: None,
            microweave: None,
            dot_size: None,
            remote: RemoteMode::default(),
        }
    }

    /// Bits per pixel per plane: 1, or 2 for variable dot sizes.
    pub fn bit_planes(self, bit_planes: u8) -> Self {
        Config { bit_planes, ..self }
    }

    /// Nozzle count and spacing for black-only softweave.
    pub fn black_head(self, row_count: u32, row_step: u32) -> Self {
        Config {
            black_head: Some((row_count, row_step)),
            ..self
        }
    }

    /// Row offsets of the first four color planes on a staggered head.
    pub fn head_offsets(self, head_offsets: [u32; 4]) -> Self {
        Config {
            head_offsets,
            ..self
        }
    }

    /// Top margin in points.
    pub fn top_margin(self, top_margin: u32) -> Self {
        Config { top_margin, ..self }
    }

    /// 1 for unidirectional printing, 0 for bidirectional.
    pub fn direction(self, direction: u8) -> Self {
        Config {
            direction: Some(direction),
            ..self
        }
    }

    pub fn microweave(self, microweave: u8) -> Self {
        Config {
            microweave: Some(microweave),
            ..self
        }
    }

    pub fn dot_size(self, dot_size: u8) -> Self {
        Config {
            dot_size: Some(dot_size),
            ..self
        }
    }

    pub fn remote(self, remote: RemoteMode) -> Self {
        Config { remote, ..self }
    }

    pub fn flags(&self) -> ModelFlags {
        self.flags
    }

    pub fn layout(&self) -> Result<PlaneLayout, Error> {
        PlaneLayout::from_planes(self.planes).ok_or_else(|| {
            Error::InvalidConfig(format!("{} color planes", self.planes))
        })
    }

    /// Commands sent once before the first page.
    fn build_setup(&self) -> Vec<u8> {
        let mut buf: Vec<u8> = Vec::new();

        if self.flags.contains(ModelFlags::USB) {
            buf.extend_from_slice(EXIT_PACKET_MODE);
        }

        buf
    }

    /// Commands that put the printer in graphics mode for one page.
    fn build_page_setup(&self, header: &PageHeader, geometry: &PageGeometry) -> Vec<u8> {
        let mut buf: Vec<u8> = Vec::new();
        let [xres, yres] = header.resolution;
        let units = geometry.units;

        // ESC @ : initialize
        buf.extend_from_slice(&[ESC, b'@']);

        if self.flags.contains(ModelFlags::REMOTE) {
            self.remote.build(header.page_size, &mut buf);
        }

        // ESC ( G : graphics mode
        buf.extend_from_slice(&[ESC, b'(', b'G', 1, 0, 1]);

        // Line feed increment
        if self.flags.contains(ModelFlags::EXT_UNITS) {
            buf.extend_from_slice(&[
                ESC,
                b'(',
                b'U',
                5,
                0,
                (units / yres) as u8,
                (units / yres) as u8,
                (units / xres) as u8,
            ]);
            buf.extend_from_slice(&(units as u16).to_le_bytes());
        } else {
            buf.extend_from_slice(&[ESC, b'(', b'U', 1, 0, (3600 / yres) as u8]);
        }

        // Page length
        let length = header.page_size[1] * yres / 72;

        if self.flags.contains(ModelFlags::PAGE_SIZE) {
            let width = header.page_size[0] * yres / 72;
            buf.extend_from_slice(&[ESC, b'(', b'S', 8, 0]);
            buf.extend_from_slice(&width.to_le_bytes());
            buf.extend_from_slice(&length.to_le_bytes());
        } else {
            buf.extend_from_slice(&[ESC, b'(', b'C', 2, 0]);
            buf.extend_from_slice(&(length as u16).to_le_bytes());
        }

        // Top and bottom margins
        let top = self.top_margin * yres / 72;

        if self.flags.contains(ModelFlags::EXT_MARGINS) {
            buf.extend_from_slice(&[ESC, b'(', b'c', 8, 0]);
            buf.extend_from_slice(&top.to_le_bytes());
            buf.extend_from_slice(&length.to_le_bytes());
        } else {
            buf.extend_from_slice(&[ESC, b'(', b'c', 4, 0]);
            buf.extend_from_slice(&(top as u16).to_le_bytes());
            buf.extend_from_slice(&(length as u16).to_le_bytes());
        }

        // ESC ( V : top position
        buf.extend_from_slice(&[ESC, b'(', b'V', 2, 0, 0, 0]);

        if let Some(direction) = self.direction {
            buf.extend_from_slice(&[ESC, b'U', direction]);
        }

        if let Some(microweave) = self.microweave {
            buf.extend_from_slice(&[ESC, b'(', b'i', 1, 0, microweave]);
        }

        if let Some(dot_size) = self.dot_size {
            buf.extend_from_slice(&[ESC, b'(', b'e', 2, 0, 0, dot_size]);
        }

        if self.flags.contains(ModelFlags::ESCK) {
            // 1 : fast black, 2 : color
            let mode = if geometry.planes() == 1 { 1 } else { 2 };
            buf.extend_from_slice(&[ESC, b'(', b'K', 2, 0, 0, mode]);
        }

        // ESC ( D : raster resolution
        buf.extend_from_slice(&[ESC, b'(', b'D', 4, 0]);
        buf.extend_from_slice(&(units as u16).to_le_bytes());
        buf.push((units * geometry.row_step as u32 / yres) as u8);
        buf.push((units * geometry.col_step as u32 / xres) as u8);

        debug!("Page setup: {} bytes", buf.len());

        buf
    }

    /// Commands sent after the last page.
    fn build_shutdown(&self) -> Vec<u8> {
        let mut buf: Vec<u8> = vec![ESC, b'@'];

        if self.flags.contains(ModelFlags::REMOTE) {
            buf.extend_from_slice(ENTER_REMOTE);
            // Load defaults
            buf.extend_from_slice(b"LD\x00\x00");
            buf.extend_from_slice(EXIT_REMOTE);
        }

        buf
    }
}

/// A print job writing ESC/P2 data to `W`.
pub struct Job<W: Write> {
    encoder: Encoder<W>,
    config: Config,
    pages: usize,
}

impl<W: Write> Job<W> {
    /// Validate the configuration and send the job preamble.
    pub fn new(out: W, config: Config) -> Result<Self, Error> {
        let layout = config.layout()?;
        debug!("{:?}, inks {:?}", config, layout.channel_names());

        let mut encoder = Encoder::new(out);
        encoder.write_commands(&config.build_setup())?;

        Ok(Job {
            encoder,
            config,
            pages: 0,
        })
    }

    /// Send the page setup and return the driver that takes its scanlines.
    pub fn start_page(&mut self, header: &PageHeader) -> Result<PageDriver<'_, W>, Error> {
        let geometry = PageGeometry::new(header, &self.config)?;

        self.pages += 1;
        info!("Starting page {}", self.pages);

        let buf = self.config.build_page_setup(header, &geometry);
        self.encoder.write_commands(&buf)?;

        Ok(PageDriver::new(&mut self.encoder, geometry))
    }

    /// Print a whole page from an iterator of scanlines.
    pub fn print_page(
        &mut self,
        header: &PageHeader,
        lines: impl IntoIterator<Item = Scanline>,
    ) -> Result<WeaveStats, Error> {
        let page = self.pages + 1;
        let height = header.height as usize;
        let mut driver = self.start_page(header)?;

        for (y, line) in lines.into_iter().enumerate() {
            if y & 127 == 0 && height > 0 {
                info!("Printing page {}, {}% complete", page, 100 * y / height);
            }
            driver.process_line(y, &line[..])?;
        }

        driver.finish()
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn get_ref(&self) -> &W {
        self.encoder.get_ref()
    }

    /// Reset the printer and hand back the output sink.
    pub fn finish(mut self) -> Result<W, Error> {
        let buf = self.config.build_shutdown();
        self.encoder.write_commands(&buf)?;
        self.encoder.flush()?;

        info!("Job done, {} pages", self.pages);

        Ok(self.encoder.into_inner())
    }
}
