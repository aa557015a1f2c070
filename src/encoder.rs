//! ESC/P2 command encoding for raster bands and lines.

use log::debug;
use std::io::Write;

use crate::{
    band::Band,
    compress::{compress, Compression, Encoding},
    error::Error,
    geometry::PageGeometry,
    model::ModelFlags,
    weave::BandSink,
};

const ESC: u8 = 0x1B;
const CR: u8 = 0x0D;
const FF: u8 = 0x0C;

/// Writes print data to the device stream and tracks the head position.
pub struct Encoder<W: Write> {
    out: W,
    /// Device row of the last emitted graphics.
    current_row: usize,
    /// Rows to feed before the next graphics command.
    output_feed: usize,
    /// Color code selected by the last `ESC r`.
    last_color: Option<u8>,
}

impl<W: Write> Encoder<W> {
    pub fn new(out: W) -> Self {
        Encoder {
            out,
            current_row: 0,
            output_feed: 0,
            last_color: None,
        }
    }

    /// Forget head position and color state at the top of a page.
    pub fn reset_page(&mut self) {
        self.current_row = 0;
        self.output_feed = 0;
        self.last_color = None;
    }

    /// Send preformatted command bytes.
    pub fn write_commands(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.out.write_all(buf)?;
        Ok(())
    }

    /// Account for `lines` rows the head moved past without printing.
    pub fn skip_lines(&mut self, lines: usize) {
        self.output_feed += lines;
    }

    pub fn pending_feed(&self) -> usize {
        self.output_feed
    }

    /// Print one line in direct mode. The line is always packbits compressed
    /// unless that would not make it shorter.
    pub fn emit_line(&mut self, geometry: &PageGeometry, plane: usize, data: &[u8]) -> Result<(), Error> {
        let mut buf: Vec<u8> = Vec::with_capacity(data.len() + 32);

        self.push_feed(&mut buf);
        self.push_graphics(&mut buf, geometry, plane, data, 1, Compression::PackBits, 0);

        self.out.write_all(&buf)?;
        Ok(())
    }

    pub fn end_page(&mut self) -> Result<(), Error> {
        self.out.write_all(&[FF])?;
        self.out.flush()?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.out.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn push_feed(&mut self, buf: &mut Vec<u8>) {
        if self.output_feed > 0 {
            let feed = self.output_feed as u16;
            buf.extend_from_slice(&[ESC, b'(', b'v', 2, 0]);
            buf.extend_from_slice(&feed.to_le_bytes());
            self.output_feed = 0;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_graphics(
        &mut self,
        buf: &mut Vec<u8>,
        geometry: &PageGeometry,
        plane: usize,
        raw: &[u8],
        rows: usize,
        compression: Compression,
        offset: usize,
    ) {
        let encoding = match compression {
            Compression::None => Encoding::Raw(raw),
            Compression::PackBits => compress(raw),
        };

        // Position the print head
        buf.push(CR);

        if offset != 0 {
            if geometry.bit_planes == 1 {
                buf.extend_from_slice(&[ESC, b'(', b'\\', 4, 0, 0xA0, 0x05]);
            } else {
                buf.extend_from_slice(&[ESC, b'\\']);
            }
            buf.extend_from_slice(&(offset as u16).to_le_bytes());
        }

        let bytes = raw.len() / rows.max(1);
        let color = geometry.layout.color_code(plane);

        if geometry.flags.contains(ModelFlags::RASTER_ESCI) {
            buf.extend_from_slice(&[
                ESC,
                b'i',
                color,
                encoding.compression().code(),
                geometry.bit_planes,
            ]);
            buf.extend_from_slice(&(bytes as u16).to_le_bytes());
            buf.extend_from_slice(&(rows as u16).to_le_bytes());
        } else {
            if geometry.planes() > 1 && self.last_color != Some(color) {
                if color & 0x10 != 0 {
                    buf.extend_from_slice(&[ESC, b'(', b'r', 2, 0, 1, color & 0x0F]);
                } else {
                    buf.extend_from_slice(&[ESC, b'r', color]);
                }
                self.last_color = Some(color);
            }

            // ESC . counts dots, not bytes
            let dots = (bytes * 8) as u16;
            buf.extend_from_slice(&[
                ESC,
                b'.',
                encoding.compression().code(),
                geometry.y_step(),
                geometry.x_step(),
                rows as u8,
            ]);
            buf.extend_from_slice(&dots.to_le_bytes());
        }

        buf.extend_from_slice(encoding.bytes());
    }
}

impl<W: Write> BandSink for Encoder<W> {
    fn emit_band(&mut self, band: &Band, data: &[u8], geometry: &PageGeometry) -> Result<(), Error> {
        self.output_feed = band.y.saturating_sub(self.current_row);
        self.current_row = band.y;

        debug!(
            "Printing band x = {}, y = {}, plane = {}, count = {}, feed = {}",
            band.x, band.y, band.plane, band.count, self.output_feed
        );

        let mut buf: Vec<u8> = Vec::with_capacity(data.len() + 32);
        self.push_feed(&mut buf);
        self.push_graphics(
            &mut buf,
            geometry,
            band.plane,
            data,
            band.count,
            geometry.compression,
            band.x,
        );

        self.out.write_all(&buf)?;
        Ok(())
    }
}
