//! Per-page scanline orchestration.

use log::{debug, info};
use std::io::Write;

use crate::{
    encoder::Encoder,
    error::Error,
    geometry::PageGeometry,
    pack::{is_blank, pack_columns},
    weave::{BandScheduler, WeaveStats},
};

enum Mode {
    /// One line buffer per plane, split with `chunks_mut(bytes_per_row)`.
    Direct { lines: Vec<u8> },
    Softweave(BandScheduler),
}

/// Drives one page: every scanline goes through here, in order.
pub struct PageDriver<'a, W: Write> {
    encoder: &'a mut Encoder<W>,
    geometry: PageGeometry,
    mode: Mode,
    lines: usize,
}

impl<'a, W: Write> PageDriver<'a, W> {
    /// Set up the page state. Page setup commands must already be written.
    pub fn new(encoder: &'a mut Encoder<W>, geometry: PageGeometry) -> Self {
        encoder.reset_page();

        let mode = if geometry.is_softweave() {
            Mode::Softweave(BandScheduler::new(&geometry))
        } else {
            Mode::Direct {
                lines: vec![0; geometry.planes() * geometry.bytes_per_row],
            }
        };

        PageDriver {
            encoder,
            geometry,
            mode,
            lines: 0,
        }
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// Consume scanline `y`: one packed, dithered row per plane.
    pub fn process_line<L: AsRef<[u8]>>(&mut self, y: usize, planes: &[L]) -> Result<(), Error> {
        let geometry = &self.geometry;

        if planes.len() != geometry.planes() {
            return Err(Error::PlaneMismatch {
                expected: geometry.planes(),
                actual: planes.len(),
            });
        }

        let expected = geometry.line_bytes();
        for (plane, line) in planes.iter().enumerate() {
            let actual = line.as_ref().len();
            if actual < expected {
                return Err(Error::ShortScanline {
                    plane,
                    expected,
                    actual,
                });
            }
        }

        match &mut self.mode {
            Mode::Direct { lines } => {
                for (plane, (line, buffer)) in planes
                    .iter()
                    .zip(lines.chunks_mut(geometry.bytes_per_row))
                    .enumerate()
                {
                    let line = &line.as_ref()[..expected];
                    if is_blank(line) {
                        continue;
                    }

                    pack_columns(line, geometry.bit_planes, 0, 1, geometry.width, buffer);
                    self.encoder.emit_line(geometry, plane, buffer)?;
                }

                self.encoder.skip_lines(1);
            }
            Mode::Softweave(scheduler) => {
                for (plane, line) in planes.iter().enumerate() {
                    scheduler.place_line(geometry, y, plane, line.as_ref(), &mut *self.encoder)?;
                }
            }
        }

        self.lines += 1;
        Ok(())
    }

    /// Flush everything still buffered and eject the page.
    pub fn finish(self) -> Result<WeaveStats, Error> {
        let PageDriver {
            encoder,
            geometry,
            mode,
            lines,
        } = self;

        let stats = match mode {
            Mode::Softweave(scheduler) => scheduler.finish(&geometry, &mut *encoder)?,
            Mode::Direct { .. } => {
                debug!("Direct page done, {} lines pending feed", encoder.pending_feed());
                WeaveStats::default()
            }
        };

        encoder.end_page()?;
        info!("Finished page, {} lines", lines);

        Ok(stats)
    }
}
