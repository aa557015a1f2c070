//! Softweave band scheduling.
//!
//! Every `(subrow, plane)` pair of the print head owns one resident band.
//! Scanlines are split into column passes and written into the resident band
//! of their subrow; a band that fills up is either queued for output (it has
//! dots) or moved down the page in place (it is blank). When the pool runs
//! dry the oldest queued band is printed immediately to free its buffer.

use log::debug;

use crate::{
    band::{Band, BandId, BandPool},
    error::Error,
    geometry::PageGeometry,
    pack::{is_blank, pack_columns},
};

/// Destination for finished bands.
pub trait BandSink {
    /// Print `band`, whose first `band.count` rows are `data`.
    fn emit_band(&mut self, band: &Band, data: &[u8], geometry: &PageGeometry)
        -> Result<(), Error>;
}

/// Counters collected over one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeaveStats {
    /// Rows written into bands, per plane.
    pub rows_placed: [usize; 7],
    /// Rows of bands that were queued or recycled, per plane.
    pub rows_retired: [usize; 7],
    pub bands_emitted: usize,
    pub forced_flushes: usize,
    pub blank_bands: usize,
}

pub struct BandScheduler {
    pool: BandPool,
    slots: Vec<Option<BandId>>,
    planes: usize,
    stats: WeaveStats,
}

impl BandScheduler {
    /// Allocate the band pool for a page and seed every slot.
    pub fn new(geometry: &PageGeometry) -> Self {
        let mut scheduler = BandScheduler {
            pool: BandPool::allocate(
                geometry.pool_size(),
                geometry.row_count,
                geometry.bytes_per_row,
            ),
            slots: vec![None; geometry.subrows() * geometry.planes()],
            planes: geometry.planes(),
            stats: WeaveStats::default(),
        };

        scheduler.seed(geometry);
        scheduler
    }

    /// Bind the first band of every slot, staggering the counts so the
    /// first passes of the head line up with the interleave.
    fn seed(&mut self, geometry: &PageGeometry) {
        let modrow = geometry.subrows();
        let row_count = geometry.row_count as isize;
        let mut subrow = modrow - 1;
        let mut y = geometry.row_feed;

        for _ in 0..modrow {
            while self.slots[subrow * self.planes].is_some() {
                subrow = (subrow + 1) % modrow;
            }

            for plane in 0..self.planes {
                let id = match self.pool.take() {
                    Some(id) => id,
                    None => return,
                };

                let count = row_count - (y / geometry.row_step) as isize;
                let band = self.pool.band_mut(id);
                band.x = subrow / geometry.row_step;
                band.y = subrow % geometry.row_step + geometry.row_offsets[plane];
                band.plane = plane;
                band.row = 0;
                band.count = count.max(1).min(row_count) as usize;

                debug!(
                    "Band[{}][{}] x = {}, y = {}, count = {}",
                    subrow, plane, band.x, band.y, band.count
                );

                self.slots[subrow * self.planes + plane] = Some(id);
            }

            subrow = (subrow + geometry.row_feed) % modrow;
            y += geometry.row_feed;
        }
    }

    /// Write scanline `y` of `plane` into the bands of every column pass.
    ///
    /// `line` is the full-width packed scanline for the plane.
    pub fn place_line<S: BandSink>(
        &mut self,
        geometry: &PageGeometry,
        y: usize,
        plane: usize,
        line: &[u8],
        sink: &mut S,
    ) -> Result<(), Error> {
        let sub_width = geometry.sub_width();

        for pass in 0..geometry.col_step {
            let subrow = y % geometry.row_step + pass * geometry.row_step;
            let id = self.slots[subrow * self.planes + plane]
                .expect("every slot is bound from seeding until finish");

            let row = self.pool.band(id).row;
            let out = self.pool.row_mut(id, row);
            pack_columns(
                line,
                geometry.bit_planes,
                pass,
                geometry.col_step,
                sub_width,
                out,
            );
            let blank = is_blank(out);

            let band = self.pool.band_mut(id);
            band.row += 1;
            band.dirty |= !blank;
            self.stats.rows_placed[plane] += 1;

            if band.row >= band.count {
                self.retire(geometry, subrow, plane, id, sink)?;
            }
        }

        Ok(())
    }

    /// Handle a full band sitting in slot `(subrow, plane)`.
    fn retire<S: BandSink>(
        &mut self,
        geometry: &PageGeometry,
        subrow: usize,
        plane: usize,
        id: BandId,
        sink: &mut S,
    ) -> Result<(), Error> {
        let band = self.pool.band(id).clone();
        self.stats.rows_retired[plane] += band.count;

        if !band.dirty {
            debug!(
                "Blank band x = {}, y = {}, plane = {}, count = {}",
                band.x, band.y, band.plane, band.count
            );
            let band = self.pool.band_mut(id);
            band.y += band.count * geometry.row_step;
            band.row = 0;
            band.count = geometry.row_count;
            self.stats.blank_bands += 1;
            return Ok(());
        }

        self.pool.push_used(id);

        let next = match self.pool.take() {
            Some(next) => next,
            None => self.evict(geometry, sink)?,
        };

        let replacement = self.pool.band_mut(next);
        replacement.x = band.x;
        replacement.y = band.y + band.count * geometry.row_step;
        replacement.plane = band.plane;
        replacement.row = 0;
        replacement.count = geometry.row_count;

        self.slots[subrow * self.planes + plane] = Some(next);
        Ok(())
    }

    /// Print the head of the used list right away and hand back its buffer.
    fn evict<S: BandSink>(&mut self, geometry: &PageGeometry, sink: &mut S) -> Result<BandId, Error> {
        let head = self
            .pool
            .pop_used_head()
            .expect("used list holds at least the band just queued");

        debug!("Pool exhausted, flushing band {:?}", self.pool.band(head));

        self.emit(geometry, head, sink)?;
        self.pool.clear(head);
        self.stats.forced_flushes += 1;

        Ok(head)
    }

    fn emit<S: BandSink>(&mut self, geometry: &PageGeometry, id: BandId, sink: &mut S) -> Result<(), Error> {
        sink.emit_band(self.pool.band(id), self.pool.data(id), geometry)?;
        self.stats.bands_emitted += 1;
        Ok(())
    }

    /// Finalize every resident band and print the whole used list in order.
    pub fn finish<S: BandSink>(mut self, geometry: &PageGeometry, sink: &mut S) -> Result<WeaveStats, Error> {
        for slot in 0..self.slots.len() {
            let id = match self.slots[slot].take() {
                Some(id) => id,
                None => continue,
            };

            let band = self.pool.band_mut(id);
            if band.row > 0 {
                band.count = band.row;
                let (plane, rows) = (band.plane, band.row);
                self.stats.rows_retired[plane] += rows;
                self.pool.push_used(id);
            } else {
                self.pool.reset_into_available(id);
            }
        }

        debug!(
            "End of page: {} used, {} available",
            self.pool.used().len(),
            self.pool.available_len()
        );

        while let Some(id) = self.pool.pop_used_head() {
            self.emit(geometry, id, sink)?;
            self.pool.reset_into_available(id);
        }

        debug!("{:?}", self.stats);

        Ok(self.stats)
    }

    pub fn stats(&self) -> &WeaveStats {
        &self.stats
    }

    pub fn pool(&self) -> &BandPool {
        &self.pool
    }

    /// Keys of the queued bands in output order.
    pub fn used_keys(&self) -> Vec<(usize, usize, usize)> {
        self.pool
            .used()
            .iter()
            .map(|&id| self.pool.band(id).key())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{geometry::PageHeader, job::Config, model::ModelFlags};

    #[derive(Default)]
    struct Recorder {
        bands: Vec<(Band, Vec<u8>)>,
    }

    impl BandSink for Recorder {
        fn emit_band(&mut self, band: &Band, data: &[u8], _: &PageGeometry) -> Result<(), Error> {
            self.bands.push((band.clone(), data.to_vec()));
            Ok(())
        }
    }

    fn geometry(row_count: u32, row_step: u32, planes: usize, width: u32) -> PageGeometry {
        let header = PageHeader::new([720, 720], width, 0).weave(row_count, 0, row_step);
        let config = Config::new(ModelFlags::empty(), planes);
        PageGeometry::new(&header, &config).unwrap()
    }

    fn is_sorted(keys: &[(usize, usize, usize)]) -> bool {
        keys.windows(2).all(|w| w[0] <= w[1])
    }

    #[test]
    fn test_seeding_binds_every_slot() {
        let geometry = geometry(8, 4, 2, 16);
        let scheduler = BandScheduler::new(&geometry);

        assert!(scheduler.slots.iter().all(|slot| slot.is_some()));
        assert_eq!(
            scheduler.pool.available_len(),
            geometry.pool_size() - geometry.subrows() * geometry.planes()
        );

        for subrow in 0..geometry.subrows() {
            for plane in 0..geometry.planes() {
                let id = scheduler.slots[subrow * 2 + plane].unwrap();
                let band = scheduler.pool.band(id);
                assert_eq!(band.y, subrow % 4);
                assert_eq!(band.plane, plane);
                assert!(band.count >= 1 && band.count <= 8);
            }
        }
    }

    #[test]
    fn test_seed_counts_are_staggered() {
        // RowCount 8, RowStep 4, auto feed 1: subrows 3, 0, 1, 2 visited
        // with y = 1, 2, 3, 4 giving counts 8, 8, 8, 7
        let geometry = geometry(8, 4, 1, 16);
        assert_eq!(geometry.row_feed, 1);
        let scheduler = BandScheduler::new(&geometry);

        let counts: Vec<usize> = (0..4)
            .map(|subrow| scheduler.pool.band(scheduler.slots[subrow].unwrap()).count)
            .collect();
        assert_eq!(counts, vec![8, 8, 7, 8]);
    }

    #[test]
    fn test_blank_lines_never_reach_the_sink() {
        let geometry = geometry(8, 4, 1, 16);
        let mut scheduler = BandScheduler::new(&geometry);
        let mut sink = Recorder::default();

        for y in 0..100 {
            scheduler
                .place_line(&geometry, y, 0, &[0, 0], &mut sink)
                .unwrap();
        }

        assert!(sink.bands.is_empty());
        assert!(scheduler.used_keys().is_empty());
        assert!(scheduler.stats().blank_bands > 0);
    }

    #[test]
    fn test_used_stays_sorted_and_flushes_in_order() {
        let geometry = geometry(6, 3, 2, 16);
        let mut scheduler = BandScheduler::new(&geometry);
        let mut sink = Recorder::default();

        for y in 0..200 {
            let line = if y % 7 == 3 { [0, 0] } else { [0x80, y as u8] };
            for plane in 0..2 {
                scheduler
                    .place_line(&geometry, y, plane, &line, &mut sink)
                    .unwrap();
                assert!(is_sorted(&scheduler.used_keys()));
            }
        }

        let flushed_before = sink.bands.len();
        let stats = scheduler.finish(&geometry, &mut sink).unwrap();
        let drained: Vec<_> = sink.bands[flushed_before..]
            .iter()
            .map(|(band, _)| band.key())
            .collect();
        assert!(is_sorted(&drained));
        assert_eq!(stats.bands_emitted, sink.bands.len());
    }

    #[test]
    fn test_rows_are_conserved() {
        let geometry = geometry(8, 4, 2, 16);
        let mut scheduler = BandScheduler::new(&geometry);
        let mut sink = Recorder::default();
        let lines = 157;

        for y in 0..lines {
            for plane in 0..2 {
                let line = if (y / 10) % 3 == plane { [0, 0] } else { [0x01, 0x10] };
                scheduler
                    .place_line(&geometry, y, plane, &line, &mut sink)
                    .unwrap();
            }
        }

        let stats = scheduler.finish(&geometry, &mut sink).unwrap();
        for plane in 0..2 {
            assert_eq!(stats.rows_placed[plane], lines);
            assert_eq!(stats.rows_retired[plane], lines);
        }
    }

    #[test]
    fn test_dirty_rows_are_all_printed() {
        let geometry = geometry(8, 4, 1, 16);
        let mut scheduler = BandScheduler::new(&geometry);
        let mut sink = Recorder::default();
        let lines = 90;

        for y in 0..lines {
            scheduler
                .place_line(&geometry, y, 0, &[0xFF, y as u8], &mut sink)
                .unwrap();
        }
        scheduler.finish(&geometry, &mut sink).unwrap();

        let printed: usize = sink.bands.iter().map(|(band, _)| band.count).sum();
        assert_eq!(printed, lines);
        for (band, data) in &sink.bands {
            assert_eq!(data.len(), band.count * geometry.bytes_per_row);
        }
    }

    #[test]
    fn test_column_passes_fill_separate_subrows() {
        // ColStep 2: pixel columns alternate between two subrows
        let geometry = geometry(4, 201, 1, 16);
        assert_eq!(geometry.subrows(), 2);
        assert_eq!(geometry.bytes_per_row, 1);
        let mut scheduler = BandScheduler::new(&geometry);
        let mut sink = Recorder::default();

        // even pixels all set, odd pixels clear
        for y in 0..8 {
            scheduler
                .place_line(&geometry, y, 0, &[0xAA, 0xAA], &mut sink)
                .unwrap();
        }
        scheduler.finish(&geometry, &mut sink).unwrap();

        assert!(sink.bands.iter().any(|(band, _)| band.x == 0));
        for (band, data) in &sink.bands {
            match band.x {
                0 => assert!(data.iter().all(|&b| b == 0xFF)),
                1 => assert!(data.iter().all(|&b| b == 0x00)),
                x => panic!("unexpected column group {}", x),
            }
        }
    }

    #[test]
    fn test_staggered_head_survives_forced_flushes() {
        let header = PageHeader::new([720, 720], 16, 0).weave(4, 0, 2);
        let config = Config::new(ModelFlags::STAGGER, 4).head_offsets([0, 8, 16, 24]);
        let geometry = PageGeometry::new(&header, &config).unwrap();
        assert_eq!(geometry.pool_size(), 32);

        let mut scheduler = BandScheduler::new(&geometry);
        let mut sink = Recorder::default();
        let lines = 120;

        for y in 0..lines {
            for plane in 0..4 {
                let line = if (y + plane) % 9 == 0 { [0, 0] } else { [0x11, 0x88] };
                let emitted = sink.bands.len();
                scheduler
                    .place_line(&geometry, y, plane, &line, &mut sink)
                    .unwrap();

                let used = scheduler.used_keys();
                assert!(is_sorted(&used));
                for (band, _) in &sink.bands[emitted..] {
                    assert!(used.iter().all(|key| band.key() <= *key));
                }
            }
        }

        assert!(scheduler.stats().forced_flushes > 0);
        for (band, _) in &sink.bands {
            assert!(band.y >= geometry.row_offsets[band.plane]);
        }

        let stats = scheduler.finish(&geometry, &mut sink).unwrap();
        for plane in 0..4 {
            assert_eq!(stats.rows_placed[plane], lines);
            assert_eq!(stats.rows_retired[plane], lines);
        }
        assert_eq!(stats.bands_emitted, sink.bands.len());
    }

    #[test]
    fn test_exhausted_pool_flushes_lowest_band() {
        // RowStep 4, one plane: 16 bands, 4 resident, 12 free
        let geometry = geometry(2, 4, 1, 8);
        assert_eq!(geometry.pool_size(), 16);
        let mut scheduler = BandScheduler::new(&geometry);
        let mut sink = Recorder::default();

        let mut y = 0;
        while sink.bands.is_empty() {
            let before = scheduler.used_keys();
            let free_before = scheduler.pool.available_len();

            scheduler
                .place_line(&geometry, y, 0, &[0xFF], &mut sink)
                .unwrap();
            y += 1;

            if let Some((flushed, _)) = sink.bands.first() {
                assert_eq!(free_before, 0);
                assert!(before.iter().all(|key| flushed.key() <= *key));
                assert_eq!(scheduler.used_keys().len(), before.len());
                assert_eq!(scheduler.stats().forced_flushes, 1);
            }
            assert!(y < 1000);
        }
    }
}
