//! Reusable row buffers for softweave output.
//!
//! All band buffers live in one allocation owned by the [`BandPool`]; a band
//! is addressed by its [`BandId`] and its rows are indexed slices of that
//! allocation.

/// Index of a band inside its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BandId(usize);

/// One band of rows waiting to be printed in a single head pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Band {
    /// Column group, i.e. the head offset applied when printing.
    pub x: usize,
    /// Absolute device row of the first row in the buffer.
    pub y: usize,
    pub plane: usize,
    /// A dot has been written since the last reset.
    pub dirty: bool,
    /// Next row to write.
    pub row: usize,
    /// Rows this band holds before it is printed.
    pub count: usize,
}

impl Band {
    /// Print order key. Bands must reach the printer sorted by this key.
    pub fn key(&self) -> (usize, usize, usize) {
        (self.y, self.x, self.plane)
    }
}

#[derive(Debug)]
pub struct BandPool {
    bands: Vec<Band>,
    storage: Vec<u8>,
    bytes_per_row: usize,
    rows_per_band: usize,
    available: Vec<BandId>,
    used: Vec<BandId>,
}

impl BandPool {
    /// Create `n` zero-filled bands of `rows_per_band` rows, all available.
    pub fn allocate(n: usize, rows_per_band: usize, bytes_per_row: usize) -> Self {
        BandPool {
            bands: vec![Band::default(); n],
            storage: vec![0; n * rows_per_band * bytes_per_row],
            bytes_per_row,
            rows_per_band,
            available: (0..n).map(BandId).collect(),
            used: Vec::with_capacity(n),
        }
    }

    /// Pop the most recently released band.
    pub fn take(&mut self) -> Option<BandId> {
        self.available.pop()
    }

    /// Zero `id` and return it to the available stack.
    pub fn reset_into_available(&mut self, id: BandId) {
        self.clear(id);
        self.available.push(id);
    }

    /// Zero the buffer of `id` and rewind it.
    pub fn clear(&mut self, id: BandId) {
        let range = self.range(id, self.rows_per_band);
        self.storage[range].fill(0);

        let band = &mut self.bands[id.0];
        band.dirty = false;
        band.row = 0;
    }

    /// Queue `id` for output, keeping the used list sorted by [`Band::key`].
    ///
    /// Bands with equal keys keep their insertion order.
    pub fn push_used(&mut self, id: BandId) {
        let key = self.bands[id.0].key();
        let bands = &self.bands;
        let at = self.used.partition_point(|other| bands[other.0].key() <= key);
        self.used.insert(at, id);
    }

    /// Remove the lowest-key used band, the next one due on paper.
    pub fn pop_used_head(&mut self) -> Option<BandId> {
        if self.used.is_empty() {
            None
        } else {
            Some(self.used.remove(0))
        }
    }

    pub fn used(&self) -> &[BandId] {
        &self.used
    }

    pub fn available_len(&self) -> usize {
        self.available.len()
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn band(&self, id: BandId) -> &Band {
        &self.bands[id.0]
    }

    pub fn band_mut(&mut self, id: BandId) -> &mut Band {
        &mut self.bands[id.0]
    }

    /// The first `band.count` rows of `id`, i.e. what gets printed.
    pub fn data(&self, id: BandId) -> &[u8] {
        let count = self.bands[id.0].count.min(self.rows_per_band);
        &self.storage[self.range(id, count)]
    }

    /// Mutable view of row `row` of `id`.
    pub fn row_mut(&mut self, id: BandId, row: usize) -> &mut [u8] {
        let start = (id.0 * self.rows_per_band + row) * self.bytes_per_row;
        &mut self.storage[start..start + self.bytes_per_row]
    }

    fn range(&self, id: BandId, rows: usize) -> std::ops::Range<usize> {
        let start = id.0 * self.rows_per_band * self.bytes_per_row;
        start..start + rows * self.bytes_per_row
    }
}
