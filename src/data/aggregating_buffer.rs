//! Multi-level aggregating ring buffer for bounded, multi-resolution history.
//!
//! The buffer stores `levels` resolutions of one logical sample series inside
//! a single flat allocation of `size * levels` elements. Level `levels - 1` is
//! the raw, finest resolution; each level below it represents the same element
//! count at `aggregation_factor` times coarser time granularity. Every level
//! always holds exactly `size` elements.
//!
//! Enqueuing `n` new samples slides the finest level left by `n` and appends
//! the new samples at its tail. Before that slide, each coarser level receives
//! one aggregate per `aggregation_factor` samples exiting the level below it.
//! Aggregation is plain decimation (every `aggregation_factor`-th sample is
//! kept verbatim), never averaging, so coarse levels stay faithful to values
//! a client actually received at full rate.
//!
//! Level windows are index ranges into the shared backing store. [`view`]
//! aliases the whole store without copying, which keeps catch-up reads over
//! megabyte-scale history cheap.
//!
//! [`view`]: AggregatingBuffer::view

/// Fixed-capacity circular store holding `levels` resolutions of one series.
#[derive(Debug, Clone)]
pub struct AggregatingBuffer<T> {
    size: usize,
    levels: usize,
    aggregation_factor: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> AggregatingBuffer<T> {
    /// Allocate a buffer of `levels` windows with `size` elements each.
    ///
    /// The backing store is filled with `fill` if given, otherwise with the
    /// element default. Callers that skip the fill must not interpret buffer
    /// content before enough real data has been written.
    ///
    /// # Panics
    ///
    /// Panics if `size`, `levels`, or `aggregation_factor` is zero; these are
    /// contract violations, not runtime data conditions.
    pub fn new(size: usize, levels: usize, aggregation_factor: usize, fill: Option<T>) -> Self {
        assert!(size >= 1, "buffer size must be at least 1");
        assert!(levels >= 1, "buffer must have at least one level");
        assert!(
            aggregation_factor >= 1,
            "aggregation factor must be at least 1"
        );

        Self {
            size,
            levels,
            aggregation_factor,
            data: vec![fill.unwrap_or_default(); size * levels],
        }
    }

    /// Capacity of each level, in samples.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of resolution levels.
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Ratio of raw samples represented by one sample at the next coarser level.
    pub fn aggregation_factor(&self) -> usize {
        self.aggregation_factor
    }

    /// Enqueue new finest-resolution samples.
    ///
    /// The oldest `values.len()` elements of the finest level are pushed out
    /// and the new samples appended at its tail. Every coarser level receives
    /// the decimated image of what exits the level below it: level `L` sees
    /// one sample per `aggregation_factor^k` raw samples for `k` levels below
    /// the finest.
    ///
    /// # Panics
    ///
    /// Panics if `values.len() > size`.
    pub fn add(&mut self, values: &[T]) {
        let n = values.len();
        assert!(
            n <= self.size,
            "cannot enqueue {n} samples into a level of {} elements",
            self.size
        );

        // Feed aggregates of each level's outgoing window to the next coarser
        // level, second-finest to coarsest relative to the data flow: level
        // L - 1 must consume level L's head before level L itself slides.
        for level in 1..self.levels {
            let count = n / self.aggregation_factor.pow((self.levels - level) as u32);
            if count == 0 {
                continue;
            }

            let (coarser, outgoing) = self.data.split_at_mut(level * self.size);
            let window = &mut coarser[(level - 1) * self.size..];
            window.copy_within(count.., 0);
            for i in 0..count {
                window[self.size - count + i] = outgoing[i * self.aggregation_factor];
            }
        }

        // Slide the finest level and append the new samples at its tail.
        let finest = (self.levels - 1) * self.size;
        self.data.copy_within(finest + n.., finest);
        let tail = self.size * self.levels - n;
        self.data[tail..].copy_from_slice(values);
    }

    /// Read-only view over the full `size * levels` backing store, coarsest
    /// level first. Aliases the storage, never copies.
    pub fn view(&self) -> &[T] {
        &self.data
    }

    /// Mutable view over the full backing store.
    pub fn view_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Read-only window of one resolution level.
    ///
    /// # Panics
    ///
    /// Panics if `level >= levels`.
    pub fn level(&self, level: usize) -> &[T] {
        assert!(level < self.levels, "level {level} out of range");
        &self.data[level * self.size..(level + 1) * self.size]
    }
}
