//! Destination buffers for packed blocks.
//!
//! A packed side block holds a `width x depth` block of one input, padded up
//! to a whole number of kernel widths and register sizes. It is organized as
//! a sequence of runs, one for each group of `kernel_width` width positions.
//! Each run holds `padded_depth / cell.depth()` depth groups, and each depth
//! group holds one cell for every cell in the kernel side format.

use rayon::prelude::*;

use crate::layout::{KernelSideFormat, REGISTER_SIZE};

/// Destination of a single register block store.
///
/// `data` holds [`register_block_size`](KernelSideFormat::register_block_size)
/// bytes, and `rank_one_update` holds the running depth sums for the
/// `kernel_width` width positions being packed.
pub struct RegisterBlockDst<'a> {
    pub data: &'a mut [u8],
    pub rank_one_update: &'a mut [i32],
    pub multiplier: i32,
}

impl RegisterBlockDst<'_> {
    /// Check that the destination has the sizes required by `format`.
    ///
    /// Backends call this once on entry to a store.
    #[inline]
    pub fn assert_matches(&self, format: &KernelSideFormat) {
        assert_eq!(
            self.data.len(),
            format.register_block_size(),
            "register block destination has wrong size"
        );
        assert_eq!(
            self.rank_one_update.len(),
            format.kernel_width(),
            "rank-one update slice has wrong size"
        );
    }
}

/// Buffer holding a packed block of one side of a matrix multiplication,
/// together with the sums of each width position over the depth.
///
/// The sums are stored in the rank-one update vector, scaled by the rank-one
/// update multiplier. The multiplier is usually the zero point of the other
/// input, or ±1 if the caller applies the zero point itself.
#[derive(Clone, Debug)]
pub struct PackedSideBlock {
    format: KernelSideFormat,
    width: usize,
    depth: usize,
    padded_width: usize,
    padded_depth: usize,

    data: Vec<u8>,

    /// Offset in `data` where the next register block will be written.
    pos: usize,

    rank_one_update: Vec<i32>,
    rank_one_update_multiplier: i32,
}

impl PackedSideBlock {
    /// Allocate a zeroed block for packing a `width x depth` source view.
    pub fn new(
        format: KernelSideFormat,
        width: usize,
        depth: usize,
        rank_one_update_multiplier: i32,
    ) -> PackedSideBlock {
        let padded_width = width.next_multiple_of(format.kernel_width());
        let padded_depth = depth.next_multiple_of(REGISTER_SIZE);
        PackedSideBlock {
            format,
            width,
            depth,
            padded_width,
            padded_depth,
            data: vec![0; padded_width * padded_depth],
            pos: 0,
            rank_one_update: vec![0; padded_width],
            rank_one_update_multiplier,
        }
    }

    pub fn format(&self) -> KernelSideFormat {
        self.format
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Return the width rounded up to a multiple of the kernel width.
    pub fn padded_width(&self) -> usize {
        self.padded_width
    }

    /// Return the depth rounded up to a multiple of [`REGISTER_SIZE`].
    pub fn padded_depth(&self) -> usize {
        self.padded_depth
    }

    /// Return the size in bytes of each run of `kernel_width` width
    /// positions.
    pub fn run_size(&self) -> usize {
        self.format.kernel_width() * self.padded_depth
    }

    /// Return the whole packed buffer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Return the packed run for width positions starting at `start_width`.
    pub fn run(&self, start_width: usize) -> &[u8] {
        assert!(
            start_width % self.format.kernel_width() == 0 && start_width < self.padded_width,
            "invalid run start"
        );
        let start = start_width * self.padded_depth;
        &self.data[start..start + self.run_size()]
    }

    /// Return the packed value for width position `w` and depth position
    /// `d`.
    pub fn get(&self, w: usize, d: usize) -> u8 {
        assert!(w < self.padded_width && d < self.padded_depth);
        let kernel_width = self.format.kernel_width();
        let run_start = (w / kernel_width) * self.run_size();
        self.data[run_start + self.format.packed_offset(w % kernel_width, d)]
    }

    /// Return the byte offset where the next store will write.
    pub fn cursor(&self) -> usize {
        self.pos
    }

    /// Return the unwritten part of the buffer, starting at the cursor.
    pub fn current_data(&mut self) -> &mut [u8] {
        &mut self.data[self.pos..]
    }

    /// Move the cursor to the position of `(start_width, start_depth)`.
    ///
    /// `start_width` must be a multiple of the kernel width and `start_depth`
    /// a multiple of the cell depth. Seeking to `start_width ==
    /// padded_width()` moves the cursor to the end of the buffer.
    pub fn seek_run(&mut self, start_width: usize, start_depth: usize) {
        let kernel_width = self.format.kernel_width();
        assert!(
            start_width % kernel_width == 0 && start_width <= self.padded_width,
            "invalid run start"
        );
        assert!(
            start_depth % self.format.cell().depth() == 0 && start_depth <= self.padded_depth,
            "invalid run depth"
        );
        self.pos = start_width * self.padded_depth + start_depth * kernel_width;
    }

    /// Advance the cursor by `n` cells.
    pub fn seek_forward_n_cells(&mut self, n: usize) {
        let new_pos = self.pos + n * self.format.cell().size();
        assert!(new_pos <= self.data.len(), "seek past end of packed block");
        self.pos = new_pos;
    }

    /// Advance the cursor by one cell.
    pub fn seek_next_cell(&mut self) {
        self.seek_forward_n_cells(1)
    }

    /// Return the depth sums of each width position, scaled by the
    /// multiplier.
    pub fn rank_one_update(&self) -> &[i32] {
        &self.rank_one_update[..self.width]
    }

    pub fn rank_one_update_multiplier(&self) -> i32 {
        self.rank_one_update_multiplier
    }

    /// Rewind the cursor and clear the rank-one update vector, so that the
    /// block can be filled again.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.rank_one_update.fill(0);
    }

    /// Reserve the next register block at the cursor for the width positions
    /// starting at `start_width`, and advance the cursor past it.
    ///
    /// Panics if the block is full or the width range is outside the
    /// rank-one update vector.
    pub fn next_register_block(&mut self, start_width: usize) -> RegisterBlockDst<'_> {
        let size = self.format.register_block_size();
        let kernel_width = self.format.kernel_width();
        assert!(
            start_width + kernel_width <= self.rank_one_update.len(),
            "width range is outside of rank-one update vector"
        );
        assert!(self.pos + size <= self.data.len(), "packed block is full");

        let start = self.pos;
        self.pos += size;

        RegisterBlockDst {
            data: &mut self.data[start..start + size],
            rank_one_update: &mut self.rank_one_update[start_width..start_width + kernel_width],
            multiplier: self.rank_one_update_multiplier,
        }
    }

    /// Split the block into its runs, which can be filled independently and
    /// in parallel.
    ///
    /// This does not move the cursor.
    pub fn runs_mut(&mut self) -> impl IndexedParallelIterator<Item = PackedRun<'_>> {
        let format = self.format;
        let kernel_width = format.kernel_width();
        let multiplier = self.rank_one_update_multiplier;

        // If the depth is zero there is no data, and zipping with the empty
        // data chunks yields no runs.
        let run_size = self.run_size().max(1);

        self.data
            .par_chunks_mut(run_size)
            .zip(self.rank_one_update.par_chunks_mut(kernel_width))
            .enumerate()
            .map(move |(i, (data, rank_one_update))| PackedRun {
                format,
                start_width: i * kernel_width,
                data,
                rank_one_update,
                multiplier,
                pos: 0,
            })
    }
}

/// Mutable view of a single run of a [`PackedSideBlock`].
pub struct PackedRun<'a> {
    format: KernelSideFormat,
    start_width: usize,
    data: &'a mut [u8],
    rank_one_update: &'a mut [i32],
    multiplier: i32,
    pos: usize,
}

impl PackedRun<'_> {
    pub fn format(&self) -> KernelSideFormat {
        self.format
    }

    /// Return the first width position covered by this run.
    pub fn start_width(&self) -> usize {
        self.start_width
    }

    /// Return the byte offset within the run where the next store will
    /// write.
    pub fn cursor(&self) -> usize {
        self.pos
    }

    /// Reserve the next register block in the run and advance the cursor
    /// past it.
    pub fn next_register_block(&mut self) -> RegisterBlockDst<'_> {
        let size = self.format.register_block_size();
        assert!(self.pos + size <= self.data.len(), "packed run is full");

        let start = self.pos;
        self.pos += size;

        RegisterBlockDst {
            data: &mut self.data[start..start + size],
            rank_one_update: &mut *self.rank_one_update,
            multiplier: self.multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use rayon::prelude::*;

    use super::PackedSideBlock;
    use crate::layout::{CellFormat, CellOrder, KernelSideFormat, REGISTER_SIZE};

    fn format_4x2(cells: usize) -> KernelSideFormat {
        KernelSideFormat::new(CellFormat::new(4, 2, CellOrder::DepthMajor), cells).unwrap()
    }

    #[test]
    fn test_new_pads_block() {
        let block = PackedSideBlock::new(format_4x2(2), 10, 20, 1);
        assert_eq!(block.padded_width(), 16);
        assert_eq!(block.padded_depth(), 32);
        assert_eq!(block.run_size(), 8 * 32);
        assert_eq!(block.data().len(), 16 * 32);
        assert_eq!(block.rank_one_update().len(), 10);
        assert_eq!(block.cursor(), 0);
    }

    #[test]
    fn test_seek() {
        let mut block = PackedSideBlock::new(format_4x2(2), 16, 32, 1);

        block.seek_run(8, 0);
        assert_eq!(block.cursor(), 8 * 32);

        block.seek_run(8, 16);
        assert_eq!(block.cursor(), 8 * 32 + 16 * 8);

        block.seek_next_cell();
        assert_eq!(block.cursor(), 8 * 32 + 16 * 8 + 8);

        block.seek_forward_n_cells(3);
        assert_eq!(block.cursor(), 8 * 32 + 16 * 8 + 32);
        assert_eq!(block.current_data().len(), block.data().len() - block.cursor());

        block.seek_run(16, 0);
        assert_eq!(block.cursor(), block.data().len());
    }

    #[test]
    #[should_panic(expected = "invalid run start")]
    fn test_seek_run_unaligned() {
        let mut block = PackedSideBlock::new(format_4x2(2), 16, 32, 1);
        block.seek_run(4, 0);
    }

    #[test]
    fn test_next_register_block() {
        let format = format_4x2(2);
        let mut block = PackedSideBlock::new(format, 16, 32, -1);

        {
            let dst = block.next_register_block(8);
            dst.assert_matches(&format);
            assert_eq!(dst.multiplier, -1);
            dst.data.fill(1);
            dst.rank_one_update.fill(5);
        }
        assert_eq!(block.cursor(), format.register_block_size());
        assert_eq!(&block.rank_one_update()[..8], &[0; 8]);
        assert_eq!(&block.rank_one_update()[8..], &[5; 8]);
        assert_eq!(block.data()[format.register_block_size() - 1], 1);
        assert_eq!(block.data()[format.register_block_size()], 0);

        block.reset();
        assert_eq!(block.cursor(), 0);
        assert_eq!(block.rank_one_update(), &[0; 16]);
    }

    #[test]
    #[should_panic(expected = "packed block is full")]
    fn test_next_register_block_full() {
        let mut block = PackedSideBlock::new(format_4x2(1), 4, REGISTER_SIZE, 1);
        block.next_register_block(0);
        block.next_register_block(0);
    }

    #[test]
    #[should_panic(expected = "width range is outside of rank-one update vector")]
    fn test_next_register_block_bad_width() {
        let mut block = PackedSideBlock::new(format_4x2(1), 8, REGISTER_SIZE, 1);
        block.next_register_block(6);
    }

    #[test]
    fn test_get_and_run() {
        let format = format_4x2(2);
        let mut block = PackedSideBlock::new(format, 16, 16, 1);

        // Write a marker at the position of width 13, depth 5.
        let offset = 8 * 16 + format.packed_offset(13 - 8, 5);
        block.seek_run(0, 0);
        block.current_data()[offset] = 42;

        assert_eq!(block.get(13, 5), 42);
        assert_eq!(block.run(8)[format.packed_offset(5, 5)], 42);
        assert_eq!(block.get(5, 5), 0);
    }

    #[test]
    fn test_runs_mut() {
        let format = format_4x2(2);
        let mut block = PackedSideBlock::new(format, 20, 40, 3);

        let starts: Vec<(usize, usize)> = block
            .runs_mut()
            .map(|mut run| {
                let start_width = run.start_width();
                let mut n_blocks = 0;
                while run.cursor() < 8 * 48 {
                    let dst = run.next_register_block();
                    dst.assert_matches(&format);
                    dst.rank_one_update[0] += dst.multiplier;
                    n_blocks += 1;
                }
                (start_width, n_blocks)
            })
            .collect();

        assert_eq!(starts, vec![(0, 3), (8, 3), (16, 3)]);
        assert_eq!(block.rank_one_update()[0], 9);
        assert_eq!(block.rank_one_update()[8], 9);
        assert_eq!(block.rank_one_update()[16], 9);
    }

    #[test]
    fn test_runs_mut_zero_depth() {
        let mut block = PackedSideBlock::new(format_4x2(2), 16, 0, 1);
        assert_eq!(block.runs_mut().count(), 0);
    }
}
