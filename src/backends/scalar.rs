use super::{assert_complete, PackerBackend};
use crate::layout::{KernelSideFormat, SourceView, REGISTER_SIZE};
use crate::packed::RegisterBlockDst;

/// Reference backend which packs using indexed loads and stores.
///
/// This supports every cell format and source order.
#[derive(Default)]
pub struct ScalarBackend {
    _private: (),
}

// Safety - The scalar backend uses no special instructions.
unsafe impl PackerBackend for ScalarBackend {
    fn new() -> Option<Self> {
        Some(ScalarBackend { _private: () })
    }

    fn name(&self) -> &'static str {
        "scalar"
    }

    fn store(&self, format: &KernelSideFormat, src: SourceView<u8>, dst: RegisterBlockDst) {
        store(format, src, dst)
    }
}

/// Pack a complete register block from `src` into `dst`, one element at a
/// time.
///
/// Cells are written in order of depth group and then cell index. Each
/// width position's depth sum is scaled by the multiplier and added to the
/// rank-one update using wrapping arithmetic.
pub fn store(format: &KernelSideFormat, src: SourceView<u8>, dst: RegisterBlockDst) {
    dst.assert_matches(format);
    assert_complete(format, &src);

    let RegisterBlockDst {
        data,
        rank_one_update,
        multiplier,
    } = dst;
    let cell = format.cell();

    let mut offset = 0;
    for cell_start_depth in (0..REGISTER_SIZE).step_by(cell.depth()) {
        for cell_start_width in (0..format.kernel_width()).step_by(cell.width()) {
            let cell_data = &mut data[offset..offset + cell.size()];
            for w in 0..cell.width() {
                let mut sum = 0i32;
                for d in 0..cell.depth() {
                    let val = src.get(cell_start_width + w, cell_start_depth + d);
                    cell_data[cell.offset(w, d)] = val;
                    sum += val as i32;
                }
                let update = &mut rank_one_update[cell_start_width + w];
                *update = update.wrapping_add(sum.wrapping_mul(multiplier));
            }
            offset += cell.size();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{store, ScalarBackend};
    use crate::backends::PackerBackend;
    use crate::layout::{
        CellFormat, CellOrder, KernelSideFormat, SideOrder, SourceView, REGISTER_SIZE,
    };
    use crate::packed::PackedSideBlock;

    #[test]
    fn test_store_4x2_two_cells() {
        let format =
            KernelSideFormat::new(CellFormat::new(4, 2, CellOrder::DepthMajor), 2).unwrap();
        let data: Vec<u8> = (0..128).collect();
        let src = SourceView::new(&data, 8, REGISTER_SIZE, 16, SideOrder::WidthMajor).unwrap();

        let multiplier = -1;
        let mut block = PackedSideBlock::new(format, 8, REGISTER_SIZE, multiplier);
        store(&format, src, block.next_register_block(0));

        assert_eq!(block.cursor(), 128);

        // 8 depth groups, each with 2 depth-major 4x2 cells.
        let packed = block.data();
        for group in 0..8 {
            for cell in 0..2 {
                let cell_data = &packed[group * 16 + cell * 8..][..8];
                for d in 0..2 {
                    for w in 0..4 {
                        let line = cell * 4 + w;
                        let depth = group * 2 + d;
                        assert_eq!(cell_data[w + d * 4] as usize, line * 16 + depth);
                    }
                }
            }
        }

        // Line `i` holds `16 * i .. 16 * i + 16`.
        let expected_sums: Vec<i32> = (0..8).map(|i| -(256 * i + 120)).collect();
        assert_eq!(block.rank_one_update(), expected_sums.as_slice());
    }

    #[test]
    fn test_store_accumulates_sums() {
        let format =
            KernelSideFormat::new(CellFormat::new(2, 4, CellOrder::WidthMajor), 1).unwrap();
        let data = vec![3u8; 2 * 32];
        let src = SourceView::new(&data, 2, 32, 32, SideOrder::WidthMajor).unwrap();

        let mut block = PackedSideBlock::new(format, 2, 32, 2);
        let backend = ScalarBackend::default();
        backend.store(&format, src.block(0, 0, 2, 16), block.next_register_block(0));
        backend.store(&format, src.block(0, 16, 2, 16), block.next_register_block(0));

        assert_eq!(block.rank_one_update(), &[3 * 32 * 2, 3 * 32 * 2]);
        assert_eq!(block.cursor(), 64);
    }

    #[test]
    #[should_panic(expected = "source is not a complete register block")]
    fn test_store_partial_source() {
        let format =
            KernelSideFormat::new(CellFormat::new(4, 2, CellOrder::DepthMajor), 1).unwrap();
        let data = [0u8; 64];
        let src = SourceView::new(&data, 4, 8, 16, SideOrder::WidthMajor).unwrap();
        let mut block = PackedSideBlock::new(format, 4, REGISTER_SIZE, 1);
        store(&format, src, block.next_register_block(0));
    }
}
