//! Vectorized register block store, written once for all instruction sets
//! that implement [`PackIsa`].

use super::{assert_complete, scalar};
use crate::layout::{CellFormat, CellOrder, KernelSideFormat, SideOrder, SourceView};
use crate::packed::RegisterBlockDst;

/// SIMD operations used by the vectorized register block store.
///
/// # Safety
///
/// It must only be possible to construct types implementing this trait if
/// the instructions they use are supported on the current system.
pub unsafe trait PackIsa: Copy {
    /// Vector of 16 unsigned bytes.
    type U8x16: Copy;

    /// Vector of 8 unsigned 16-bit integers.
    type U16x8: Copy;

    /// Vector of 4 signed 32-bit integers.
    type I32x4: Copy;

    /// Load 16 bytes from `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reading 16 bytes. It need not be aligned.
    unsafe fn load(self, ptr: *const u8) -> Self::U8x16;

    /// Interleave the low halves of `a` and `b`: `[a0, b0, a1, b1 ... a7, b7]`.
    fn interleave_low(self, a: Self::U8x16, b: Self::U8x16) -> Self::U8x16;

    /// Interleave the high halves of `a` and `b`: `[a8, b8, a9, b9 ... a15, b15]`.
    fn interleave_high(self, a: Self::U8x16, b: Self::U8x16) -> Self::U8x16;

    /// Store the low 8 bytes of `x` to `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writing 8 bytes.
    unsafe fn store_low_half(self, x: Self::U8x16, ptr: *mut u8);

    /// Store the high 8 bytes of `x` to `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writing 8 bytes.
    unsafe fn store_high_half(self, x: Self::U8x16, ptr: *mut u8);

    /// Widen and add the halves of `x`, so that lane `i` is `x[i] + x[i + 8]`.
    fn widen_add_halves_u8(self, x: Self::U8x16) -> Self::U16x8;

    /// Widen and add the halves of `x`, so that lane `i` is `x[i] + x[i + 4]`.
    fn widen_add_halves_u16(self, x: Self::U16x8) -> Self::I32x4;

    /// Add `a` and `b`, wrapping on overflow.
    fn add_i32(self, a: Self::I32x4, b: Self::I32x4) -> Self::I32x4;

    /// Multiply each lane of `x` by `n`, keeping the low 32 bits of the result.
    fn mul_i32(self, x: Self::I32x4, n: i32) -> Self::I32x4;

    /// Load 4 i32 values from `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reading 4 i32 values. It need not be aligned.
    unsafe fn load_i32(self, ptr: *const i32) -> Self::I32x4;

    /// Store 4 i32 values to `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writing 4 i32 values. It need not be aligned.
    unsafe fn store_i32(self, x: Self::I32x4, ptr: *mut i32);
}

/// Cell format that has a vectorized store.
///
/// This is the LHS format used by many Arm int8 kernels.
pub const CELL_4X2: CellFormat = CellFormat::new(4, 2, CellOrder::DepthMajor);

/// Maximum number of [`CELL_4X2`] cells in a vectorized store.
const MAX_CELLS: usize = 4;

/// Return true if [`store_4x2`] has a vectorized implementation for `format`
/// with a source of order `order`.
pub fn supports_4x2(format: &KernelSideFormat, order: SideOrder) -> bool {
    format.cell() == CELL_4X2
        && order == SideOrder::WidthMajor
        && (1..=MAX_CELLS).contains(&format.cells())
}

/// Pack a register block using SIMD shuffles.
///
/// Formats not supported by the vectorized path are packed with
/// [`scalar::store`].
#[inline(always)]
pub fn store_4x2<I: PackIsa>(
    isa: I,
    format: &KernelSideFormat,
    src: SourceView<u8>,
    dst: RegisterBlockDst,
) {
    if !supports_4x2(format, src.order()) {
        return scalar::store(format, src, dst);
    }

    dst.assert_matches(format);
    assert_complete(format, &src);

    // Safety: Source and destination sizes were checked above.
    unsafe {
        match format.cells() {
            1 => store_4x2_cells::<I, 1>(isa, src, dst),
            2 => store_4x2_cells::<I, 2>(isa, src, dst),
            3 => store_4x2_cells::<I, 3>(isa, src, dst),
            4 => store_4x2_cells::<I, 4>(isa, src, dst),
            _ => unreachable!(),
        }
    }
}

/// Interleave `a` and `b`, returning the low and high halves of the result.
#[inline(always)]
fn zip<I: PackIsa>(isa: I, a: I::U8x16, b: I::U8x16) -> [I::U8x16; 2] {
    [isa.interleave_low(a, b), isa.interleave_high(a, b)]
}

/// Pack a width-major register block into `CELLS` depth-major 4x2 cells per
/// depth group.
///
/// # Safety
///
/// `src` must be a complete width-major register block of `4 * CELLS` lines
/// and `dst` must have the sizes required by a format of `CELLS` 4x2 cells.
#[inline(always)]
unsafe fn store_4x2_cells<I: PackIsa, const CELLS: usize>(
    isa: I,
    src: SourceView<u8>,
    dst: RegisterBlockDst,
) {
    let RegisterBlockDst {
        data,
        rank_one_update,
        multiplier,
    } = dst;
    let src_ptr = src.data().as_ptr();
    let stride = src.stride();

    let lines: [[I::U8x16; 4]; CELLS] = std::array::from_fn(|cell| {
        std::array::from_fn(|i| unsafe { isa.load(src_ptr.add((cell * 4 + i) * stride)) })
    });

    // After two rounds of interleaving, each vector holds 4 consecutive depth
    // positions of all 4 lines in a cell, ie. two 4x2 depth-major cells.
    //
    // `blocks[cell][k / 2][k % 2]` holds depth positions `4 * k .. 4 * k + 4`.
    let blocks: [[[I::U8x16; 2]; 2]; CELLS] = std::array::from_fn(|cell| {
        let [l0, l1, l2, l3] = lines[cell];
        let [a_lo, a_hi] = zip(isa, l0, l2);
        let [b_lo, b_hi] = zip(isa, l1, l3);
        [zip(isa, a_lo, b_lo), zip(isa, a_hi, b_hi)]
    });

    let mut dst_ptr = data.as_mut_ptr();
    for outer in 0..2 {
        for inner in 0..2 {
            for cell_blocks in &blocks {
                unsafe {
                    isa.store_low_half(cell_blocks[outer][inner], dst_ptr);
                    dst_ptr = dst_ptr.add(8);
                }
            }
            for cell_blocks in &blocks {
                unsafe {
                    isa.store_high_half(cell_blocks[outer][inner], dst_ptr);
                    dst_ptr = dst_ptr.add(8);
                }
            }
        }
    }

    let update_ptr = rank_one_update.as_mut_ptr();
    for (cell, cell_blocks) in blocks.iter().enumerate() {
        let sums: [I::I32x4; 4] = std::array::from_fn(|k| {
            let x = cell_blocks[k / 2][k % 2];
            isa.widen_add_halves_u16(isa.widen_add_halves_u8(x))
        });
        let sum = isa.add_i32(isa.add_i32(sums[0], sums[1]), isa.add_i32(sums[2], sums[3]));
        let update = isa.mul_i32(sum, multiplier);
        unsafe {
            let ptr = update_ptr.add(cell * 4);
            isa.store_i32(isa.add_i32(isa.load_i32(ptr), update), ptr);
        }
    }
}
