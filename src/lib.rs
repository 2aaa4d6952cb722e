//! qpack packs blocks of the inputs of a low-precision (8-bit) matrix
//! multiplication into the cell layout that a GEMM kernel consumes.
//!
//! While packing, it also computes the sum of every row of the LHS (or column
//! of the RHS) along the depth dimension. Kernels that work with quantized
//! values need these sums to correct for zero points, and computing them
//! while the data is already in registers avoids a second pass over the
//! input.
//!
//! # Packing a block
//!
//! ```
//! use qpack::{
//!     CellFormat, CellOrder, KernelSideFormat, MatrixOrder, PackedSideBlock, Packer, SourceView,
//! };
//!
//! // A 10x40 row-major LHS matrix.
//! let data: Vec<u8> = (0..400).map(|x| (x % 256) as u8).collect();
//! let src = SourceView::lhs(&data, 10, 40, 40, MatrixOrder::RowMajor)?;
//!
//! // Kernel consumes 2 cells of 4 rows x 2 depth positions.
//! let format = KernelSideFormat::new(CellFormat::new(4, 2, CellOrder::DepthMajor), 2)?;
//! let mut packed = PackedSideBlock::new(format, 10, 40, 1 /* multiplier */);
//!
//! Packer::default().pack(src, &mut packed)?;
//!
//! let row_sum: i32 = data[..40].iter().map(|&x| x as i32).sum();
//! assert_eq!(packed.rank_one_update()[0], row_sum);
//! # Ok::<(), qpack::PackError>(())
//! ```
//!
//! # Layout
//!
//! A [`PackedSideBlock`] is a sequence of runs, one per `kernel_width` width
//! positions. Each run is a sequence of depth groups, and each depth group
//! holds one [`CellFormat`] cell per cell in the [`KernelSideFormat`].
//! Widths and depths are padded with zeros to a whole number of kernel
//! widths and [`REGISTER_SIZE`] depth positions.
//!
//! # Backends
//!
//! Stores are implemented for several instruction sets, which are selected
//! at runtime. The preferred backend can be overridden by setting the
//! `QPACK_BACKEND` environment variable to a backend name (see
//! [`BackendType::name`]). All backends produce identical output.

mod backends;
mod env;
mod errors;
mod layout;
mod packed;
mod packer;
mod register_block;


pub use backends::generic::GenericBackend;
pub use backends::scalar::ScalarBackend;
pub use backends::PackerBackend;

#[cfg(target_arch = "aarch64")]
pub use backends::aarch64::ArmNeonBackend;
#[cfg(target_arch = "wasm32")]
#[cfg(target_feature = "simd128")]
pub use backends::wasm::WasmBackend;
#[cfg(target_arch = "x86_64")]
pub use backends::x86_64::Sse41Backend;

pub use env::BACKEND_VAR;
pub use errors::{PackError, PackResult};
pub use layout::{
    shift_cast_i8_u8, CellFormat, CellOrder, KernelSideFormat, MatrixOrder, PackElem, SideOrder,
    SourceView, REGISTER_SIZE,
};
pub use packed::{PackedRun, PackedSideBlock, RegisterBlockDst};
pub use packer::{BackendType, Packer};
pub use register_block::{PackingRegisterBlock, MAX_INLINE_KERNEL_WIDTH};

/// Pack a register block using the scalar reference implementation.
///
/// This supports every format and source order.
pub use backends::scalar::store as store_scalar;
