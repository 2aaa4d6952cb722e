//! Descriptors for where source elements live and how packed cells are laid
//! out.

use crate::errors::{PackError, PackResult};

/// Number of depth elements loaded from each source line by a register block.
///
/// This is the number of 8-bit lanes in a 128-bit SIMD register.
pub const REGISTER_SIZE: usize = 16;

/// Specifies which dimension of a [`SourceView`] is contiguous in memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SideOrder {
    /// Elements of each width position are contiguous along the depth.
    WidthMajor,
    /// Elements at each depth position are contiguous along the width.
    DepthMajor,
}

/// Memory order of a matrix, used to build a [`SourceView`] for either side
/// of a matrix multiplication.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MatrixOrder {
    RowMajor,
    ColMajor,
}

/// Convert a byte from signed to unsigned and shift the value so that it
/// is the same distance from the minimum value.
///
/// For example `-125` (i8::MIN + 3) becomes `3` (u8::MIN + 3).
#[inline]
pub fn shift_cast_i8_u8(x: i8) -> u8 {
    x as u8 ^ 0x80
}

/// Element types which can be packed.
///
/// Packed blocks always hold unsigned bytes. Types other than `u8` are
/// converted while packing.
pub trait PackElem: Copy + Default + Send + Sync + 'static {
    /// Convert this element to the byte stored in a packed block.
    fn to_packed(self) -> u8;

    /// Return `slice` as packed bytes if no conversion is needed.
    fn as_packed_slice(_slice: &[Self]) -> Option<&[u8]> {
        None
    }
}

impl PackElem for u8 {
    #[inline]
    fn to_packed(self) -> u8 {
        self
    }

    fn as_packed_slice(slice: &[u8]) -> Option<&[u8]> {
        Some(slice)
    }
}

impl PackElem for i8 {
    #[inline]
    fn to_packed(self) -> u8 {
        shift_cast_i8_u8(self)
    }
}

/// Read-only view of a `width x depth` region of one side of a matrix
/// multiplication.
///
/// The width is the output dimension (rows of the LHS, columns of the RHS)
/// and the depth is the reduction dimension. Elements are addressed as
/// `w * width_stride + d * depth_stride` relative to the start of `data`,
/// where the stride of the non-contiguous dimension is `stride`.
#[derive(Clone, Copy, Debug)]
pub struct SourceView<'a, T> {
    data: &'a [T],
    width: usize,
    depth: usize,
    stride: usize,
    order: SideOrder,
}

impl<'a, T: Copy> SourceView<'a, T> {
    /// Create a view of `data`.
    ///
    /// Fails if `stride` is shorter than a line, or if `data` does not
    /// contain every element the view addresses.
    pub fn new(
        data: &'a [T],
        width: usize,
        depth: usize,
        stride: usize,
        order: SideOrder,
    ) -> PackResult<Self> {
        let (lines, line_len) = match order {
            SideOrder::WidthMajor => (width, depth),
            SideOrder::DepthMajor => (depth, width),
        };
        if stride < line_len {
            return Err(PackError::StrideTooSmall);
        }
        let required_len = if lines == 0 || line_len == 0 {
            Some(0)
        } else {
            (lines - 1)
                .checked_mul(stride)
                .and_then(|len| len.checked_add(line_len))
        };
        // A length that overflows can never be covered by `data`.
        match required_len {
            Some(len) if data.len() >= len => {}
            _ => return Err(PackError::SourceTooShort),
        }
        Ok(SourceView {
            data,
            width,
            depth,
            stride,
            order,
        })
    }

    /// Create a view whose size has already been checked by the caller.
    ///
    /// Out of range accesses still panic, since element reads are bounds
    /// checked.
    pub(crate) fn from_parts(
        data: &'a [T],
        width: usize,
        depth: usize,
        stride: usize,
        order: SideOrder,
    ) -> Self {
        debug_assert!(Self::new(data, width, depth, stride, order).is_ok());
        SourceView {
            data,
            width,
            depth,
            stride,
            order,
        }
    }

    /// Create a view of the LHS / "A" matrix of shape `[rows, cols]`.
    ///
    /// The width of the view is the row count and the depth is the column
    /// count. `stride` is the row stride for row-major matrices or the column
    /// stride for column-major matrices.
    pub fn lhs(
        data: &'a [T],
        rows: usize,
        cols: usize,
        stride: usize,
        order: MatrixOrder,
    ) -> PackResult<Self> {
        let side_order = match order {
            MatrixOrder::RowMajor => SideOrder::WidthMajor,
            MatrixOrder::ColMajor => SideOrder::DepthMajor,
        };
        Self::new(data, rows, cols, stride, side_order)
    }

    /// Create a view of the RHS / "B" matrix of shape `[rows, cols]`.
    ///
    /// The width of the view is the column count and the depth is the row
    /// count.
    pub fn rhs(
        data: &'a [T],
        rows: usize,
        cols: usize,
        stride: usize,
        order: MatrixOrder,
    ) -> PackResult<Self> {
        let side_order = match order {
            MatrixOrder::RowMajor => SideOrder::DepthMajor,
            MatrixOrder::ColMajor => SideOrder::WidthMajor,
        };
        Self::new(data, cols, rows, stride, side_order)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn order(&self) -> SideOrder {
        self.order
    }

    /// Return the underlying data, starting at the element at `(0, 0)`.
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    /// Return the distance between adjacent width positions.
    #[inline]
    pub fn width_stride(&self) -> usize {
        match self.order {
            SideOrder::WidthMajor => self.stride,
            SideOrder::DepthMajor => 1,
        }
    }

    /// Return the distance between adjacent depth positions.
    #[inline]
    pub fn depth_stride(&self) -> usize {
        match self.order {
            SideOrder::WidthMajor => 1,
            SideOrder::DepthMajor => self.stride,
        }
    }

    /// Return the offset of the element at width `w` and depth `d`.
    #[inline]
    pub fn offset(&self, w: usize, d: usize) -> usize {
        w * self.width_stride() + d * self.depth_stride()
    }

    /// Return the element at width `w` and depth `d`.
    #[inline]
    pub fn get(&self, w: usize, d: usize) -> T {
        debug_assert!(w < self.width && d < self.depth);
        self.data[self.offset(w, d)]
    }

    /// Return the number of contiguous elements in each line.
    pub fn line_len(&self) -> usize {
        match self.order {
            SideOrder::WidthMajor => self.depth,
            SideOrder::DepthMajor => self.width,
        }
    }

    /// Return the `index`th contiguous line.
    ///
    /// For a width-major view this is the width position `index`, for a
    /// depth-major view it is the depth position `index`.
    pub fn line(&self, index: usize) -> &'a [T] {
        let start = index * self.stride;
        &self.data[start..start + self.line_len()]
    }

    /// Return a view of the `width x depth` block starting at
    /// `(start_width, start_depth)`.
    ///
    /// Panics if the block extends outside this view.
    pub fn block(
        &self,
        start_width: usize,
        start_depth: usize,
        width: usize,
        depth: usize,
    ) -> SourceView<'a, T> {
        let in_range = |start: usize, len: usize, max: usize| {
            start.checked_add(len).is_some_and(|end| end <= max)
        };
        assert!(
            in_range(start_width, width, self.width) && in_range(start_depth, depth, self.depth),
            "block is outside of source view"
        );
        let data = if width == 0 || depth == 0 {
            &self.data[..0]
        } else {
            &self.data[self.offset(start_width, start_depth)..]
        };
        SourceView {
            data,
            width,
            depth,
            stride: self.stride,
            order: self.order,
        }
    }
}

impl<'a, T: PackElem> SourceView<'a, T> {
    /// Return this view as a view of packed bytes, if the element type does
    /// not require conversion.
    pub fn as_packed(&self) -> Option<SourceView<'a, u8>> {
        T::as_packed_slice(self.data).map(|data| SourceView {
            data,
            width: self.width,
            depth: self.depth,
            stride: self.stride,
            order: self.order,
        })
    }
}

/// Order of elements within a packed cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CellOrder {
    /// All width positions for depth 0, then depth 1 and so on.
    DepthMajor,
    /// All depth positions for width 0, then width 1 and so on.
    WidthMajor,
    /// Diagonals of a square cell are stored as rows, so that width position
    /// `w` at depth `d` lands in row `(w - d) mod size`.
    Diagonal,
}

/// Shape and internal order of the smallest unit of a packed block.
///
/// Cells hold 8-bit elements, so the size in elements and bytes is the same.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CellFormat {
    width: usize,
    depth: usize,
    order: CellOrder,
}

impl CellFormat {
    pub const fn new(width: usize, depth: usize, order: CellOrder) -> CellFormat {
        CellFormat {
            width,
            depth,
            order,
        }
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    pub const fn depth(&self) -> usize {
        self.depth
    }

    pub const fn order(&self) -> CellOrder {
        self.order
    }

    /// Return the size of a cell in bytes.
    pub const fn size(&self) -> usize {
        self.width * self.depth
    }

    /// Return the offset of width position `w` and depth position `d` within
    /// a cell.
    #[inline]
    pub fn offset(&self, w: usize, d: usize) -> usize {
        debug_assert!(w < self.width && d < self.depth);
        match self.order {
            CellOrder::DepthMajor => w + d * self.width,
            CellOrder::WidthMajor => d + w * self.depth,
            CellOrder::Diagonal => {
                let size = self.width;
                ((size + w - d) * size + d) % (size * size)
            }
        }
    }

    fn validate(&self) -> PackResult<()> {
        if self.width == 0 || self.depth == 0 {
            return Err(PackError::EmptyCell);
        }
        if REGISTER_SIZE % self.depth != 0 {
            return Err(PackError::CellDepthMismatch);
        }
        if self.order == CellOrder::Diagonal && self.width != self.depth {
            return Err(PackError::DiagonalCellNotSquare);
        }
        Ok(())
    }
}

/// Layout of the cells which cover the width processed by one kernel call.
///
/// The kernel width is `cell.width() * cells`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KernelSideFormat {
    cell: CellFormat,
    cells: usize,
}

impl KernelSideFormat {
    /// Create a format with `cells` adjacent cells of format `cell`.
    pub fn new(cell: CellFormat, cells: usize) -> PackResult<Self> {
        if cells == 0 {
            return Err(PackError::ZeroCells);
        }
        cell.validate()?;
        Ok(KernelSideFormat { cell, cells })
    }

    /// Create a format that covers `kernel_width` width positions.
    pub fn with_kernel_width(cell: CellFormat, kernel_width: usize) -> PackResult<Self> {
        cell.validate()?;
        if kernel_width % cell.width() != 0 {
            return Err(PackError::KernelWidthMismatch);
        }
        Self::new(cell, kernel_width / cell.width())
    }

    pub fn cell(&self) -> CellFormat {
        self.cell
    }

    pub fn cells(&self) -> usize {
        self.cells
    }

    /// Return the number of width positions covered by the format.
    pub fn kernel_width(&self) -> usize {
        self.cell.width() * self.cells
    }

    /// Return the size in bytes of one depth group, which is one cell depth
    /// of every cell.
    pub fn depth_group_size(&self) -> usize {
        self.cells * self.cell.size()
    }

    /// Return the number of cells written by one register block store.
    pub fn cells_per_register_block(&self) -> usize {
        self.cells * REGISTER_SIZE / self.cell.depth()
    }

    /// Return the size in bytes written by one register block store.
    pub fn register_block_size(&self) -> usize {
        self.kernel_width() * REGISTER_SIZE
    }

    /// Return the offset of the element at `(w, d)` within a packed run,
    /// where `w < kernel_width` and `d` is the depth from the start of the
    /// run.
    #[inline]
    pub fn packed_offset(&self, w: usize, d: usize) -> usize {
        let cell = self.cell;
        (d / cell.depth()) * self.depth_group_size()
            + (w / cell.width()) * cell.size()
            + cell.offset(w % cell.width(), d % cell.depth())
    }
}
