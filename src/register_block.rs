use smallvec::SmallVec;

use crate::backends::PackerBackend;
use crate::layout::{KernelSideFormat, PackElem, SideOrder, SourceView, REGISTER_SIZE};
use crate::packed::{PackedRun, PackedSideBlock};

/// Maximum kernel width for which the buffered source of a register block is
/// stored inline rather than on the heap.
pub const MAX_INLINE_KERNEL_WIDTH: usize = 16;

type BlockBuffer = SmallVec<[u8; MAX_INLINE_KERNEL_WIDTH * REGISTER_SIZE]>;

enum CompleteSrc<'a> {
    /// Window of the caller's source, used without copying.
    InPlace(SourceView<'a, u8>),

    /// Copy of the window with missing elements set to zero.
    ///
    /// The buffer has the same order as the source it was copied from, with
    /// the stride set to the line length.
    Buffered { data: BlockBuffer, order: SideOrder },
}

/// A `kernel_width x REGISTER_SIZE` window of a source, ready to be stored
/// into a packed block.
///
/// Windows at the right or bottom edge of a source may be smaller than a
/// register block. These are padded with zeros when loaded, so that stores
/// always operate on complete blocks.
pub struct PackingRegisterBlock<'a> {
    format: KernelSideFormat,
    src: CompleteSrc<'a>,
}

impl<'a> PackingRegisterBlock<'a> {
    /// Load a window of at most `kernel_width x REGISTER_SIZE` elements.
    ///
    /// Complete windows of bytes are used in place. Partial windows, and
    /// windows whose elements need conversion, are copied into a buffer.
    pub fn load<T: PackElem>(format: KernelSideFormat, window: SourceView<'a, T>) -> Self {
        let kernel_width = format.kernel_width();
        assert!(
            window.width() <= kernel_width && window.depth() <= REGISTER_SIZE,
            "window is larger than a register block"
        );

        let complete = window.width() == kernel_width && window.depth() == REGISTER_SIZE;
        let src = match window.as_packed() {
            Some(bytes) if complete => CompleteSrc::InPlace(bytes),
            _ => {
                let order = window.order();
                let stride = buffer_stride(kernel_width, order);
                let mut data = BlockBuffer::from_elem(0, kernel_width * REGISTER_SIZE);
                for w in 0..window.width() {
                    for d in 0..window.depth() {
                        let offset = match order {
                            SideOrder::WidthMajor => w * stride + d,
                            SideOrder::DepthMajor => d * stride + w,
                        };
                        data[offset] = window.get(w, d).to_packed();
                    }
                }
                CompleteSrc::Buffered { data, order }
            }
        };

        PackingRegisterBlock { format, src }
    }

    pub fn format(&self) -> KernelSideFormat {
        self.format
    }

    /// Return true if the block reads directly from the caller's source.
    pub fn is_in_place(&self) -> bool {
        matches!(self.src, CompleteSrc::InPlace(_))
    }

    /// Return the complete register block.
    pub fn src(&self) -> SourceView<'_, u8> {
        match &self.src {
            CompleteSrc::InPlace(view) => *view,
            CompleteSrc::Buffered { data, order } => {
                let kernel_width = self.format.kernel_width();
                SourceView::from_parts(
                    data,
                    kernel_width,
                    REGISTER_SIZE,
                    buffer_stride(kernel_width, *order),
                    *order,
                )
            }
        }
    }

    /// Pack this block into `dst` at the cursor, adding depth sums to the
    /// rank-one update for width positions `start_width..start_width +
    /// kernel_width`.
    ///
    /// The cursor advances by one register block.
    pub fn store<B: PackerBackend + ?Sized>(
        &self,
        backend: &B,
        dst: &mut PackedSideBlock,
        start_width: usize,
    ) {
        assert_eq!(dst.format(), self.format, "packed block has a different format");
        backend.store(&self.format, self.src(), dst.next_register_block(start_width));
    }

    /// Pack this block into the next register block of `run`.
    pub fn store_run<B: PackerBackend + ?Sized>(&self, backend: &B, run: &mut PackedRun) {
        assert_eq!(run.format(), self.format, "packed run has a different format");
        backend.store(&self.format, self.src(), run.next_register_block());
    }
}

/// Return the stride of a buffered register block.
fn buffer_stride(kernel_width: usize, order: SideOrder) -> usize {
    match order {
        SideOrder::WidthMajor => REGISTER_SIZE,
        SideOrder::DepthMajor => kernel_width,
    }
}
