use crate::layout::{KernelSideFormat, SideOrder, SourceView, REGISTER_SIZE};
use crate::packed::RegisterBlockDst;

pub mod generic;
pub mod scalar;
mod simd_generic;

#[cfg(target_arch = "aarch64")]
pub mod aarch64;

#[cfg(target_arch = "x86_64")]
pub mod x86_64;

#[cfg(target_arch = "wasm32")]
#[cfg(target_feature = "simd128")]
pub mod wasm;

/// Implementation of the register block store for a particular instruction
/// set.
///
/// A store reorders one complete `kernel_width x REGISTER_SIZE` source
/// window into cells and adds the scaled depth sum of each width position to
/// the rank-one update vector. Every backend must produce output that is
/// identical to [`ScalarBackend`](scalar::ScalarBackend), which is the
/// reference implementation.
///
/// # Safety
///
/// It must only be possible to construct the backend using `new` if the
/// instructions it uses are supported on the current system.
pub unsafe trait PackerBackend: Send + Sync {
    /// Construct a new instance of this backend, if supported on the current
    /// system.
    fn new() -> Option<Self>
    where
        Self: Sized;

    /// Return a name for this backend for use in logging and configuration.
    ///
    /// The naming convention is `{arch}-{isa}`, or just a single word for
    /// backends that are available on all architectures.
    fn name(&self) -> &'static str;

    /// Return true if this backend has a vectorized store for `format`, when
    /// the source has order `order`.
    ///
    /// Formats which are not specialized are handled by the scalar store.
    fn is_specialized(&self, format: &KernelSideFormat, order: SideOrder) -> bool {
        let _ = (format, order);
        false
    }

    /// Pack a complete register block from `src` into `dst`.
    ///
    /// Panics if `src` is not exactly `kernel_width x REGISTER_SIZE` or `dst`
    /// does not have the sizes required by `format`.
    fn store(&self, format: &KernelSideFormat, src: SourceView<u8>, dst: RegisterBlockDst);
}

/// Check that `src` is a complete register block for `format`.
#[inline]
fn assert_complete(format: &KernelSideFormat, src: &SourceView<u8>) {
    assert!(
        src.width() == format.kernel_width() && src.depth() == REGISTER_SIZE,
        "source is not a complete register block"
    );
}
