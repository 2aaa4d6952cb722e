use rayon::prelude::*;

use crate::backends::generic::GenericBackend;
use crate::backends::scalar::ScalarBackend;
use crate::backends::PackerBackend;
use crate::env;
use crate::errors::{PackError, PackResult};
use crate::layout::{PackElem, SourceView, REGISTER_SIZE};
use crate::packed::PackedSideBlock;
use crate::register_block::PackingRegisterBlock;

/// Argument for [`Packer::with_backend`] specifying which backend to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendType {
    /// Use the scalar reference implementation. Always available.
    Scalar,

    /// Use the vectorized store with portable code. Always available.
    Generic,

    /// Use SSE 4.1 instructions. Intel x64 only.
    #[cfg(target_arch = "x86_64")]
    Sse41,

    /// Use Arm Neon instructions. Arm 64 only.
    #[cfg(target_arch = "aarch64")]
    ArmNeon,

    /// Use WASM SIMD instructions. WASM only.
    #[cfg(target_arch = "wasm32")]
    #[cfg(target_feature = "simd128")]
    Wasm,
}

impl BackendType {
    /// Return the name of the backend, as returned by
    /// [`PackerBackend::name`].
    pub fn name(self) -> &'static str {
        match self {
            BackendType::Scalar => "scalar",
            BackendType::Generic => "generic",
            #[cfg(target_arch = "x86_64")]
            BackendType::Sse41 => "x86_64-sse4.1",
            #[cfg(target_arch = "aarch64")]
            BackendType::ArmNeon => "aarch64-neon",
            #[cfg(target_arch = "wasm32")]
            #[cfg(target_feature = "simd128")]
            BackendType::Wasm => "wasm32-simd128",
        }
    }

    /// Return the backend type with a given name.
    pub fn from_name(name: &str) -> Option<BackendType> {
        BackendType::all().into_iter().find(|bt| bt.name() == name)
    }

    /// Return all backend types compiled into this build, from most to least
    /// preferred.
    ///
    /// Not all of these are necessarily supported on the current system.
    pub fn all() -> Vec<BackendType> {
        let mut types = Vec::new();

        #[cfg(target_arch = "x86_64")]
        types.push(BackendType::Sse41);

        #[cfg(target_arch = "aarch64")]
        types.push(BackendType::ArmNeon);

        #[cfg(target_arch = "wasm32")]
        #[cfg(target_feature = "simd128")]
        types.push(BackendType::Wasm);

        types.push(BackendType::Generic);
        types.push(BackendType::Scalar);

        types
    }

    /// Return the backend types supported on the current system.
    pub fn available() -> Vec<BackendType> {
        BackendType::all()
            .into_iter()
            .filter(|&bt| Packer::with_backend(bt).is_some())
            .collect()
    }
}

/// Packs blocks of a matrix multiplication input into the cell layout
/// expected by a kernel.
///
/// The instruction set used is chosen when the packer is created. All
/// backends produce identical output, so the choice only affects speed.
pub struct Packer {
    backend: Box<dyn PackerBackend>,
}

/// Try to construct a [`Packer`] with a given backend type.
macro_rules! try_backend {
    ($backend_type:expr) => {
        if let Some(packer) = Self::with_backend($backend_type) {
            return packer;
        }
    };
}

impl Packer {
    /// Create a packer using the preferred backend for the current system.
    ///
    /// See [`Packer::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a packer using the given backend. Returns `None` if the backend
    /// is not supported on the current system.
    pub fn with_backend(backend_type: BackendType) -> Option<Self> {
        match backend_type {
            BackendType::Scalar => Self::from_backend::<ScalarBackend>(),
            BackendType::Generic => Self::from_backend::<GenericBackend>(),
            #[cfg(target_arch = "x86_64")]
            BackendType::Sse41 => Self::from_backend::<crate::backends::x86_64::Sse41Backend>(),
            #[cfg(target_arch = "aarch64")]
            BackendType::ArmNeon => {
                Self::from_backend::<crate::backends::aarch64::ArmNeonBackend>()
            }
            #[cfg(target_arch = "wasm32")]
            #[cfg(target_feature = "simd128")]
            BackendType::Wasm => Self::from_backend::<crate::backends::wasm::WasmBackend>(),
        }
    }

    /// Create a packer using the backend with a given name.
    pub fn with_backend_name(name: &str) -> PackResult<Self> {
        BackendType::from_name(name)
            .and_then(Self::with_backend)
            .ok_or(PackError::BackendUnavailable)
    }

    fn from_backend<B: PackerBackend + 'static>() -> Option<Self> {
        B::new().map(|backend| Packer {
            backend: Box::new(backend),
        })
    }

    /// Return the backend used by this packer.
    pub fn backend(&self) -> &dyn PackerBackend {
        &*self.backend
    }

    /// Return the name of the backend used by this packer.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Store a register block into `dst` at the cursor, using this packer's
    /// backend.
    pub fn store(&self, block: &PackingRegisterBlock, dst: &mut PackedSideBlock, start_width: usize) {
        block.store(self.backend(), dst, start_width)
    }

    /// Pack all of `src` into `dst`.
    ///
    /// The rank-one update vector of `dst` is cleared first, so that it holds
    /// the depth sums of `src` on return. The cursor is left at the end of
    /// the block.
    pub fn pack<T: PackElem>(&self, src: SourceView<T>, dst: &mut PackedSideBlock) -> PackResult<()> {
        check_shape(&src, dst)?;
        dst.reset();

        let format = dst.format();
        let kernel_width = format.kernel_width();

        for start_width in (0..dst.padded_width()).step_by(kernel_width) {
            dst.seek_run(start_width, 0);
            let width = kernel_width.min(src.width() - start_width);
            for start_depth in (0..src.depth()).step_by(REGISTER_SIZE) {
                let depth = REGISTER_SIZE.min(src.depth() - start_depth);
                let window = src.block(start_width, start_depth, width, depth);
                PackingRegisterBlock::load(format, window).store(self.backend(), dst, start_width);
            }
        }

        Ok(())
    }

    /// Pack all of `src` into `dst`, filling runs in parallel.
    ///
    /// The result is the same as [`pack`](Packer::pack).
    pub fn pack_par<T: PackElem>(
        &self,
        src: SourceView<T>,
        dst: &mut PackedSideBlock,
    ) -> PackResult<()> {
        check_shape(&src, dst)?;
        dst.reset();

        let format = dst.format();
        let kernel_width = format.kernel_width();
        let backend = self.backend();

        dst.runs_mut().for_each(|mut run| {
            let start_width = run.start_width();
            let width = kernel_width.min(src.width() - start_width);
            for start_depth in (0..src.depth()).step_by(REGISTER_SIZE) {
                let depth = REGISTER_SIZE.min(src.depth() - start_depth);
                let window = src.block(start_width, start_depth, width, depth);
                PackingRegisterBlock::load(format, window).store_run(backend, &mut run);
            }
        });

        let end = dst.padded_width();
        dst.seek_run(end, 0);

        Ok(())
    }
}

fn check_shape<T: Copy>(src: &SourceView<T>, dst: &PackedSideBlock) -> PackResult<()> {
    if src.width() != dst.width() || src.depth() != dst.depth() {
        return Err(PackError::ShapeMismatch);
    }
    Ok(())
}

impl Packer {
    /// Create a packer using the backend named by a `QPACK_BACKEND` value,
    /// or the preferred backend if `name` is `None` or not available.
    fn from_override(name: Option<&str>) -> Self {
        if let Some(name) = name {
            match Self::with_backend_name(name) {
                Ok(packer) => {
                    log::debug!("using packing backend {} from {}", name, env::BACKEND_VAR);
                    return packer;
                }
                Err(err) => log::warn!(
                    "ignoring {}={}: {}. Available backends: {:?}",
                    env::BACKEND_VAR,
                    name,
                    err,
                    BackendType::available()
                        .into_iter()
                        .map(|bt| bt.name())
                        .collect::<Vec<_>>()
                ),
            }
        }
        Self::preferred()
    }

    /// Create a packer using the fastest backend supported on the current
    /// system.
    fn preferred() -> Self {
        #[cfg(target_arch = "x86_64")]
        try_backend!(BackendType::Sse41);
        #[cfg(target_arch = "aarch64")]
        try_backend!(BackendType::ArmNeon);
        #[cfg(target_arch = "wasm32")]
        #[cfg(target_feature = "simd128")]
        try_backend!(BackendType::Wasm);

        Packer {
            backend: Box::new(GenericBackend::default()),
        }
    }
}

impl Default for Packer {
    /// Create a packer using the preferred backend for the current system.
    ///
    /// The backend can be overridden by setting the `QPACK_BACKEND`
    /// environment variable to a backend name.
    fn default() -> Self {
        Self::from_override(env::backend_override().as_deref())
    }
}

#[cfg(test)]
mod tests {
    use qpack_testing::TestCases;

    use super::{BackendType, Packer};
    use crate::errors::PackError;
    use crate::layout::{CellFormat, CellOrder, KernelSideFormat, SideOrder, SourceView};
    use crate::packed::PackedSideBlock;

    #[test]
    fn test_backend_names() {
        for backend_type in BackendType::available() {
            let packer = Packer::with_backend(backend_type).unwrap();
            assert_eq!(packer.backend_name(), backend_type.name());
            assert_eq!(BackendType::from_name(backend_type.name()), Some(backend_type));
        }
        assert!(BackendType::available().contains(&BackendType::Scalar));
        assert!(BackendType::available().contains(&BackendType::Generic));
    }

    #[test]
    fn test_with_backend_name() {
        let packer = Packer::with_backend_name("scalar").unwrap();
        assert_eq!(packer.backend_name(), "scalar");

        let result = Packer::with_backend_name("mmx");
        assert!(matches!(result, Err(PackError::BackendUnavailable)));
    }

    #[test]
    fn test_backend_override() {
        #[derive(Debug)]
        struct Case {
            name: Option<&'static str>,
            // Expected backend, or `None` for the preferred backend.
            expected: Option<&'static str>,
        }

        let cases = [
            Case {
                name: Some("scalar"),
                expected: Some("scalar"),
            },
            Case {
                name: Some("generic"),
                expected: Some("generic"),
            },
            Case {
                name: Some("mmx"),
                expected: None,
            },
            Case {
                name: None,
                expected: None,
            },
        ];

        cases.test_each(|case| {
            let preferred = BackendType::available()[0].name();
            let packer = Packer::from_override(case.name);
            assert_eq!(packer.backend_name(), case.expected.unwrap_or(preferred));
        })
    }

    #[test]
    fn test_default_backend_is_available() {
        let packer = Packer::default();
        assert!(BackendType::available()
            .iter()
            .any(|bt| bt.name() == packer.backend_name()));
    }

    #[test]
    fn test_pack_shape_mismatch() {
        let format =
            KernelSideFormat::new(CellFormat::new(4, 2, CellOrder::DepthMajor), 1).unwrap();
        let data = [0u8; 64];
        let src = SourceView::new(&data, 4, 16, 16, SideOrder::WidthMajor).unwrap();
        let mut dst = PackedSideBlock::new(format, 4, 15, 1);

        let packer = Packer::new();
        assert_eq!(packer.pack(src, &mut dst), Err(PackError::ShapeMismatch));
        assert_eq!(packer.pack_par(src, &mut dst), Err(PackError::ShapeMismatch));
    }

    #[test]
    fn test_pack_empty() {
        let format =
            KernelSideFormat::new(CellFormat::new(4, 2, CellOrder::DepthMajor), 2).unwrap();
        let src = SourceView::<u8>::new(&[], 0, 16, 16, SideOrder::WidthMajor).unwrap();
        let mut dst = PackedSideBlock::new(format, 0, 16, 1);

        let packer = Packer::new();
        packer.pack(src, &mut dst).unwrap();
        packer.pack_par(src, &mut dst).unwrap();
        assert_eq!(dst.data().len(), 0);
        assert_eq!(dst.cursor(), 0);
    }
}
