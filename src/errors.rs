use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Errors with packing formats, source views or packing destinations.
///
/// These are only reported when a descriptor or buffer is constructed, or
/// when a whole side block is packed. Storing an individual register block
/// does not return errors.
#[derive(Clone, Debug, PartialEq)]
pub enum PackError {
    /// A kernel side format must contain at least one cell.
    ZeroCells,
    /// Cell width and depth must both be non-zero.
    EmptyCell,
    /// The cell depth does not evenly divide the register size.
    CellDepthMismatch,
    /// The kernel width is not a multiple of the cell width.
    KernelWidthMismatch,
    /// Diagonal cell ordering was requested for a non-square cell.
    DiagonalCellNotSquare,
    /// The stride of a source view is smaller than the length of its lines.
    StrideTooSmall,
    /// The slice backing a source view does not cover all of its elements.
    SourceTooShort,
    /// The source view shape does not match the packed block it is being
    /// packed into.
    ShapeMismatch,
    /// The requested backend is unknown or not supported on this system.
    BackendUnavailable,
}

impl Display for PackError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ZeroCells => write!(fmt, "kernel side format must have at least one cell"),
            Self::EmptyCell => write!(fmt, "cell width and depth must be non-zero"),
            Self::CellDepthMismatch => {
                write!(fmt, "cell depth must evenly divide the register size")
            }
            Self::KernelWidthMismatch => {
                write!(fmt, "kernel width must be a multiple of the cell width")
            }
            Self::DiagonalCellNotSquare => {
                write!(fmt, "diagonal cell order requires a square cell")
            }
            Self::StrideTooSmall => write!(fmt, "stride is smaller than the line length"),
            Self::SourceTooShort => write!(fmt, "source data is too short for view"),
            Self::ShapeMismatch => {
                write!(fmt, "source shape does not match packed block shape")
            }
            Self::BackendUnavailable => {
                write!(fmt, "packing backend is not available on this system")
            }
        }
    }
}

impl Error for PackError {}

/// Result of constructing a packing descriptor or packing a side block.
pub type PackResult<T> = Result<T, PackError>;
