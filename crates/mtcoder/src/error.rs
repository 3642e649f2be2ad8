use std::fmt;

use thiserror::Error;
use trace_protocol::StatusCode;

/// Recoverable failure of the pipeline or of a block codec.
///
/// Each variant corresponds to one non-OK LZMA SDK result code; see
/// [`SzError::status`].
#[derive(Clone, Copy, Debug, Eq, Error, Hash, PartialEq)]
pub enum SzError {
    /// Corrupt input data.
    #[error("data error")]
    Data,
    /// A buffer could not be allocated.
    #[error("memory allocation failed")]
    Mem,
    /// Checksum mismatch.
    #[error("CRC error")]
    Crc,
    /// Unsupported properties.
    #[error("unsupported properties")]
    Unsupported,
    /// Invalid parameter.
    #[error("invalid parameter")]
    Param,
    /// The input ended before the stream did.
    #[error("unexpected end of input")]
    InputEof,
    /// The output buffer is too small.
    #[error("output buffer is too small")]
    OutputEof,
    /// The input stream failed.
    #[error("read error")]
    Read,
    /// The output stream accepted fewer bytes than offered.
    #[error("write error")]
    Write,
    /// The progress sink asked to stop.
    #[error("progress sink cancelled the operation")]
    Progress,
    /// A preceding worker failed.
    #[error("operation failed")]
    Fail,
    /// A worker thread or turn event failed.
    #[error("thread error")]
    Thread,
    /// Archive structure error.
    #[error("archive error")]
    Archive,
    /// The input is not an archive.
    #[error("input is not an archive")]
    NoArchive,
}

impl SzError {
    /// The status code reported for this error.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Data => StatusCode::Data,
            Self::Mem => StatusCode::Mem,
            Self::Crc => StatusCode::Crc,
            Self::Unsupported => StatusCode::Unsupported,
            Self::Param => StatusCode::Param,
            Self::InputEof => StatusCode::InputEof,
            Self::OutputEof => StatusCode::OutputEof,
            Self::Read => StatusCode::Read,
            Self::Write => StatusCode::Write,
            Self::Progress => StatusCode::Progress,
            Self::Fail => StatusCode::Fail,
            Self::Thread => StatusCode::Thread,
            Self::Archive => StatusCode::Archive,
            Self::NoArchive => StatusCode::NoArchive,
        }
    }

    /// The error carried by `status`, or `None` for [`StatusCode::Ok`].
    #[must_use]
    pub const fn from_status(status: StatusCode) -> Option<Self> {
        Some(match status {
            StatusCode::Ok => return None,
            StatusCode::Data => Self::Data,
            StatusCode::Mem => Self::Mem,
            StatusCode::Crc => Self::Crc,
            StatusCode::Unsupported => Self::Unsupported,
            StatusCode::Param => Self::Param,
            StatusCode::InputEof => Self::InputEof,
            StatusCode::OutputEof => Self::OutputEof,
            StatusCode::Read => Self::Read,
            StatusCode::Write => Self::Write,
            StatusCode::Progress => Self::Progress,
            StatusCode::Fail => Self::Fail,
            StatusCode::Thread => Self::Thread,
            StatusCode::Archive => Self::Archive,
            StatusCode::NoArchive => Self::NoArchive,
        })
    }
}

/// Result of the single-shot entry points.
///
/// Numbering matches the native wrapper's result enumeration.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u32)]
pub enum ResultCode {
    /// Success.
    Ok = 0,
    /// Corrupt data.
    Data = 1,
    /// Out of memory.
    Memory = 2,
    /// Invalid parameter.
    Parameter = 3,
    /// Thread failure.
    Threading = 4,
    /// Unsupported properties.
    Unsupported = 5,
    /// Output buffer too small.
    OutputEnd = 6,
    /// Input truncated.
    InputEnd = 7,
    /// Anything else.
    Unknown = 8,
}

impl ResultCode {
    /// Maps an encoder-side failure.
    ///
    /// Only allocation, parameter, output-size and thread failures have a
    /// dedicated code.
    #[must_use]
    pub const fn from_encoder(error: SzError) -> Self {
        match error {
            SzError::Mem => Self::Memory,
            SzError::Param => Self::Parameter,
            SzError::OutputEof => Self::OutputEnd,
            SzError::Thread => Self::Threading,
            _ => Self::Unknown,
        }
    }

    /// Maps a decoder-side failure.
    ///
    /// Only data, allocation, property and truncation failures have a
    /// dedicated code.
    #[must_use]
    pub const fn from_decoder(error: SzError) -> Self {
        match error {
            SzError::Data => Self::Data,
            SzError::Mem => Self::Memory,
            SzError::Unsupported => Self::Unsupported,
            SzError::InputEof => Self::InputEnd,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` for [`ResultCode::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Numeric value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "ok",
            Self::Data => "data error",
            Self::Memory => "out of memory",
            Self::Parameter => "invalid parameter",
            Self::Threading => "thread error",
            Self::Unsupported => "unsupported properties",
            Self::OutputEnd => "output buffer too small",
            Self::InputEnd => "input truncated",
            Self::Unknown => "unknown error",
        })
    }
}

impl std::error::Error for ResultCode {}
