use ::core::fmt;

use crate::error::RecordError;

/// Result codes accepted by the status-report record.
///
/// The numbering follows the LZMA SDK `SRes` values; 13 through 15 are
/// unassigned and rejected.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u32)]
pub enum StatusCode {
    #[doc(alias = "SZ_OK")]
    /// Success.
    Ok = 0,
    #[doc(alias = "SZ_ERROR_DATA")]
    /// Corrupt input data.
    Data = 1,
    #[doc(alias = "SZ_ERROR_MEM")]
    /// Allocation failure.
    Mem = 2,
    #[doc(alias = "SZ_ERROR_CRC")]
    /// Checksum mismatch.
    Crc = 3,
    #[doc(alias = "SZ_ERROR_UNSUPPORTED")]
    /// Unsupported properties.
    Unsupported = 4,
    #[doc(alias = "SZ_ERROR_PARAM")]
    /// Invalid parameter.
    Param = 5,
    #[doc(alias = "SZ_ERROR_INPUT_EOF")]
    /// Input ended early.
    InputEof = 6,
    #[doc(alias = "SZ_ERROR_OUTPUT_EOF")]
    /// Output buffer exhausted.
    OutputEof = 7,
    #[doc(alias = "SZ_ERROR_READ")]
    /// Read failure.
    Read = 8,
    #[doc(alias = "SZ_ERROR_WRITE")]
    /// Write failure.
    Write = 9,
    #[doc(alias = "SZ_ERROR_PROGRESS")]
    /// The progress callback requested cancellation.
    Progress = 10,
    #[doc(alias = "SZ_ERROR_FAIL")]
    /// Generic failure.
    Fail = 11,
    #[doc(alias = "SZ_ERROR_THREAD")]
    /// Thread or synchronization failure.
    Thread = 12,
    #[doc(alias = "SZ_ERROR_ARCHIVE")]
    /// Archive structure error.
    Archive = 16,
    #[doc(alias = "SZ_ERROR_NO_ARCHIVE")]
    /// Input is not an archive.
    NoArchive = 17,
}

impl StatusCode {
    /// Every accepted status code in ascending numeric order.
    pub const ALL: [Self; 15] = [
        Self::Ok,
        Self::Data,
        Self::Mem,
        Self::Crc,
        Self::Unsupported,
        Self::Param,
        Self::InputEof,
        Self::OutputEof,
        Self::Read,
        Self::Write,
        Self::Progress,
        Self::Fail,
        Self::Thread,
        Self::Archive,
        Self::NoArchive,
    ];

    /// Returns the numeric value carried on the wire.
    #[must_use]
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Decodes a status value, returning `None` for unassigned codes.
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Ok,
            1 => Self::Data,
            2 => Self::Mem,
            3 => Self::Crc,
            4 => Self::Unsupported,
            5 => Self::Param,
            6 => Self::InputEof,
            7 => Self::OutputEof,
            8 => Self::Read,
            9 => Self::Write,
            10 => Self::Progress,
            11 => Self::Fail,
            12 => Self::Thread,
            16 => Self::Archive,
            17 => Self::NoArchive,
            _ => return None,
        })
    }

    /// Returns `true` for [`StatusCode::Ok`].
    #[must_use]
    #[inline]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns the canonical `SZ_*` name of the code.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "SZ_OK",
            Self::Data => "SZ_ERROR_DATA",
            Self::Mem => "SZ_ERROR_MEM",
            Self::Crc => "SZ_ERROR_CRC",
            Self::Unsupported => "SZ_ERROR_UNSUPPORTED",
            Self::Param => "SZ_ERROR_PARAM",
            Self::InputEof => "SZ_ERROR_INPUT_EOF",
            Self::OutputEof => "SZ_ERROR_OUTPUT_EOF",
            Self::Read => "SZ_ERROR_READ",
            Self::Write => "SZ_ERROR_WRITE",
            Self::Progress => "SZ_ERROR_PROGRESS",
            Self::Fail => "SZ_ERROR_FAIL",
            Self::Thread => "SZ_ERROR_THREAD",
            Self::Archive => "SZ_ERROR_ARCHIVE",
            Self::NoArchive => "SZ_ERROR_NO_ARCHIVE",
        }
    }
}

impl TryFrom<u32> for StatusCode {
    type Error = RecordError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_u32(value).ok_or(RecordError::InvalidStatus(value))
    }
}

impl From<StatusCode> for u32 {
    fn from(code: StatusCode) -> Self {
        code.as_u32()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_range_is_zero_to_twelve_plus_sixteen_and_seventeen() {
        for value in 0..64u32 {
            let accepted = value <= 12 || value == 16 || value == 17;
            assert_eq!(StatusCode::from_u32(value).is_some(), accepted, "{value}");
        }
    }

    #[test]
    fn all_round_trips_through_u32() {
        for code in StatusCode::ALL {
            assert_eq!(StatusCode::try_from(code.as_u32()).unwrap(), code);
        }
    }

    #[test]
    fn invalid_value_is_reported() {
        assert!(matches!(
            StatusCode::try_from(13),
            Err(RecordError::InvalidStatus(13))
        ));
    }

    #[test]
    fn display_uses_sdk_names() {
        assert_eq!(StatusCode::OutputEof.to_string(), "SZ_ERROR_OUTPUT_EOF");
        assert!(StatusCode::Ok.is_ok());
        assert!(!StatusCode::Thread.is_ok());
    }
}
