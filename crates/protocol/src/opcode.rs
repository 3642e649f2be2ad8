use ::core::fmt;

use crate::error::RecordError;

/// Session initialisation record written once on the root channel.
pub const INIT_TRACE: u8 = 10;
/// String-table insertion record written on the root channel.
pub const STRING_MAP: u8 = 11;

/// A traced thread was created.
pub const THREAD_CTOR: u8 = 100;
/// A traced thread handle was closed.
pub const THREAD_DTOR: u8 = 101;
/// A traced thread was joined.
pub const THREAD_WAIT: u8 = 102;

/// A traced object was created.
pub const OBJECT_CTOR: u8 = 110;
/// A traced object is about to be destroyed.
pub const OBJECT_DTOR: u8 = 111;
/// Synchronisation point on a traced object.
pub const OBJECT_WAIT1: u8 = 112;
/// Synchronisation point on a traced object carrying one integer.
pub const OBJECT_WAIT2: u8 = 113;

/// Result of an instrumented primitive operation.
pub const STATUS_CODE: u8 = 120;

/// Slot 1 holds an integer.
pub const MATCH_INT_1: u8 = 0x01;
/// Slot 1 holds an interned string key.
pub const MATCH_STR_1: u8 = 0x02;
/// Slot 2 holds an integer.
pub const MATCH_INT_2: u8 = 0x04;
/// Slot 2 holds an interned string key.
pub const MATCH_STR_2: u8 = 0x08;
/// Slot 3 holds an integer.
pub const MATCH_INT_3: u8 = 0x10;
/// Slot 3 holds an interned string key.
pub const MATCH_STR_3: u8 = 0x20;
/// Marks a caller-defined command whose low seven bits carry the command byte.
pub const MATCH_ESCAPE: u8 = 0x80;

/// Opcode of the record a context writes when its thread detaches.
pub const END_OF_STREAM: u8 = 0xFF;
/// Acknowledgment key the observer answers [`END_OF_STREAM`] with.
pub const END_OF_STREAM_KEY: u32 = 0x0BAD_F00D;

/// Maximum number of argument slots in a match or command record.
pub const MAX_ARGS: usize = 3;

/// Primitive-lifecycle operations written on the root channel.
///
/// The byte value selects the record layout: thread operations carry one
/// integer, status reports carry a label and a code, and object operations
/// carry a handle followed by a label (and, for [`LifecycleOp::ObjectWait2`],
/// one more integer).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum LifecycleOp {
    /// [`THREAD_CTOR`]
    ThreadCtor = THREAD_CTOR,
    /// [`THREAD_DTOR`]
    ThreadDtor = THREAD_DTOR,
    /// [`THREAD_WAIT`]
    ThreadWait = THREAD_WAIT,
    /// [`OBJECT_CTOR`]
    ObjectCtor = OBJECT_CTOR,
    /// [`OBJECT_DTOR`]
    ObjectDtor = OBJECT_DTOR,
    /// [`OBJECT_WAIT1`]
    ObjectWait1 = OBJECT_WAIT1,
    /// [`OBJECT_WAIT2`]
    ObjectWait2 = OBJECT_WAIT2,
    /// [`STATUS_CODE`]
    StatusCode = STATUS_CODE,
}

/// Wire layout of a [`LifecycleOp`] record after the opcode and thread id.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LifecycleLayout {
    /// `arg1(4)`
    OneArg,
    /// `arg1(4) · arg2(4)`
    TwoArgs,
    /// `handle(4) · arg1(4)`
    Object,
    /// `handle(4) · arg1(4) · arg2(4)`
    ObjectWithValue,
}

impl LifecycleOp {
    /// Returns the opcode byte written on the wire.
    #[must_use]
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decodes a lifecycle opcode, returning `None` for anything outside the reserved set.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            THREAD_CTOR => Some(Self::ThreadCtor),
            THREAD_DTOR => Some(Self::ThreadDtor),
            THREAD_WAIT => Some(Self::ThreadWait),
            OBJECT_CTOR => Some(Self::ObjectCtor),
            OBJECT_DTOR => Some(Self::ObjectDtor),
            OBJECT_WAIT1 => Some(Self::ObjectWait1),
            OBJECT_WAIT2 => Some(Self::ObjectWait2),
            STATUS_CODE => Some(Self::StatusCode),
            _ => None,
        }
    }

    /// Returns the record layout used for this operation on the root channel.
    #[must_use]
    pub const fn layout(self) -> LifecycleLayout {
        match self {
            Self::ThreadCtor | Self::ThreadDtor | Self::ThreadWait => LifecycleLayout::OneArg,
            Self::StatusCode => LifecycleLayout::TwoArgs,
            Self::ObjectCtor | Self::ObjectDtor | Self::ObjectWait1 => LifecycleLayout::Object,
            Self::ObjectWait2 => LifecycleLayout::ObjectWithValue,
        }
    }

    /// Kinds of the argument words that follow the handle (if any).
    ///
    /// Object and status records start with an interned label.
    #[must_use]
    pub const fn arg_shape(self) -> ArgShape {
        let kinds: &[ArgKind] = match self.layout() {
            LifecycleLayout::OneArg => &[ArgKind::Int],
            LifecycleLayout::Object => &[ArgKind::Str],
            LifecycleLayout::TwoArgs | LifecycleLayout::ObjectWithValue => {
                &[ArgKind::Str, ArgKind::Int]
            }
        };
        match ArgShape::from_kinds(kinds) {
            Some(shape) => shape,
            None => ArgShape::EMPTY,
        }
    }

    /// Returns `true` when a root-channel record with this opcode is
    /// acknowledged on the sending thread's own channel.
    #[must_use]
    pub const fn is_acknowledged(self) -> bool {
        matches!(
            self,
            Self::ObjectDtor | Self::ObjectWait1 | Self::ObjectWait2
        )
    }
}

impl TryFrom<u8> for LifecycleOp {
    type Error = RecordError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(RecordError::UnknownOpcode(value))
    }
}

/// Kind of value stored in one argument slot.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ArgKind {
    /// A raw 32-bit integer.
    Int,
    /// The interned key of a string.
    Str,
}

/// Ordered kinds of the argument slots of a match or command record.
///
/// Slots are always contiguous from the first one; a shape holds between
/// zero and [`MAX_ARGS`] slots.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ArgShape {
    kinds: [ArgKind; MAX_ARGS],
    len: u8,
}

impl ArgShape {
    /// Shape without any slots.
    pub const EMPTY: Self = Self {
        kinds: [ArgKind::Int; MAX_ARGS],
        len: 0,
    };

    /// Builds a shape from the given slot kinds.
    pub fn new(kinds: &[ArgKind]) -> Result<Self, RecordError> {
        Self::from_kinds(kinds).ok_or(RecordError::TooManyArguments(kinds.len()))
    }

    /// `const` variant of [`ArgShape::new`] for statically known shapes.
    #[must_use]
    pub const fn from_kinds(kinds: &[ArgKind]) -> Option<Self> {
        if kinds.len() > MAX_ARGS {
            return None;
        }
        let mut shape = Self::EMPTY;
        let mut index = 0;
        while index < kinds.len() {
            shape.kinds[index] = kinds[index];
            index += 1;
        }
        shape.len = kinds.len() as u8;
        Some(shape)
    }

    /// Shape with a single integer slot.
    #[must_use]
    pub const fn int() -> Self {
        Self {
            kinds: [ArgKind::Int; MAX_ARGS],
            len: 1,
        }
    }

    /// Number of slots.
    #[must_use]
    #[inline]
    pub const fn len(self) -> usize {
        self.len as usize
    }

    /// Returns `true` when the shape has no slots.
    #[must_use]
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }

    /// Slot kinds in order.
    #[must_use]
    pub fn kinds(&self) -> &[ArgKind] {
        &self.kinds[..self.len()]
    }

    /// Encodes the shape as match opcode bits.
    #[must_use]
    pub fn bits(self) -> u8 {
        const INT_BITS: [u8; MAX_ARGS] = [MATCH_INT_1, MATCH_INT_2, MATCH_INT_3];
        const STR_BITS: [u8; MAX_ARGS] = [MATCH_STR_1, MATCH_STR_2, MATCH_STR_3];

        self.kinds()
            .iter()
            .enumerate()
            .fold(0, |bits, (slot, kind)| match kind {
                ArgKind::Int => bits | INT_BITS[slot],
                ArgKind::Str => bits | STR_BITS[slot],
            })
    }

    /// Decodes match opcode bits into a shape.
    ///
    /// Rejects the escape bit, the unused bit `0x40`, slots marked both
    /// integer and string, gaps between slots and the empty shape.
    pub fn from_bits(bits: u8) -> Result<Self, RecordError> {
        if bits & (MATCH_ESCAPE | 0x40) != 0 {
            return Err(RecordError::InvalidShape(bits));
        }

        let mut kinds = [ArgKind::Int; MAX_ARGS];
        let mut len = 0usize;
        let mut ended = false;
        for (slot, kind) in kinds.iter_mut().enumerate() {
            let pair = (bits >> (slot * 2)) & 0x03;
            match pair {
                0 => ended = true,
                0x01 | 0x02 if !ended => {
                    *kind = if pair == 0x01 {
                        ArgKind::Int
                    } else {
                        ArgKind::Str
                    };
                    len += 1;
                }
                _ => return Err(RecordError::InvalidShape(bits)),
            }
        }

        if len == 0 {
            return Err(RecordError::InvalidShape(bits));
        }

        Ok(Self {
            kinds,
            len: len as u8,
        })
    }
}

impl fmt::Display for ArgShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, kind) in self.kinds().iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            f.write_str(match kind {
                ArgKind::Int => "int",
                ArgKind::Str => "str",
            })?;
        }
        f.write_str(")")
    }
}
