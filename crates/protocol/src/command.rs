use crate::error::RecordError;
use crate::opcode::{
    ArgKind, ArgShape, END_OF_STREAM, MATCH_ESCAPE, OBJECT_CTOR, STATUS_CODE, THREAD_CTOR,
    THREAD_DTOR, THREAD_WAIT,
};

/// Number of distinct escaped command bytes.
const COMMAND_SLOTS: usize = 128;

/// Argument layout of an escaped command.
///
/// Escaped commands do not describe their arguments in the opcode, so both
/// ends of a channel agree on the layout through a [`CommandTable`]. When
/// `handle` is set the first word on the wire is an object handle; it is
/// written before the arguments and never contributes to the
/// acknowledgment key.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct CommandSpec {
    /// Kinds of the keyed argument slots.
    pub shape: ArgShape,
    /// Whether an object handle precedes the arguments.
    pub handle: bool,
}

impl CommandSpec {
    /// Layout without a handle.
    #[must_use]
    pub const fn new(shape: ArgShape) -> Self {
        Self {
            shape,
            handle: false,
        }
    }

    /// Layout with a leading object handle.
    #[must_use]
    pub const fn with_handle(shape: ArgShape) -> Self {
        Self {
            shape,
            handle: true,
        }
    }

    /// Number of 32-bit words that follow the opcode.
    #[must_use]
    pub const fn word_count(self) -> usize {
        self.shape.len() + self.handle as usize
    }
}

/// Registry of escaped command layouts keyed by command byte.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandTable {
    entries: [Option<CommandSpec>; COMMAND_SLOTS],
}

impl CommandTable {
    /// Creates a table without any registered command.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            entries: [None; COMMAND_SLOTS],
        }
    }

    /// Creates a table with the thread, object-creation and status commands
    /// emitted by the instrumented primitives.
    #[must_use]
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        let thread = CommandSpec::new(ArgShape::int());
        table.entries[THREAD_CTOR as usize] = Some(thread);
        table.entries[THREAD_DTOR as usize] = Some(thread);
        table.entries[THREAD_WAIT as usize] = Some(thread);
        table.entries[OBJECT_CTOR as usize] = Some(CommandSpec::with_handle(STR_SHAPE));
        table.entries[STATUS_CODE as usize] = Some(CommandSpec::new(STR_INT_SHAPE));
        table
    }

    /// Registers or replaces the layout of `cmd`.
    ///
    /// Command bytes with the escape bit set, and `0x7F` (which would escape
    /// to the end-of-stream opcode), are rejected.
    pub fn register(&mut self, cmd: u8, spec: CommandSpec) -> Result<(), RecordError> {
        validate_command(cmd)?;
        self.entries[cmd as usize] = Some(spec);
        Ok(())
    }

    /// Looks up the layout registered for `cmd`.
    #[must_use]
    pub fn get(&self, cmd: u8) -> Option<CommandSpec> {
        self.entries.get(cmd as usize).copied().flatten()
    }

    /// Looks up the layout registered for `cmd`, failing for unknown commands.
    pub fn require(&self, cmd: u8) -> Result<CommandSpec, RecordError> {
        self.get(cmd).ok_or(RecordError::UnknownCommand(cmd))
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Checks that `cmd` can be sent as an escaped command.
pub fn validate_command(cmd: u8) -> Result<(), RecordError> {
    if cmd & MATCH_ESCAPE != 0 || (cmd | MATCH_ESCAPE) == END_OF_STREAM {
        Err(RecordError::ReservedCommand(cmd))
    } else {
        Ok(())
    }
}

const STR_SHAPE: ArgShape = match ArgShape::from_kinds(&[ArgKind::Str]) {
    Some(shape) => shape,
    None => ArgShape::EMPTY,
};

const STR_INT_SHAPE: ArgShape = match ArgShape::from_kinds(&[ArgKind::Str, ArgKind::Int]) {
    Some(shape) => shape,
    None => ArgShape::EMPTY,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_primitive_commands() {
        let table = CommandTable::builtin();
        for cmd in [THREAD_CTOR, THREAD_DTOR, THREAD_WAIT] {
            let spec = table.get(cmd).expect("thread command registered");
            assert_eq!(spec.shape.kinds(), &[ArgKind::Int]);
            assert!(!spec.handle);
        }

        let object = table.get(OBJECT_CTOR).expect("object ctor registered");
        assert!(object.handle);
        assert_eq!(object.shape.kinds(), &[ArgKind::Str]);
        assert_eq!(object.word_count(), 2);

        let status = table.get(STATUS_CODE).expect("status registered");
        assert_eq!(status.shape.kinds(), &[ArgKind::Str, ArgKind::Int]);
    }

    #[test]
    fn unknown_commands_are_reported() {
        let table = CommandTable::builtin();
        assert!(table.get(7).is_none());
        assert!(matches!(table.require(7), Err(RecordError::UnknownCommand(7))));
    }

    #[test]
    fn register_rejects_reserved_bytes() {
        let mut table = CommandTable::empty();
        let spec = CommandSpec::new(ArgShape::int());
        assert!(matches!(
            table.register(0x80, spec),
            Err(RecordError::ReservedCommand(0x80))
        ));
        assert!(matches!(
            table.register(0x7F, spec),
            Err(RecordError::ReservedCommand(0x7F))
        ));
        table.register(42, spec).expect("42 is free");
        assert_eq!(table.get(42), Some(spec));
    }
}
