use std::fmt;

use trace_protocol::{
    Ack, ContextRecord, LifecycleOp, LifecycleRecord, STATUS_CODE, StatusCode,
};

/// A record as received by the observer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ObservedRecord {
    /// Written on the thread's own channel.
    Context(ContextRecord),
    /// Written on the root channel on behalf of the thread.
    Root(LifecycleRecord),
}

impl ObservedRecord {
    /// Acknowledgment owed for the record.
    #[must_use]
    pub fn ack(&self) -> Ack {
        match self {
            Self::Context(record) => record.ack(),
            Self::Root(record) => record.ack(),
        }
    }

    /// Opcode byte as written on the wire.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        match self {
            Self::Context(record) => record.opcode(),
            Self::Root(record) => record.op().as_u8(),
        }
    }
}

/// One entry of the observer's totally ordered event log.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObservedEvent {
    /// Thread that issued the record.
    pub thread: u32,
    /// The decoded record.
    pub record: ObservedRecord,
    /// Resolved string arguments, in slot order.
    pub labels: Vec<String>,
}

impl ObservedEvent {
    /// First resolved string argument.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    /// Object handle carried by the record.
    #[must_use]
    pub fn handle(&self) -> Option<u32> {
        match &self.record {
            ObservedRecord::Context(ContextRecord::Command { handle, .. }) => *handle,
            ObservedRecord::Root(record) => record.handle(),
            ObservedRecord::Context(_) => None,
        }
    }

    /// Escaped command byte, for command records.
    #[must_use]
    pub const fn command(&self) -> Option<u8> {
        match &self.record {
            ObservedRecord::Context(ContextRecord::Command { cmd, .. }) => Some(*cmd),
            _ => None,
        }
    }

    /// Lifecycle operation, for records received on the root channel.
    #[must_use]
    pub const fn lifecycle(&self) -> Option<LifecycleOp> {
        match &self.record {
            ObservedRecord::Root(record) => Some(record.op()),
            ObservedRecord::Context(_) => None,
        }
    }

    /// Label and code of a status report.
    #[must_use]
    pub fn status(&self) -> Option<(&str, StatusCode)> {
        match &self.record {
            ObservedRecord::Context(ContextRecord::Command {
                cmd: STATUS_CODE,
                args,
                ..
            }) => {
                let code = StatusCode::from_u32(*args.as_slice().get(1)?)?;
                Some((self.label()?, code))
            }
            _ => None,
        }
    }

    /// Returns `true` for the end-of-stream record of a detaching thread.
    #[must_use]
    pub const fn is_end_of_stream(&self) -> bool {
        matches!(
            self.record,
            ObservedRecord::Context(ContextRecord::EndOfStream { .. })
        )
    }
}

impl fmt::Display for ObservedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread {} ", self.thread)?;
        match &self.record {
            ObservedRecord::Context(ContextRecord::Match { shape, args, .. }) => {
                write!(f, "match {shape} {:?}", args.as_slice())?;
            }
            ObservedRecord::Context(ContextRecord::Command { cmd, handle, args, .. }) => {
                write!(f, "command {cmd}")?;
                if let Some(handle) = handle {
                    write!(f, " #{handle}")?;
                }
                write!(f, " {:?}", args.as_slice())?;
            }
            ObservedRecord::Context(ContextRecord::EndOfStream { .. }) => {
                f.write_str("end of stream")?;
            }
            ObservedRecord::Root(record) => {
                write!(f, "{:?}", record.op())?;
                if let Some(handle) = record.handle() {
                    write!(f, " #{handle}")?;
                }
                write!(f, " {:?}", record.args())?;
            }
        }
        if !self.labels.is_empty() {
            write!(f, " {:?}", self.labels)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use trace_protocol::{ContextRecord, LifecycleOp, LifecycleRecord, STATUS_CODE};

    use super::*;

    #[test]
    fn status_events_expose_label_and_code() {
        let record = ContextRecord::command(STATUS_CODE, None, &[1, 2], 0xAB).expect("record");
        let event = ObservedEvent {
            thread: 1,
            record: ObservedRecord::Context(record),
            labels: vec!["Event_Wait".to_owned()],
        };
        assert_eq!(event.status(), Some(("Event_Wait", StatusCode::Mem)));
        assert_eq!(event.command(), Some(STATUS_CODE));
        assert_eq!(event.handle(), None);
    }

    #[test]
    fn root_events_expose_handle_and_op() {
        let record =
            LifecycleRecord::new(LifecycleOp::ObjectWait1, 3, Some(42), &[7], 0xAC).expect("record");
        let event = ObservedEvent {
            thread: 3,
            record: ObservedRecord::Root(record),
            labels: vec!["Event_Set".to_owned()],
        };
        assert_eq!(event.handle(), Some(42));
        assert_eq!(event.lifecycle(), Some(LifecycleOp::ObjectWait1));
        assert_eq!(event.record.ack().key, 7);
        assert_eq!(event.to_string(), "thread 3 ObjectWait1 #42 [7] [\"Event_Set\"]");
    }
}
