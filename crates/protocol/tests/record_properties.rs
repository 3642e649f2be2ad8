//! Property tests for record decoding and acknowledgment keys.

use proptest::prelude::*;
use trace_protocol::{
    Ack, ArgKind, ArgShape, CommandSpec, CommandTable, ContextRecord, LifecycleOp,
    LifecycleRecord, MATCH_ESCAPE, RecordError, RootRecord,
};

fn arb_kind() -> impl Strategy<Value = ArgKind> {
    prop_oneof![Just(ArgKind::Int), Just(ArgKind::Str)]
}

fn arb_match() -> impl Strategy<Value = ContextRecord> {
    prop::collection::vec((arb_kind(), any::<u32>()), 1..=3).prop_flat_map(|slots| {
        let kinds: Vec<ArgKind> = slots.iter().map(|(kind, _)| *kind).collect();
        let values: Vec<u32> = slots.iter().map(|(_, value)| *value).collect();
        any::<u8>().prop_map(move |seq| {
            let shape = ArgShape::new(&kinds).expect("at most three slots");
            ContextRecord::matching(shape, &values, seq).expect("arity matches shape")
        })
    })
}

proptest! {
    #[test]
    fn ack_key_is_xor_of_all_slots(record in arb_match()) {
        let ContextRecord::Match { args, .. } = record else {
            unreachable!("strategy only builds match records");
        };
        let expected = args.as_slice().iter().fold(0u32, |acc, value| acc ^ value);
        prop_assert_eq!(record.ack(), Ack::new(record.opcode(), expected));
    }

    #[test]
    fn match_records_decode_to_themselves(record in arb_match()) {
        let bytes = record.encode();
        let decoded = ContextRecord::read_from(&mut &bytes[..], &CommandTable::builtin())
            .expect("encoded records decode");
        prop_assert_eq!(decoded, record);
    }

    #[test]
    fn arbitrary_bytes_never_panic_the_context_decoder(bytes in prop::collection::vec(any::<u8>(), 0..32)) {
        let _ = ContextRecord::read_from(&mut &bytes[..], &CommandTable::builtin());
    }

    #[test]
    fn arbitrary_bytes_never_panic_the_root_decoder(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let _ = RootRecord::read_from(&mut &bytes[..]);
    }

    #[test]
    fn ack_encoding_is_opcode_then_little_endian_key(opcode in any::<u8>(), key in any::<u32>()) {
        let bytes = Ack::new(opcode, key).encode();
        prop_assert_eq!(bytes[0], opcode);
        prop_assert_eq!(&bytes[1..], &key.to_le_bytes()[..]);
    }

    #[test]
    fn truncated_match_records_are_reported(record in arb_match(), cut in 1usize..15) {
        let bytes = record.encode();
        prop_assume!(cut < bytes.len());
        let error = ContextRecord::read_from(&mut &bytes[..cut], &CommandTable::builtin())
            .expect_err("truncated input");
        prop_assert!(matches!(error, RecordError::Truncated { .. }), "unexpected {error:?}");
    }
}

#[test]
fn swapped_arguments_collide_on_the_same_key() {
    let shape = ArgShape::new(&[ArgKind::Int, ArgKind::Int]).expect("two slots");
    let forward = ContextRecord::matching(shape, &[1, 2], 0).expect("record");
    let backward = ContextRecord::matching(shape, &[2, 1], 0).expect("record");
    assert_eq!(forward.ack(), backward.ack());
}

#[test]
fn registered_commands_decode_with_their_layout() {
    let mut table = CommandTable::builtin();
    let shape = ArgShape::new(&[ArgKind::Int, ArgKind::Str, ArgKind::Int]).expect("three slots");
    table
        .register(5, CommandSpec::with_handle(shape))
        .expect("free command byte");

    let record = ContextRecord::command(5, Some(0xAA), &[1, 2, 4], 0xAB).expect("command");
    let bytes = record.encode();
    assert_eq!(bytes[0], MATCH_ESCAPE | 5);
    assert_eq!(bytes.len(), 1 + 4 * 4 + 1);

    let decoded = ContextRecord::read_from(&mut &bytes[..], &table).expect("decodes");
    assert_eq!(decoded, record);
    assert_eq!(decoded.ack().key, 1 ^ 2 ^ 4);
}

#[test]
fn root_stream_decodes_record_by_record() {
    let mut stream = Vec::new();
    RootRecord::Init { thread: 1, seq: 0xAB }
        .encode_into(&mut stream)
        .expect("init");
    RootRecord::string_map("Event_Wait")
        .expect("short")
        .encode_into(&mut stream)
        .expect("string");
    let sync = LifecycleRecord::new(LifecycleOp::ObjectWait1, 3, Some(9), &[1], 0xAC)
        .expect("object layout");
    RootRecord::Lifecycle(sync)
        .encode_into(&mut stream)
        .expect("sync");

    let mut reader = &stream[..];
    assert!(matches!(
        RootRecord::read_from(&mut reader).expect("init"),
        RootRecord::Init { thread: 1, seq: 0xAB }
    ));
    assert_eq!(
        RootRecord::read_from(&mut reader).expect("string"),
        RootRecord::StringMap {
            text: String::from("Event_Wait")
        }
    );
    assert_eq!(
        RootRecord::read_from(&mut reader).expect("sync"),
        RootRecord::Lifecycle(sync)
    );
    assert!(
        RootRecord::read_from(&mut reader)
            .expect_err("stream exhausted")
            .is_clean_eof()
    );
}
