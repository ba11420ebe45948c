//! Property tests for the payload decoders.

use proptest::prelude::*;
use tze_codec::{
    decode_compact_size, decode_precondition, decode_witness, infer_mode, Mode, OutPoint,
    Transaction, TxInput, TzeRecord,
};

proptest! {
    #[test]
    fn compact_size_single_byte(n in 0u8..0xfd, tail in proptest::collection::vec(any::<u8>(), 0..8)) {
        let mut bytes = vec![n];
        bytes.extend(tail);
        prop_assert_eq!(decode_compact_size(&bytes, 0), (u64::from(n), 1));
    }

    #[test]
    fn compact_size_u16(v in any::<u16>(), offset in 0usize..4) {
        let mut bytes = vec![0u8; offset];
        bytes.push(0xfd);
        bytes.extend(v.to_le_bytes());
        bytes.push(0x99);
        prop_assert_eq!(decode_compact_size(&bytes, offset), (u64::from(v), offset + 3));
    }

    #[test]
    fn compact_size_u32(v in any::<u32>()) {
        let mut bytes = vec![0xfe];
        bytes.extend(v.to_le_bytes());
        prop_assert_eq!(decode_compact_size(&bytes, 0), (u64::from(v), 5));
    }

    #[test]
    fn compact_size_u64(v in any::<u64>()) {
        let mut bytes = vec![0xff];
        bytes.extend(v.to_le_bytes());
        prop_assert_eq!(decode_compact_size(&bytes, 0), (v, 9));
    }

    #[test]
    fn frame_absent_without_marker(first in 0u8..0xff, rest in proptest::collection::vec(any::<u8>(), 0..64)) {
        let mut bytes = vec![first];
        bytes.extend(rest);
        prop_assert!(TzeRecord::from_hex(&hex::encode(&bytes), false).is_none());
    }

    #[test]
    fn frame_keeps_extension_id(id in any::<u32>(), payload in proptest::collection::vec(any::<u8>(), 0..256), upper in any::<bool>()) {
        let mut text = format!("ff{:08x}{}", id, hex::encode(&payload));
        if upper {
            text = text.to_uppercase();
        }
        let record = TzeRecord::from_hex(&text, true).unwrap();
        prop_assert_eq!(record.extension_id, id);
        prop_assert_eq!(record.payload_length, payload.len());
        prop_assert_eq!(record.payload, payload);
    }

    #[test]
    fn precondition_always_has_three_fields(payload in proptest::collection::vec(1u8..=255, 0..140)) {
        let precondition = decode_precondition(&payload);
        let mut padded = payload.clone();
        padded.resize(padded.len().max(100), 0);
        prop_assert_eq!(precondition.root.0.as_slice(), &padded[4..36]);
        prop_assert_eq!(precondition.os_program_hash.0.as_slice(), &padded[36..68]);
        prop_assert_eq!(precondition.bootloader_program_hash.0.as_slice(), &padded[68..100]);
        prop_assert_eq!(precondition.padding(), 100usize.saturating_sub(payload.len()));
    }

    #[test]
    fn witness_decodes_from_two_bytes(payload in proptest::collection::vec(any::<u8>(), 0..64)) {
        let witness = decode_witness(&payload);
        if payload.len() < 2 {
            prop_assert!(witness.is_none());
        } else {
            let witness = witness.unwrap();
            prop_assert_eq!(witness.with_pedersen, payload[0] == 1);
            prop_assert_eq!(witness.proof_data.as_slice(), &payload[2..]);
        }
    }

    #[test]
    fn mode_follows_marked_inputs(scripts in proptest::collection::vec(("[0-9a-e][0-9a-f]{3,20}", any::<bool>()), 0..6)) {
        let mut marked = false;
        let inputs = scripts
            .into_iter()
            .enumerate()
            .map(|(i, (script, tze))| {
                marked |= tze;
                let script_hex = if tze { format!("ff00000001{script}") } else { script };
                TxInput {
                    prev_out: Some(OutPoint::new(format!("{i:064x}"), 0)),
                    script_hex: Some(script_hex),
                }
            })
            .collect();
        let tx = Transaction { txid: "t".into(), inputs, ..Default::default() };
        let expected = if marked { Mode::Verify } else { Mode::Initialize };
        prop_assert_eq!(infer_mode(&tx), expected);
    }
}
