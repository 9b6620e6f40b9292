// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property-based tests for the compressed patch wire format.

use ld_protocol::serializer::{compress, decompress};
use proptest::prelude::*;
use serde_json::Value;

fn arb_json_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(|n| Value::from(n)),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::from),
    ]
}

fn arb_json_object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z]{1,6}", arb_json_scalar(), 0..6)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

proptest! {
    /// Compressing then decompressing a patch between two arbitrary flat
    /// objects reproduces a patch that, applied to the old document,
    /// yields exactly the new document — the same round-trip the session
    /// actor relies on for every render cycle.
    #[test]
    fn compress_decompress_round_trips_through_application(
        old in arb_json_object(),
        new in arb_json_object(),
    ) {
        let patch = json_patch::diff(&old, &new);
        let wire = Value::Array(compress(&patch));
        let restored = decompress(&wire).unwrap();

        let mut applied = old.clone();
        json_patch::patch(&mut applied, &restored).unwrap();
        prop_assert_eq!(applied, new);
    }

    /// An unchanged document always compresses to an empty op list.
    #[test]
    fn identical_documents_always_compress_to_no_ops(doc in arb_json_object()) {
        let patch = json_patch::diff(&doc, &doc);
        prop_assert!(compress(&patch).is_empty());
    }
}
