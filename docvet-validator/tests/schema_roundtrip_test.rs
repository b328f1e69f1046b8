//! Schema decode/encode round-trip tests

use docvet_validator::ConstraintSet;
use pretty_assertions::assert_eq;

const FULL_SET: &[u8] = br#"{
    "version": 1,
    "name": "roundtrip",
    "documents": [
        {
            "name": "Article",
            "declares": "test/article",
            "attributes": {
                "title": {"allowEmpty": true},
                "language": {"optional": true, "pattern": "^[a-z]{2}$"},
                "uri": {"glob": ["article://**"]}
            },
            "links": [
                {
                    "declares": {"rel": "subject", "type": "test/topic"},
                    "maxCount": 3,
                    "attributes": {"uri": {}}
                }
            ],
            "meta": [
                {"ref": "newsvalue", "count": 1}
            ],
            "content": [
                {
                    "declares": {"type": "test/text"},
                    "attributes": {
                        "role": {"optional": true, "enum": ["heading", "body"]}
                    },
                    "data": {
                        "text": {"format": "html", "htmlPolicy": "default"},
                        "colour": {"colour": ["hex"], "optional": true},
                        "updated": {"format": "RFC3339", "optional": true},
                        "position": {"format": "wkt", "geometry": "point", "optional": true},
                        "status": {
                            "enumReference": "statuses",
                            "deprecated": {"label": "inline-status", "doc": "Move to meta."},
                            "labels": ["indexed"],
                            "hints": {"index": ["keyword"]}
                        }
                    }
                }
            ]
        }
    ],
    "meta": [
        {
            "id": "newsvalue",
            "block": {
                "declares": {"type": "test/newsvalue"},
                "data": {"score": {"format": "int"}}
            }
        }
    ],
    "enums": [
        {"declare": "statuses", "values": {"draft": {}, "usable": {}}},
        {"match": "statuses", "values": {"usable": {"deprecated": {"label": "u", "doc": ""}}}}
    ],
    "htmlPolicies": [
        {
            "name": "default",
            "elements": {
                "em": {},
                "a": {"attributes": {"href": {"glob": ["https://**"]}}}
            }
        },
        {
            "extends": "default",
            "elements": {"strong": {}}
        }
    ]
}"#;

#[test]
fn decode_encode_roundtrip_is_stable() {
    let decoded = ConstraintSet::from_json(FULL_SET).expect("decode");

    let encoded = serde_json::to_vec_pretty(&decoded).expect("encode");
    let again = ConstraintSet::from_json(&encoded).expect("decode the encoded form");

    assert_eq!(decoded, again);

    // And the second encoding is byte-stable.
    let encoded_again = serde_json::to_vec_pretty(&again).expect("encode again");
    assert_eq!(
        String::from_utf8_lossy(&encoded),
        String::from_utf8_lossy(&encoded_again)
    );
}

#[test]
fn roundtripped_sets_compile() {
    let decoded = ConstraintSet::from_json(FULL_SET).expect("decode");

    let encoded = serde_json::to_vec(&decoded).expect("encode");
    let again = ConstraintSet::from_json(&encoded).expect("decode again");

    docvet_validator::Validator::new(vec![again]).expect("compile");
}

#[test]
fn unknown_fields_are_rejected_at_every_level() {
    let cases: [&[u8]; 5] = [
        br#"{"name": "x", "frobnicate": true}"#,
        br#"{"name": "x", "documents": [{"declares": "a", "frobnicate": true}]}"#,
        br#"{"name": "x", "documents": [{"declares": "a", "content": [{"frobnicate": true}]}]}"#,
        br#"{"name": "x", "documents": [{"declares": "a", "attributes": {"title": {"frobnicate": true}}}]}"#,
        br#"{"name": "x", "enums": [{"declare": "e", "values": {}, "frobnicate": true}]}"#,
    ];

    for case in cases {
        assert!(
            ConstraintSet::from_json(case).is_err(),
            "expected decode failure for {}",
            String::from_utf8_lossy(case)
        );
    }
}
