//! Deprecation dispatch and enforcement tests

use docvet_core::Document;
use docvet_validator::{
    ConstraintSet, DeprecationDecision, ValidationOptions, Validator,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

fn new_validator(sets: Vec<ConstraintSet>) -> Validator {
    Validator::new(sets).expect("failed to create validator")
}

fn constraint_set(value: serde_json::Value) -> ConstraintSet {
    serde_json::from_value(value).expect("failed to decode constraint set")
}

fn document(value: serde_json::Value) -> Document {
    serde_json::from_value(value).expect("failed to decode document")
}

fn status_sets() -> Vec<ConstraintSet> {
    vec![
        constraint_set(json!({
            "name": "base",
            "documents": [
                {
                    "declares": "test/article",
                    "meta": [
                        {
                            "declares": {"type": "test/status"},
                            "data": {"value": {"enumReference": "statuses"}}
                        }
                    ]
                }
            ],
            "enums": [
                {
                    "declare": "statuses",
                    "values": {"draft": {}, "usable": {}, "finished": {}, "withheld": {}}
                }
            ]
        })),
        constraint_set(json!({
            "name": "org",
            "enums": [
                {
                    "match": "statuses",
                    "values": {
                        "withheld": {"forbidden": true},
                        "finished": {
                            "deprecated": {
                                "label": "finished-status",
                                "doc": "Use usable instead."
                            }
                        }
                    }
                }
            ]
        })),
    ]
}

fn status_document(value: &str) -> Document {
    document(json!({
        "uuid": "c0f00414-9245-4e52-a489-01e4047ba120",
        "type": "test/article",
        "meta": [
            {"type": "test/status", "data": {"value": value}}
        ]
    }))
}

#[test]
fn forbidden_enum_value_is_an_error() {
    let validator = new_validator(status_sets());

    let res = validator
        .validate_document(&status_document("withheld"), ValidationOptions::new())
        .expect("validate");

    assert_eq!(res.len(), 1);
    assert_eq!(res[0].error, "\"withheld\" is no longer allowed");
    assert!(!res[0].enforced_deprecation);
}

#[test]
fn enforced_enum_deprecation_is_reported() {
    let validator = new_validator(status_sets());

    let options = ValidationOptions::new().with_deprecation_handler(|_, _, _| {
        Ok(DeprecationDecision {
            enforce: true,
            message: String::new(),
        })
    });

    let res = validator
        .validate_document(&status_document("finished"), options)
        .expect("validate");

    assert_eq!(res.len(), 1);
    assert!(res[0].enforced_deprecation);
    assert_eq!(
        res[0].error,
        "enforced deprecation \"finished-status\": Use usable instead."
    );
}

#[test]
fn handler_message_overrides_deprecation_doc() {
    let validator = new_validator(status_sets());

    let options = ValidationOptions::new().with_deprecation_handler(|_, _, _| {
        Ok(DeprecationDecision {
            enforce: true,
            message: "finished is retired here".to_string(),
        })
    });

    let res = validator
        .validate_document(&status_document("finished"), options)
        .expect("validate");

    assert_eq!(res.len(), 1);
    assert_eq!(
        res[0].error,
        "enforced deprecation \"finished-status\": finished is retired here"
    );
}

#[test]
fn unenforced_deprecations_are_not_errors() {
    let validator = new_validator(status_sets());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in_handler = Arc::clone(&seen);

    let options = ValidationOptions::new().with_deprecation_handler(move |_, depr, ctx| {
        seen_in_handler
            .lock()
            .push((depr.label.clone(), ctx.value.map(ToString::to_string)));

        Ok(DeprecationDecision::default())
    });

    let res = validator
        .validate_document(&status_document("finished"), options)
        .expect("validate");

    assert!(res.is_empty(), "got: {res:#?}");

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "finished-status");
    assert_eq!(seen[0].1.as_deref(), Some("finished"));
}

#[test]
fn handler_errors_abort_validation() {
    let validator = new_validator(status_sets());

    let options = ValidationOptions::new().with_deprecation_handler(|_, depr, _| {
        Err(docvet_core::DocvetError::deprecation_handler(format!(
            "nope, can't have {:?}",
            depr.label
        )))
    });

    let err = validator
        .validate_document(&status_document("finished"), options)
        .expect_err("handler error should abort");

    assert!(
        matches!(err, docvet_core::DocvetError::DeprecationHandler(_)),
        "got: {err}"
    );
}

#[test]
fn block_deprecations_are_dispatched_with_the_block() {
    let validator = new_validator(vec![constraint_set(json!({
        "name": "test",
        "documents": [
            {
                "declares": "test/article",
                "meta": [
                    {
                        "declares": {"type": "test/old-meta"},
                        "deprecated": {
                            "label": "old-meta",
                            "doc": "Gone soon."
                        }
                    }
                ]
            }
        ]
    }))]);

    let doc = document(json!({
        "uuid": "c0f00414-9245-4e52-a489-01e4047ba120",
        "type": "test/article",
        "meta": [
            {"type": "test/old-meta"}
        ]
    }));

    let block_types = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&block_types);

    let options = ValidationOptions::new().with_deprecation_handler(move |_, _, ctx| {
        seen.lock()
            .push(ctx.block.map(|b| b.block_type.clone()));

        Ok(DeprecationDecision {
            enforce: true,
            message: String::new(),
        })
    });

    let res = validator.validate_document(&doc, options).expect("validate");

    assert_eq!(res.len(), 1);
    assert!(res[0].enforced_deprecation);
    assert_eq!(res[0].error, "enforced deprecation \"old-meta\": Gone soon.");
    assert!(!res[0].entity.is_empty(), "block deprecations carry an entity");

    assert_eq!(
        block_types.lock().as_slice(),
        &[Some("test/old-meta".to_string())]
    );
}

#[test]
fn attribute_and_enum_deprecations_both_fire() {
    // The attribute constraint is itself deprecated and references an
    // enum with a deprecated value. Both deprecations are dispatched; the
    // order between the two is not part of the contract.
    let validator = new_validator(vec![constraint_set(json!({
        "name": "test",
        "documents": [
            {
                "declares": "test/article",
                "meta": [
                    {
                        "declares": {"type": "test/status"},
                        "data": {
                            "value": {
                                "enumReference": "statuses",
                                "deprecated": {
                                    "label": "status-block-data",
                                    "doc": "Use the status attribute."
                                }
                            }
                        }
                    }
                ]
            }
        ],
        "enums": [
            {
                "declare": "statuses",
                "values": {
                    "finished": {
                        "deprecated": {"label": "finished-status", "doc": "x"}
                    }
                }
            }
        ]
    }))]);

    let labels = Arc::new(Mutex::new(BTreeSet::new()));
    let seen = Arc::clone(&labels);

    let options = ValidationOptions::new().with_deprecation_handler(move |_, depr, _| {
        seen.lock().insert(depr.label.clone());

        Ok(DeprecationDecision::default())
    });

    let res = validator
        .validate_document(&status_document("finished"), options)
        .expect("validate");

    assert!(res.is_empty(), "got: {res:#?}");

    let labels = labels.lock();
    assert!(labels.contains("status-block-data"), "got: {labels:?}");
    assert!(labels.contains("finished-status"), "got: {labels:?}");
}

#[test]
fn document_deprecations_have_no_entity() {
    let validator = new_validator(vec![constraint_set(json!({
        "name": "test",
        "documents": [
            {
                "declares": "test/old-article",
                "deprecated": {
                    "label": "old-article",
                    "doc": "Use test/article."
                }
            }
        ]
    }))]);

    let doc = document(json!({
        "uuid": "c0f00414-9245-4e52-a489-01e4047ba120",
        "type": "test/old-article"
    }));

    let options = ValidationOptions::new().with_deprecation_handler(|_, _, ctx| {
        assert!(ctx.entity.is_none());
        assert!(ctx.block.is_none());

        Ok(DeprecationDecision {
            enforce: true,
            message: String::new(),
        })
    });

    let res = validator.validate_document(&doc, options).expect("validate");

    assert_eq!(res.len(), 1);
    assert!(res[0].enforced_deprecation);
    assert!(res[0].entity.is_empty());
    assert_eq!(
        res[0].error,
        "enforced deprecation \"old-article\": Use test/article."
    );
}
