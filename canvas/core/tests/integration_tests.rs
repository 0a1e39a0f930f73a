//! Integration tests for the canvas core
//!
//! These tests drive a whole session the way the agent and the renderer do.
//! Tests cover:
//! - Agent emissions, re-emissions and dedup across a conversation
//! - Form and workflow interactions landing in the shared document
//! - Reset versus canvas clear
//! - Checkpoint / restore through JSON
//! - TOML configuration shaping session behavior

use std::io::Write;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::NamedTempFile;

use canvas_core::config::{load_config_from_path, ConfigOverrides, ConfigSource};
use canvas_core::{
    Admission, Checkpoint, ComponentKind, DuplicatePolicy, Intent, IntentKind, ManualClock,
    Outcome, Session, SessionOptions, ValidationErrorKind, Validator,
};

fn session() -> Session {
    Session::with_clock(&SessionOptions::default(), Arc::new(ManualClock::new(10_000)))
}

fn parse(line: &str) -> Intent {
    serde_json::from_str(line).unwrap()
}

// =============================================================================
// Test 1: Agent Conversation Flow
// =============================================================================

/// An agent emits a weather card, re-emits the same tool result, then an
/// updated version of it. The canvas ends up with one card, updated in place.
#[test]
fn test_agent_reemission_flow() {
    let s = session();

    let first = s.dispatch(parse(
        r#"{"intent":"admit","component":{"type":"weather","id":"w1","location":"Tokyo"},"dedupKey":"call-1"}"#,
    ));
    let repeat = s.dispatch(parse(
        r#"{"intent":"admit","component":{"type":"weather","id":"w1","location":"Tokyo"},"dedupKey":"call-1"}"#,
    ));
    s.dispatch(parse(
        r#"{"intent":"admit","component":{"type":"actionCard","id":"c1","actions":[]}}"#,
    ));
    let updated = s.dispatch(parse(
        r#"{"intent":"admit","component":{"type":"weather","id":"w1","location":"Tokyo","temperature":18},"dedupKey":"call-2"}"#,
    ));

    assert!(matches!(first, Outcome::Applied { admission: Some(Admission::Appended), .. }));
    assert!(matches!(repeat, Outcome::Applied { admission: Some(Admission::Deduplicated), .. }));
    assert!(matches!(updated, Outcome::Applied { admission: Some(Admission::Replaced), instance_count: 2, .. }));

    let instances = s.canvas().instances();
    let ids: Vec<&str> = instances.iter().map(|i| i.description.id.as_str()).collect();
    assert_eq!(ids, vec!["w1", "c1"]);
    let weather = serde_json::to_value(&instances[0].description).unwrap();
    assert_eq!(weather["temperature"], json!(18.0));
}

/// Invalid emissions come back as rejected outcomes and change nothing.
#[test]
fn test_invalid_emission_is_rejected_without_mutation() {
    let s = session();
    let outcome = s.dispatch(parse(
        r#"{"intent":"admit","component":{"type":"dashboard","sections":[{"component":{"type":"form","fields":[{"label":"x"}]}}]},"dedupKey":"call-9"}"#,
    ));

    let Outcome::Rejected { intent, kind, message } = outcome else {
        panic!("expected rejection");
    };
    assert_eq!(intent, Some(IntentKind::Admit));
    assert_eq!(kind, "missingField");
    assert!(message.contains("sections[0].component.fields[0].name"));
    assert!(s.canvas().is_empty());
    assert!(!s.canvas().has_seen("call-9"));
}

// =============================================================================
// Test 2: Renderer Interactions
// =============================================================================

/// A form inside a workflow step: the user fills it in, then the workflow
/// moves on. Both land in the document the agent reads next turn.
#[test]
fn test_form_and_workflow_interactions() {
    let s = session();
    s.dispatch(Intent::Admit {
        component: json!({"type": "workflow", "id": "onboard", "title": "Onboarding", "steps": [
            {"id": "contact", "title": "Contact", "component": {
                "type": "form", "id": "contact-form",
                "fields": [{"name": "email", "type": "email", "required": true}]
            }},
            {"id": "confirm", "title": "Confirm"}
        ]}),
        dedup_key: None,
    });

    let missing = s.dispatch(parse(
        r#"{"intent":"submitForm","formId":"contact-form","values":{}}"#,
    ));
    assert_eq!(missing.rejection_kind(), Some("missingFormValue"));

    let submitted = s.dispatch(parse(
        r#"{"intent":"submitForm","formId":"contact-form","values":{"email":"a@x.com"}}"#,
    ));
    assert!(submitted.is_applied());

    let advanced = s.dispatch(parse(
        r#"{"intent":"advanceWorkflow","workflowId":"onboard","step":1}"#,
    ));
    assert!(advanced.is_applied());

    let out_of_range = s.dispatch(parse(
        r#"{"intent":"advanceWorkflow","workflowId":"onboard","step":7}"#,
    ));
    assert_eq!(out_of_range.rejection_kind(), Some("stepOutOfRange"));

    let context = s.agent_context();
    assert_eq!(
        context.document.form_data.get("contact-form"),
        Some(&json!({"email": "a@x.com"}))
    );
    assert_eq!(
        context.document.components.get("onboard"),
        Some(&json!({"currentStep": 1, "completedSteps": ["contact"]}))
    );
    assert_eq!(context.components.len(), 1);
    assert_eq!(context.components[0].kind, ComponentKind::Workflow);
}

/// Two formData patches for the same form: the later one wins.
#[test]
fn test_form_data_patches_last_writer_wins() {
    let s = session();
    s.dispatch(parse(
        r#"{"intent":"update","section":"formData","patch":{"f1":{"email":"a@x.com"}}}"#,
    ));
    let before = s.store().last_update();
    s.dispatch(parse(
        r#"{"intent":"update","section":"formData","patch":{"f1":{"email":"b@x.com"}}}"#,
    ));

    let f1 = s.store().read_section(Some("formData"), Some("f1")).unwrap();
    assert_eq!(f1["email"], json!("b@x.com"));
    assert!(s.store().last_update() > before);
}

// =============================================================================
// Test 3: Reset vs Clear
// =============================================================================

#[test]
fn test_reset_intent_clears_canvas_and_document() {
    let s = session();
    s.dispatch(parse(
        r#"{"intent":"admit","component":{"type":"weather","id":"w1","location":"Oslo"},"dedupKey":"call-1"}"#,
    ));
    s.dispatch(parse(r#"{"intent":"update","section":"appData","patch":{"k":1}}"#));
    let before = s.store().last_update();

    let outcome = s.dispatch(parse(r#"{"intent":"reset"}"#));

    let Outcome::Applied { last_update, instance_count, .. } = outcome else {
        panic!("reset should apply");
    };
    assert!(last_update > before);
    assert_eq!(instance_count, 0);
    assert!(s.store().snapshot().is_empty());
    assert!(!s.canvas().has_seen("call-1"));
}

#[test]
fn test_canvas_clear_does_not_touch_document() {
    let s = session();
    s.dispatch(parse(
        r#"{"intent":"admit","component":{"type":"weather","id":"w1","location":"Oslo"}}"#,
    ));
    s.dispatch(parse(r#"{"intent":"update","section":"appData","patch":{"k":1}}"#));
    let doc = s.store().snapshot();

    s.canvas().clear();

    assert_eq!(s.store().snapshot(), doc);
}

// =============================================================================
// Test 4: Checkpoint / Restore
// =============================================================================

#[test]
fn test_checkpoint_survives_json() {
    let s = session();
    s.dispatch(parse(
        r#"{"intent":"admit","component":{"type":"dataVisualization","id":"chart","chartType":"bar","data":[{"x":"a","y":1}]},"dedupKey":"call-1"}"#,
    ));
    s.dispatch(parse(r#"{"intent":"update","section":"components","patch":{"chart":{"zoom":2}}}"#));

    let text = serde_json::to_string(&s.checkpoint()).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert!(value.get("document").is_some());
    assert!(value.get("instances").is_some());
    assert_eq!(value["dedupKeys"], json!(["call-1"]));

    let restored = session();
    restored
        .restore(serde_json::from_str::<Checkpoint>(&text).unwrap())
        .unwrap();

    assert_eq!(restored.canvas().instances(), s.canvas().instances());
    assert_eq!(restored.store().snapshot(), s.store().snapshot());

    // Dedup memory came along
    let repeat = restored.dispatch(parse(
        r#"{"intent":"admit","component":{"type":"weather","location":"x"},"dedupKey":"call-1"}"#,
    ));
    assert!(matches!(repeat, Outcome::Applied { admission: Some(Admission::Deduplicated), .. }));
}

/// A hand-edited checkpoint is held to the same rules as live admissions.
#[test]
fn test_tampered_checkpoint_is_refused() {
    let s = session();
    s.dispatch(parse(
        r#"{"intent":"admit","component":{"type":"weather","id":"w1","location":"Oslo","humidity":40}}"#,
    ));
    let mut value = serde_json::to_value(s.checkpoint()).unwrap();
    value["instances"][0]["description"]["humidity"] = json!(900);

    let restored = session();
    let err = restored
        .restore(serde_json::from_value::<Checkpoint>(value).unwrap())
        .unwrap_err();

    assert_eq!(err.kind(), "fieldTypeMismatch");
    assert!(err.to_string().contains("humidity"));
    assert!(restored.canvas().is_empty());
}

// =============================================================================
// Test 5: Configuration
// =============================================================================

#[test]
fn test_config_shapes_session() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[validation]\nmax_depth = 2\n\n[canvas]\nduplicate_policy = \"strict\"\n")
        .unwrap();

    let mut config = load_config_from_path(Some(file.path().to_path_buf())).unwrap();
    ConfigOverrides::new()
        .with_max_depth(2)
        .with_duplicate_policy(DuplicatePolicy::Strict)
        .with_max_instances(1)
        .apply(&mut config);
    assert_eq!(config.source(), ConfigSource::Cli);
    assert_eq!(config.config_file_path.as_deref(), Some(file.path()));

    let s = Session::new(&config.session_options());
    assert_eq!(s.canvas().policy(), DuplicatePolicy::Strict);

    let nested = json!({"type": "dashboard", "id": "d", "sections": [
        {"component": {"type": "dashboard", "sections": [
            {"component": {"type": "weather", "location": "deep"}}
        ]}}
    ]});
    let Outcome::Rejected { kind, .. } = s.dispatch(Intent::Admit {
        component: nested,
        dedup_key: None,
    }) else {
        panic!("depth 3 should exceed max_depth 2");
    };
    assert_eq!(kind, "maxDepthExceeded");

    let weather = json!({"type": "weather", "id": "w", "location": "A"});
    assert!(s
        .dispatch(Intent::Admit { component: weather.clone(), dedup_key: None })
        .is_applied());
    let dup = s.dispatch(Intent::Admit { component: weather, dedup_key: None });
    assert_eq!(dup.rejection_kind(), Some("duplicateIdConflict"));
    let full = s.dispatch(Intent::Admit {
        component: json!({"type": "weather", "id": "w2", "location": "B"}),
        dedup_key: None,
    });
    assert_eq!(full.rejection_kind(), Some("capacityExceeded"));
}

// =============================================================================
// Test 6: Validator Properties Across Variants
// =============================================================================

#[test]
fn test_validation_is_idempotent_for_nested_trees() {
    let validator = Validator::default();
    let raw = json!({"type": "dashboard", "title": "Trip", "layout": {"columns": 99}, "sections": [
        {"title": "Now", "span": 6, "component": {"type": "weather", "location": "Lima", "humidity": 80}},
        {"span": 6, "rows": 2, "component": {"type": "workflow", "steps": [
            {"id": "pack", "title": "Pack", "status": "active", "component": {
                "type": "actionCard", "actions": [{"label": "Done", "action": "pack.done", "variant": "outline"}]
            }}
        ]}}
    ]});

    let first = validator.validate(&raw).unwrap();
    let again = validator
        .validate(&serde_json::to_value(&first).unwrap())
        .unwrap();
    assert_eq!(first, again);
    assert_eq!(first.depth(), 3);
}

#[test]
fn test_error_kinds_are_machine_readable() {
    let validator = Validator::default();
    let cases: Vec<(Value, ValidationErrorKind)> = vec![
        (json!("just text"), ValidationErrorKind::MalformedInput),
        (json!({"type": "bogus"}), ValidationErrorKind::UnknownVariant),
        (json!({"type": "actionCard"}), ValidationErrorKind::MissingField),
        (
            json!({"type": "form", "fields": "name"}),
            ValidationErrorKind::FieldTypeMismatch,
        ),
    ];
    for (raw, expected) in cases {
        let err = validator.validate(&raw).unwrap_err();
        assert_eq!(err.kind(), expected, "input {raw}");
    }
}
