//! Built-in variant contracts.
//!
//! These tables must agree with the typed structs in `component.rs`: every
//! non-`Option` struct field is either required or carries a default here.

use serde_json::json;

use super::{Bounds, FieldKind, FieldSpec, ObjectSchema, VariantSchema};
use crate::component::ComponentKind;

const CHART_TYPES: &[&str] = &["bar", "line", "pie", "area", "scatter"];

const FIELD_INPUTS: &[&str] = &[
    "text", "email", "password", "number", "tel", "url", "textarea", "select", "checkbox", "date",
];

const SUBMIT_VARIANTS: &[&str] = &["primary", "secondary", "outline"];

const ACTION_VARIANTS: &[&str] = &["primary", "secondary", "destructive", "outline"];

const STEP_STATUSES: &[&str] = &["pending", "active", "completed", "skipped"];

pub(super) fn variant(kind: ComponentKind) -> VariantSchema {
    let mut fields = base_fields();
    fields.extend(match kind {
        ComponentKind::Weather => weather(),
        ComponentKind::DataVisualization => data_visualization(),
        ComponentKind::Form => form(),
        ComponentKind::ActionCard => action_card(),
        ComponentKind::Dashboard => dashboard(),
        ComponentKind::Workflow => workflow(),
    });
    VariantSchema {
        kind,
        fields: ObjectSchema::new(kind.as_str(), fields),
    }
}

/// `id` and `type` are handled by the validator itself.
fn base_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::optional("title", FieldKind::String),
        FieldSpec::optional("hints", FieldKind::Record),
    ]
}

fn array_of(kind: FieldKind) -> FieldKind {
    FieldKind::Array(Box::new(kind))
}

fn weather() -> Vec<FieldSpec> {
    let forecast_day = ObjectSchema::new(
        "forecast day",
        vec![
            FieldSpec::required("day", FieldKind::String),
            FieldSpec::optional("high", FieldKind::Number),
            FieldSpec::optional("low", FieldKind::Number),
            FieldSpec::optional("condition", FieldKind::String),
        ],
    );

    vec![
        FieldSpec::required("location", FieldKind::String),
        FieldSpec::optional("temperature", FieldKind::Number),
        FieldSpec::optional("condition", FieldKind::String),
        FieldSpec::optional("humidity", FieldKind::Number).bounded(Bounds::reject(0.0, 100.0)),
        FieldSpec::optional("windSpeed", FieldKind::Number),
        FieldSpec::optional("forecast", array_of(FieldKind::Object(forecast_day))),
    ]
}

fn data_visualization() -> Vec<FieldSpec> {
    vec![
        FieldSpec::required("chartType", FieldKind::Enum(CHART_TYPES)),
        FieldSpec::required("data", array_of(FieldKind::Record)),
        FieldSpec::optional("xKey", FieldKind::String),
        FieldSpec::optional("yKeys", array_of(FieldKind::String)),
        FieldSpec::with_default("showLegend", FieldKind::Boolean, json!(true)),
    ]
}

fn form() -> Vec<FieldSpec> {
    let field = ObjectSchema::new(
        "form field",
        vec![
            FieldSpec::required("name", FieldKind::String),
            FieldSpec::optional("label", FieldKind::String),
            FieldSpec::with_default("type", FieldKind::Enum(FIELD_INPUTS), json!("text")),
            FieldSpec::with_default("required", FieldKind::Boolean, json!(false)),
            FieldSpec::optional("placeholder", FieldKind::String),
            FieldSpec::optional("options", array_of(FieldKind::String)),
            FieldSpec::optional("defaultValue", FieldKind::Any),
        ],
    );
    let submit_button = ObjectSchema::new(
        "submit button",
        vec![
            FieldSpec::with_default("text", FieldKind::String, json!("Submit")),
            FieldSpec::with_default("variant", FieldKind::Enum(SUBMIT_VARIANTS), json!("primary")),
        ],
    );

    vec![
        FieldSpec::required("fields", array_of(FieldKind::Object(field))),
        FieldSpec::with_default("submitButton", FieldKind::Object(submit_button), json!({})),
    ]
}

fn action_card() -> Vec<FieldSpec> {
    let action = ObjectSchema::new(
        "card action",
        vec![
            FieldSpec::required("label", FieldKind::String),
            FieldSpec::required("action", FieldKind::String),
            FieldSpec::with_default("variant", FieldKind::Enum(ACTION_VARIANTS), json!("primary")),
            FieldSpec::optional("payload", FieldKind::Any),
        ],
    );

    vec![
        FieldSpec::optional("description", FieldKind::String),
        FieldSpec::required("actions", array_of(FieldKind::Object(action))),
    ]
}

fn dashboard() -> Vec<FieldSpec> {
    let layout = ObjectSchema::new(
        "dashboard layout",
        vec![FieldSpec::with_default("columns", FieldKind::Integer, json!(12))
            .bounded(Bounds::clamp(1.0, 12.0))],
    );
    let section = ObjectSchema::new(
        "dashboard section",
        vec![
            FieldSpec::optional("title", FieldKind::String),
            FieldSpec::with_default("span", FieldKind::Integer, json!(12))
                .bounded(Bounds::clamp(1.0, 12.0)),
            FieldSpec::with_default("rows", FieldKind::Integer, json!(1))
                .bounded(Bounds::clamp(1.0, 6.0)),
            FieldSpec::required("component", FieldKind::Component),
        ],
    );

    vec![
        FieldSpec::with_default("layout", FieldKind::Object(layout), json!({})),
        FieldSpec::required("sections", array_of(FieldKind::Object(section))),
    ]
}

fn workflow() -> Vec<FieldSpec> {
    let step = ObjectSchema::new(
        "workflow step",
        vec![
            FieldSpec::required("id", FieldKind::String),
            FieldSpec::required("title", FieldKind::String),
            FieldSpec::optional("description", FieldKind::String),
            FieldSpec::with_default("status", FieldKind::Enum(STEP_STATUSES), json!("pending")),
            FieldSpec::optional("component", FieldKind::Component),
        ],
    );

    vec![
        FieldSpec::required("steps", array_of(FieldKind::Object(step))),
        FieldSpec::with_default("currentStep", FieldKind::Integer, json!(0))
            .bounded(Bounds::reject(0.0, f64::from(u32::MAX))),
    ]
}
