//! Component Descriptions
//!
//! Typed form of the UI descriptions an agent emits. Every value of
//! [`ComponentDescription`] has been through the validator: defaults are
//! filled in, bounds are clamped, and the `id` is always present.
//!
//! # Design Philosophy
//!
//! The wire format is a JSON object with a `type` discriminant. Here it is a
//! struct with the shared base fields and a flattened [`ComponentBody`] enum,
//! so serializing a description produces exactly the object the validator
//! would accept again. Composite variants (`dashboard`, `workflow`) hold their
//! children by value, so a description is always a tree.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminant of a component variant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    /// Current conditions and forecast for a location
    Weather,
    /// Chart over tabular records
    DataVisualization,
    /// Input form whose values land in `formData`
    Form,
    /// Card with a set of action buttons
    ActionCard,
    /// Grid of sections, each embedding a component
    Dashboard,
    /// Ordered steps, each optionally embedding a component
    Workflow,
}

impl ComponentKind {
    /// All known variants, in registry order
    pub const ALL: [ComponentKind; 6] = [
        Self::Weather,
        Self::DataVisualization,
        Self::Form,
        Self::ActionCard,
        Self::Dashboard,
        Self::Workflow,
    ];

    /// Parse a discriminant string
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weather" => Some(Self::Weather),
            "dataVisualization" => Some(Self::DataVisualization),
            "form" => Some(Self::Form),
            "actionCard" => Some(Self::ActionCard),
            "dashboard" => Some(Self::Dashboard),
            "workflow" => Some(Self::Workflow),
            _ => None,
        }
    }

    /// Wire name of the discriminant
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::DataVisualization => "dataVisualization",
            Self::Form => "form",
            Self::ActionCard => "actionCard",
            Self::Dashboard => "dashboard",
            Self::Workflow => "workflow",
        }
    }

    /// Whether this variant embeds child components
    #[must_use]
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Dashboard | Self::Workflow)
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, normalized component description
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDescription {
    /// Logical id, stable across re-emissions of the same result
    pub id: String,
    /// Optional heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Presentation hints, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hints: Option<Map<String, Value>>,
    /// Variant-specific payload, tagged by `type`
    #[serde(flatten)]
    pub body: ComponentBody,
}

impl ComponentDescription {
    /// Discriminant of this description
    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        match &self.body {
            ComponentBody::Weather(_) => ComponentKind::Weather,
            ComponentBody::DataVisualization(_) => ComponentKind::DataVisualization,
            ComponentBody::Form(_) => ComponentKind::Form,
            ComponentBody::ActionCard(_) => ComponentKind::ActionCard,
            ComponentBody::Dashboard(_) => ComponentKind::Dashboard,
            ComponentBody::Workflow(_) => ComponentKind::Workflow,
        }
    }

    /// Direct children of a composite description (empty for leaves)
    #[must_use]
    pub fn children(&self) -> Vec<&ComponentDescription> {
        match &self.body {
            ComponentBody::Dashboard(d) => d.sections.iter().map(|s| s.component.as_ref()).collect(),
            ComponentBody::Workflow(w) => w
                .steps
                .iter()
                .filter_map(|s| s.component.as_deref())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Depth of the description tree (a leaf has depth 1)
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    /// This description or the first descendant with the given id
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&ComponentDescription> {
        if self.id == id {
            return Some(self);
        }
        self.children().into_iter().find_map(|c| c.find(id))
    }

    /// The form payload, if this is a form
    #[must_use]
    pub fn as_form(&self) -> Option<&FormSpec> {
        match &self.body {
            ComponentBody::Form(form) => Some(form),
            _ => None,
        }
    }

    /// The workflow payload, if this is a workflow
    #[must_use]
    pub fn as_workflow(&self) -> Option<&WorkflowSpec> {
        match &self.body {
            ComponentBody::Workflow(workflow) => Some(workflow),
            _ => None,
        }
    }
}

/// Variant payloads
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ComponentBody {
    /// `weather`
    Weather(WeatherSpec),
    /// `dataVisualization`
    DataVisualization(ChartSpec),
    /// `form`
    Form(FormSpec),
    /// `actionCard`
    ActionCard(ActionCardSpec),
    /// `dashboard`
    Dashboard(DashboardSpec),
    /// `workflow`
    Workflow(WorkflowSpec),
}

// ============================================
// Leaf variants
// ============================================

/// Weather report
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSpec {
    /// Place name
    pub location: String,
    /// Current temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Free-text condition ("Sunny", "Rain")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Relative humidity, 0-100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    /// Wind speed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    /// Daily forecast entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Vec<ForecastDay>>,
}

/// One forecast entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastDay {
    /// Day label
    pub day: String,
    /// High temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    /// Low temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    /// Condition label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Chart type for `dataVisualization`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartType {
    /// Bar chart
    Bar,
    /// Line chart
    Line,
    /// Pie chart
    Pie,
    /// Area chart
    Area,
    /// Scatter plot
    Scatter,
}

/// Chart over free-form records
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    /// Chart type
    pub chart_type: ChartType,
    /// Records to plot
    pub data: Vec<Map<String, Value>>,
    /// Record key used for the x axis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_key: Option<String>,
    /// Record keys plotted as series
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_keys: Option<Vec<String>>,
    /// Whether to draw a legend
    pub show_legend: bool,
}

/// Input kind of a form field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldInput {
    /// Single-line text
    Text,
    /// Email address
    Email,
    /// Masked text
    Password,
    /// Numeric input
    Number,
    /// Telephone number
    Tel,
    /// URL
    Url,
    /// Multi-line text
    Textarea,
    /// Choice among `options`
    Select,
    /// Boolean toggle
    Checkbox,
    /// Calendar date
    Date,
}

/// One form field
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    /// Key the value is stored under in `formData`
    pub name: String,
    /// Visible label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Input kind
    #[serde(rename = "type")]
    pub input: FieldInput,
    /// Whether a value must be supplied on submit
    pub required: bool,
    /// Placeholder text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Choices for `select`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Initial value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

/// Button style shared by forms and action cards
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ButtonVariant {
    /// Emphasized
    Primary,
    /// Muted
    Secondary,
    /// Dangerous action
    Destructive,
    /// Outlined
    Outline,
}

/// Submit button of a form
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitButton {
    /// Button label
    pub text: String,
    /// Button style
    pub variant: ButtonVariant,
}

/// Form
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSpec {
    /// Fields in display order
    pub fields: Vec<FormField>,
    /// Submit button
    pub submit_button: SubmitButton,
}

impl FormSpec {
    /// Names of fields marked `required`
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
    }
}

/// One button of an action card
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardAction {
    /// Button label
    pub label: String,
    /// Action identifier sent back to the agent
    pub action: String,
    /// Button style
    pub variant: ButtonVariant,
    /// Opaque payload sent with the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Action card
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCardSpec {
    /// Body text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Buttons
    pub actions: Vec<CardAction>,
}

// ============================================
// Composite variants
// ============================================

/// Dashboard grid settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardLayout {
    /// Grid columns, 1-12
    pub columns: u8,
}

/// One dashboard cell
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSection {
    /// Section heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Column span, 1-12
    pub span: u8,
    /// Row span, 1-6
    pub rows: u8,
    /// Embedded component
    pub component: Box<ComponentDescription>,
}

/// Dashboard
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSpec {
    /// Grid settings
    pub layout: DashboardLayout,
    /// Sections in display order
    pub sections: Vec<DashboardSection>,
}

/// Status of a workflow step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepStatus {
    /// Not reached yet
    Pending,
    /// Current step
    Active,
    /// Finished
    Completed,
    /// Bypassed
    Skipped,
}

/// One workflow step
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    /// Step id, local to the workflow
    pub id: String,
    /// Step heading
    pub title: String,
    /// Step body text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Status as emitted by the agent
    pub status: StepStatus,
    /// Embedded component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<Box<ComponentDescription>>,
}

/// Workflow
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    /// Steps in order
    pub steps: Vec<WorkflowStep>,
    /// Index of the active step
    pub current_step: u32,
}
