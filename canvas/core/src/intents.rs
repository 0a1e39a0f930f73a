//! Intents and Outcomes
//!
//! Intents are requests to mutate a session, sent by the agent (admitting
//! components, updating `appData`) or by the renderer (form submissions,
//! workflow progress, local component state). Every intent produces exactly
//! one [`Outcome`].
//!
//! # Wire Format
//!
//! One JSON object per intent, tagged by `intent`:
//!
//! ```text
//! {"intent":"admit","component":{...},"dedupKey":"call-1"}
//! {"intent":"update","section":"formData","patch":{"f1":{"email":"a@x.com"}}}
//! {"intent":"submitForm","formId":"f1","values":{"email":"a@x.com"}}
//! {"intent":"advanceWorkflow","workflowId":"wf","step":2}
//! {"intent":"reset"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::canvas::Admission;

/// A request to mutate a session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "camelCase")]
pub enum Intent {
    /// Validate a raw component and put it on the canvas
    Admit {
        /// Untrusted component JSON
        component: Value,
        /// Token suppressing repeated admission of the same emission
        #[serde(
            default,
            rename = "dedupKey",
            skip_serializing_if = "Option::is_none"
        )]
        dedup_key: Option<String>,
    },

    /// Merge a patch into one section of the document
    Update {
        /// Section wire name; parsed on dispatch
        section: String,
        /// Partial mapping, must be an object
        patch: Value,
    },

    /// Store the values of a submitted form under `formData[formId]`
    SubmitForm {
        /// Logical id of the form
        #[serde(rename = "formId")]
        form_id: String,
        /// Field name → value
        values: Map<String, Value>,
    },

    /// Move a workflow to another step
    AdvanceWorkflow {
        /// Logical id of the workflow
        #[serde(rename = "workflowId")]
        workflow_id: String,
        /// Zero-based step index
        step: u32,
    },

    /// Clear the canvas and the document together
    Reset,
}

impl Intent {
    /// Kind of this intent
    #[must_use]
    pub fn kind(&self) -> IntentKind {
        match self {
            Self::Admit { .. } => IntentKind::Admit,
            Self::Update { .. } => IntentKind::Update,
            Self::SubmitForm { .. } => IntentKind::SubmitForm,
            Self::AdvanceWorkflow { .. } => IntentKind::AdvanceWorkflow,
            Self::Reset => IntentKind::Reset,
        }
    }
}

/// Intent discriminant, echoed in outcomes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntentKind {
    /// [`Intent::Admit`]
    Admit,
    /// [`Intent::Update`]
    Update,
    /// [`Intent::SubmitForm`]
    SubmitForm,
    /// [`Intent::AdvanceWorkflow`]
    AdvanceWorkflow,
    /// [`Intent::Reset`]
    Reset,
}

/// Result of dispatching one intent
///
/// A rejection is a value, not a failure of the session: the renderer shows
/// a fallback and the agent may retry with corrected input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Outcome {
    /// The intent was applied
    Applied {
        /// Which intent
        intent: IntentKind,
        /// Document `lastUpdate` afterwards
        #[serde(rename = "lastUpdate")]
        last_update: u64,
        /// Canvas size afterwards
        #[serde(rename = "instanceCount")]
        instance_count: usize,
        /// Branch taken by an admission
        #[serde(default, skip_serializing_if = "Option::is_none")]
        admission: Option<Admission>,
    },

    /// The intent was refused; nothing changed
    Rejected {
        /// Which intent, `None` if the input was not an intent at all
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intent: Option<IntentKind>,
        /// Machine-readable error kind
        kind: String,
        /// Human-readable message
        message: String,
    },
}

impl Outcome {
    /// Rejection for input that did not parse as an intent
    #[must_use]
    pub fn unparsed(message: impl Into<String>) -> Self {
        Self::Rejected {
            intent: None,
            kind: "malformedIntent".to_string(),
            message: message.into(),
        }
    }

    /// Whether the intent was applied
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Error kind of a rejection
    #[must_use]
    pub fn rejection_kind(&self) -> Option<&str> {
        match self {
            Self::Rejected { kind, .. } => Some(kind),
            Self::Applied { .. } => None,
        }
    }
}
