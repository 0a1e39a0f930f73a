//! Session
//!
//! One validator, one state store and one canvas, driven by [`Intent`]s.
//!
//! # Design Philosophy
//!
//! The agent and the renderer never touch the store or the canvas
//! directly. Everything they want to change arrives as an intent, is
//! checked first, and then applied atomically; a refused intent changes
//! nothing and comes back as [`Outcome::Rejected`].
//!
//! # Lock Order
//!
//! Operations that need both the canvas and the document (reset, agent
//! context, checkpoint, restore) take the canvas lock first, then the
//! document lock.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::canvas::{Admission, CanvasController, CanvasError, CanvasInstance, DuplicatePolicy};
use crate::clock::{SystemClock, TimeSource};
use crate::component::{ComponentDescription, ComponentKind};
use crate::error::ValidationError;
use crate::intents::{Intent, Outcome};
use crate::state::{Section, SharedStateDocument, StateError, StateStore};
use crate::validate::{ValidationLimits, Validator};

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Why an intent was refused
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Component failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Patch refused by the store
    #[error(transparent)]
    State(#[from] StateError),

    /// Admission refused by the canvas
    #[error(transparent)]
    Canvas(#[from] CanvasError),

    /// No component with this id on the canvas
    #[error("no component {id:?} on the canvas")]
    UnknownComponent {
        /// Logical id asked for
        id: String,
    },

    /// Submission addressed to something that is not a form
    #[error("component {id:?} is a {kind}, not a form")]
    NotAForm {
        /// Logical id
        id: String,
        /// Its actual variant
        kind: ComponentKind,
    },

    /// Progress addressed to something that is not a workflow
    #[error("component {id:?} is a {kind}, not a workflow")]
    NotAWorkflow {
        /// Logical id
        id: String,
        /// Its actual variant
        kind: ComponentKind,
    },

    /// Required form field submitted empty or not at all
    #[error("form {form_id:?} is missing a value for required field `{field}`")]
    MissingFormValue {
        /// Form id
        form_id: String,
        /// Field name
        field: String,
    },

    /// Step index past the end of the workflow
    #[error("workflow {workflow_id:?} has {len} steps, step {step} is out of range")]
    StepOutOfRange {
        /// Workflow id
        workflow_id: String,
        /// Requested index
        step: u32,
        /// Number of steps
        len: usize,
    },
}

impl SessionError {
    /// Machine-readable kind, in camelCase
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.kind().as_str(),
            Self::State(StateError::InvalidSection { .. }) => "invalidSection",
            Self::State(StateError::PatchNotObject { .. }) => "patchNotObject",
            Self::State(StateError::Stale { .. }) => "stale",
            Self::Canvas(CanvasError::DuplicateIdConflict { .. }) => "duplicateIdConflict",
            Self::Canvas(CanvasError::CapacityExceeded { .. }) => "capacityExceeded",
            Self::UnknownComponent { .. } => "unknownComponent",
            Self::NotAForm { .. } => "notAForm",
            Self::NotAWorkflow { .. } => "notAWorkflow",
            Self::MissingFormValue { .. } => "missingFormValue",
            Self::StepOutOfRange { .. } => "stepOutOfRange",
        }
    }
}

/// Construction options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Validator limits
    pub limits: ValidationLimits,
    /// What to do with a re-admitted id
    pub duplicate_policy: DuplicatePolicy,
    /// Canvas capacity (0 = unlimited)
    pub max_instances: usize,
}

/// What the agent sees at the start of a turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContext {
    /// The shared document
    pub document: SharedStateDocument,
    /// Materialized components, in display order
    pub components: Vec<ComponentSummary>,
}

/// Agent-facing summary of one materialized component
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentSummary {
    /// Logical id
    pub id: String,
    /// Variant
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    /// Heading, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Serializable state of a session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// The shared document
    pub document: SharedStateDocument,
    /// Canvas instances, in display order
    pub instances: Vec<CanvasInstance>,
    /// Remembered dedup keys, sorted
    pub dedup_keys: Vec<String>,
}

/// A validator, a state store and a canvas
#[derive(Debug)]
pub struct Session {
    validator: Validator,
    store: StateStore,
    canvas: CanvasController,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(&SessionOptions::default())
    }
}

impl Session {
    /// Empty session on the system clock
    #[must_use]
    pub fn new(options: &SessionOptions) -> Self {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    /// Empty session on a custom clock
    #[must_use]
    pub fn with_clock(options: &SessionOptions, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            validator: Validator::with_limits(options.limits),
            store: StateStore::with_clock(clock.clone()),
            canvas: CanvasController::with_clock(
                options.duplicate_policy,
                options.max_instances,
                clock,
            ),
        }
    }

    /// The validator
    #[must_use]
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// The state store
    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// The canvas
    #[must_use]
    pub fn canvas(&self) -> &CanvasController {
        &self.canvas
    }

    /// Validate raw component JSON and admit it
    ///
    /// # Errors
    ///
    /// Validation errors come first; nothing is admitted unless the whole
    /// tree is valid.
    pub fn admit(
        &self,
        raw: &Value,
        dedup_key: Option<&str>,
    ) -> SessionResult<(Admission, Vec<CanvasInstance>)> {
        let description = self.validator.validate(raw)?;
        Ok(self.canvas.admit_tracked(description, dedup_key)?)
    }

    /// Merge a patch into the section named `section`
    ///
    /// # Errors
    ///
    /// Unknown section or non-object patch.
    pub fn update(&self, section: &str, patch: Value) -> SessionResult<SharedStateDocument> {
        let section = section.parse::<Section>()?;
        Ok(self.store.apply_patch(section, patch)?)
    }

    /// Record a form submission under `formData[form_id]`
    ///
    /// The form may be on the canvas directly or nested in a composite.
    /// Every `required` field must carry a non-empty value: `null`, a blank
    /// string and an empty array count as empty.
    ///
    /// # Errors
    ///
    /// Unknown id, not a form, or a missing required value.
    pub fn submit_form(
        &self,
        form_id: &str,
        values: Map<String, Value>,
    ) -> SessionResult<SharedStateDocument> {
        let component = self.find_component(form_id)?;
        let Some(form) = component.as_form() else {
            return Err(SessionError::NotAForm {
                id: form_id.to_string(),
                kind: component.kind(),
            });
        };

        if let Some(field) = form
            .required_fields()
            .find(|name| !values.get(*name).is_some_and(|v| !is_empty_value(v)))
        {
            return Err(SessionError::MissingFormValue {
                form_id: form_id.to_string(),
                field: field.to_string(),
            });
        }

        let mut patch = Map::new();
        patch.insert(form_id.to_string(), Value::Object(values));
        let doc = self.store.apply_patch(Section::FormData, Value::Object(patch))?;
        tracing::debug!(form_id = form_id, "Form submitted");
        Ok(doc)
    }

    /// Record workflow progress under `components[workflow_id]`
    ///
    /// Writes `currentStep` and `completedSteps` (ids of every step before
    /// `step`).
    ///
    /// # Errors
    ///
    /// Unknown id, not a workflow, or a step index past the end.
    pub fn advance_workflow(
        &self,
        workflow_id: &str,
        step: u32,
    ) -> SessionResult<SharedStateDocument> {
        let component = self.find_component(workflow_id)?;
        let Some(workflow) = component.as_workflow() else {
            return Err(SessionError::NotAWorkflow {
                id: workflow_id.to_string(),
                kind: component.kind(),
            });
        };

        let index = step as usize;
        if index >= workflow.steps.len() {
            return Err(SessionError::StepOutOfRange {
                workflow_id: workflow_id.to_string(),
                step,
                len: workflow.steps.len(),
            });
        }

        let completed: Vec<&str> = workflow.steps[..index]
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        let mut patch = Map::new();
        patch.insert(
            workflow_id.to_string(),
            json!({ "currentStep": step, "completedSteps": completed }),
        );
        let doc = self.store.apply_patch(Section::Components, Value::Object(patch))?;
        tracing::debug!(workflow_id = workflow_id, step = step, "Workflow advanced");
        Ok(doc)
    }

    /// Clear the canvas and every document section together
    ///
    /// `lastUpdate` keeps increasing across the reset.
    pub fn reset(&self) -> SharedStateDocument {
        let mut canvas = self.canvas.lock();
        let mut doc = self.store.lock();
        let removed = canvas.instances.len();
        canvas.clear();
        self.store.clear_locked(&mut doc);
        tracing::info!(
            removed = removed,
            last_update = doc.last_update,
            "Session reset"
        );
        doc.clone()
    }

    /// Document plus a summary of each materialized component
    #[must_use]
    pub fn agent_context(&self) -> AgentContext {
        let canvas = self.canvas.lock();
        let doc = self.store.lock();
        AgentContext {
            document: doc.clone(),
            components: canvas
                .instances
                .iter()
                .map(|i| ComponentSummary {
                    id: i.description.id.clone(),
                    kind: i.description.kind(),
                    title: i.description.title.clone(),
                })
                .collect(),
        }
    }

    /// Consistent copy of document, instances and dedup keys
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        let canvas = self.canvas.lock();
        let doc = self.store.lock();
        Checkpoint {
            document: doc.clone(),
            instances: canvas.instances.clone(),
            dedup_keys: canvas.dedup_keys(),
        }
    }

    /// Replace the whole session state with a checkpoint
    ///
    /// Every instance goes back through the validator, so out-of-range
    /// layout values are clamped and invalid trees are refused. Ids must be
    /// unique and the instance count must fit the canvas capacity. Nothing
    /// changes unless the whole checkpoint is accepted.
    ///
    /// The restored `lastUpdate` is raised if needed so it stays above
    /// every value this session has already handed out.
    ///
    /// # Errors
    ///
    /// The first invalid instance, a repeated id, or too many instances.
    pub fn restore(&self, checkpoint: Checkpoint) -> SessionResult<()> {
        let Checkpoint {
            document,
            instances,
            dedup_keys,
        } = checkpoint;

        let limit = self.canvas.max_instances();
        if limit != 0 && instances.len() > limit {
            tracing::warn!(count = instances.len(), limit = limit, "Checkpoint exceeds canvas capacity");
            return Err(CanvasError::CapacityExceeded { limit }.into());
        }

        let mut ids = HashSet::with_capacity(instances.len());
        let mut checked = Vec::with_capacity(instances.len());
        for (index, mut instance) in instances.into_iter().enumerate() {
            instance.description = self
                .revalidate(&instance.description)
                .inspect_err(|e| {
                    tracing::warn!(index = index, error = %e, "Checkpoint instance rejected");
                })?;
            if !ids.insert(instance.description.id.clone()) {
                tracing::warn!(index = index, id = %instance.description.id, "Checkpoint repeats an id");
                return Err(CanvasError::DuplicateIdConflict {
                    id: instance.description.id,
                }
                .into());
            }
            checked.push(instance);
        }

        let mut canvas = self.canvas.lock();
        let mut doc = self.store.lock();
        canvas.instances = checked;
        canvas.seen = dedup_keys.into_iter().collect::<HashSet<_>>();
        self.store.replace_locked(&mut doc, document);
        tracing::info!(
            instances = canvas.instances.len(),
            last_update = doc.last_update,
            "Session restored from checkpoint"
        );
        Ok(())
    }

    /// Apply one intent
    pub fn dispatch(&self, intent: Intent) -> Outcome {
        let kind = intent.kind();
        let result = match intent {
            Intent::Admit {
                component,
                dedup_key,
            } => self
                .admit(&component, dedup_key.as_deref())
                .map(|(admission, list)| (self.store.last_update(), list.len(), Some(admission))),
            Intent::Update { section, patch } => self
                .update(&section, patch)
                .map(|doc| (doc.last_update, self.canvas.len(), None)),
            Intent::SubmitForm { form_id, values } => self
                .submit_form(&form_id, values)
                .map(|doc| (doc.last_update, self.canvas.len(), None)),
            Intent::AdvanceWorkflow { workflow_id, step } => self
                .advance_workflow(&workflow_id, step)
                .map(|doc| (doc.last_update, self.canvas.len(), None)),
            Intent::Reset => Ok((self.reset().last_update, 0, None)),
        };

        match result {
            Ok((last_update, instance_count, admission)) => Outcome::Applied {
                intent: kind,
                last_update,
                instance_count,
                admission,
            },
            Err(e) => {
                tracing::warn!(intent = ?kind, kind = e.kind(), error = %e, "Intent rejected");
                Outcome::Rejected {
                    intent: Some(kind),
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                }
            }
        }
    }

    fn revalidate(&self, description: &ComponentDescription) -> SessionResult<ComponentDescription> {
        let raw = serde_json::to_value(description).map_err(|e| {
            ValidationError::malformed(format!("component has no JSON form: {e}"))
        })?;
        Ok(self.validator.validate(&raw)?)
    }

    fn find_component(&self, id: &str) -> SessionResult<ComponentDescription> {
        let canvas = self.canvas.lock();
        canvas
            .instances
            .iter()
            .find_map(|i| i.description.find(id))
            .cloned()
            .ok_or_else(|| SessionError::UnknownComponent { id: id.to_string() })
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
