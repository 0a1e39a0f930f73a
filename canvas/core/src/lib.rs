//! Canvas Core - Agent-Emitted UI Descriptions and Shared State
//!
//! This crate validates the UI descriptions a conversational agent emits,
//! keeps track of which of them are materialized on the canvas, and owns the
//! state document that rendered components and the agent share. It does no
//! rendering, no networking and no model calls.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐           ┌──────────────────────────┐
//! │   Agent / Tool Router    │           │     Rendering Layer      │
//! │  (raw, untrusted JSON)   │           │  (forms, workflows, ...) │
//! └────────────┬─────────────┘           └────────────┬─────────────┘
//!              │ Intent::Admit                        │ Intent::Update
//!              │                                      │ Intent::SubmitForm
//!              │                                      │ Intent::AdvanceWorkflow
//! ┌────────────┼──────────────────────────────────────┼─────────────┐
//! │            ▼              CANVAS CORE              ▼             │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                          Session                           │ │
//! │  │  ┌──────────────┐   ┌──────────────┐   ┌────────────────┐  │ │
//! │  │  │  Validator   │──▶│    Canvas    │   │   StateStore   │  │ │
//! │  │  │ (+ Schema    │   │  Controller  │   │ (components,   │  │ │
//! │  │  │  Registry)   │   │   (dedup)    │   │  formData, ..) │  │ │
//! │  │  └──────────────┘   └──────────────┘   └────────────────┘  │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! │                 agent_context() / checkpoint()                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Validator`]: turns raw JSON into a [`ComponentDescription`]
//! - [`SchemaRegistry`]: declarative field contracts per component variant
//! - [`StateStore`]: the shared document and its merge protocol
//! - [`CanvasController`]: materialized instances with dedup and replace-in-place
//! - [`Session`]: ties the three together and applies [`Intent`]s
//!
//! # Quick Start
//!
//! ```
//! use canvas_core::{Intent, Session};
//! use serde_json::json;
//!
//! let session = Session::default();
//! let outcome = session.dispatch(Intent::Admit {
//!     component: json!({"type": "weather", "id": "w1", "location": "Tokyo"}),
//!     dedup_key: Some("call-1".to_string()),
//! });
//! assert!(outcome.is_applied());
//!
//! let context = session.agent_context();
//! assert_eq!(context.components[0].id, "w1");
//! ```
//!
//! # Module Overview
//!
//! - [`component`]: typed component descriptions
//! - [`schema`]: field contracts for every variant
//! - [`validate`]: the validator / normalizer
//! - [`error`]: validation errors
//! - [`state`]: shared state document and reconciler
//! - [`canvas`]: canvas instances and dedup
//! - [`intents`]: intents and outcomes
//! - [`session`]: session, agent context and checkpoints
//! - [`config`]: TOML / environment / CLI configuration
//! - [`clock`]: time sources
//!
//! # No Runtime Dependencies
//!
//! Every operation is synchronous and in-memory. The crate has no async
//! runtime dependency and can be embedded anywhere.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod canvas;
pub mod clock;
pub mod component;
pub mod config;
pub mod error;
pub mod intents;
pub mod schema;
pub mod session;
pub mod state;
pub mod validate;

pub use canvas::{
    Admission, CanvasController, CanvasError, CanvasInstance, DuplicatePolicy, InstanceId,
};
pub use clock::{ManualClock, SystemClock, TimeSource};
pub use component::{ComponentBody, ComponentDescription, ComponentKind};
pub use config::{
    default_config_path, load_config, load_config_from_path, CanvasConfigFile, ConfigError,
    ConfigOverrides, ConfigSource,
};
pub use error::{ValidationError, ValidationErrorKind, ValidationResult};
pub use intents::{Intent, IntentKind, Outcome};
pub use schema::SchemaRegistry;
pub use session::{
    AgentContext, Checkpoint, ComponentSummary, Session, SessionError, SessionOptions,
};
pub use state::{Section, SharedStateDocument, StateError, StateStore};
pub use validate::{RawInput, ValidationLimits, Validator};
