//! Trigger events handed to the controller by the watch layer.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::result::ReconciliationStatus;
use crate::spec::{DetectorSpec, ResourceKey};

/// Kind of event that started a pass. Every kind is handled the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Create,
    Update,
    Resume,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Create => write!(f, "create"),
            TriggerKind::Update => write!(f, "update"),
            TriggerKind::Resume => write!(f, "resume"),
        }
    }
}

/// One create/update/resume event for a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    pub kind: TriggerKind,
    pub spec: DetectorSpec,

    /// Previously published status. Informational only; never merged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_status: Option<ReconciliationStatus>,
}

impl TriggerEvent {
    pub fn new(kind: TriggerKind, spec: DetectorSpec) -> Self {
        Self {
            kind,
            spec,
            prior_status: None,
        }
    }

    pub fn create(spec: DetectorSpec) -> Self {
        Self::new(TriggerKind::Create, spec)
    }

    pub fn update(spec: DetectorSpec, prior_status: Option<ReconciliationStatus>) -> Self {
        Self {
            prior_status,
            ..Self::new(TriggerKind::Update, spec)
        }
    }

    pub fn resume(spec: DetectorSpec) -> Self {
        Self::new(TriggerKind::Resume, spec)
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn namespace(&self) -> &str {
        &self.spec.namespace
    }

    pub fn key(&self) -> ResourceKey {
        self.spec.key()
    }
}
