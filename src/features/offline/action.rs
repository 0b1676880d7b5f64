//! Queued action types.
//!
//! Each action kind carries its own payload schema, so translating a queued
//! action into a remote call is an exhaustive match.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{PatientRequest, PrescriptionRequest, PrescriptionUpload};
use crate::error::MedivaultError;

/// Action kinds that can be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    CreatePatient,
    UpdatePatient,
    DeletePatient,
    UploadPrescription,
    UpdatePrescription,
    DeletePrescription,
}

impl ActionKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::CreatePatient,
        Self::UpdatePatient,
        Self::DeletePatient,
        Self::UploadPrescription,
        Self::UpdatePrescription,
        Self::DeletePrescription,
    ];

    /// Wire tag, e.g. `create-patient`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatePatient => "create-patient",
            Self::UpdatePatient => "update-patient",
            Self::DeletePatient => "delete-patient",
            Self::UploadPrescription => "upload-prescription",
            Self::UpdatePrescription => "update-prescription",
            Self::DeletePrescription => "delete-prescription",
        }
    }

    /// Get the display name for this kind.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::CreatePatient => "Create Patient",
            Self::UpdatePatient => "Update Patient",
            Self::DeletePatient => "Delete Patient",
            Self::UploadPrescription => "Upload Prescription",
            Self::UpdatePrescription => "Update Prescription",
            Self::DeletePrescription => "Delete Prescription",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = MedivaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|k| k.as_str()).collect();
                MedivaultError::InvalidInput(format!(
                    "Unknown action kind '{s}' (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

/// A mutation together with the data needed to perform it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum PendingMutation {
    CreatePatient(PatientRequest),
    #[serde(rename_all = "camelCase")]
    UpdatePatient {
        patient_id: i64,
        patient: PatientRequest,
    },
    #[serde(rename_all = "camelCase")]
    DeletePatient { patient_id: i64 },
    UploadPrescription(PrescriptionUpload),
    #[serde(rename_all = "camelCase")]
    UpdatePrescription {
        prescription_id: i64,
        prescription: PrescriptionRequest,
    },
    #[serde(rename_all = "camelCase")]
    DeletePrescription { prescription_id: i64 },
}

impl PendingMutation {
    /// The kind tag of this mutation.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::CreatePatient(_) => ActionKind::CreatePatient,
            Self::UpdatePatient { .. } => ActionKind::UpdatePatient,
            Self::DeletePatient { .. } => ActionKind::DeletePatient,
            Self::UploadPrescription(_) => ActionKind::UploadPrescription,
            Self::UpdatePrescription { .. } => ActionKind::UpdatePrescription,
            Self::DeletePrescription { .. } => ActionKind::DeletePrescription,
        }
    }

    /// Short description of what the mutation touches.
    #[must_use]
    pub fn target(&self) -> String {
        match self {
            Self::CreatePatient(p) => format!("patient \"{}\"", p.name),
            Self::UpdatePatient { patient_id, .. } | Self::DeletePatient { patient_id } => {
                format!("patient #{patient_id}")
            }
            Self::UploadPrescription(u) => {
                format!("upload {} for patient #{}", u.upload_id, u.patient_id)
            }
            Self::UpdatePrescription {
                prescription_id, ..
            }
            | Self::DeletePrescription { prescription_id } => {
                format!("prescription #{prescription_id}")
            }
        }
    }
}

/// A single pending mutation awaiting delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAction {
    /// Caller-supplied id used for deduplication.
    pub id: String,
    /// What to deliver.
    pub action: PendingMutation,
    /// When the action was first submitted. Not used for ordering.
    pub queued_at: DateTime<Utc>,
}

impl QueuedAction {
    /// Create an action stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>, action: PendingMutation) -> Self {
        Self {
            id: id.into(),
            action,
            queued_at: Utc::now(),
        }
    }

    /// Build an action from a kind tag and an untyped JSON payload.
    ///
    /// The payload is checked against the kind's schema here, so a malformed
    /// payload is rejected at submission instead of poisoning the queue.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the id is empty or the payload does not
    /// match the kind's schema.
    pub fn from_parts(
        id: impl Into<String>,
        kind: ActionKind,
        payload: serde_json::Value,
    ) -> Result<Self, MedivaultError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(MedivaultError::InvalidInput(
                "Action id must not be empty".to_string(),
            ));
        }

        let tagged = serde_json::json!({ "kind": kind.as_str(), "payload": payload });
        let action = serde_json::from_value(tagged).map_err(|e| {
            MedivaultError::InvalidInput(format!("Invalid {kind} payload: {e}"))
        })?;

        Ok(Self::new(id, action))
    }

    /// The kind tag of this action.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        self.action.kind()
    }
}
