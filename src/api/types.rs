//! Request and response types for the MediVault REST service.
//!
//! Field names are camelCase on the wire to match the backend DTOs.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Response envelope returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

/// Patient gender as accepted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Body for creating or updating a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRequest {
    pub name: String,
    pub dob: NaiveDate,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
}

/// A patient record as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub relationship: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A medicine line on a prescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub duration: String,
}

/// Body for editing a prescription's extracted details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescription_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
}

/// A prescription image waiting to be uploaded.
///
/// The backend deduplicates on `upload_id`, so replaying the same upload
/// returns the existing prescription instead of creating a second one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionUpload {
    pub upload_id: String,
    pub patient_id: i64,
    /// Local file read at delivery time.
    pub file_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl PrescriptionUpload {
    /// File name sent in the multipart body.
    #[must_use]
    pub fn effective_file_name(&self) -> String {
        self.file_name.clone().unwrap_or_else(|| {
            self.file_path
                .file_name()
                .map_or_else(|| "prescription".to_string(), |n| n.to_string_lossy().into_owned())
        })
    }

    /// MIME type sent in the multipart body, guessed from the extension when unset.
    #[must_use]
    pub fn effective_mime_type(&self) -> String {
        if let Some(mime) = &self.mime_type {
            return mime.clone();
        }
        let ext = self
            .file_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "heic" => "image/heic",
            "pdf" => "application/pdf",
            _ => "application/octet-stream",
        }
        .to_string()
    }
}

/// A prescription as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: i64,
    #[serde(default)]
    pub upload_id: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub patient_id: Option<i64>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    #[serde(default)]
    pub analysis_status: Option<String>,
    #[serde(default)]
    pub risk_level: Option<String>,
}

/// Credentials for `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Result of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    #[serde(rename = "type", default)]
    pub token_type: Option<String>,
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_request_wire_format() {
        let request = PatientRequest {
            name: "Jane".to_string(),
            dob: NaiveDate::from_ymd_opt(1990, 4, 2).unwrap(),
            gender: Gender::Female,
            blood_group: Some("O+".to_string()),
            allergies: None,
            relationship: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["dob"], "1990-04-02");
        assert_eq!(json["gender"], "FEMALE");
        assert_eq!(json["bloodGroup"], "O+");
        assert!(json.get("allergies").is_none());
    }

    #[test]
    fn test_envelope_with_null_data() {
        let body = r#"{"success":true,"message":"Patient deleted successfully","data":null}"#;
        let envelope: ApiResponse<serde_json::Value> = serde_json::from_str(body).unwrap();
        assert!(envelope.success);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_auth_response_type_field() {
        let body = r#"{"token":"t","type":"Bearer","userId":7,"email":"a@b.c","name":"A","role":"DOCTOR"}"#;
        let auth: AuthResponse = serde_json::from_str(body).unwrap();
        assert_eq!(auth.token_type.as_deref(), Some("Bearer"));
        assert_eq!(auth.user_id, 7);
    }

    #[test]
    fn test_upload_defaults_from_path() {
        let upload = PrescriptionUpload {
            upload_id: "u1".to_string(),
            patient_id: 3,
            file_path: PathBuf::from("/tmp/scans/rx-0412.JPG"),
            file_name: None,
            mime_type: None,
        };
        assert_eq!(upload.effective_file_name(), "rx-0412.JPG");
        assert_eq!(upload.effective_mime_type(), "image/jpeg");
    }
}
