//! HTTP client for the MediVault REST service.

use std::time::Duration;

use reqwest::blocking::{multipart, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::error::ApiError;
use super::types::{
    ApiResponse, AuthResponse, LoginRequest, Patient, PatientRequest, Prescription,
    PrescriptionRequest, PrescriptionUpload,
};
use crate::config::{ApiConfig, SyncConfig};
use crate::error::MedivaultError;
use crate::features::offline::Connectivity;

/// The mutation endpoints a queued action can be delivered to.
///
/// One method per action kind.
#[cfg_attr(test, mockall::automock)]
pub trait RemoteApi {
    /// `POST /patients`
    fn create_patient(&self, request: &PatientRequest) -> Result<Patient, ApiError>;

    /// `PUT /patients/{id}`
    fn update_patient(&self, patient_id: i64, request: &PatientRequest)
        -> Result<Patient, ApiError>;

    /// `DELETE /patients/{id}`
    fn delete_patient(&self, patient_id: i64) -> Result<(), ApiError>;

    /// Multipart `POST /prescriptions/upload`
    fn upload_prescription(&self, upload: &PrescriptionUpload) -> Result<Prescription, ApiError>;

    /// `PUT /prescriptions/{id}`
    fn update_prescription(
        &self,
        prescription_id: i64,
        request: &PrescriptionRequest,
    ) -> Result<Prescription, ApiError>;

    /// `DELETE /prescriptions/{id}`
    fn delete_prescription(&self, prescription_id: i64) -> Result<(), ApiError>;
}

/// Blocking HTTP implementation of [`RemoteApi`].
pub struct HttpApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    probe_timeout: Duration,
}

impl HttpApiClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(api: &ApiConfig, sync: &SyncConfig) -> Result<Self, MedivaultError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .map_err(|e| MedivaultError::Http(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            token: None,
            probe_timeout: Duration::from_secs(sync.probe_timeout_secs),
        })
    }

    /// Attach a bearer token to every request.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Whether a bearer token is attached.
    #[must_use]
    pub const fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// `POST /auth/login`
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the call fails.
    pub fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let request = self.http.post(self.url("/auth/login")).json(credentials);
        Self::send::<AuthResponse>(request)?
            .ok_or_else(|| ApiError::Decode("login response carried no data".to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and unwrap the response envelope.
    fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<Option<T>, ApiError> {
        let response = request.send().map_err(|e| ApiError::from_transport(&e))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                .map(|envelope| envelope.message)
                .unwrap_or(body);
            debug!(status = status.as_u16(), %message, "request failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .map_err(|e| ApiError::Decode(format!("failed to read body: {e}")))?;
        let envelope: ApiResponse<T> = serde_json::from_str(&body)
            .map_err(|e| ApiError::Decode(format!("unexpected response body: {e}")))?;

        if !envelope.success {
            return Err(ApiError::Rejected(envelope.message));
        }

        Ok(envelope.data)
    }

    fn expect_data<T>(data: Option<T>, what: &str) -> Result<T, ApiError> {
        data.ok_or_else(|| ApiError::Decode(format!("{what} response carried no data")))
    }
}

impl RemoteApi for HttpApiClient {
    fn create_patient(&self, request: &PatientRequest) -> Result<Patient, ApiError> {
        let builder = self.authorized(self.http.post(self.url("/patients")).json(request));
        Self::expect_data(Self::send(builder)?, "create patient")
    }

    fn update_patient(
        &self,
        patient_id: i64,
        request: &PatientRequest,
    ) -> Result<Patient, ApiError> {
        let builder = self.authorized(
            self.http
                .put(self.url(&format!("/patients/{patient_id}")))
                .json(request),
        );
        Self::expect_data(Self::send(builder)?, "update patient")
    }

    fn delete_patient(&self, patient_id: i64) -> Result<(), ApiError> {
        let builder =
            self.authorized(self.http.delete(self.url(&format!("/patients/{patient_id}"))));
        Self::send::<serde_json::Value>(builder)?;
        Ok(())
    }

    fn upload_prescription(&self, upload: &PrescriptionUpload) -> Result<Prescription, ApiError> {
        let bytes = std::fs::read(&upload.file_path).map_err(|e| {
            ApiError::InvalidPayload(format!(
                "cannot read {}: {e}",
                upload.file_path.display()
            ))
        })?;

        let file = multipart::Part::bytes(bytes)
            .file_name(upload.effective_file_name())
            .mime_str(&upload.effective_mime_type())
            .map_err(|e| ApiError::InvalidPayload(format!("bad mime type: {e}")))?;

        let form = multipart::Form::new()
            .text("uploadId", upload.upload_id.clone())
            .text("patientId", upload.patient_id.to_string())
            .part("file", file);

        let builder = self.authorized(
            self.http
                .post(self.url("/prescriptions/upload"))
                .multipart(form),
        );
        Self::expect_data(Self::send(builder)?, "upload prescription")
    }

    fn update_prescription(
        &self,
        prescription_id: i64,
        request: &PrescriptionRequest,
    ) -> Result<Prescription, ApiError> {
        let builder = self.authorized(
            self.http
                .put(self.url(&format!("/prescriptions/{prescription_id}")))
                .json(request),
        );
        Self::expect_data(Self::send(builder)?, "update prescription")
    }

    fn delete_prescription(&self, prescription_id: i64) -> Result<(), ApiError> {
        let builder = self.authorized(
            self.http
                .delete(self.url(&format!("/prescriptions/{prescription_id}"))),
        );
        Self::send::<serde_json::Value>(builder)?;
        Ok(())
    }
}

impl Connectivity for HttpApiClient {
    /// Any HTTP answer from the base URL counts as online.
    fn is_online(&self) -> bool {
        match self
            .http
            .head(&self.base_url)
            .timeout(self.probe_timeout)
            .send()
        {
            Ok(response) => {
                debug!(status = response.status().as_u16(), "connectivity probe answered");
                true
            }
            Err(e) => {
                info!(base_url = %self.base_url, error = %e, "backend unreachable");
                false
            }
        }
    }
}
