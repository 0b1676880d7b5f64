//! Remote API collaborator.
//!
//! The offline queue delivers its entries through [`RemoteApi`]. The HTTP
//! implementation talks to the MediVault REST service; failures are reported
//! as [`ApiError`] and classified with [`ApiError::class`].

mod client;
mod error;
pub mod session;
pub mod types;

pub use client::{HttpApiClient, RemoteApi};
#[cfg(test)]
pub use client::MockRemoteApi;
pub use error::{classify_status, ApiError, FailureClass};
pub use session::{Session, SessionUser};
pub use types::{
    AuthResponse, Gender, LoginRequest, Medicine, Patient, PatientRequest, Prescription,
    PrescriptionRequest, PrescriptionUpload,
};
