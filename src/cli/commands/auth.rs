//! Session commands.

use colored::Colorize;
use serde_json::json;
use tracing::info;

use super::Context;
use crate::api::{ApiError, FailureClass, HttpApiClient, LoginRequest};
use crate::cli::args::OutputFormat;
use crate::error::MedivaultError;
use crate::output::{format_user, to_json};

/// Sign in and store the session token.
///
/// # Errors
///
/// Returns `AuthRequired` if the credentials are rejected, or an error if the
/// server cannot be reached or the session cannot be stored.
pub fn login(ctx: &Context, email: &str, password: &str) -> Result<String, MedivaultError> {
    let client = HttpApiClient::new(&ctx.config.api, &ctx.config.sync)?;
    let credentials = LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    };

    let auth = client.login(&credentials).map_err(login_error)?;
    let user = ctx.session()?.save(&auth)?;
    info!(user_id = user.user_id, "session stored");

    match ctx.format {
        OutputFormat::Json => format_user(Some(&user), ctx.format),
        OutputFormat::Pretty => Ok(format!(
            "{} Logged in as {} <{}>",
            "✓".green(),
            user.name.bold(),
            user.email
        )),
    }
}

fn login_error(e: ApiError) -> MedivaultError {
    match (&e, e.class()) {
        (ApiError::Rejected(_), _) | (_, FailureClass::AuthRequired) => {
            MedivaultError::AuthRequired("Invalid email or password".to_string())
        }
        (ApiError::Status { status, message }, FailureClass::Permanent) => {
            MedivaultError::InvalidInput(format!("Login rejected (HTTP {status}): {message}"))
        }
        _ => MedivaultError::Http(e.to_string()),
    }
}

/// Forget the stored session. Queued actions are kept.
///
/// # Errors
///
/// Returns an error if the session cannot be removed.
pub fn logout(ctx: &Context) -> Result<String, MedivaultError> {
    let had_session = ctx.session()?.clear()?;

    match ctx.format {
        OutputFormat::Json => to_json(&json!({ "loggedOut": had_session })),
        OutputFormat::Pretty => Ok(if had_session {
            "Logged out".to_string()
        } else {
            "Not logged in".to_string()
        }),
    }
}

/// Show the signed-in user.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub fn whoami(ctx: &Context) -> Result<String, MedivaultError> {
    let user = ctx.session()?.user()?;
    format_user(user.as_ref(), ctx.format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_error_mapping() {
        let bad_password = ApiError::Status {
            status: 401,
            message: "Bad credentials".into(),
        };
        assert!(matches!(
            login_error(bad_password),
            MedivaultError::AuthRequired(_)
        ));

        assert!(matches!(
            login_error(ApiError::Rejected("Invalid credentials".into())),
            MedivaultError::AuthRequired(_)
        ));

        let validation = ApiError::Status {
            status: 400,
            message: "Email is required".into(),
        };
        assert!(matches!(login_error(validation), MedivaultError::InvalidInput(_)));

        assert!(matches!(
            login_error(ApiError::Network("refused".into())),
            MedivaultError::Http(_)
        ));
    }
}
