use std::fmt;

/// Application-specific errors, tagged with the taxonomy a Gemini handler
/// needs to pick a status line: every variant knows its own status code and
/// the short prose that is safe to put on the wire, while the full detail
/// stays server-side in the log line that produced it.
#[derive(Debug)]
pub enum AppError {
    /// Wrap anyhow errors for backward compatibility; treated as StorageFail
    /// unless the call site already mapped it to something more specific.
    Anyhow(anyhow::Error),

    /// Malformed URL, bad regex, decode failure, throttle hit, quota hit,
    /// duplicate mutation, already-moved actor.
    BadInput(String),
    /// Unknown actor, no follow row to undo.
    NotFound(String),
    /// Route requires a client certificate and none was presented.
    AuthRequired,
    /// The Resolver collaborator failed to produce an actor.
    ResolveFail(String),
    /// Database error or transaction failure.
    StorageFail(String),
    /// The Outbox collaborator failed to enqueue or apply a mutation.
    FederationFail(String),
}

impl AppError {
    /// The `(code, meta)` pair a handler writes via the Response Writer.
    pub fn gemini_status(&self) -> (u32, String) {
        match self {
            AppError::Anyhow(err) => (50, format!("Error: {err}")),
            AppError::BadInput(msg) => (40, msg.clone()),
            AppError::NotFound(resource) => (40, format!("{resource} not found")),
            AppError::AuthRequired => (61, "Client certificate required".to_string()),
            AppError::ResolveFail(input) => (40, format!("Failed to resolve {input}")),
            AppError::StorageFail(_) => (50, "Error".to_string()),
            AppError::FederationFail(_) => (50, "Error".to_string()),
        }
    }

    /// Log level + structured fields to record before the coarse status
    /// crosses the wire. Callers pass the fields they have on hand; this
    /// just picks Warn vs Error.
    pub fn is_server_fault(&self) -> bool {
        matches!(
            self,
            AppError::Anyhow(_) | AppError::StorageFail(_) | AppError::FederationFail(_)
        )
    }

    pub fn bad_input(msg: impl Into<String>) -> Self {
        AppError::BadInput(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        AppError::StorageFail(msg.into())
    }

    pub fn federation(msg: impl Into<String>) -> Self {
        AppError::FederationFail(msg.into())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Anyhow(err) => write!(f, "{}", err),
            AppError::BadInput(msg) => write!(f, "bad input: {}", msg),
            AppError::NotFound(resource) => write!(f, "{} not found", resource),
            AppError::AuthRequired => write!(f, "client certificate required"),
            AppError::ResolveFail(input) => write!(f, "failed to resolve {}", input),
            AppError::StorageFail(msg) => write!(f, "storage error: {}", msg),
            AppError::FederationFail(msg) => write!(f, "federation error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

// This enables using `?` on functions that return `Result<_, anyhow::Error>` to turn them into
// `Result<_, AppError>`. That way you don't need to do that manually.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::StorageFail(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Anyhow(err)
    }
}

/// Writer calls only fail when the TLS connection itself breaks; there is no
/// status line left to send at that point, so this only matters for the
/// `?` operator to type-check inside a handler body.
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Anyhow(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_input_maps_to_status_40() {
        let err = AppError::bad_input("Following too many users");
        assert_eq!(
            err.gemini_status(),
            (40, "Following too many users".to_string())
        );
    }

    #[test]
    fn auth_required_maps_to_status_61() {
        assert_eq!(
            AppError::AuthRequired.gemini_status(),
            (61, "Client certificate required".to_string())
        );
    }

    #[test]
    fn resolve_fail_includes_the_input() {
        let err = AppError::ResolveFail("bob@other.example".to_string());
        let (code, meta) = err.gemini_status();
        assert_eq!(code, 40);
        assert_eq!(meta, "Failed to resolve bob@other.example");
    }

    #[test]
    fn storage_fail_is_a_server_fault_and_hides_detail() {
        let err = AppError::storage("connection reset");
        assert!(err.is_server_fault());
        assert_eq!(err.gemini_status(), (50, "Error".to_string()));
    }
}
