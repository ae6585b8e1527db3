use serde::Serialize;

/// Tagged union returned from every fallible network operation, per §3.
/// Replaces exception-driven control flow with an explicit result value
/// the caller must inspect.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ApiResult<T> {
    Success { data: T, status_code: u16 },
    Error {
        message: String,
        status_code: Option<u16>,
        cause: Option<String>,
    },
}

impl<T> ApiResult<T> {
    pub fn success(data: T, status_code: u16) -> Self {
        Self::Success { data, status_code }
    }

    pub fn error(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Error {
            message: message.into(),
            status_code,
            cause: None,
        }
    }

    pub fn error_with_cause(
        message: impl Into<String>,
        status_code: Option<u16>,
        cause: impl Into<String>,
    ) -> Self {
        Self::Error {
            message: message.into(),
            status_code,
            cause: Some(cause.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Success { status_code, .. } => Some(*status_code),
            Self::Error { status_code, .. } => *status_code,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Error { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_reports_data_and_status() {
        let r = ApiResult::success("hi".to_string(), 200);
        assert!(r.is_success());
        assert_eq!(r.status_code(), Some(200));
        assert_eq!(r.into_data(), Some("hi".to_string()));
    }

    #[test]
    fn error_carries_message_and_optional_cause() {
        let r: ApiResult<()> = ApiResult::error_with_cause("boom", Some(401), "bad key");
        assert!(!r.is_success());
        assert_eq!(r.status_code(), Some(401));
    }
}
