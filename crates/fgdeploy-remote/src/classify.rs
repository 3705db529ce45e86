use crate::operation::ApiResponse;

/// Error code the platform returns when a code update would not change the
/// stored package.
pub const CODE_UNCHANGED: &str = "FSS.0409";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The call was refused because it would not alter stored state.
    NoOpConflict,
    Failure,
}

impl Outcome {
    /// Success and no-op conflicts both count as applied.
    pub fn is_applied(self) -> bool {
        !matches!(self, Outcome::Failure)
    }
}

/// Classify a response by status and error code.
pub fn classify(response: &ApiResponse) -> Outcome {
    if response.is_success() {
        Outcome::Success
    } else if response.error_code.as_deref() == Some(CODE_UNCHANGED) {
        Outcome::NoOpConflict
    } else {
        Outcome::Failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn two_hundreds_are_success() {
        for status in [200, 201, 204, 299] {
            assert_eq!(classify(&ApiResponse::ok(status, Value::Null)), Outcome::Success);
        }
    }

    #[test]
    fn unchanged_code_is_noop_conflict() {
        let response = ApiResponse::error(409, CODE_UNCHANGED, "code not changed");
        assert_eq!(classify(&response), Outcome::NoOpConflict);
        assert!(classify(&response).is_applied());
    }

    #[test]
    fn sentinel_is_recognized_regardless_of_status() {
        let response = ApiResponse::error(400, CODE_UNCHANGED, "");
        assert_eq!(classify(&response), Outcome::NoOpConflict);
    }

    #[test]
    fn other_errors_fail() {
        let response = ApiResponse::error(409, "FSS.1061", "function already exists");
        assert_eq!(classify(&response), Outcome::Failure);
        assert!(!Outcome::Failure.is_applied());
        let bare = ApiResponse::from_parts(500, Value::Null);
        assert_eq!(classify(&bare), Outcome::Failure);
    }
}
