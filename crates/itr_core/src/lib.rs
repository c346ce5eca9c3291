pub mod clock;
pub mod db;
pub mod domain;
pub mod error;
pub mod export;
pub mod lifecycle;
pub mod report;
pub mod seed;
pub mod store;

#[cfg(test)]
mod tests {
    use super::error::{AppError, ErrorKind};

    #[test]
    fn app_error_is_structured() {
        let err = AppError::new("DB_TEST", "db failed").with_retryable(false);
        assert_eq!(err.kind, ErrorKind::Storage);
        assert_eq!(err.code, "DB_TEST");
        assert_eq!(err.message, "db failed");
        assert_eq!(err.retryable, false);
        assert_eq!(err.to_string(), "[DB_TEST] db failed");
    }

    #[test]
    fn app_error_kind_serializes_snake_case() {
        let err = AppError::empty_result("EXPORT_EMPTY", "No incidents to export");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "empty_result");
        assert_eq!(json["details"], serde_json::Value::Null);
    }
}
