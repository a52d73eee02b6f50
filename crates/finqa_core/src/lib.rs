pub mod config;
pub mod error;
pub mod store;

#[cfg(test)]
mod tests {
    use super::error::AppError;

    #[test]
    fn app_error_is_structured() {
        let err = AppError::new("STORE_TEST", "store failed").with_retryable(false);
        assert_eq!(err.code, "STORE_TEST");
        assert_eq!(err.message, "store failed");
        assert_eq!(err.retryable, false);
    }

    #[test]
    fn transport_errors_are_retryable() {
        let err = AppError::transport("LLM_TRANSPORT_FAILED", "model unreachable");
        assert!(err.retryable);
        assert!(err.is_code("LLM_TRANSPORT_FAILED"));
    }
}
