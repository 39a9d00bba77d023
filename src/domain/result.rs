//! Result type alias for Stowage

use super::errors::StowageError;

/// Result type alias for Stowage operations
///
/// # Examples
///
/// ```
/// use stowage::domain::result::Result;
/// use stowage::domain::errors::StowageError;
///
/// fn failing_function() -> Result<()> {
///     Err(StowageError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, StowageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }

    #[test]
    fn test_result_err() {
        let result: Result<i32> = Err(StowageError::Validation("test error".to_string()));
        assert!(result.is_err());
    }
}
