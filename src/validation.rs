/// Log levels accepted by the logging layer.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validates that a value is finite and strictly positive.
///
/// # Arguments
///
/// * `value` - The value to validate.
///
/// # Returns
///
/// * `Ok(())` if the value is positive.
/// * `Err(&'static str)` if the value is zero, negative, NaN or infinite.
pub fn is_positive(value: f64) -> Result<(), &'static str> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err("Value must be positive and finite")
    }
}

/// Validates that a smoothing window is odd and at least 3 samples long.
pub fn is_odd_window(window: usize) -> Result<(), &'static str> {
    if window < 3 {
        Err("Window must be at least 3 samples")
    } else if window % 2 == 0 {
        Err("Window must be odd")
    } else {
        Ok(())
    }
}

/// Validates a log level name (case-insensitive).
pub fn is_log_level(level: &str) -> Result<(), String> {
    if LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(format!(
            "Invalid log_level '{}'. Must be one of: {}",
            level,
            LOG_LEVELS.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_positive() {
        assert!(is_positive(58.0).is_ok());
        assert!(is_positive(0.0).is_err());
        assert!(is_positive(-1.0).is_err());
        assert!(is_positive(f64::NAN).is_err());
        assert!(is_positive(f64::INFINITY).is_err());
    }

    #[test]
    fn test_is_odd_window() {
        assert!(is_odd_window(3).is_ok());
        assert!(is_odd_window(31).is_ok());
        assert!(is_odd_window(1).is_err());
        assert!(is_odd_window(4).is_err());
    }

    #[test]
    fn test_is_log_level() {
        assert!(is_log_level("INFO").is_ok());
        assert!(is_log_level("verbose").is_err());
    }
}
