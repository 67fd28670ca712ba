/// Get environment variable with PAWPASS_ prefix, falling back to unprefixed version
///
/// This helper function checks for `PAWPASS_{key}` first, then falls back to `{key}`
/// for compatibility with standard environment variable naming.
///
/// # Examples
///
/// ```rust,ignore
/// // Checks PAWPASS_LOG_LEVEL first, then LOG_LEVEL
/// let level = get_env_with_prefix("LOG_LEVEL");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("PAWPASS_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Serializes tests that mutate the process environment.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        // Test with PAWPASS_ prefix
        unsafe {
            std::env::set_var("PAWPASS_ENV_TEST_VAR", "prefixed_value");
        }
        assert_eq!(get_env_with_prefix("ENV_TEST_VAR"), Some("prefixed_value".to_string()));
        unsafe {
            std::env::remove_var("PAWPASS_ENV_TEST_VAR");
        }

        // Test with unprefixed fallback
        unsafe {
            std::env::set_var("FALLBACK_TEST_VAR", "unprefixed_value");
        }
        assert_eq!(get_env_with_prefix("FALLBACK_TEST_VAR"), Some("unprefixed_value".to_string()));
        unsafe {
            std::env::remove_var("FALLBACK_TEST_VAR");
        }

        // Test non-existent variable
        assert_eq!(get_env_with_prefix("NON_EXISTENT_TEST_VAR"), None);
    }
}
