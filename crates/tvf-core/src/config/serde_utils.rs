//! Shared serde helpers for configuration

/// Serialize `std::time::Duration` as whole seconds.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Config {
///     #[serde(with = "tvf_core::config::serde_utils::duration_secs")]
///     window: Duration,
/// }
///
/// let config: Config = toml::from_str("window = 300").unwrap();
/// assert_eq!(config.window, Duration::from_secs(300));
/// ```
pub mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a Duration as seconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize a Duration from seconds (u64)
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Window {
        #[serde(with = "duration_secs")]
        stale: Duration,
    }

    #[test]
    fn test_duration_secs_serialize() {
        let window = Window {
            stale: Duration::from_secs(300),
        };
        assert_eq!(serde_json::to_string(&window).unwrap(), r#"{"stale":300}"#);
    }

    #[test]
    fn test_duration_secs_rejects_negative() {
        assert!(serde_json::from_str::<Window>(r#"{"stale":-5}"#).is_err());
    }

    #[test]
    fn test_duration_secs_truncates_subsecond() {
        let window = Window {
            stale: Duration::from_millis(1500),
        };
        let json = serde_json::to_string(&window).unwrap();
        let parsed: Window = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.stale, Duration::from_secs(1));
    }
}
