//! Environment variable interpolation for config files.
//!
//! Supports the following syntax:
//! - `$VAR` or `${VAR}` - substitute with env var value, error if missing
//! - `${VAR:-default}` - use default if VAR is unset OR empty
//! - `${VAR-default}` - use default only if VAR is unset (empty is OK)
//! - `$$` - escape sequence for literal `$`

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::error::ConfigError;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$                           # escaped dollar
        |
        \$\{
            (?P<braced>[A-Za-z_][A-Za-z0-9_]*)
            (?: (?P<op>:?-) (?P<default>[^}]*) )?
        \}
        |
        \$(?P<bare>[A-Za-z_][A-Za-z0-9_]*)
        ",
    )
    .expect("valid interpolation pattern")
});

/// Interpolate environment variables in `input` using the process environment.
///
/// Every missing variable is reported at once in the returned error.
pub fn interpolate(input: &str) -> Result<String, ConfigError> {
    interpolate_with(input, |name| std::env::var(name).ok())
}

/// Interpolate using a custom variable lookup.
pub fn interpolate_with<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN.replace_all(input, |caps: &Captures| {
        let whole = &caps[0];
        if whole == "$$" {
            return "$".to_string();
        }

        let name = caps
            .name("braced")
            .or_else(|| caps.name("bare"))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let op = caps.name("op").map(|m| m.as_str());
        let default = caps.name("default").map(|m| m.as_str());

        match (lookup(name), default) {
            (Some(value), _) if value.contains(['\n', '\r']) => {
                errors.push(format!("environment variable '{name}' contains newlines"));
                whole.to_string()
            }
            (Some(value), Some(default)) if value.is_empty() && op == Some(":-") => {
                default.to_string()
            }
            (Some(value), _) => value,
            (None, Some(default)) => default.to_string(),
            (None, None) => {
                errors.push(format!("environment variable '{name}' is not set"));
                whole.to_string()
            }
        }
    });

    if errors.is_empty() {
        Ok(text.into_owned())
    } else {
        Err(ConfigError::EnvInterpolation {
            message: errors.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_bare_and_braced_substitution() {
        let env = lookup(&[("WAREHOUSE", "s3://lake"), ("REGION", "ap-southeast-2")]);
        let text = interpolate_with("uri: $WAREHOUSE/${REGION}", env).unwrap();
        assert_eq!(text, "uri: s3://lake/ap-southeast-2");
    }

    #[test]
    fn test_missing_variables_are_all_reported() {
        let err = interpolate_with("a: $FIRST\nb: ${SECOND}", lookup(&[])).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("FIRST"));
        assert!(message.contains("SECOND"));
    }

    #[test]
    fn test_colon_default_applies_to_empty() {
        let env = lookup(&[("EMPTY", "")]);
        assert_eq!(
            interpolate_with("v: ${EMPTY:-fallback}", env).unwrap(),
            "v: fallback"
        );
    }

    #[test]
    fn test_dash_default_keeps_empty() {
        let env = lookup(&[("EMPTY", "")]);
        assert_eq!(interpolate_with("v: ${EMPTY-fallback}", env).unwrap(), "v: ");
        assert_eq!(
            interpolate_with("v: ${UNSET-fallback}", lookup(&[])).unwrap(),
            "v: fallback"
        );
    }

    #[test]
    fn test_newline_injection_rejected() {
        let env = lookup(&[("BAD", "a\nb: c")]);
        assert!(interpolate_with("v: $BAD", env).is_err());
    }

    #[test]
    fn test_escape_sequence() {
        assert_eq!(interpolate_with("price: $$100", lookup(&[])).unwrap(), "price: $100");
    }
}
