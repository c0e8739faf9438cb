//! Environment variable parsing with warn-level logging for invalid values.

/// Source of raw setting values, keyed by variable name.
pub trait EnvLookup {
    fn get(&self, var: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn get(&self, var: &str) -> Option<String> {
        std::env::var(var).ok()
    }
}

impl<F> EnvLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, var: &str) -> Option<String> {
        self(var)
    }
}

/// Parse a variable with a default fallback.
///
/// - If the variable is not set: returns `default` silently (expected case).
/// - If the variable is set but cannot be parsed: logs a warning and returns `default`.
pub fn parse_with_default<T, L>(env: &L, var: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
    L: EnvLookup + ?Sized,
{
    match env.get(var) {
        Some(v) => match v.trim().parse() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(
                    var,
                    value = %v,
                    default = %default,
                    "invalid env var value, using default"
                );
                default
            },
        },
        None => default,
    }
}

/// Boolean flag accepting `true`/`false` (any case), `1`/`0`, `yes`/`no`.
pub fn flag_with_default<L>(env: &L, var: &str, default: bool) -> bool
where
    L: EnvLookup + ?Sized,
{
    match env.get(var) {
        Some(v) => match v.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => {
                tracing::warn!(var, value = %v, default, "invalid boolean env var, using default");
                default
            },
        },
        None => default,
    }
}

/// Non-empty string value; blank values count as unset.
pub fn non_empty<L>(env: &L, var: &str) -> Option<String>
where
    L: EnvLookup + ?Sized,
{
    env.get(var).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn test_parse_valid_value() {
        let env = lookup(&[("LIMIT", "42")]);
        let result: u32 = parse_with_default(&env, "LIMIT", 10);
        assert_eq!(result, 42);
    }

    #[test]
    fn test_parse_invalid_value() {
        let env = lookup(&[("LIMIT", "banana")]);
        let result: u32 = parse_with_default(&env, "LIMIT", 10);
        assert_eq!(result, 10);
    }

    #[test]
    fn test_parse_missing_var() {
        let env = lookup(&[]);
        let result: f64 = parse_with_default(&env, "INTERVAL", 1.5);
        assert!((result - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_empty_value() {
        let env = lookup(&[("LIMIT", "")]);
        let result: u32 = parse_with_default(&env, "LIMIT", 10);
        assert_eq!(result, 10);
    }

    #[test]
    fn test_flag_values() {
        let env = lookup(&[("A", "TRUE"), ("B", "no"), ("C", "maybe")]);
        assert!(flag_with_default(&env, "A", false));
        assert!(!flag_with_default(&env, "B", true));
        assert!(flag_with_default(&env, "C", true));
        assert!(!flag_with_default(&env, "D", false));
    }

    #[test]
    fn test_non_empty_treats_blank_as_unset() {
        let env = lookup(&[("KEY", "  "), ("URL", " https://x ")]);
        assert_eq!(non_empty(&env, "KEY"), None);
        assert_eq!(non_empty(&env, "URL").as_deref(), Some("https://x"));
    }
}
