//! `${VAR}` interpolation for sources files
//!
//! Substitution runs on parsed YAML string values, never on keys or comments.
//! Substituted values are always strings, so a token made only of digits stays
//! a token. Numeric settings accept their string form during validation.

use regex::Regex;
use std::sync::OnceLock;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid variable pattern")
    })
}

/// Replace every `${VAR}` in `input`
///
/// Returns the name of the first variable `lookup` cannot resolve.
pub fn interpolate(
    input: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<String, String> {
    let mut output = String::with_capacity(input.len());
    let mut last = 0;

    for captures in pattern().captures_iter(input) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let value = lookup(name.as_str()).ok_or_else(|| name.as_str().to_string())?;
        output.push_str(&input[last..whole.start()]);
        output.push_str(&value);
        last = whole.end();
    }

    output.push_str(&input[last..]);
    Ok(output)
}

/// Interpolate every string inside a YAML value, in place
pub fn interpolate_yaml(
    value: &mut serde_yaml::Value,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<(), String> {
    match value {
        serde_yaml::Value::String(s) => {
            if !pattern().is_match(s) {
                return Ok(());
            }
            *s = interpolate(s, lookup)?;
            Ok(())
        }
        serde_yaml::Value::Sequence(items) => {
            for item in items {
                interpolate_yaml(item, lookup)?;
            }
            Ok(())
        }
        serde_yaml::Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                interpolate_yaml(item, lookup)?;
            }
            Ok(())
        }
        serde_yaml::Value::Tagged(tagged) => interpolate_yaml(&mut tagged.value, lookup),
        _ => Ok(()),
    }
}

/// Resolve variables from the process environment
pub fn from_process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
