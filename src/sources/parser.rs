//! Parsers turning raw namespace content into flat key/value pairs.

use crate::error::Result;
use std::collections::BTreeMap;

#[cfg(feature = "yaml")]
use crate::error::ConfigError;

/// Converts raw namespace content into a flat key/value map.
///
/// Swap parsers at runtime with
/// [`ConfigClient::set_parser`](crate::core::ConfigClient::set_parser).
pub trait ConfigurationParser: Send + Sync {
    /// Parse `raw` into flat key/value pairs.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the content is malformed.
    fn parse(&self, raw: &str) -> Result<BTreeMap<String, String>>;

    /// Get a human-readable name for this parser (for logging/debugging).
    fn name(&self) -> &'static str;
}

/// Parser for `key=value` / `key: value` lines.
///
/// Blank lines and lines starting with `#` or `!` are ignored. A line
/// without a separator is a key with an empty value. Later duplicates win.
///
/// Backslash escapes follow Java properties: `\=`, `\:` and `\\` stand for
/// the literal character, and `\n`, `\r`, `\t` for control characters, so
/// keys may contain separators and values may span lines. [`render`](Self::render)
/// writes the same escapes.
///
/// # Examples
///
/// ```rust
/// use remote_config_watch::sources::{ConfigurationParser, PropertiesParser};
///
/// let parsed = PropertiesParser.parse("# db\nurl = postgres://db\npool: 4").unwrap();
/// assert_eq!(parsed["url"], "postgres://db");
/// assert_eq!(parsed["pool"], "4");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertiesParser;

impl PropertiesParser {
    /// Render a flat map as `key=value` lines in key order, escaping
    /// whatever [`parse`](ConfigurationParser::parse) would otherwise split on.
    pub fn render(properties: &BTreeMap<String, String>) -> String {
        properties
            .iter()
            .map(|(key, value)| format!("{}={}", escape_key(key), escape_value(value)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl ConfigurationParser for PropertiesParser {
    fn parse(&self, raw: &str) -> Result<BTreeMap<String, String>> {
        let mut content = BTreeMap::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let (key, value) = split_entry(line);
            content.insert(unescape(key.trim()), unescape(value.trim()));
        }
        Ok(content)
    }

    fn name(&self) -> &'static str {
        "properties"
    }
}

/// Split at the first unescaped `=` or `:`.
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..index], &line[index + c.len_utf8()..]),
            _ => {}
        }
    }
    (line, "")
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn escape_value(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

fn escape_key(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, c) in text.chars().enumerate() {
        match c {
            '=' | ':' => {
                out.push('\\');
                out.push(c);
            }
            // A leading comment marker would hide the whole line
            '#' | '!' if index == 0 => {
                out.push('\\');
                out.push(c);
            }
            other => out.push_str(&escape_value(&other.to_string())),
        }
    }
    out
}

/// Parser for YAML documents.
///
/// Nested mappings are flattened to dotted keys and sequences to indexed
/// keys, so `server: {ports: [80]}` becomes `server.ports[0] = 80`.
#[cfg(feature = "yaml")]
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlParser;

#[cfg(feature = "yaml")]
impl ConfigurationParser for YamlParser {
    fn parse(&self, raw: &str) -> Result<BTreeMap<String, String>> {
        let document: serde_yaml::Value = serde_yaml::from_str(raw)
            .map_err(|e| ConfigError::ParseError(format!("Invalid YAML: {}", e)))?;

        let mut content = BTreeMap::new();
        match document {
            serde_yaml::Value::Null => {}
            serde_yaml::Value::Mapping(_) => flatten_yaml("", &document, &mut content),
            _ => {
                return Err(ConfigError::ParseError(
                    "Expected a YAML mapping at root level".to_string(),
                ));
            }
        }
        Ok(content)
    }

    fn name(&self) -> &'static str {
        "yaml"
    }
}

#[cfg(feature = "yaml")]
fn flatten_yaml(prefix: &str, value: &serde_yaml::Value, out: &mut BTreeMap<String, String>) {
    use serde_yaml::Value;

    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let key = yaml_scalar(key);
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_yaml(&path, child, out);
            }
        }
        Value::Sequence(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_yaml(&format!("{}[{}]", prefix, index), child, out);
            }
        }
        Value::Tagged(tagged) => flatten_yaml(prefix, &tagged.value, out),
        scalar => {
            out.insert(prefix.to_string(), yaml_scalar(scalar));
        }
    }
}

#[cfg(feature = "yaml")]
fn yaml_scalar(value: &serde_yaml::Value) -> String {
    use serde_yaml::Value;

    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Tagged(tagged) => yaml_scalar(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
