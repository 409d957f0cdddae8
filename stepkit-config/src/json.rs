//! JSON settings codec.

use crate::loose;
use crate::{HandlerConfig, ParseError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    settings: Option<Vec<RawSetting>>,
}

#[derive(Deserialize)]
struct RawSetting {
    name: String,
    #[serde(default)]
    value: Value,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    settings: Vec<SettingRef<'a>>,
}

#[derive(Serialize)]
struct SettingRef<'a> {
    name: &'a str,
    value: &'a str,
}

pub(crate) fn parse(blob: &str) -> Result<HandlerConfig, ParseError> {
    let normalized = loose::normalize(blob);
    let document: Document = serde_json::from_str(&normalized)?;

    let mut config = HandlerConfig::new();
    for raw in document.settings.unwrap_or_default() {
        let value = scalar_text(&raw.name, raw.value)?;
        config.set(raw.name, value);
    }
    Ok(config)
}

pub(crate) fn serialize(config: &HandlerConfig) -> Result<String, ParseError> {
    let document = DocumentRef {
        settings: config
            .iter()
            .map(|setting| SettingRef {
                name: setting.name(),
                value: setting.value(),
            })
            .collect(),
    };
    Ok(serde_json::to_string(&document)?)
}

fn scalar_text(name: &str, value: Value) -> Result<String, ParseError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(text) => Ok(text),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Array(_) | Value::Object(_) => Err(ParseError::Structure(format!(
            "setting '{name}' has a non-scalar value"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_document() {
        let config =
            parse(r#"{"settings":[{"name":"Item1","value":"Value1"},{"name":"Item2","value":"Value2"}]}"#)
                .unwrap();
        assert_eq!(config.get("item1"), Some("Value1"));
        assert_eq!(config.get("item2"), Some("Value2"));
    }

    #[test]
    fn missing_settings_is_empty() {
        assert!(parse("{}").unwrap().is_empty());
        assert!(parse(r#"{"settings": null, "other": 1}"#).unwrap().is_empty());
    }

    #[test]
    fn null_or_missing_value_is_empty_string() {
        let config = parse(r#"{"settings":[{"name":"a","value":null},{"name":"b"}]}"#).unwrap();
        assert_eq!(config.get("a"), Some(""));
        assert_eq!(config.get("b"), Some(""));
    }

    #[test]
    fn scalar_values_are_stringified() {
        let config = parse("{settings:[{name:'n',value:42},{name:'f',value:true}]}").unwrap();
        assert_eq!(config.get("n"), Some("42"));
        assert_eq!(config.get("f"), Some("true"));
    }

    #[test]
    fn missing_or_null_name_is_an_error() {
        assert!(matches!(
            parse(r#"{"settings":[{"value":"x"}]}"#),
            Err(ParseError::Json(_))
        ));
        assert!(matches!(
            parse(r#"{"settings":[{"name":null,"value":"x"}]}"#),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn nested_value_is_an_error() {
        assert!(matches!(
            parse(r#"{"settings":[{"name":"a","value":{"x":1}}]}"#),
            Err(ParseError::Structure(_))
        ));
    }

    #[test]
    fn serialized_shape() {
        let config = HandlerConfig::new().with("a", "1");
        assert_eq!(
            serialize(&config).unwrap(),
            r#"{"settings":[{"name":"a","value":"1"}]}"#
        );
    }
}
