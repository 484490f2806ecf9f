use crate::error::DispatchError;
use crate::params::ParamSource;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Number, Value};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

/// Describes the parameter a pipe is transforming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentMetadata {
    pub name: String,
    pub source: ParamSource,
    pub key: Option<String>,
}

/// A value transform or validator applied to one resolved parameter.
///
/// A rejected value must be reported as [`DispatchError::ParamValidation`] so it surfaces
/// as a 400.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Pipe: Send + Sync {
    async fn transform(&self, value: Value, metadata: &ArgumentMetadata) -> Result<Value, DispatchError>;
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parses a string as a signed integer. Null passes through.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseIntPipe;

#[async_trait]
impl Pipe for ParseIntPipe {
    async fn transform(&self, value: Value, metadata: &ArgumentMetadata) -> Result<Value, DispatchError> {
        if value.is_null() || value.is_i64() || value.is_u64() {
            return Ok(value);
        }

        let parsed = match &value {
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };

        parsed.map(Value::from).ok_or_else(|| {
            DispatchError::param_validation(
                &metadata.name,
                format!("Invalid value for parameter '{}': {}. Expected an integer.", metadata.name, display(&value)),
            )
        })
    }
}

/// Parses a string as a finite float. Null passes through.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseFloatPipe;

#[async_trait]
impl Pipe for ParseFloatPipe {
    async fn transform(&self, value: Value, metadata: &ArgumentMetadata) -> Result<Value, DispatchError> {
        if value.is_null() || value.is_number() {
            return Ok(value);
        }

        let parsed = match &value {
            Value::String(s) => s.trim().parse::<f64>().ok().and_then(Number::from_f64),
            _ => None,
        };

        parsed
            .map(Value::Number)
            .ok_or_else(|| DispatchError::param_validation(&metadata.name, format!("Invalid float value: {}", display(&value))))
    }
}

const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];
const FALSY: [&str; 4] = ["false", "0", "no", "off"];

/// Accepts `true/1/yes/on` and `false/0/no/off`, case insensitive. Null passes through.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseBoolPipe;

#[async_trait]
impl Pipe for ParseBoolPipe {
    async fn transform(&self, value: Value, metadata: &ArgumentMetadata) -> Result<Value, DispatchError> {
        if value.is_null() || value.is_boolean() {
            return Ok(value);
        }

        let text = display(&value).trim().to_ascii_lowercase();
        if TRUTHY.contains(&text.as_str()) {
            Ok(Value::Bool(true))
        } else if FALSY.contains(&text.as_str()) {
            Ok(Value::Bool(false))
        } else {
            Err(DispatchError::param_validation(&metadata.name, format!("Invalid boolean value: {}", display(&value))))
        }
    }
}

/// Splits a delimited string into an array, optionally piping every item.
#[derive(Clone)]
pub struct ParseArrayPipe {
    delimiter: String,
    item_pipe: Option<Arc<dyn Pipe>>,
}

impl Default for ParseArrayPipe {
    fn default() -> Self {
        Self::new(",")
    }
}

impl std::fmt::Debug for ParseArrayPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseArrayPipe")
            .field("delimiter", &self.delimiter)
            .field("item_pipe", &self.item_pipe.is_some())
            .finish()
    }
}

impl ParseArrayPipe {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self { delimiter: delimiter.into(), item_pipe: None }
    }

    pub fn item_pipe<P: Pipe + 'static>(mut self, pipe: P) -> Self {
        self.item_pipe = Some(Arc::new(pipe));
        self
    }
}

#[async_trait]
impl Pipe for ParseArrayPipe {
    async fn transform(&self, value: Value, metadata: &ArgumentMetadata) -> Result<Value, DispatchError> {
        if value.is_null() {
            return Ok(value);
        }

        let items: Vec<Value> = match &value {
            Value::Array(items) => items.clone(),
            Value::String(s) if s.is_empty() => Vec::new(),
            Value::String(s) => s.split(self.delimiter.as_str()).map(|item| Value::String(item.trim().to_string())).collect(),
            other => {
                return Err(DispatchError::param_validation(
                    &metadata.name,
                    format!("Invalid array value: {}", display(other)),
                ));
            }
        };

        let Some(item_pipe) = &self.item_pipe else {
            return Ok(Value::Array(items));
        };

        let mut piped = Vec::with_capacity(items.len());
        for item in items {
            let item = item_pipe.transform(item, metadata).await.map_err(|e| {
                DispatchError::param_validation(&metadata.name, format!("Invalid array value: {}. {e}", display(&value)))
            })?;
            piped.push(item);
        }
        Ok(Value::Array(piped))
    }
}

/// Replaces a missing value.
#[derive(Debug, Clone)]
pub struct DefaultValuePipe {
    default: Value,
}

impl DefaultValuePipe {
    pub fn new(default: impl Into<Value>) -> Self {
        Self { default: default.into() }
    }
}

#[async_trait]
impl Pipe for DefaultValuePipe {
    async fn transform(&self, value: Value, _metadata: &ArgumentMetadata) -> Result<Value, DispatchError> {
        Ok(if value.is_null() { self.default.clone() } else { value })
    }
}

/// Rejects anything but a non-empty string.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateNonEmptyPipe;

#[async_trait]
impl Pipe for ValidateNonEmptyPipe {
    async fn transform(&self, value: Value, metadata: &ArgumentMetadata) -> Result<Value, DispatchError> {
        if value.as_str().is_some_and(|s| !s.is_empty()) {
            Ok(value)
        } else {
            Err(DispatchError::param_validation(&metadata.name, "Value must be a non-empty string"))
        }
    }
}

/// Parses a JSON document carried as a string, e.g. in a query parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonToValuePipe;

#[async_trait]
impl Pipe for JsonToValuePipe {
    async fn transform(&self, value: Value, metadata: &ArgumentMetadata) -> Result<Value, DispatchError> {
        match value {
            Value::String(s) => serde_json::from_str(&s)
                .map_err(|_| DispatchError::param_validation(&metadata.name, "Invalid JSON format")),
            other => Ok(other),
        }
    }
}

/// Parses a UUID in any of its textual forms into the hyphenated lowercase form.
/// Null passes through.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseUuidPipe;

#[async_trait]
impl Pipe for ParseUuidPipe {
    async fn transform(&self, value: Value, metadata: &ArgumentMetadata) -> Result<Value, DispatchError> {
        if value.is_null() {
            return Ok(value);
        }

        value
            .as_str()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(|uuid| Value::String(uuid.hyphenated().to_string()))
            .ok_or_else(|| {
                DispatchError::param_validation(
                    &metadata.name,
                    format!("Invalid value for parameter '{}': {}. Expected a valid UUID.", metadata.name, display(&value)),
                )
            })
    }
}

/// Parses a date, or a date and time, with a `strftime` style format (`%Y-%m-%d` by
/// default) into its ISO 8601 form. Null passes through.
#[derive(Debug, Clone)]
pub struct ParseDatePipe {
    format: String,
}

impl Default for ParseDatePipe {
    fn default() -> Self {
        Self::new("%Y-%m-%d")
    }
}

impl ParseDatePipe {
    pub fn new(format: impl Into<String>) -> Self {
        Self { format: format.into() }
    }

    fn parse(&self, text: &str) -> Option<Value> {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, &self.format) {
            return serde_json::to_value(datetime).ok();
        }
        NaiveDate::parse_from_str(text, &self.format).ok().and_then(|date| serde_json::to_value(date).ok())
    }
}

#[async_trait]
impl Pipe for ParseDatePipe {
    async fn transform(&self, value: Value, metadata: &ArgumentMetadata) -> Result<Value, DispatchError> {
        if value.is_null() {
            return Ok(value);
        }

        value.as_str().and_then(|s| self.parse(s.trim())).ok_or_else(|| {
            DispatchError::param_validation(
                &metadata.name,
                format!("Invalid date value: {}. Expected format: {}", display(&value), self.format),
            )
        })
    }
}

/// Accepts a value only when the predicate holds.
pub struct ValidationPipe<F> {
    predicate: F,
    message: String,
}

impl<F> ValidationPipe<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    pub fn new(predicate: F) -> Self {
        Self { predicate, message: "Validation failed".to_string() }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl<F> fmt::Debug for ValidationPipe<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationPipe").field("message", &self.message).finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Pipe for ValidationPipe<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    async fn transform(&self, value: Value, metadata: &ArgumentMetadata) -> Result<Value, DispatchError> {
        if (self.predicate)(&value) {
            Ok(value)
        } else {
            Err(DispatchError::param_validation(&metadata.name, &self.message))
        }
    }
}

/// Validates a value against a typed schema by deserializing it into `T`. The value is
/// replaced by `T` serialized back, so defaults declared on `T` are filled in.
pub struct SchemaPipe<T> {
    _schema: PhantomData<fn() -> T>,
}

impl<T> SchemaPipe<T> {
    pub fn new() -> Self {
        Self { _schema: PhantomData }
    }
}

impl<T> Default for SchemaPipe<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SchemaPipe<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaPipe<{}>", std::any::type_name::<T>())
    }
}

#[async_trait]
impl<T> Pipe for SchemaPipe<T>
where
    T: DeserializeOwned + Serialize + Send,
{
    async fn transform(&self, value: Value, metadata: &ArgumentMetadata) -> Result<Value, DispatchError> {
        let validation_error = |e: serde_json::Error| DispatchError::param_validation(&metadata.name, format!("Validation error: {e}"));
        let typed: T = serde_json::from_value(value).map_err(validation_error)?;
        serde_json::to_value(typed).map_err(validation_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(name: &str) -> ArgumentMetadata {
        ArgumentMetadata { name: name.to_string(), source: ParamSource::Query, key: Some(name.to_string()) }
    }

    #[tokio::test]
    async fn parse_int() {
        assert_eq!(ParseIntPipe.transform(json!(" 12 "), &meta("n")).await.unwrap(), json!(12));
        assert_eq!(ParseIntPipe.transform(json!(-3), &meta("n")).await.unwrap(), json!(-3));
        assert_eq!(ParseIntPipe.transform(Value::Null, &meta("n")).await.unwrap(), Value::Null);

        let error = ParseIntPipe.transform(json!("1.5"), &meta("n")).await.unwrap_err();
        assert!(matches!(error, DispatchError::ParamValidation { ref param, .. } if param == "n"));
    }

    #[tokio::test]
    async fn parse_float() {
        assert_eq!(ParseFloatPipe.transform(json!("2.5"), &meta("f")).await.unwrap(), json!(2.5));
        assert_eq!(ParseFloatPipe.transform(json!("x"), &meta("f")).await.unwrap_err().to_string(), "Invalid float value: x");
        assert!(ParseFloatPipe.transform(json!("NaN"), &meta("f")).await.is_err());
    }

    #[tokio::test]
    async fn parse_bool() {
        for input in ["true", "1", "YES", "on"] {
            assert_eq!(ParseBoolPipe.transform(json!(input), &meta("b")).await.unwrap(), json!(true));
        }
        for input in ["false", "0", "no", "Off"] {
            assert_eq!(ParseBoolPipe.transform(json!(input), &meta("b")).await.unwrap(), json!(false));
        }
        assert!(ParseBoolPipe.transform(json!("maybe"), &meta("b")).await.is_err());
    }

    #[tokio::test]
    async fn parse_array_with_item_pipe() {
        let pipe = ParseArrayPipe::default().item_pipe(ParseIntPipe);
        assert_eq!(pipe.transform(json!("1, 2,3"), &meta("ids")).await.unwrap(), json!([1, 2, 3]));

        let error = pipe.transform(json!("1,a"), &meta("ids")).await.unwrap_err();
        assert!(error.to_string().starts_with("Invalid array value: 1,a."));

        let pipe = ParseArrayPipe::new("|");
        assert_eq!(pipe.transform(json!("a|b"), &meta("tags")).await.unwrap(), json!(["a", "b"]));
        assert_eq!(pipe.transform(json!(""), &meta("tags")).await.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn validate_non_empty_and_json() {
        assert!(ValidateNonEmptyPipe.transform(json!(""), &meta("s")).await.is_err());
        assert!(ValidateNonEmptyPipe.transform(Value::Null, &meta("s")).await.is_err());
        assert_eq!(ValidateNonEmptyPipe.transform(json!("ok"), &meta("s")).await.unwrap(), json!("ok"));

        assert_eq!(JsonToValuePipe.transform(json!(r#"{"a":[1]}"#), &meta("j")).await.unwrap(), json!({"a": [1]}));
        assert_eq!(
            JsonToValuePipe.transform(json!("{oops"), &meta("j")).await.unwrap_err().to_string(),
            "Invalid JSON format"
        );
    }

    #[tokio::test]
    async fn parse_uuid() {
        let uuid = Uuid::new_v4();
        let braced = uuid.braced().to_string().to_uppercase();
        assert_eq!(ParseUuidPipe.transform(json!(braced), &meta("id")).await.unwrap(), json!(uuid.to_string()));
        assert_eq!(ParseUuidPipe.transform(Value::Null, &meta("id")).await.unwrap(), Value::Null);

        let error = ParseUuidPipe.transform(json!("42"), &meta("id")).await.unwrap_err();
        assert_eq!(error.to_string(), "Invalid value for parameter 'id': 42. Expected a valid UUID.");
    }

    #[tokio::test]
    async fn parse_date() {
        let pipe = ParseDatePipe::default();
        assert_eq!(pipe.transform(json!("2024-02-29"), &meta("on")).await.unwrap(), json!("2024-02-29"));

        let error = pipe.transform(json!("2023-02-29"), &meta("on")).await.unwrap_err();
        assert_eq!(error.to_string(), "Invalid date value: 2023-02-29. Expected format: %Y-%m-%d");

        let pipe = ParseDatePipe::new("%d/%m/%Y %H:%M");
        assert_eq!(pipe.transform(json!("05/03/2024 14:30"), &meta("at")).await.unwrap(), json!("2024-03-05T14:30:00"));
    }

    #[tokio::test]
    async fn validation_with_predicate() {
        let pipe = ValidationPipe::new(|v: &Value| v.as_i64().is_some_and(|n| n > 0)).message("must be positive");
        assert_eq!(pipe.transform(json!(3), &meta("n")).await.unwrap(), json!(3));
        assert_eq!(pipe.transform(json!(-3), &meta("n")).await.unwrap_err().to_string(), "must be positive");
        assert_eq!(
            ValidationPipe::new(|_: &Value| false).transform(json!(1), &meta("n")).await.unwrap_err().to_string(),
            "Validation failed"
        );
    }

    #[derive(serde::Deserialize, Serialize)]
    struct NewItem {
        name: String,
        #[serde(default)]
        tags: Vec<String>,
    }

    #[tokio::test]
    async fn schema_validation() {
        let pipe = SchemaPipe::<NewItem>::new();
        assert_eq!(pipe.transform(json!({"name": "pen"}), &meta("item")).await.unwrap(), json!({"name": "pen", "tags": []}));

        let error = pipe.transform(json!({"tags": ["a"]}), &meta("item")).await.unwrap_err();
        assert!(matches!(error, DispatchError::ParamValidation { ref param, .. } if param == "item"));
        assert!(error.to_string().starts_with("Validation error: missing field `name`"));
    }
}
