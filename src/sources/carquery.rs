//! CarQuery adapter: makes, models and the only trim-level data source.
//!
//! Responses are JSONP (`?(...);`) and are never cached. An `{"error": ...}`
//! payload is a provider refusal; see [`SourceError::from_message`].

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{MakeRecord, ModelRecord, SourceError, SourcePayload, TrimRecord, VehicleSource};
use crate::http::HttpClient;
use crate::models::TrimAttributes;
use crate::normalize::{
    clean_optional, clean_trim_label, normalize, normalize_drivetrain, standard_transmission,
};

static JSONP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)^[^(]+\((.*)\);?$").unwrap());

/// Trim record as CarQuery sends it. Kept verbatim as evidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarQueryTrim {
    #[serde(default, deserialize_with = "lenient_string")]
    pub model_make_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model_trim: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model_year: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model_body: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model_doors: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model_drive: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model_transmission_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model_engine_fuel: Option<String>,
}

// CarQuery mixes strings and numbers for the same field.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(|v| scalar(&v)))
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn field(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(scalar)
        .and_then(|s| clean_optional(Some(s.as_str())))
}

/// Strip a JSONP wrapper if present.
pub fn unwrap_jsonp(body: &str) -> &str {
    let body = body.trim();
    JSONP
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(body)
}

/// Decode a CarQuery response body, turning error payloads into [`SourceError`].
pub fn decode_response(body: &str) -> Result<Value, SourceError> {
    let json = unwrap_jsonp(body);
    if json.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let data: Value = serde_json::from_str(json)
        .map_err(|e| SourceError::Unavailable(format!("invalid CarQuery payload: {}", e)))?;

    if let Some(error) = data.get("error") {
        let message = match error {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        };
        if let Some(message) = message {
            return Err(SourceError::from_message(message));
        }
    }
    Ok(data)
}

fn items<'a>(data: &'a Value, key: &str) -> &'a [Value] {
    data.get(key)
        .and_then(|v| v.as_array())
        .map(|v| v.as_slice())
        .unwrap_or(&[])
}

pub fn parse_makes(data: &Value) -> Vec<MakeRecord> {
    items(data, "Makes")
        .iter()
        .filter_map(|item| {
            let name = field(item, "make_display").or_else(|| field(item, "make_name"))?;
            let aliases = ["make_name", "make_id", "make_display"]
                .iter()
                .filter_map(|key| field(item, key))
                .collect();
            Some(MakeRecord {
                name,
                aliases,
                source_key: field(item, "make_id"),
            })
        })
        .collect()
}

pub fn parse_models(data: &Value) -> Vec<ModelRecord> {
    items(data, "Models")
        .iter()
        .filter_map(|item| {
            let name = field(item, "model_name")
                .or_else(|| field(item, "model_display"))
                .or_else(|| field(item, "model_trim"))?;
            Some(ModelRecord {
                name,
                source_key: field(item, "model_id"),
            })
        })
        .collect()
}

pub fn parse_trims(data: &Value, year: i32) -> Vec<TrimRecord> {
    items(data, "Trims")
        .iter()
        .filter_map(|item| match serde_json::from_value::<CarQueryTrim>(item.clone()) {
            Ok(trim) => map_trim(trim, year),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed CarQuery trim");
                None
            }
        })
        .collect()
}

/// Map a raw trim onto catalog attributes. `None` when it carries no usable name.
pub fn map_trim(trim: CarQueryTrim, year: i32) -> Option<TrimRecord> {
    let raw_name = clean_optional(trim.model_trim.as_deref())
        .or_else(|| clean_optional(trim.model_name.as_deref()))?;
    let trim_name = clean_trim_label(&raw_name);
    let normalized_trim_name = normalize(&trim_name);
    if normalized_trim_name.is_empty() {
        return None;
    }

    let doors = trim
        .model_doors
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()))
        .and_then(|d| d.parse().ok());

    let attributes = TrimAttributes {
        body: clean_optional(trim.model_body.as_deref()),
        doors,
        drive: normalize_drivetrain(trim.model_drive.as_deref()),
        transmission: standard_transmission(trim.model_transmission_type.as_deref()),
        fuel_type: clean_optional(trim.model_engine_fuel.as_deref()),
    };

    let model_year = clean_optional(trim.model_year.as_deref()).unwrap_or_else(|| year.to_string());
    let source_key = format!("{}:{}", model_year, raw_name);

    Some(TrimRecord {
        trim_name,
        normalized_trim_name,
        attributes,
        source_key,
        payload: SourcePayload::CarQuery(trim),
    })
}

pub struct CarQuerySource {
    http: Arc<HttpClient>,
    base_url: String,
}

impl CarQuerySource {
    pub fn new(http: Arc<HttpClient>, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    async fn call(&self, params: &[(&str, String)]) -> Result<Value, SourceError> {
        let body = self.http.get_text(&self.base_url, params).await?;
        decode_response(&body)
    }
}

fn sold_in_us_param(params: &mut Vec<(&str, String)>, sold_in_us: bool) {
    if sold_in_us {
        params.push(("sold_in_us", "1".to_string()));
    }
}

#[async_trait]
impl VehicleSource for CarQuerySource {
    fn name(&self) -> &str {
        "carquery"
    }

    async fn list_makes(&self, year: i32) -> Result<Vec<MakeRecord>, SourceError> {
        let params = [
            ("cmd", "getMakes".to_string()),
            ("year", year.to_string()),
            ("sold_in_us", "1".to_string()),
        ];
        Ok(parse_makes(&self.call(&params).await?))
    }

    async fn list_models(
        &self,
        make: &str,
        year: i32,
        sold_in_us: bool,
    ) -> Result<Vec<ModelRecord>, SourceError> {
        let mut params = vec![
            ("cmd", "getModels".to_string()),
            ("make", make.to_string()),
            ("year", year.to_string()),
        ];
        sold_in_us_param(&mut params, sold_in_us);
        Ok(parse_models(&self.call(&params).await?))
    }

    async fn list_trims(
        &self,
        make: &str,
        model: &str,
        year: i32,
        sold_in_us: bool,
    ) -> Result<Vec<TrimRecord>, SourceError> {
        let mut params = vec![
            ("cmd", "getTrims".to_string()),
            ("make", make.to_string()),
            ("model", model.to_string()),
            ("year", year.to_string()),
        ];
        sold_in_us_param(&mut params, sold_in_us);
        Ok(parse_trims(&self.call(&params).await?, year))
    }
}
