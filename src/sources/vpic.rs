//! NHTSA vPIC adapter. Model lists per make and year, used as the fallback
//! model source and as a validation reference.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use super::{MakeRecord, ModelRecord, SourceError, TrimRecord, VehicleSource};
use crate::http::HttpClient;
use crate::normalize::clean_optional;

pub struct VpicSource {
    http: Arc<HttpClient>,
    base_url: String,
}

impl VpicSource {
    pub fn new(http: Arc<HttpClient>, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<String, SourceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| anyhow!("invalid vPIC base URL '{}': {}", self.base_url, e))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("vPIC base URL '{}' cannot take a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.to_string())
    }
}

fn text_field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) => clean_optional(Some(s.as_str())),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn results(data: &Value) -> &[Value] {
    data.get("Results")
        .and_then(|v| v.as_array())
        .map(|v| v.as_slice())
        .unwrap_or(&[])
}

pub fn parse_models(data: &Value) -> Vec<ModelRecord> {
    results(data)
        .iter()
        .filter_map(|item| {
            Some(ModelRecord {
                name: text_field(item, "Model_Name")?,
                source_key: text_field(item, "Model_ID"),
            })
        })
        .collect()
}

#[async_trait]
impl VehicleSource for VpicSource {
    fn name(&self) -> &str {
        "vpic"
    }

    /// vPIC has no per-year make list.
    async fn list_makes(&self, _year: i32) -> Result<Vec<MakeRecord>, SourceError> {
        Ok(Vec::new())
    }

    async fn list_models(
        &self,
        make: &str,
        year: i32,
        _sold_in_us: bool,
    ) -> Result<Vec<ModelRecord>, SourceError> {
        let year = year.to_string();
        let url = self.endpoint(&["GetModelsForMakeYear", "make", make, "modelyear", &year])?;
        let data = self
            .http
            .get_json(&url, &[("format", "json".to_string())])
            .await?;
        Ok(parse_models(&data))
    }

    async fn list_trims(
        &self,
        _make: &str,
        _model: &str,
        _year: i32,
        _sold_in_us: bool,
    ) -> Result<Vec<TrimRecord>, SourceError> {
        Ok(Vec::new())
    }
}
