//! fueleconomy.gov (DOE) menu adapter: the authoritative make list and a
//! per-make model list.
//!
//! The menu endpoints answer in XML or JSON depending on negotiation. Both
//! shapes reduce to a list of `menuItem.text` values; a single item may come
//! back as a bare object instead of a list.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::events::Event;
use serde_json::Value;

use super::{MakeRecord, ModelRecord, SourceError, TrimRecord, VehicleSource};
use crate::http::HttpClient;
use crate::normalize::clean_optional;

pub struct DoeSource {
    http: Arc<HttpClient>,
    base_url: String,
}

impl DoeSource {
    pub fn new(http: Arc<HttpClient>, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn menu(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Vec<String>> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let body = self.http.get_text_cached(&url, params).await?;
        parse_menu(&body).with_context(|| format!("Failed to parse DOE menu from {}", url))
    }
}

/// Extract the `text` of every menu item from a JSON or XML body.
pub fn parse_menu(body: &str) -> Result<Vec<String>> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(body) {
        Ok(data) => Ok(parse_menu_json(&data)),
        Err(_) => {
            let start = body.find('<').unwrap_or(0);
            parse_menu_xml(&body[start..])
        }
    }
}

fn parse_menu_json(data: &Value) -> Vec<String> {
    let data = match data.get("menuItems") {
        Some(inner) if !inner.is_null() => inner,
        _ => data,
    };
    let items = data.get("menuItem").unwrap_or(data);
    let items: Vec<&Value> = match items {
        Value::Array(list) => list.iter().collect(),
        Value::Object(_) => vec![items],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match item.get("text")? {
            Value::String(s) => clean_optional(Some(s.as_str())),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

fn parse_menu_xml(xml: &str) -> Result<Vec<String>> {
    let mut reader = quick_xml::Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut out = Vec::new();
    let mut in_item = false;
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"menuItem" => in_item = true,
                b"text" => in_text = in_item,
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().unwrap_or_default();
                if let Some(text) = clean_optional(Some(&*text)) {
                    out.push(text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"menuItem" => in_item = false,
                b"text" => in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => anyhow::bail!("invalid DOE XML: {}", e),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[async_trait]
impl VehicleSource for DoeSource {
    fn name(&self) -> &str {
        "doe"
    }

    async fn list_makes(&self, year: i32) -> Result<Vec<MakeRecord>, SourceError> {
        let names = self.menu("make", &[("year", year.to_string())]).await?;
        Ok(names.into_iter().map(MakeRecord::named).collect())
    }

    async fn list_models(
        &self,
        make: &str,
        year: i32,
        _sold_in_us: bool,
    ) -> Result<Vec<ModelRecord>, SourceError> {
        let names = self
            .menu(
                "model",
                &[("year", year.to_string()), ("make", make.to_string())],
            )
            .await?;
        Ok(names.into_iter().map(ModelRecord::named).collect())
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
