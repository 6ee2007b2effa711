//! Upstream catalog providers.
//!
//! Each provider is a [`VehicleSource`]. Wire shapes are decoded inside the
//! adapter, so the pipeline only sees [`MakeRecord`], [`ModelRecord`] and
//! [`TrimRecord`].
//!
//! | Adapter | Makes | Models | Trims |
//! |---------|-------|--------|-------|
//! | [`doe::DoeSource`] | yes (authoritative) | yes | no |
//! | [`carquery::CarQuerySource`] | yes | yes (primary) | yes |
//! | [`vpic::VpicSource`] | no | yes (fallback) | no |

pub mod carquery;
pub mod doe;
pub mod vpic;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::http::HttpClient;
use crate::models::TrimAttributes;

pub use carquery::CarQueryTrim;

/// Failure reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The provider refused service (rate limit or ban). Not retryable within a run.
    #[error("request denied: {0}")]
    Denied(String),

    /// Anything else: network failure, bad payload, provider-side error.
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    /// Classify a provider error message. Messages mentioning "denied"
    /// (any case) become [`SourceError::Denied`].
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.to_lowercase().contains("denied") {
            SourceError::Denied(message)
        } else {
            SourceError::Unavailable(message)
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, SourceError::Denied(_))
    }
}

impl From<anyhow::Error> for SourceError {
    fn from(err: anyhow::Error) -> Self {
        SourceError::from_message(format!("{:#}", err))
    }
}

/// A manufacturer as listed by one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeRecord {
    /// Display name as the provider spells it.
    pub name: String,
    /// Provider-native spellings to try when querying that provider again.
    pub aliases: Vec<String>,
    pub source_key: Option<String>,
}

impl MakeRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            source_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRecord {
    pub name: String,
    pub source_key: Option<String>,
}

impl ModelRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_key: None,
        }
    }
}

/// Raw provider record kept as trim evidence.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePayload {
    CarQuery(CarQueryTrim),
}

impl SourcePayload {
    /// Provider name written to `trim_evidence.source`.
    pub fn source(&self) -> &'static str {
        match self {
            SourcePayload::CarQuery(_) => "carquery",
        }
    }

    /// The record exactly as the provider sent it.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SourcePayload::CarQuery(trim) => {
                serde_json::to_value(trim).unwrap_or(serde_json::Value::Null)
            }
        }
    }
}

/// One trim, already cleaned and mapped to catalog attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimRecord {
    pub trim_name: String,
    pub normalized_trim_name: String,
    pub attributes: TrimAttributes,
    pub source_key: String,
    pub payload: SourcePayload,
}

/// A catalog data provider.
#[async_trait]
pub trait VehicleSource: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    async fn list_makes(&self, year: i32) -> Result<Vec<MakeRecord>, SourceError>;

    async fn list_models(
        &self,
        make: &str,
        year: i32,
        sold_in_us: bool,
    ) -> Result<Vec<ModelRecord>, SourceError>;

    async fn list_trims(
        &self,
        make: &str,
        model: &str,
        year: i32,
        sold_in_us: bool,
    ) -> Result<Vec<TrimRecord>, SourceError>;
}

/// The three providers a sync run consults.
#[derive(Clone)]
pub struct Sources {
    pub doe: Arc<dyn VehicleSource>,
    pub carquery: Arc<dyn VehicleSource>,
    pub vpic: Arc<dyn VehicleSource>,
}

impl Sources {
    /// Build the HTTP-backed providers from configuration.
    pub fn from_config(config: &Config, use_cache: bool) -> Result<Self> {
        let http = Arc::new(HttpClient::new(&config.http, use_cache)?);
        Ok(Self {
            doe: Arc::new(doe::DoeSource::new(http.clone(), &config.sources.doe_url)),
            carquery: Arc::new(carquery::CarQuerySource::new(
                http.clone(),
                &config.sources.carquery_url,
            )),
            vpic: Arc::new(vpic::VpicSource::new(http, &config.sources.vpic_url)),
        })
    }
}
