//! Request and response bodies exchanged with the diagnosis backend.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// `{"msg": "..."}` bodies the backend uses for confirmations and most errors
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub msg: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionRequest {
    pub prescription: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionResponse {
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Prediction {
    pub disease: String,
    pub probability: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosisLog {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub prescription: String,
    pub predicted_disease: String,
    pub confidence: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl DiagnosisLog {
    /// Timestamps arrive either as RFC 3339 or as naive ISO 8601 (UTC, no offset).
    pub fn recorded_at(&self) -> Option<NaiveDateTime> {
        let raw = self.timestamp.as_deref()?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.naive_utc());
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
    }
}

/// Herb and disease catalogs share one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Herb,
    Disease,
}

impl CatalogKind {
    pub fn path_segment(&self) -> &'static str {
        match self {
            CatalogKind::Herb => "herbs",
            CatalogKind::Disease => "diseases",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogKind::Herb => f.write_str("Herb"),
            CatalogKind::Disease => f.write_str("Disease"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntryCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial update; absent fields are left untouched by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogEntryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CatalogEntryUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}
