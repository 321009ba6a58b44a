use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Rating given to every imported place.
pub const PLACE_RATING: u8 = 3;

/// Keys of the open-data export that are read from each record.
pub mod source_keys {
    pub const NAME: &str = "관광지명";
    pub const LATITUDE: &str = "위도";
    pub const LONGITUDE: &str = "경도";
    pub const DESCRIPTION: &str = "관광지소개";
}

/// Names of the multipart form fields accepted by the place endpoint.
pub mod form_fields {
    pub const TITLE: &str = "placeTitle";
    pub const LATITUDE: &str = "lat";
    pub const LONGITUDE: &str = "lng";
    pub const RATING: &str = "rating";
    pub const DESCRIPTION: &str = "placeDescription";
    pub const IMAGE: &str = "placeImageURL";
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("record is not a JSON object (found {found})")]
    NotAnObject { found: &'static str },
}

/// Text fields of one place-registration request.
///
/// `None` means the record had no value and the field is left out of the
/// form.
#[allow(non_snake_case)]
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct UploadPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeTitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<String>,
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeDescription: Option<String>,
}

impl UploadPayload {
    pub fn from_record(record: &Value) -> Result<Self, MappingError> {
        let fields = record.as_object().ok_or(MappingError::NotAnObject {
            found: value_kind(record),
        })?;
        Ok(Self {
            placeTitle: text_field(fields, source_keys::NAME),
            lat: text_field(fields, source_keys::LATITUDE),
            lng: text_field(fields, source_keys::LONGITUDE),
            rating: PLACE_RATING,
            placeDescription: text_field(fields, source_keys::DESCRIPTION),
        })
    }

    /// Form fields in submission order, absent values skipped.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::with_capacity(5);
        if let Some(title) = &self.placeTitle {
            fields.push((form_fields::TITLE, title.clone()));
        }
        if let Some(lat) = &self.lat {
            fields.push((form_fields::LATITUDE, lat.clone()));
        }
        if let Some(lng) = &self.lng {
            fields.push((form_fields::LONGITUDE, lng.clone()));
        }
        fields.push((form_fields::RATING, self.rating.to_string()));
        if let Some(description) = &self.placeDescription {
            fields.push((form_fields::DESCRIPTION, description.clone()));
        }
        fields
    }

    /// Name used to identify the place in log lines.
    pub fn title(&self) -> &str {
        self.placeTitle.as_deref().unwrap_or("<untitled>")
    }
}

// Strings pass through untouched; other scalars keep their JSON spelling so
// `37.5` becomes "37.5".
fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
