use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::form::FieldKey;
use crate::i18n::I18nManager;

/// Joins the messages the server returned for one field.
pub const SERVER_MESSAGE_SEPARATOR: &str = "; ";

const UNSTRUCTURED_KEYS: [&str; 3] = ["detail", "message", "error"];

/// Keys a backend uses for rejections that belong to no single input.
pub const FORM_LEVEL_KEYS: [&str; 2] = ["non_field_errors", "__all__"];

/// Field name to the ordered messages the backend rejected it with.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerFieldErrors(BTreeMap<String, Vec<String>>);

impl ServerFieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, messages: Vec<String>) {
        self.0.insert(field.into(), messages);
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// One display string per field, messages joined with
    /// [`SERVER_MESSAGE_SEPARATOR`].
    pub fn joined(&self) -> impl Iterator<Item = (FieldKey, String)> + '_ {
        self.0.iter().map(|(field, messages)| {
            (
                FieldKey::owned(field.clone()),
                messages.join(SERVER_MESSAGE_SEPARATOR),
            )
        })
    }

    /// Splits the rejection into per-input messages and one form-level
    /// message.
    ///
    /// A key lands on an input when `is_input` accepts it and it is not one of
    /// [`FORM_LEVEL_KEYS`]. Messages of every other key are joined into the
    /// form-level message so they stay visible.
    pub fn partition(
        &self,
        is_input: impl Fn(&str) -> bool,
    ) -> (Vec<(FieldKey, String)>, Option<String>) {
        let mut inputs = Vec::new();
        let mut stray = Vec::new();
        for (field, messages) in &self.0 {
            if !FORM_LEVEL_KEYS.contains(&field.as_str()) && is_input(field) {
                inputs.push((
                    FieldKey::owned(field.clone()),
                    messages.join(SERVER_MESSAGE_SEPARATOR),
                ));
            } else {
                stray.extend(messages.iter().map(String::as_str));
            }
        }
        let banner = (!stray.is_empty()).then(|| stray.join(SERVER_MESSAGE_SEPARATOR));
        (inputs, banner)
    }

    fn is_form_level(&self) -> bool {
        self.0
            .keys()
            .all(|field| FORM_LEVEL_KEYS.contains(&field.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for ServerFieldErrors
where
    K: Into<String>,
    V: IntoIterator,
    V::Item: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, messages)| {
                    (field.into(), messages.into_iter().map(Into::into).collect())
                })
                .collect(),
        )
    }
}

/// Why a request failed.
///
/// Only [`MutationError::Fields`] maps onto individual inputs; every other
/// variant is shown as one form-level message.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum MutationError {
    #[error("request rejected with errors on {} field(s)", .0.len())]
    Fields(ServerFieldErrors),
    #[error("request failed: {0}")]
    Unstructured(String),
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
}

impl MutationError {
    pub fn unstructured(message: impl Into<String>) -> Self {
        Self::Unstructured(message.into())
    }

    /// Classifies a JSON error body.
    ///
    /// A lone `detail`, `message` or `error` string is unstructured. Otherwise
    /// a non-empty object whose values are all strings or string arrays is a
    /// field map, unless every key is a [`FORM_LEVEL_KEYS`] entry, in which
    /// case its messages are joined into one unstructured message. Anything
    /// else is unstructured and keeps the serialized body.
    pub fn from_payload(payload: Value) -> Self {
        match payload {
            Value::Object(map) => {
                if let Some(message) = unstructured_message(&map) {
                    return Self::Unstructured(message);
                }
                match field_map(&map) {
                    Some(fields) if fields.is_form_level() => {
                        let (_, message) = fields.partition(|_| false);
                        Self::Unstructured(message.unwrap_or_default())
                    }
                    Some(fields) => Self::Fields(fields),
                    None => Self::Unstructured(Value::Object(map).to_string()),
                }
            }
            Value::String(message) => Self::Unstructured(message),
            Value::Null => Self::Unstructured(String::new()),
            other => Self::Unstructured(other.to_string()),
        }
    }

    /// Like [`from_payload`](Self::from_payload) for a raw response body; a
    /// body that is not JSON becomes its own unstructured message.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(payload) => Self::from_payload(payload),
            Err(_) => Self::Unstructured(body.trim().to_string()),
        }
    }

    pub fn field_errors(&self) -> Option<&ServerFieldErrors> {
        match self {
            Self::Fields(fields) => Some(fields),
            _ => None,
        }
    }

    /// Form-level message for errors that name no field.
    pub fn banner(&self, i18n: &I18nManager) -> Option<String> {
        match self {
            Self::Fields(_) => None,
            Self::Unstructured(message) if message.trim().is_empty() => {
                Some(i18n.t("mutation.unexpected"))
            }
            Self::Unstructured(message) => Some(message.clone()),
            Self::TimedOut(_) => Some(i18n.t("mutation.timed_out")),
        }
    }
}

fn unstructured_message(map: &Map<String, Value>) -> Option<String> {
    if map.len() != 1 {
        return None;
    }
    UNSTRUCTURED_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn field_map(map: &Map<String, Value>) -> Option<ServerFieldErrors> {
    if map.is_empty() {
        return None;
    }
    let mut errors = ServerFieldErrors::new();
    for (field, messages) in map {
        let messages = match messages {
            Value::String(message) => vec![message.clone()],
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()?,
            _ => return None,
        };
        errors.insert(field.clone(), messages);
    }
    Some(errors)
}
