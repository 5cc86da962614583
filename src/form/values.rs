use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

use super::validation::FormModel;

/// Field name to text value. Serializes as a flat JSON object, which is the
/// request body shape the backend expects.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormValues(BTreeMap<String, String>);

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for FormValues
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a FormValues {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Every name is a field: writing an unseen name adds it.
impl FormModel for FormValues {
    type Fields = ();

    fn fields() -> Self::Fields {}

    fn field_value(&self, key: &str) -> Option<&str> {
        self.get(key)
    }

    fn set_field_value(&mut self, key: &str, value: String) -> bool {
        self.0.insert(key.to_string(), value);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_flat_object() {
        let values = FormValues::new()
            .with("email", "ana@example.com")
            .with("name", "Ana");
        let json = serde_json::to_value(&values).expect("serialize values");
        assert_eq!(
            json,
            serde_json::json!({ "email": "ana@example.com", "name": "Ana" })
        );

        let parsed: FormValues = serde_json::from_value(json).expect("deserialize values");
        assert_eq!(parsed, values);
    }

    #[test]
    fn name_based_access_adds_unknown_fields() {
        let mut values: FormValues = [("email", "")].into_iter().collect();
        assert!(values.set_field_value("password", "secret".to_string()));
        assert_eq!(values.field_value("password"), Some("secret"));
        assert_eq!(values.field_value("missing"), None);
        assert_eq!(values.len(), 2);
    }
}
