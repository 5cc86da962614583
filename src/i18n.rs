use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

mod generated {
    include!(concat!(env!("OUT_DIR"), "/formplus_i18n_generated.rs"));
}

static CATALOG: LazyLock<Arc<I18nCatalog>> = LazyLock::new(|| Arc::new(I18nCatalog::load()));

#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub enum Locale {
    #[default]
    System,
    Tag(String),
}

impl From<String> for Locale {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("system") {
            return Self::System;
        }
        Self::Tag(value.trim().to_string())
    }
}

impl From<&str> for Locale {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

/// Resolves default validation and mutation messages for the active locale.
///
/// Clones share the locale selection, so a schema and a mutation built from
/// the same manager always speak the same language.
#[derive(Clone)]
pub struct I18nManager {
    catalog: Arc<I18nCatalog>,
    locale: Arc<RwLock<Locale>>,
}

impl Default for I18nManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for I18nManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I18nManager")
            .field("locale", &self.locale())
            .field("resolved", &self.resolved_locale())
            .finish()
    }
}

impl I18nManager {
    pub fn new() -> Self {
        Self {
            catalog: CATALOG.clone(),
            locale: Arc::new(RwLock::new(Locale::System)),
        }
    }

    pub fn with_locale(locale: impl Into<Locale>) -> Self {
        let manager = Self::new();
        manager.set_locale(locale);
        manager
    }

    pub fn locale(&self) -> Locale {
        self.locale
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_locale(&self, locale: impl Into<Locale>) {
        *self.locale.write().unwrap_or_else(PoisonError::into_inner) = locale.into();
    }

    pub fn default_locale(&self) -> &'static str {
        self.catalog.default_locale
    }

    pub fn resolved_locale(&self) -> &'static str {
        self.catalog
            .resolve_locale(self.requested_locale().as_deref())
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    pub fn t(&self, key: &str) -> String {
        self.lookup(key).unwrap_or(key).to_string()
    }

    pub fn t_with(&self, key: &str, params: &[(&str, &str)]) -> String {
        let raw = self.lookup(key).unwrap_or(key);
        if params.is_empty() {
            return raw.to_string();
        }
        format_template(raw, params)
    }

    fn requested_locale(&self) -> Option<String> {
        match self.locale() {
            Locale::System => system_locale(),
            Locale::Tag(tag) => Some(tag),
        }
    }

    fn lookup(&self, key: &str) -> Option<&'static str> {
        self.catalog.lookup(self.resolved_locale(), key)
    }
}

#[cfg(feature = "i18n")]
fn system_locale() -> Option<String> {
    sys_locale::get_locale()
}

#[cfg(not(feature = "i18n"))]
fn system_locale() -> Option<String> {
    None
}

/// Compiled message tables, indexed by normalized tag and by bare language.
struct I18nCatalog {
    default_locale: &'static str,
    tables: HashMap<&'static str, HashMap<&'static str, &'static str>>,
    by_tag: HashMap<String, &'static str>,
    by_language: HashMap<String, Option<&'static str>>,
}

impl I18nCatalog {
    fn load() -> Self {
        let mut catalog = Self {
            default_locale: generated::DEFAULT_LOCALE,
            tables: HashMap::new(),
            by_tag: HashMap::new(),
            by_language: HashMap::new(),
        };
        for &(locale, entries) in generated::LOCALES {
            let tag = normalize_locale_tag(locale);
            // A language shipped for two regions has no implicit region.
            catalog
                .by_language
                .entry(primary_language(&tag))
                .and_modify(|slot| {
                    if *slot != Some(locale) {
                        *slot = None;
                    }
                })
                .or_insert(Some(locale));
            catalog.by_tag.insert(tag, locale);
            catalog
                .tables
                .insert(locale, entries.iter().copied().collect());
        }
        catalog
    }

    fn resolve_locale(&self, requested: Option<&str>) -> &'static str {
        requested
            .map(normalize_locale_tag)
            .and_then(|tag| {
                self.by_tag.get(&tag).copied().or_else(|| {
                    self.by_language
                        .get(&primary_language(&tag))
                        .copied()
                        .flatten()
                })
            })
            .unwrap_or(self.default_locale)
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<&'static str> {
        [locale, self.default_locale]
            .into_iter()
            .find_map(|locale| self.tables.get(locale)?.get(key).copied())
    }
}

fn primary_language(tag: &str) -> String {
    tag.split('-').next().unwrap_or_default().to_string()
}

/// `pt_BR.UTF-8` and `pt-br@euro` both become `pt-br`.
fn normalize_locale_tag(tag: &str) -> String {
    let base = tag.trim().split(['.', '@']).next().unwrap_or_default();
    base.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Replaces `{name}` with the matching parameter. Unknown or unclosed
/// placeholders are kept as written.
fn format_template(template: &str, params: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            rest = &rest[open..];
            break;
        };
        let name = &after[..close];
        match params.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => output.push_str(value),
            None => output.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::{I18nManager, Locale, format_template, normalize_locale_tag};

    #[test]
    fn missing_translation_shows_key() {
        let i18n = I18nManager::with_locale("pt-BR");
        assert_eq!(i18n.t("validation.does_not_exist"), "validation.does_not_exist");
    }

    #[test]
    fn supports_locale_tag_normalization() {
        let i18n = I18nManager::with_locale("pt_BR.UTF-8");
        assert_eq!(i18n.resolved_locale(), "pt-BR");
        assert_eq!(i18n.t("validation.required"), "Campo obrigatório");
    }

    #[test]
    fn language_only_tag_falls_back_to_regional_catalog() {
        let i18n = I18nManager::with_locale("pt");
        assert_eq!(i18n.resolved_locale(), "pt-BR");
    }

    #[test]
    fn unknown_locale_uses_default_catalog() {
        let i18n = I18nManager::with_locale("ja-JP");
        assert_eq!(i18n.resolved_locale(), i18n.default_locale());
        assert_eq!(i18n.t("validation.required"), "This field is required");
    }

    #[test]
    fn supports_placeholder_interpolation() {
        let i18n = I18nManager::with_locale("en-US");
        assert_eq!(
            i18n.t_with("validation.equals", &[("other", "password")]),
            "Must match password"
        );
        assert_eq!(
            i18n.t_with("validation.min_length", &[("unused", "x")]),
            "Must be at least {min} characters"
        );
    }

    #[test]
    fn clones_share_locale_selection() {
        let i18n = I18nManager::with_locale("en-US");
        let shared = i18n.clone();
        shared.set_locale("pt-BR");
        assert_eq!(i18n.locale(), Locale::Tag("pt-BR".to_string()));
        assert_eq!(Locale::from(" system "), Locale::System);
        assert_eq!(normalize_locale_tag("en_US@euro"), "en-us");
    }

    #[test]
    fn unclosed_placeholder_is_kept() {
        assert_eq!(
            format_template("{min} of {max", &[("min", "3")]),
            "3 of {max"
        );
    }
}
