//! Declarative per-field constraints.
//!
//! A [`Schema`] is built once per form type and shared by every controller of
//! that form. Fields are validated independently of each other. Within one
//! field the constraints run in declaration order and the first one that fails
//! is the only one reported; later failures of the same field stay masked until
//! the earlier constraint passes.

use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use rust_decimal::Decimal;

use super::controller::FieldKey;
use super::validation::FormModel;
use crate::i18n::I18nManager;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is a valid regex")
});

pub type CustomPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum Rule {
    Required,
    Email,
    EqualsField(FieldKey),
    MinLength(usize),
    MaxLength(usize),
    Pattern(Regex),
    Decimal,
    PositiveDecimal,
    Custom(CustomPredicate),
}

impl Debug for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::Required => f.write_str("Required"),
            Rule::Email => f.write_str("Email"),
            Rule::EqualsField(other) => f.debug_tuple("EqualsField").field(other).finish(),
            Rule::MinLength(min) => f.debug_tuple("MinLength").field(min).finish(),
            Rule::MaxLength(max) => f.debug_tuple("MaxLength").field(max).finish(),
            Rule::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            Rule::Decimal => f.write_str("Decimal"),
            Rule::PositiveDecimal => f.write_str("PositiveDecimal"),
            Rule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Rule {
    fn passes(&self, value: Option<&str>, model: &dyn Fn(&str) -> Option<String>) -> bool {
        let text = value.unwrap_or_default();
        match self {
            Rule::Required => !text.trim().is_empty(),
            Rule::EqualsField(other) => model(other.as_str()).unwrap_or_default() == text,
            _ if text.is_empty() => true,
            Rule::Email => EMAIL_PATTERN.is_match(text.trim()),
            Rule::MinLength(min) => text.chars().count() >= *min,
            Rule::MaxLength(max) => text.chars().count() <= *max,
            Rule::Pattern(regex) => regex.is_match(text),
            Rule::Decimal => parse_decimal(text).is_some(),
            Rule::PositiveDecimal => {
                parse_decimal(text).is_some_and(|amount| amount > Decimal::ZERO)
            }
            Rule::Custom(predicate) => predicate(text),
        }
    }

    fn default_message(&self, i18n: &I18nManager) -> String {
        match self {
            Rule::Required => i18n.t("validation.required"),
            Rule::Email => i18n.t("validation.email"),
            Rule::EqualsField(other) => {
                i18n.t_with("validation.equals", &[("other", other.as_str())])
            }
            Rule::MinLength(min) => {
                i18n.t_with("validation.min_length", &[("min", &min.to_string())])
            }
            Rule::MaxLength(max) => {
                i18n.t_with("validation.max_length", &[("max", &max.to_string())])
            }
            Rule::Pattern(_) => i18n.t("validation.pattern"),
            Rule::Decimal => i18n.t("validation.decimal"),
            Rule::PositiveDecimal => i18n.t("validation.positive"),
            Rule::Custom(_) => i18n.t("validation.invalid"),
        }
    }
}

/// Parses a money amount typed by a user; `"12,50"` is read as `12.50`.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    Decimal::from_str(trimmed).ok().or_else(|| {
        if trimmed.contains(',') && !trimmed.contains('.') {
            Decimal::from_str(&trimmed.replace(',', ".")).ok()
        } else {
            None
        }
    })
}

#[derive(Clone, Debug)]
pub struct Constraint {
    pub rule: Rule,
    pub message: Option<String>,
}

#[derive(Clone, Debug)]
pub struct FieldRules {
    key: FieldKey,
    constraints: Vec<Constraint>,
}

impl FieldRules {
    fn new(key: FieldKey) -> Self {
        Self {
            key,
            constraints: Vec::new(),
        }
    }

    pub fn key(&self) -> &FieldKey {
        &self.key
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    fn rule(mut self, rule: Rule) -> Self {
        self.constraints.push(Constraint {
            rule,
            message: None,
        });
        self
    }

    pub fn required(self) -> Self {
        self.rule(Rule::Required)
    }

    pub fn email(self) -> Self {
        self.rule(Rule::Email)
    }

    /// The value must equal the value of `other`, which must be declared in
    /// the same schema.
    pub fn equals(self, other: impl Into<FieldKey>) -> Self {
        self.rule(Rule::EqualsField(other.into()))
    }

    pub fn min_length(self, min: usize) -> Self {
        self.rule(Rule::MinLength(min))
    }

    pub fn max_length(self, max: usize) -> Self {
        self.rule(Rule::MaxLength(max))
    }

    pub fn pattern(self, regex: Regex) -> Self {
        self.rule(Rule::Pattern(regex))
    }

    pub fn decimal(self) -> Self {
        self.rule(Rule::Decimal)
    }

    pub fn positive(self) -> Self {
        self.rule(Rule::PositiveDecimal)
    }

    pub fn custom(self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.rule(Rule::Custom(Arc::new(predicate)))
    }

    /// Overrides the message of the most recently added constraint.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        if let Some(last) = self.constraints.last_mut() {
            last.message = Some(message.into());
        }
        self
    }

    fn is_required(&self) -> bool {
        self.constraints
            .iter()
            .any(|constraint| matches!(constraint.rule, Rule::Required))
    }

    fn first_violation<M>(&self, model: &M, i18n: &I18nManager) -> Option<String>
    where
        M: FormModel + ?Sized,
    {
        let value = model.field_value(self.key.as_str());
        let lookup = |name: &str| model.field_value(name).map(str::to_string);
        self.constraints
            .iter()
            .find(|constraint| !constraint.rule.passes(value, &lookup))
            .map(|constraint| {
                constraint
                    .message
                    .clone()
                    .unwrap_or_else(|| constraint.rule.default_message(i18n))
            })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Violation {
    pub field: FieldKey,
    pub message: String,
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("field {field} must equal {target}, which the schema does not declare")]
    UnknownReference { field: FieldKey, target: FieldKey },
    #[error("field {0} is declared more than once")]
    DuplicateField(FieldKey),
}

#[derive(Clone, Debug)]
pub struct Schema {
    fields: Vec<FieldRules>,
    i18n: I18nManager,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Every violated field in declaration order, one message per field.
    pub fn validate<M>(&self, model: &M) -> Vec<Violation>
    where
        M: FormModel + ?Sized,
    {
        self.fields
            .iter()
            .filter_map(|rules| {
                rules
                    .first_violation(model, &self.i18n)
                    .map(|message| Violation {
                        field: rules.key.clone(),
                        message,
                    })
            })
            .collect()
    }

    pub fn validate_field<M>(&self, field: &str, model: &M) -> Option<String>
    where
        M: FormModel + ?Sized,
    {
        self.rules(field)?.first_violation(model, &self.i18n)
    }

    pub fn rules(&self, field: &str) -> Option<&FieldRules> {
        self.fields.iter().find(|rules| rules.key.as_str() == field)
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.rules(field).is_some_and(FieldRules::is_required)
    }

    pub fn field_keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.fields.iter().map(|rules| &rules.key)
    }

    pub fn i18n(&self) -> &I18nManager {
        &self.i18n
    }
}

#[derive(Default)]
pub struct SchemaBuilder {
    fields: Vec<FieldRules>,
    i18n: Option<I18nManager>,
}

impl SchemaBuilder {
    pub fn field(
        mut self,
        key: impl Into<FieldKey>,
        rules: impl FnOnce(FieldRules) -> FieldRules,
    ) -> Self {
        self.fields.push(rules(FieldRules::new(key.into())));
        self
    }

    pub fn i18n(mut self, i18n: I18nManager) -> Self {
        self.i18n = Some(i18n);
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut declared = BTreeSet::new();
        for rules in &self.fields {
            if !declared.insert(rules.key.clone()) {
                return Err(SchemaError::DuplicateField(rules.key.clone()));
            }
        }

        for rules in &self.fields {
            for constraint in &rules.constraints {
                if let Rule::EqualsField(target) = &constraint.rule {
                    if !declared.contains(target.as_str()) {
                        return Err(SchemaError::UnknownReference {
                            field: rules.key.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }

        Ok(Schema {
            fields: self.fields,
            i18n: self.i18n.unwrap_or_default(),
        })
    }
}
