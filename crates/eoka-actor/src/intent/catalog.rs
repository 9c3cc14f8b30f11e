use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::{Error, Result};

/// Catalog shipped with the crate.
const BUILTIN_YAML: &str = include_str!("../../intents/default.yaml");

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern"));
static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9().\- ]{5,}[0-9]$").expect("phone pattern"));
static DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern"));

/// Static table of named intents, grouped by category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentCatalog {
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub intents: Vec<IntentDef>,
}

/// One configured interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: FieldType,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Email,
    Number,
    Phone,
    Url,
    Date,
    Boolean,
}

impl FieldType {
    /// Whether `value` is acceptable for this type.
    pub fn accepts(self, value: &str) -> bool {
        match self {
            Self::Text => !value.is_empty(),
            Self::Email => EMAIL.is_match(value),
            Self::Number => value.parse::<f64>().is_ok(),
            Self::Phone => PHONE.is_match(value),
            Self::Url => value.starts_with("http://") || value.starts_with("https://"),
            Self::Date => DATE.is_match(value),
            Self::Boolean => matches!(
                value.to_ascii_lowercase().as_str(),
                "true" | "false" | "yes" | "no"
            ),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Number => "number",
            Self::Phone => "phone",
            Self::Url => "url",
            Self::Date => "date",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named action an intent permits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema of the action's parameters.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl IntentCatalog {
    /// Load a catalog from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a catalog.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let catalog: IntentCatalog = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// The catalog embedded in the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_YAML)
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Every intent with its category, in declaration order.
    pub fn intents(&self) -> impl Iterator<Item = (&Category, &IntentDef)> {
        self.categories
            .iter()
            .flat_map(|c| c.intents.iter().map(move |i| (c, i)))
    }

    pub fn len(&self) -> usize {
        self.categories.iter().map(|c| c.intents.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check names are present and unique where they must be.
    pub fn validate(&self) -> Result<()> {
        let mut categories = HashSet::new();
        for cat in &self.categories {
            if cat.name.trim().is_empty() {
                return Err(Error::Config("category name is required".into()));
            }
            if !categories.insert(cat.name.to_ascii_lowercase()) {
                return Err(Error::Config(format!("duplicate category '{}'", cat.name)));
            }
            let mut intents = HashSet::new();
            for intent in &cat.intents {
                let at = format!("{}.{}", cat.name, intent.name);
                if intent.name.trim().is_empty() {
                    return Err(Error::Config(format!(
                        "category '{}': intent name is required",
                        cat.name
                    )));
                }
                if !intents.insert(intent.name.as_str()) {
                    return Err(Error::Config(format!("duplicate intent '{}'", at)));
                }
                let mut fields = HashSet::new();
                for field in &intent.fields {
                    if field.name.trim().is_empty() {
                        return Err(Error::Config(format!("{}: field name is required", at)));
                    }
                    if !fields.insert(field.name.as_str()) {
                        return Err(Error::Config(format!(
                            "{}: duplicate field '{}'",
                            at, field.name
                        )));
                    }
                }
                if intent.actions.iter().any(|a| a.name.trim().is_empty()) {
                    return Err(Error::Config(format!("{}: action name is required", at)));
                }
            }
        }
        Ok(())
    }
}
