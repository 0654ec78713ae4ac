//! Pure extractors over page bodies.
//!
//! Two narrow parsers: one for the `$Config` JSON object the sign-in pages
//! embed in their script, one for HTML forms and their inputs.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::de::DeserializeOwned;

static CONFIG_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$Config\s*=\s*").expect("static regex"));
static FORM: LazyLock<Selector> = LazyLock::new(|| selector("form"));
static INPUT: LazyLock<Selector> = LazyLock::new(|| selector("input"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("$Config object not found")]
    NotFound,
    #[error("invalid $Config JSON")]
    Json(#[from] serde_json::Error),
}

/// Parse the JSON object assigned to `$Config` in a page's script.
///
/// Only the object itself is consumed; whatever follows it (`;`, more
/// script) is ignored, so values containing semicolons parse correctly.
pub fn embedded_config<T: DeserializeOwned>(html: &str) -> Result<T, ConfigError> {
    let start = CONFIG_START.find(html).ok_or(ConfigError::NotFound)?;
    let rest = &html[start.end()..];
    if !rest.starts_with('{') {
        return Err(ConfigError::NotFound);
    }

    let mut values = serde_json::Deserializer::from_str(rest).into_iter::<T>();
    match values.next() {
        Some(value) => Ok(value?),
        None => Err(ConfigError::NotFound),
    }
}

/// An HTML form: its raw `action` attribute and every named input in
/// document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlForm {
    pub action: Option<String>,
    pub fields: Vec<(String, String)>,
}

impl HtmlForm {
    fn from_element(form: ElementRef<'_>) -> Self {
        let action = form
            .value()
            .attr("action")
            .filter(|a| !a.trim().is_empty())
            .map(|a| a.trim().to_string());

        let fields = form
            .select(&INPUT)
            .filter_map(|input| {
                let name = input.value().attr("name").filter(|n| !n.is_empty())?;
                let value = input.value().attr("value").unwrap_or_default();
                Some((name.to_string(), value.to_string()))
            })
            .collect();

        Self { action, fields }
    }

    #[cfg(test)]
    fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set a field, replacing any existing inputs of that name in place or
    /// appending when absent.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter().position(|(n, _)| n == name) {
            Some(index) => {
                self.fields[index].1 = value;
                let mut seen = 0;
                self.fields.retain(|(n, _)| {
                    if n != name {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.fields.push((name.to_string(), value)),
        }
    }
}

/// The first `<form>` in the page.
pub fn first_form(html: &str) -> Option<HtmlForm> {
    let document = Html::parse_document(html);
    let form = document.select(&FORM).next()?;
    Some(HtmlForm::from_element(form))
}

/// True when the page has a form and at least one hidden input or a
/// `SAMLResponse` input.
pub fn has_hidden_form(html: &str) -> bool {
    let document = Html::parse_document(html);
    if document.select(&FORM).next().is_none() {
        return false;
    }
    let has_hidden = document.select(&INPUT).any(|input| {
        input
            .value()
            .attr("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
    });
    has_hidden || named_input(&document, "SAMLResponse").is_some()
}

/// Value of the first input named `name`, anywhere in the page.
pub fn input_value(html: &str, name: &str) -> Option<String> {
    let document = Html::parse_document(html);
    named_input(&document, name)
}

/// The completed assertion, when the page carries a `SAMLResponse` input
/// with a value.
pub fn saml_response(html: &str) -> Option<String> {
    input_value(html, "SAMLResponse").filter(|v| !v.is_empty())
}

fn named_input(document: &Html, name: &str) -> Option<String> {
    document
        .select(&INPUT)
        .find(|input| input.value().attr("name") == Some(name))
        .map(|input| input.value().attr("value").unwrap_or_default().to_string())
}
