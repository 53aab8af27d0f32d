//! `${VAR}` style variable substitution for scalar strings.
//!
//! Supported forms:
//!
//! | Syntax | Result |
//! |---|---|
//! | `$VAR`, `${VAR}` | value of `VAR`, empty string when unset |
//! | `${VAR:-default}` | `default` when `VAR` is unset or empty |
//! | `${VAR-default}` | `default` when `VAR` is unset |
//! | `${VAR:?message}` | error when `VAR` is unset or empty |
//! | `${VAR?message}` | error when `VAR` is unset |
//! | `${VAR:+alt}` | `alt` when `VAR` is set and non-empty, else empty |
//! | `${VAR+alt}` | `alt` when `VAR` is set, else empty |
//! | `$$` | a literal `$` |
//!
//! Defaults and alternatives are themselves substituted.

use regex::{Captures, Regex};
use std::sync::LazyLock;
use thiserror::Error;

/// Start of a reference; a braced body is scanned separately so that it can
/// hold nested references.
static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(?P<escaped>\$)|(?P<named>[_a-zA-Z][_a-zA-Z0-9]*)|(?P<braced>\{)|(?P<invalid>))")
        .expect("substitution pattern is valid")
});

/// Errors raised while substituting a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The template contains a `$` that does not start a valid reference.
    #[error("invalid template: \"{0}\"")]
    Invalid(String),

    /// A required variable (`${VAR:?msg}` / `${VAR?msg}`) is missing.
    #[error("required variable {name} is missing a value: {message}")]
    MissingRequired {
        /// Variable name
        name: String,
        /// Message from the template
        message: String,
    },
}

/// Substitute every variable reference in `template` using `lookup`.
pub fn substitute<F>(template: &str, lookup: &F) -> Result<String, TemplateError>
where
    F: Fn(&str) -> Option<String> + ?Sized,
{
    let mut output = String::with_capacity(template.len());
    let mut last = 0;

    while let Some(caps) = PATTERN.captures(&template[last..]) {
        let Some(whole) = caps.get(0) else {
            break;
        };
        output.push_str(&template[last..last + whole.start()]);
        let end = last + whole.end();

        if caps.name("braced").is_some() {
            let len = closing_brace(&template[end..]).ok_or_else(|| TemplateError::Invalid(template.to_string()))?;
            output.push_str(&expand_braced(template, &template[end..end + len], lookup)?);
            last = end + len + 1;
        } else {
            output.push_str(&replacement(template, &caps, lookup)?);
            last = end;
        }
    }
    output.push_str(&template[last..]);
    Ok(output)
}

/// Byte offset in `body` of the `}` closing the reference it starts.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn replacement<F>(template: &str, caps: &Captures<'_>, lookup: &F) -> Result<String, TemplateError>
where
    F: Fn(&str) -> Option<String> + ?Sized,
{
    if caps.name("escaped").is_some() {
        return Ok("$".to_string());
    }
    if let Some(named) = caps.name("named") {
        return Ok(lookup_or_blank(named.as_str(), lookup));
    }
    Err(TemplateError::Invalid(template.to_string()))
}

fn lookup_or_blank<F>(name: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String> + ?Sized,
{
    lookup(name).unwrap_or_else(|| {
        tracing::warn!("The \"{name}\" variable is not set. Defaulting to a blank string.");
        String::new()
    })
}

fn expand_braced<F>(template: &str, body: &str, lookup: &F) -> Result<String, TemplateError>
where
    F: Fn(&str) -> Option<String> + ?Sized,
{
    let name_len = body
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map_or(body.len(), |(i, _)| i);
    let (name, rest) = body.split_at(name_len);

    let starts_valid = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !starts_valid {
        return Err(TemplateError::Invalid(template.to_string()));
    }
    if rest.is_empty() {
        return Ok(lookup_or_blank(name, lookup));
    }

    let value = lookup(name);
    let set = value.is_some();
    let non_empty = value.as_deref().is_some_and(|v| !v.is_empty());

    let (op, arg) = split_operator(rest).ok_or_else(|| TemplateError::Invalid(template.to_string()))?;
    match op {
        ":-" if !non_empty => substitute(arg, lookup),
        "-" if !set => substitute(arg, lookup),
        ":-" | "-" => Ok(value.unwrap_or_default()),
        ":?" if !non_empty => Err(missing(name, arg)),
        "?" if !set => Err(missing(name, arg)),
        ":?" | "?" => Ok(value.unwrap_or_default()),
        ":+" if non_empty => substitute(arg, lookup),
        "+" if set => substitute(arg, lookup),
        _ => Ok(String::new()),
    }
}

fn split_operator(rest: &str) -> Option<(&'static str, &str)> {
    [":-", ":?", ":+", "-", "?", "+"]
        .into_iter()
        .find_map(|op| rest.strip_prefix(op).map(|arg| (op, arg)))
}

fn missing(name: &str, message: &str) -> TemplateError {
    TemplateError::MissingRequired {
        name: name.to_string(),
        message: message.to_string(),
    }
}
