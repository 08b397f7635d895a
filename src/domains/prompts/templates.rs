//! Prompt template rendering.
//!
//! Templates use `{{name}}` placeholders. Rendering is literal substitution:
//! every occurrence of `{{key}}` for each supplied key is replaced, in one
//! pass over the template. There are no conditionals or escapes.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Variant key used when no model-specific variant matches.
pub const GENERIC_VARIANT: &str = "generic";

/// A piece of a parsed template.
enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

/// Split `template` into literal text and `{{name}}` placeholders.
///
/// Names are taken exactly as written, so `{{ name }}` is literal text.
fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while let Some(offset) = template[pos..].find("{{") {
        let open = pos + offset;
        let inner = open + 2;
        let Some(len) = template[inner..].find("}}") else {
            break;
        };

        let name = &template[inner..inner + len];
        if is_placeholder_name(name) {
            if open > text_start {
                out.push(Segment::Text(&template[text_start..open]));
            }
            out.push(Segment::Placeholder(name));
            pos = inner + len + 2;
            text_start = pos;
        } else {
            // Retry one brace later so `{{{x}}}` still finds `{{x}}`.
            pos = open + 1;
        }
    }

    if text_start < template.len() {
        out.push(Segment::Text(&template[text_start..]));
    }
    out
}

/// Placeholder names in order of first appearance, without duplicates.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for segment in segments(template) {
        if let Segment::Placeholder(name) = segment {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Text substituted for a variable value.
///
/// `null`, `false`, zero and the empty string render as nothing. Strings
/// are inserted as-is; other values use their JSON form.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::Number(n) if n.as_f64() == Some(0.0) => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replace every `{{key}}` that has a supplied variable.
///
/// A single left-to-right pass over the template; inserted values are never
/// rescanned. Placeholders without a value are kept verbatim.
pub fn interpolate(template: &str, variables: &HashMap<String, Value>) -> String {
    let mut text = String::with_capacity(template.len());
    for segment in segments(template) {
        match segment {
            Segment::Text(literal) => text.push_str(literal),
            Segment::Placeholder(name) => match variables.get(name) {
                Some(value) => text.push_str(&value_text(value)),
                None => {
                    text.push_str("{{");
                    text.push_str(name);
                    text.push_str("}}");
                }
            },
        }
    }
    text
}

/// Model name prefixes and the family they belong to.
const MODEL_FAMILIES: &[(&str, &str)] = &[
    ("gpt", "openai"),
    ("o1", "openai"),
    ("o3", "openai"),
    ("claude", "anthropic"),
    ("gemini", "google"),
    ("llama", "meta"),
    ("mistral", "mistral"),
    ("mixtral", "mistral"),
];

/// Vendor family of a model name, e.g. `claude-3-opus` → `anthropic`.
pub fn model_family(model: &str) -> Option<&'static str> {
    let model = model.to_ascii_lowercase();
    MODEL_FAMILIES
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, family)| *family)
}

/// Pick the template for `model`.
///
/// Precedence: exact model name, model family, `generic`, then `base`.
/// Returns the template and the variant key that supplied it.
pub fn select_variant<'a>(
    base: &'a str,
    variants: Option<&'a BTreeMap<String, String>>,
    model: Option<&str>,
) -> (&'a str, Option<&'a str>) {
    let Some(variants) = variants else {
        return (base, None);
    };

    let mut keys: Vec<&str> = Vec::new();
    if let Some(model) = model {
        keys.push(model);
        if let Some(family) = model_family(model) {
            keys.push(family);
        }
    }
    keys.push(GENERIC_VARIANT);

    keys.into_iter()
        .find_map(|key| variants.get_key_value(key))
        .map(|(key, template)| (template.as_str(), Some(key.as_str())))
        .unwrap_or((base, None))
}
