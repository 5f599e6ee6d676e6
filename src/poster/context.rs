//! Builds the flat rendering context from a template's defaults, the caller's overrides,
//! resolved logo assets and the submitted data.
//!
//! Layers, later wins on key collision:
//! 1. `template.default_customization`
//! 2. `input.customization_data`
//! 3. asset slots (`<slot>_asset_id` -> `<slot>_svg` plus the asset's default color)
//! 4. `input.data`
//! 5. `<key>Split` digit arrays for every `*_number` key in `input.data`
//! 6. `business_name`
//!
//! `<slot>_svg` keys are emitted unescaped by layouts, so they only ever carry asset markup.
//! Callers cannot set them through `customization_data` or `data`.

use serde_json::{Map, Value};

use super::model::{Asset, PosterInput, RenderingContext, Template, LOGO_ASSET_TYPE};
use super::repository::AssetRepository;
use crate::error::AppError;

pub const ASSET_ID_SUFFIX: &str = "_asset_id";
pub const SVG_SUFFIX: &str = "_svg";
pub const NUMBER_SUFFIX: &str = "_number";
pub const SPLIT_SUFFIX: &str = "Split";
pub const HEADER_LOGO_SLOT: &str = "header_logo";

/// Build the rendering context for one generation.
pub async fn build_context(
    template: &Template,
    input: &PosterInput,
    assets: &dyn AssetRepository,
) -> Result<RenderingContext, AppError> {
    let mut context = parse_default_customization(template)?;

    for (key, value) in caller_values(&input.customization_data, "customization_data") {
        context.insert(key.clone(), value.clone());
    }

    inject_asset_slots(&mut context, template, input, assets).await;

    for (key, value) in caller_values(&input.data, "data") {
        context.insert(key.clone(), value.clone());
    }

    for (key, value) in &input.data {
        if key.ends_with(NUMBER_SUFFIX) {
            context.insert(format!("{}{}", key, SPLIT_SUFFIX), split_digits(value));
        }
    }

    context.insert(
        "business_name".to_string(),
        Value::String(input.business_name.clone()),
    );

    Ok(context)
}

/// Entries of a caller-supplied map, minus keys reserved for asset markup.
fn caller_values<'a>(
    values: &'a Map<String, Value>,
    source: &'static str,
) -> impl Iterator<Item = (&'a String, &'a Value)> {
    values.iter().filter(move |(key, _)| {
        let reserved = is_markup_key(key);
        if reserved {
            log::warn!("Ignoring reserved key '{}' in {}", key, source);
        }
        !reserved
    })
}

pub fn is_markup_key(key: &str) -> bool {
    key.ends_with(SVG_SUFFIX)
}

/// Decode `default_customization`, unwrapping one level of string encoding if needed.
pub fn parse_default_customization(template: &Template) -> Result<Map<String, Value>, AppError> {
    let invalid = |detail: &str| {
        log::error!(
            "Template {} has an unusable default_customization: {}",
            template.id,
            detail
        );
        AppError::Configuration("template configuration error: invalid default customization".into())
    };

    match &template.default_customization {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map.clone()),
        Value::String(raw) if raw.trim().is_empty() => Ok(Map::new()),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => {
                log::warn!(
                    "Template {} stores default_customization as an encoded string",
                    template.id
                );
                Ok(map)
            }
            Ok(other) => Err(invalid(&format!("decoded to {}", json_kind(&other)))),
            Err(e) => Err(invalid(&e.to_string())),
        },
        other => Err(invalid(&format!("stored as {}", json_kind(other)))),
    }
}

async fn inject_asset_slots(
    context: &mut RenderingContext,
    template: &Template,
    input: &PosterInput,
    assets: &dyn AssetRepository,
) {
    context.retain(|key, _| !is_markup_key(key));
    context.insert(
        format!("{}{}", HEADER_LOGO_SLOT, SVG_SUFFIX),
        Value::String(String::new()),
    );

    let slots: Vec<(String, Value)> = context
        .iter()
        .filter_map(|(key, value)| {
            key.strip_suffix(ASSET_ID_SUFFIX)
                .filter(|slot| !slot.is_empty())
                .map(|slot| (slot.to_string(), value.clone()))
        })
        .collect();

    for (slot, raw_id) in slots {
        let svg_key = format!("{}{}", slot, SVG_SUFFIX);
        match resolve_logo(&slot, &raw_id, template, assets).await {
            Some(asset) => {
                context.insert(svg_key, Value::String(asset.data));

                let color_key = color_key_for_slot(&slot);
                match asset.default_color {
                    Some(color) if !input.customization_data.contains_key(&color_key) => {
                        context.insert(color_key, Value::String(color));
                    }
                    _ => {}
                }
            }
            None => {
                context.insert(svg_key, Value::String(String::new()));
            }
        }
    }
}

async fn resolve_logo(
    slot: &str,
    raw_id: &Value,
    template: &Template,
    assets: &dyn AssetRepository,
) -> Option<Asset> {
    let id = match parse_asset_id(raw_id) {
        Some(id) => id,
        None => {
            log::warn!(
                "Template {}: slot '{}' has an unusable asset id {}",
                template.id,
                slot,
                raw_id
            );
            return None;
        }
    };

    match assets.get_by_id(id).await {
        Ok(Some(asset)) if asset.asset_type == LOGO_ASSET_TYPE => Some(asset),
        Ok(Some(asset)) => {
            log::warn!(
                "Template {}: asset {} for slot '{}' has type '{}', expected '{}'",
                template.id,
                id,
                slot,
                asset.asset_type,
                LOGO_ASSET_TYPE
            );
            None
        }
        Ok(None) => {
            log::warn!(
                "Template {}: asset {} for slot '{}' not found",
                template.id,
                id,
                slot
            );
            None
        }
        Err(e) => {
            log::warn!(
                "Template {}: failed to load asset {} for slot '{}': {}",
                template.id,
                id,
                slot,
                e
            );
            None
        }
    }
}

/// Positive integer id given as a JSON number or numeric string.
pub fn parse_asset_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    (id > 0).then_some(id)
}

/// Context key receiving an asset's default color for `slot`.
pub fn color_key_for_slot(slot: &str) -> String {
    if slot == HEADER_LOGO_SLOT {
        "primary_color".to_string()
    } else {
        format!("{}_color", slot)
    }
}

/// One string per character; empty or non-string values give an empty array.
pub fn split_digits(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::Array(s.chars().map(|c| Value::String(c.to_string())).collect()),
        _ => Value::Array(Vec::new()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_asset_id_forms() {
        assert_eq!(parse_asset_id(&json!(3)), Some(3));
        assert_eq!(parse_asset_id(&json!("12")), Some(12));
        assert_eq!(parse_asset_id(&json!(4.0)), Some(4));
        assert_eq!(parse_asset_id(&json!(0)), None);
        assert_eq!(parse_asset_id(&json!("-1")), None);
        assert_eq!(parse_asset_id(&json!("abc")), None);
        assert_eq!(parse_asset_id(&json!(null)), None);
    }

    #[test]
    fn test_color_key_for_slot() {
        assert_eq!(color_key_for_slot("header_logo"), "primary_color");
        assert_eq!(color_key_for_slot("footer_logo"), "footer_logo_color");
    }

    #[test]
    fn test_is_markup_key() {
        assert!(is_markup_key("header_logo_svg"));
        assert!(is_markup_key("footer_svg"));
        assert!(!is_markup_key("svg_color"));
        assert!(!is_markup_key("header_logo_asset_id"));
    }

    #[test]
    fn test_split_digits() {
        assert_eq!(split_digits(&json!("123")), json!(["1", "2", "3"]));
        assert_eq!(split_digits(&json!("")), json!([]));
        assert_eq!(split_digits(&json!(123)), json!([]));
    }
}
