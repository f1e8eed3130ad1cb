use crate::models::{AnalysisResult, Features, Skin, TextContent};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};
use thiserror::Error;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

const SECTIONS: [&str; 3] = ["skin", "features", "text"];

/// Reasons a model completion could not be turned into an [`AnalysisResult`]
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Model response is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid response structure from model: expected a JSON object at the top level")]
    NotAnObject,

    #[error("Invalid response structure from model: missing section '{0}'")]
    MissingSection(&'static str),

    #[error("Invalid section '{section}': {source}")]
    Schema {
        section: &'static str,
        source: serde_json::Error,
    },

    #[error("Invalid field '{path}': expected {expected}")]
    InvalidField { path: String, expected: String },
}

impl From<ValidationErrors> for DecodeError {
    /// Report the first failing field, by path, so repeated failures of
    /// the same reply log the same message.
    fn from(errors: ValidationErrors) -> Self {
        let mut failures = Vec::new();
        flatten("", &errors, &mut failures);
        failures.sort();

        match failures.into_iter().next() {
            Some((path, expected)) => DecodeError::InvalidField { path, expected },
            None => DecodeError::InvalidField {
                path: String::new(),
                expected: errors.to_string(),
            },
        }
    }
}

fn flatten(prefix: &str, errors: &ValidationErrors, out: &mut Vec<(String, String)>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(failures) => {
                for failure in failures {
                    let expected = failure
                        .message
                        .as_deref()
                        .unwrap_or(failure.code.as_ref())
                        .to_string();
                    let expected = match failure.params.get("value") {
                        Some(value) => format!("{}, got {}", expected, value),
                        None => expected,
                    };
                    out.push((path.clone(), expected));
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}

/// Remove markdown code fences a model may wrap around its JSON.
///
/// Handles a leading fence with or without a language tag ("```json",
/// "```") and a trailing "```". Text without fences is returned trimmed
/// and otherwise untouched.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let tag_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        text = &rest[tag_len..];
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Decode raw completion text into a fully validated result.
///
/// All-or-nothing: either every field satisfies its type, range and value
/// set, or an error naming the offending section or field is returned.
pub fn decode(raw: &str) -> Result<AnalysisResult, DecodeError> {
    let value: Value = serde_json::from_str(strip_code_fences(raw))?;
    let root = value.as_object().ok_or(DecodeError::NotAnObject)?;

    for section in SECTIONS {
        match root.get(section) {
            None | Some(Value::Null) => return Err(DecodeError::MissingSection(section)),
            Some(_) => {}
        }
    }

    let result = AnalysisResult {
        skin: section::<Skin>(root, "skin")?,
        features: section::<Features>(root, "features")?,
        text: section::<TextContent>(root, "text")?,
    };
    result.validate()?;

    Ok(result)
}

fn section<T: DeserializeOwned>(root: &Map<String, Value>, name: &'static str) -> Result<T, DecodeError> {
    let value = root.get(name).ok_or(DecodeError::MissingSection(name))?;
    T::deserialize(value).map_err(|source| DecodeError::Schema { section: name, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EyeSpacing, FaceShape};
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "skin": {
                "wrinkles": { "grade": 2, "reason": "Fine lines around the eyes." },
                "acne": { "grade": 1, "reason": "Clear complexion." },
                "pigmentation": { "grade": 3, "reason": "Light sun spots on cheeks." },
                "overall_score": 82
            },
            "features": {
                "face_shape": "oval",
                "jawline": { "shape": "angular", "definition": 7 },
                "nose": { "length": "average", "width": "narrow" },
                "eyes": { "size": "large", "spacing": "wide-set", "shape": "almond" },
                "lips": { "fullness": "medium" }
            },
            "text": {
                "description_positive": "Balanced proportions.",
                "description_negative": "Some uneven tone.",
                "style_tips": ["a", "b", "c", "d", "e"],
                "disclaimer": "This is a cosmetic analysis only."
            }
        })
    }

    fn decode_value(value: &Value) -> Result<AnalysisResult, DecodeError> {
        decode(&value.to_string())
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  ```\n{\"a\":1}\n```  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```JSON\n[1]\n```"), "[1]");
    }

    #[test]
    fn test_stripping_is_idempotent() {
        let raw = sample().to_string();
        assert_eq!(strip_code_fences(&raw), raw);
        assert_eq!(strip_code_fences(strip_code_fences(&raw)), raw);
    }

    #[test]
    fn test_decode_valid() {
        let result = decode_value(&sample()).unwrap();
        assert_eq!(result.skin.overall_score, 82);
        assert_eq!(result.features.face_shape, FaceShape::Oval);
        assert_eq!(result.features.eyes.spacing, EyeSpacing::WideSet);
        assert_eq!(result.text.style_tips.len(), 5);
        assert_eq!(serde_json::to_value(&result).unwrap(), sample());
    }

    #[test]
    fn test_decode_fenced_with_language_tag() {
        let raw = format!("```json\n{}\n```", serde_json::to_string_pretty(&sample()).unwrap());
        assert!(decode(&raw).is_ok());
    }

    #[test]
    fn test_prose_is_parse_error() {
        let err = decode("I'm sorry, I can't analyze this image.").unwrap_err();
        assert!(matches!(err, DecodeError::Parse(_)));
    }

    #[test]
    fn test_non_object_root() {
        assert!(matches!(decode("[1, 2, 3]").unwrap_err(), DecodeError::NotAnObject));
    }

    #[test]
    fn test_missing_or_null_section() {
        for section in SECTIONS {
            let mut value = sample();
            value.as_object_mut().unwrap().remove(section);
            assert!(matches!(
                decode_value(&value).unwrap_err(),
                DecodeError::MissingSection(s) if s == section
            ));

            let mut value = sample();
            value[section] = Value::Null;
            assert!(matches!(
                decode_value(&value).unwrap_err(),
                DecodeError::MissingSection(s) if s == section
            ));
        }
    }

    #[test]
    fn test_out_of_range_grade_is_rejected() {
        let mut value = sample();
        value["skin"]["acne"]["grade"] = json!(11);
        let err = decode_value(&value).unwrap_err();
        match err {
            DecodeError::InvalidField { path, expected } => {
                assert_eq!(path, "skin.acne.grade");
                assert!(expected.contains("0 to 10"));
                assert!(expected.contains("got 11"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let mut value = sample();
        value["skin"]["overall_score"] = json!(-1);
        assert!(decode_value(&value).is_err());
    }

    #[test]
    fn test_non_integer_grade_is_rejected() {
        for bad in [json!(4.5), json!(4.0), json!("4"), json!(-1), json!(300), Value::Null] {
            let mut value = sample();
            value["features"]["jawline"]["definition"] = bad.clone();
            let err = decode_value(&value).unwrap_err();
            assert!(
                matches!(err, DecodeError::Schema { section: "features", .. }),
                "{} gave {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_unknown_enum_value_is_rejected() {
        let mut value = sample();
        value["features"]["eyes"]["spacing"] = json!("wide");
        let err = decode_value(&value).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Invalid section 'features'"), "{}", message);
        assert!(message.contains("unknown variant `wide`"), "{}", message);
        assert!(message.contains("close-set"), "{}", message);
    }

    #[test]
    fn test_first_failing_field_is_stable() {
        let mut value = sample();
        value["text"]["style_tips"] = json!([]);
        value["skin"]["overall_score"] = json!(101);
        value["features"]["jawline"]["definition"] = json!(12);

        for _ in 0..5 {
            match decode_value(&value).unwrap_err() {
                DecodeError::InvalidField { path, expected } => {
                    assert_eq!(path, "features.jawline.definition");
                    assert_eq!(expected, "an integer from 0 to 10, got 12");
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn test_style_tips_bounds() {
        let mut value = sample();
        value["text"]["style_tips"] = json!([]);
        assert!(decode_value(&value).is_err());

        let mut value = sample();
        value["text"]["style_tips"] = json!(["a", "b", "c", "d", "e", "f"]);
        assert!(decode_value(&value).is_err());

        let mut value = sample();
        value["text"]["style_tips"] = json!(["a", " ", "c"]);
        let err = decode_value(&value).unwrap_err();
        assert!(err.to_string().contains("text.style_tips"));

        let mut value = sample();
        value["text"]["style_tips"] = json!(["a", "b", "c"]);
        assert_eq!(decode_value(&value).unwrap().text.style_tips.len(), 3);
    }

    #[test]
    fn test_empty_reason_is_rejected() {
        let mut value = sample();
        value["skin"]["wrinkles"]["reason"] = json!("   ");
        let err = decode_value(&value).unwrap_err();
        assert!(err.to_string().contains("skin.wrinkles.reason"));
    }

    #[test]
    fn test_extra_keys_are_dropped() {
        let mut value = sample();
        value["skin"]["redness"] = json!({ "grade": 1, "reason": "x" });
        let result = decode_value(&value).unwrap();
        assert_eq!(serde_json::to_value(&result).unwrap(), sample());
    }
}
