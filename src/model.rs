//! Typed view of the model's bill-of-materials reply.
//!
//! Every field is optional: the prompt tells the model to use `null` for
//! anything it cannot read, and in practice models also drop keys, quote
//! numbers (`"quantity": "4"`) or give sizes as bare numbers (`"size": 4`).
//! The `de` helpers below accept all of those shapes so one sloppy field
//! never costs the whole extraction. Keys the schema does not know are kept
//! in `extra` and written back out unchanged.

use crate::error::Iso2BomError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level keys the prompt asks for, in report order.
pub const TOP_LEVEL_KEYS: [&str; 7] = [
    "drawing",
    "pipes",
    "fittings",
    "valves",
    "flanges",
    "overall_confidence",
    "notes",
];

/// The complete extraction for one drawing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default, deserialize_with = "de::object")]
    pub drawing: Option<DrawingInfo>,
    #[serde(default, deserialize_with = "de::list")]
    pub pipes: Vec<PipeSpec>,
    #[serde(default, deserialize_with = "de::list")]
    pub fittings: Vec<FittingSpec>,
    #[serde(default, deserialize_with = "de::list")]
    pub valves: Vec<ValveSpec>,
    #[serde(default, deserialize_with = "de::list")]
    pub flanges: Vec<FlangeSpec>,
    #[serde(default, deserialize_with = "de::number")]
    pub overall_confidence: Option<f64>,
    #[serde(default, deserialize_with = "de::text_list")]
    pub notes: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Title-block information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawingInfo {
    #[serde(default, deserialize_with = "de::text")]
    pub number: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub scale: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub revision: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipeSpec {
    #[serde(default, deserialize_with = "de::text")]
    pub line_number: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub size: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub schedule: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub material: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub service: Option<String>,
    #[serde(default, deserialize_with = "de::number")]
    pub length_ft: Option<f64>,
    #[serde(default, deserialize_with = "de::number")]
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FittingSpec {
    #[serde(rename = "type", default, deserialize_with = "de::text")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub size: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub material: Option<String>,
    #[serde(default, deserialize_with = "de::count")]
    pub quantity: Option<u32>,
    #[serde(default, deserialize_with = "de::number")]
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValveSpec {
    #[serde(rename = "type", default, deserialize_with = "de::text")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub size: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub pressure_class: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub operator: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub material: Option<String>,
    #[serde(default, deserialize_with = "de::count")]
    pub quantity: Option<u32>,
    #[serde(default, deserialize_with = "de::number")]
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlangeSpec {
    #[serde(rename = "type", default, deserialize_with = "de::text")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub size: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub pressure_class: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub material: Option<String>,
    #[serde(default, deserialize_with = "de::count")]
    pub quantity: Option<u32>,
    #[serde(default, deserialize_with = "de::number")]
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Anything in the bill of materials that carries a model confidence.
pub trait BomItem {
    fn confidence(&self) -> Option<f64>;

    /// Band of the item; an absent confidence counts as 0.
    fn band(&self) -> ConfidenceBand {
        ConfidenceBand::of(self.confidence().unwrap_or(0.0))
    }
}

macro_rules! impl_bom_item {
    ($($ty:ty),*) => {
        $(impl BomItem for $ty {
            fn confidence(&self) -> Option<f64> {
                self.confidence
            }
        })*
    };
}

impl_bom_item!(PipeSpec, FittingSpec, ValveSpec, FlangeSpec);

/// Confidence banding used by the extraction prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    /// > 0.90: clear, unambiguous.
    Clear,
    /// 0.70–0.90: readable but uncertain.
    Uncertain,
    /// < 0.70: unclear or estimated; needs human review.
    Unclear,
}

impl ConfidenceBand {
    pub fn of(confidence: f64) -> Self {
        if confidence > 0.90 {
            ConfidenceBand::Clear
        } else if confidence >= 0.70 {
            ConfidenceBand::Uncertain
        } else {
            ConfidenceBand::Unclear
        }
    }
}

impl ExtractionResult {
    /// Decode a parsed reply. `raw` is carried into the error on failure.
    ///
    /// # Errors
    /// [`Iso2BomError::ParseFailed`] when the value is not a JSON object or a
    /// section has an unusable shape (e.g. `"pipes": "none"`).
    pub fn from_value(value: &Value, raw: &str) -> Result<Self, Iso2BomError> {
        if !value.is_object() {
            return Err(Iso2BomError::ParseFailed {
                detail: format!("expected a JSON object, got {}", json_kind(value)),
                raw: raw.to_string(),
            });
        }
        serde_json::from_value(value.clone()).map_err(|e| Iso2BomError::ParseFailed {
            detail: e.to_string(),
            raw: raw.to_string(),
        })
    }

    /// Number of line items across all four sections.
    pub fn item_count(&self) -> usize {
        self.pipes.len() + self.fittings.len() + self.valves.len() + self.flanges.len()
    }

    /// Line items in the [`ConfidenceBand::Unclear`] band.
    pub fn low_confidence_count(&self) -> usize {
        let unclear = |band: ConfidenceBand| band == ConfidenceBand::Unclear;
        self.pipes.iter().filter(|i| unclear(i.band())).count()
            + self.fittings.iter().filter(|i| unclear(i.band())).count()
            + self.valves.iter().filter(|i| unclear(i.band())).count()
            + self.flanges.iter().filter(|i| unclear(i.band())).count()
    }
}

/// Top-level keys the prompt asks for that are absent from `value`.
pub fn missing_sections(value: &Value) -> Vec<&'static str> {
    match value.as_object() {
        Some(obj) => TOP_LEVEL_KEYS
            .iter()
            .copied()
            .filter(|k| !obj.contains_key(*k))
            .collect(),
        None => TOP_LEVEL_KEYS.to_vec(),
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

/// Lenient field decoders. Each goes through `Value` first so it works
/// under `#[serde(flatten)]` as well.
mod de {
    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Strings as-is; numbers and booleans stringified; anything else is unknown.
    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    /// Numbers as-is; numeric strings parsed (`"95%"` → 0.95); anything
    /// else is unknown.
    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let parsed = match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let s = s.trim();
                match s.strip_suffix('%') {
                    Some(pct) => pct.trim().parse::<f64>().ok().map(|p| p / 100.0),
                    None => s.parse().ok(),
                }
            }
            _ => None,
        };
        Ok(parsed.filter(|f| f.is_finite()))
    }

    /// Non-negative whole numbers, from numbers or numeric strings.
    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let as_whole = |f: f64| {
            (f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64).then_some(f as u32)
        };
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => match n.as_u64() {
                Some(u) => u32::try_from(u).ok(),
                None => n.as_f64().and_then(as_whole),
            },
            Value::String(s) => s.trim().parse::<f64>().ok().and_then(as_whole),
            _ => None,
        })
    }

    /// An object, or `null` → None.
    pub fn object<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            v @ Value::Object(_) => serde_json::from_value(v).map(Some).map_err(D::Error::custom),
            other => Err(D::Error::custom(format!(
                "expected an object, got {}",
                super::json_kind(&other)
            ))),
        }
    }

    /// An array of objects, or `null` → empty.
    pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Value::deserialize(d)? {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items
                .into_iter()
                .map(|item| serde_json::from_value(item).map_err(D::Error::custom))
                .collect(),
            other => Err(D::Error::custom(format!(
                "expected an array, got {}",
                super::json_kind(&other)
            ))),
        }
    }

    /// Notes: an array of strings, a single string, or `null`.
    pub fn text_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
            Value::String(s) if !s.trim().is_empty() => vec![s],
            _ => Vec::new(),
        })
    }
}
