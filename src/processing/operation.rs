use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const DEFAULT_BLUR_RADIUS: f64 = 2.0;

/// Upper bounds applied while decoding. A blur radius of `r` costs
/// `(2r + 1)²` taps per pixel, a resize allocates `width × height × 4` bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperationLimits {
    pub max_dimension: u32,
    pub max_blur_radius: f64,
}

impl Default for OperationLimits {
    fn default() -> Self {
        Self {
            max_dimension: 8192,
            max_blur_radius: 25.0,
        }
    }
}

/// One step as it arrives at the boundary: a kind plus loosely typed params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl OperationSpec {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("{operation}: missing parameter `{param}`")]
    MissingParam {
        operation: &'static str,
        param: &'static str,
    },
    #[error("{operation}: parameter `{param}` must be a number, got {value}")]
    NotANumber {
        operation: &'static str,
        param: &'static str,
        value: Value,
    },
    #[error("{operation}: parameter `{param}` is out of range ({value})")]
    OutOfRange {
        operation: &'static str,
        param: &'static str,
        value: f64,
    },
}

/// A decoded, validated transformation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    Resize {
        width: NonZeroU32,
        height: NonZeroU32,
    },
    Grayscale,
    Blur {
        radius: f64,
    },
    /// A kind this build does not know. Workers pass the buffer through.
    Unrecognized(String),
}

impl Operation {
    pub fn resize(width: u32, height: u32) -> Option<Self> {
        Some(Operation::Resize {
            width: NonZeroU32::new(width)?,
            height: NonZeroU32::new(height)?,
        })
    }

    pub fn blur(radius: f64) -> Self {
        Operation::Blur { radius }
    }

    pub fn kind(&self) -> &str {
        match self {
            Operation::Resize { .. } => "resize",
            Operation::Grayscale => "grayscale",
            Operation::Blur { .. } => "blur",
            Operation::Unrecognized(kind) => kind,
        }
    }

    pub fn decode(spec: &OperationSpec, limits: &OperationLimits) -> Result<Self, OperationError> {
        match spec.kind.as_str() {
            "resize" => Ok(Operation::Resize {
                width: dimension(&spec.params, "width", limits.max_dimension)?,
                height: dimension(&spec.params, "height", limits.max_dimension)?,
            }),
            "grayscale" => Ok(Operation::Grayscale),
            "blur" => {
                let radius = match number(&spec.params, "blur", "radius")? {
                    Some(radius) => radius,
                    None => DEFAULT_BLUR_RADIUS,
                };
                if !radius.is_finite() || radius < 0.0 || radius > limits.max_blur_radius {
                    return Err(OperationError::OutOfRange {
                        operation: "blur",
                        param: "radius",
                        value: radius,
                    });
                }
                Ok(Operation::Blur { radius })
            }
            other => Ok(Operation::Unrecognized(other.to_string())),
        }
    }

    pub fn decode_all(
        specs: &[OperationSpec],
        limits: &OperationLimits,
    ) -> Result<Vec<Operation>, OperationError> {
        specs.iter().map(|spec| Operation::decode(spec, limits)).collect()
    }
}

/// Decodes with the default limits.
impl TryFrom<&OperationSpec> for Operation {
    type Error = OperationError;

    fn try_from(spec: &OperationSpec) -> Result<Self, Self::Error> {
        Operation::decode(spec, &OperationLimits::default())
    }
}

fn number(
    params: &Map<String, Value>,
    operation: &'static str,
    param: &'static str,
) -> Result<Option<f64>, OperationError> {
    match params.get(param) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| OperationError::NotANumber {
                operation,
                param,
                value: value.clone(),
            }),
    }
}

// Integers and floats are both accepted; fractional sizes are truncated.
fn dimension(
    params: &Map<String, Value>,
    param: &'static str,
    max: u32,
) -> Result<NonZeroU32, OperationError> {
    let value = number(params, "resize", param)?.ok_or(OperationError::MissingParam {
        operation: "resize",
        param,
    })?;

    let out_of_range = OperationError::OutOfRange {
        operation: "resize",
        param,
        value,
    };
    if !value.is_finite() || value < 1.0 || value > f64::from(max) {
        return Err(out_of_range);
    }
    NonZeroU32::new(value as u32).ok_or(out_of_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_resize_from_integer_and_float_params() {
        let ints = OperationSpec::new("resize")
            .with_param("width", 100)
            .with_param("height", 50);
        let floats = OperationSpec::new("resize")
            .with_param("width", 100.0)
            .with_param("height", 50.7);

        assert_eq!(Operation::try_from(&ints), Ok(Operation::resize(100, 50).unwrap()));
        assert_eq!(Operation::try_from(&floats), Ok(Operation::resize(100, 50).unwrap()));
    }

    #[test]
    fn resize_rejects_missing_and_non_positive_sizes() {
        let missing = OperationSpec::new("resize").with_param("width", 10);
        let zero = OperationSpec::new("resize")
            .with_param("width", 0)
            .with_param("height", 10);
        let text = OperationSpec::new("resize")
            .with_param("width", "ten")
            .with_param("height", 10);

        assert!(matches!(
            Operation::try_from(&missing),
            Err(OperationError::MissingParam { param: "height", .. })
        ));
        assert!(matches!(
            Operation::try_from(&zero),
            Err(OperationError::OutOfRange { param: "width", .. })
        ));
        assert!(matches!(
            Operation::try_from(&text),
            Err(OperationError::NotANumber { param: "width", .. })
        ));
    }

    #[test]
    fn blur_radius_defaults_to_two() {
        let spec = OperationSpec::new("blur");
        assert_eq!(Operation::try_from(&spec), Ok(Operation::blur(2.0)));
    }

    #[test]
    fn blur_rejects_negative_radius() {
        let spec = OperationSpec::new("blur").with_param("radius", -1.5);
        assert!(matches!(
            Operation::try_from(&spec),
            Err(OperationError::OutOfRange { param: "radius", .. })
        ));
    }

    #[test]
    fn sizes_beyond_the_limits_are_rejected() {
        let limits = OperationLimits {
            max_dimension: 1000,
            max_blur_radius: 10.0,
        };
        let huge_blur = OperationSpec::new("blur").with_param("radius", 1.0e6);
        let huge_resize = OperationSpec::new("resize")
            .with_param("width", 100_000)
            .with_param("height", 10);
        let at_limit = OperationSpec::new("resize")
            .with_param("width", 1000)
            .with_param("height", 1000);

        assert!(matches!(
            Operation::decode(&huge_blur, &limits),
            Err(OperationError::OutOfRange { param: "radius", .. })
        ));
        assert!(matches!(
            Operation::decode(&huge_resize, &limits),
            Err(OperationError::OutOfRange { param: "width", .. })
        ));
        assert_eq!(
            Operation::decode(&at_limit, &limits),
            Ok(Operation::resize(1000, 1000).unwrap())
        );
        assert!(Operation::try_from(&huge_blur).is_err());
    }

    #[test]
    fn unknown_kinds_are_kept_for_pass_through() {
        let spec = OperationSpec::new("sepia");
        let op = Operation::try_from(&spec).unwrap();

        assert_eq!(op, Operation::Unrecognized("sepia".to_string()));
        assert_eq!(op.kind(), "sepia");
    }

    #[test]
    fn decodes_request_payload() {
        let payload = json!([
            {"type": "resize", "params": {"width": 100, "height": 50}},
            {"type": "grayscale"},
            {"type": "blur", "params": {"radius": 1.5}}
        ]);
        let specs: Vec<OperationSpec> = serde_json::from_value(payload).unwrap();

        let ops = Operation::decode_all(&specs, &OperationLimits::default()).unwrap();

        assert_eq!(
            ops,
            vec![
                Operation::resize(100, 50).unwrap(),
                Operation::Grayscale,
                Operation::blur(1.5)
            ]
        );
    }
}
