//! Shape and range checks for raw requests and raw model output.
//!
//! Both validators work on `serde_json::Value` rather than typed `Deserialize`
//! so that every problem is reported per field, not just the first serde error.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::capillary::models::{
    CapillaryRequest, CapillaryResult, OverallOptimal, Refrigerant, SelectedDiameterCalculation,
    TemperatureRange,
};

pub const SELECTED_DIAMETER_FIELD: &str = "selectedCapillaryTubeInternalDiameterMillimeters";
/// Short alias accepted on input.
pub const SELECTED_DIAMETER_ALIAS: &str = "selectedDiameterMillimeters";

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", join_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    #[cfg(test)]
    pub fn has_field(&self, field: &str) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collects issues while fields are read out of a JSON object.
struct Checker<'a> {
    object: Option<&'a Map<String, Value>>,
    prefix: &'a str,
    issues: Vec<FieldIssue>,
}

impl<'a> Checker<'a> {
    fn new(value: &'a Value, prefix: &'a str) -> Self {
        let mut checker = Self {
            object: value.as_object(),
            prefix,
            issues: Vec::new(),
        };
        if checker.object.is_none() {
            let field = if prefix.is_empty() { "$" } else { prefix };
            checker.issue(field.to_string(), "must be a JSON object".to_string());
        }
        checker
    }

    fn path(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.prefix, key)
        }
    }

    fn issue(&mut self, field: String, message: String) {
        self.issues.push(FieldIssue { field, message });
    }

    /// The field's value, treating JSON `null` as absent.
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.object?.get(key).filter(|v| !v.is_null())
    }

    fn positive_number(&mut self, key: &str, value: Option<&Value>, label: &str) -> Option<f64> {
        let path = self.path(key);
        let Some(value) = value else {
            if self.object.is_some() {
                self.issue(path, format!("{label} is required."));
            }
            return None;
        };
        match value.as_f64() {
            Some(n) if n.is_finite() && n > 0.0 => Some(n),
            Some(_) => {
                self.issue(path, format!("{label} must be greater than 0."));
                None
            }
            None => {
                self.issue(path, format!("{label} must be a number."));
                None
            }
        }
    }

    fn required_positive(&mut self, key: &str, label: &str) -> Option<f64> {
        let value = self.get(key);
        self.positive_number(key, value, label)
    }

    fn required_code<T>(
        &mut self,
        key: &str,
        label: &str,
        allowed: &[&str],
        parse: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        let path = self.path(key);
        let Some(value) = self.get(key) else {
            if self.object.is_some() {
                self.issue(path, format!("{label} is required."));
            }
            return None;
        };
        let parsed = value.as_str().and_then(&parse);
        if parsed.is_none() {
            self.issue(
                path,
                format!("{label} must be one of: {}.", allowed.join(", ")),
            );
        }
        parsed
    }

    fn finish<T>(self, value: Option<T>) -> Result<T, ValidationError> {
        match value {
            Some(v) if self.issues.is_empty() => Ok(v),
            _ => Err(ValidationError {
                issues: self.issues,
            }),
        }
    }
}

/// Validates raw request JSON into a `CapillaryRequest`.
pub fn validate_request(raw: &Value) -> Result<CapillaryRequest, ValidationError> {
    let mut c = Checker::new(raw, "");

    let power = c.required_positive("compressorPowerWatts", "Compressor power");

    let refrigerant_codes: Vec<&str> = Refrigerant::ALL.iter().map(|r| r.code()).collect();
    let refrigerant = c.required_code(
        "refrigerantType",
        "Refrigerant type",
        &refrigerant_codes,
        Refrigerant::from_code,
    );

    let range_codes: Vec<&str> = TemperatureRange::ALL.iter().map(|r| r.code()).collect();
    let range = c.required_code(
        "temperatureRange",
        "Temperature range",
        &range_codes,
        TemperatureRange::from_code,
    );

    let (key, selected) = match c.get(SELECTED_DIAMETER_FIELD) {
        Some(v) => (SELECTED_DIAMETER_FIELD, Some(v)),
        None => (SELECTED_DIAMETER_ALIAS, c.get(SELECTED_DIAMETER_ALIAS)),
    };
    let selected_diameter = match selected {
        Some(v) => c.positive_number(key, Some(v), "Selected diameter").map(Some),
        None => Some(None),
    };

    let request = match (power, refrigerant, range, selected_diameter) {
        (Some(power), Some(refrigerant), Some(range), Some(selected)) => Some(CapillaryRequest {
            compressor_power_watts: power,
            refrigerant_type: refrigerant,
            temperature_range: range,
            selected_diameter_millimeters: selected,
        }),
        _ => None,
    };
    c.finish(request)
}

/// Validates raw model output into a `CapillaryResult`.
pub fn validate_result(raw: &Value) -> Result<CapillaryResult, ValidationError> {
    let mut c = Checker::new(raw, "");
    let mut issues = Vec::new();

    let overall = match c.get("overallOptimal") {
        Some(value) => {
            let mut inner = Checker::new(value, "overallOptimal");
            let length = inner.required_positive("lengthMeters", "Optimal length");
            let diameter =
                inner.required_positive("internalDiameterMillimeters", "Optimal diameter");
            let overall = match (length, diameter) {
                (Some(length_meters), Some(internal_diameter_millimeters)) => {
                    Some(OverallOptimal {
                        length_meters,
                        internal_diameter_millimeters,
                    })
                }
                _ => None,
            };
            issues.extend(inner.issues);
            overall
        }
        None => {
            if c.object.is_some() {
                c.issue(
                    "overallOptimal".to_string(),
                    "Overall optimal is required.".to_string(),
                );
            }
            None
        }
    };

    let selected = match c.get("selectedDiameterCalculation") {
        Some(value) => {
            let mut inner = Checker::new(value, "selectedDiameterCalculation");
            let input = inner.required_positive("inputDiameterMillimeters", "Input diameter");
            let length = inner.required_positive("optimalLengthMeters", "Optimal length");
            let selected = match (input, length) {
                (Some(input_diameter_millimeters), Some(optimal_length_meters)) => {
                    Some(Some(SelectedDiameterCalculation {
                        input_diameter_millimeters,
                        optimal_length_meters,
                    }))
                }
                _ => None,
            };
            issues.extend(inner.issues);
            selected
        }
        None => Some(None),
    };

    let details = match c.get("calculationDetails") {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
        Some(Value::String(_)) => {
            c.issue(
                "calculationDetails".to_string(),
                "Calculation details must be a non-empty string.".to_string(),
            );
            None
        }
        Some(_) => {
            c.issue(
                "calculationDetails".to_string(),
                "Calculation details must be a string.".to_string(),
            );
            None
        }
        None => {
            if c.object.is_some() {
                c.issue(
                    "calculationDetails".to_string(),
                    "Calculation details is required.".to_string(),
                );
            }
            None
        }
    };

    c.issues.extend(issues);

    let result = match (overall, selected, details) {
        (Some(overall_optimal), Some(selected_diameter_calculation), Some(calculation_details)) => {
            Some(CapillaryResult {
                overall_optimal,
                selected_diameter_calculation,
                calculation_details,
            })
        }
        _ => None,
    };
    c.finish(result)
}

/// How a result's selected-diameter block disagrees with its request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectedDiameterMismatch {
    /// The result carries a block the request never asked for.
    Unrequested,
    /// The request asked for a block the result lacks.
    Missing,
    /// The block's input diameter is not the requested one.
    Differs { requested: f64, echoed: f64 },
}

impl SelectedDiameterMismatch {
    pub fn issue(self) -> FieldIssue {
        let message = match self {
            SelectedDiameterMismatch::Unrequested => {
                "Selected diameter calculation is present but no diameter was selected.".to_string()
            }
            SelectedDiameterMismatch::Missing => {
                "Selected diameter calculation is required when a diameter is selected.".to_string()
            }
            SelectedDiameterMismatch::Differs { requested, echoed } => format!(
                "Input diameter {echoed} mm does not match the selected diameter {requested} mm."
            ),
        };
        FieldIssue {
            field: "selectedDiameterCalculation".to_string(),
            message,
        }
    }
}

/// Checks that `selectedDiameterCalculation` is present exactly when the
/// request selected a diameter, and that it echoes that diameter.
pub fn selected_diameter_mismatch(
    request: &CapillaryRequest,
    result: &CapillaryResult,
) -> Option<SelectedDiameterMismatch> {
    match (
        request.selected_diameter_millimeters,
        &result.selected_diameter_calculation,
    ) {
        (None, None) => None,
        (None, Some(_)) => Some(SelectedDiameterMismatch::Unrequested),
        (Some(_), None) => Some(SelectedDiameterMismatch::Missing),
        (Some(requested), Some(selected)) => {
            let echoed = selected.input_diameter_millimeters;
            (echoed != requested).then_some(SelectedDiameterMismatch::Differs { requested, echoed })
        }
    }
}
