//! Request/result contract for capillary tube sizing.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Ambient temperature the model is told to assume for every calculation.
pub const AMBIENT_TEMPERATURE_CELSIUS: f64 = 32.0;

/// Refrigerants the calculator accepts. Wire form is the lowercase code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Refrigerant {
    R134a,
    R404a,
    R290,
    R600,
}

impl Refrigerant {
    pub const ALL: [Refrigerant; 4] = [
        Refrigerant::R134a,
        Refrigerant::R404a,
        Refrigerant::R290,
        Refrigerant::R600,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Refrigerant::R134a => "r134a",
            Refrigerant::R404a => "r404a",
            Refrigerant::R290 => "r290",
            Refrigerant::R600 => "r600",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.code() == code)
    }

    /// Upper-case form used in prompts and exports, e.g. `R134A`.
    pub fn display_name(self) -> String {
        self.code().to_uppercase()
    }
}

/// Named operating bands, each a fixed evaporator temperature interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureRange {
    Refrigeracion,
    Congelacion,
}

impl TemperatureRange {
    pub const ALL: [TemperatureRange; 2] =
        [TemperatureRange::Refrigeracion, TemperatureRange::Congelacion];

    pub fn code(self) -> &'static str {
        match self {
            TemperatureRange::Refrigeracion => "refrigeracion",
            TemperatureRange::Congelacion => "congelacion",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            TemperatureRange::Refrigeracion => "Refrigeration",
            TemperatureRange::Congelacion => "Freezing",
        }
    }

    /// (low, high) in °C.
    pub fn celsius_interval(self) -> (f64, f64) {
        match self {
            TemperatureRange::Refrigeracion => (0.0, 8.0),
            TemperatureRange::Congelacion => (-25.0, -15.0),
        }
    }
}

/// A validated calculation request. Build through `validate_request`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapillaryRequest {
    pub compressor_power_watts: f64,
    pub refrigerant_type: Refrigerant,
    pub temperature_range: TemperatureRange,
    #[serde(
        rename = "selectedCapillaryTubeInternalDiameterMillimeters",
        skip_serializing_if = "Option::is_none"
    )]
    pub selected_diameter_millimeters: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallOptimal {
    pub length_meters: f64,
    pub internal_diameter_millimeters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedDiameterCalculation {
    pub input_diameter_millimeters: f64,
    pub optimal_length_meters: f64,
}

/// The model's answer, after shape validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapillaryResult {
    pub overall_optimal: OverallOptimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_diameter_calculation: Option<SelectedDiameterCalculation>,
    pub calculation_details: String,
}

/// Response schema sent with every prompt, in the OpenAPI subset the
/// Generative Language API accepts.
pub fn output_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "overallOptimal": {
                "type": "OBJECT",
                "properties": {
                    "lengthMeters": {
                        "type": "NUMBER",
                        "description": "Overall optimal capillary tube length in meters."
                    },
                    "internalDiameterMillimeters": {
                        "type": "NUMBER",
                        "description": "Overall optimal capillary tube internal diameter in millimeters."
                    }
                },
                "required": ["lengthMeters", "internalDiameterMillimeters"]
            },
            "selectedDiameterCalculation": {
                "type": "OBJECT",
                "nullable": true,
                "properties": {
                    "inputDiameterMillimeters": {
                        "type": "NUMBER",
                        "description": "The user-selected internal diameter in millimeters."
                    },
                    "optimalLengthMeters": {
                        "type": "NUMBER",
                        "description": "Optimal capillary tube length in meters for the selected diameter."
                    }
                },
                "required": ["inputDiameterMillimeters", "optimalLengthMeters"]
            },
            "calculationDetails": {
                "type": "STRING",
                "description": "Details of the calculation process, covering both calculations if applicable."
            }
        },
        "required": ["overallOptimal", "calculationDetails"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refrigerant_codes_round_trip() {
        for r in Refrigerant::ALL {
            assert_eq!(Refrigerant::from_code(r.code()), Some(r));
        }
        assert_eq!(Refrigerant::from_code("r22"), None);
        assert_eq!(Refrigerant::R404a.display_name(), "R404A");
    }

    #[test]
    fn test_refrigerant_serde_matches_code() {
        let value = serde_json::to_value(Refrigerant::R290).unwrap();
        assert_eq!(value, "r290");
    }

    #[test]
    fn test_temperature_ranges_are_ordered_intervals() {
        for range in TemperatureRange::ALL {
            let (lo, hi) = range.celsius_interval();
            assert!(lo < hi);
            assert!(hi < AMBIENT_TEMPERATURE_CELSIUS);
        }
        assert_eq!(
            TemperatureRange::from_code("congelacion"),
            Some(TemperatureRange::Congelacion)
        );
    }

    #[test]
    fn test_result_omits_absent_selected_block() {
        let result = CapillaryResult {
            overall_optimal: OverallOptimal {
                length_meters: 2.5,
                internal_diameter_millimeters: 0.7,
            },
            selected_diameter_calculation: None,
            calculation_details: "details".to_string(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("selectedDiameterCalculation").is_none());
        assert_eq!(value["overallOptimal"]["lengthMeters"], 2.5);
    }

    #[test]
    fn test_request_serializes_selected_diameter_name() {
        let request = CapillaryRequest {
            compressor_power_watts: 150.0,
            refrigerant_type: Refrigerant::R134a,
            temperature_range: TemperatureRange::Congelacion,
            selected_diameter_millimeters: Some(0.8),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["selectedCapillaryTubeInternalDiameterMillimeters"], 0.8);
        assert_eq!(value["temperatureRange"], "congelacion");
    }

    #[test]
    fn test_output_schema_requires_core_fields() {
        let schema = output_schema();
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&json!("overallOptimal")));
        assert!(required.contains(&json!("calculationDetails")));
        assert!(!required.contains(&json!("selectedDiameterCalculation")));
    }
}
