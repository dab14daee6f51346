//! Capillary calculator. Turns a validated request into one model call and
//! validates what comes back.
//!
//! The model is the only source of numbers. This module renders the prompt,
//! checks the reply against the result contract, and converts a missing reply
//! into an error message built from the model's own diagnostics.

use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::capillary::models::{
    output_schema, CapillaryRequest, CapillaryResult, AMBIENT_TEMPERATURE_CELSIUS,
};
use crate::capillary::prompts::{
    CAPILLARY_PROMPT_TEMPLATE, CAPILLARY_SYSTEM, NO_SELECTED_DIAMETER_SECTION,
    SELECTED_DIAMETER_SECTION,
};
use crate::capillary::validation::{
    selected_diameter_mismatch, validate_result, SelectedDiameterMismatch, ValidationError,
};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{Diagnostics, GenerateRequest, Generation, GenerativeModel, LlmError};

pub const MODEL_OUTPUT_BASE_MESSAGE: &str =
    "Model did not produce valid output matching the schema.";

/// Finish reasons that mean "completed normally" and are left out of error messages.
const UNREMARKABLE_FINISH_REASONS: &[&str] =
    &["stop", "unknown", "unspecified", "finish_reason_unspecified"];

#[derive(Debug, Error)]
pub enum CalculationError {
    /// The model answered, but the answer broke the result contract.
    #[error("Model output failed validation: {0}")]
    InvalidOutput(#[source] ValidationError),

    /// The model answered with nothing usable.
    #[error("{0}")]
    ModelOutput(String),

    #[error("Model call failed: {0}")]
    Transport(#[from] LlmError),
}

/// Sizes a capillary tube by asking `model`. Exactly one model call.
pub async fn compute_capillary_dimensions(
    model: &dyn GenerativeModel,
    request: &CapillaryRequest,
) -> Result<CapillaryResult, CalculationError> {
    let span = info_span!("capillary_calculation", id = %Uuid::new_v4());
    async move {
        info!(
            model = model.model_name(),
            refrigerant = request.refrigerant_type.code(),
            range = request.temperature_range.code(),
            selected_diameter = ?request.selected_diameter_millimeters,
            "Starting capillary calculation"
        );

        let prompt = build_prompt(request);
        let system = format!("{CAPILLARY_SYSTEM} {JSON_ONLY_SYSTEM}");
        let schema = output_schema();

        let generation = model
            .generate(&GenerateRequest {
                system: &system,
                prompt: &prompt,
                output_schema: &schema,
            })
            .await?;

        let result = unwrap_generation(&generation, request)?;
        info!("Capillary calculation succeeded");
        Ok::<_, CalculationError>(result)
    }
    .instrument(span)
    .await
}

/// Renders the request into the model instruction.
pub fn build_prompt(request: &CapillaryRequest) -> String {
    let selected_section = match request.selected_diameter_millimeters {
        Some(d) => SELECTED_DIAMETER_SECTION.replace("{selected_diameter}", &d.to_string()),
        None => NO_SELECTED_DIAMETER_SECTION.to_string(),
    };
    let (low, high) = request.temperature_range.celsius_interval();

    CAPILLARY_PROMPT_TEMPLATE
        .replace(
            "{compressor_power_watts}",
            &request.compressor_power_watts.to_string(),
        )
        .replace(
            "{refrigerant_type}",
            &request.refrigerant_type.display_name(),
        )
        .replace("{range_label}", request.temperature_range.label())
        .replace("{range_low}", &low.to_string())
        .replace("{range_high}", &high.to_string())
        .replace("{ambient_celsius}", &AMBIENT_TEMPERATURE_CELSIUS.to_string())
        .replace("{selected_diameter_section}", &selected_section)
}

/// Builds the caller-facing message for a reply without usable output.
pub fn model_output_message(diagnostics: &Diagnostics) -> String {
    let mut message = MODEL_OUTPUT_BASE_MESSAGE.to_string();

    if let Some(reason) = diagnostics.finish_reason.as_deref() {
        let lowered = reason.to_ascii_lowercase();
        if !reason.is_empty() && !UNREMARKABLE_FINISH_REASONS.contains(&lowered.as_str()) {
            message.push_str(&format!(" Finish Reason: {reason}."));
        }
    }
    if let Some(finish_message) = diagnostics.finish_message.as_deref() {
        if !finish_message.is_empty() {
            message.push_str(&format!(" Finish Message: \"{finish_message}\"."));
        }
    }
    if !diagnostics.blocked_categories.is_empty() {
        message.push_str(&format!(
            " Content blocked due to safety categories: {}.",
            diagnostics.blocked_categories.join(", ")
        ));
    }
    message
}

fn log_raw_response(generation: &Generation) {
    error!(
        "Model did not return a valid output. Full response: {}",
        serde_json::to_string_pretty(&generation.raw).unwrap_or_default()
    );
}

fn unwrap_generation(
    generation: &Generation,
    request: &CapillaryRequest,
) -> Result<CapillaryResult, CalculationError> {
    let Some(output) = generation.output.as_ref() else {
        log_raw_response(generation);
        return Err(CalculationError::ModelOutput(model_output_message(
            &generation.diagnostics,
        )));
    };

    let mut result = validate_result(output).map_err(|e| {
        log_raw_response(generation);
        CalculationError::InvalidOutput(e)
    })?;

    match selected_diameter_mismatch(request, &result) {
        None => {}
        Some(SelectedDiameterMismatch::Unrequested) => {
            warn!("Model returned a selected-diameter calculation that was not requested; dropping it");
            result.selected_diameter_calculation = None;
        }
        Some(SelectedDiameterMismatch::Missing) => {
            log_raw_response(generation);
            return Err(CalculationError::ModelOutput(format!(
                "{MODEL_OUTPUT_BASE_MESSAGE} The selected diameter calculation is missing."
            )));
        }
        Some(SelectedDiameterMismatch::Differs { requested, echoed }) => {
            warn!(
                requested,
                echoed, "Model echoed a different input diameter; using the requested value"
            );
            if let Some(selected) = result.selected_diameter_calculation.as_mut() {
                selected.input_diameter_millimeters = requested;
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capillary::models::{Refrigerant, TemperatureRange};
    use crate::llm_client::fake::FakeModel;
    use serde_json::json;

    fn freezing_request(selected: Option<f64>) -> CapillaryRequest {
        CapillaryRequest {
            compressor_power_watts: 150.0,
            refrigerant_type: Refrigerant::R134a,
            temperature_range: TemperatureRange::Congelacion,
            selected_diameter_millimeters: selected,
        }
    }

    fn overall_only_output() -> serde_json::Value {
        json!({
            "overallOptimal": {"lengthMeters": 3.2, "internalDiameterMillimeters": 0.66},
            "calculationDetails": "The -25 °C to -15 °C freezing band lowers evaporator pressure, so a longer tube is needed."
        })
    }

    #[test]
    fn test_prompt_without_selected_diameter() {
        let prompt = build_prompt(&freezing_request(None));
        assert!(prompt.contains("Compressor Power: 150 watts"));
        assert!(prompt.contains("Refrigerant Type: R134A"));
        assert!(prompt.contains("Freezing (-25 °C to -15 °C"));
        assert!(prompt.contains("Ambient Temperature: 32 °C"));
        assert!(prompt.contains("overallOptimal"));
        assert!(prompt.contains("Do NOT include \"selectedDiameterCalculation\""));
        assert!(!prompt.contains("has selected"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_prompt_with_selected_diameter() {
        let prompt = build_prompt(&freezing_request(Some(0.8)));
        assert!(prompt.contains("internal diameter of 0.8 mm"));
        assert!(prompt.contains("set to exactly 0.8"));
        assert!(!prompt.contains("Do NOT include"));
    }

    #[test]
    fn test_message_suppresses_normal_finish() {
        for reason in ["STOP", "stop", "UNKNOWN", "UNSPECIFIED", "FINISH_REASON_UNSPECIFIED"] {
            let message = model_output_message(&Diagnostics {
                finish_reason: Some(reason.to_string()),
                ..Diagnostics::default()
            });
            assert_eq!(message, MODEL_OUTPUT_BASE_MESSAGE);
        }
    }

    #[test]
    fn test_message_includes_all_diagnostics() {
        let message = model_output_message(&Diagnostics {
            finish_reason: Some("SAFETY".to_string()),
            finish_message: Some("Blocked by filter".to_string()),
            blocked_categories: vec!["HARM".to_string(), "HARM_CATEGORY_HARASSMENT".to_string()],
        });
        assert_eq!(
            message,
            "Model did not produce valid output matching the schema. \
             Finish Reason: SAFETY. Finish Message: \"Blocked by filter\". \
             Content blocked due to safety categories: HARM, HARM_CATEGORY_HARASSMENT."
        );
    }

    #[tokio::test]
    async fn test_freezing_scenario_without_selected_diameter() {
        let model = FakeModel::with_output(overall_only_output());
        let result = compute_capillary_dimensions(&model, &freezing_request(None))
            .await
            .unwrap();

        assert!(result.overall_optimal.length_meters > 0.0);
        assert!(result.overall_optimal.internal_diameter_millimeters > 0.0);
        assert!(result.selected_diameter_calculation.is_none());
        assert!(!result.calculation_details.is_empty());
        assert_eq!(model.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_freezing_scenario_with_selected_diameter() {
        let mut output = overall_only_output();
        output["selectedDiameterCalculation"] =
            json!({"inputDiameterMillimeters": 0.8, "optimalLengthMeters": 3.9});
        let model = FakeModel::with_output(output);

        let result = compute_capillary_dimensions(&model, &freezing_request(Some(0.8)))
            .await
            .unwrap();

        let selected = result.selected_diameter_calculation.unwrap();
        assert_eq!(selected.input_diameter_millimeters, 0.8);
        assert_eq!(selected.optimal_length_meters, 3.9);
    }

    #[tokio::test]
    async fn test_unrequested_selected_block_is_dropped() {
        let mut output = overall_only_output();
        output["selectedDiameterCalculation"] =
            json!({"inputDiameterMillimeters": 1.0, "optimalLengthMeters": 2.0});
        let model = FakeModel::with_output(output);

        let result = compute_capillary_dimensions(&model, &freezing_request(None))
            .await
            .unwrap();
        assert!(result.selected_diameter_calculation.is_none());
    }

    #[tokio::test]
    async fn test_echoed_diameter_is_pinned_to_request() {
        let mut output = overall_only_output();
        output["selectedDiameterCalculation"] =
            json!({"inputDiameterMillimeters": 0.79, "optimalLengthMeters": 3.9});
        let model = FakeModel::with_output(output);

        let result = compute_capillary_dimensions(&model, &freezing_request(Some(0.8)))
            .await
            .unwrap();
        assert_eq!(
            result
                .selected_diameter_calculation
                .unwrap()
                .input_diameter_millimeters,
            0.8
        );
    }

    #[tokio::test]
    async fn test_missing_selected_block_is_model_output_error() {
        let model = FakeModel::with_output(overall_only_output());
        let err = compute_capillary_dimensions(&model, &freezing_request(Some(0.8)))
            .await
            .unwrap_err();
        match err {
            CalculationError::ModelOutput(msg) => {
                assert!(msg.contains("selected diameter calculation is missing"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blocked_output_reports_harm_category() {
        let model = FakeModel::with_no_output(Diagnostics {
            finish_reason: Some("SAFETY".to_string()),
            finish_message: None,
            blocked_categories: vec!["HARM".to_string()],
        });
        let err = compute_capillary_dimensions(&model, &freezing_request(None))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(matches!(err, CalculationError::ModelOutput(_)));
        assert!(message
            .to_lowercase()
            .contains("model did not produce valid output"));
        assert!(message.contains("HARM"));
        assert!(message.contains("Finish Reason: SAFETY."));
    }

    #[tokio::test]
    async fn test_invalid_output_is_validation_failure() {
        let model = FakeModel::with_output(json!({
            "overallOptimal": {"lengthMeters": "long", "internalDiameterMillimeters": 0.7},
            "calculationDetails": "x"
        }));
        let err = compute_capillary_dimensions(&model, &freezing_request(None))
            .await
            .unwrap_err();
        match err {
            CalculationError::InvalidOutput(e) => {
                assert!(e.has_field("overallOptimal.lengthMeters"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let model = FakeModel::with_error(LlmError::Api {
            status: 401,
            message: "API key not valid".to_string(),
        });
        let err = compute_capillary_dimensions(&model, &freezing_request(None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CalculationError::Transport(LlmError::Api { status: 401, .. })
        ));
        assert_eq!(model.prompts().len(), 1);
    }
}
