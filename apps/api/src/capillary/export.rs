//! Plain-text results export.

use crate::capillary::models::{CapillaryRequest, CapillaryResult};

pub const EXPORT_FILENAME: &str = "capillary-calc-results.txt";

/// Renders a request and its result as the downloadable results file.
pub fn render_export(request: &CapillaryRequest, result: &CapillaryResult) -> String {
    let (low, high) = request.temperature_range.celsius_interval();

    let mut inputs = format!(
        "Compressor Power: {} W\nRefrigerant Type: {}\nTemperature Range: {} ({} °C to {} °C)",
        request.compressor_power_watts,
        request.refrigerant_type.display_name(),
        request.temperature_range.label(),
        low,
        high,
    );
    if let Some(d) = request.selected_diameter_millimeters {
        inputs.push_str(&format!("\nSelected Capillary Diameter: {d} mm"));
    }

    let mut results = format!(
        "Optimal Capillary Tube Length: {:.3} m\nOptimal Capillary Tube Internal Diameter: {:.2} mm",
        result.overall_optimal.length_meters, result.overall_optimal.internal_diameter_millimeters,
    );
    if let Some(selected) = &result.selected_diameter_calculation {
        results.push_str(&format!(
            "\n\nLength for Selected Diameter ({:.2} mm): {:.3} m",
            selected.input_diameter_millimeters, selected.optimal_length_meters,
        ));
    }

    format!(
        "Capillary Calc Results\n\
         ============================\n\
         \n\
         Inputs:\n\
         -------\n\
         {inputs}\n\
         \n\
         Results:\n\
         --------\n\
         {results}\n\
         \n\
         Calculation Details:\n\
         --------------------\n\
         {details}",
        details = result.calculation_details.trim(),
    )
    .trim()
    .to_string()
}
