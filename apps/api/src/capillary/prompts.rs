// Capillary calculator prompt templates.
// All prompts for the capillary module are defined here.

pub const CAPILLARY_SYSTEM: &str = "\
You are an expert refrigeration engineer. \
You size capillary tubes (length in meters, internal diameter in millimeters) \
for small vapor-compression refrigeration systems.";

pub const CAPILLARY_PROMPT_TEMPLATE: &str = r#"Calculate the optimal capillary tube dimensions (length in meters and internal diameter in millimeters) for a refrigeration system.

Use the following information:

Compressor Power: {compressor_power_watts} watts
Refrigerant Type: {refrigerant_type}
Operating Temperature Range: {range_label} ({range_low} °C to {range_high} °C evaporator temperature)
Ambient Temperature: {ambient_celsius} °C

Take the ambient temperature and the operating temperature range into account, and explain in the calculation details how they influenced the result.

1. Calculate the overall optimal capillary tube length and internal diameter. Put them in "overallOptimal".
{selected_diameter_section}
Provide a detailed explanation of the calculation process and the assumptions made in "calculationDetails". Be concise.

Ensure the output is valid JSON matching the schema."#;

pub const SELECTED_DIAMETER_SECTION: &str = r#"2. The user has selected a capillary tube internal diameter of {selected_diameter} mm. Calculate the optimal length for this diameter. Put it in "selectedDiameterCalculation" with "inputDiameterMillimeters" set to exactly {selected_diameter}.
"#;

pub const NO_SELECTED_DIAMETER_SECTION: &str =
    "Do NOT include \"selectedDiameterCalculation\" in the output.\n";
