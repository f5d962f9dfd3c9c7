//! Static prompt templates.
//!
//! Templates carry two literal slots — `<SCHEMA>` and `<FAILURE_REASON>` —
//! substituted verbatim at request time. No escaping is performed, so schema
//! descriptions must not themselves contain these tokens.

/// Default base instruction for a session without a caller-supplied one.
pub const BASE_INSTRUCTION: &str = "You are a helpful AI assistant.";

/// Appended to the base instruction for every structured request.
const STRUCTURED_OUTPUT_DIRECTIVE: &str = "\
CRITICAL: respond with a single valid JSON object conforming to the schema \
below, and nothing else.

Rules:
1. No text, explanations, or apologies before or after the JSON object.
2. No markdown code fences or backticks.
3. Field names are case-sensitive and must match the schema exactly.
4. Every required field must be present; optional fields may be omitted.
5. Use only the exact values a field's enum permits.
6. Numbers as numbers, booleans as lowercase true/false, empty arrays as [].

If a required value cannot be determined from the conversation, infer the
most plausible one rather than omitting the field.

Schema:
<SCHEMA>";

/// Sent as a user turn when the previous response failed to decode or
/// validate. Embeds the schema again plus the concrete failure.
const RECOVERY_DIRECTIVE: &str = "\
Your previous response could not be decoded into the required schema.

Failure:
<FAILURE_REASON>

Regenerate the response now: a single raw JSON object, no fences, no prose, \
every required field present and correctly typed, matching this schema:
<SCHEMA>

Do not explain the mistake. Output only the corrected JSON object.";

const SCHEMA_SLOT: &str = "<SCHEMA>";
const FAILURE_SLOT: &str = "<FAILURE_REASON>";

/// Composes the active system instruction for a structured request:
/// base instruction plus the schema-bearing directive.
pub fn structured_system_instruction(base: &str, schema: &str) -> String {
    let directive = STRUCTURED_OUTPUT_DIRECTIVE.replace(SCHEMA_SLOT, schema);
    format!("{base}\n{directive}")
}

/// Renders the recovery user turn for a failed attempt.
pub fn recovery_instruction(schema: &str, failure_reason: &str) -> String {
    RECOVERY_DIRECTIVE
        .replace(FAILURE_SLOT, failure_reason)
        .replace(SCHEMA_SLOT, schema)
}
