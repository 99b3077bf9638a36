//! Prompt construction for the extraction and aggregation calls.
//!
//! The service is instructed to produce every free-text field in the
//! configured output language, keeping key clinical terms from the
//! original language in parentheses, and to signal unknowns with the
//! explicit "insufficient information" phrase — never an invented value.

use crate::i18n;

/// Default role prompt for per-document extraction. `{language}` and
/// `{sentinel}` are filled from the output-language configuration.
pub fn default_role_prompt(language_code: &str) -> String {
    let language = i18n::language_name(language_code);
    let sentinel = i18n::insufficient_information(language_code);
    format!(
        "You are a medical records analyst. You extract structured information \
         from a single medical document.\n\
         Rules:\n\
         - Extract ONLY information explicitly present in the document.\n\
         - Produce every free-text field in {language}. Keep key clinical terms \
           from the original language in parentheses after the translation.\n\
         - When the document does not contain the information for a field, \
           answer exactly \"{sentinel}\". Never invent a value.\n\
         - Preserve doses, dates, and measured values verbatim."
    )
}

/// Default role prompt for the aggregate-summary call.
pub fn default_summary_role_prompt(language_code: &str) -> String {
    let language = i18n::language_name(language_code);
    format!(
        "You are a medical records analyst. You write a comprehensive, \
         chronological summary of a patient's medical history from a list of \
         structured visit records. Write in {language}. Do not add clinical \
         opinions or information not present in the records."
    )
}

/// Per-document user prompt.
pub fn build_document_prompt(raw_text: &str) -> String {
    format!(
        "<document>\n{raw_text}\n</document>\n\n\
         Analyze this medical record and provide structured information, \
         including a summary of the visit or examination."
    )
}

/// Aggregate-summary user prompt over the combined visit history.
pub fn build_summary_prompt(history: &str) -> String {
    format!(
        "<records>\n{history}\n</records>\n\n\
         Generate a comprehensive medical history summary based on all visits \
         and records above."
    )
}

/// Appended to the prompt when the previous response failed schema
/// validation, before the single reformulated retry.
pub fn strict_retry_note() -> &'static str {
    "\n\nIMPORTANT: your previous answer did not follow the required structure. \
     Respond again using the function schema exactly: every required field must \
     be present, lists must be JSON arrays, and unknown values must use the \
     insufficient-information phrase."
}
