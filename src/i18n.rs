//! Output-language lookup tables.
//!
//! The pipeline does not translate anything itself — the AI service is
//! instructed to produce its output in the configured language. What we
//! need locally is the language's display name (for prompt substitution)
//! and the explicit "insufficient information" / "not available" sentinel
//! phrases, so validation can tell "asked and unknown" apart from
//! "never asked".

/// Language codes the pipeline knows how to name. Unknown codes fall back
/// to English.
pub const SUPPORTED_LANGUAGES: &[&str] =
    &["en", "es", "fr", "de", "it", "pt", "zh", "ja", "ko", "ru"];

/// Full display name for a language code, used when substituting
/// `${output_language}` into role prompts.
pub fn language_name(code: &str) -> &'static str {
    match code {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "zh" => "Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "ru" => "Russian",
        _ => "English",
    }
}

/// Sentinel for a field the model was asked about but could not answer
/// from the document. Stored verbatim in extracted fields.
pub fn insufficient_information(code: &str) -> &'static str {
    match code {
        "es" => "Información insuficiente",
        "fr" => "Informations insuffisantes",
        "de" => "Unzureichende Informationen",
        "it" => "Informazioni insufficienti",
        "pt" => "Informações insuficientes",
        "zh" => "信息不足",
        "ja" => "情報不足",
        "ko" => "정보 부족",
        "ru" => "Недостаточно информации",
        _ => "Insufficient information",
    }
}

/// Sentinel for a derived artifact that could not be produced at all
/// (e.g. the aggregate summary of a batch with zero finalized documents).
pub fn not_available(code: &str) -> &'static str {
    match code {
        "es" => "No disponible",
        "fr" => "Non disponible",
        "de" => "Nicht verfügbar",
        "it" => "Non disponibile",
        "pt" => "Não disponível",
        "zh" => "不可用",
        "ja" => "利用不可",
        "ko" => "사용 불가",
        "ru" => "Недоступно",
        _ => "Not available",
    }
}

/// True if `text` is one of the known "insufficient information" sentinels,
/// in any supported language. Used when deriving filenames: a sentinel is
/// a missing field, not a value worth embedding in a name.
pub fn is_insufficient_sentinel(text: &str) -> bool {
    let trimmed = text.trim();
    SUPPORTED_LANGUAGES
        .iter()
        .any(|code| trimmed.eq_ignore_ascii_case(insufficient_information(code)))
}
