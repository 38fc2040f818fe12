// ==========================================
// VitalVida Sync Pipeline - i18n
// ==========================================
// rust-i18n, locales/en.yml (fallback) and locales/pcm.yml
// Note: rust_i18n::i18n! is initialised in lib.rs
// ==========================================

/// Locales shipped with the crate
pub const SUPPORTED_LOCALES: [&str; 2] = ["en", "pcm"];

pub const DEFAULT_LOCALE: &str = "en";

pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// Set the process-wide locale
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// Supported locale or the default
pub fn normalize_locale(locale: &str) -> &'static str {
    let wanted = locale.trim().to_lowercase();
    SUPPORTED_LOCALES
        .iter()
        .copied()
        .find(|l| *l == wanted)
        .unwrap_or(DEFAULT_LOCALE)
}

/// Translate in the current locale
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// Translate in the current locale and fill `%{name}` placeholders
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    fill(rust_i18n::t!(key).to_string(), args)
}

/// Translate in an explicit locale; the process-wide locale is left alone
pub fn t_in(locale: &str, key: &str, args: &[(&str, &str)]) -> String {
    let locale = normalize_locale(locale);
    fill(rust_i18n::t!(key, locale = locale).to_string(), args)
}

fn fill(mut text: String, args: &[(&str, &str)]) -> String {
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        text = text.replace(&placeholder, v);
    }
    text
}
