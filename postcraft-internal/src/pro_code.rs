/// Static allow-list of activation codes that unlock unmetered usage.
///
/// Loaded once at process start; there is no lifecycle beyond that. A
/// code is an opaque string: validation is a trimmed, case-sensitive
/// membership test, and callers apply whatever case normalization the
/// endpoint contract requires before calling in.
#[derive(Debug, Default)]
pub struct ProCodes {
    codes: Vec<String>,
}

pub const PRO_CODES_ENV: &str = "POSTCRAFT_PRO_CODES";

impl ProCodes {
    /// Parses the comma-separated allow-list from `POSTCRAFT_PRO_CODES`.
    /// An unset or empty variable yields an empty list (every code invalid).
    pub fn from_env() -> Self {
        let codes = Self::from_list(&std::env::var(PRO_CODES_ENV).unwrap_or_default());
        if codes.codes.is_empty() {
            tracing::warn!("{PRO_CODES_ENV} is not set; all activation codes will be rejected");
        } else {
            let count = codes.codes.len();
            tracing::info!("Loaded {count} activation code(s)");
        }
        codes
    }

    pub fn from_list(raw: &str) -> Self {
        Self {
            codes: raw
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    /// Pure membership test: trims the input and compares case-sensitively.
    pub fn is_valid(&self, code: &str) -> bool {
        let code = code.trim();
        self.codes.iter().any(|known| known == code)
    }
}
