//! Column-name canonicalization.
//!
//! Free-text Spanish headers ("Año Adhesión Establecimiento") become
//! snake_case identifiers ("ano_adhesion_establecimiento").

use once_cell::sync::Lazy;
use regex::Regex;

static UNDERSCORE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_{2,}").expect("valid underscore pattern"));

/// Fold the accented vowels and `ñ` to ASCII. Other characters pass through.
fn fold_char(c: char) -> char {
    match c {
        'á' => 'a',
        'é' => 'e',
        'í' => 'i',
        'ó' => 'o',
        'ú' => 'u',
        'ñ' => 'n',
        ' ' | '-' => '_',
        other => other,
    }
}

/// Normalize a raw header into its canonical column name.
///
/// trim, lowercase, spaces and hyphens to `_`, fold `áéíóúñ`, collapse
/// repeated underscores, strip leading and trailing underscores.
///
/// ```
/// use apl_etl::transform::normalize_column_name;
///
/// assert_eq!(
///     normalize_column_name("Año Adhesión Establecimiento"),
///     "ano_adhesion_establecimiento"
/// );
/// ```
pub fn normalize_column_name(raw: &str) -> String {
    let folded: String = raw.trim().to_lowercase().chars().map(fold_char).collect();
    let collapsed = UNDERSCORE_RUNS.replace_all(&folded, "_");
    collapsed
        .trim_matches(|c: char| c == '_' || c.is_whitespace())
        .to_string()
}
