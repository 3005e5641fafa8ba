use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("static slug pattern"));
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").expect("static slug pattern"));

/// URL slug: NFKD-folded to ASCII, lowercased, whitespace and hyphen runs
/// collapsed to a single '-', leading/trailing '-' and '_' stripped.
pub fn slugify(text: &str) -> String {
    let ascii: String = text.nfkd().filter(char::is_ascii).collect();
    let lowered = ascii.to_lowercase();
    let cleaned = NON_SLUG.replace_all(&lowered, "");
    let dashed = SEPARATORS.replace_all(&cleaned, "-");
    dashed.trim_matches(|c| c == '-' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_slugs() {
        assert_eq!(slugify("Python for Beginners"), "python-for-beginners");
        assert_eq!(slugify("  Rust -- Deep   Dive!  "), "rust-deep-dive");
        assert_eq!(slugify("_under_score_"), "under_score");
    }

    #[test]
    fn folds_accents_and_drops_non_ascii() {
        assert_eq!(slugify("Café Déjà Vu"), "cafe-deja-vu");
        assert_eq!(slugify("O'zbek tili"), "ozbek-tili");
        assert_eq!(slugify("Математика"), "");
    }
}
