/// Color scheme selection and persistence
///
/// The chosen scheme name is persisted under a fixed key in a small JSON
/// config document in the user's config directory and restored on the next
/// launch. Scheme names are normalized so legacy variants like "Scheme 1"
/// or "scheme1" resolve to the canonical "Scheme-1" form before lookup.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The built-in default pair, used when no scheme list is declared
pub fn default_schemes() -> Vec<String> {
    vec!["Scheme-1".to_string(), "Scheme-2".to_string()]
}

/// Persisted preferences document
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Prefs {
    site_theme_scheme: String,
}

/// Normalize a scheme name to the canonical `Scheme-N` form.
///
/// Accepts "Scheme 1", "scheme-1", "Scheme1"; anything that is not a
/// scheme-number variant is returned unchanged.
pub fn normalize_scheme_name(name: &str) -> String {
    let trimmed = name.trim();
    let lower = trimmed.to_lowercase();
    let Some(rest) = lower.strip_prefix("scheme") else {
        return trimmed.to_string();
    };
    let digits = rest.trim_start_matches([' ', '-']);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        format!("Scheme-{}", digits)
    } else {
        trimmed.to_string()
    }
}

/// Map a canonical scheme name onto an application theme
pub fn theme_for(scheme: &str) -> iced::Theme {
    match normalize_scheme_name(scheme).as_str() {
        "Scheme-1" => iced::Theme::Dark,
        "Scheme-2" => iced::Theme::Light,
        _ => iced::Theme::Dark,
    }
}

/// Where the preferences document lives
fn prefs_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir().or_else(dirs::home_dir)?;
    path.push("album-shelf");
    path.push("prefs.json");
    Some(path)
}

/// Load the persisted scheme choice, falling back to the first scheme in
/// the list when nothing valid is stored
pub fn load_scheme(schemes: &[String]) -> String {
    let stored = prefs_path().and_then(|p| load_scheme_from(&p));
    pick_scheme(stored.as_deref(), schemes)
}

/// Persist the chosen scheme. Failures are logged and otherwise ignored;
/// losing the preference is not worth surfacing an error for.
pub fn save_scheme(name: &str) {
    let Some(path) = prefs_path() else { return };
    if let Err(err) = save_scheme_to(&path, name) {
        log::warn!("could not persist scheme choice: {}", err);
    }
}

/// Resolve a stored name against the declared scheme list
fn pick_scheme(stored: Option<&str>, schemes: &[String]) -> String {
    if let Some(stored) = stored {
        let normalized = normalize_scheme_name(stored);
        if schemes.iter().any(|s| *s == normalized) {
            return normalized;
        }
    }
    schemes
        .first()
        .cloned()
        .unwrap_or_else(|| "Scheme-1".to_string())
}

fn load_scheme_from(path: &Path) -> Option<String> {
    let bytes = fs::read(path).ok()?;
    let prefs: Prefs = serde_json::from_slice(&bytes).ok()?;
    Some(prefs.site_theme_scheme)
}

fn save_scheme_to(path: &Path, name: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    let prefs = Prefs {
        site_theme_scheme: name.to_string(),
    };
    let json = serde_json::to_string_pretty(&prefs).map_err(|e| e.to_string())?;
    fs::write(path, json).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_scheme_name_variants() {
        assert_eq!(normalize_scheme_name("Scheme-1"), "Scheme-1");
        assert_eq!(normalize_scheme_name("Scheme 1"), "Scheme-1");
        assert_eq!(normalize_scheme_name("scheme-2"), "Scheme-2");
        assert_eq!(normalize_scheme_name("Scheme1"), "Scheme-1");
        assert_eq!(normalize_scheme_name("  Scheme - 3 "), "Scheme-3");
    }

    #[test]
    fn test_normalize_leaves_other_names_alone() {
        assert_eq!(normalize_scheme_name("Midnight"), "Midnight");
        assert_eq!(normalize_scheme_name("SchemeX"), "SchemeX");
        assert_eq!(normalize_scheme_name(""), "");
    }

    #[test]
    fn test_pick_scheme_falls_back_to_first() {
        let schemes = default_schemes();
        assert_eq!(pick_scheme(None, &schemes), "Scheme-1");
        assert_eq!(pick_scheme(Some("Nope"), &schemes), "Scheme-1");
        assert_eq!(pick_scheme(Some("scheme 2"), &schemes), "Scheme-2");
    }

    #[test]
    fn test_prefs_round_trip() {
        let dir = std::env::temp_dir().join("album-shelf-test-prefs");
        let path = dir.join("prefs.json");
        save_scheme_to(&path, "Scheme-2").unwrap();
        assert_eq!(load_scheme_from(&path).as_deref(), Some("Scheme-2"));
        let _ = fs::remove_dir_all(&dir);
    }
}
