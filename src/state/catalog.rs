/// Catalog folder scanning
///
/// A catalog is a folder of release subfolders. Each release folder is
/// named `<id>-<slug>` (e.g. `042-abbey-road`) and holds the listing
/// images plus an optional `details.json` document that the hydration
/// workers fetch later. Scanning is cheap (no image decoding) but still
/// walks the disk, so it runs on a blocking task.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::data::{extract_numeric_id, ReleaseCard};

/// Image file extensions recognized as listing images
const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

/// Name of the per-release hydration document
const DETAILS_FILE: &str = "details.json";

/// How many leading releases also appear in the featured strip
const FEATURED_COUNT: usize = 4;

/// Scan a catalog folder into release cards.
/// Runs the walk on a blocking thread to keep the UI responsive.
pub async fn load_catalog(root: PathBuf) -> Result<Vec<ReleaseCard>, String> {
    tokio::task::spawn_blocking(move || scan_catalog(&root))
        .await
        .map_err(|e| format!("Task join error: {}", e))?
}

/// Blocking implementation of the catalog scan
fn scan_catalog(root: &Path) -> Result<Vec<ReleaseCard>, String> {
    let entries = std::fs::read_dir(root)
        .map_err(|e| format!("Failed to read catalog folder {}: {}", root.display(), e))?;

    let mut folders: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    folders.sort();

    let mut cards = Vec::new();
    for folder in folders {
        if let Some(card) = scan_release(&folder) {
            cards.push(card);
        }
    }

    // The front strip shows the first few releases of the catalog
    for card in cards.iter_mut().take(FEATURED_COUNT) {
        card.featured = true;
    }

    log::info!("catalog scan: {} releases under {}", cards.len(), root.display());
    Ok(cards)
}

/// Build one card from a release folder; folders without a usable name
/// are skipped
fn scan_release(folder: &Path) -> Option<ReleaseCard> {
    let name = folder.file_name()?.to_string_lossy().to_string();
    let pk = extract_numeric_id(&name);

    let mut images = Vec::new();
    let mut details = None;
    for entry in WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.file_name().is_some_and(|n| n == DETAILS_FILE) {
            details = Some(path.to_path_buf());
            continue;
        }
        if let Some(extension) = path.extension() {
            let ext = extension.to_string_lossy().to_lowercase();
            if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                images.push(path.to_path_buf());
            }
        }
    }
    images.sort();

    Some(ReleaseCard {
        pk,
        title: title_from_folder(&name),
        release_id: name,
        images,
        formats: Vec::new(),
        details,
        featured: false,
    })
}

/// "042-abbey-road" -> "Abbey Road"
fn title_from_folder(name: &str) -> String {
    let slug = name
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches(['-', '_', ' ']);
    let slug = if slug.is_empty() { name } else { slug };
    slug.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
