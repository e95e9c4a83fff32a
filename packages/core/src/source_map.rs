// Source Map Loading
//
// Discovery of an existing source map for a freshly loaded asset, from the
// trailing `sourceMappingURL` comment: either an inline base64 data URL or
// a file next to the asset. Load failures are never fatal; the caller logs
// them and moves on.

use crate::file_system::FileSystem;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Asset types that conventionally carry a `sourceMappingURL` comment.
const SOURCE_MAP_TYPES: &[&str] = &["js", "jsx", "mjs", "cjs", "ts", "tsx", "css"];

pub fn supports_source_maps(asset_type: &str) -> bool {
    SOURCE_MAP_TYPES.contains(&asset_type)
}

static SOURCE_MAP_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?://[#@]|/\*[#@])\s*sourceMappingURL=([^\s'"*]+)"#).unwrap()
});

/// The URL named by the last `sourceMappingURL` comment in the content.
pub fn find_source_map_url(content: &str) -> Option<&str> {
    SOURCE_MAP_URL
        .captures_iter(content)
        .last()
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Load the existing source map referenced by an asset's content, if any.
///
/// `asset_path` is the absolute path of the asset; relative map URLs
/// resolve against its directory. Returns the raw map bytes.
pub fn load_existing_source_map(
    fs: &dyn FileSystem,
    asset_path: &Path,
    content: &str,
) -> Result<Option<Vec<u8>>, String> {
    let url = match find_source_map_url(content) {
        Some(url) => url,
        None => return Ok(None),
    };

    if let Some(data) = url.strip_prefix("data:") {
        let encoded = data
            .split_once("base64,")
            .map(|(_, encoded)| encoded)
            .ok_or_else(|| format!("unsupported source map data URL in {}", asset_path.display()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|err| format!("invalid base64 source map in {}: {}", asset_path.display(), err))?;
        return Ok(Some(bytes));
    }

    let map_path = asset_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(url);
    fs.read(&map_path)
        .map(Some)
        .map_err(|err| format!("failed to read {}: {}", map_path.display(), err))
}
