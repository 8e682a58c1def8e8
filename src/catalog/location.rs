use harness_core_types::protocol::STORYBOOK_KNOWN_PATH_ENDINGS;
use url::Url;

use super::{CatalogError, CatalogResult};

/// Point `url` at `ending` inside the same storybook, dropping any known
/// storybook file it already ends with. The query string is kept.
pub fn storybook_path_ending_with(url: &str, ending: &str) -> CatalogResult<String> {
    let mut parsed = Url::parse(url).map_err(|source| CatalogError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;

    let mut path = parsed.path().to_string();
    for known in STORYBOOK_KNOWN_PATH_ENDINGS {
        let trimmed = path.trim_end_matches('/');
        if let Some(stripped) = trimmed.strip_suffix(known) {
            path = stripped.to_string();
        }
    }

    parsed.set_path(&format!("{}/{}", path.trim_end_matches('/'), ending));
    Ok(parsed.to_string())
}
