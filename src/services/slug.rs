//! URL slugs for courses and blog posts

use anyhow::Result;
use std::future::Future;

/// Generate a URL-friendly slug from a title.
///
/// Lowercases ASCII, turns spaces, underscores and ASCII punctuation into
/// single hyphens and keeps non-ASCII letters as they are.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || !c.is_ascii() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// First free slug among `base`, `base-2`, `base-3`, ...
///
/// `fallback` is used when the title produced an empty slug.
pub async fn unique_slug<F, Fut>(base: &str, fallback: &str, mut exists: F) -> Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let base = if base.is_empty() { fallback } else { base };
    if !exists(base.to_string()).await? {
        return Ok(base.to_string());
    }

    let mut n = 2u32;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !exists(candidate.clone()).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}
