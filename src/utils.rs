use crate::error::AppError;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Short random lowercase base36 token for stored filenames.
pub fn random_token() -> String {
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u128(now_millis());
    let mut value = hasher.finish();

    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut token = String::with_capacity(13);
    while value > 0 {
        token.push(ALPHABET[(value % 36) as usize] as char);
        value /= 36;
    }
    if token.is_empty() {
        token.push('0');
    }
    token
}

/// Resolve a URL path below `base`, rejecting traversal out of it.
pub fn resolve_within(base: &Path, url_path: &str) -> Result<PathBuf, AppError> {
    let requested = PathBuf::from(url_path.trim_start_matches('/'));
    let safe_path = normalize_path(&requested)?;
    let full_path = base.join(safe_path);

    if !full_path.starts_with(base) {
        return Err(AppError::Forbidden);
    }
    Ok(full_path)
}

/// Safe path normalization to prevent directory traversal
fn normalize_path(path: &Path) -> Result<PathBuf, AppError> {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => {
                components.push(name);
            }
            Component::ParentDir => {
                if components.pop().is_none() {
                    return Err(AppError::Forbidden);
                }
            }
            _ => {} // Ignore root, current dir, etc.
        }
    }
    Ok(components.iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_token_shape() {
        let token = random_token();
        assert!(!token.is_empty());
        assert!(token.len() <= 13);
        assert!(token.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_resolve_within() {
        let base = Path::new("/srv/uploads");
        assert_eq!(
            resolve_within(base, "/a/b.pdf").unwrap(),
            PathBuf::from("/srv/uploads/a/b.pdf")
        );
        assert_eq!(
            resolve_within(base, "a/../b.pdf").unwrap(),
            PathBuf::from("/srv/uploads/b.pdf")
        );
        assert!(matches!(
            resolve_within(base, "../etc/passwd"),
            Err(AppError::Forbidden)
        ));
    }
}
