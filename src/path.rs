//! Separator canonicalization applied by the backends before a path reaches
//! the backing store.

use std::borrow::Cow;

/// Replace every `\` with `/`. Borrows when there is nothing to replace.
pub fn to_posix_path(path: &str) -> Cow<'_, str> {
    if path.contains('\\') {
        Cow::Owned(path.replace('\\', "/"))
    } else {
        Cow::Borrowed(path)
    }
}

/// Canonicalize the platform's native separators. Only Windows has a
/// second separator; elsewhere `\` is an ordinary file name character.
#[cfg(windows)]
pub fn normalize(path: &str) -> Cow<'_, str> {
    to_posix_path(path)
}

#[cfg(not(windows))]
pub fn normalize(path: &str) -> Cow<'_, str> {
    Cow::Borrowed(path)
}
