//! Cache file name validation.
//!
//! The cache is flat: every entry is a single file name made of the chunk
//! prefix, the URL key and the kind's extension (`remote-script.<key>.js`),
//! plus a `.part` sibling while a download is streaming. Prefixes and
//! extensions come from configuration, so names are checked before they are
//! joined onto a cache directory.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validate a cache file name.
///
/// A name is valid when it is exactly one normal path component without null
/// bytes. A leading `./` and trailing slashes are tolerated and stripped, so
/// equivalent spellings of a name resolve to the same entry.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use vendr_storage::validate_path;
///
/// assert_eq!(
///     validate_path("./remote-script.0123456789abcdef.js").unwrap(),
///     Path::new("remote-script.0123456789abcdef.js")
/// );
/// assert!(validate_path("remote-script.0123456789abcdef.css.part").is_ok());
/// assert!(validate_path("../remote-script.0123456789abcdef.js").is_err());
/// assert!(validate_path("vendor/remote-script.0123456789abcdef.js").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut components = path.components().filter(|component| *component != Component::CurDir);
    match (components.next(), components.next()) {
        // Null bytes pass through Path::components() on Unix but truncate
        // the name in C-based syscalls.
        (Some(Component::Normal(name)), None) if !name.as_encoded_bytes().contains(&0) => Ok(PathBuf::from(name)),
        _ => exn::bail!(ErrorKind::InvalidPath(path.to_path_buf())),
    }
}
