//! Canonical locations under the media-digest home directory.
//!
//! | Location | Purpose |
//! |----------|---------|
//! | `<home>/media-digest.db` | Item store |
//! | `<home>/locks/<stage>.lock` | Stage locks |
//! | `<vault>/<export_dir>/unread/...` | Notes and digests |

use std::path::{Path, PathBuf};

/// Default home directory name under the user's home
pub const DEFAULT_HOME_DIR: &str = ".media-digest";

/// Default export folder inside the vault
pub const DEFAULT_EXPORT_DIR: &str = "5-Resources/0-Media digester";

/// Default collaborator timeout (10 minutes)
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

pub fn database(home: &Path) -> PathBuf {
    home.join("media-digest.db")
}

pub fn locks(home: &Path) -> PathBuf {
    home.join("locks")
}
