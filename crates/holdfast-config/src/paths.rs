//! Where configuration files live.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::ConfigError;

const USER_FILE: &str = "config.toml";
const PROJECT_FILE: &str = "holdfast.toml";
/// Kept out of version control.
const LOCAL_FILE: &str = "holdfast.local.toml";

/// `~/.config/holdfast/config.toml`, or the platform's equivalent.
pub(crate) fn user_config_file() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from("com", "Holdfast", "holdfast")
        .map(|dirs| dirs.config_dir().join(USER_FILE))
        .ok_or_else(|| ConfigError::XdgError("no home directory for user config".to_string()))
}

/// The project file and its local override, lowest precedence first.
pub(crate) fn project_config_files(project_dir: &Path) -> [PathBuf; 2] {
    [project_dir.join(PROJECT_FILE), project_dir.join(LOCAL_FILE)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_file_overrides_project_file() {
        let [project, local] = project_config_files(Path::new("/srv/app"));
        assert_eq!(project, Path::new("/srv/app/holdfast.toml"));
        assert_eq!(local, Path::new("/srv/app/holdfast.local.toml"));
    }

    #[test]
    fn user_file_is_named_for_holdfast() {
        if let Ok(file) = user_config_file() {
            assert!(file.to_string_lossy().contains("holdfast"));
            assert!(file.ends_with(USER_FILE));
        }
    }
}
