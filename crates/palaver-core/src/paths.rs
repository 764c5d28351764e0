use std::env;
use std::path::PathBuf;

/// Return the user's home directory path.
///
/// Uses HOME on Unix-like systems and USERPROFILE on Windows.
pub fn get_home_dir() -> Result<String, String> {
    for var in ["HOME", "USERPROFILE"] {
        match env::var(var) {
            Ok(value) if !value.is_empty() => return Ok(value),
            _ => {}
        }
    }

    Err("Home directory not set".to_string())
}

/// Default data directory: `~/.config/palaver`.
pub fn default_data_dir() -> Result<PathBuf, String> {
    get_home_dir().map(|home| PathBuf::from(home).join(".config").join("palaver"))
}
