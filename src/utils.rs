// utils.rs
// Description: JSON checkpoint serialization and atomic file write helpers.
// History:
// - 2026-10-03: Keep atomic write for checkpoint save, switch helpers to typed errors.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{MlpError, Result};

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    // JSON is data only, nothing is executed on load.
    Ok(serde_json::to_string(value)?)
}

pub fn from_json<T: DeserializeOwned>(s_json: &str) -> Result<T> {
    if s_json.trim().is_empty() {
        return Err(MlpError::checkpoint("checkpoint_json_empty"));
    }
    Ok(serde_json::from_str(s_json)?)
}

pub fn write_file_atomic(p_path: &Path, s_content: &str) -> Result<()> {
    if p_path.as_os_str().is_empty() {
        return Err(MlpError::checkpoint("file_path_empty"));
    }

    if let Some(p_parent) = p_path.parent() {
        if !p_parent.as_os_str().is_empty() {
            fs::create_dir_all(p_parent)?;
        }
    }

    let mut s_tmp = p_path.as_os_str().to_owned();
    s_tmp.push(".tmp");

    fs::write(&s_tmp, s_content)?;

    // Best effort atomic replace.
    if let Err(e) = fs::rename(&s_tmp, p_path) {
        let _ = fs::remove_file(&s_tmp);
        return Err(e.into());
    }

    Ok(())
}
