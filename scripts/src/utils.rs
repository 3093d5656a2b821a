//! Utilities for the release scripts

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;

use crate::{constants::TMP_FILE_EXTENSION, errors::ReleaseError};

/// Read and deserialize a JSON file, returning `None` if it does not exist
pub async fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ReleaseError> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ReleaseError::Store(format!("{}: {e}", path.display()))),
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| ReleaseError::Store(format!("{}: {e}", path.display())))
}

/// Serialize a value and write it to a JSON file
///
/// The value is written to a sibling temporary file which is then renamed over
/// the destination, so a crash mid-write never leaves a torn file behind.
pub async fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), ReleaseError> {
    let contents = serde_json::to_string_pretty(value)
        .map_err(|e| ReleaseError::Store(format!("{}: {e}", path.display())))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ReleaseError::Store(format!("{}: {e}", parent.display())))?;
    }

    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, contents)
        .await
        .map_err(|e| ReleaseError::Store(format!("{}: {e}", tmp_path.display())))?;
    fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ReleaseError::Store(format!("{}: {e}", path.display())))
}

/// The temporary path a file is staged at before being renamed into place
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".");
    tmp.push(TMP_FILE_EXTENSION);
    PathBuf::from(tmp)
}

/// The current unix timestamp, in seconds
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// General function to prompt for input with a specific message
pub fn prompt_for_input(prompt: &str) -> io::Result<String> {
    print!("{}: ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().to_string())
}

/// Prompt the operator for a yes/no confirmation, defaulting to no
pub fn prompt_for_confirmation(prompt: &str) -> io::Result<bool> {
    loop {
        let input = prompt_for_input(&format!("{prompt} [y/N]"))?;
        match input.to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "" | "n" | "no" => return Ok(false),
            _ => println!("Please answer 'y' or 'n'."),
        }
    }
}
