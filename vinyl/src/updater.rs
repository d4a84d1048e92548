//! Self-update: fetch a version manifest, compare semantic versions,
//! and when newer, download the replacement executable and hand off to
//! a small swap script that restarts the app.

use serde::Deserialize;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Duration;

const MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/vinylplayer/vinyl/main/version.json";

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateManifest {
    pub latest_version: String,
    pub download_url: String,
    #[serde(default)]
    pub changelog: Vec<String>,
}

pub enum UpdateEvent {
    Available(UpdateManifest),
    UpToDate,
    CheckFailed(String),
    /// The swap script is running; the app should close now.
    Restarting,
    InstallFailed(String),
}

/// True when `latest` is a strictly newer semantic version. Unparsable
/// versions never trigger an update.
pub fn is_newer(current: &str, latest: &str) -> bool {
    match (semver::Version::parse(current), semver::Version::parse(latest)) {
        (Ok(current), Ok(latest)) => latest > current,
        _ => false,
    }
}

/// Fetch the manifest and report whether an update is available.
pub fn spawn_check(tx: Sender<UpdateEvent>) {
    std::thread::spawn(move || {
        let event = match fetch_manifest() {
            Ok(manifest) => {
                if is_newer(env!("CARGO_PKG_VERSION"), &manifest.latest_version) {
                    UpdateEvent::Available(manifest)
                } else {
                    UpdateEvent::UpToDate
                }
            }
            Err(e) => UpdateEvent::CheckFailed(e),
        };
        let _ = tx.send(event);
    });
}

fn fetch_manifest() -> Result<UpdateManifest, String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| e.to_string())?;
    let response = client
        .get(MANIFEST_URL)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| e.to_string())?;
    response.json().map_err(|e| e.to_string())
}

/// Download the new executable next to the current one and launch the
/// platform swap script. On success the app must exit immediately so
/// the script can replace the binary.
pub fn spawn_install(manifest: UpdateManifest, tx: Sender<UpdateEvent>) {
    std::thread::spawn(move || {
        let event = match install(&manifest) {
            Ok(()) => UpdateEvent::Restarting,
            Err(e) => UpdateEvent::InstallFailed(e),
        };
        let _ = tx.send(event);
    });
}

fn install(manifest: &UpdateManifest) -> Result<(), String> {
    let current_exe = std::env::current_exe().map_err(|e| e.to_string())?;
    let new_exe = current_exe.with_extension("new");

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()
        .map_err(|e| e.to_string())?;
    let bytes = client
        .get(&manifest.download_url)
        .send()
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.bytes())
        .map_err(|e| e.to_string())?;
    std::fs::write(&new_exe, &bytes).map_err(|e| format!("write new binary: {e}"))?;

    let script = write_swap_script(&current_exe, &new_exe).map_err(|e| {
        let _ = std::fs::remove_file(&new_exe);
        e
    })?;
    launch_script(&script).map_err(|e| {
        let _ = std::fs::remove_file(&new_exe);
        e
    })
}

#[cfg(target_os = "windows")]
fn write_swap_script(current: &std::path::Path, new: &std::path::Path) -> Result<PathBuf, String> {
    let script_path = current.with_file_name("update_installer.bat");
    let contents = format!(
        "@echo off\r\n\
         timeout /t 2 /nobreak > NUL\r\n\
         move /Y \"{new}\" \"{current}\" > NUL\r\n\
         start \"\" \"{current}\"\r\n\
         (goto) 2>nul & del \"%~f0\"\r\n",
        new = new.display(),
        current = current.display(),
    );
    std::fs::write(&script_path, contents).map_err(|e| format!("write script: {e}"))?;
    Ok(script_path)
}

#[cfg(not(target_os = "windows"))]
fn write_swap_script(current: &std::path::Path, new: &std::path::Path) -> Result<PathBuf, String> {
    use std::os::unix::fs::PermissionsExt;

    let script_path = current.with_file_name("update_installer.sh");
    let contents = format!(
        "#!/bin/sh\n\
         sleep 2\n\
         mv \"{new}\" \"{current}\"\n\
         chmod +x \"{current}\"\n\
         \"{current}\" &\n\
         rm -- \"$0\"\n",
        new = new.display(),
        current = current.display(),
    );
    std::fs::write(&script_path, contents).map_err(|e| format!("write script: {e}"))?;
    std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| format!("chmod script: {e}"))?;
    Ok(script_path)
}

#[cfg(target_os = "windows")]
fn launch_script(script: &std::path::Path) -> Result<(), String> {
    std::process::Command::new("cmd")
        .arg("/C")
        .arg(script)
        .spawn()
        .map(|_| ())
        .map_err(|e| format!("launch script: {e}"))
}

#[cfg(not(target_os = "windows"))]
fn launch_script(script: &std::path::Path) -> Result<(), String> {
    std::process::Command::new("sh")
        .arg(script)
        .spawn()
        .map(|_| ())
        .map_err(|e| format!("launch script: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_newer() {
        assert!(is_newer("1.0.4", "1.0.5"));
        assert!(is_newer("1.0.4", "2.0.0"));
        assert!(!is_newer("1.0.4", "1.0.4"));
        assert!(!is_newer("1.0.4", "1.0.3"));
        assert!(!is_newer("1.0.4", "not-a-version"));
        assert!(!is_newer("garbage", "1.0.5"));
    }

    #[test]
    fn test_manifest_changelog_optional() {
        let manifest: UpdateManifest = serde_json::from_str(
            r#"{ "latest_version": "1.0.5", "download_url": "https://example.com/vinyl" }"#,
        )
        .unwrap();
        assert_eq!(manifest.latest_version, "1.0.5");
        assert!(manifest.changelog.is_empty());

        let manifest: UpdateManifest = serde_json::from_str(
            r#"{ "latest_version": "1.0.5", "download_url": "https://x", "changelog": ["fix"] }"#,
        )
        .unwrap();
        assert_eq!(manifest.changelog, vec!["fix".to_string()]);
    }
}
