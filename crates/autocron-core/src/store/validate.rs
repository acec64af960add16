//! Creation-time validation of job specs.

use std::path::Path;

use autocron_protocols::{JobSpec, ValidationError};
use nix::unistd::{access, AccessFlags};

use crate::clock::CronClock;

/// Check required fields, the cron expression and the script path.
pub fn validate_spec(spec: &JobSpec) -> Result<(), ValidationError> {
    let (cron_expression, script_path) = spec.required()?;
    CronClock::validate(cron_expression)?;
    validate_script(script_path)
}

/// The script must be an absolute path to a readable, executable file.
pub fn validate_script(path: &Path) -> Result<(), ValidationError> {
    let bad = |reason: &str| ValidationError::BadScriptPath {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    if !path.is_absolute() {
        return Err(bad("path is not absolute"));
    }
    let metadata = std::fs::metadata(path).map_err(|e| bad(&e.to_string()))?;
    if !metadata.is_file() {
        return Err(bad("not a regular file"));
    }
    access(path, AccessFlags::R_OK).map_err(|_| bad("not readable"))?;
    access(path, AccessFlags::X_OK).map_err(|_| bad("not executable"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &TempDir, name: &str, mode: u32) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_executable_script_accepted() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "ok.sh", 0o755);
        assert!(validate_script(&path).is_ok());
    }

    #[test]
    fn test_relative_path_rejected() {
        let err = validate_script(Path::new("bin/true")).unwrap_err();
        assert!(err.to_string().contains("not absolute"));
    }

    #[test]
    fn test_missing_file_rejected() {
        let err = validate_script(Path::new("/nonexistent/autocron/script.sh")).unwrap_err();
        assert!(matches!(err, ValidationError::BadScriptPath { .. }));
    }

    #[test]
    fn test_directory_rejected() {
        let dir = TempDir::new().unwrap();
        let err = validate_script(dir.path()).unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }

    #[test]
    fn test_non_executable_rejected() {
        // Root bypasses permission bits for reads but not for execute when
        // no execute bit is set at all.
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "plain.sh", 0o644);
        let err = validate_script(&path).unwrap_err();
        assert!(err.to_string().contains("not executable"));
    }

    #[test]
    fn test_validate_spec_checks_cron_first() {
        let spec = JobSpec::new("bogus", "relative.sh");
        assert!(matches!(
            validate_spec(&spec),
            Err(ValidationError::BadCronExpression { .. })
        ));
    }

    #[test]
    fn test_validate_spec_missing_field() {
        let spec = JobSpec::default();
        assert!(matches!(
            validate_spec(&spec),
            Err(ValidationError::MissingField(_))
        ));
    }
}
