use std::path::Path;

use crate::error::GuideError;

/// Writes the selected command verbatim, replacing whatever the file held.
pub fn write_handoff(path: &Path, command: &str) -> Result<(), GuideError> {
    std::fs::write(path, command).map_err(|source| GuideError::HandoffWrite {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), bytes = command.len(), "handoff written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn overwrites_existing_content_without_trailing_newline() {
        let dir = tempdir().expect("temp directory should create");
        let path = dir.path().join("cmd.out");
        std::fs::write(&path, "old command that is longer").expect("seed file");

        write_handoff(&path, "lsof -i :5050").expect("handoff should write");
        let written = std::fs::read_to_string(&path).expect("handoff should read back");
        assert_eq!(written, "lsof -i :5050");
    }

    #[test]
    fn missing_parent_directory_is_a_handoff_error() {
        let dir = tempdir().expect("temp directory should create");
        let path = dir.path().join("missing").join("cmd.out");

        let err = write_handoff(&path, "ls").expect_err("write should fail");
        assert!(matches!(err, GuideError::HandoffWrite { .. }));
        assert!(err.to_string().contains("cmd.out"));
    }
}
