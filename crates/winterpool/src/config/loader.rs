use std::path::Path;

use crate::config::schema::JobSpec;
use crate::error::ConfigError;

/// Accepted recognition resolutions. Outside this range the renderer
/// either produces unreadable pages or pathological image sizes.
const MIN_DPI: u32 = 72;
const MAX_DPI: u32 = 1200;

pub fn load_jobspec<P: AsRef<Path>>(path: P) -> Result<JobSpec, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_jobspec_from_str(&content)
}

pub fn load_jobspec_from_str(content: &str) -> Result<JobSpec, ConfigError> {
    let spec: JobSpec = serde_yaml::from_str(content)?;
    validate_jobspec(&spec)?;
    Ok(spec)
}

fn validate_jobspec(spec: &JobSpec) -> Result<(), ConfigError> {
    if spec.incoming_folder_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "incoming_folder_id must not be empty".to_string(),
        });
    }

    if spec.processed_folder_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "processed_folder_id must not be empty".to_string(),
        });
    }

    // The pipeline treats incoming as read-only and processed as owned.
    // Pointing both at one folder would make it ingest its own output.
    if spec.incoming_folder_id == spec.processed_folder_id {
        return Err(ConfigError::Validation {
            message: "incoming_folder_id and processed_folder_id must differ".to_string(),
        });
    }

    if spec.ocr.languages.iter().any(|lang| lang.trim().is_empty()) {
        return Err(ConfigError::Validation {
            message: "ocr.languages entries must not be empty".to_string(),
        });
    }

    if !(MIN_DPI..=MAX_DPI).contains(&spec.ocr.dpi) {
        return Err(ConfigError::Validation {
            message: format!(
                "ocr.dpi must be between {} and {}, got {}",
                MIN_DPI, MAX_DPI, spec.ocr.dpi
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_spec_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "incoming_folder_id: in-folder").unwrap();
        writeln!(file, "processed_folder_id: out-folder").unwrap();

        let spec = load_jobspec(file.path()).unwrap();
        assert_eq!(spec.incoming_folder_id, "in-folder");
        assert_eq!(spec.processed_folder_id, "out-folder");
    }

    #[test]
    fn test_missing_file_reports_path() {
        match load_jobspec("/nonexistent/jobspec.yaml") {
            Err(ConfigError::ReadFile { path, .. }) => {
                assert_eq!(path.to_str().unwrap(), "/nonexistent/jobspec.yaml");
            }
            other => panic!("Expected ReadFile error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_same_folder_for_both_sides_rejected() {
        let result = load_jobspec_from_str(
            "incoming_folder_id: same\nprocessed_folder_id: same\n",
        );

        match result {
            Err(ConfigError::Validation { message }) => {
                assert!(message.contains("must differ"));
            }
            other => panic!("Expected Validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_blank_folder_id_rejected() {
        let result = load_jobspec_from_str(
            "incoming_folder_id: \"  \"\nprocessed_folder_id: out-folder\n",
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_dpi_out_of_range_rejected() {
        let result = load_jobspec_from_str(
            "\
incoming_folder_id: in-folder
processed_folder_id: out-folder
ocr:
  dpi: 20
",
        );

        match result {
            Err(ConfigError::Validation { message }) => assert!(message.contains("ocr.dpi")),
            other => panic!("Expected Validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_language_entry_rejected() {
        let result = load_jobspec_from_str(
            "\
incoming_folder_id: in-folder
processed_folder_id: out-folder
ocr:
  languages: [\"eng\", \"\"]
",
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_yaml_syntax_error_surfaces() {
        let result = load_jobspec_from_str("incoming_folder_id: [unclosed");
        assert!(matches!(result, Err(ConfigError::ParseYaml(_))));
    }
}
