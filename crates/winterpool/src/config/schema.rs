use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Job specification: which folders to work, where local state lives,
/// and how to recognize text. Loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Folder watched for new applicant PDFs. Read-only to the tool.
    pub incoming_folder_id: String,

    /// Folder the pipeline owns: working copies, text companions and
    /// report artifacts all live here.
    pub processed_folder_id: String,

    /// Local directory for authorization state.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// OAuth2 client secrets exported from the API console.
    #[serde(default = "default_client_secrets_path")]
    pub client_secrets_path: PathBuf,

    #[serde(default)]
    pub ocr: OcrSettings,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./store")
}

fn default_client_secrets_path() -> PathBuf {
    PathBuf::from("./client_secrets.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrSettings {
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

fn default_dpi() -> u32 {
    300
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            dpi: 300,
        }
    }
}
