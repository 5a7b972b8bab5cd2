use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::locator::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory that is backed up as a whole before any ALTO file is rewritten.
    pub ocr_dir: Option<String>,
    /// Name of the ALTO directory inside `ocr_dir`.
    pub alto_folder: String,
    pub ignore_patterns: Vec<String>,
    pub prefixes: PrefixConfig,
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefixConfig {
    pub block_prefix: String,
    pub line_prefix: String,
    pub word_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Number of numbered backup copies kept next to `ocr_dir`.
    pub retention: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ocr_dir: None,
            alto_folder: "alto".to_string(),
            ignore_patterns: Vec::new(),
            prefixes: PrefixConfig::default(),
            backup: BackupConfig::default(),
        }
    }
}

impl Default for PrefixConfig {
    fn default() -> Self {
        Self {
            block_prefix: "TextBlock_".to_string(),
            line_prefix: "TextLine_".to_string(),
            word_prefix: "TextWord_".to_string(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self { retention: 10 }
    }
}

impl AppConfig {
    /// Config for a given OCR directory with every other value defaulted.
    pub fn for_ocr_dir(ocr_dir: impl AsRef<Path>) -> Self {
        Self {
            ocr_dir: Some(ocr_dir.as_ref().to_string_lossy().into_owned()),
            ..Self::default()
        }
    }

    pub fn ocr_dir(&self) -> Result<PathBuf, Error> {
        match self.ocr_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => Ok(PathBuf::from(dir)),
            _ => Err(Error::InvalidConfig("ocr_dir is not set".to_string())),
        }
    }

    pub fn alto_dir(&self) -> Result<PathBuf, Error> {
        Ok(self.ocr_dir()?.join(&self.alto_folder))
    }

    /// Checks everything a run depends on before any file is touched.
    pub fn validate(&self) -> Result<(), Error> {
        self.ocr_dir()?;
        if self.alto_folder.trim().is_empty() {
            return Err(Error::InvalidConfig("alto_folder must not be empty".to_string()));
        }
        self.prefixes.validate()?;
        if self.backup.retention == 0 {
            return Err(Error::InvalidConfig(
                "backup.retention must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl PrefixConfig {
    pub fn for_role(&self, role: Role) -> &str {
        match role {
            Role::Block => &self.block_prefix,
            Role::Line => &self.line_prefix,
            Role::Word => &self.word_prefix,
        }
    }

    /// Prefixes must be non-empty and pairwise distinct, otherwise two roles
    /// could end up sharing generated identifiers.
    pub fn validate(&self) -> Result<(), Error> {
        let named = [
            ("block_prefix", &self.block_prefix),
            ("line_prefix", &self.line_prefix),
            ("word_prefix", &self.word_prefix),
        ];

        for (name, prefix) in &named {
            if prefix.is_empty() {
                return Err(Error::InvalidConfig(format!("{} must not be empty", name)));
            }
        }

        for (i, (name_a, prefix_a)) in named.iter().enumerate() {
            for (name_b, prefix_b) in &named[i + 1..] {
                if prefix_a == prefix_b {
                    return Err(Error::InvalidConfig(format!(
                        "{} and {} are both '{}'",
                        name_a, name_b, prefix_a
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Layers an optional config file (default `Config.toml`) under `ALTO_IDS_*`
/// environment variables, e.g. `ALTO_IDS_PREFIXES__BLOCK_PREFIX`.
pub fn load_configuration_from(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let file_source = match path {
        Some(path) => ConfigFile::from(path).required(true),
        None => ConfigFile::with_name("Config").required(false),
    };

    let builder = Config::builder()
        .add_source(file_source)
        .add_source(
            Environment::with_prefix("ALTO_IDS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
