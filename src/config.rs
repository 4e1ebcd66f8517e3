use crate::dialect::DialectKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings read from `seqeline.toml`; command-line flags win over these.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SeqelineConfig {
    pub schema: Option<String>,
    pub dialect: Option<DialectKind>,
    pub format: Option<String>,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("seqeline.toml")
}

pub fn default_schema_path() -> PathBuf {
    PathBuf::from("schema.json")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<SeqelineConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: SeqelineConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &SeqelineConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

impl SeqelineConfig {
    /// Flag value if given, else the configured one, else the default.
    pub fn schema_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.schema.as_ref().map(PathBuf::from))
            .unwrap_or_else(default_schema_path)
    }

    pub fn dialect(&self, flag: Option<DialectKind>) -> DialectKind {
        flag.or(self.dialect).unwrap_or_default()
    }

    pub fn format(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| self.format.clone())
            .unwrap_or_else(|| "text".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(Some(&dir.path().join("seqeline.toml"))).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seqeline.toml");
        let config = SeqelineConfig {
            schema: Some("meta/tables.json".into()),
            dialect: Some(DialectKind::Pmd),
            format: None,
        };
        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.dialect, Some(DialectKind::Pmd));
        assert_eq!(loaded.schema_path(None), PathBuf::from("meta/tables.json"));
        assert_eq!(loaded.format(None), "text");
    }

    #[test]
    fn test_flags_override_file() {
        let config: SeqelineConfig = toml::from_str("dialect = \"pmd\"\nformat = \"json\"\n").unwrap();
        assert_eq!(config.dialect(Some(DialectKind::Plsql)), DialectKind::Plsql);
        assert_eq!(config.dialect(None), DialectKind::Pmd);
        assert_eq!(config.format(Some("text")), "text");
        assert_eq!(config.schema_path(Some(Path::new("s.json"))), PathBuf::from("s.json"));
        assert_eq!(SeqelineConfig::default().schema_path(None), default_schema_path());
    }

    #[test]
    fn test_unknown_dialect_rejected() {
        assert!(toml::from_str::<SeqelineConfig>("dialect = \"tsql\"").is_err());
    }
}
