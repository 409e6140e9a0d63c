use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info, trace, warn};

use crate::filter::Tab;
use crate::storage::DEFAULT_STORAGE_KEY;
use crate::store::DeletePolicy;

const RC_ENV_VAR: &str = "TASKBOARDRC";
const RC_FILE_NAME: &str = ".taskboardrc";

#[derive(Debug, Clone)]
pub struct Config {
    map: BTreeMap<String, String>,
    pub loaded_files: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert("data.location".to_string(), "~/.taskboard".to_string());
        map.insert("storage.key".to_string(), DEFAULT_STORAGE_KEY.to_string());
        map.insert("delete.policy".to_string(), "hard".to_string());
        map.insert("default.tab".to_string(), "today".to_string());
        map.insert("color".to_string(), "on".to_string());

        Self {
            map,
            loaded_files: vec![],
        }
    }
}

impl Config {
    #[tracing::instrument(skip(rc_override))]
    pub fn load(rc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Config::default();

        match resolve_rc_path(rc_override)? {
            Some(path) => {
                info!(rc = %path.display(), "loading config");
                cfg.load_file(&path)?;
            }
            None => debug!("no config file found; using defaults"),
        }

        Ok(cfg)
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in overrides {
            let key = k.strip_prefix("rc.").unwrap_or(&k).to_string();
            debug!(key = %key, value = %v, "applying override");
            self.map.insert(key, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key).map(|v| parse_bool(v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.map.iter()
    }

    pub fn delete_policy(&self) -> anyhow::Result<DeletePolicy> {
        self.get("delete.policy")
            .map(|raw| raw.parse())
            .unwrap_or(Ok(DeletePolicy::default()))
            .context("invalid delete.policy")
    }

    pub fn default_tab(&self) -> anyhow::Result<Tab> {
        self.get("default.tab")
            .map(|raw| raw.parse())
            .unwrap_or(Ok(Tab::default()))
            .context("invalid default.tab")
    }

    pub fn storage_key(&self) -> String {
        self.get("storage.key")
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string())
    }

    pub fn timezone(&self) -> Option<String> {
        self.get("timezone").filter(|tz| !tz.trim().is_empty())
    }

    #[tracing::instrument(skip(self))]
    fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        self.loaded_files.push(path.clone());

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        for (line_num, raw_line) in text.lines().enumerate() {
            let mut line = raw_line.trim();
            if let Some((before, _)) = line.split_once('#') {
                line = before.trim();
            }
            if line.is_empty() {
                continue;
            }

            if let Some(include_rest) = line.strip_prefix("include ") {
                let include_path = resolve_include_path(&base_dir, include_rest.trim())?;
                debug!(
                    file = %path.display(),
                    include = %include_path.display(),
                    line = line_num + 1,
                    "processing include"
                );

                if self.loaded_files.contains(&include_path) {
                    warn!(include = %include_path.display(), "include cycle; skipping");
                } else if include_path.exists() {
                    self.load_file(&include_path)?;
                } else {
                    warn!(include = %include_path.display(), "include file does not exist; skipping");
                }
                continue;
            }

            let (k, v) = line.split_once('=').ok_or_else(|| {
                anyhow!(
                    "invalid config line {}:{}: {}",
                    path.display(),
                    line_num + 1,
                    raw_line
                )
            })?;

            let key = k.trim().to_string();
            let value = v.trim().to_string();
            trace!(key = %key, value = %value, "loaded config key");
            self.map.insert(key, value);
        }

        Ok(())
    }
}

#[tracing::instrument(skip(cfg, override_dir))]
pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = if let Some(path) = override_dir {
        path.to_path_buf()
    } else if let Some(cfg_value) = cfg.get("data.location") {
        expand_tilde(Path::new(&cfg_value))
    } else {
        default_data_dir()?
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

fn resolve_rc_path(override_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(rc_env) = std::env::var(RC_ENV_VAR) {
        if rc_env == "/dev/null" {
            return Ok(None);
        }
        return Ok(Some(PathBuf::from(rc_env)));
    }

    let Some(home) = dirs::home_dir() else {
        warn!("cannot determine home directory; skipping config lookup");
        return Ok(None);
    };
    let candidate = home.join(RC_FILE_NAME);
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    Ok(None)
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(".taskboard"))
}

fn resolve_include_path(base_dir: &Path, include: &str) -> anyhow::Result<PathBuf> {
    if include.trim().is_empty() {
        return Err(anyhow!("include path cannot be empty"));
    }

    let expanded = expand_tilde(Path::new(include));
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base_dir.join(expanded))
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "y" | "yes" | "on" | "true"
    )
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::Config;
    use crate::filter::Tab;
    use crate::store::DeletePolicy;

    #[test]
    fn defaults_are_usable() {
        let cfg = Config::default();
        assert_eq!(cfg.delete_policy().expect("policy"), DeletePolicy::Hard);
        assert_eq!(cfg.default_tab().expect("tab"), Tab::Today);
        assert_eq!(cfg.storage_key(), "tasks");
        assert_eq!(cfg.get_bool("color"), Some(true));
        assert!(cfg.timezone().is_none());
    }

    #[test]
    fn file_with_include_and_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let extra = dir.path().join("extra.rc");
        fs::write(&extra, "default.tab = overdue\n").expect("write include");
        let rc = dir.path().join("taskboardrc");
        fs::write(
            &rc,
            "# board settings\ndelete.policy = soft  # keep history\ninclude extra.rc\ncolor=off\n",
        )
        .expect("write rc");

        let mut cfg = Config::load(Some(&rc)).expect("load config");
        assert_eq!(cfg.loaded_files.len(), 2);
        assert_eq!(cfg.delete_policy().expect("policy"), DeletePolicy::Soft);
        assert_eq!(cfg.default_tab().expect("tab"), Tab::Overdue);
        assert_eq!(cfg.get_bool("color"), Some(false));

        cfg.apply_overrides([("rc.storage.key".to_string(), "chores".to_string())]);
        assert_eq!(cfg.storage_key(), "chores");
    }

    #[test]
    fn malformed_line_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let rc = dir.path().join("taskboardrc");
        fs::write(&rc, "delete.policy soft\n").expect("write rc");
        assert!(Config::load(Some(&rc)).is_err());
    }

    #[test]
    fn invalid_policy_is_reported() {
        let mut cfg = Config::default();
        cfg.apply_overrides([("delete.policy".to_string(), "shred".to_string())]);
        assert!(cfg.delete_policy().is_err());
    }
}
