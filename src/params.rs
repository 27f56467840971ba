//! Task parameters.
//!
//! Parameters arrive untyped, from a YAML/JSON params file or from
//! `key=value` pairs on the command line. This module validates them once
//! and produces an [`InstallRequest`]; nothing past this boundary sees a
//! string-typed boolean.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::config::Defaults;
use crate::error::{Error, Result};
use crate::session::DeviceParams;
use crate::transaction::{CandidateConfig, LoadMode, RunIntent};

/// Untyped parameters for one device
pub type TaskParams = IndexMap<String, Value>;

/// Every parameter an install task accepts
pub const KNOWN_PARAMS: &[&str] = &[
    "hostname",
    "username",
    "password",
    "dev_os",
    "platform",
    "timeout",
    "config_file",
    "commit_changes",
    "replace_config",
    "get_diffs",
    "diff_file",
    "archive_file",
    "optional_args",
    "provider",
];

/// Parse a boolean literal (`true/yes/on/1`, `false/no/off/0`, any case)
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Typed accessors over [`TaskParams`]
pub trait ParamExt {
    /// String value, if present
    fn get_string(&self, key: &str) -> Result<Option<String>>;
    /// String value, or `MissingParameter`
    fn get_string_required(&self, key: &str) -> Result<String>;
    /// Boolean value, if present
    fn get_bool(&self, key: &str) -> Result<Option<bool>>;
    /// Boolean value, or `MissingParameter`
    fn get_bool_required(&self, key: &str) -> Result<bool>;
    /// Non-negative integer value, if present
    fn get_u64(&self, key: &str) -> Result<Option<u64>>;
    /// Map value, if present
    fn get_map(&self, key: &str) -> Result<Option<IndexMap<String, Value>>>;
}

impl ParamExt for TaskParams {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(v.to_string())),
            Some(_) => Err(Error::invalid_parameter(format!(
                "{} must be a string",
                key
            ))),
        }
    }

    fn get_string_required(&self, key: &str) -> Result<String> {
        match self.get_string(key)? {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(Error::MissingParameter(key.to_string())),
        }
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => parse_bool(s).map(Some).ok_or_else(|| {
                Error::invalid_parameter(format!("{} must be a boolean, got '{}'", key, s))
            }),
            Some(Value::Number(n)) => match n.as_u64() {
                Some(0) => Ok(Some(false)),
                Some(1) => Ok(Some(true)),
                _ => Err(Error::invalid_parameter(format!(
                    "{} must be a boolean, got {}",
                    key, n
                ))),
            },
            Some(_) => Err(Error::invalid_parameter(format!(
                "{} must be a boolean",
                key
            ))),
        }
    }

    fn get_bool_required(&self, key: &str) -> Result<bool> {
        self.get_bool(key)?
            .ok_or_else(|| Error::MissingParameter(key.to_string()))
    }

    fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        let invalid = || Error::invalid_parameter(format!("{} must be a positive integer", key));
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(invalid),
            Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| invalid()),
            Some(_) => Err(invalid()),
        }
    }

    fn get_map(&self, key: &str) -> Result<Option<IndexMap<String, Value>>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            )),
            Some(_) => Err(Error::invalid_parameter(format!("{} must be a map", key))),
        }
    }
}

/// Fill parameters missing from `params` with the entries of `provider`.
///
/// Directly given parameters always win.
pub fn merge_provider(params: &TaskParams) -> Result<TaskParams> {
    let mut merged = params.clone();
    let provider = match merged.shift_remove("provider") {
        None | Some(Value::Null) => return Ok(merged),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(Error::invalid_parameter("provider must be a map")),
    };

    for (key, value) in provider {
        if key == "provider" {
            return Err(Error::invalid_parameter("provider cannot be nested"));
        }
        merged.entry(key).or_insert(value);
    }
    Ok(merged)
}

fn check_known(params: &TaskParams) -> Result<()> {
    let unknown: Vec<&str> = params
        .keys()
        .map(String::as_str)
        .filter(|k| !KNOWN_PARAMS.contains(k))
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(Error::invalid_parameter(format!(
            "unsupported parameters: {}",
            unknown.join(", ")
        )))
    }
}

/// A fully typed install task for one device
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// How to reach the device
    pub device: DeviceParams,
    /// Configuration to stage
    pub candidate: CandidateConfig,
    /// Check mode, commit and diff flags
    pub intent: RunIntent,
    /// Where to write the diff
    pub diff_file: Option<PathBuf>,
    /// Where to archive the running configuration before staging
    pub archive_file: Option<PathBuf>,
}

impl InstallRequest {
    /// Validate `params` and load the candidate file
    pub fn from_params(params: &TaskParams, defaults: &Defaults, check_mode: bool) -> Result<Self> {
        let params = merge_provider(params)?;
        check_known(&params)?;

        let hostname = params.get_string_required("hostname")?;
        let username = params.get_string_required("username")?;
        let family = match params.get_string("dev_os")? {
            Some(family) => family,
            None => params
                .get_string("platform")?
                .ok_or_else(|| Error::MissingParameter("dev_os".to_string()))?,
        };

        let timeout = params.get_u64("timeout")?.unwrap_or(defaults.timeout);
        if timeout == 0 {
            return Err(Error::invalid_parameter("timeout must be greater than 0"));
        }

        let mut device = DeviceParams::new(hostname, username, family).with_timeout(timeout);
        device.password = params.get_string("password")?;
        if let Some(optional_args) = params.get_map("optional_args")? {
            device.optional_args = optional_args;
        }

        let config_file = PathBuf::from(params.get_string_required("config_file")?);
        let mode = if params.get_bool("replace_config")?.unwrap_or(false) {
            LoadMode::Replace
        } else {
            LoadMode::Merge
        };
        let candidate = load_candidate(&config_file, mode)?;

        let intent = RunIntent::new(
            check_mode,
            params.get_bool_required("commit_changes")?,
            params.get_bool("get_diffs")?.unwrap_or(defaults.get_diffs),
        );

        Ok(Self {
            device,
            candidate,
            intent,
            diff_file: params.get_string("diff_file")?.map(PathBuf::from),
            archive_file: params.get_string("archive_file")?.map(PathBuf::from),
        })
    }
}

fn load_candidate(path: &Path, mode: LoadMode) -> Result<CandidateConfig> {
    CandidateConfig::from_file(path, mode).map_err(|e| match e {
        Error::FileNotFound(path) => Error::invalid_parameter(format!(
            "config_file: file not found: {}",
            path.display()
        )),
        other => other,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParamsFile {
    Single(TaskParams),
    Many(Vec<TaskParams>),
}

/// Load parameters from a YAML or JSON file holding one map or a list of maps
pub fn load_params_file(path: impl AsRef<Path>) -> Result<Vec<TaskParams>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;

    let parsed: ParamsFile = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };
    let entries = match parsed {
        ParamsFile::Single(params) => vec![params],
        ParamsFile::Many(list) => list,
    };
    if entries.is_empty() {
        return Err(Error::invalid_parameter(format!(
            "{}: no devices defined",
            path.display()
        )));
    }
    Ok(entries)
}

/// Parse `key=value` arguments; each argument may hold several shell-quoted pairs.
///
/// `optional_args` and `provider` values are parsed as YAML so that
/// `optional_args='{transport: local}'` yields a map. Other values stay
/// strings and are typed by [`InstallRequest::from_params`].
pub fn parse_key_value(args: &[String]) -> Result<TaskParams> {
    let mut params = TaskParams::new();
    for arg in args {
        let words = shell_words::split(arg)
            .map_err(|e| Error::invalid_parameter(format!("cannot parse '{}': {}", arg, e)))?;
        for word in words {
            let (key, value) = word.split_once('=').ok_or_else(|| {
                Error::invalid_parameter(format!("expected key=value, got '{}'", word))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::invalid_parameter(format!(
                    "empty key in '{}'",
                    word
                )));
            }
            let value = match key {
                "optional_args" | "provider" => serde_yaml::from_str::<Value>(value)?,
                _ => Value::String(value.to_string()),
            };
            params.insert(key.to_string(), value);
        }
    }
    Ok(params)
}

/// Overlay command-line parameters on every entry
pub fn apply_overrides(entries: &mut [TaskParams], overrides: &TaskParams) {
    for entry in entries.iter_mut() {
        for (key, value) in overrides {
            entry.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;

    fn params(value: Value) -> TaskParams {
        serde_json::from_value(value).unwrap()
    }

    fn candidate_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hostname r1").unwrap();
        file
    }

    #[test]
    fn test_parse_bool() {
        for s in ["true", "YES", "On", "1"] {
            assert_eq!(parse_bool(s), Some(true), "{}", s);
        }
        for s in ["false", "No", "OFF", "0"] {
            assert_eq!(parse_bool(s), Some(false), "{}", s);
        }
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_get_bool_rejects_garbage() {
        let p = params(json!({"commit_changes": "sure"}));
        let err = p.get_bool("commit_changes").unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert_eq!(err.exit_code(), 4);

        let p = params(json!({"commit_changes": 2}));
        assert!(p.get_bool("commit_changes").is_err());
    }

    #[test]
    fn test_get_u64() {
        let p = params(json!({"a": 30, "b": "45", "c": -1, "d": "x"}));
        assert_eq!(p.get_u64("a").unwrap(), Some(30));
        assert_eq!(p.get_u64("b").unwrap(), Some(45));
        assert!(p.get_u64("c").is_err());
        assert!(p.get_u64("d").is_err());
        assert_eq!(p.get_u64("missing").unwrap(), None);
    }

    #[test]
    fn test_provider_fills_missing_only() {
        let p = params(json!({
            "hostname": "r1",
            "provider": {"hostname": "ignored", "username": "admin", "password": "secret"}
        }));
        let merged = merge_provider(&p).unwrap();
        assert_eq!(merged["hostname"], json!("r1"));
        assert_eq!(merged["username"], json!("admin"));
        assert!(!merged.contains_key("provider"));
    }

    #[test]
    fn test_provider_must_be_map() {
        let p = params(json!({"provider": "r1"}));
        assert!(matches!(
            merge_provider(&p).unwrap_err(),
            Error::InvalidParameter(_)
        ));
    }

    #[test]
    fn test_request_from_params() {
        let file = candidate_file();
        let p = params(json!({
            "hostname": "r1",
            "username": "admin",
            "password": "secret",
            "dev_os": "junos",
            "config_file": file.path(),
            "commit_changes": "yes",
            "replace_config": true,
            "diff_file": "/tmp/r1.diff",
            "optional_args": {"port": 2222}
        }));
        let request = InstallRequest::from_params(&p, &Defaults::default(), false).unwrap();
        assert_eq!(request.device.hostname, "r1");
        assert_eq!(request.device.family, "junos");
        assert_eq!(request.device.password.as_deref(), Some("secret"));
        assert_eq!(request.device.timeout, 60);
        assert_eq!(request.device.optional_args["port"], json!(2222));
        assert_eq!(request.candidate.mode(), LoadMode::Replace);
        assert_eq!(request.candidate.content(), "hostname r1\n");
        assert_eq!(request.intent, RunIntent::new(false, true, true));
        assert_eq!(request.diff_file, Some(PathBuf::from("/tmp/r1.diff")));
        assert_eq!(request.archive_file, None);
        assert!(!format!("{:?}", request).contains("secret"));
    }

    #[test]
    fn test_request_platform_alias_and_defaults() {
        let file = candidate_file();
        let p = params(json!({
            "hostname": "r1",
            "username": "admin",
            "platform": "eos",
            "config_file": file.path(),
            "commit_changes": false,
            "timeout": "15"
        }));
        let defaults = Defaults {
            get_diffs: false,
            ..Defaults::default()
        };
        let request = InstallRequest::from_params(&p, &defaults, true).unwrap();
        assert_eq!(request.device.family, "eos");
        assert_eq!(request.device.timeout, 15);
        assert_eq!(request.candidate.mode(), LoadMode::Merge);
        assert_eq!(request.intent, RunIntent::new(true, false, false));
    }

    #[test]
    fn test_request_missing_and_invalid() {
        let file = candidate_file();
        let base = json!({
            "hostname": "r1",
            "username": "admin",
            "dev_os": "mock",
            "config_file": file.path(),
            "commit_changes": true
        });

        let mut p = params(base.clone());
        p.shift_remove("commit_changes");
        let err = InstallRequest::from_params(&p, &Defaults::default(), false).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(ref k) if k == "commit_changes"));

        let mut p = params(base.clone());
        p.shift_remove("dev_os");
        let err = InstallRequest::from_params(&p, &Defaults::default(), false).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(ref k) if k == "dev_os"));

        let mut p = params(base.clone());
        p.insert("timeout".into(), json!(0));
        assert!(InstallRequest::from_params(&p, &Defaults::default(), false).is_err());

        let mut p = params(base.clone());
        p.insert("comit_changes".into(), json!(true));
        let err = InstallRequest::from_params(&p, &Defaults::default(), false).unwrap_err();
        assert!(err.to_string().contains("comit_changes"));

        let mut p = params(base);
        p.insert("config_file".into(), json!("/nonexistent/r1.conf"));
        let err = InstallRequest::from_params(&p, &Defaults::default(), false).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_parse_key_value() {
        let args = vec![
            "hostname=r1 username=admin".to_string(),
            "optional_args='{transport: local, port: 22}'".to_string(),
            "commit_changes=true".to_string(),
        ];
        let p = parse_key_value(&args).unwrap();
        assert_eq!(p["hostname"], json!("r1"));
        assert_eq!(p["username"], json!("admin"));
        assert_eq!(p["optional_args"], json!({"transport": "local", "port": 22}));
        assert_eq!(p["commit_changes"], json!("true"));
    }

    #[test]
    fn test_parse_key_value_errors() {
        assert!(parse_key_value(&["hostname".to_string()]).is_err());
        assert!(parse_key_value(&["=r1".to_string()]).is_err());
        assert!(parse_key_value(&["hostname='r1".to_string()]).is_err());
    }

    #[test]
    fn test_load_params_file_single_and_list() {
        let dir = tempfile::tempdir().unwrap();

        let single = dir.path().join("single.yml");
        std::fs::write(&single, "hostname: r1\ncommit_changes: yes\n").unwrap();
        let entries = load_params_file(&single).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["hostname"], json!("r1"));

        let list = dir.path().join("list.json");
        std::fs::write(&list, r#"[{"hostname": "r1"}, {"hostname": "r2"}]"#).unwrap();
        let entries = load_params_file(&list).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["hostname"], json!("r2"));

        let empty = dir.path().join("empty.yml");
        std::fs::write(&empty, "[]\n").unwrap();
        assert!(load_params_file(&empty).is_err());

        assert!(matches!(
            load_params_file(dir.path().join("missing.yml")).unwrap_err(),
            Error::FileNotFound(_)
        ));
    }

    #[test]
    fn test_apply_overrides() {
        let mut entries = vec![
            params(json!({"hostname": "r1", "commit_changes": true})),
            params(json!({"hostname": "r2"})),
        ];
        let overrides = params(json!({"commit_changes": "no"}));
        apply_overrides(&mut entries, &overrides);
        assert_eq!(entries[0]["commit_changes"], json!("no"));
        assert_eq!(entries[1]["commit_changes"], json!("no"));
    }
}
