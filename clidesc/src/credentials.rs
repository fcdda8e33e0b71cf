/// Credentials files for CliDE / CliDEsc databases.
///
/// Two formats are read:
/// - `.pass`: `key=value` lines
/// - R scripts (`.R` / `.r`): `key <- "value"` assignments
///
/// Keys are matched case-insensitively with aliases, so files written for
/// the R and Python toolkits work unchanged:
///
/// | field    | accepted keys                 |
/// |----------|-------------------------------|
/// | database | `database`, `dbname`, `db`    |
/// | user     | `user`, `username`            |
/// | password | `password`, `pass`            |
/// | host     | `host`, `dbhost`              |
/// | port     | `port`, `dbport`              |
///
/// Files are parsed, never executed.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::config::ConfigError;

#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub database: String,
    pub user: String,
    pub password: String,
    pub host: Option<String>,
    pub port: Option<u16>,
}

// Keeps passwords out of debug logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

const DATABASE_KEYS: &[&str] = &["database", "dbname", "db"];
const USER_KEYS: &[&str] = &["user", "username"];
const PASSWORD_KEYS: &[&str] = &["password", "pass"];
const HOST_KEYS: &[&str] = &["host", "dbhost"];
const PORT_KEYS: &[&str] = &["port", "dbport"];

/// Reads a credentials file, choosing the parser by extension.
pub fn load_credentials(path: impl AsRef<Path>) -> Result<Credentials, ConfigError> {
    let path = path.as_ref();
    let source = path.display().to_string();
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: source.clone(),
        source: e,
    })?;

    let entries = match path.extension().and_then(|e| e.to_str()) {
        Some("pass") => parse_pass(&contents),
        Some("R") | Some("r") => parse_r(&contents),
        _ => return Err(ConfigError::UnsupportedCredentials(source)),
    };
    Credentials::from_entries(&entries, &source)
}

/// `key=value` lines. Lines without `=` are ignored; the value is
/// everything after the first `=`.
pub fn parse_pass(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// `key <- "value"` (or `key = "value"`) assignments. Comments (`#`) and
/// anything that is not a simple assignment are skipped.
pub fn parse_r(contents: &str) -> HashMap<String, String> {
    let mut entries = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once("<-").or_else(|| line.split_once('=')) else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
            continue;
        }
        let value = strip_r_value(value.trim());
        entries.insert(key.to_ascii_lowercase(), value);
    }
    entries
}

fn strip_r_value(value: &str) -> String {
    let value = value.trim_end_matches(';').trim();
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote) {
            if let Some(end) = inner.find(quote) {
                return inner[..end].to_string();
            }
        }
    }
    // Unquoted: drop any trailing comment.
    value.split('#').next().unwrap_or("").trim().to_string()
}

fn lookup<'a>(entries: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| entries.get(*k))
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

impl Credentials {
    /// Builds credentials from parsed entries. `source` names the file in
    /// error messages.
    pub fn from_entries(entries: &HashMap<String, String>, source: &str) -> Result<Self, ConfigError> {
        let required = |keys: &[&str]| {
            lookup(entries, keys)
                .map(str::to_string)
                .ok_or_else(|| ConfigError::MissingCredential {
                    key: keys[0].to_string(),
                    source_name: source.to_string(),
                })
        };

        let port = match lookup(entries, PORT_KEYS) {
            Some(raw) => Some(
                raw.parse::<u16>()
                    .map_err(|_| ConfigError::InvalidPort(raw.to_string()))?,
            ),
            None => None,
        };

        Ok(Credentials {
            database: required(DATABASE_KEYS)?,
            user: required(USER_KEYS)?,
            password: required(PASSWORD_KEYS)?,
            host: lookup(entries, HOST_KEYS).map(str::to_string),
            port,
        })
    }
}
