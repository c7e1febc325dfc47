//! Structured text format of the config files.
//!
//! A TOML subset through `toml_edit`: keys before any section belong to
//! [`ROOT_GROUP`], every `[section]` is a group, and every value is a string.
//! Primary-format files start with a `;` preamble that stops the file from
//! being executed when requested over the web; leading `;` lines are stripped
//! again before parsing.
//!
//! Legacy `.ini` files are hand-edited `key=value` lines, so bare values and
//! `;` comments are accepted there and turned into TOML before parsing.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use paths::ConfigFormat;
use toml_edit::{DocumentMut, Item, Table, Value};
use tracing::debug;

use crate::errors::{SettingsError, SettingsResult};
use crate::tree::{ROOT_GROUP, SettingsTree};

pub const PRIMARY_PREAMBLE: &str = ";<?php exit; ?>\n;*** DO NOT REMOVE THE LINE ABOVE ***\n";

/// Parse config text. `origin` only shows up in error messages.
pub fn parse(text: &str, origin: &str) -> SettingsResult<SettingsTree> {
    parse_as(text, origin, ConfigFormat::Primary)
}

/// Parse config text written in `format`.
pub fn parse_as(text: &str, origin: &str, format: ConfigFormat) -> SettingsResult<SettingsTree> {
    let body = strip_preamble(text);
    let body = match format {
        ConfigFormat::Primary => Cow::Borrowed(body),
        ConfigFormat::Legacy => Cow::Owned(legacy_to_toml(body)),
    };
    let doc: DocumentMut = body
        .parse()
        .map_err(|e: toml_edit::TomlError| SettingsError::parse(origin, e.to_string()))?;

    let mut tree = SettingsTree::new();
    for (name, item) in doc.iter() {
        match item {
            Item::Value(Value::InlineTable(table)) => {
                let mut values = Vec::with_capacity(table.len());
                for (key, value) in table.iter() {
                    values.push((key, scalar(value, origin, name, key)?));
                }
                tree.set_bulk(name, values);
            }
            Item::Value(value) => {
                tree.set(ROOT_GROUP, name, scalar(value, origin, ROOT_GROUP, name)?);
            }
            Item::Table(table) => {
                let mut values = Vec::with_capacity(table.len());
                for (key, item) in table.iter() {
                    let Item::Value(value) = item else {
                        return Err(SettingsError::parse(
                            origin,
                            format!("[{name}] {key}: nested sections are not supported"),
                        ));
                    };
                    values.push((key, scalar(value, origin, name, key)?));
                }
                tree.set_bulk(name, values);
            }
            Item::ArrayOfTables(_) | Item::None => {
                return Err(SettingsError::parse(
                    origin,
                    format!("{name}: arrays of tables are not supported"),
                ));
            }
        }
    }
    Ok(tree)
}

fn strip_preamble(text: &str) -> &str {
    let mut rest = text;
    while rest.trim_start_matches([' ', '\t']).starts_with(';') {
        rest = match rest.find('\n') {
            Some(end) => &rest[end + 1..],
            None => "",
        };
    }
    rest
}

/// Rewrite ini-style lines so `toml_edit` accepts them. Quoted values are
/// left alone; bare values lose their `;` comment and become strings.
fn legacy_to_toml(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 16);
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with(';') {
            // ini comment, kept as a blank line so error positions still match
        } else if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("[[") {
            out.push_str(line);
        } else if let Some(section) = trimmed.strip_prefix('[') {
            match section.split_once(']') {
                Some((name, _)) if !is_quoted(name.trim()) => {
                    out.push('[');
                    out.push_str(&toml_key(name.trim()));
                    out.push(']');
                }
                _ => out.push_str(line),
            }
        } else if let Some((key, value)) = trimmed.split_once('=') {
            let (key, value) = (key.trim(), value.trim());
            out.push_str(&toml_key(key));
            out.push_str(" = ");
            if is_quoted(value) || value.starts_with(['[', '{']) {
                out.push_str(value);
            } else {
                let bare = value.split(';').next().unwrap_or_default().trim();
                out.push_str(&basic_string(bare));
            }
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

fn is_quoted(text: &str) -> bool {
    text.starts_with(['"', '\''])
}

fn toml_key(key: &str) -> String {
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if bare || is_quoted(key) {
        key.to_string()
    } else {
        basic_string(key)
    }
}

fn basic_string(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            c if c.is_control() && c != '\t' => quoted.push_str(&format!("\\u{:04X}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn scalar(value: &Value, origin: &str, group: &str, key: &str) -> SettingsResult<String> {
    match value {
        Value::String(s) => Ok(s.value().clone()),
        Value::Integer(i) => Ok(i.value().to_string()),
        Value::Float(f) => Ok(f.value().to_string()),
        Value::Boolean(b) => Ok(b.value().to_string()),
        Value::Datetime(d) => Ok(d.value().to_string()),
        Value::Array(_) | Value::InlineTable(_) => Err(SettingsError::parse(
            origin,
            format!("[{group}] {key}: only scalar values are supported"),
        )),
    }
}

/// Serialize `tree` in the given format.
///
/// Root keys and section names share one namespace in the file, so a root key
/// named like a section is a [`SettingsError::KeyConflict`].
pub fn to_text(tree: &SettingsTree, format: ConfigFormat) -> SettingsResult<String> {
    let mut doc = DocumentMut::new();
    for (name, group) in tree.groups() {
        if name == ROOT_GROUP {
            for (key, value) in group {
                if tree.has_group(key) {
                    return Err(SettingsError::KeyConflict(key.clone()));
                }
                doc.insert(key, toml_edit::value(value.as_str()));
            }
            continue;
        }
        let mut table = Table::new();
        for (key, value) in group {
            table.insert(key, toml_edit::value(value.as_str()));
        }
        doc.insert(name, Item::Table(table));
    }

    Ok(match format {
        ConfigFormat::Primary => format!("{PRIMARY_PREAMBLE}{doc}"),
        ConfigFormat::Legacy => doc.to_string(),
    })
}

/// Read and parse a config file. A missing file is [`SettingsError::NotFound`].
pub fn read_file(path: &Path) -> SettingsResult<SettingsTree> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SettingsError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    parse_as(&text, &path.display().to_string(), ConfigFormat::from_path(path))
}

/// Write `tree` to `path` in the format its extension names.
///
/// The content goes to a temporary sibling first and is renamed into place, so
/// readers never see a half-written file. An existing file keeps its
/// permissions.
pub fn write_file(path: &Path, tree: &SettingsTree) -> SettingsResult<()> {
    let text = to_text(tree, ConfigFormat::from_path(path))?;
    let tmp = temp_sibling(path)?;
    let permissions = fs::metadata(path).ok().map(|m| m.permissions());

    let res = (|| -> std::io::Result<()> {
        let mut f = File::create(&tmp)?;
        // before any content lands in the temp file
        if let Some(permissions) = permissions {
            f.set_permissions(permissions)?;
        }
        f.write_all(text.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, path)?;
        sync_parent(path)
    })();

    if let Err(e) = res {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    debug!(path = %path.display(), bytes = text.len(), "config file written");
    Ok(())
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => File::open(dir)?.sync_all(),
        None => Ok(()),
    }
}

// Directories cannot be opened as files here.
#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn temp_sibling(path: &Path) -> SettingsResult<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SettingsError::InvalidPath(path.to_path_buf()))?;
    Ok(path.with_file_name(format!(".{name}.tmp")))
}
