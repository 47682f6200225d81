//! Registry text-record reader
//!
//! Reads the flat `field: value` object files of a routing registry tree:
//! `data/aut-num/AS<n>` for AS names and `data/route/` / `data/route6/` for
//! route-origin authorization objects keyed by sanitized CIDR filenames of
//! the form `<network>_<length>`.
//!
//! Lines that do not look like a `field:` header continue the previous
//! field's value. Individual malformed objects are skipped with a warning;
//! an unreadable directory aborts the caller's run.

use anyhow::{anyhow, Context, Result};
use ipnet::IpNet;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A route-origin authorization object from the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoaObject {
    /// The covered CIDR
    pub prefix: IpNet,
    /// Origin ASNs authorized to announce inside the range
    pub origins: Vec<u32>,
    /// Optional maximum-length override
    pub max_length: Option<u8>,
}

/// Handle on a registry tree rooted at a directory
pub struct Registry {
    root: PathBuf,
}

impl Registry {
    /// Create a registry reader for the given root directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Fetch the name of an AS from its `aut-num` object, if present
    pub fn as_name(&self, asn: u32) -> Option<String> {
        let path = self.root.join("data").join("aut-num").join(format!("AS{}", asn));
        let fields = read_fields(&path).ok()?;
        fields.get("as-name").map(|name| name.to_string())
    }

    /// Read every route-origin authorization object, both address families
    ///
    /// Fails only when a resource directory cannot be read; malformed
    /// objects inside it are skipped with a warning.
    pub fn roa_objects(&self) -> Result<Vec<RoaObject>> {
        let mut objects = self.roa_objects_in("route", "route")?;
        objects.extend(self.roa_objects_in("route6", "route6")?);
        Ok(objects)
    }

    fn roa_objects_in(&self, dirname: &str, cidr_field: &str) -> Result<Vec<RoaObject>> {
        let dir = self.root.join("data").join(dirname);
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("cannot read registry directory {}", dir.display()))?;

        let mut objects = Vec::new();
        for entry in entries {
            let entry =
                entry.with_context(|| format!("cannot list registry directory {}", dir.display()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            match parse_roa_object(&path, cidr_field) {
                Ok(object) => objects.push(object),
                Err(e) => warn!("skipping registry object {}: {}", path.display(), e),
            }
        }
        Ok(objects)
    }
}

/// Read a registry object file into its fields
///
/// Repeated fields and continuation lines accumulate into one value joined
/// with newlines.
pub fn read_fields(path: &Path) -> Result<HashMap<String, String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("cannot read registry object {}", path.display()))?;

    let mut fields: HashMap<String, String> = HashMap::new();
    let mut last_fieldname: Option<String> = None;

    for line in content.lines() {
        let (fieldname, value) = match split_field_line(line) {
            Some((name, value)) => {
                last_fieldname = Some(name.to_string());
                (name.to_string(), value.trim().to_string())
            }
            None => match &last_fieldname {
                Some(name) => (name.clone(), line.trim().to_string()),
                None => continue,
            },
        };

        match fields.get_mut(&fieldname) {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(&value);
            }
            None => {
                fields.insert(fieldname, value);
            }
        }
    }

    Ok(fields)
}

/// Split a `field: value` header line; `None` for continuation lines
fn split_field_line(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return None;
    }
    Some((name, value))
}

fn parse_roa_object(path: &Path, cidr_field: &str) -> Result<RoaObject> {
    let fields = read_fields(path)?;

    let prefix: IpNet = match fields.get(cidr_field) {
        Some(cidr) => cidr
            .parse()
            .map_err(|e| anyhow!("bad {} field '{}': {}", cidr_field, cidr, e))?,
        // fall back to the sanitized filename, e.g. 172.20.0.0_14
        None => {
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow!("non-UTF-8 filename"))?;
            filename_to_cidr(filename)?
        }
    };

    let origin_field = fields
        .get("origin")
        .ok_or_else(|| anyhow!("missing origin field"))?;
    let origins = parse_origin_asns(origin_field)?;

    let max_length = match fields.get("max-length") {
        Some(value) => Some(
            value
                .trim()
                .parse::<u8>()
                .map_err(|e| anyhow!("bad max-length '{}': {}", value, e))?,
        ),
        None => None,
    };

    Ok(RoaObject {
        prefix,
        origins,
        max_length,
    })
}

/// Parse a sanitized CIDR filename of the form `<network>_<length>`
fn filename_to_cidr(filename: &str) -> Result<IpNet> {
    let (network, length) = filename
        .rsplit_once('_')
        .ok_or_else(|| anyhow!("filename '{}' is not <network>_<length>", filename))?;
    format!("{}/{}", network, length)
        .parse()
        .map_err(|e| anyhow!("filename '{}' is not a CIDR: {}", filename, e))
}

/// Parse whitespace-separated `AS<number>` tokens
fn parse_origin_asns(field: &str) -> Result<Vec<u32>> {
    let mut origins = Vec::new();
    for token in field.split_whitespace() {
        let digits = token
            .strip_prefix("AS")
            .ok_or_else(|| anyhow!("origin token '{}' lacks AS prefix", token))?;
        let asn = digits
            .parse::<u32>()
            .map_err(|e| anyhow!("origin token '{}': {}", token, e))?;
        origins.push(asn);
    }
    if origins.is_empty() {
        return Err(anyhow!("origin field has no ASNs"));
    }
    Ok(origins)
}
