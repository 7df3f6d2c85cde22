//! Cooler URIs: `path` or `path::/group/path`

use super::error::{CoolerError, Result};
use std::fmt;
use std::path::Path;

pub const URI_SEPARATOR: &str = "::";

/// File path plus the HDF5 group holding the Cooler
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoolerUri {
    pub file_path: String,
    pub group_path: String,
}

impl CoolerUri {
    pub fn new(file_path: impl Into<String>, group_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            group_path: normalize_group(&group_path.into()),
        }
    }

    /// Split `uri` at the first `::`. A missing group denotes the root.
    pub fn parse(uri: &str) -> Result<Self> {
        let (file_path, group_path) = match uri.find(URI_SEPARATOR) {
            Some(pos) => (&uri[..pos], &uri[pos + URI_SEPARATOR.len()..]),
            None => (uri, ""),
        };
        if file_path.is_empty() {
            return Err(CoolerError::MalformedUri(uri.to_string()));
        }
        Ok(Self::new(file_path, group_path))
    }

    #[inline]
    pub fn path(&self) -> &Path {
        Path::new(&self.file_path)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.group_path == "/"
    }

    /// URI of a child group
    pub fn join(&self, child: &str) -> Self {
        let child = child.trim_start_matches('/');
        let group = if self.is_root() {
            format!("/{}", child)
        } else {
            format!("{}/{}", self.group_path, child)
        };
        Self::new(self.file_path.clone(), group)
    }
}

impl fmt::Display for CoolerUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "{}", self.file_path)
        } else {
            write!(f, "{}{}{}", self.file_path, URI_SEPARATOR, self.group_path)
        }
    }
}

/// Shorthand for [`CoolerUri::parse`]
pub fn parse_uri(uri: &str) -> Result<CoolerUri> {
    CoolerUri::parse(uri)
}

fn normalize_group(group: &str) -> String {
    let trimmed = group.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
