//! Helpers for multi-document YAML manifest streams and image references.

use once_cell::sync::Lazy;
use regex::Regex;

pub const SEPARATOR: &str = "\n---\n";

static DOC_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s*\n)---\s*").expect("static regex is valid"));

/// Concatenate documents, writing the separator before each one (including the first).
pub fn combine_manifests<S: AsRef<str>>(yamls: &[S]) -> String {
    let mut out = String::new();
    for y in yamls {
        out.push_str(SEPARATOR);
        out.push_str(y.as_ref());
    }
    out
}

/// Split a YAML stream into its non-empty documents, each trimmed.
pub fn split_manifests(content: &str) -> Vec<String> {
    DOC_SEPARATOR
        .split(content.trim())
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split and parse every document of a stream.
pub fn parse_manifests(content: &str) -> Result<Vec<serde_yaml::Value>, serde_yaml::Error> {
    split_manifests(content)
        .iter()
        .map(|doc| serde_yaml::from_str(doc))
        .collect()
}

/// `ccr.ccs.tencentyun.com/koderover/nginx:stable` -> `nginx`
pub fn get_image_name(image: &str) -> String {
    let head = image.split(':').next().unwrap_or_default();
    head.rsplit('/').next().unwrap_or_default().to_string()
}
