use once_cell::sync::Lazy;
use regex::Regex;

static SEMVER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").unwrap());

fn pad3(n: u32) -> String {
    format!("{n:03}")
}

/// Sort key ordering newer semantic versions first. Components above 999
/// are clamped; versions without `x.y.z` sort last.
pub fn version_sort_text(version: &str) -> String {
    let Some(captures) = SEMVER_RE.captures(version) else {
        return "999999999".to_string();
    };
    (1..=3)
        .map(|i| {
            let component = captures[i].parse::<u32>().unwrap_or(999).min(999);
            pad3(999 - component)
        })
        .collect()
}

/// Escape text for literal use inside an LSP snippet.
pub fn escape_snippet(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '$' | '}' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
