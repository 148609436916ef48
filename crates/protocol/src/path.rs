//! Remote path normalization.
//!
//! Remote paths are `/`-joined segments without a leading slash; the root
//! is the empty string. [`wire_path`] adds the leading slash the firmware
//! expects.

/// Normalizes a remote path.
///
/// Segments are consumed left to right: empty and `.` segments are
/// dropped, and `..` removes the segment before it. A `..` with nothing
/// before it is dropped, so the result never climbs above the root.
///
/// This is a full normalization, not only a trim of trailing special
/// segments: `a/b/../c` becomes `a/c`. On paths whose special segments
/// are all trailing both readings give the same result.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }
    segments.join("/")
}

/// Joins two path segments with `/` and normalizes the result.
pub fn join_paths(base: &str, rel: &str) -> String {
    if base.is_empty() {
        return clean_path(rel);
    }
    clean_path(&format!("{base}/{rel}"))
}

/// Formats an already-cleaned path the way it travels in request frames.
pub fn wire_path(clean: &str) -> String {
    format!("/{clean}")
}
