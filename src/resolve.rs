//! Module id resolution.
//!
//! Ids are path-shaped keys without an extension, always `/`-separated.
//! Relative import paths resolve against the importing module's id; anything
//! else is returned as written (minus a trailing `.js`) and probed against
//! the base directory by the loader.

/// Resolve an import path against the id of the importing module.
pub fn resolve(import_path: &str, importer_id: &str) -> String {
    let path = normalize(import_path);
    let path = strip_js(&path);
    if !path.starts_with('.') {
        return path.to_string();
    }

    let importer = normalize(importer_id);
    let mut parts: Vec<&str> = importer.split('/').collect();
    parts.pop();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_none_or(|last| *last == "..") {
                    parts.push("..");
                } else {
                    parts.pop();
                }
            }
            other => parts.push(other),
        }
    }

    parts.join("/")
}

/// Canonical id for an entry path as given by the user.
pub fn entry_id(entry: &str) -> String {
    strip_js(&normalize(entry)).to_string()
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

fn strip_js(path: &str) -> &str {
    path.strip_suffix(".js").unwrap_or(path)
}

/// AMD dependency path: as written, minus a trailing `.js`.
pub fn amd_path(import_path: &str) -> String {
    strip_js(&normalize(import_path)).to_string()
}
