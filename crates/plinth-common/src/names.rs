/// PEP 503 name normalization: lowercase, runs of `-`, `_`, `.` collapse to
/// a single dash.
pub fn pep503_normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = false;
    for ch in name.trim().chars() {
        if matches!(ch, '-' | '_' | '.') {
            if !last_dash && !out.is_empty() {
                out.push('-');
            }
            last_dash = true;
        } else {
            out.extend(ch.to_lowercase());
            last_dash = false;
        }
    }
    out.trim_end_matches('-').to_string()
}

/// Extracts the bare project name from a PEP 508 requirement line, dropping
/// extras, version specifiers, and environment markers. Requirements gated
/// on an `extra` marker are optional and return `None`.
pub fn requirement_name(requirement: &str) -> Option<String> {
    let requirement = requirement.trim();
    if requirement.is_empty() || requirement.starts_with('#') {
        return None;
    }
    if let Some((_, marker)) = requirement.split_once(';') {
        if marker.contains("extra") {
            return None;
        }
    }
    let head = requirement.split(';').next().unwrap_or(requirement);
    let name: String = head
        .chars()
        .take_while(|ch| !matches!(ch, '[' | '(' | ' ' | '<' | '>' | '=' | '!' | '~'))
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(pep503_normalize(&name))
    }
}
