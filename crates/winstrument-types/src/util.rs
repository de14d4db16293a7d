/// Shorten a Windows path to `C:/.../file.exe`.
///
/// Both separators are accepted. Paths without a drive prefix keep an
/// empty prefix (`/.../file.exe`).
pub fn ellipsize_path(path: &str) -> String {
    let (drive, tail) = split_drive(path);
    let last = tail
        .rsplit(['\\', '/'])
        .next()
        .unwrap_or(tail);
    format!("{}/.../{}", drive, last)
}

fn split_drive(path: &str) -> (&str, &str) {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        path.split_at(2)
    } else {
        ("", path)
    }
}

/// Final path component, accepting either separator.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}
