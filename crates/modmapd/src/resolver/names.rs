//! Mapping of module and header names onto repository file names.

/// Stands in for the `./` of a relative header and for each dot of `..`.
const DOT_REPLACE: char = ',';
/// Replaces the partition separator of a module name.
const COLON_REPLACE: char = '-';

#[cfg(windows)]
const fn is_dir_sep(byte: u8) -> bool {
    byte == b'/' || byte == b'\\'
}

#[cfg(not(windows))]
const fn is_dir_sep(byte: u8) -> bool {
    byte == b'/'
}

#[cfg(windows)]
fn is_absolute(name: &str) -> bool {
    match name.as_bytes() {
        [first, ..] if is_dir_sep(*first) => true,
        [drive, b':', ..] => drive.is_ascii_alphabetic(),
        _ => false,
    }
}

#[cfg(not(windows))]
fn is_absolute(name: &str) -> bool {
    name.as_bytes().first().is_some_and(|byte| is_dir_sep(*byte))
}

/// Computes the repository file name for a module or header.
///
/// Headers (absolute paths and names starting `./` or `../`) keep their path
/// shape: absolute paths gain a leading `.` and a leading `./` collapses to
/// `,`. Module names have their partition `:` replaced by `-`. In every name
/// a `..` path segment becomes `,,`, so the result never leaves the
/// repository. A non-empty `suffix` is appended after a `.`.
///
/// ```
/// use modmapd::resolver::cmi_name;
///
/// assert_eq!(cmi_name("foo:part", "cmi"), "foo-part.cmi");
/// assert_eq!(cmi_name("./bar.h", "cmi"), ",bar.h.cmi");
/// assert_eq!(cmi_name("/abs/x.h", "cmi"), "./abs/x.h.cmi");
/// assert_eq!(cmi_name("../up.h", "cmi"), ",,/up.h.cmi");
/// ```
#[must_use]
pub fn cmi_name(name: &str, suffix: &str) -> String {
    let mut result = String::with_capacity(name.len() + suffix.len() + 2);

    if is_absolute(name) {
        result.push('.');
        push_header(&mut result, name, false);
    } else if let Some(rest) = strip_current_dir(name) {
        result.push(DOT_REPLACE);
        push_header(&mut result, rest, true);
    } else if is_parent_dir(name) {
        push_header(&mut result, name, true);
    } else {
        match name.split_once(':') {
            Some((module, partition)) => {
                push_header(&mut result, module, true);
                result.push(COLON_REPLACE);
                push_header(&mut result, partition, false);
            }
            None => push_header(&mut result, name, true),
        }
    }

    if !suffix.is_empty() {
        result.push('.');
        result.push_str(suffix);
    }
    result
}

/// Returns what follows a leading `./`.
fn strip_current_dir(name: &str) -> Option<&str> {
    match name.as_bytes() {
        [b'.', sep, ..] if is_dir_sep(*sep) => name.get(2..),
        _ => None,
    }
}

fn is_parent_dir(name: &str) -> bool {
    matches!(name.as_bytes(), [b'.', b'.', sep, ..] if is_dir_sep(*sep))
}

/// Appends `path`, replacing each `..` segment with two placeholders.
///
/// `at_boundary` says whether `path` starts a segment.
fn push_header(result: &mut String, path: &str, mut at_boundary: bool) {
    let mut rest = path;
    while let Some(ch) = rest.chars().next() {
        let closes_segment = rest.as_bytes().get(2).is_none_or(|byte| is_dir_sep(*byte));
        if at_boundary && closes_segment && rest.starts_with("..") {
            result.push(DOT_REPLACE);
            result.push(DOT_REPLACE);
            rest = rest.get(2..).unwrap_or_default();
            at_boundary = false;
            continue;
        }

        result.push(ch);
        at_boundary = u8::try_from(ch).is_ok_and(is_dir_sep);
        rest = rest.get(ch.len_utf8()..).unwrap_or_default();
    }
}
