//! Classification of lexed lines into requests.

use std::str;

/// A well-formed request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Request<'a> {
    Connect {
        version: u32,
        agent: &'a str,
        ident: &'a str,
    },
    ModuleRepo,
    ModuleExport(&'a str),
    ModuleImport(&'a str),
    ModuleCompiled(&'a str),
    IncludeTranslate(&'a str),
}

/// Why a line could not be turned into a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejection {
    /// Known keyword with bad arguments, or an undecodable line.
    Malformed,
    /// The first word is not a request keyword.
    Unrecognized,
}

impl Rejection {
    /// Error text reported to the compiler for the raw `line`.
    pub(crate) fn message(self, line: &[u8]) -> String {
        let reason = match self {
            Self::Malformed => "malformed request",
            Self::Unrecognized => "unrecognized request",
        };
        format!("{reason} '{}'", String::from_utf8_lossy(line))
    }
}

impl<'a> Request<'a> {
    /// Keyword naming this request on the wire.
    pub(crate) const fn keyword(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "HELLO",
            Self::ModuleRepo => "MODULE-REPO",
            Self::ModuleExport(_) => "MODULE-EXPORT",
            Self::ModuleImport(_) => "MODULE-IMPORT",
            Self::ModuleCompiled(_) => "MODULE-COMPILED",
            Self::IncludeTranslate(_) => "INCLUDE-TRANSLATE",
        }
    }

    pub(crate) fn parse(words: &'a [Vec<u8>]) -> Result<Self, Rejection> {
        let Some((keyword, args)) = words.split_first() else {
            return Err(Rejection::Malformed);
        };
        match (keyword.as_slice(), args) {
            (b"HELLO", [version, agent, ident]) => Ok(Self::Connect {
                version: parse_version(version)?,
                agent: text(agent)?,
                ident: text(ident)?,
            }),
            (b"MODULE-REPO", []) => Ok(Self::ModuleRepo),
            (b"MODULE-EXPORT", [name]) => name_arg(name).map(Self::ModuleExport),
            (b"MODULE-IMPORT", [name]) => name_arg(name).map(Self::ModuleImport),
            (b"MODULE-COMPILED", [name]) => name_arg(name).map(Self::ModuleCompiled),
            (b"INCLUDE-TRANSLATE", [name]) => name_arg(name).map(Self::IncludeTranslate),
            (
                b"HELLO" | b"MODULE-REPO" | b"MODULE-EXPORT" | b"MODULE-IMPORT"
                | b"MODULE-COMPILED" | b"INCLUDE-TRANSLATE",
                _,
            ) => Err(Rejection::Malformed),
            _ => Err(Rejection::Unrecognized),
        }
    }
}

fn text(word: &[u8]) -> Result<&str, Rejection> {
    str::from_utf8(word).map_err(|_| Rejection::Malformed)
}

fn name_arg(word: &[u8]) -> Result<&str, Rejection> {
    if word.is_empty() {
        return Err(Rejection::Malformed);
    }
    text(word)
}

fn parse_version(word: &[u8]) -> Result<u32, Rejection> {
    if word.is_empty() || !word.iter().all(u8::is_ascii_digit) {
        return Err(Rejection::Malformed);
    }
    text(word)?.parse().map_err(|_| Rejection::Malformed)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn words(list: &[&str]) -> Vec<Vec<u8>> {
        list.iter().map(|word| word.as_bytes().to_vec()).collect()
    }

    #[rstest]
    #[case::hello(
        &["HELLO", "1", "GCC", "main.cc"],
        Request::Connect { version: 1, agent: "GCC", ident: "main.cc" }
    )]
    #[case::hello_empty_ident(
        &["HELLO", "0", "TEST", ""],
        Request::Connect { version: 0, agent: "TEST", ident: "" }
    )]
    #[case::repo(&["MODULE-REPO"], Request::ModuleRepo)]
    #[case::export(&["MODULE-EXPORT", "foo:part"], Request::ModuleExport("foo:part"))]
    #[case::import(&["MODULE-IMPORT", "bar"], Request::ModuleImport("bar"))]
    #[case::compiled(&["MODULE-COMPILED", "bar"], Request::ModuleCompiled("bar"))]
    #[case::translate(&["INCLUDE-TRANSLATE", "./quux"], Request::IncludeTranslate("./quux"))]
    fn parses_requests(#[case] line: &[&str], #[case] expected: Request<'static>) {
        let words = words(line);
        assert_eq!(Request::parse(&words), Ok(expected));
    }

    #[rstest]
    #[case::empty_name(&["MODULE-IMPORT", ""])]
    #[case::missing_name(&["MODULE-EXPORT"])]
    #[case::extra_argument(&["MODULE-REPO", "x"])]
    #[case::short_hello(&["HELLO", "1", "GCC"])]
    #[case::signed_version(&["HELLO", "+1", "GCC", "x"])]
    #[case::word_version(&["HELLO", "one", "GCC", "x"])]
    #[case::huge_version(&["HELLO", "99999999999", "GCC", "x"])]
    fn rejects_malformed_requests(#[case] line: &[&str]) {
        let words = words(line);
        assert_eq!(Request::parse(&words), Err(Rejection::Malformed));
    }

    #[test]
    fn rejects_non_utf8_names() {
        let words = vec![b"MODULE-IMPORT".to_vec(), vec![0xff, 0xfe]];
        assert_eq!(Request::parse(&words), Err(Rejection::Malformed));
    }

    #[rstest]
    #[case::unknown(&["NOT", "A", "COMMAND"])]
    #[case::lowercase(&["hello", "1", "GCC", "x"])]
    fn rejects_unknown_keywords(#[case] line: &[&str]) {
        let words = words(line);
        assert_eq!(Request::parse(&words), Err(Rejection::Unrecognized));
    }

    #[test]
    fn rejection_message_quotes_raw_line() {
        assert_eq!(
            Rejection::Unrecognized.message(b"NOT A COMMAND"),
            "unrecognized request 'NOT A COMMAND'"
        );
        assert_eq!(
            Rejection::Malformed.message(b"MODULE-IMPORT ''"),
            "malformed request 'MODULE-IMPORT '''"
        );
    }
}
