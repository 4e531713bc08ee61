use std::{error::Error, fmt, sync::OnceLock};

use regex::{NoExpand, Regex, RegexBuilder};

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Arguments of a single p.a.c.k.e.r. invocation, borrowed from the source.
struct PackedPayload<'a> {
    body: &'a str,
    radix: u32,
    token_count: usize,
    dictionary: Vec<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpackError {
    PatternNotFound,
    InvalidNumericParams,
    SymtabLengthMismatch,
}

impl fmt::Display for UnpackError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let message = match self {
            Self::PatternNotFound => "no p.a.c.k.e.r. invocation found",
            Self::InvalidNumericParams => "invalid p.a.c.k.e.r. radix or token count",
            Self::SymtabLengthMismatch => "malformed p.a.c.k.e.r. symtab",
        };
        write!(f, "unpack error: {message}")
    }
}

impl Error for UnpackError {}

pub fn detect(source: &str) -> bool {
    source
        .split_whitespace()
        .collect::<String>()
        .contains("eval(function(p,a,c,k,e,")
}

/// Unpacks P.A.C.K.E.R. packed js code.
///
/// Tokens are substituted one dictionary index at a time, from the highest
/// index down, replacing whole words only. Empty dictionary entries keep
/// their encoded token.
pub fn unpack(source: &str) -> Result<String, UnpackError> {
    let payload = filter_args(source)?;

    if payload.dictionary.len() != payload.token_count {
        return Err(UnpackError::SymtabLengthMismatch);
    }

    let mut body = payload.body.replace("\\\\", "\\").replace("\\'", "'");
    for idx in (0..payload.token_count).rev() {
        let replacement = payload.dictionary[idx];
        if replacement.is_empty() {
            continue;
        }

        let token = to_radix(idx, payload.radix);
        let word_re = Regex::new(&format!(r"\b{}\b", regex::escape(&token))).unwrap();
        body = word_re.replace_all(&body, NoExpand(replacement)).into_owned();
    }

    Ok(body)
}

/// Lowercase base-n rendition of `value`, radix in [2, 36]. Zero is "0".
fn to_radix(mut value: usize, radix: u32) -> String {
    let radix = radix as usize;
    let mut digits = vec![];

    loop {
        digits.push(ALPHABET[value % radix] as char);
        value /= radix;
        if value == 0 {
            break;
        }
    }

    digits.into_iter().rev().collect()
}

fn filter_args(source: &str) -> Result<PackedPayload, UnpackError> {
    static JUICER_SINGLE: OnceLock<Regex> = OnceLock::new();
    static JUICER_DOUBLE: OnceLock<Regex> = OnceLock::new();

    let juicers = [
        JUICER_SINGLE.get_or_init(|| {
            RegexBuilder::new(
                r"}\('(?<body>.*)', *(?<radix>\d+), *(?<count>\d+), *'(?<dict>.*)'\.split\(['\x22]\|['\x22]\)",
            )
            .dot_matches_new_line(true)
            .build()
            .unwrap()
        }),
        JUICER_DOUBLE.get_or_init(|| {
            RegexBuilder::new(
                r#"}\("(?<body>.*)", *(?<radix>\d+), *(?<count>\d+), *"(?<dict>.*)"\.split\(['"]\|['"]\)"#,
            )
            .dot_matches_new_line(true)
            .build()
            .unwrap()
        }),
    ];

    let caps = juicers
        .into_iter()
        .find_map(|juicer| juicer.captures(source))
        .ok_or(UnpackError::PatternNotFound)?;

    let body = caps
        .name("body")
        .ok_or(UnpackError::PatternNotFound)?
        .as_str();
    let dictionary: Vec<_> = caps
        .name("dict")
        .ok_or(UnpackError::PatternNotFound)?
        .as_str()
        .split('|')
        .collect();

    let radix = caps
        .name("radix")
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|r| (2..=36).contains(r))
        .ok_or(UnpackError::InvalidNumericParams)?;
    let token_count = caps
        .name("count")
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .ok_or(UnpackError::InvalidNumericParams)?;

    Ok(PackedPayload {
        body,
        radix,
        token_count,
        dictionary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    static PACKED_ALERT: &str = "eval(function(p,a,c,k,e,d){while(c--)if(k[c])p=p.\
    replace(new RegExp('\\b'+c.toString(a)+'\\b','g'),k[c]);return p}\
    ('1 0=2;3(0)',4,4,'x|var|5|alert'.split('|'),0,{}))";

    #[test]
    fn detects_packed_source() {
        assert!(detect(PACKED_ALERT));
        assert!(detect("  eval ( function (p,a,c,k,e,d){}"));
        assert!(!detect("var player = jwplayer('vplayer');"));
    }

    #[test]
    fn extracts_args() {
        let payload = filter_args(PACKED_ALERT).unwrap();
        assert_eq!(payload.body, "1 0=2;3(0)");
        assert_eq!(payload.dictionary, ["x", "var", "5", "alert"]);
        assert_eq!(payload.radix, 4);
        assert_eq!(payload.token_count, 4);
    }

    #[test]
    fn unpacks_code() {
        assert_eq!(unpack(PACKED_ALERT).unwrap(), "var x=5;alert(x)");
    }

    #[test]
    fn unpacks_hand_built_payload() {
        let source = "eval(function(p,a,c,k,e,d){return p}\
        ('0(); 1 = 0', 36, 2, 'foo|bar'.split('|')))";
        assert_eq!(unpack(source).unwrap(), "foo(); bar = foo");
    }

    #[test]
    fn unpacks_double_quoted_payload() {
        let source = "eval(function(p,a,c,k,e,d){return p}\
        (\"0 1\", 36, 2, \"foo|bar\".split('|')))";
        assert_eq!(unpack(source).unwrap(), "foo bar");
    }

    #[test]
    fn keeps_tokens_inside_longer_words() {
        // "1a" must survive even though token "1" has a replacement
        let source = "eval(function(p,a,c,k,e,d){return p}\
        ('1a 1', 36, 2, '|bar'.split('|')))";
        assert_eq!(unpack(source).unwrap(), "1a bar");
    }

    #[test]
    fn inserts_dictionary_text_verbatim() {
        let source = "eval(function(p,a,c,k,e,d){return p}\
        ('0', 36, 1, 'cost$1'.split('|')))";
        assert_eq!(unpack(source).unwrap(), "cost$1");
    }

    #[test]
    fn rejects_plain_source() {
        assert_eq!(
            unpack("var x = 5; alert(x);"),
            Err(UnpackError::PatternNotFound)
        );
        assert_eq!(unpack(""), Err(UnpackError::PatternNotFound));
    }

    #[test]
    fn rejects_bad_numeric_params() {
        let overflow = "eval(function(p,a,c,k,e,d){return p}\
        ('0', 99999999999999999999, 1, 'foo'.split('|')))";
        assert_eq!(unpack(overflow), Err(UnpackError::InvalidNumericParams));

        let out_of_range = "eval(function(p,a,c,k,e,d){return p}\
        ('0', 62, 1, 'foo'.split('|')))";
        assert_eq!(unpack(out_of_range), Err(UnpackError::InvalidNumericParams));
    }

    #[test]
    fn rejects_short_symtab() {
        let source = "eval(function(p,a,c,k,e,d){return p}\
        ('0 1 2', 36, 5, 'foo|bar'.split('|')))";
        assert_eq!(unpack(source), Err(UnpackError::SymtabLengthMismatch));
    }

    #[test]
    fn radix_round_trip() {
        for radix in [2u32, 8, 16, 36] {
            assert_eq!(to_radix(0, radix), "0");
            for value in 0..1000usize {
                let encoded = to_radix(value, radix);
                assert_eq!(
                    usize::from_str_radix(&encoded, radix).unwrap(),
                    value,
                    "radix {radix}"
                );
            }
        }
    }
}
