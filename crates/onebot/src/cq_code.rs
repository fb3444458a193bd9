//! CQ code mini-markup: `[CQ:type,key=value,...]`.
//!
//! Inside a code, `&`, `[`, `]` and `,` are written as `&amp;`, `&#91;`,
//! `&#93;` and `&#44;`.

use std::fmt;

const ENTITIES: [(char, &str); 4] = [('&', "&amp;"), ('[', "&#91;"), (']', "&#93;"), (',', "&#44;")];

pub fn escape(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    for c in src.chars() {
        match ENTITIES.iter().find(|(raw, _)| *raw == c) {
            Some((_, entity)) => out.push_str(entity),
            None => out.push(c),
        }
    }
    out
}

/// Reverse of [`escape`]. A `&` that does not start a known entity is kept.
pub fn unescape(src: &str) -> String {
    if !src.contains('&') {
        return src.to_string();
    }

    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match ENTITIES.iter().find(|(_, entity)| rest.starts_with(entity)) {
            Some((raw, entity)) => {
                out.push(*raw);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CqCode {
    pub kind: String,
    pub data: Vec<(String, String)>,
}

impl CqCode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.push((key.into(), value.into()));
        self
    }

    /// Mention of a user.
    pub fn at(user_id: u64) -> Self {
        Self::new("at").with("qq", user_id.to_string())
    }

    pub fn image(file: impl Into<String>) -> Self {
        Self::new("image").with("file", file)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Parse a single code. `src` must span exactly from `[` to `]`.
    pub fn parse(src: &str) -> Option<Self> {
        let inner = src.strip_prefix('[')?.strip_suffix(']')?;
        let inner = inner.strip_prefix("CQ:")?;

        let mut parts = inner.split(',');
        let kind = parts.next().filter(|k| !k.is_empty())?;
        let mut code = Self::new(kind);
        for part in parts {
            let (key, value) = part.split_once('=')?;
            code.data.push((unescape(key), unescape(value)));
        }
        Some(code)
    }
}

impl fmt::Display for CqCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[CQ:{}", self.kind)?;
        for (key, value) in &self.data {
            write!(f, ",{}={}", escape(key), escape(value))?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rstest::rstest;

    #[rstest]
    #[case("&amp; test case", "& test case")]
    #[case("test &amp; case", "test & case")]
    #[case("test case &amp;", "test case &")]
    #[case("test &amp;case", "test &case")]
    #[case("test&amp;case", "test&case")]
    #[case("&#91;CQ:at&#44;qq=1&#93;", "[CQ:at,qq=1]")]
    #[case("&amp; a &amp; b &amp; c &amp;", "& a & b & c &")]
    #[case("fish & chips", "fish & chips")]
    #[case("&amp", "&amp")]
    fn test_unescape(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(unescape(input), expected);
    }

    #[rstest]
    #[case("& test case", "&amp; test case")]
    #[case("test & case", "test &amp; case")]
    #[case("a,b[c]", "a&#44;b&#91;c&#93;")]
    #[case("&amp;", "&amp;amp;")]
    fn test_escape(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(escape(input), expected);
    }

    #[test]
    fn test_escape_round_trip_random() {
        const ALPHABET: &[u8] = b"&[],abcdefghijklmnopqrstuvwxyz";
        let mut rng = rand::rng();
        for _ in 0..1000 {
            let len = rng.random_range(0..64);
            let src: String = (0..len)
                .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
                .collect();
            assert_eq!(unescape(&escape(&src)), src, "round trip failed for {src:?}");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(CqCode::at(42).to_string(), "[CQ:at,qq=42]");
        assert_eq!(
            CqCode::image("https://x.com/a.png?a=1,b=2").to_string(),
            "[CQ:image,file=https://x.com/a.png?a=1&#44;b=2]"
        );
        assert_eq!(CqCode::new("face").to_string(), "[CQ:face]");
    }

    #[test]
    fn test_parse() {
        let code = CqCode::parse("[CQ:at,qq=144115218677563300]").unwrap();
        assert_eq!(code.kind, "at");
        assert_eq!(code.get("qq"), Some("144115218677563300"));

        let code = CqCode::parse("[CQ:image,file=a&#44;b.png,url=x]").unwrap();
        assert_eq!(code.get("file"), Some("a,b.png"));
        assert_eq!(code.get("url"), Some("x"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(CqCode::parse("CQ:at,qq=1"), None);
        assert_eq!(CqCode::parse("[at,qq=1]"), None);
        assert_eq!(CqCode::parse("[CQ:at,qq]"), None);
        assert_eq!(CqCode::parse("[CQ:]"), None);
    }

    #[test]
    fn test_parse_display_round_trip() {
        let code = CqCode::new("share")
            .with("url", "https://a.b/?x=1&y=[2]")
            .with("title", "a, b");
        assert_eq!(CqCode::parse(&code.to_string()), Some(code));
    }
}
