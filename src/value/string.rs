use std::borrow::Cow;

/// PHP string: an arbitrary byte sequence. Source literals arrive as UTF-8,
/// but escapes such as `"\xff"` put raw bytes in, so lengths, offsets and
/// comparisons all work on bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhpString(Vec<u8>);

impl PhpString {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, byte: u8) {
        self.0.push(byte);
    }

    pub fn push_char(&mut self, c: char) {
        let mut buf = [0; 4];
        self.0.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    }

    pub fn push_str(&mut self, s: &str) {
        self.0.extend_from_slice(s.as_bytes());
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    /// Text view for identifiers and messages. Invalid UTF-8 becomes U+FFFD.
    pub fn to_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    pub fn repeat(&self, times: usize) -> Self {
        Self(self.0.repeat(times))
    }

    pub fn join(parts: &[PhpString], separator: &PhpString) -> Self {
        let mut out = PhpString::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                out.push_bytes(separator.as_bytes());
            }
            out.push_bytes(part.as_bytes());
        }
        out
    }
}

impl AsRef<[u8]> for PhpString {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for PhpString {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for PhpString {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl From<&String> for PhpString {
    fn from(s: &String) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for PhpString {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for PhpString {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl PartialEq<str> for PhpString {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for PhpString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl std::fmt::Display for PhpString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str_lossy())
    }
}

impl std::fmt::Debug for PhpString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"", self.0.escape_ascii())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_counts_bytes() {
        let mut s = PhpString::from("é");
        assert_eq!(s.len(), 2);
        s.push(0xff);
        assert_eq!(s.len(), 3);
        assert_eq!(s.to_str_lossy(), "é\u{fffd}");
    }

    #[test]
    fn ordering_is_bytewise() {
        assert!(PhpString::from("B") < PhpString::from("a"));
        assert!(PhpString::from(vec![0x80]) > PhpString::from("z"));
    }

    #[test]
    fn join_and_repeat() {
        let parts = [PhpString::from("a"), PhpString::from("b")];
        assert_eq!(PhpString::join(&parts, &PhpString::from(", ")), "a, b");
        assert_eq!(PhpString::from("ab").repeat(2), "abab");
    }

    #[test]
    fn debug_escapes_raw_bytes() {
        assert_eq!(format!("{:?}", PhpString::from(vec![b'a', 0xff])), "\"a\\xff\"");
    }
}
