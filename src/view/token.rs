use std::fmt;

/// Issuance order of a pull request. Later requests always compare greater.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub const ZERO: RequestToken = RequestToken(0);
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

#[derive(Debug, Default)]
pub struct TokenSource {
    last: u64,
}

impl TokenSource {
    pub fn issue(&mut self) -> RequestToken {
        self.last += 1;
        RequestToken(self.last)
    }

    /// Most recently issued token, or `ZERO` before the first issue.
    pub fn last_issued(&self) -> RequestToken { RequestToken(self.last) }
}
