//! Name/value pairs decoded from `application/x-www-form-urlencoded` text.
//!
//! Query strings and form bodies share this representation. Pairs keep their
//! wire order; lookups compare names case-insensitively and the last pair with
//! a matching name wins, so `a=1&a=2` reads as `a = "2"`.

use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Decodes `name=value&...` text. Pairs without `=` get an empty value and
    /// undecodable input leaves the collection empty.
    pub fn parse(input: &[u8]) -> Self {
        if input.is_empty() {
            return Self::empty();
        }

        match serde_urlencoded::from_bytes::<Vec<(String, String)>>(input) {
            Ok(pairs) => Self { pairs },
            Err(e) => {
                warn!(cause = %e, "can't decode form encoded data");
                Self::empty()
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs.iter().rev().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    /// Returns every value recorded under `name`, in wire order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs.iter().filter(move |(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Encodes the pairs back into urlencoded text.
    pub fn to_urlencoded(&self) -> String {
        serde_urlencoded::to_string(&self.pairs).unwrap_or_default()
    }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self { pairs: iter.into_iter().collect() }
    }
}
