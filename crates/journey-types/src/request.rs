use indexmap::IndexMap;

/// Values recorded for one request key: a single value or an ordered run of
/// values (repeated query parameters).
#[derive(Debug, Clone)]
pub enum KeyValues {
    One(String),
    Many(Vec<String>),
}

impl KeyValues {
    /// Builds from an ordered list; empty input yields `None`.
    pub fn from_values(mut values: Vec<String>) -> Option<Self> {
        match values.len() {
            0 => None,
            1 => Some(KeyValues::One(values.remove(0))),
            _ => Some(KeyValues::Many(values)),
        }
    }

    pub fn first(&self) -> &str {
        match self {
            KeyValues::One(value) => value,
            KeyValues::Many(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            KeyValues::One(value) => std::slice::from_ref(value),
            KeyValues::Many(values) => values,
        };
        slice.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        match self {
            KeyValues::One(_) => 1,
            KeyValues::Many(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Equality compares the value sequences, so `One("x")` and `Many(["x"])` are
// the same entry. Order within a run is significant.
impl PartialEq for KeyValues {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for KeyValues {}

impl std::hash::Hash for KeyValues {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for value in self.iter() {
            value.hash(state);
        }
    }
}

impl From<String> for KeyValues {
    fn from(value: String) -> Self {
        KeyValues::One(value)
    }
}

impl From<&str> for KeyValues {
    fn from(value: &str) -> Self {
        KeyValues::One(value.to_string())
    }
}

impl From<Vec<String>> for KeyValues {
    fn from(values: Vec<String>) -> Self {
        KeyValues::from_values(values).unwrap_or_else(|| KeyValues::Many(Vec::new()))
    }
}

/// Read-only, insertion-ordered view of the request-derived key/value data an
/// identity may depend on.
///
/// Built once per request by merging route values with query-string values;
/// route values win on key collision. Key lookup is case-insensitive, the
/// stored spelling is whatever the first writer used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestData {
    entries: IndexMap<String, KeyValues>,
}

impl RequestData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges route values (single-valued, authoritative) with query-string
    /// pairs (possibly repeated, ordered). A query key that collides with a
    /// route key is dropped entirely.
    pub fn from_parts<R, Q>(route: R, query: Q) -> Self
    where
        R: IntoIterator<Item = (String, String)>,
        Q: IntoIterator<Item = (String, String)>,
    {
        let mut data = RequestData::new();
        for (key, value) in route {
            match data.position(&key) {
                Some(index) => data.entries[index] = KeyValues::One(value),
                None => {
                    data.entries.insert(key, KeyValues::One(value));
                }
            }
        }
        let route_len = data.entries.len();
        for (key, value) in query {
            match data.position(&key) {
                Some(index) if index < route_len => {
                    // Route value already claimed this key.
                }
                Some(index) => {
                    let slot = &mut data.entries[index];
                    let mut values: Vec<String> = slot.iter().map(str::to_string).collect();
                    values.push(value);
                    *slot = KeyValues::Many(values);
                }
                None => {
                    data.entries.insert(key, KeyValues::One(value));
                }
            }
        }
        data
    }

    /// Builds from pre-merged pairs, preserving iteration order. A repeated
    /// key replaces the earlier entry in place.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<KeyValues>,
    {
        let mut data = RequestData::new();
        for (key, values) in pairs {
            let key = key.into();
            match data.position(&key) {
                Some(index) => data.entries[index] = values.into(),
                None => {
                    data.entries.insert(key, values.into());
                }
            }
        }
        data
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .keys()
            .position(|stored| stored.eq_ignore_ascii_case(key))
    }

    /// Case-insensitive lookup.
    pub fn get(&self, key: &str) -> Option<&KeyValues> {
        self.position(key).map(|index| &self.entries[index])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeyValues)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn route_values_take_precedence() {
        let data = RequestData::from_parts(
            vec![pair("id", "7")],
            vec![pair("id", "99"), pair("step", "2")],
        );
        assert_eq!(data.get("id"), Some(&KeyValues::One("7".into())));
        assert_eq!(data.get("step"), Some(&KeyValues::One("2".into())));
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn repeated_query_keys_build_an_ordered_run() {
        let data = RequestData::from_parts(
            Vec::new(),
            vec![pair("tag", "a"), pair("other", "x"), pair("tag", "b")],
        );
        let tags = data.get("tag").expect("tag");
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn lookup_is_case_insensitive_but_keeps_spelling() {
        let data = RequestData::from_parts(vec![pair("UserId", "42")], Vec::new());
        assert!(data.contains("userid"));
        assert_eq!(data.get("USERID"), Some(&KeyValues::One("42".into())));
        let keys: Vec<_> = data.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["UserId"]);
    }

    #[test]
    fn one_and_singleton_run_compare_equal() {
        assert_eq!(
            KeyValues::One("x".into()),
            KeyValues::Many(vec!["x".to_string()])
        );
        assert_ne!(
            KeyValues::Many(vec!["a".to_string(), "b".to_string()]),
            KeyValues::Many(vec!["b".to_string(), "a".to_string()])
        );
    }
}
