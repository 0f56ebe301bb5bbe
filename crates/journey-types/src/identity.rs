use crate::{JourneyDescriptor, KeyValues, RequestData};
use std::{fmt, str::FromStr};
use thiserror::Error;
use url::form_urlencoded;
use uuid::Uuid;

/// Reserved request key carrying the per-instance unique token. May not be
/// declared as a dependent key.
pub const UNIQUE_TOKEN_KEY: &str = "uniqueKey";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// Deterministic derivation was asked for a key the request never supplied.
    #[error("request data is missing dependent key '{0}'")]
    MissingDependentKey(String),
    #[error("malformed instance identifier '{value}': {reason}")]
    Malformed { value: String, reason: String },
}

/// Canonical, order-sensitive identity of one journey instance.
///
/// The identifier is a value type: once constructed it never changes, and two
/// identifiers are equal only when their key/value sequences match
/// element-by-element in order. That makes the canonical wire string stable
/// and string-comparable, which is what the store keys on and what outgoing
/// links embed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JourneyInstanceId {
    journey_name: String,
    key_values: Vec<(String, KeyValues)>,
}

impl JourneyInstanceId {
    pub fn new<K, V>(journey_name: impl Into<String>, key_values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<KeyValues>,
    {
        Self {
            journey_name: journey_name.into(),
            key_values: key_values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Deterministic derivation for a brand-new instance.
    ///
    /// Every dependent key must be present in the request data; the values are
    /// copied verbatim (multi-valued runs included) under the descriptor's key
    /// spelling. When the descriptor requires a unique token, a fresh UUID is
    /// minted and appended under [`UNIQUE_TOKEN_KEY`]; a token already in the
    /// request never carries over, so two derivations for the same request
    /// always name distinct instances.
    pub fn derive(
        descriptor: &JourneyDescriptor,
        data: &RequestData,
    ) -> Result<Self, IdentityError> {
        let mut key_values = Vec::with_capacity(descriptor.dependent_keys().len() + 1);
        for key in descriptor.dependent_keys() {
            match data.get(key) {
                Some(values) => key_values.push((key.clone(), values.clone())),
                None => return Err(IdentityError::MissingDependentKey(key.clone())),
            }
        }
        if descriptor.requires_unique_token() {
            key_values.push((
                UNIQUE_TOKEN_KEY.to_string(),
                KeyValues::One(Uuid::new_v4().to_string()),
            ));
        }
        Ok(Self {
            journey_name: descriptor.name().to_string(),
            key_values,
        })
    }

    /// Best-effort resolution of an identifier the inbound request is expected
    /// to already carry. Any missing dependent key (or missing token when one
    /// is required) yields `None`, never an error.
    pub fn try_resolve(descriptor: &JourneyDescriptor, data: &RequestData) -> Option<Self> {
        let mut key_values = Vec::with_capacity(descriptor.dependent_keys().len() + 1);
        for key in descriptor.dependent_keys() {
            key_values.push((key.clone(), data.get(key)?.clone()));
        }
        if descriptor.requires_unique_token() {
            let token = data.get(UNIQUE_TOKEN_KEY)?;
            key_values.push((
                UNIQUE_TOKEN_KEY.to_string(),
                KeyValues::One(token.first().to_string()),
            ));
        }
        Some(Self {
            journey_name: descriptor.name().to_string(),
            key_values,
        })
    }

    pub fn journey_name(&self) -> &str {
        &self.journey_name
    }

    pub fn key_values(&self) -> &[(String, KeyValues)] {
        &self.key_values
    }

    /// The unique-token component, when present.
    pub fn unique_token(&self) -> Option<&str> {
        self.key_values
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(UNIQUE_TOKEN_KEY))
            .map(|(_, values)| values.first())
    }

    /// Canonical wire string: `urlencode(name)` plus the key/value pairs as a
    /// query string in insertion order, multi-valued keys repeated once per
    /// value. This is the store's persistence key and the representation
    /// embedded in outgoing links.
    pub fn to_canonical_string(&self) -> String {
        let mut out: String = form_urlencoded::byte_serialize(self.journey_name.as_bytes()).collect();
        if !self.key_values.is_empty() {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (key, values) in &self.key_values {
                for value in values.iter() {
                    serializer.append_pair(key, value);
                }
            }
            out.push('?');
            out.push_str(&serializer.finish());
        }
        out
    }
}

impl fmt::Display for JourneyInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl FromStr for JourneyInstanceId {
    type Err = IdentityError;

    /// Parses a canonical wire string back into an identifier. Adjacent
    /// repeats of the same key fold back into one multi-valued run, so the
    /// canonical string round-trips byte-stably.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| IdentityError::Malformed {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (name_part, query_part) = match s.split_once('?') {
            Some((name, query)) => (name, Some(query)),
            None => (s, None),
        };
        if name_part.is_empty() {
            return Err(malformed("empty journey name"));
        }
        let mut name_pairs = form_urlencoded::parse(name_part.as_bytes());
        let journey_name = match (name_pairs.next(), name_pairs.next()) {
            (Some((name, value)), None) if value.is_empty() => name.into_owned(),
            _ => return Err(malformed("journey name is not a single component")),
        };
        if journey_name.is_empty() {
            return Err(malformed("empty journey name"));
        }

        let mut key_values: Vec<(String, KeyValues)> = Vec::new();
        if let Some(query) = query_part {
            if query.is_empty() {
                return Err(malformed("empty query component"));
            }
            for (key, value) in form_urlencoded::parse(query.as_bytes()) {
                let key = key.into_owned();
                let value = value.into_owned();
                match key_values.last_mut() {
                    Some((last_key, values)) if *last_key == key => {
                        let mut run: Vec<String> = values.iter().map(str::to_string).collect();
                        run.push(value);
                        *values = KeyValues::Many(run);
                    }
                    _ => key_values.push((key, KeyValues::One(value))),
                }
            }
        }

        Ok(Self {
            journey_name,
            key_values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StateType;

    fn descriptor(keys: &[&str], token: bool) -> JourneyDescriptor {
        JourneyDescriptor::new(
            "myjourney",
            StateType::from_static("state/v1"),
            keys.iter().copied(),
            token,
        )
        .expect("descriptor")
    }

    fn data(pairs: &[(&str, &str)]) -> RequestData {
        RequestData::from_pairs(pairs.iter().map(|(k, v)| (*k, *v)))
    }

    #[test]
    fn derivation_is_deterministic_without_token() {
        let descriptor = descriptor(&["id", "subid"], false);
        let data = data(&[("id", "42"), ("subid", "69")]);
        let a = JourneyInstanceId::derive(&descriptor, &data).expect("derive");
        let b = JourneyInstanceId::derive(&descriptor, &data).expect("derive");
        let resolved = JourneyInstanceId::try_resolve(&descriptor, &data).expect("resolve");
        assert_eq!(a, b);
        assert_eq!(a, resolved);
        assert_eq!(a.to_canonical_string(), "myjourney?id=42&subid=69");
    }

    #[test]
    fn key_order_distinguishes_identifiers() {
        let forward = descriptor(&["id", "subid"], false);
        let reversed = descriptor(&["subid", "id"], false);
        let data = data(&[("id", "42"), ("subid", "69")]);
        let a = JourneyInstanceId::derive(&forward, &data).expect("derive");
        let b = JourneyInstanceId::derive(&reversed, &data).expect("derive");
        assert_ne!(a, b);
        assert_eq!(a.to_canonical_string(), "myjourney?id=42&subid=69");
        assert_eq!(b.to_canonical_string(), "myjourney?subid=69&id=42");
    }

    #[test]
    fn fresh_tokens_never_collide_or_carry_over() {
        let descriptor = descriptor(&["id"], true);
        let data = data(&[("id", "7"), (UNIQUE_TOKEN_KEY, "stale-token")]);
        let a = JourneyInstanceId::derive(&descriptor, &data).expect("derive");
        let b = JourneyInstanceId::derive(&descriptor, &data).expect("derive");
        assert_ne!(a, b);
        assert_ne!(a.to_canonical_string(), b.to_canonical_string());
        assert_ne!(a.unique_token(), Some("stale-token"));
        assert_ne!(b.unique_token(), Some("stale-token"));
    }

    #[test]
    fn missing_key_fails_derive_but_not_try_resolve() {
        let descriptor = descriptor(&["id", "subid"], false);
        let data = data(&[("id", "42")]);
        let err = JourneyInstanceId::derive(&descriptor, &data).expect_err("derive");
        assert_eq!(err, IdentityError::MissingDependentKey("subid".into()));
        assert!(JourneyInstanceId::try_resolve(&descriptor, &data).is_none());
    }

    #[test]
    fn try_resolve_requires_the_token_from_the_request() {
        let descriptor = descriptor(&["id"], true);
        let without_token = data(&[("id", "7")]);
        assert!(JourneyInstanceId::try_resolve(&descriptor, &without_token).is_none());

        let with_token = data(&[("id", "7"), (UNIQUE_TOKEN_KEY, "abc")]);
        let id = JourneyInstanceId::try_resolve(&descriptor, &with_token).expect("resolve");
        assert_eq!(id.unique_token(), Some("abc"));
        assert_eq!(id.to_canonical_string(), "myjourney?id=7&uniqueKey=abc");
    }

    #[test]
    fn multi_valued_keys_emit_one_component_per_value() {
        let descriptor = descriptor(&["tag"], false);
        let data = RequestData::from_pairs([(
            "tag",
            KeyValues::Many(vec!["a".to_string(), "b".to_string()]),
        )]);
        let id = JourneyInstanceId::derive(&descriptor, &data).expect("derive");
        assert_eq!(id.to_canonical_string(), "myjourney?tag=a&tag=b");
    }

    #[test]
    fn canonical_string_round_trips() {
        let id = JourneyInstanceId::new(
            "my journey",
            [
                ("id", KeyValues::One("4 2".into())),
                ("tag", KeyValues::Many(vec!["a&b".to_string(), "c=d".to_string()])),
            ],
        );
        let canonical = id.to_canonical_string();
        let parsed: JourneyInstanceId = canonical.parse().expect("parse");
        assert_eq!(parsed, id);
        assert_eq!(parsed.to_canonical_string(), canonical);
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!("".parse::<JourneyInstanceId>().is_err());
        assert!("?id=1".parse::<JourneyInstanceId>().is_err());
        assert!("wiz?".parse::<JourneyInstanceId>().is_err());
    }
}
