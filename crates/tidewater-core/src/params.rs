use std::collections::HashMap;

use serde::de::DeserializeOwned;

/// Path parameters captured by the router for the matched route.
#[derive(Clone, Debug, Default)]
pub struct PathParams {
    inner: HashMap<String, String>,
}

impl PathParams {
    pub fn new(inner: HashMap<String, String>) -> Self {
        Self { inner }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn deserialize<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(serde_json::to_value(&self.inner)?)
    }
}

impl<K, V> FromIterator<(K, V)> for PathParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
