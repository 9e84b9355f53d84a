use serde::de::DeserializeOwned;
use serde_json::Value;

/// A single decoded response received from a subscription.
///
/// Wraps the `payload` of an inbound `data` or `error` message and offers path-based field
/// lookup for assertions.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphQLResponse {
    payload: Value,
}

impl GraphQLResponse {
    /// Wraps a decoded message payload.
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// The raw JSON tree of the payload.
    pub fn json(&self) -> &Value {
        &self.payload
    }

    /// Looks up a field by a `.`-separated path, e.g. `data.newHumans.name`. Array elements are
    /// addressed by numeric segments, e.g. `errors.0.message`.
    ///
    /// Returns [`None`] if any segment of the path does not exist.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.payload, |value, segment| match value {
                Value::Object(fields) => fields.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// Looks up a field by path and deserializes it into `T`.
    ///
    /// Returns [`None`] if the path does not exist or the value does not deserialize into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.get(path)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn response() -> GraphQLResponse {
        GraphQLResponse::new(json!({
            "data": {
                "newHumans": {
                    "id": "1000",
                    "name": "Luke Skywalker",
                    "appearsIn": ["NEW_HOPE", "EMPIRE", "JEDI"],
                },
            },
            "errors": [{"message": "some field failed"}],
        }))
    }

    #[test]
    fn test_path_lookup() {
        let response = response();

        assert_eq!(
            response.get("data.newHumans.name"),
            Some(&json!("Luke Skywalker")),
        );
        assert_eq!(response.get("data.newHumans.appearsIn.2"), Some(&json!("JEDI")));
        assert_eq!(
            response.get("errors.0.message"),
            Some(&json!("some field failed")),
        );

        assert_eq!(response.get("data.newHumans.homePlanet"), None);
        assert_eq!(response.get("data.newHumans.appearsIn.3"), None);
        assert_eq!(response.get("data.newHumans.name.oops"), None);
    }

    #[test]
    fn test_typed_lookup() {
        let response = response();

        assert_eq!(
            response.get_as::<String>("data.newHumans.name").as_deref(),
            Some("Luke Skywalker"),
        );
        assert_eq!(
            response.get_as::<Vec<String>>("data.newHumans.appearsIn"),
            Some(vec!["NEW_HOPE".into(), "EMPIRE".into(), "JEDI".into()]),
        );
        assert_eq!(response.get_as::<i32>("data.newHumans.name"), None);
        assert_eq!(response.get_as::<String>("data.missing"), None);
    }
}
