//! # REST Adapter Interface (spec.md §6.3)
//!
//! Out of core scope: this module names the HTTP-to-verb mapping an
//! external `/dapi/{id}/{ident}` adapter follows, so an embedder wiring in
//! a real HTTP framework (axum, actix-web, ...) has one place that
//! classifies a method/path/body into the [`crate::domain::request::Request`]
//! the core dispatcher expects. It deliberately stops at that
//! classification — no server, no routing, no framework dependency.

use serde_json::Value;

use crate::domain::request::{Method, Request};

/// An HTTP verb as seen by the REST adapter, independent of any
/// particular web framework's request type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    /// `GET /dapi/{id}/{ident}`
    Get,
    /// `PUT /dapi/{id}/{ident}`
    Put,
    /// `POST /dapi/{id}/{ident}`
    Post,
}

/// The result of classifying one REST call: the device id and the
/// [`Request`] to hand to [`crate::node::Node::dispatch`].
#[derive(Debug, Clone)]
pub struct RestOperation {
    /// Raw device id path segment, not yet normalized — normalization
    /// happens inside the Authority Resolver when the request reaches
    /// `Node::connect`/`dispatch`.
    pub deviceid: String,
    /// The classified core request.
    pub request: Request,
}

/// Classify a REST call into a core [`Request`], per spec.md §6.3:
///
/// - `GET /dapi/{id}/{ident}` → GET, unless `ident` is `.schema` or
///   `.config` (then DESCRIBE).
/// - `PUT /dapi/{id}/{ident}` → SET, unless `ident` is `.config` (then
///   CONFIG).
/// - `POST /dapi/{id}/{ident}` → INVOKE, unless `ident` is `metrics` or
///   `events` (then PUT/NOTIFY respectively, extracting a single
///   key/value pair from `body`).
///
/// Returns `None` if `body` is a POST to `metrics`/`events` but is not a
/// single-entry JSON object (the one shape spec.md describes for
/// extracting a metric/event name and value).
#[must_use]
pub fn classify_request(verb: HttpVerb, deviceid: &str, ident: &str, body: Option<Value>) -> Option<RestOperation> {
    let request = match verb {
        HttpVerb::Get => {
            let method = if ident == ".schema" || ident == ".config" {
                Method::Describe
            } else {
                Method::Get
            };
            Request::new(deviceid, method, ident)
        }
        HttpVerb::Put => {
            let value = body.unwrap_or(Value::Null);
            if ident == ".config" {
                Request::new(deviceid, Method::Config, ident).with_value(value)
            } else {
                Request::new(deviceid, Method::Set, ident).with_value(value)
            }
        }
        HttpVerb::Post => match ident {
            "metrics" => {
                let (metric, value) = single_entry(body?)?;
                Request::new(deviceid, Method::Put, metric).with_value(value)
            }
            "events" => {
                let (event, value) = single_entry(body?)?;
                Request::new(deviceid, Method::Notify, event).with_params(vec![value])
            }
            _ => Request::new(deviceid, Method::Invoke, ident).with_params(match body {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => Vec::new(),
                Some(other) => vec![other],
            }),
        },
    };

    Some(RestOperation {
        deviceid: deviceid.to_string(),
        request,
    })
}

fn single_entry(body: Value) -> Option<(String, Value)> {
    match body {
        Value::Object(map) if map.len() == 1 => map.into_iter().next(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_maps_to_get_by_default() {
        let op = classify_request(HttpVerb::Get, "kitchen:lamp", "state", None).unwrap();
        assert_eq!(op.request.method, Method::Get);
    }

    #[test]
    fn get_dot_schema_maps_to_describe() {
        let op = classify_request(HttpVerb::Get, "kitchen:lamp", ".schema", None).unwrap();
        assert_eq!(op.request.method, Method::Describe);
    }

    #[test]
    fn put_dot_config_maps_to_config() {
        let op = classify_request(HttpVerb::Put, "kitchen:lamp", ".config", Some(Value::from(5))).unwrap();
        assert_eq!(op.request.method, Method::Config);
    }

    #[test]
    fn put_otherwise_maps_to_set() {
        let op = classify_request(HttpVerb::Put, "kitchen:lamp", "brightness", Some(Value::from(5))).unwrap();
        assert_eq!(op.request.method, Method::Set);
    }

    #[test]
    fn post_metrics_extracts_a_single_metric() {
        let body = serde_json::json!({"power": 42});
        let op = classify_request(HttpVerb::Post, "kitchen:lamp", "metrics", Some(body)).unwrap();
        assert_eq!(op.request.method, Method::Put);
        assert_eq!(op.request.identifier, "power");
        assert_eq!(op.request.value(), Some(&Value::from(42)));
    }

    #[test]
    fn post_events_with_a_malformed_body_is_rejected() {
        let body = serde_json::json!({"a": 1, "b": 2});
        assert!(classify_request(HttpVerb::Post, "kitchen:lamp", "events", Some(body)).is_none());
    }

    #[test]
    fn post_otherwise_maps_to_invoke() {
        let op = classify_request(HttpVerb::Post, "kitchen:lamp", "toggle", None).unwrap();
        assert_eq!(op.request.method, Method::Invoke);
        assert_eq!(op.request.identifier, "toggle");
    }
}
