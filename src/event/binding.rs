//! Glue between buffered requests/responses and the CloudEvents HTTP binding.
//!
//! Decoding goes through `cloudevents::binding::http::to_event`, which picks
//! binary or structured mode from the headers. Replies are written in binary
//! mode through the binding's serializer.

use crate::http::{Request, Response};
use cloudevents::binding::http::{to_event, Builder, Serializer};
use cloudevents::message::{BinaryDeserializer, Error, Result as MessageResult};
use cloudevents::Event;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};

/// Content type of a structured-mode event.
pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

/// Decode the event carried by an HTTP request.
pub fn decode_request(request: &Request) -> Result<Event, Error> {
    let mut headers = HeaderMap::with_capacity(request.headers.len());
    for (name, value) in &request.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }

    let body = request
        .body
        .as_ref()
        .map(|body| body.to_vec())
        .unwrap_or_default();
    to_event(&headers, body)
}

/// Write `event` into a `200` response in binary content mode.
pub fn encode_response(event: Event) -> Result<Response, Error> {
    BinaryDeserializer::deserialize_binary(event, Serializer::new(ResponseBuilder::default()))
}

/// Collects what the binding serializer emits into a [`Response`].
#[derive(Default)]
struct ResponseBuilder {
    response: Response,
}

impl Builder<Response> for ResponseBuilder {
    fn header(&mut self, key: &str, value: HeaderValue) {
        if let Ok(value) = value.to_str() {
            self.response = std::mem::take(&mut self.response).header(key, value);
        }
    }

    fn body(&mut self, bytes: Vec<u8>) -> MessageResult<Response> {
        Ok(std::mem::take(&mut self.response).body(bytes))
    }

    fn finish(&mut self) -> MessageResult<Response> {
        Ok(std::mem::take(&mut self.response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, StatusCode};
    use cloudevents::event::ExtensionValue;
    use cloudevents::{AttributesReader, Data, EventBuilder, EventBuilderV10};

    fn binary_request() -> Request {
        Request::new(Method::Post, "/")
            .header("ce-id", "evt-1")
            .header("ce-source", "/orders")
            .header("ce-specversion", "1.0")
            .header("ce-type", "com.example.order.created")
            .header("ce-subject", "order-9")
            .header("ce-traceparent", "00-abc")
            .header("content-type", "application/json")
            .body(r#"{"total":12}"#)
    }

    #[test]
    fn test_decode_binary_mode() {
        let event = decode_request(&binary_request()).unwrap();
        assert_eq!(event.id(), "evt-1");
        assert_eq!(event.source().to_string(), "/orders");
        assert_eq!(event.ty(), "com.example.order.created");
        assert_eq!(event.subject(), Some("order-9"));
        assert!(matches!(
            event.extension("traceparent"),
            Some(ExtensionValue::String(value)) if value == "00-abc"
        ));
        assert_eq!(event.datacontenttype(), Some("application/json"));
        assert!(event.data().is_some());
    }

    #[test]
    fn test_decode_binary_missing_id() {
        let mut request = binary_request();
        request.headers.remove("ce-id");
        assert!(decode_request(&request).is_err());
    }

    #[test]
    fn test_decode_rejects_invalid_time() {
        let request = binary_request().header("ce-time", "yesterday-ish");
        assert!(decode_request(&request).is_err());

        let request = binary_request().header("ce-time", "2024-01-01T00:00:00Z");
        let event = decode_request(&request).unwrap();
        assert!(event.time().is_some());
    }

    #[test]
    fn test_decode_rejects_unknown_spec_version() {
        let request = binary_request().header("ce-specversion", "0.2");
        assert!(decode_request(&request).is_err());
    }

    #[test]
    fn test_plain_request_is_not_an_event() {
        let request = Request::new(Method::Post, "/").body("hello");
        assert!(decode_request(&request).is_err());
    }

    #[test]
    fn test_decode_structured_mode() {
        let body = serde_json::json!({
            "specversion": "1.0",
            "id": "evt-2",
            "source": "/sensors",
            "type": "com.example.reading",
            "time": "2024-01-01T00:00:00Z",
            "datacontenttype": "application/json",
            "data": { "temp": 21 }
        });
        let request = Request::new(Method::Post, "/")
            .header("Content-Type", STRUCTURED_CONTENT_TYPE)
            .body(serde_json::to_vec(&body).unwrap());

        let event = decode_request(&request).unwrap();
        assert_eq!(event.id(), "evt-2");
        assert!(event.time().is_some());
        match event.data() {
            Some(Data::Json(value)) => assert_eq!(value["temp"], 21),
            other => panic!("unexpected data {:?}", other),
        }
    }

    #[test]
    fn test_decode_structured_rejects_bad_json() {
        let request = Request::new(Method::Post, "/")
            .header("content-type", STRUCTURED_CONTENT_TYPE)
            .body("{not json");
        assert!(decode_request(&request).is_err());
    }

    #[test]
    fn test_encode_binary_reply() {
        let event = EventBuilderV10::new()
            .id("reply-1")
            .source("/replies")
            .ty("com.example.reply")
            .subject("order-9")
            .data("text/plain", "done")
            .build()
            .unwrap();

        let response = encode_response(event).unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.get_header("ce-id"), Some(&"reply-1".to_string()));
        assert_eq!(response.get_header("ce-specversion"), Some(&"1.0".to_string()));
        assert_eq!(
            response.get_header("ce-type"),
            Some(&"com.example.reply".to_string())
        );
        assert_eq!(response.get_header("content-type"), Some(&"text/plain".to_string()));
        assert_eq!(response.text_body(), Some("done".to_string()));
    }

    #[test]
    fn test_encode_reply_without_data_has_no_body() {
        let event = EventBuilderV10::new()
            .id("reply-2")
            .source("/replies")
            .ty("com.example.reply")
            .build()
            .unwrap();

        let response = encode_response(event).unwrap();
        assert_eq!(response.get_header("ce-id"), Some(&"reply-2".to_string()));
        assert!(response.body.is_none());
    }
}
