// tests/common/mod.rs
#![allow(dead_code)]

use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{json, Value};
use std::net::TcpListener;

/// `host:port` of a mock server, the form `--host` takes
pub fn host(server: &ServerGuard) -> String {
    server.host_with_port()
}

/// Mock answering any `_search` on `server` with `body`; call `create()` on it
pub fn search_mock(server: &mut ServerGuard, body: &Value) -> Mock {
    server
        .mock("GET", "/_search")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
}

/// Like `search_mock`, limited to calls whose `q` parameter decodes to `query`
pub fn search_mock_for(server: &mut ServerGuard, query: &str, body: &Value) -> Mock {
    server
        .mock("GET", "/_search")
        .match_query(Matcher::UrlEncoded("q".into(), query.into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
}

/// A local address nothing listens on
pub fn dead_host() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("127.0.0.1:{}", port)
}

/// `_search` response body with one hit per latency, ES 7 style total
pub fn search_body(latencies: &[f64]) -> Value {
    let hits: Vec<Value> = latencies
        .iter()
        .enumerate()
        .map(|(i, ms)| {
            json!({
                "_index": "logstash-2015.02.05",
                "_id": format!("doc-{}", i),
                "_source": {"latency": {"response_transmitted": ms}}
            })
        })
        .collect();
    json!({
        "took": 1,
        "timed_out": false,
        "hits": {
            "total": {"value": latencies.len(), "relation": "eq"},
            "hits": hits
        }
    })
}

/// Ten requests at 10ms with one 100ms outlier, newest first
pub const OUTLIER_LATENCIES: [f64; 10] = [10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 100.0];
