//! The success envelope shared by every handler.

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

pub fn list(docs: Vec<Value>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "results": docs.len(),
        "data": { "data": docs },
    }))
}

pub fn single(doc: Value) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": { "data": doc },
    }))
}

pub fn created(doc: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, single(doc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_envelope_counts_results() {
        let Json(body) = list(vec![json!({"id": 1}), json!({"id": 2})]);
        assert_eq!(body["status"], "success");
        assert_eq!(body["results"], 2);
        assert_eq!(body["data"]["data"][1]["id"], 2);
    }

    #[test]
    fn created_envelope_uses_201() {
        let (status, Json(body)) = created(json!({"name": "The Forest Hiker"}));
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["data"]["name"], "The Forest Hiker");
    }
}
