//! Wire-format JSON builders for mock-server tests.
//!
//! These mirror the remote API's envelopes so client and engine suites can
//! assemble realistic bodies without repeating raw JSON literals.

use serde_json::{Value, json};

/// Build an attachment/item resource body.
#[must_use]
pub fn attachment_json(
    id: i64,
    name: &str,
    filename: Option<&str>,
    parent: Option<i64>,
    item_type: i64,
) -> Value {
    let mut fields = json!({ "name": name });
    if let Some(filename) = filename {
        fields["filename"] = json!(filename);
    }
    if let Some(parent) = parent {
        fields["parent"] = json!(parent);
    }
    json!({ "id": id, "itemType": item_type, "fields": fields })
}

/// Build a bare item resource body (no attachment fields).
#[must_use]
pub fn item_json(id: i64, name: &str) -> Value {
    json!({ "id": id, "itemType": 40, "fields": { "name": name } })
}

/// Build a paginated envelope around the given resources.
#[must_use]
pub fn page_json(data: &[Value], next_link: Option<&str>) -> Value {
    let mut meta = json!({
        "pageInfo": {
            "startIndex": 0,
            "resultCount": data.len(),
            "totalResults": data.len(),
        }
    });
    if let Some(link) = next_link {
        meta["nextLink"] = json!(link);
    }
    json!({ "meta": meta, "data": data })
}

/// Build an OAuth token-endpoint response.
#[must_use]
pub fn token_json(access_token: &str) -> Value {
    json!({ "access_token": access_token, "token_type": "bearer", "expires_in": 3600 })
}

/// Build a resource-creation response carrying the new id.
#[must_use]
pub fn created_json(id: i64) -> Value {
    json!({ "meta": { "status": "Created", "id": id } })
}

/// Build the acknowledgement of a batched asynchronous patch.
#[must_use]
pub fn work_key_json(work_key: &str) -> Value {
    json!({ "data": { "workKey": work_key } })
}
