//! Request bodies for the Notion REST API.

use serde_json::{json, Map, Value};
use sync_core::{ContentBlock, PropertyValue, RemoteRecord, LOCATOR_PROPERTY};

fn text_objects(segments: &[String]) -> Value {
    Value::Array(
        segments
            .iter()
            .map(|content| json!({ "type": "text", "text": { "content": content } }))
            .collect(),
    )
}

/// Body of `POST /v1/pages` creating `record` in `database_id`.
pub fn page_payload(database_id: &str, record: &RemoteRecord) -> Value {
    let mut properties = Map::new();
    for (name, value) in &record.properties {
        let property = match value {
            PropertyValue::Title(segments) => json!({ "title": text_objects(segments) }),
            PropertyValue::RichText(segments) => json!({ "rich_text": text_objects(segments) }),
        };
        properties.insert(name.clone(), property);
    }

    let mut body = json!({
        "parent": { "database_id": database_id },
        "properties": properties,
    });

    if !record.children.is_empty() {
        let children: Vec<Value> = record
            .children
            .iter()
            .map(|block| match block {
                ContentBlock::Paragraph(segments) => json!({
                    "object": "block",
                    "type": "paragraph",
                    "paragraph": { "rich_text": text_objects(segments) },
                }),
            })
            .collect();
        body["children"] = Value::Array(children);
    }

    body
}

/// Body of `POST /v1/databases/{id}/query` matching pages whose locator
/// property equals `locator`. One result is enough to answer existence.
pub fn locator_query_payload(locator: &str) -> Value {
    json!({
        "filter": {
            "property": LOCATOR_PROPERTY,
            "rich_text": { "equals": locator },
        },
        "page_size": 1,
    })
}
