//! Test fixtures and item generators.

use chrono::Utc;
use engine_core::Item;

/// A valid item JSON with a unique URL.
pub fn item_json(n: usize) -> serde_json::Value {
    serde_json::json!({
        "created_at": Utc::now().to_rfc3339(),
        "title": format!("Headline {}", n),
        "content": format!("Body of post number {}", n),
        "domain": "news.example.com",
        "url": format!("https://news.example.com/posts/{}", n),
    })
}

/// N valid items, numbered from 0.
pub fn items_json(n: usize) -> Vec<serde_json::Value> {
    (0..n).map(item_json).collect()
}

/// A typed item, for sources that produce items directly.
pub fn item(n: usize) -> Item {
    Item::from_value(item_json(n)).expect("fixture item is valid")
}

/// An item missing its content.
pub fn item_without_content() -> serde_json::Value {
    let mut item = item_json(0);
    item.as_object_mut().unwrap().remove("content");
    item
}

/// An item whose URL is not a URL.
pub fn item_with_bad_url() -> serde_json::Value {
    let mut item = item_json(0);
    item["url"] = serde_json::Value::String("not a url".into());
    item
}

/// An item over the per-item size limit.
pub fn oversized_item() -> serde_json::Value {
    let mut item = item_json(0);
    item["summary"] = serde_json::Value::String("x".repeat(300 * 1024));
    item
}

/// Remote sources configuration document with the given cursor.
pub fn sources_document(cursor: u8, concurrency: &[(&str, u32)]) -> String {
    let concurrency: serde_json::Map<String, serde_json::Value> = concurrency
        .iter()
        .map(|(id, n)| (format!("https://github.com/harvest/{}", id), serde_json::json!(n)))
        .collect();

    serde_json::json!({
        "new_keyword_alg": cursor,
        "lang_map": {},
        "generic_modules_parameters": { "max_oldness_seconds": 60 },
        "specific_modules_parameters": {},
        "concurrency": concurrency,
    })
    .to_string()
}
