use refract_config::{json_schema, json_schema_string};

#[test]
fn schema_lists_every_table() {
    let schema = serde_json::to_value(json_schema()).unwrap();
    let properties = schema["properties"].as_object().expect("root properties");
    let mut tables: Vec<&str> = properties.keys().map(String::as_str).collect();
    tables.sort_unstable();
    assert_eq!(tables, ["logging", "refactoring", "scanner"]);
    assert_eq!(schema["additionalProperties"], serde_json::Value::Bool(false));
}

#[test]
fn schema_serializes_to_json() {
    let text = json_schema_string().unwrap();
    assert!(text.contains("\"undo_limit\""));
    assert!(text.contains("\"update_textual_matches\""));
}
