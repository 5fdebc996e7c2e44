//! JSON Schema (draft 2020-12) of the manifest a module prints, for module
//! authors and editor tooling.
//!
//! The schema mirrors the serde shapes in [`manifest`](super::manifest);
//! the tests decode the schema's own examples to keep the two in step.
use serde_json::{Value, json};

use super::manifest::ScriptType;

const SCRIPT_TYPES: [ScriptType; 5] = [
    ScriptType::Run,
    ScriptType::RunOnce,
    ScriptType::RunOnchange,
    ScriptType::RunBefore,
    ScriptType::RunAfter,
];

/// One variant of the `kind`-tagged resource union.
fn tagged(kind: &str, source: Value, extra: Option<(&str, Value)>) -> Value {
    let mut properties = serde_json::Map::new();
    properties.insert("kind".to_string(), json!({"const": kind}));
    properties.insert("source".to_string(), source);
    if let Some((name, schema)) = extra {
        properties.insert(name.to_string(), schema);
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": ["kind", "source"],
        "additionalProperties": false,
    })
}

fn resource() -> Value {
    json!({
        "oneOf": [
            tagged(
                "remote",
                json!({"type": "string", "format": "uri", "description": "Absolute URI with a scheme and host"}),
                Some((
                    "headers",
                    json!({
                        "type": "array",
                        "items": {"type": "object", "additionalProperties": {"type": "string"}},
                    }),
                )),
            ),
            tagged(
                "inline",
                json!({"type": "string", "minLength": 1, "description": "Literal text, trimmed"}),
                None,
            ),
            tagged(
                "local",
                json!({"type": "string", "description": "Path relative to the module, without escaping '..'"}),
                None,
            ),
        ]
    })
}

fn mode() -> Value {
    json!({
        "description": "Permission bits; every owner/group/other digit must be 4-7",
        "default": 420,
        "oneOf": [
            {"type": "integer", "minimum": 0o444, "maximum": 0o777},
            {"type": "string", "pattern": "^(0o|0O|0)?[4-7]{3}$"},
        ],
    })
}

/// The manifest schema document.
#[must_use]
pub fn manifest_schema() -> Value {
    let script_types = SCRIPT_TYPES.map(ScriptType::as_str);

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "Module manifest",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "files": {"type": "array", "items": {"$ref": "#/$defs/File"}},
            "scripts": {"type": "array", "items": {"$ref": "#/$defs/Script"}},
        },
        "$defs": {
            "Resource": resource(),
            "File": {
                "type": "object",
                "additionalProperties": false,
                "required": ["path"],
                "anyOf": [{"required": ["contents"]}, {"required": ["append"]}],
                "properties": {
                    "path": {"type": "string", "minLength": 1},
                    "contents": {"$ref": "#/$defs/Resource"},
                    "append": {"type": "array", "items": {"$ref": "#/$defs/Resource"}},
                    "mode": mode(),
                },
            },
            "Script": {
                "type": "object",
                "additionalProperties": false,
                "required": ["name", "content"],
                "properties": {
                    "name": {"type": "string", "pattern": "^[^/\\\\]+$"},
                    "type": {"enum": script_types, "default": ScriptType::default().as_str()},
                    "content": {"$ref": "#/$defs/Resource"},
                },
            },
        },
        "examples": [{
            "files": [{
                "path": "~/.gitconfig",
                "contents": {"kind": "inline", "source": "[user]\n\tname = A"},
                "mode": "644",
            }],
            "scripts": [{
                "name": "install-plugins",
                "type": "run_onchange",
                "content": {"kind": "local", "source": "scripts/plugins.sh"},
            }],
        }],
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::modules::Manifest;

    #[test]
    fn examples_are_valid_manifests() {
        let schema = manifest_schema();
        for example in schema["examples"].as_array().unwrap() {
            Manifest::parse(&example.to_string()).unwrap();
        }
    }

    #[test]
    fn script_types_match_wire_names() {
        let schema = manifest_schema();
        let listed = &schema["$defs"]["Script"]["properties"]["type"]["enum"];
        for kind in SCRIPT_TYPES {
            let decoded: ScriptType = serde_json::from_value(json!(kind.as_str())).unwrap();
            assert_eq!(decoded, kind);
        }
        assert_eq!(
            listed,
            &json!(["run", "run_once", "run_onchange", "run_before", "run_after"])
        );
        assert_eq!(
            schema["$defs"]["Script"]["properties"]["type"]["default"],
            "run_once"
        );
    }

    #[test]
    fn resource_kinds_follow_the_tag() {
        let schema = manifest_schema();
        let kinds: Vec<&str> = schema["$defs"]["Resource"]["oneOf"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["properties"]["kind"]["const"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, ["remote", "inline", "local"]);
        for kind in kinds {
            let text = format!(
                r#"{{"files": [{{"path": "a", "contents": {{"kind": "{kind}", "source": "https://h/x"}}}}]}}"#
            );
            Manifest::parse(&text).unwrap();
        }
    }

    #[test]
    fn file_properties_match_decoder() {
        let schema = manifest_schema();
        let props = schema["$defs"]["File"]["properties"].as_object().unwrap();
        assert_eq!(
            props.keys().map(String::as_str).collect::<Vec<_>>(),
            ["path", "contents", "append", "mode"]
        );
        assert_eq!(props["mode"]["default"], 0o644);
    }
}
