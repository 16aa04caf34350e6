//! Remote node payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server metadata kept alongside each node of the connector tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteNode {
    /// Server-side content class.
    pub class_name: Option<String>,
    pub uuid: Option<String>,
    pub tags: Vec<String>,
    pub permission: Option<String>,
    /// Number of children reported for a node that has not been loaded yet.
    pub count: Option<u64>,
    /// Whether the full node (not just its summary) came from the server.
    pub is_loaded: bool,
    /// Whether the node was created locally and not saved yet.
    pub is_new: bool,
}

/// The JSON shape of a node as served by the content server.
///
/// Children use the same shape; for them `name` and `count` are set and
/// `children` is usually empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteNodeData {
    pub name: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub uuid: Option<String>,
    #[serde(deserialize_with = "nullable_tags")]
    pub tags: Vec<String>,
    pub permission: Option<String>,
    pub title: Option<Value>,
    pub content: BTreeMap<String, Value>,
    pub children: Vec<RemoteNodeData>,
    pub count: Option<u64>,
}

impl RemoteNodeData {
    /// Every property the node carries: `title` followed by the content map.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.title
            .iter()
            .filter(|title| !title.is_null())
            .map(|title| ("title", title))
            .chain(self.content.iter().map(|(name, value)| (name.as_str(), value)))
    }

    /// Copy the metadata fields into `node`.
    pub(crate) fn apply_metadata(&self, node: &mut RemoteNode) {
        node.class_name.clone_from(&self.class_name);
        node.uuid.clone_from(&self.uuid);
        node.tags.clone_from(&self.tags);
        if self.permission.is_some() {
            node.permission.clone_from(&self.permission);
        }
        if self.count.is_some() {
            node.count = self.count;
        }
    }
}

fn nullable_tags<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_node() {
        let data: RemoteNodeData = serde_json::from_value(json!({
            "class": "Folder",
            "uuid": "1234",
            "tags": null,
            "permission": "write",
            "title": "Docs",
            "content": { "body": "<p>hi</p>" },
            "children": [{ "name": "intro", "count": 3, "title": "Intro" }]
        }))
        .unwrap();

        assert_eq!(data.class_name.as_deref(), Some("Folder"));
        assert!(data.tags.is_empty());
        assert_eq!(data.children[0].name.as_deref(), Some("intro"));
        assert_eq!(data.children[0].count, Some(3));

        let properties: Vec<&str> = data.properties().map(|(name, _)| name).collect();
        assert_eq!(properties, vec!["title", "body"]);
    }

    #[test]
    fn test_apply_metadata() {
        let data = RemoteNodeData {
            class_name: Some("Page".into()),
            tags: vec!["a".into()],
            count: Some(2),
            ..Default::default()
        };
        let mut node = RemoteNode {
            permission: Some("read".into()),
            ..Default::default()
        };
        data.apply_metadata(&mut node);
        assert_eq!(node.class_name.as_deref(), Some("Page"));
        assert_eq!(node.tags, vec!["a".to_string()]);
        assert_eq!(node.permission.as_deref(), Some("read"));
        assert_eq!(node.count, Some(2));
    }
}
