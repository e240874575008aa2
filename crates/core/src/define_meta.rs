//! The define-meta document: which components a model version is made of.
//!
//! Define-meta exists in two interchangeable representations: rows in the
//! metadata store, and a YAML snapshot on disk (used when no rows exist,
//! e.g. for imported packages). This module holds the document form and the
//! rearrangement from a flat row view.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from an artifact file name to its serialized-structure
/// descriptor. Local completeness of a component is judged by the presence
/// of every file named here.
pub type ProtoIndex = BTreeMap<String, String>;

/// Definition of one component: the module that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDefine {
    pub module_name: String,
}

/// The define-meta document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefineMeta {
    /// Component name -> defining module.
    pub component_define: BTreeMap<String, ComponentDefine>,
    /// Component name -> model alias -> proto-index.
    pub model_proto: BTreeMap<String, BTreeMap<String, ProtoIndex>>,
}

impl DefineMeta {
    /// Build a document from a flat per-(component, alias) row view.
    ///
    /// The iterator yields `(component_name, module_name, model_alias,
    /// proto_index)` tuples, one per metadata row.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, String, String, ProtoIndex)>,
    {
        let mut meta = Self::default();
        for (component_name, module_name, model_alias, proto_index) in rows {
            meta.component_define
                .insert(component_name.clone(), ComponentDefine { module_name });
            meta.model_proto
                .entry(component_name)
                .or_default()
                .insert(model_alias, proto_index);
        }
        meta
    }

    /// Flatten the document back into per-(component, alias) tuples.
    ///
    /// Inverse of [`from_rows`](Self::from_rows); components present in
    /// `component_define` but absent from `model_proto` yield nothing.
    pub fn to_rows(&self) -> Vec<(String, String, String, ProtoIndex)> {
        let mut rows = Vec::new();
        for (component_name, define) in &self.component_define {
            let Some(aliases) = self.model_proto.get(component_name) else {
                continue;
            };
            for (model_alias, proto_index) in aliases {
                rows.push((
                    component_name.clone(),
                    define.module_name.clone(),
                    model_alias.clone(),
                    proto_index.clone(),
                ));
            }
        }
        rows
    }

    pub fn is_empty(&self) -> bool {
        self.component_define.is_empty()
    }

    /// Names of all defined components.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.component_define.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DefineMeta {
        DefineMeta::from_rows([
            (
                "feature_engineering".to_string(),
                "HeteroFeatureBinning".to_string(),
                "binning".to_string(),
                ProtoIndex::from([("model.pb".to_string(), "BinningModel".to_string())]),
            ),
            (
                "trainer".to_string(),
                "HeteroLR".to_string(),
                "lr".to_string(),
                ProtoIndex::from([
                    ("param.pb".to_string(), "LRParam".to_string()),
                    ("meta.pb".to_string(), "LRMeta".to_string()),
                ]),
            ),
        ])
    }

    #[test]
    fn test_rows_roundtrip() {
        let meta = sample();
        let rebuilt = DefineMeta::from_rows(meta.to_rows());
        assert_eq!(meta, rebuilt);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let meta = sample();
        let text = serde_yaml::to_string(&meta).unwrap();
        assert!(text.contains("component_define"));
        assert!(text.contains("model_proto"));
        let parsed: DefineMeta = serde_yaml::from_str(&text).unwrap();
        assert_eq!(meta, parsed);
    }
}
