//! A package opened for inspection
//!
//! [`Package`] pairs the raw [`PartTable`] with the parsed resource graph of
//! the geometry part and of every sub-file a component points into.

use crate::error::{Error, Result, Warning};
use crate::model::{Model, Object};
use crate::opc::PartTable;
use crate::parser::parse_model;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// A parsed package: its parts, the main model and referenced sub-models
#[derive(Debug, Clone)]
pub struct Package {
    parts: PartTable,
    model_path: String,
    model: Model,
    sub_models: HashMap<String, Model>,
    warnings: Vec<Warning>,
}

impl Package {
    /// Open and parse a package file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_parts(PartTable::from_path(path)?)
    }

    /// Parse a package held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_parts(PartTable::from_bytes(bytes)?)
    }

    /// Parse the geometry part and every referenced sub-file
    ///
    /// Fails with [`Error::MissingRequiredPart`] when the geometry part is
    /// absent and [`Error::MalformedPart`] when it does not parse. Sub-files
    /// are read best-effort: one that is missing or malformed is recorded as
    /// a [`Warning::UnreadableSubModel`] and treated as absent.
    pub fn from_parts(parts: PartTable) -> Result<Self> {
        let model_path = parts.model_path();
        let data = parts
            .get(&model_path)
            .ok_or_else(|| Error::MissingRequiredPart(model_path.clone()))?;
        let model = parse_model(&model_path, data)?;

        let mut sub_models = HashMap::new();
        let mut warnings = Vec::new();

        let mut referenced: Vec<&str> = model
            .resources
            .objects
            .iter()
            .flat_map(|o| o.components.iter())
            .filter_map(|c| c.path.as_deref())
            .filter(|p| *p != model_path)
            .collect();
        referenced.sort_unstable();
        referenced.dedup();

        for path in referenced {
            let parsed = parts
                .get(path)
                .ok_or_else(|| Error::PartNotFound(path.to_string()))
                .and_then(|bytes| parse_model(path, bytes));
            match parsed {
                Ok(sub) => {
                    debug!(part = path, objects = sub.resources.objects.len(), "parsed sub-model");
                    sub_models.insert(path.to_string(), sub);
                }
                Err(e) => {
                    warn!(part = path, error = %e, "skipping unreadable sub-model");
                    warnings.push(Warning::UnreadableSubModel {
                        path: path.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            parts,
            model_path,
            model,
            sub_models,
            warnings,
        })
    }

    /// The raw parts
    pub fn parts(&self) -> &PartTable {
        &self.parts
    }

    /// Give back the raw parts
    pub fn into_parts(self) -> PartTable {
        self.parts
    }

    /// Name of the geometry part
    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    /// The parsed geometry part
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// A parsed sub-file, if it was referenced and readable
    pub fn sub_model(&self, path: &str) -> Option<&Model> {
        self.sub_models.get(path.trim_start_matches('/'))
    }

    /// Warnings collected while loading
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// The model a component path points into
    ///
    /// `None` (or the geometry part's own name) means the main model.
    pub fn model_at(&self, path: Option<&str>) -> Option<&Model> {
        match path {
            None => Some(&self.model),
            Some(p) if p.trim_start_matches('/') == self.model_path => Some(&self.model),
            Some(p) => self.sub_model(p),
        }
    }

    /// Look up an object by id in the main model or a sub-file
    pub fn lookup(&self, path: Option<&str>, id: usize) -> Option<&Object> {
        self.model_at(path).and_then(|m| m.object(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::Part;
    use zip::CompressionMethod;

    fn part(name: &str, data: &str) -> Part {
        Part {
            name: name.to_string(),
            data: data.as_bytes().to_vec(),
            compression: CompressionMethod::Deflated,
            is_dir: false,
        }
    }

    const MAIN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02" xmlns:p="http://schemas.microsoft.com/3dmanufacturing/production/2015/06">
  <resources>
    <object id="2" type="model">
      <components>
        <component p:path="/3D/Objects/object_1.model" objectid="1"/>
        <component p:path="/3D/Objects/missing.model" objectid="1"/>
      </components>
    </object>
  </resources>
  <build><item objectid="2"/></build>
</model>"#;

    const SUB: &str = r#"<model unit="millimeter" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
  <resources>
    <object id="1" name="Gear"><mesh><vertices><vertex x="0" y="0" z="0"/></vertices><triangles/></mesh></object>
  </resources>
  <build/>
</model>"#;

    #[test]
    fn test_loads_sub_models_best_effort() {
        let parts = PartTable::from_parts(vec![
            part("3D/3dmodel.model", MAIN),
            part("3D/Objects/object_1.model", SUB),
        ]);
        let package = Package::from_parts(parts).unwrap();

        assert_eq!(package.model_path(), "3D/3dmodel.model");
        assert!(package.sub_model("/3D/Objects/object_1.model").is_some());
        assert_eq!(
            package
                .lookup(Some("3D/Objects/object_1.model"), 1)
                .and_then(|o| o.name.as_deref()),
            Some("Gear")
        );
        assert_eq!(
            package.warnings(),
            &[Warning::UnreadableSubModel {
                path: "3D/Objects/missing.model".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_geometry_part() {
        let parts = PartTable::from_parts(vec![part("Metadata/readme.txt", "hi")]);
        assert!(matches!(
            Package::from_parts(parts),
            Err(Error::MissingRequiredPart(_))
        ));
    }

    #[test]
    fn test_malformed_geometry_part() {
        let parts = PartTable::from_parts(vec![part("3D/3dmodel.model", "<model><resources>")]);
        assert!(matches!(
            Package::from_parts(parts),
            Err(Error::MalformedPart { .. })
        ));
    }
}
