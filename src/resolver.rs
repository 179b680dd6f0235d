//! Object and plate resolution
//!
//! A container object either carries its mesh inline or points at another
//! object through components, often in a sub-file under `3D/Objects/`.
//! [`resolve_source`] decides which, in a fixed order, and the functions
//! below build the caller-facing views on top of that.

use crate::error::{Error, Result, Warning};
use crate::model::{Component, Mesh, Object};
use crate::package::Package;
use crate::transform::{Transform, padded_identity};
use crate::vendor::VendorNames;
use nalgebra::Vector3;
use std::path::Path;
use tracing::{debug, info, warn};

/// Where an object's geometry comes from
#[derive(Debug, Clone, Copy)]
pub enum ObjectSource<'a> {
    /// The object carries its own mesh
    Inline(&'a Mesh),
    /// The first component whose target object has a mesh
    ComponentRef {
        /// The component that matched
        component: &'a Component,
        /// The referenced object
        target: &'a Object,
        /// Its mesh
        mesh: &'a Mesh,
    },
    /// No geometry could be found
    Unresolved,
}

/// Resolve an object's geometry source
///
/// Order: the inline mesh, then the first component whose target (in its
/// sub-file, or in the same model when the component has no path) has a
/// mesh. Only that one level of reference is followed.
pub fn resolve_source<'a>(package: &'a Package, object: &'a Object) -> ObjectSource<'a> {
    if let Some(mesh) = object.mesh.as_ref().filter(|m| !m.vertices.is_empty()) {
        return ObjectSource::Inline(mesh);
    }

    for component in &object.components {
        let Some(target) = package.lookup(component.path.as_deref(), component.objectid) else {
            continue;
        };
        if target.id == object.id && component.path.is_none() {
            continue;
        }
        if let Some(mesh) = target.mesh.as_ref().filter(|m| !m.vertices.is_empty()) {
            return ObjectSource::ComponentRef {
                component,
                target,
                mesh,
            };
        }
    }

    ObjectSource::Unresolved
}

/// Maximum depth of same-file component chains that are followed
const MAX_COMPONENT_DEPTH: usize = 16;

/// Visit every mesh that makes up `object`, with its transform into package space
///
/// Inline meshes are visited directly under `placement`. Component objects
/// visit each component's target with the component transform composed in.
/// A component may cross into a sub-file once; chains inside one file are
/// followed up to a fixed depth.
pub fn for_each_placed_mesh(
    package: &Package,
    object: &Object,
    placement: &Transform,
    visit: &mut impl FnMut(&Mesh, &Transform),
) {
    walk(package, None, object, placement, false, 0, visit);
}

fn walk(
    package: &Package,
    context: Option<&str>,
    object: &Object,
    placement: &Transform,
    crossed_file: bool,
    depth: usize,
    visit: &mut impl FnMut(&Mesh, &Transform),
) {
    if let Some(mesh) = object.mesh.as_ref().filter(|m| !m.vertices.is_empty()) {
        visit(mesh, placement);
        return;
    }

    if depth >= MAX_COMPONENT_DEPTH {
        debug!(object_id = object.id, "component chain too deep");
        return;
    }

    for component in &object.components {
        let (target_path, crosses) = match component.path.as_deref() {
            Some(p) if Some(p) != context && p != package.model_path() => (Some(p), true),
            Some(p) => (Some(p), false),
            None => (context, false),
        };
        if crosses && crossed_file {
            debug!(object_id = object.id, "not following a second cross-file reference");
            continue;
        }
        let Some(target) = package.lookup(target_path, component.objectid) else {
            continue;
        };
        let composed = placement.then_after(&component.placement());
        walk(
            package,
            target_path,
            target,
            &composed,
            crossed_file || crosses,
            depth + 1,
            visit,
        );
    }
}

/// Where a resolved object's geometry lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Inline in the geometry part
    Inline,
    /// In another object, reached through a component
    External {
        /// Sub-file holding the geometry; `None` for the geometry part itself
        path: Option<String>,
        /// Id of the object holding the geometry
        object_id: usize,
    },
}

/// A printable object and its geometry statistics
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    /// Id in the geometry part
    pub id: usize,
    /// Display name
    pub name: String,
    /// Number of vertices
    pub vertex_count: usize,
    /// Number of triangles
    pub triangle_count: usize,
    /// Where the geometry was found
    pub provenance: Provenance,
}

/// Display name for an object given its resolved source
///
/// Precedence: the object's own name, the referenced object's name, the
/// sub-file stem, then `Object_<id>`.
pub fn display_name(object: &Object, source: &ObjectSource<'_>) -> String {
    if let Some(name) = non_empty(object.name.as_deref()) {
        return name.to_string();
    }

    if let ObjectSource::ComponentRef {
        component, target, ..
    } = source
    {
        if let Some(name) = non_empty(target.name.as_deref()) {
            return name.to_string();
        }
        if let Some(stem) = component.path.as_deref().and_then(file_stem) {
            return stem;
        }
    }

    format!("Object_{}", object.id)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn file_stem(path: &str) -> Option<String> {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// List every object of the geometry part that has geometry
///
/// Objects whose geometry cannot be resolved are omitted.
pub fn resolve_objects(package: &Package) -> Vec<ObjectInfo> {
    let mut infos = Vec::new();

    for object in &package.model().resources.objects {
        let source = resolve_source(package, object);
        let (mesh, provenance) = match source {
            ObjectSource::Inline(mesh) => (mesh, Provenance::Inline),
            ObjectSource::ComponentRef {
                component,
                target,
                mesh,
            } => (
                mesh,
                Provenance::External {
                    path: component.path.clone(),
                    object_id: target.id,
                },
            ),
            ObjectSource::Unresolved => {
                debug!(object_id = object.id, "object has no resolvable geometry");
                continue;
            }
        };

        infos.push(ObjectInfo {
            id: object.id,
            name: display_name(object, &source),
            vertex_count: mesh.vertices.len(),
            triangle_count: mesh.triangles.len(),
            provenance,
        });
    }

    infos
}

/// One build item viewed as a plate
#[derive(Debug, Clone, PartialEq)]
pub struct PlateInfo {
    /// 1-based position in the build list
    pub plate_id: usize,
    /// Referenced object id
    pub object_id: usize,
    /// Placement padded to 16 values
    pub transform: [f64; 16],
    /// Printable flag
    pub printable: bool,
    /// Display name
    pub name: String,
}

impl PlateInfo {
    /// Translation part (elements 9..11 of the padded transform)
    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.transform[9], self.transform[10], self.transform[11])
    }
}

/// The plates of a package
#[derive(Debug, Clone, PartialEq)]
pub struct PlateLayout {
    /// One entry per build item, in build order
    pub plates: Vec<PlateInfo>,
    /// More than one build item
    pub is_multi_plate: bool,
    /// Items skipped in name resolution and transforms replaced by identity
    pub warnings: Vec<Warning>,
}

impl PlateLayout {
    /// Look up a plate by its 1-based id
    pub fn plate(&self, plate_id: usize) -> Option<&PlateInfo> {
        self.plates.iter().find(|p| p.plate_id == plate_id)
    }
}

/// Describe every build item as a plate
///
/// Fails with [`Error::EmptyOrInvalidBuildList`] when the build list is
/// empty. Items referencing a missing object are kept, named `Plate <n>` and
/// reported as warnings.
pub fn detect_plates(package: &Package) -> Result<PlateLayout> {
    let items = &package.model().build.items;
    if items.is_empty() {
        return Err(Error::EmptyOrInvalidBuildList(
            "build list has no items".to_string(),
        ));
    }

    let vendor = VendorNames::read(package.parts());
    let mut plates = Vec::with_capacity(items.len());
    let mut warnings = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let plate_id = index + 1;

        let transform = match item.padded_transform() {
            Ok(values) => values,
            Err(len) => {
                warn!(plate_id, len, "invalid transform, using identity");
                warnings.push(Warning::InvalidTransform { plate_id, len });
                padded_identity()
            }
        };

        let object = package.model().object(item.objectid);
        let object_name = match object {
            Some(object) => {
                let source = resolve_source(package, object);
                let resolved = display_name(object, &source);
                // The synthetic fallback does not outrank `Plate <n>`
                Some(resolved).filter(|n| *n != format!("Object_{}", object.id))
            }
            None => {
                warn!(plate_id, object_id = item.objectid, "build item references unknown object");
                warnings.push(Warning::UnknownObjectRef {
                    plate_id,
                    object_id: item.objectid,
                });
                None
            }
        };

        let name = vendor
            .plates
            .get(&plate_id)
            .or_else(|| object.and_then(|_| vendor.objects.get(&item.objectid)))
            .cloned()
            .or(object_name)
            .unwrap_or_else(|| format!("Plate {}", plate_id));

        plates.push(PlateInfo {
            plate_id,
            object_id: item.objectid,
            transform,
            printable: item.printable,
            name,
        });
    }

    let is_multi_plate = plates.len() > 1;
    info!(plates = plates.len(), is_multi_plate, "detected plates");

    Ok(PlateLayout {
        plates,
        is_multi_plate,
        warnings,
    })
}
