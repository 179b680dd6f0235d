//! Clean re-export of a package's geometry
//!
//! Vendor packages can carry container quirks a slicer chokes on. The clean
//! path flattens every placed object into one inline mesh, keeps each build
//! item's placement and writes a fresh package with nothing else in it.

use crate::error::{Error, Result};
use crate::model::{BuildItem, Mesh, Model, Object, Triangle, Vertex};
use crate::opc::{PartTable, create_package};
use crate::package::Package;
use crate::resolver::{display_name, for_each_placed_mesh, resolve_source};
use crate::transform::Transform;
use crate::writer::model_to_bytes;
use std::collections::HashMap;
use std::io::Cursor;
use tracing::{info, warn};

/// Flatten `package` into a fresh single-part package
///
/// Component geometry is baked into each object's own coordinates, so the
/// new objects carry plain meshes. Items whose object is missing or has no
/// geometry are dropped with a warning; if none remain the rebuild fails
/// with [`Error::EmptyOrInvalidBuildList`].
pub fn rebuild_clean(package: &Package) -> Result<PartTable> {
    let source = package.model();
    let mut model = Model::new();
    model.unit = source.unit.clone();
    let mut rebuilt: HashMap<usize, usize> = HashMap::new();

    for (index, item) in source.build.items.iter().enumerate() {
        let new_id = match rebuilt.get(&item.objectid) {
            Some(id) => *id,
            None => {
                let Some(object) = source.object(item.objectid) else {
                    warn!(plate_id = index + 1, object_id = item.objectid, "dropping item with unknown object");
                    continue;
                };
                let mesh = flatten(package, object);
                if mesh.vertices.is_empty() {
                    warn!(plate_id = index + 1, object_id = item.objectid, "dropping item without geometry");
                    continue;
                }

                let id = model.resources.objects.len() + 1;
                let mut flat = Object::new(id);
                flat.name = Some(display_name(object, &resolve_source(package, object)));
                flat.mesh = Some(mesh);
                model.resources.objects.push(flat);
                rebuilt.insert(item.objectid, id);
                id
            }
        };

        let mut placed = BuildItem::new(new_id);
        placed.transform = item.transform.clone();
        placed.printable = item.printable;
        model.build.items.push(placed);
    }

    if model.build.items.is_empty() {
        return Err(Error::EmptyOrInvalidBuildList(
            "no build item with geometry to re-export".to_string(),
        ));
    }

    let xml = model_to_bytes(&model)?;
    let bytes = create_package(Cursor::new(Vec::new()), &xml)?.into_inner();
    info!(
        objects = model.resources.objects.len(),
        items = model.build.items.len(),
        "rebuilt clean package"
    );
    PartTable::from_bytes(&bytes)
}

/// One mesh holding all of an object's geometry in its local space
fn flatten(package: &Package, object: &Object) -> Mesh {
    let mut out = Mesh::new();
    for_each_placed_mesh(package, object, &Transform::identity(), &mut |mesh, transform| {
        let offset = out.vertices.len();
        out.vertices.extend(mesh.vertices.iter().map(|v| {
            let [x, y, z] = transform.apply(v.x, v.y, v.z);
            Vertex::new(x, y, z)
        }));
        out.triangles.extend(
            mesh.triangles
                .iter()
                .map(|t| Triangle::new(t.v1 + offset, t.v2 + offset, t.v3 + offset)),
        );
    });
    out
}
