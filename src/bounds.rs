//! Axis-aligned bounds of objects, plates and whole packages
//!
//! Vertices are scanned directly from the parsed meshes. Component
//! transforms are composed into the local bounds, which are then shifted
//! into package space by the build item's translation.

use crate::error::{Error, Result, Warning};
use crate::model::{BuildItem, Object};
use crate::package::Package;
use crate::resolver::for_each_placed_mesh;
use crate::transform::Transform;
use nalgebra::{Point3, Vector3};
use tracing::debug;

/// Tolerance callers use to decide whether an object rests on the bed
///
/// Bounds themselves are exact; nothing in this module applies it.
pub const ON_BED_TOLERANCE_MM: f64 = 1e-3;

/// An axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Point3<f64>,
    /// Maximum corner
    pub max: Point3<f64>,
}

impl Aabb {
    /// A degenerate box containing one point
    pub fn from_point(p: Point3<f64>) -> Self {
        Self { min: p, max: p }
    }

    /// Grow to contain `p`
    pub fn extend(&mut self, p: Point3<f64>) {
        self.min = self.min.inf(&p);
        self.max = self.max.sup(&p);
    }

    /// Smallest box containing both
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Edge lengths
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Center point
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Check if the box's bottom is at Z = 0 within `tolerance`
    pub fn is_on_bed(&self, tolerance: f64) -> bool {
        self.min.z.abs() <= tolerance
    }
}

fn merge(acc: &mut Option<Aabb>, other: Option<Aabb>) {
    if let Some(other) = other {
        *acc = Some(match acc {
            Some(current) => current.union(&other),
            None => other,
        });
    }
}

/// What to measure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsScope {
    /// Every resolvable build item
    Whole,
    /// One build item by 1-based position
    Plate(usize),
    /// Every placement of one object
    Object(usize),
}

/// Bounds plus anything skipped while computing them
#[derive(Debug, Clone, PartialEq)]
pub struct BoundsReport {
    /// The bounds, `None` when no geometry was found
    pub aabb: Option<Aabb>,
    /// Items that could not be measured
    pub warnings: Vec<Warning>,
}

/// Compute bounds in package space
///
/// `Plate(n)` fails with [`Error::InvalidParameter`] when `n` is out of
/// range and [`Error::UnknownObjectRef`] when the item's object is missing.
/// `Object(id)` fails with [`Error::UnknownObjectRef`] for an unknown id; an
/// object no build item places is measured in its local space. `Whole`
/// skips unresolvable items and reports them as warnings.
pub fn bounds(package: &Package, scope: BoundsScope) -> Result<BoundsReport> {
    let model = package.model();
    let items = &model.build.items;
    let mut warnings = Vec::new();

    let aabb = match scope {
        BoundsScope::Whole => {
            let mut acc = None;
            for (index, item) in items.iter().enumerate() {
                let plate_id = index + 1;
                match model.object(item.objectid) {
                    Some(object) => {
                        let placement = item_placement(item, plate_id, &mut warnings);
                        merge(&mut acc, object_bounds(package, object, &placement));
                    }
                    None => {
                        debug!(plate_id, object_id = item.objectid, "skipping unresolvable item");
                        warnings.push(Warning::UnknownObjectRef {
                            plate_id,
                            object_id: item.objectid,
                        });
                    }
                }
            }
            acc
        }
        BoundsScope::Plate(plate_id) => {
            if plate_id == 0 || plate_id > items.len() {
                return Err(Error::InvalidParameter(format!(
                    "plate {} not found (package has {} items)",
                    plate_id,
                    items.len()
                )));
            }
            let item = &items[plate_id - 1];
            let object = model.object(item.objectid).ok_or(Error::UnknownObjectRef {
                object_id: item.objectid,
            })?;
            let placement = item_placement(item, plate_id, &mut warnings);
            object_bounds(package, object, &placement)
        }
        BoundsScope::Object(object_id) => {
            let object = model
                .object(object_id)
                .ok_or(Error::UnknownObjectRef { object_id })?;
            let mut acc = None;
            let mut placed = false;
            for (index, item) in items.iter().enumerate() {
                if item.objectid == object_id {
                    placed = true;
                    let placement = item_placement(item, index + 1, &mut warnings);
                    merge(&mut acc, object_bounds(package, object, &placement));
                }
            }
            if !placed {
                acc = object_bounds(package, object, &Transform::identity());
            }
            acc
        }
    };

    Ok(BoundsReport { aabb, warnings })
}

/// Shift into package space by the item's translation
///
/// Rotation and scale in the item transform do not change the reported
/// extents; component transforms still apply in local space.
fn item_placement(item: &BuildItem, plate_id: usize, warnings: &mut Vec<Warning>) -> Transform {
    if let Err(len) = item.padded_transform() {
        warnings.push(Warning::InvalidTransform { plate_id, len });
    }
    let t = item.placement().translation_part();
    Transform::translation(t.x, t.y, t.z)
}

/// Bounds of an object's geometry under `placement`
///
/// Inline meshes are scanned directly. Component objects contribute every
/// component's target with the component transform composed in. A component
/// may cross into a sub-file once; chains inside one file are followed up to
/// a fixed depth.
pub fn object_bounds(package: &Package, object: &Object, placement: &Transform) -> Option<Aabb> {
    let mut acc = None;
    for_each_placed_mesh(package, object, placement, &mut |mesh, transform| {
        let mut local: Option<Aabb> = None;
        for v in &mesh.vertices {
            let [x, y, z] = transform.apply(v.x, v.y, v.z);
            let p = Point3::new(x, y, z);
            match local.as_mut() {
                Some(b) => b.extend(p),
                None => local = Some(Aabb::from_point(p)),
            }
        }
        merge(&mut acc, local);
    });
    acc
}

/// Width, depth and height of the first printable item's object
///
/// Measured in the object's local space, ignoring the item placement.
pub fn object_dimensions(package: &Package) -> Result<Vector3<f64>> {
    let model = package.model();
    model
        .build
        .items
        .iter()
        .filter(|item| item.printable)
        .filter_map(|item| model.object(item.objectid))
        .find_map(|object| object_bounds(package, object, &Transform::identity()))
        .map(|b| b.size())
        .ok_or_else(|| {
            Error::EmptyOrInvalidBuildList("no printable object with geometry".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::{Part, PartTable};
    use zip::CompressionMethod;

    const CUBE: &str = r#"<mesh><vertices>
        <vertex x="0" y="0" z="0"/><vertex x="1" y="0" z="0"/><vertex x="1" y="1" z="0"/><vertex x="0" y="1" z="0"/>
        <vertex x="0" y="0" z="1"/><vertex x="1" y="0" z="1"/><vertex x="1" y="1" z="1"/><vertex x="0" y="1" z="1"/>
        </vertices><triangles><triangle v1="0" v2="1" v3="2"/></triangles></mesh>"#;

    fn package(entries: &[(&str, String)]) -> Package {
        let parts = entries
            .iter()
            .map(|(name, data)| Part {
                name: name.to_string(),
                data: data.as_bytes().to_vec(),
                compression: CompressionMethod::Deflated,
                is_dir: false,
            })
            .collect();
        Package::from_parts(PartTable::from_parts(parts)).unwrap()
    }

    fn model(resources: &str, build: &str) -> String {
        format!(
            r#"<model unit="millimeter" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02" xmlns:p="http://schemas.microsoft.com/3dmanufacturing/production/2015/06"><resources>{}</resources><build>{}</build></model>"#,
            resources, build
        )
    }

    fn assert_point(p: Point3<f64>, expected: [f64; 3]) {
        for i in 0..3 {
            assert!((p[i] - expected[i]).abs() < 1e-9, "{p:?} != {expected:?}");
        }
    }

    #[test]
    fn test_unit_cube_translated() {
        let pkg = package(&[(
            "3D/3dmodel.model",
            model(
                &format!(r#"<object id="1">{CUBE}</object>"#),
                r#"<item objectid="1" transform="1 0 0 0 1 0 0 0 1 10 20 30"/>"#,
            ),
        )]);

        let report = bounds(&pkg, BoundsScope::Object(1)).unwrap();
        let aabb = report.aabb.unwrap();
        assert_point(aabb.min, [10.0, 20.0, 30.0]);
        assert_point(aabb.max, [11.0, 21.0, 31.0]);
        assert!(report.warnings.is_empty());
        assert!(!aabb.is_on_bed(ON_BED_TOLERANCE_MM));
    }

    #[test]
    fn test_components_compose_offsets() {
        let pkg = package(&[
            (
                "3D/3dmodel.model",
                model(
                    r#"<object id="3"><components>
                        <component p:path="/3D/Objects/cube.model" objectid="1" transform="1 0 0 0 1 0 0 0 1 -5 0 0"/>
                        <component p:path="/3D/Objects/cube.model" objectid="1" transform="1 0 0 0 1 0 0 0 1 5 0 0"/>
                    </components></object>"#,
                    r#"<item objectid="3" transform="1 0 0 0 1 0 0 0 1 100 100 0"/>"#,
                ),
            ),
            (
                "3D/Objects/cube.model",
                model(&format!(r#"<object id="1">{CUBE}</object>"#), ""),
            ),
        ]);

        let aabb = bounds(&pkg, BoundsScope::Plate(1)).unwrap().aabb.unwrap();
        assert_point(aabb.min, [95.0, 100.0, 0.0]);
        assert_point(aabb.max, [106.0, 101.0, 1.0]);
        assert!(aabb.is_on_bed(ON_BED_TOLERANCE_MM));
        assert_point(aabb.center(), [100.5, 100.5, 0.5]);
    }

    #[test]
    fn test_placement_shifts_by_translation_only() {
        let pkg = package(&[(
            "3D/3dmodel.model",
            model(
                &format!(r#"<object id="1">{CUBE}</object>"#),
                r#"<item objectid="1" transform="0 1 0 -1 0 0 0 0 1 0 0 0"/><item objectid="1" transform="2 0 0 0 2 0 0 0 2 10 0 5"/>"#,
            ),
        )]);
        let aabb = bounds(&pkg, BoundsScope::Plate(1)).unwrap().aabb.unwrap();
        assert_point(aabb.min, [0.0, 0.0, 0.0]);
        assert_point(aabb.max, [1.0, 1.0, 1.0]);

        let scaled = bounds(&pkg, BoundsScope::Plate(2)).unwrap().aabb.unwrap();
        assert_point(scaled.min, [10.0, 0.0, 5.0]);
        assert_point(scaled.max, [11.0, 1.0, 6.0]);
    }

    #[test]
    fn test_whole_skips_unknown_items() {
        let pkg = package(&[(
            "3D/3dmodel.model",
            model(
                &format!(r#"<object id="1">{CUBE}</object>"#),
                r#"<item objectid="1"/><item objectid="9"/><item objectid="1" transform="1 0 0 0 1 0 0 0 1 50 0 0"/>"#,
            ),
        )]);
        let report = bounds(&pkg, BoundsScope::Whole).unwrap();
        let aabb = report.aabb.unwrap();
        assert_point(aabb.min, [0.0, 0.0, 0.0]);
        assert_point(aabb.max, [51.0, 1.0, 1.0]);
        assert_eq!(
            report.warnings,
            vec![Warning::UnknownObjectRef {
                plate_id: 2,
                object_id: 9
            }]
        );
    }

    #[test]
    fn test_scope_errors() {
        let pkg = package(&[(
            "3D/3dmodel.model",
            model(
                &format!(r#"<object id="1">{CUBE}</object>"#),
                r#"<item objectid="7"/>"#,
            ),
        )]);
        assert!(matches!(
            bounds(&pkg, BoundsScope::Plate(0)),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            bounds(&pkg, BoundsScope::Plate(2)),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            bounds(&pkg, BoundsScope::Plate(1)),
            Err(Error::UnknownObjectRef { object_id: 7 })
        ));
        assert!(matches!(
            bounds(&pkg, BoundsScope::Object(4)),
            Err(Error::UnknownObjectRef { object_id: 4 })
        ));
        // Object 1 is never placed: local bounds
        let aabb = bounds(&pkg, BoundsScope::Object(1)).unwrap().aabb.unwrap();
        assert_point(aabb.max, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_object_dimensions_uses_first_printable() {
        let pkg = package(&[(
            "3D/3dmodel.model",
            model(
                &format!(
                    r#"<object id="1">{CUBE}</object><object id="2"><mesh><vertices><vertex x="0" y="0" z="0"/><vertex x="4" y="3" z="2"/></vertices><triangles/></mesh></object>"#
                ),
                r#"<item objectid="1" printable="0"/><item objectid="2" transform="1 0 0 0 1 0 0 0 1 9 9 9"/>"#,
            ),
        )]);
        let dims = object_dimensions(&pkg).unwrap();
        assert_eq!(dims, Vector3::new(4.0, 3.0, 2.0));
    }
}
