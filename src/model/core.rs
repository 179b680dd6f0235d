//! Core resource graph types

use crate::transform::{Transform, padded_identity, pad_to_matrix};

/// A 3D vertex with x, y, z coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
}

impl Vertex {
    /// Create a new vertex
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A triangle defined by three vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    /// Index of first vertex
    pub v1: usize,
    /// Index of second vertex
    pub v2: usize,
    /// Index of third vertex
    pub v3: usize,
}

impl Triangle {
    /// Create a new triangle
    pub fn new(v1: usize, v2: usize, v3: usize) -> Self {
        Self { v1, v2, v3 }
    }
}

/// A 3D mesh containing vertices and triangles
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// List of vertices
    pub vertices: Vec<Vertex>,
    /// List of triangles
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new mesh with pre-allocated capacity
    pub fn with_capacity(vertices: usize, triangles: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            triangles: Vec::with_capacity(triangles),
        }
    }
}

/// A component that references another object with optional transformation
#[derive(Debug, Clone)]
pub struct Component {
    /// ID of the referenced object
    pub objectid: usize,
    /// Raw transform values, if the attribute is present
    pub transform: Option<Vec<f64>>,
    /// Sub-file holding the referenced object (`p:path`), percent-decoded and
    /// without leading slash
    ///
    /// `None` means the object lives in the same model part.
    pub path: Option<String>,
}

impl Component {
    /// Create a new component with the given object reference
    pub fn new(objectid: usize) -> Self {
        Self {
            objectid,
            transform: None,
            path: None,
        }
    }

    /// The component's transform, identity when absent or unusable
    pub fn placement(&self) -> Transform {
        self.transform
            .as_deref()
            .and_then(Transform::from_values)
            .unwrap_or_default()
    }
}

/// Type of 3D object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectType {
    /// A standard model object
    #[default]
    Model,
    /// A support structure
    Support,
    /// A solid support structure
    SolidSupport,
    /// A surface object
    Surface,
    /// Other types
    Other,
}

impl ObjectType {
    /// Parse the `type` attribute, defaulting unknown values to `Other`
    pub fn from_attr(value: &str) -> Self {
        match value {
            "model" => ObjectType::Model,
            "support" => ObjectType::Support,
            "solidsupport" => ObjectType::SolidSupport,
            "surface" => ObjectType::Surface,
            _ => ObjectType::Other,
        }
    }

    /// Attribute value for this type
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Model => "model",
            ObjectType::Support => "support",
            ObjectType::SolidSupport => "solidsupport",
            ObjectType::Surface => "surface",
            ObjectType::Other => "other",
        }
    }
}

/// A 3D object that carries a mesh or references other objects
#[derive(Debug, Clone)]
pub struct Object {
    /// Object ID
    pub id: usize,
    /// Object name (optional)
    pub name: Option<String>,
    /// Type of object
    pub object_type: ObjectType,
    /// Inline mesh data
    pub mesh: Option<Mesh>,
    /// Components that reference other objects (assemblies)
    pub components: Vec<Component>,
}

impl Object {
    /// Create a new object
    pub fn new(id: usize) -> Self {
        Self {
            id,
            name: None,
            object_type: ObjectType::Model,
            mesh: None,
            components: Vec::new(),
        }
    }

    /// Check if the object has an inline mesh with at least one vertex
    pub fn has_geometry(&self) -> bool {
        self.mesh.as_ref().is_some_and(|m| !m.vertices.is_empty())
    }
}

/// Resources section containing objects
#[derive(Debug, Clone, Default)]
pub struct Resources {
    /// List of objects
    pub objects: Vec<Object>,
}

impl Resources {
    /// Create a new empty resources section
    pub fn new() -> Self {
        Self::default()
    }
}

/// An item to be built, referencing an object
#[derive(Debug, Clone)]
pub struct BuildItem {
    /// Reference to object ID
    pub objectid: usize,
    /// Raw transform values, if the attribute is present
    pub transform: Option<Vec<f64>>,
    /// Printable flag; only an explicit `printable="0"` clears it
    pub printable: bool,
}

impl BuildItem {
    /// Create a new build item
    pub fn new(objectid: usize) -> Self {
        Self {
            objectid,
            transform: None,
            printable: true,
        }
    }

    /// The item's placement, identity when absent or unusable
    pub fn placement(&self) -> Transform {
        self.transform
            .as_deref()
            .and_then(Transform::from_values)
            .unwrap_or_default()
    }

    /// The transform padded to 16 values
    ///
    /// Returns `Err(len)` when the attribute has neither 12 nor 16 values;
    /// callers fall back to [`padded_identity`].
    pub fn padded_transform(&self) -> std::result::Result<[f64; 16], usize> {
        match self.transform.as_deref() {
            None => Ok(padded_identity()),
            Some(values) => pad_to_matrix(values).ok_or(values.len()),
        }
    }
}

/// Build section specifying which objects to manufacture
#[derive(Debug, Clone, Default)]
pub struct Build {
    /// List of items to build
    pub items: Vec<BuildItem>,
}

impl Build {
    /// Create a new empty build section
    pub fn new() -> Self {
        Self::default()
    }
}

/// Metadata entry of a model part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    /// Name of the metadata entry
    pub name: String,
    /// Value of the metadata entry
    pub value: String,
}

impl MetadataEntry {
    /// Create a new metadata entry
    pub fn new(name: String, value: String) -> Self {
        Self { name, value }
    }
}

/// A parsed model part
#[derive(Debug, Clone)]
pub struct Model {
    /// Unit of measurement (e.g., "millimeter", "inch")
    pub unit: String,
    /// Metadata entries
    pub metadata: Vec<MetadataEntry>,
    /// Resources (objects)
    pub resources: Resources,
    /// Build specification
    pub build: Build,
}

impl Model {
    /// Create a new empty model
    pub fn new() -> Self {
        Self {
            unit: "millimeter".to_string(),
            metadata: Vec::new(),
            resources: Resources::new(),
            build: Build::new(),
        }
    }

    /// Look up an object by id
    pub fn object(&self, id: usize) -> Option<&Object> {
        self.resources.objects.iter().find(|o| o.id == id)
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}
