//! Data structures for the 3MF resource graph

mod core;

pub use self::core::{
    Build, BuildItem, Component, Mesh, MetadataEntry, Model, Object, ObjectType, Resources,
    Triangle, Vertex,
};
