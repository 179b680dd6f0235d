//! Settings keys the embedder understands, and the profile map built on them
//!
//! Slicer profiles are flat JSON objects with hundreds of keys. The handful
//! the embedder reads or rewrites are named by [`ProfileKey`]; every other
//! key travels untouched in a pass-through bag.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// How the embedder treats a registered key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Carried from the device profile on the assignment-preserving path
    DeviceGcode,
    /// Removed on the assignment-preserving path
    Stripped,
    /// One value per tool slot, padded with `default` when empty
    ToolArray {
        /// Value used when the profile has none
        default: &'static str,
    },
    /// Integer index stored as a string, clamped to `min`
    Index {
        /// Smallest accepted value
        min: i64,
    },
    /// Prime tower position, kept inside the bed
    TowerPosition,
    /// Any other key the embedder reads or writes
    Plain,
}

macro_rules! profile_keys {
    ($( $(#[$doc:meta])* $variant:ident => $name:literal, $kind:expr; )*) => {
        /// A settings key with embedder-specific handling
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum ProfileKey {
            $( $(#[$doc])* $variant, )*
        }

        impl ProfileKey {
            /// Every registered key
            pub const ALL: &'static [ProfileKey] = &[$(ProfileKey::$variant),*];

            /// The key as it appears in settings JSON
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ProfileKey::$variant => $name,)*
                }
            }

            /// Look up a registered key by its JSON name
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(ProfileKey::$variant),)*
                    _ => None,
                }
            }

            /// How the embedder treats this key
            pub fn kind(&self) -> KeyKind {
                match self {
                    $(ProfileKey::$variant => $kind,)*
                }
            }
        }
    };
}

profile_keys! {
    /// Inserted before every layer change
    BeforeLayerChangeGcode => "before_layer_change_gcode", KeyKind::DeviceGcode;
    /// Run at every layer change
    LayerChangeGcode => "layer_change_gcode", KeyKind::DeviceGcode;
    /// Tool change macro
    ChangeFilamentGcode => "change_filament_gcode", KeyKind::DeviceGcode;
    /// Start macro
    MachineStartGcode => "machine_start_gcode", KeyKind::DeviceGcode;
    /// End macro
    MachineEndGcode => "machine_end_gcode", KeyKind::DeviceGcode;
    /// G-code dialect
    GcodeFlavor => "gcode_flavor", KeyKind::DeviceGcode;
    /// Vendor timelapse macro
    TimeLapseGcode => "time_lapse_gcode", KeyKind::Stripped;
    /// Vendor pause macro
    MachinePauseGcode => "machine_pause_gcode", KeyKind::Stripped;
    /// Per-layer macro, forced to reset the extruder
    LayerGcode => "layer_gcode", KeyKind::Plain;
    /// Arc fitting switch
    EnableArcFitting => "enable_arc_fitting", KeyKind::Plain;
    /// Single-nozzle multi-material mode
    SingleExtruderMultiMaterial => "single_extruder_multi_material", KeyKind::Plain;
    /// Raft expansion
    RaftFirstLayerExpansion => "raft_first_layer_expansion", KeyKind::Index { min: 0 };
    /// Tree support walls
    TreeSupportWallCount => "tree_support_wall_count", KeyKind::Index { min: 0 };
    /// Prime volume
    PrimeVolume => "prime_volume", KeyKind::Index { min: 0 };
    /// Prime tower brim
    PrimeTowerBrimWidth => "prime_tower_brim_width", KeyKind::Index { min: 0 };
    /// Prime tower brim chamfer
    PrimeTowerBrimChamfer => "prime_tower_brim_chamfer", KeyKind::Index { min: 0 };
    /// Prime tower brim chamfer limit
    PrimeTowerBrimChamferMaxWidth => "prime_tower_brim_chamfer_max_width", KeyKind::Index { min: 0 };
    /// Tool used for solid infill
    SolidInfillFilament => "solid_infill_filament", KeyKind::Index { min: 1 };
    /// Tool used for sparse infill
    SparseInfillFilament => "sparse_infill_filament", KeyKind::Index { min: 1 };
    /// Tool used for walls
    WallFilament => "wall_filament", KeyKind::Index { min: 1 };
    /// Prime tower width
    PrimeTowerWidth => "prime_tower_width", KeyKind::Plain;
    /// Prime tower X
    WipeTowerX => "wipe_tower_x", KeyKind::TowerPosition;
    /// Prime tower Y
    WipeTowerY => "wipe_tower_y", KeyKind::TowerPosition;
    /// Material type per tool
    FilamentType => "filament_type", KeyKind::ToolArray { default: "PLA" };
    /// Material colour per tool
    FilamentColour => "filament_colour", KeyKind::ToolArray { default: "#FFFFFF" };
    /// Extruder colour per tool
    ExtruderColour => "extruder_colour", KeyKind::ToolArray { default: "#FFFFFF" };
    /// Default material profile per tool
    DefaultFilamentProfile => "default_filament_profile", KeyKind::ToolArray { default: "Snapmaker PLA" };
    /// Material profile id per tool
    FilamentSettingsId => "filament_settings_id", KeyKind::ToolArray { default: "Snapmaker PLA" };
    /// Nozzle temperature per tool
    NozzleTemperature => "nozzle_temperature", KeyKind::ToolArray { default: "210" };
    /// First layer nozzle temperature per tool
    NozzleTemperatureInitialLayer => "nozzle_temperature_initial_layer", KeyKind::ToolArray { default: "210" };
    /// Bed temperature per tool
    BedTemperature => "bed_temperature", KeyKind::ToolArray { default: "60" };
    /// First layer bed temperature per tool
    BedTemperatureInitialLayer => "bed_temperature_initial_layer", KeyKind::ToolArray { default: "60" };
    /// Cool plate temperature per tool
    CoolPlateTemp => "cool_plate_temp", KeyKind::ToolArray { default: "60" };
    /// First layer cool plate temperature per tool
    CoolPlateTempInitialLayer => "cool_plate_temp_initial_layer", KeyKind::ToolArray { default: "60" };
    /// Textured plate temperature per tool
    TexturedPlateTemp => "textured_plate_temp", KeyKind::ToolArray { default: "60" };
    /// First layer textured plate temperature per tool
    TexturedPlateTempInitialLayer => "textured_plate_temp_initial_layer", KeyKind::ToolArray { default: "60" };
    /// Single first layer bed temperature
    BedTemperatureInitialLayerSingle => "bed_temperature_initial_layer_single", KeyKind::Plain;
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProfileKey {
    /// Registered keys of one kind, in registry order
    pub fn of_kind(pred: impl Fn(KeyKind) -> bool) -> impl Iterator<Item = ProfileKey> {
        Self::ALL.iter().copied().filter(move |k| pred(k.kind()))
    }
}

/// A flat settings profile
///
/// Registered keys are stored by [`ProfileKey`]; anything else is kept
/// verbatim in the pass-through bag. Serialization always emits keys in
/// sorted order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    known: BTreeMap<ProfileKey, Value>,
    passthrough: BTreeMap<String, Value>,
}

impl Profile {
    /// An empty profile
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut profile = Self::new();
        for (name, value) in map {
            profile.insert_raw(name, value);
        }
        profile
    }

    /// Build from a JSON value, `None` unless it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::from_map(map)),
            _ => None,
        }
    }

    /// Value of a registered key
    pub fn get(&self, key: ProfileKey) -> Option<&Value> {
        self.known.get(&key)
    }

    /// Value of any key by JSON name
    pub fn get_raw(&self, name: &str) -> Option<&Value> {
        match ProfileKey::from_name(name) {
            Some(key) => self.known.get(&key),
            None => self.passthrough.get(name),
        }
    }

    /// Set a registered key
    pub fn set(&mut self, key: ProfileKey, value: impl Into<Value>) {
        self.known.insert(key, value.into());
    }

    /// Set a registered key and return the profile
    pub fn with(mut self, key: ProfileKey, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set any key by JSON name
    pub fn insert_raw(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        match ProfileKey::from_name(&name) {
            Some(key) => {
                self.known.insert(key, value.into());
            }
            None => {
                self.passthrough.insert(name, value.into());
            }
        }
    }

    /// Remove a registered key
    pub fn remove(&mut self, key: ProfileKey) -> Option<Value> {
        self.known.remove(&key)
    }

    /// Check if a registered key is set
    pub fn contains(&self, key: ProfileKey) -> bool {
        self.known.contains_key(&key)
    }

    /// Set a registered key only when it is absent
    pub fn set_default(&mut self, key: ProfileKey, value: impl Into<Value>) {
        self.known.entry(key).or_insert_with(|| value.into());
    }

    /// Copy every key of `other` over this profile
    pub fn overlay(&mut self, other: &Profile) {
        self.known
            .extend(other.known.iter().map(|(k, v)| (*k, v.clone())));
        self.passthrough
            .extend(other.passthrough.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.known.len() + self.passthrough.len()
    }

    /// Check if the profile has no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys outside the registry
    pub fn passthrough(&self) -> &BTreeMap<String, Value> {
        &self.passthrough
    }

    /// All entries ordered by JSON name
    pub fn to_sorted(&self) -> BTreeMap<&str, &Value> {
        self.known
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .chain(self.passthrough.iter().map(|(k, v)| (k.as_str(), v)))
            .collect()
    }

    /// Pretty JSON with two-space indentation and sorted keys
    pub fn to_json_pretty(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.to_sorted())
    }
}

impl From<Map<String, Value>> for Profile {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

/// Scalar or list value as a list
pub fn as_list(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

/// First element of a list, or the value itself
pub fn first_scalar(value: &Value) -> &Value {
    match value {
        Value::Array(items) => items.first().unwrap_or(value),
        other => other,
    }
}

/// Interpret a scalar as a number the way profiles write them
///
/// Strings are trimmed and parsed; booleans and other shapes give `None`.
pub fn numeric(value: &Value) -> Option<f64> {
    match first_scalar(value) {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_round_trips_names() {
        for key in ProfileKey::ALL {
            assert_eq!(ProfileKey::from_name(key.as_str()), Some(*key));
        }
        assert_eq!(ProfileKey::from_name("layer_height"), None);
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let value = json!({"layer_height": "0.2", "filament_type": ["PETG"]});
        let profile = Profile::from_value(value).unwrap();
        assert_eq!(profile.get(ProfileKey::FilamentType), Some(&json!(["PETG"])));
        assert_eq!(profile.passthrough().get("layer_height"), Some(&json!("0.2")));
        assert_eq!(profile.len(), 2);
    }

    #[test]
    fn test_overlay_later_wins() {
        let mut base = Profile::from_value(json!({"a": 1, "layer_gcode": "x"})).unwrap();
        let top = Profile::from_value(json!({"a": 2, "b": 3})).unwrap();
        base.overlay(&top);
        assert_eq!(base.get_raw("a"), Some(&json!(2)));
        assert_eq!(base.get_raw("b"), Some(&json!(3)));
        assert_eq!(base.get(ProfileKey::LayerGcode), Some(&json!("x")));
    }

    #[test]
    fn test_pretty_json_sorted() {
        let profile = Profile::from_value(json!({"zeta": "1", "alpha": "2", "layer_gcode": "G92 E0"})).unwrap();
        let text = String::from_utf8(profile.to_json_pretty().unwrap()).unwrap();
        assert_eq!(
            text,
            "{\n  \"alpha\": \"2\",\n  \"layer_gcode\": \"G92 E0\",\n  \"zeta\": \"1\"\n}"
        );
    }

    #[test]
    fn test_numeric_helpers() {
        assert_eq!(numeric(&json!(" 12.5 ")), Some(12.5));
        assert_eq!(numeric(&json!(["40"])), Some(40.0));
        assert_eq!(numeric(&json!(3)), Some(3.0));
        assert_eq!(numeric(&json!("abc")), None);
        assert_eq!(as_list(Some(&json!("x"))), vec![json!("x")]);
        assert!(as_list(None).is_empty());
    }

    #[test]
    fn test_kinds() {
        assert_eq!(ProfileKey::WallFilament.kind(), KeyKind::Index { min: 1 });
        let arrays: Vec<_> = ProfileKey::of_kind(|k| matches!(k, KeyKind::ToolArray { .. })).collect();
        assert_eq!(arrays.len(), 13);
    }
}
