//! Proxies: placeholder guides the user positions before a rig is built.
//!
//! A [`Proxy`] is pure data until [`Proxy::build`] turns it into an offset
//! group with a curve guide under it. After that it is found again through
//! its UUID, never through its name, so users can rename or reparent guides
//! freely.
//!
//! Setters follow a reject-and-log policy: malformed input leaves the proxy
//! untouched and writes a log line. Loading a project with one bad field
//! therefore degrades that field instead of failing the whole file.

use std::collections::BTreeMap;
use std::fmt;

use rig_math::{Transform, Vec3};
use serde_json::{Map, Value};

use crate::color::Rgb;
use crate::constants::{
    suffix, ATTR_AUTO_COLOR, ATTR_COLOR_DEFAULT, DEFAULT_PROXY_NAME, JOINT_ATTR_UUID,
    PROXY_ATTR_SCALE, PROXY_ATTR_SEPARATOR, PROXY_ATTR_UUID, PROXY_META_PARENT, PROXY_META_TYPE,
};
use crate::curve::Curve;
use crate::identity::{generate_uuid, is_any_uuid_valid, UuidNamespace};
use crate::scene::{AttrValue, NodeHandle, SceneBackend, SceneResult};

/// Custom attributes pushed onto a built guide.
pub type AttrDict = BTreeMap<String, AttrValue>;

/// Result of building a proxy.
#[derive(Clone, Debug, PartialEq)]
pub struct ProxyData {
    /// Full path of the built guide
    pub name: String,

    /// Full path of the guide's offset group
    pub offset: String,

    /// Full paths of rig setup nodes (scale driver)
    pub setup: Vec<String>,

    /// UUID of the proxy the guide was built from
    pub uuid: String,

    /// Backend handle of the guide
    pub guide: NodeHandle,

    /// Backend handle of the offset group
    pub offset_node: NodeHandle,

    /// Backend handles of the setup nodes
    pub setup_nodes: Vec<NodeHandle>,
}

impl ProxyData {
    /// Last path component of the guide (not guaranteed unique).
    pub fn short_name(&self) -> &str {
        self.name.rsplit('|').next().unwrap_or(&self.name)
    }

    pub fn long_name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ProxyData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Which blocks [`Proxy::get_proxy_as_dict`] writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProxyDictOptions {
    pub include_uuid: bool,
    pub include_transform_data: bool,
    pub include_offset_data: bool,
}

impl Default for ProxyDictOptions {
    fn default() -> Self {
        Self {
            include_uuid: false,
            include_transform_data: true,
            include_offset_data: true,
        }
    }
}

/// Proxy metadata: two recognized keys plus free-form extras.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProxyMetadata {
    /// Semantic role inside a module (e.g. `"hip"`)
    pub meta_type: Option<String>,

    /// UUID used only to draw a visualization line, never for parenting
    pub meta_parent: Option<String>,

    /// Anything else
    pub extra: Map<String, Value>,
}

impl ProxyMetadata {
    /// Build from a JSON object, dropping recognized keys with bad values.
    pub fn from_json_map(map: &Map<String, Value>) -> Self {
        let mut metadata = Self::default();
        for (key, value) in map {
            metadata.insert(key, value.clone());
        }
        metadata
    }

    pub fn to_json_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(meta_type) = &self.meta_type {
            map.insert(PROXY_META_TYPE.to_string(), Value::from(meta_type.as_str()));
        }
        if let Some(meta_parent) = &self.meta_parent {
            map.insert(PROXY_META_PARENT.to_string(), Value::from(meta_parent.as_str()));
        }
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        map
    }

    /// Insert one entry, routing recognized keys to their typed fields.
    ///
    /// Returns `false` (and logs) when a recognized key carries a bad value.
    pub fn insert(&mut self, key: &str, value: Value) -> bool {
        match key {
            PROXY_META_TYPE => match value.as_str() {
                Some(meta_type) => {
                    self.meta_type = Some(meta_type.to_string());
                    true
                }
                None => {
                    log::warn!("Unable to set meta type. Expected a string but got {}", value);
                    false
                }
            },
            PROXY_META_PARENT => match value.as_str() {
                Some(uuid) if is_any_uuid_valid(uuid) => {
                    self.meta_parent = Some(uuid.to_string());
                    true
                }
                _ => {
                    log::warn!("Unable to set meta parent. Invalid UUID: {}", value);
                    false
                }
            },
            _ => {
                self.extra.insert(key.to_string(), value);
                true
            }
        }
    }

    /// Look up any key, recognized or not.
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            PROXY_META_TYPE => self.meta_type.as_deref().map(Value::from),
            PROXY_META_PARENT => self.meta_parent.as_deref().map(Value::from),
            _ => self.extra.get(key).cloned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.meta_type.is_none() && self.meta_parent.is_none() && self.extra.is_empty()
    }
}

/// A placeholder guide.
#[derive(Clone, Debug)]
pub struct Proxy {
    name: String,
    transform: Option<Transform>,
    offset_transform: Option<Transform>,
    curve: Option<Curve>,
    locator_scale: f64,
    uuid: String,
    parent_uuid: Option<String>,
    attr_dict: AttrDict,
    metadata: ProxyMetadata,
}

impl Default for Proxy {
    fn default() -> Self {
        let mut curve = Curve::proxy_joint();
        curve.set_name(DEFAULT_PROXY_NAME);
        Self {
            name: DEFAULT_PROXY_NAME.to_string(),
            transform: None,
            offset_transform: None,
            curve: Some(curve),
            locator_scale: 1.0,
            uuid: generate_uuid(),
            parent_uuid: None,
            attr_dict: AttrDict::new(),
            metadata: ProxyMetadata::default(),
        }
    }
}

impl Proxy {
    /// Create a proxy with a fresh UUID and the default guide shape.
    pub fn new(name: &str) -> Self {
        let mut proxy = Self::default();
        proxy.set_name(name);
        proxy
    }

    /// Rebuild a proxy description from a guide already in the scene.
    ///
    /// Returns `None` when no guide carries `uuid`.
    pub fn from_scene(scene: &dyn SceneBackend, uuid: &str) -> Option<Self> {
        let guide = scene.find_by_uuid(uuid, UuidNamespace::Proxy)?;
        let mut proxy = Self::default();
        proxy.set_uuid(uuid);
        if let Some(name) = scene.short_name(guide) {
            proxy.set_name(&name);
        }
        proxy.read_data_from_scene(scene);
        Some(proxy)
    }

    /// A proxy needs a name and a curve to be built.
    pub fn is_valid(&self) -> bool {
        if self.name.is_empty() {
            log::warn!("Invalid proxy object. Missing name.");
            return false;
        }
        if self.curve.is_none() {
            log::warn!("Invalid proxy object. Missing curve.");
            return false;
        }
        true
    }

    /// Build the offset group and guide for this proxy.
    ///
    /// With `apply_transforms` unset, transforms are left for the module's
    /// post-build step. Returns `Ok(None)` without touching the scene when the
    /// proxy is invalid.
    pub fn build(
        &self,
        scene: &mut dyn SceneBackend,
        prefix: Option<&str>,
        apply_transforms: bool,
    ) -> SceneResult<Option<ProxyData>> {
        let curve = match (&self.curve, self.is_valid()) {
            (Some(curve), true) => curve,
            _ => {
                log::warn!("Unable to build proxy. Invalid proxy object.");
                return Ok(None);
            }
        };

        let name = match prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{}_{}", prefix, self.name),
            None => self.name.clone(),
        };

        let offset = scene.create_group(&format!("{}_{}", name, suffix::OFFSET))?;
        let guide = scene.create_curve_guide(curve, &name)?;
        scene.parent(guide, Some(offset))?;
        scene.add_separator_attr(guide, PROXY_ATTR_SEPARATOR)?;
        scene.stamp_uuid(guide, &self.uuid, UuidNamespace::Proxy)?;
        scene.set_scalar_attr(guide, PROXY_ATTR_SCALE, AttrValue::Float(1.0))?;
        let scale_driver = scene.create_scale_driver(guide, PROXY_ATTR_SCALE)?;

        if apply_transforms {
            if let Some(offset_transform) = &self.offset_transform {
                scene.apply_world_transform(offset, offset_transform)?;
            }
            if let Some(transform) = &self.transform {
                scene.apply_world_transform(guide, transform)?;
            }
        }
        scene.set_scalar_attr(guide, PROXY_ATTR_SCALE, AttrValue::Float(self.locator_scale))?;

        Ok(Some(ProxyData {
            name: scene.long_name(guide).unwrap_or_default(),
            offset: scene.long_name(offset).unwrap_or_default(),
            setup: scene.long_name(scale_driver).into_iter().collect(),
            uuid: self.uuid.clone(),
            guide,
            offset_node: offset,
            setup_nodes: vec![scale_driver],
        }))
    }

    /// Find this proxy's guide in the scene.
    pub fn find_guide(&self, scene: &dyn SceneBackend) -> Option<NodeHandle> {
        let guide = scene.find_by_uuid(&self.uuid, UuidNamespace::Proxy);
        if guide.is_none() {
            log::debug!("Proxy \"{}\" ({}) is not built", self.name, self.uuid);
        }
        guide
    }

    /// Apply the offset transform to the built offset group.
    pub fn apply_offset_transform(&self, scene: &mut dyn SceneBackend) -> SceneResult<()> {
        let Some(guide) = self.find_guide(scene) else {
            return Ok(());
        };
        if let (Some(offset), Some(offset_transform)) = (scene.get_parent(guide), &self.offset_transform) {
            scene.apply_world_transform(offset, offset_transform)?;
        }
        Ok(())
    }

    /// Apply the main transform (and optionally the offset first) to the built guide.
    pub fn apply_transforms(&self, scene: &mut dyn SceneBackend, apply_offset: bool) -> SceneResult<()> {
        let Some(guide) = self.find_guide(scene) else {
            return Ok(());
        };
        if apply_offset {
            if let (Some(offset), Some(offset_transform)) = (scene.get_parent(guide), &self.offset_transform) {
                scene.apply_world_transform(offset, offset_transform)?;
            }
        }
        if let Some(transform) = &self.transform {
            scene.apply_world_transform(guide, transform)?;
        }
        Ok(())
    }

    /// Push the attribute dictionary onto `target`, or onto the built guide.
    ///
    /// Attributes the backend refuses (locked, for instance) are skipped.
    pub fn apply_attr_dict(
        &self,
        scene: &mut dyn SceneBackend,
        target: Option<NodeHandle>,
    ) -> SceneResult<()> {
        let target = match target {
            Some(target) if scene.exists(target) => target,
            Some(_) => {
                log::debug!("Unable to apply proxy attributes. Failed to find target object.");
                return Ok(());
            }
            None => match self.find_guide(scene) {
                Some(guide) => guide,
                None => {
                    log::debug!("Unable to apply proxy attributes. Failed to find target object.");
                    return Ok(());
                }
            },
        };
        for (attr, value) in &self.attr_dict {
            if let Err(e) = scene.set_scalar_attr(target, attr, value.clone()) {
                log::warn!("Unable to set \"{}\" on proxy \"{}\": {}", attr, self.name, e);
            }
        }
        Ok(())
    }

    // ------------------------------------------------- Setters -------------------------------------------------

    pub fn set_name(&mut self, name: &str) {
        if name.is_empty() {
            log::warn!("Unable to set new name. Expected a non-empty string.");
            return;
        }
        if let Some(curve) = &mut self.curve {
            curve.set_name(name);
        }
        self.name = name.to_string();
    }

    pub fn set_transform(&mut self, transform: Transform) {
        if !transform.is_finite() {
            log::warn!("Unable to set proxy transform. Transform contains non-finite values.");
            return;
        }
        self.transform = Some(transform);
    }

    pub fn set_offset_transform(&mut self, transform: Transform) {
        if !transform.is_finite() {
            log::warn!("Unable to set proxy offset transform. Transform contains non-finite values.");
            return;
        }
        self.offset_transform = Some(transform);
    }

    pub fn set_position(&mut self, position: Vec3) {
        if let Some(position) = checked_vec("position", position) {
            self.transform_mut().set_position(position);
        }
    }

    pub fn set_rotation(&mut self, rotation: Vec3) {
        if let Some(rotation) = checked_vec("rotation", rotation) {
            self.transform_mut().set_rotation(rotation);
        }
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        if let Some(scale) = checked_vec("scale", scale) {
            self.transform_mut().set_scale(scale);
        }
    }

    pub fn set_offset_position(&mut self, position: Vec3) {
        if let Some(position) = checked_vec("offset position", position) {
            self.offset_transform_mut().set_position(position);
        }
    }

    pub fn set_offset_rotation(&mut self, rotation: Vec3) {
        if let Some(rotation) = checked_vec("offset rotation", rotation) {
            self.offset_transform_mut().set_rotation(rotation);
        }
    }

    pub fn set_offset_scale(&mut self, scale: Vec3) {
        if let Some(scale) = checked_vec("offset scale", scale) {
            self.offset_transform_mut().set_scale(scale);
        }
    }

    /// Set position and offset position to the same value, zeroing the guide
    /// relative to its offset. This is where the guide returns when reset.
    pub fn set_initial_position(&mut self, position: Vec3) {
        self.set_position(position);
        self.set_offset_position(position);
    }

    /// Same as [`Proxy::set_initial_position`] for a whole transform.
    pub fn set_initial_transform(&mut self, transform: Transform) {
        self.set_transform(transform);
        self.set_offset_transform(transform);
    }

    /// Replace the guide shape. With `inherit_curve_name` the proxy takes the
    /// curve's name; otherwise the curve is renamed after the proxy.
    pub fn set_curve(&mut self, mut curve: Curve, inherit_curve_name: bool) {
        if !curve.is_curve_valid() {
            log::debug!("Unable to set proxy curve. Curve object failed validation.");
            return;
        }
        if inherit_curve_name {
            let name = curve.name().to_string();
            self.set_name(&name);
        } else {
            curve.set_name(self.name.clone());
        }
        self.curve = Some(curve);
    }

    /// Remove the guide shape. The proxy is invalid until a new curve is set.
    pub fn clear_curve(&mut self) {
        self.curve = None;
    }

    pub fn set_locator_scale(&mut self, scale: f64) {
        if !scale.is_finite() || scale <= 0.0 {
            log::debug!("Unable to set locator scale. Expected a positive number but got {}", scale);
            return;
        }
        self.locator_scale = scale;
    }

    pub fn set_attr_dict(&mut self, attr_dict: AttrDict) {
        self.attr_dict = attr_dict;
    }

    /// Insert or overwrite one attribute.
    pub fn add_to_attr_dict(&mut self, attr: &str, value: AttrValue) {
        self.attr_dict.insert(attr.to_string(), value);
    }

    pub fn set_metadata_dict(&mut self, metadata: ProxyMetadata) {
        self.metadata = metadata;
    }

    /// Insert or overwrite one metadata entry.
    pub fn add_to_metadata(&mut self, key: &str, value: Value) {
        self.metadata.insert(key, value);
    }

    /// Record a visualization-only parent.
    pub fn add_meta_parent(&mut self, uuid: &str) {
        self.metadata.insert(PROXY_META_PARENT, Value::from(uuid));
    }

    pub fn add_meta_parent_from_proxy(&mut self, line_parent: &Proxy) {
        self.add_meta_parent(line_parent.uuid());
    }

    /// Tag the proxy's role inside its module (e.g. `"hip"`).
    pub fn set_meta_type(&mut self, meta_type: &str) {
        self.metadata.insert(PROXY_META_TYPE, Value::from(meta_type));
    }

    /// Use a fixed color instead of the automatic side color.
    pub fn add_color(&mut self, rgb: Rgb) {
        if !rgb.iter().all(|c| c.is_finite()) {
            log::debug!("Unable to set color. Input must contain only finite values.");
            return;
        }
        self.attr_dict.insert(ATTR_AUTO_COLOR.to_string(), AttrValue::Bool(false));
        self.attr_dict.insert(ATTR_COLOR_DEFAULT.to_string(), AttrValue::Double3(rgb));
    }

    pub fn set_uuid(&mut self, uuid: &str) {
        if !is_any_uuid_valid(uuid) {
            log::warn!("Unable to set proxy UUID. Invalid UUID input: \"{}\"", uuid);
            return;
        }
        self.uuid = uuid.to_string();
    }

    /// Set the proxy this one is parented to at build time.
    ///
    /// The UUID only needs to be well formed; it is resolved during the build.
    pub fn set_parent_uuid(&mut self, uuid: &str) {
        if !is_any_uuid_valid(uuid) {
            log::warn!("Unable to set proxy parent UUID. Invalid UUID input: \"{}\"", uuid);
            return;
        }
        self.parent_uuid = Some(uuid.to_string());
    }

    pub fn set_parent_uuid_from_proxy(&mut self, parent_proxy: &Proxy) {
        self.set_parent_uuid(parent_proxy.uuid());
    }

    pub fn clear_parent_uuid(&mut self) {
        self.parent_uuid = None;
    }

    fn transform_mut(&mut self) -> &mut Transform {
        self.transform.get_or_insert_with(Transform::default)
    }

    fn offset_transform_mut(&mut self) -> &mut Transform {
        self.offset_transform.get_or_insert_with(Transform::default)
    }

    // ------------------------------------------------- Getters -------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn parent_uuid(&self) -> Option<&str> {
        self.parent_uuid.as_deref()
    }

    pub fn locator_scale(&self) -> f64 {
        self.locator_scale
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    pub fn offset_transform(&self) -> Option<&Transform> {
        self.offset_transform.as_ref()
    }

    pub fn curve(&self) -> Option<&Curve> {
        self.curve.as_ref()
    }

    pub fn attr_dict(&self) -> &AttrDict {
        &self.attr_dict
    }

    pub fn metadata(&self) -> &ProxyMetadata {
        &self.metadata
    }

    pub fn meta_type(&self) -> Option<&str> {
        self.metadata.meta_type.as_deref()
    }

    pub fn meta_parent_uuid(&self) -> Option<&str> {
        self.metadata.meta_parent.as_deref()
    }

    // ---------------------------------------------- Serialization ----------------------------------------------

    /// Merge a serialized proxy into this one.
    ///
    /// Recognized keys: `name`, `parent`, `locatorScale`, `transform`,
    /// `offsetTransform`, `attributes`, `metadata`, `uuid`. Missing keys keep
    /// the current value; unknown keys are ignored.
    pub fn read_data_from_dict(&mut self, proxy_dict: &Value) -> &mut Self {
        let Some(dict) = proxy_dict.as_object() else {
            log::debug!("Unable to read proxy data from dict. Input must be a dictionary.");
            return self;
        };

        if let Some(name) = dict.get("name").and_then(Value::as_str) {
            self.set_name(name);
        }

        if let Some(parent) = dict.get("parent").and_then(Value::as_str) {
            self.set_parent_uuid(parent);
        }

        if let Some(scale) = dict.get("locatorScale") {
            match scale.as_f64() {
                Some(scale) => self.set_locator_scale(scale),
                None => log::debug!("Unable to read locator scale: {}", scale),
            }
        }

        if let Some(transform) = dict.get("transform").and_then(|v| parse_transform("transform", v)) {
            self.set_transform(transform);
        }

        if let Some(offset) = dict.get("offsetTransform").and_then(|v| parse_transform("offsetTransform", v)) {
            self.set_offset_transform(offset);
        }

        if let Some(attributes) = dict.get("attributes") {
            match attributes.as_object() {
                Some(map) => self.set_attr_dict(attr_dict_from_json(map)),
                None => log::warn!("Unable to set attribute dictionary. Expected a dictionary."),
            }
        }

        if let Some(metadata) = dict.get("metadata") {
            match metadata.as_object() {
                Some(map) => self.set_metadata_dict(ProxyMetadata::from_json_map(map)),
                None => log::warn!("Unable to set proxy metadata. Expected a dictionary."),
            }
        }

        if let Some(uuid) = dict.get("uuid").and_then(Value::as_str) {
            self.set_uuid(uuid);
        }
        self
    }

    /// Read transform, locator scale and unlocked user attributes back from
    /// the built guide. This is how interactive edits reach the data model.
    pub fn read_data_from_scene(&mut self, scene: &dyn SceneBackend) -> &mut Self {
        let Some(guide) = self.find_guide(scene) else {
            return self;
        };

        match scene.get_world_transform(guide) {
            Ok(transform) => self.set_transform(transform),
            Err(e) => log::debug!("Unable to read proxy data for \"{}\". Issue: {}", self.name, e),
        }

        if let Some(scale) = scene
            .get_scalar_attr(guide, PROXY_ATTR_SCALE)
            .and_then(|v| v.as_f64())
        {
            self.set_locator_scale(scale);
        }

        let ignored = [PROXY_ATTR_UUID, PROXY_ATTR_SCALE, JOINT_ATTR_UUID];
        let attr_dict: AttrDict = scene
            .list_user_attrs(guide)
            .into_iter()
            .filter(|attr| !attr.locked && !ignored.contains(&attr.name.as_str()))
            .map(|attr| (attr.name, attr.value))
            .collect();
        if !attr_dict.is_empty() {
            self.set_attr_dict(attr_dict);
        }
        self
    }

    /// Everything needed to recreate this proxy.
    pub fn get_proxy_as_dict(&self, options: ProxyDictOptions) -> Map<String, Value> {
        let mut dict = Map::new();
        dict.insert("name".to_string(), Value::from(self.name.as_str()));
        dict.insert(
            "parent".to_string(),
            self.parent_uuid.as_deref().map(Value::from).unwrap_or(Value::Null),
        );
        dict.insert("locatorScale".to_string(), Value::from(self.locator_scale));

        if let (Some(transform), true) = (&self.transform, options.include_transform_data) {
            dict.insert("transform".to_string(), transform_to_json(transform));
        }
        if let (Some(offset), true) = (&self.offset_transform, options.include_offset_data) {
            dict.insert("offsetTransform".to_string(), transform_to_json(offset));
        }
        if !self.attr_dict.is_empty() {
            let attributes = self
                .attr_dict
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            dict.insert("attributes".to_string(), Value::Object(attributes));
        }
        if !self.metadata.is_empty() {
            dict.insert("metadata".to_string(), Value::Object(self.metadata.to_json_map()));
        }
        if options.include_uuid {
            dict.insert("uuid".to_string(), Value::from(self.uuid.as_str()));
        }
        dict
    }
}

fn checked_vec(label: &str, value: Vec3) -> Option<Vec3> {
    if value.is_finite() {
        Some(value)
    } else {
        log::warn!("Unable to set proxy {}. Expected finite values but got {}", label, value);
        None
    }
}

fn transform_to_json(transform: &Transform) -> Value {
    Value::from(
        transform
            .to_array()
            .iter()
            .map(|v| Value::from(v.iter().map(|c| f64::from(*c)).collect::<Vec<_>>()))
            .collect::<Vec<_>>(),
    )
}

fn parse_transform(key: &str, value: &Value) -> Option<Transform> {
    match serde_json::from_value::<Transform>(value.clone()) {
        Ok(transform) => Some(transform),
        Err(e) => {
            log::warn!("Unable to read \"{}\". Expected [position, rotation, scale]: {}", key, e);
            None
        }
    }
}

/// Convert a JSON object to an attribute dictionary, skipping values that
/// cannot live on a backend attribute.
pub(crate) fn attr_dict_from_json(map: &Map<String, Value>) -> AttrDict {
    let mut attr_dict = AttrDict::new();
    for (key, value) in map {
        match AttrValue::from_json(value) {
            Some(value) => {
                attr_dict.insert(key.clone(), value);
            }
            None => log::debug!("Skipping attribute \"{}\" with unsupported value {}", key, value),
        }
    }
    attr_dict
}
