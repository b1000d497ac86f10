//! Rig modules: named groups of proxies representing one rig part.
//!
//! Building is a four-phase protocol driven by the project (see
//! [`BuildPhase`]). Each phase runs over every active module before the next
//! one starts, so cross-module UUID lookups in the post phases always find
//! the other modules' guides and joints.
//!
//! Inside a phase, failures are per proxy: a missing guide or a backend
//! error is logged and the loop moves on to the next proxy.

use std::fmt;

use serde_json::{Map, Value};

use crate::constants::{JOINT_ATTR_RADIUS, MODULE_CLASS_PREFIX};
use crate::identity::{is_any_uuid_valid, UuidNamespace};
use crate::proxy::{Proxy, ProxyData, ProxyDictOptions};
use crate::scene::{AttrValue, NodeHandle, SceneBackend, SceneResult};

mod spine;

pub use spine::ModuleSpine;

/// Ordered build phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuildPhase {
    /// Create every proxy guide (transforms deferred)
    ProxyBuild,
    /// Wire guides together and apply deferred transforms
    ProxyPostBuild,
    /// Create one joint per guide, unparented
    RigBuild,
    /// Parent joints to each other
    RigPostBuild,
}

impl BuildPhase {
    pub const PROXY: [BuildPhase; 2] = [BuildPhase::ProxyBuild, BuildPhase::ProxyPostBuild];
    pub const RIG: [BuildPhase; 2] = [BuildPhase::RigBuild, BuildPhase::RigPostBuild];

    pub fn is_proxy_phase(&self) -> bool {
        matches!(self, BuildPhase::ProxyBuild | BuildPhase::ProxyPostBuild)
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildPhase::ProxyBuild => "build_proxy",
            BuildPhase::ProxyPostBuild => "build_proxy_post",
            BuildPhase::RigBuild => "build_rig",
            BuildPhase::RigPostBuild => "build_rig_post",
        };
        f.write_str(name)
    }
}

/// Every module type the framework knows how to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Generic,
    Spine,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 2] = [ModuleKind::Generic, ModuleKind::Spine];

    /// Full class name, e.g. `"ModuleSpine"`.
    pub fn class_name(&self) -> &'static str {
        match self {
            ModuleKind::Generic => "ModuleGeneric",
            ModuleKind::Spine => "ModuleSpine",
        }
    }

    /// Class name without the `Module` prefix, as used for project file keys.
    pub fn short_name(&self) -> &'static str {
        let class_name = self.class_name();
        class_name.strip_prefix(MODULE_CLASS_PREFIX).unwrap_or(class_name)
    }

    /// Look up a kind by class name, with or without the `Module` prefix.
    pub fn from_class_name(name: &str) -> Option<Self> {
        let short = name.strip_prefix(MODULE_CLASS_PREFIX).unwrap_or(name);
        Self::ALL.into_iter().find(|kind| kind.short_name() == short)
    }

    /// Create a default module of this kind.
    pub fn create(&self) -> Box<dyn RigModule> {
        match self {
            ModuleKind::Generic => Box::new(ModuleGeneric::new()),
            ModuleKind::Spine => Box::new(ModuleSpine::new()),
        }
    }
}

/// Create a module from a class name, falling back to [`ModuleGeneric`] for
/// names no kind claims.
pub fn create_module_from_class_name(name: &str) -> Box<dyn RigModule> {
    match ModuleKind::from_class_name(name) {
        Some(kind) => kind.create(),
        None => {
            log::warn!("Unknown module class \"{}\". Loading it as a generic module.", name);
            ModuleKind::Generic.create()
        }
    }
}

/// State shared by every module type.
#[derive(Clone, Debug)]
pub struct ModuleBase {
    name: String,
    prefix: Option<String>,
    proxies: Vec<Proxy>,
    parent_uuid: Option<String>,
    active: bool,
    metadata: Map<String, Value>,
}

impl ModuleBase {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: None,
            proxies: Vec::new(),
            parent_uuid: None,
            active: true,
            metadata: Map::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        if self.proxies.is_empty() {
            log::warn!("Missing proxies. A rig module needs at least one proxy to function.");
            return false;
        }
        true
    }

    // ------------------------------------------------- Setters -------------------------------------------------

    pub fn set_name(&mut self, name: &str) {
        if name.is_empty() {
            log::warn!("Unable to set module name. Expected a non-empty string.");
            return;
        }
        self.name = name.to_string();
    }

    pub fn set_prefix(&mut self, prefix: &str) {
        if prefix.is_empty() {
            log::warn!("Unable to set module prefix. Expected a non-empty string.");
            return;
        }
        self.prefix = Some(prefix.to_string());
    }

    /// Replace every proxy. An empty list is rejected.
    pub fn set_proxies(&mut self, proxies: Vec<Proxy>) {
        if proxies.is_empty() {
            log::warn!("Unable to set new list of proxies. Expected at least one proxy.");
            return;
        }
        self.proxies = proxies;
    }

    pub fn add_to_proxies(&mut self, proxy: Proxy) {
        self.proxies.push(proxy);
    }

    pub fn set_metadata_dict(&mut self, metadata: Map<String, Value>) {
        self.metadata = metadata;
    }

    pub fn add_to_metadata(&mut self, key: &str, value: Value) {
        self.metadata.insert(key.to_string(), value);
    }

    /// Inactive modules are skipped entirely by project builds.
    pub fn set_active_state(&mut self, active: bool) {
        self.active = active;
    }

    /// Attach this module to a proxy, possibly from another module.
    pub fn set_parent_uuid(&mut self, uuid: &str) {
        if !is_any_uuid_valid(uuid) {
            log::warn!("Unable to set module parent UUID. Invalid UUID input: \"{}\"", uuid);
            return;
        }
        self.parent_uuid = Some(uuid.to_string());
    }

    pub fn clear_parent_uuid(&mut self) {
        self.parent_uuid = None;
    }

    // ------------------------------------------------- Getters -------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn proxies(&self) -> &[Proxy] {
        &self.proxies
    }

    pub fn proxies_mut(&mut self) -> &mut Vec<Proxy> {
        &mut self.proxies
    }

    pub fn parent_uuid(&self) -> Option<&str> {
        self.parent_uuid.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn find_proxy(&self, uuid: &str) -> Option<&Proxy> {
        self.proxies.iter().find(|p| p.uuid() == uuid)
    }

    /// `<project prefix>_<module prefix>`, skipping whichever is missing.
    pub fn compose_prefix(&self, project_prefix: Option<&str>) -> Option<String> {
        let parts: Vec<&str> = [project_prefix, self.prefix.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("_"))
        }
    }

    // ---------------------------------------------- Serialization ----------------------------------------------

    /// Read the module-level keys (`name`, `prefix`, `parent`, `active`,
    /// `metadata`). Proxies are left to [`RigModule::read_proxies_from_dict`].
    pub fn read_fields_from_dict(&mut self, dict: &Map<String, Value>) {
        if let Some(name) = dict.get("name").and_then(Value::as_str) {
            self.set_name(name);
        }
        if let Some(prefix) = dict.get("prefix").and_then(Value::as_str) {
            self.set_prefix(prefix);
        }
        if let Some(parent) = dict.get("parent").and_then(Value::as_str) {
            self.set_parent_uuid(parent);
        }
        match dict.get("active") {
            Some(Value::Bool(active)) => self.set_active_state(*active),
            Some(other) => log::warn!("Unable to set active state. Expected a boolean but got {}", other),
            None => {}
        }
        if let Some(metadata) = dict.get("metadata") {
            match metadata.as_object() {
                Some(map) => self.set_metadata_dict(map.clone()),
                None => log::warn!("Unable to set module metadata. Expected a dictionary."),
            }
        }
    }

    /// Replace the proxy list with proxies read from a `{uuid: proxy}` map,
    /// in map order.
    pub fn read_proxies_from_dict(&mut self, proxy_dict: &Map<String, Value>) {
        if proxy_dict.is_empty() {
            log::debug!("Unable to read proxies from dictionary. Input is empty.");
            return;
        }
        self.proxies = proxy_dict
            .iter()
            .map(|(uuid, description)| {
                let mut proxy = Proxy::default();
                proxy.set_uuid(uuid);
                proxy.read_data_from_dict(description);
                proxy
            })
            .collect();
    }

    /// Update existing proxies whose meta type matches an entry of the map.
    ///
    /// Fixed proxies (e.g. a spine's hip) keep their place in the list and
    /// take the UUID and data stored in the file.
    pub fn read_type_matching_proxy_from_dict(&mut self, proxy_dict: &Map<String, Value>) {
        for (uuid, description) in proxy_dict {
            let meta_type = description
                .get("metadata")
                .and_then(|m| m.get(crate::constants::PROXY_META_TYPE))
                .and_then(Value::as_str);
            let Some(meta_type) = meta_type else {
                log::debug!("Skipping proxy \"{}\" without a meta type", uuid);
                continue;
            };
            match self.proxies.iter_mut().find(|p| p.meta_type() == Some(meta_type)) {
                Some(proxy) => {
                    proxy.set_uuid(uuid);
                    proxy.read_data_from_dict(description);
                }
                None => log::debug!("No proxy with meta type \"{}\" to update", meta_type),
            }
        }
    }

    /// Serialize the module. `class_name` is written under `module` when given.
    pub fn to_dict(&self, class_name: Option<&str>, include_offset_data: bool) -> Map<String, Value> {
        let mut dict = Map::new();
        dict.insert("name".to_string(), Value::from(self.name.as_str()));
        dict.insert("active".to_string(), Value::from(self.active));
        if let Some(prefix) = &self.prefix {
            dict.insert("prefix".to_string(), Value::from(prefix.as_str()));
        }
        if let Some(parent) = &self.parent_uuid {
            dict.insert("parent".to_string(), Value::from(parent.as_str()));
        }
        if !self.metadata.is_empty() {
            dict.insert("metadata".to_string(), Value::Object(self.metadata.clone()));
        }

        let options = ProxyDictOptions {
            include_offset_data,
            ..Default::default()
        };
        let proxies = self
            .proxies
            .iter()
            .map(|p| (p.uuid().to_string(), Value::Object(p.get_proxy_as_dict(options))))
            .collect();
        dict.insert("proxies".to_string(), Value::Object(proxies));

        if let Some(class_name) = class_name {
            dict.insert("module".to_string(), Value::from(class_name));
        }
        dict
    }
}

/// A rig part built through the four-phase protocol.
///
/// Implementors provide access to their [`ModuleBase`] and their kind; every
/// phase has a default implementation that fits a plain list of proxies.
pub trait RigModule: fmt::Debug {
    fn base(&self) -> &ModuleBase;

    fn base_mut(&mut self) -> &mut ModuleBase;

    fn kind(&self) -> ModuleKind;

    fn get_module_class_name(&self, remove_module_prefix: bool) -> &'static str {
        if remove_module_prefix {
            self.kind().short_name()
        } else {
            self.kind().class_name()
        }
    }

    fn is_valid(&self) -> bool {
        self.base().is_valid()
    }

    /// UUID of the proxy that the proxy at `index` hangs from during `phase`.
    ///
    /// Defaults to the proxy's own parent; the first proxy falls back to the
    /// module's parent so a module can be attached to another one as a whole.
    fn parent_uuid_for(&self, index: usize, _phase: BuildPhase) -> Option<&str> {
        let base = self.base();
        let proxy = base.proxies.get(index)?;
        match (proxy.parent_uuid(), index) {
            (Some(parent), _) => Some(parent),
            (None, 0) => base.parent_uuid(),
            (None, _) => None,
        }
    }

    /// Build every proxy guide, transforms deferred.
    fn build_proxy(&self, scene: &mut dyn SceneBackend, project_prefix: Option<&str>) -> Vec<ProxyData> {
        let base = self.base();
        let prefix = base.compose_prefix(project_prefix);
        let mut built = Vec::with_capacity(base.proxies.len());
        for proxy in &base.proxies {
            match proxy.build(scene, prefix.as_deref(), false) {
                Ok(Some(data)) => built.push(data),
                Ok(None) => {}
                Err(e) => log::warn!("Failed to build proxy \"{}\": {}", proxy.name(), e),
            }
        }
        built
    }

    /// Runs after every module's guides exist.
    fn build_proxy_post(&self, scene: &mut dyn SceneBackend) {
        log::debug!("\"build_proxy_post\" function for \"{}\" was called.", self.get_module_class_name(false));
        self.apply_transforms(scene, false);
    }

    /// Create one unparented joint per built guide.
    fn build_rig(&self, scene: &mut dyn SceneBackend) {
        log::debug!("\"build_rig\" function from \"{}\" was called.", self.get_module_class_name(false));
        for proxy in &self.base().proxies {
            if let Err(e) = build_joint(scene, proxy) {
                log::warn!("Failed to build joint for proxy \"{}\": {}", proxy.name(), e);
            }
        }
    }

    /// Parent joints once every module has created its own.
    fn build_rig_post(&self, scene: &mut dyn SceneBackend) {
        log::debug!("\"build_rig_post\" function from \"{}\" was called.", self.get_module_class_name(false));
        for (index, proxy) in self.base().proxies.iter().enumerate() {
            let Some(joint) = scene.find_by_uuid(proxy.uuid(), UuidNamespace::Joint) else {
                log::debug!("Missing joint for proxy \"{}\"", proxy.name());
                continue;
            };
            let Some(parent_uuid) = self.parent_uuid_for(index, BuildPhase::RigPostBuild) else {
                continue;
            };
            let Some(parent_joint) = scene.find_by_uuid(parent_uuid, UuidNamespace::Joint) else {
                log::debug!("Missing parent joint {} for proxy \"{}\"", parent_uuid, proxy.name());
                continue;
            };
            if let Err(e) = scene.parent(joint, Some(parent_joint)) {
                log::warn!("Failed to parent joint of proxy \"{}\": {}", proxy.name(), e);
            }
        }
    }

    /// Re-apply stored transforms to already built guides.
    fn apply_transforms(&self, scene: &mut dyn SceneBackend, apply_offset: bool) {
        for proxy in &self.base().proxies {
            if let Err(e) = proxy.apply_transforms(scene, apply_offset) {
                log::warn!("Failed to apply transforms to proxy \"{}\": {}", proxy.name(), e);
            }
        }
    }

    /// Capture interactive edits made to the built guides.
    fn read_data_from_scene(&mut self, scene: &dyn SceneBackend) {
        for proxy in self.base_mut().proxies.iter_mut() {
            proxy.read_data_from_scene(scene);
        }
    }

    fn read_proxies_from_dict(&mut self, proxy_dict: &Map<String, Value>) {
        self.base_mut().read_proxies_from_dict(proxy_dict);
    }

    /// Merge a serialized module into this one.
    fn read_data_from_dict(&mut self, module_dict: &Value) {
        let Some(dict) = module_dict.as_object() else {
            log::debug!("Unable to read module data from dict. Input must be a dictionary.");
            return;
        };
        self.base_mut().read_fields_from_dict(dict);
        match dict.get("proxies") {
            Some(Value::Object(proxies)) => self.read_proxies_from_dict(proxies),
            Some(other) => log::warn!("Unable to read proxies. Expected a dictionary but got {}", other),
            None => {}
        }
    }

    fn get_module_as_dict(&self, include_module_name: bool) -> Map<String, Value> {
        let class_name = include_module_name.then(|| self.get_module_class_name(false));
        self.base().to_dict(class_name, true)
    }
}

fn build_joint(scene: &mut dyn SceneBackend, proxy: &Proxy) -> SceneResult<Option<NodeHandle>> {
    let Some(guide) = proxy.find_guide(scene) else {
        return Ok(None);
    };
    let name = scene.short_name(guide).unwrap_or_else(|| proxy.name().to_string());
    let joint = scene.create_joint(&name)?;
    scene.set_scalar_attr(joint, JOINT_ATTR_RADIUS, AttrValue::Float(proxy.locator_scale()))?;
    scene.match_translate(guide, joint)?;
    scene.stamp_uuid(joint, proxy.uuid(), UuidNamespace::Joint)?;
    Ok(Some(joint))
}

/// Module with no specialized behavior: builds its proxies as given.
#[derive(Clone, Debug)]
pub struct ModuleGeneric {
    base: ModuleBase,
}

impl Default for ModuleGeneric {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleGeneric {
    pub fn new() -> Self {
        Self {
            base: ModuleBase::new(ModuleKind::Generic.short_name()),
        }
    }

    pub fn with_proxies(name: &str, proxies: Vec<Proxy>) -> Self {
        let mut module = Self::new();
        module.base.set_name(name);
        module.base.set_proxies(proxies);
        module
    }
}

impl RigModule for ModuleGeneric {
    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROXY_ATTR_SCALE;
    use crate::identity::generate_uuid;
    use crate::scene::{MemoryScene, SceneCall};
    use rig_math::Vec3;
    use serde_json::json;

    fn two_proxy_module() -> ModuleGeneric {
        let mut first = Proxy::new("first");
        first.set_position(Vec3::new(0.0, 5.0, 0.0));
        let mut second = Proxy::new("second");
        second.set_position(Vec3::new(10.0, 0.0, 0.0));
        second.set_rotation(Vec3::new(0.0, 0.0, -35.0));
        second.set_locator_scale(2.0);
        second.set_parent_uuid_from_proxy(&first);

        let mut module = ModuleGeneric::with_proxies("arm", vec![first, second]);
        module.base_mut().set_prefix("prefix");
        module
    }

    #[test]
    fn test_generic_validity() {
        let mut module = ModuleGeneric::new();
        assert!(!module.is_valid());
        module.base_mut().add_to_proxies(Proxy::new("only"));
        assert!(module.is_valid());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ModuleKind::Spine.class_name(), "ModuleSpine");
        assert_eq!(ModuleKind::Spine.short_name(), "Spine");
        assert_eq!(ModuleKind::from_class_name("Spine"), Some(ModuleKind::Spine));
        assert_eq!(ModuleKind::from_class_name("ModuleGeneric"), Some(ModuleKind::Generic));
        assert_eq!(ModuleKind::from_class_name("ModuleArm"), None);

        let module = create_module_from_class_name("ModuleArm");
        assert_eq!(module.kind(), ModuleKind::Generic);
        assert_eq!(module.get_module_class_name(true), "Generic");
    }

    #[test]
    fn test_setters_reject_invalid_input() {
        let mut module = ModuleGeneric::new();
        module.base_mut().set_name("");
        module.base_mut().set_prefix("");
        module.base_mut().set_parent_uuid("nope");
        module.base_mut().set_proxies(Vec::new());

        let base = module.base();
        assert_eq!(base.name(), "Generic");
        assert!(base.prefix().is_none());
        assert!(base.parent_uuid().is_none());
        assert!(base.proxies().is_empty());
    }

    #[test]
    fn test_compose_prefix() {
        let mut base = ModuleBase::new("m");
        assert_eq!(base.compose_prefix(None), None);
        assert_eq!(base.compose_prefix(Some("char")), Some("char".to_string()));
        base.set_prefix("left");
        assert_eq!(base.compose_prefix(Some("char")), Some("char_left".to_string()));
        assert_eq!(base.compose_prefix(None), Some("left".to_string()));
    }

    #[test]
    fn test_first_proxy_falls_back_to_module_parent() {
        let mut module = two_proxy_module();
        let module_parent = generate_uuid();
        assert_eq!(module.parent_uuid_for(0, BuildPhase::ProxyPostBuild), None);

        module.base_mut().set_parent_uuid(&module_parent);
        assert_eq!(
            module.parent_uuid_for(0, BuildPhase::ProxyPostBuild),
            Some(module_parent.as_str())
        );
        let first_uuid = module.base().proxies()[0].uuid().to_string();
        assert_eq!(
            module.parent_uuid_for(1, BuildPhase::RigPostBuild),
            Some(first_uuid.as_str())
        );
        assert_eq!(module.parent_uuid_for(5, BuildPhase::RigPostBuild), None);
    }

    #[test]
    fn test_build_proxy_uses_composed_prefix() {
        let mut scene = MemoryScene::new();
        let module = two_proxy_module();
        let data = module.build_proxy(&mut scene, Some("char"));

        let names: Vec<&str> = data.iter().map(|d| d.short_name()).collect();
        assert_eq!(names, ["char_prefix_first", "char_prefix_second"]);
        assert!(scene.find_by_name("char_prefix_first_offset").is_some());
    }

    #[test]
    fn test_build_proxy_post_applies_transforms() {
        let mut scene = MemoryScene::new();
        let module = two_proxy_module();
        let data = module.build_proxy(&mut scene, None);
        module.build_proxy_post(&mut scene);

        let second = scene.get_world_transform(data[1].guide).unwrap();
        assert!(second.position.abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-4));
        assert!((second.rotation.z + 35.0).abs() < 1e-3);
    }

    #[test]
    fn test_rig_phases_create_then_parent_joints() {
        let mut scene = MemoryScene::new();
        let module = two_proxy_module();
        module.build_proxy(&mut scene, None);
        module.build_proxy_post(&mut scene);

        module.build_rig(&mut scene);
        let first = scene
            .find_by_uuid(module.base().proxies()[0].uuid(), UuidNamespace::Joint)
            .unwrap();
        let second = scene
            .find_by_uuid(module.base().proxies()[1].uuid(), UuidNamespace::Joint)
            .unwrap();
        assert_eq!(scene.get_parent(second), None);
        assert_eq!(scene.short_name(second).as_deref(), Some("prefix_second"));
        assert_eq!(
            scene.get_scalar_attr(second, JOINT_ATTR_RADIUS),
            Some(AttrValue::Float(2.0))
        );
        let position = scene.get_world_transform(second).unwrap().position;
        assert!(position.abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-4));

        module.build_rig_post(&mut scene);
        assert_eq!(scene.get_parent(second), Some(first));
        assert_eq!(scene.get_parent(first), None);
    }

    #[test]
    fn test_build_rig_skips_unbuilt_proxies() {
        let mut scene = MemoryScene::new();
        let module = two_proxy_module();
        module.build_rig(&mut scene);
        module.build_rig_post(&mut scene);
        assert!(scene.journal().is_empty());
    }

    #[test]
    fn test_build_proxy_continues_after_failure() {
        let mut scene = MemoryScene::new();
        scene.reject_name("first_offset");
        let module = ModuleGeneric::with_proxies("m", vec![Proxy::new("first"), Proxy::new("second")]);

        let data = module.build_proxy(&mut scene, None);
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].short_name(), "second");
    }

    #[test]
    fn test_read_data_from_scene_updates_proxies() {
        let mut scene = MemoryScene::new();
        let mut module = two_proxy_module();
        let data = module.build_proxy(&mut scene, None);
        scene
            .set_scalar_attr(data[0].guide, PROXY_ATTR_SCALE, AttrValue::Float(3.0))
            .unwrap();

        module.read_data_from_scene(&scene);
        assert_eq!(module.base().proxies()[0].locator_scale(), 3.0);
    }

    #[test]
    fn test_module_dict_roundtrip() {
        let mut module = two_proxy_module();
        module.base_mut().set_parent_uuid(&generate_uuid());
        module.base_mut().set_active_state(false);
        module.base_mut().add_to_metadata("side", json!("left"));

        let dict = module.get_module_as_dict(true);
        assert_eq!(dict.get("module"), Some(&json!("ModuleGeneric")));

        let mut loaded = ModuleGeneric::new();
        loaded.read_data_from_dict(&Value::Object(dict.clone()));

        assert_eq!(loaded.base().name(), "arm");
        assert_eq!(loaded.base().prefix(), Some("prefix"));
        assert_eq!(loaded.base().parent_uuid(), module.base().parent_uuid());
        assert!(!loaded.base().is_active());
        assert_eq!(loaded.base().metadata().get("side"), Some(&json!("left")));

        let uuids: Vec<&str> = loaded.base().proxies().iter().map(|p| p.uuid()).collect();
        let expected: Vec<&str> = module.base().proxies().iter().map(|p| p.uuid()).collect();
        assert_eq!(uuids, expected);
        assert_eq!(loaded.get_module_as_dict(true), dict);
    }

    #[test]
    fn test_read_data_merges_and_ignores_bad_fields() {
        let mut module = two_proxy_module();
        module.read_data_from_dict(&json!({"active": "yes", "proxies": [], "name": "renamed"}));
        assert_eq!(module.base().name(), "renamed");
        assert!(module.base().is_active());
        assert_eq!(module.base().proxies().len(), 2);

        module.read_data_from_dict(&json!("not a dict"));
        assert_eq!(module.base().name(), "renamed");
    }

    #[test]
    fn test_type_matching_read_keeps_positions() {
        let mut hip = Proxy::new("hip");
        hip.set_meta_type("hip");
        let mut chest = Proxy::new("chest");
        chest.set_meta_type("chest");
        let mut base = ModuleBase::new("m");
        base.set_proxies(vec![hip, chest]);

        let chest_uuid = generate_uuid();
        let map = json!({
            chest_uuid.clone(): {"name": "ribcage", "metadata": {"metaType": "chest"}},
            generate_uuid(): {"name": "stray", "metadata": {"metaType": "tail"}},
            generate_uuid(): {"name": "untyped"},
        });
        base.read_type_matching_proxy_from_dict(map.as_object().unwrap());

        assert_eq!(base.proxies().len(), 2);
        assert_eq!(base.proxies()[0].name(), "hip");
        assert_eq!(base.proxies()[1].name(), "ribcage");
        assert_eq!(base.proxies()[1].uuid(), chest_uuid);
        assert!(base.find_proxy(&chest_uuid).is_some());
    }

    #[test]
    fn test_phase_display_and_groups() {
        assert_eq!(BuildPhase::RigPostBuild.to_string(), "build_rig_post");
        assert!(BuildPhase::PROXY.iter().all(BuildPhase::is_proxy_phase));
        assert!(!BuildPhase::RIG.iter().any(BuildPhase::is_proxy_phase));
    }

    #[test]
    fn test_joint_stamp_recorded() {
        let mut scene = MemoryScene::new();
        let module = ModuleGeneric::with_proxies("m", vec![Proxy::new("solo")]);
        module.build_proxy(&mut scene, None);
        scene.clear_journal();
        module.build_rig(&mut scene);

        assert!(scene.journal().iter().any(|call| matches!(
            call,
            SceneCall::StampUuid { namespace: UuidNamespace::Joint, .. }
        )));
    }
}
