//! Rig projects: the unit of build, save and load.
//!
//! A [`Project`] owns an ordered list of modules. Module order decides build
//! order only; the hierarchy comes from proxy UUIDs, which may point across
//! modules in either direction. That is why every build walks all modules
//! phase by phase instead of building module by module.

use std::path::Path;

use serde_json::{Map, Value};

use crate::color::add_side_color_setup;
use crate::constants::{
    suffix, ATTR_OVERRIDE_DISPLAY_TYPE, ATTR_OVERRIDE_ENABLED, DEFAULT_PROJECT_NAME,
    PROXY_ROOT_CURVE, PROXY_ROOT_GROUP, RIG_ROOT_CURVE, RIG_ROOT_GROUP, SETUP_DATA_ATTR,
    SETUP_GROUP,
};
use crate::curve::Curve;
use crate::error::{RigError, RigResult};
use crate::identity::UuidNamespace;
use crate::module::{create_module_from_class_name, BuildPhase, RigModule};
use crate::proxy::{Proxy, ProxyData};
use crate::scene::{AttrValue, NodeHandle, RedrawGuard, SceneBackend, SceneResult};

/// What to do with a proxy hierarchy left by an earlier build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExistingProxy {
    /// Delete it as is
    Discard,
    /// Read interactive edits back into the project, then delete it
    ReadChanges,
}

/// A named, ordered collection of rig modules.
#[derive(Debug)]
pub struct Project {
    name: String,
    prefix: Option<String>,
    modules: Vec<Box<dyn RigModule>>,
    metadata: Map<String, Value>,

    /// Top group of the last proxy build
    proxy_root: Option<NodeHandle>,

    /// Hidden setup group of the last proxy build
    proxy_setup: Option<NodeHandle>,

    /// Top group of the last rig build
    rig_root: Option<NodeHandle>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROJECT_NAME.to_string(),
            prefix: None,
            modules: Vec::new(),
            metadata: Map::new(),
            proxy_root: None,
            proxy_setup: None,
            rig_root: None,
        }
    }
}

impl Project {
    pub fn new(name: &str) -> Self {
        let mut project = Self::default();
        project.set_name(name);
        project
    }

    /// Load a project from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> RigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let project = Self::from_json_str(&content)?;
        log::info!(
            "Loaded project \"{}\" with {} module(s) from {}",
            project.name,
            project.modules.len(),
            path.display()
        );
        Ok(project)
    }

    /// Load a project from a JSON string.
    pub fn from_json_str(content: &str) -> RigResult<Self> {
        let value: Value = serde_json::from_str(content)?;
        if !value.is_object() {
            return Err(RigError::InvalidProject(
                "project file must contain a JSON object".to_string(),
            ));
        }
        let mut project = Self::default();
        project.read_data_from_dict(&value);
        Ok(project)
    }

    /// Write the project as pretty-printed JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> RigResult<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(&Value::Object(self.get_project_as_dict()))?;
        std::fs::write(path, content)?;
        log::info!("Saved project \"{}\" to {}", self.name, path.display());
        Ok(())
    }

    // ------------------------------------------------- Setters -------------------------------------------------

    pub fn set_name(&mut self, name: &str) {
        if name.is_empty() {
            log::warn!("Unable to set project name. Expected a non-empty string.");
            return;
        }
        self.name = name.to_string();
    }

    pub fn set_prefix(&mut self, prefix: &str) {
        if prefix.is_empty() {
            log::warn!("Unable to set project prefix. Expected a non-empty string.");
            return;
        }
        self.prefix = Some(prefix.to_string());
    }

    pub fn add_to_modules(&mut self, module: Box<dyn RigModule>) {
        self.modules.push(module);
    }

    /// Replace every module. An empty list is rejected.
    pub fn set_modules(&mut self, modules: Vec<Box<dyn RigModule>>) {
        if modules.is_empty() {
            log::warn!("Unable to set modules. Expected at least one module.");
            return;
        }
        self.modules = modules;
    }

    pub fn set_metadata_dict(&mut self, metadata: Map<String, Value>) {
        self.metadata = metadata;
    }

    pub fn add_to_metadata(&mut self, key: &str, value: Value) {
        self.metadata.insert(key.to_string(), value);
    }

    // ------------------------------------------------- Getters -------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn modules(&self) -> &[Box<dyn RigModule>] {
        &self.modules
    }

    pub fn modules_mut(&mut self) -> &mut [Box<dyn RigModule>] {
        &mut self.modules
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn proxy_root(&self) -> Option<NodeHandle> {
        self.proxy_root
    }

    pub fn rig_root(&self) -> Option<NodeHandle> {
        self.rig_root
    }

    /// Find a proxy in any module.
    pub fn find_proxy(&self, uuid: &str) -> Option<&Proxy> {
        self.modules.iter().find_map(|m| m.base().find_proxy(uuid))
    }

    fn active_modules(&self) -> impl Iterator<Item = &dyn RigModule> {
        self.modules
            .iter()
            .map(|m| m.as_ref())
            .filter(|m| m.base().is_active())
    }

    /// Active modules with every module placed after the modules its proxies
    /// hang from. Post-build moves guides in world space, so parents must
    /// settle before their children are placed. Cycles keep list order.
    fn modules_in_dependency_order(&self) -> Vec<&dyn RigModule> {
        let active: Vec<&dyn RigModule> = self.active_modules().collect();
        let owner_of = |uuid: &str| active.iter().position(|m| m.base().find_proxy(uuid).is_some());
        let dependencies: Vec<Vec<usize>> = active
            .iter()
            .enumerate()
            .map(|(index, module)| {
                (0..module.base().proxies().len())
                    .filter_map(|i| module.parent_uuid_for(i, BuildPhase::ProxyPostBuild))
                    .filter_map(owner_of)
                    .filter(|owner| *owner != index)
                    .collect()
            })
            .collect();

        fn visit(index: usize, dependencies: &[Vec<usize>], visited: &mut [bool], order: &mut Vec<usize>) {
            if visited[index] {
                return;
            }
            visited[index] = true;
            for dependency in &dependencies[index] {
                visit(*dependency, dependencies, visited, order);
            }
            order.push(index);
        }

        let mut visited = vec![false; active.len()];
        let mut order = Vec::with_capacity(active.len());
        for index in 0..active.len() {
            visit(index, &dependencies, &mut visited, &mut order);
        }
        order.into_iter().map(|index| active[index]).collect()
    }

    pub fn is_valid(&self) -> bool {
        if self.modules.is_empty() {
            log::warn!("Missing modules. A rig project needs at least one module to function.");
            return false;
        }
        true
    }

    // -------------------------------------------------- Build --------------------------------------------------

    /// Run one phase over every active module, in module order.
    ///
    /// Returns the built proxies for [`BuildPhase::ProxyBuild`] and nothing
    /// for the other phases.
    pub fn run_phase(&self, scene: &mut dyn SceneBackend, phase: BuildPhase) -> Vec<ProxyData> {
        log::debug!("Running \"{}\" on project \"{}\"", phase, self.name);
        let modules = match phase {
            BuildPhase::ProxyPostBuild => self.modules_in_dependency_order(),
            _ => self.active_modules().collect(),
        };
        let mut proxy_data = Vec::new();
        for module in modules {
            match phase {
                BuildPhase::ProxyBuild => {
                    proxy_data.extend(module.build_proxy(scene, self.prefix.as_deref()));
                }
                BuildPhase::ProxyPostBuild => {
                    parent_proxies(scene, module);
                    create_proxy_visualization_lines(scene, module, self.proxy_setup);
                    for proxy in module.base().proxies() {
                        if let Err(e) = proxy.apply_attr_dict(scene, None) {
                            log::warn!("Failed to apply attributes of \"{}\": {}", proxy.name(), e);
                        }
                    }
                    module.build_proxy_post(scene);
                }
                BuildPhase::RigBuild => module.build_rig(scene),
                BuildPhase::RigPostBuild => module.build_rig_post(scene),
            }
        }
        proxy_data
    }

    /// Build the proxy (guide) hierarchy of every active module.
    ///
    /// Redraw is suspended for the duration and restored on every exit path.
    /// Root creation failures are returned; per-proxy failures are logged.
    pub fn build_proxy(&mut self, scene: &mut dyn SceneBackend) -> RigResult<Vec<ProxyData>> {
        let mut scene = RedrawGuard::new(scene);
        self.build_proxy_unguarded(&mut *scene)
    }

    fn build_proxy_unguarded(&mut self, scene: &mut dyn SceneBackend) -> RigResult<Vec<ProxyData>> {
        self.ensure_valid()?;

        let root_group = scene.create_group(PROXY_ROOT_GROUP)?;
        let root = scene.create_curve_guide(&Curve::proxy_root(), PROXY_ROOT_CURVE)?;
        scene.parent(root, Some(root_group))?;
        let setup = create_setup_group(scene, root_group)?;
        self.proxy_root = Some(root_group);
        self.proxy_setup = Some(setup);

        let proxy_data = self.run_phase(scene, BuildPhase::ProxyBuild);
        for data in &proxy_data {
            if let Err(e) = attach_proxy(scene, data, root, setup) {
                log::warn!("Failed to attach proxy \"{}\" to the proxy root: {}", data, e);
            }
        }
        self.run_phase(scene, BuildPhase::ProxyPostBuild);

        log::info!("Built {} proxies for project \"{}\"", proxy_data.len(), self.name);
        Ok(proxy_data)
    }

    /// Build joints from the guides of the last proxy build.
    ///
    /// A rig left by an earlier call is deleted first, so the scene never
    /// holds two joints for one proxy.
    pub fn build_rig(&mut self, scene: &mut dyn SceneBackend) -> RigResult<()> {
        let mut scene = RedrawGuard::new(scene);
        self.build_rig_unguarded(&mut *scene)
    }

    fn build_rig_unguarded(&mut self, scene: &mut dyn SceneBackend) -> RigResult<()> {
        self.ensure_valid()?;
        self.delete_existing_rig(scene)?;

        let rig_group = scene.create_group(RIG_ROOT_GROUP)?;
        let root = scene.create_curve_guide(&Curve::rig_root(), RIG_ROOT_CURVE)?;
        scene.parent(root, Some(rig_group))?;
        create_setup_group(scene, rig_group)?;
        self.rig_root = Some(rig_group);

        for phase in BuildPhase::RIG {
            self.run_phase(scene, phase);
        }
        log::info!("Built rig for project \"{}\"", self.name);
        Ok(())
    }

    /// Replace an earlier proxy build with a fresh one.
    pub fn rebuild_proxy(
        &mut self,
        scene: &mut dyn SceneBackend,
        existing: ExistingProxy,
    ) -> RigResult<Vec<ProxyData>> {
        if let Some(root) = self.find_existing_proxy_root(scene) {
            if existing == ExistingProxy::ReadChanges {
                self.read_data_from_scene(scene);
            }
            scene.delete(root)?;
            log::debug!("Deleted previous proxy hierarchy {}", root);
        }
        self.proxy_root = None;
        self.proxy_setup = None;
        self.build_proxy(scene)
    }

    /// The remembered proxy root, or the top ancestor of any built guide.
    fn find_existing_proxy_root(&self, scene: &dyn SceneBackend) -> Option<NodeHandle> {
        if let Some(root) = self.proxy_root.filter(|r| scene.exists(*r)) {
            return Some(root);
        }
        let guide = self
            .modules
            .iter()
            .flat_map(|m| m.base().proxies())
            .find_map(|p| scene.find_by_uuid(p.uuid(), UuidNamespace::Proxy))?;
        Some(top_ancestor(scene, guide))
    }

    /// Remove the remembered rig root and every hierarchy holding one of
    /// this project's joints.
    fn delete_existing_rig(&mut self, scene: &mut dyn SceneBackend) -> RigResult<()> {
        let mut roots: Vec<NodeHandle> = self.rig_root.into_iter().collect();
        for proxy in self.modules.iter().flat_map(|m| m.base().proxies()) {
            if let Some(joint) = scene.find_by_uuid(proxy.uuid(), UuidNamespace::Joint) {
                let top = top_ancestor(scene, joint);
                if !roots.contains(&top) {
                    roots.push(top);
                }
            }
        }
        for root in roots {
            if scene.exists(root) {
                scene.delete(root)?;
                log::debug!("Deleted previous rig hierarchy {}", root);
            }
        }
        self.rig_root = None;
        Ok(())
    }

    /// Capture interactive edits from every module's built guides.
    pub fn read_data_from_scene(&mut self, scene: &dyn SceneBackend) -> &mut Self {
        for module in self.modules.iter_mut() {
            module.read_data_from_scene(scene);
        }
        self
    }

    fn ensure_valid(&self) -> RigResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(RigError::InvalidProject(format!(
                "project \"{}\" has no modules",
                self.name
            )))
        }
    }

    // ---------------------------------------------- Serialization ----------------------------------------------

    /// Modules are keyed by short class name; repeated kinds get `_2`, `_3`...
    pub fn get_project_as_dict(&self) -> Map<String, Value> {
        let mut modules = Map::new();
        for module in &self.modules {
            let class_name = module.get_module_class_name(true);
            let mut key = class_name.to_string();
            let mut count = 1;
            while modules.contains_key(&key) {
                count += 1;
                key = format!("{}_{}", class_name, count);
            }
            modules.insert(key, Value::Object(module.get_module_as_dict(false)));
        }

        let mut dict = Map::new();
        dict.insert("name".to_string(), Value::from(self.name.as_str()));
        if let Some(prefix) = &self.prefix {
            dict.insert("prefix".to_string(), Value::from(prefix.as_str()));
        }
        dict.insert("modules".to_string(), Value::Object(modules));
        if !self.metadata.is_empty() {
            dict.insert("metadata".to_string(), Value::Object(self.metadata.clone()));
        }
        dict
    }

    /// Replace modules (in file order) with the ones described by the map.
    pub fn read_modules_from_dict(&mut self, modules_dict: &Map<String, Value>) {
        if modules_dict.is_empty() {
            log::debug!("Unable to read modules from dictionary. Input is empty.");
            return;
        }
        self.modules = modules_dict
            .iter()
            .map(|(key, description)| {
                let mut module = create_module_from_class_name(strip_duplicate_suffix(key));
                module.read_data_from_dict(description);
                module
            })
            .collect();
    }

    /// Reset modules and metadata, then read a serialized project.
    pub fn read_data_from_dict(&mut self, project_dict: &Value) -> &mut Self {
        let Some(dict) = project_dict.as_object() else {
            log::debug!("Unable to read project data from dict. Input must be a dictionary.");
            return self;
        };
        self.modules.clear();
        self.metadata.clear();

        if let Some(name) = dict.get("name").and_then(Value::as_str) {
            self.set_name(name);
        }
        if let Some(prefix) = dict.get("prefix").and_then(Value::as_str) {
            self.set_prefix(prefix);
        }
        match dict.get("modules") {
            Some(Value::Object(modules)) => self.read_modules_from_dict(modules),
            Some(other) => log::warn!("Unable to read modules. Expected a dictionary but got {}", other),
            None => {}
        }
        if let Some(metadata) = dict.get("metadata") {
            match metadata.as_object() {
                Some(map) => self.set_metadata_dict(map.clone()),
                None => log::warn!("Unable to set project metadata. Expected a dictionary."),
            }
        }
        self
    }
}

fn top_ancestor(scene: &dyn SceneBackend, node: NodeHandle) -> NodeHandle {
    let mut top = node;
    while let Some(parent) = scene.get_parent(top) {
        top = parent;
    }
    top
}

/// `Spine_2` -> `Spine`; keys without a numeric suffix are returned as is.
fn strip_duplicate_suffix(key: &str) -> &str {
    match key.rsplit_once('_') {
        Some((class_name, n)) if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => class_name,
        _ => key,
    }
}

/// Hidden group holding rig setup nodes.
fn create_setup_group(scene: &mut dyn SceneBackend, parent: NodeHandle) -> SceneResult<NodeHandle> {
    let setup = scene.create_group(SETUP_GROUP)?;
    scene.set_scalar_attr(setup, SETUP_DATA_ATTR, AttrValue::Text(String::new()))?;
    scene.set_scalar_attr(setup, ATTR_OVERRIDE_ENABLED, AttrValue::Int(1))?;
    scene.set_scalar_attr(setup, ATTR_OVERRIDE_DISPLAY_TYPE, AttrValue::Int(1))?;
    scene.parent(setup, Some(parent))?;
    Ok(setup)
}

/// Color a freshly built guide and hang its nodes under the shared roots.
fn attach_proxy(
    scene: &mut dyn SceneBackend,
    data: &ProxyData,
    root: NodeHandle,
    setup: NodeHandle,
) -> SceneResult<()> {
    add_side_color_setup(scene, data.guide)?;
    for node in &data.setup_nodes {
        scene.parent(*node, Some(setup))?;
    }
    scene.parent(data.offset_node, Some(root))
}

/// Hang each proxy's offset group under its parent proxy's guide.
fn parent_proxies(scene: &mut dyn SceneBackend, module: &dyn RigModule) {
    for (index, proxy) in module.base().proxies().iter().enumerate() {
        let Some(parent_uuid) = module.parent_uuid_for(index, BuildPhase::ProxyPostBuild) else {
            continue;
        };
        let Some(offset) = proxy.find_guide(scene).and_then(|g| scene.get_parent(g)) else {
            continue;
        };
        let Some(parent_guide) = scene.find_by_uuid(parent_uuid, UuidNamespace::Proxy) else {
            log::debug!("Parent {} of proxy \"{}\" is not built", parent_uuid, proxy.name());
            continue;
        };
        if let Err(e) = scene.parent(offset, Some(parent_guide)) {
            log::warn!("Failed to parent proxy \"{}\": {}", proxy.name(), e);
        }
    }
}

/// Draw a line from each guide to its meta parent (or real parent).
fn create_proxy_visualization_lines(
    scene: &mut dyn SceneBackend,
    module: &dyn RigModule,
    lines_parent: Option<NodeHandle>,
) {
    for (index, proxy) in module.base().proxies().iter().enumerate() {
        let line_parent = proxy
            .meta_parent_uuid()
            .or_else(|| module.parent_uuid_for(index, BuildPhase::ProxyPostBuild));
        let Some(line_parent) = line_parent else {
            continue;
        };
        let (Some(guide), Some(parent_guide)) = (
            proxy.find_guide(scene),
            scene.find_by_uuid(line_parent, UuidNamespace::Proxy),
        ) else {
            continue;
        };

        let name = format!(
            "{}_to_{}_{}",
            scene.short_name(guide).unwrap_or_default(),
            scene.short_name(parent_guide).unwrap_or_default(),
            suffix::LINE
        );
        let line = scene
            .create_line(&name, parent_guide, guide)
            .and_then(|line| match lines_parent {
                Some(parent) => scene.parent(line, Some(parent)),
                None => Ok(()),
            });
        if let Err(e) = line {
            log::warn!("Failed to create line for proxy \"{}\": {}", proxy.name(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::COLOR_LEFT;
    use crate::constants::{ATTR_AUTO_COLOR, ATTR_COLOR_DEFAULT};
    use crate::module::{ModuleGeneric, ModuleKind, ModuleSpine};
    use crate::scene::{MemoryScene, SceneCall};
    use rig_math::Vec3;
    use serde_json::json;

    /// Module B hangs from module A but is listed first.
    fn cross_module_project() -> (Project, String, String) {
        let mut a_root = Proxy::new("a_root");
        a_root.set_position(Vec3::new(0.0, 10.0, 0.0));
        let a_uuid = a_root.uuid().to_string();

        let mut b_child = Proxy::new("b_child");
        b_child.set_position(Vec3::new(5.0, 10.0, 0.0));
        b_child.set_parent_uuid(&a_uuid);
        let b_uuid = b_child.uuid().to_string();

        let mut project = Project::new("cross");
        project.add_to_modules(Box::new(ModuleGeneric::with_proxies("B", vec![b_child])));
        project.add_to_modules(Box::new(ModuleGeneric::with_proxies("A", vec![a_root])));
        (project, a_uuid, b_uuid)
    }

    #[test]
    fn test_defaults_and_validity() {
        let mut project = Project::default();
        assert_eq!(project.name(), "Untitled");
        assert!(!project.is_valid());

        let mut scene = MemoryScene::new();
        assert!(matches!(
            project.build_proxy(&mut scene),
            Err(RigError::InvalidProject(_))
        ));
        assert!(!scene.is_redraw_suspended());

        project.add_to_modules(ModuleKind::Generic.create());
        assert!(project.is_valid());
    }

    #[test]
    fn test_cross_module_parenting_ignores_module_order() {
        let (mut project, a_uuid, b_uuid) = cross_module_project();
        let mut scene = MemoryScene::new();
        project.build_proxy(&mut scene).unwrap();

        let a_guide = scene.find_by_uuid(&a_uuid, UuidNamespace::Proxy).unwrap();
        let b_guide = scene.find_by_uuid(&b_uuid, UuidNamespace::Proxy).unwrap();
        let b_offset = scene.get_parent(b_guide).unwrap();
        assert_eq!(scene.get_parent(b_offset), Some(a_guide));
        assert!(scene
            .journal()
            .contains(&SceneCall::Parent { child: b_offset, parent: Some(a_guide) }));

        // A's offset stays under the shared root curve
        let a_offset = scene.get_parent(a_guide).unwrap();
        let root = scene.get_parent(a_offset).unwrap();
        assert_eq!(scene.short_name(root).as_deref(), Some(PROXY_ROOT_CURVE));

        let b_position = scene.get_world_transform(b_guide).unwrap().position;
        assert!(b_position.abs_diff_eq(Vec3::new(5.0, 10.0, 0.0), 1e-4));
    }

    #[test]
    fn test_proxy_build_creates_roots_and_setup() {
        let (mut project, _, _) = cross_module_project();
        let mut scene = MemoryScene::new();
        let data = project.build_proxy(&mut scene).unwrap();
        assert_eq!(data.len(), 2);

        let root_group = project.proxy_root().unwrap();
        assert_eq!(scene.short_name(root_group).as_deref(), Some(PROXY_ROOT_GROUP));
        let setup = scene.find_by_name(SETUP_GROUP).unwrap();
        assert_eq!(scene.get_parent(setup), Some(root_group));
        assert_eq!(
            scene.get_scalar_attr(setup, ATTR_OVERRIDE_DISPLAY_TYPE),
            Some(AttrValue::Int(1))
        );
        for proxy in &data {
            for node in &proxy.setup_nodes {
                assert_eq!(scene.get_parent(*node), Some(setup));
            }
        }

        // B -> A visualization line lives under setup
        let lines = scene.nodes_of_kind("line");
        assert_eq!(lines.len(), 1);
        assert_eq!(scene.get_parent(lines[0]), Some(setup));
        assert!(!scene.is_redraw_suspended());
        assert_eq!(scene.refresh_count(), 1);
    }

    #[test]
    fn test_rig_phases_run_in_order_across_modules() {
        let (mut project, a_uuid, b_uuid) = cross_module_project();
        let mut scene = MemoryScene::new();
        project.build_proxy(&mut scene).unwrap();
        scene.clear_journal();

        project.build_rig(&mut scene).unwrap();

        let joints: Vec<NodeHandle> = scene
            .journal()
            .iter()
            .filter_map(|call| match call {
                SceneCall::Create { node, kind: "joint", .. } => Some(*node),
                _ => None,
            })
            .collect();
        assert_eq!(joints.len(), 2);

        let journal = scene.journal();
        let last_create = journal
            .iter()
            .rposition(|call| matches!(call, SceneCall::Create { kind: "joint", .. }))
            .unwrap();
        let first_parent = journal
            .iter()
            .position(|call| matches!(call, SceneCall::Parent { child, .. } if joints.contains(child)))
            .unwrap();
        assert!(last_create < first_parent);

        let a_joint = scene.find_by_uuid(&a_uuid, UuidNamespace::Joint).unwrap();
        let b_joint = scene.find_by_uuid(&b_uuid, UuidNamespace::Joint).unwrap();
        assert_eq!(scene.get_parent(b_joint), Some(a_joint));
        assert_eq!(
            scene.short_name(project.rig_root().unwrap()).as_deref(),
            Some(RIG_ROOT_GROUP)
        );
    }

    #[test]
    fn test_redraw_resumed_when_build_fails() {
        let (mut project, _, _) = cross_module_project();
        let mut scene = MemoryScene::new();
        project.build_proxy(&mut scene).unwrap();

        scene.reject_name(RIG_ROOT_GROUP);
        let result = project.build_rig(&mut scene);
        assert!(matches!(result, Err(RigError::Scene(_))));
        assert!(!scene.is_redraw_suspended());
        assert_eq!(scene.refresh_count(), 2);
    }

    #[test]
    fn test_inactive_modules_are_skipped() {
        let (mut project, a_uuid, b_uuid) = cross_module_project();
        project.modules_mut()[0].base_mut().set_active_state(false);
        let mut scene = MemoryScene::new();
        let data = project.build_proxy(&mut scene).unwrap();

        assert_eq!(data.len(), 1);
        assert!(scene.find_by_uuid(&a_uuid, UuidNamespace::Proxy).is_some());
        assert!(scene.find_by_uuid(&b_uuid, UuidNamespace::Proxy).is_none());
    }

    #[test]
    fn test_fixed_color_wins_over_side_color() {
        let mut left = Proxy::new("left_hand");
        let mut fixed = Proxy::new("left_thumb");
        fixed.add_color([0.1, 0.2, 0.3]);
        left.set_position(Vec3::X);
        let mut project = Project::default();
        project.add_to_modules(Box::new(ModuleGeneric::with_proxies("hand", vec![left, fixed])));

        let mut scene = MemoryScene::new();
        let data = project.build_proxy(&mut scene).unwrap();

        assert_eq!(
            scene.get_scalar_attr(data[0].guide, ATTR_COLOR_DEFAULT),
            Some(AttrValue::Double3(COLOR_LEFT))
        );
        assert_eq!(
            scene.get_scalar_attr(data[1].guide, ATTR_AUTO_COLOR),
            Some(AttrValue::Bool(false))
        );
        assert_eq!(
            scene.get_scalar_attr(data[1].guide, ATTR_COLOR_DEFAULT),
            Some(AttrValue::Double3([0.1, 0.2, 0.3]))
        );
    }

    #[test]
    fn test_project_prefix_reaches_guides() {
        let mut project = Project::default();
        project.set_prefix("char");
        project.add_to_modules(Box::new(ModuleSpine::new()));
        let mut scene = MemoryScene::new();
        let data = project.build_proxy(&mut scene).unwrap();
        assert_eq!(data[0].short_name(), "char_hip");
    }

    #[test]
    fn test_unknown_module_loads_as_generic() {
        let proxy_uuid = crate::identity::generate_uuid();
        let dict = json!({
            "name": "legacy",
            "modules": {
                "Tail": {
                    "name": "tail",
                    "active": true,
                    "proxies": {
                        proxy_uuid.clone(): {"name": "tail01", "parent": null, "locatorScale": 2.0}
                    }
                }
            }
        });
        let mut project = Project::default();
        project.read_data_from_dict(&dict);

        assert_eq!(project.name(), "legacy");
        assert_eq!(project.modules().len(), 1);
        let module = &project.modules()[0];
        assert_eq!(module.kind(), ModuleKind::Generic);
        assert_eq!(module.base().name(), "tail");
        let proxy = project.find_proxy(&proxy_uuid).unwrap();
        assert_eq!(proxy.name(), "tail01");
        assert_eq!(proxy.locator_scale(), 2.0);
    }

    #[test]
    fn test_duplicate_module_kinds_roundtrip() {
        let mut project = Project::new("twins");
        project.add_to_modules(Box::new(ModuleSpine::new()));
        project.add_to_modules(Box::new(ModuleGeneric::with_proxies("a", vec![Proxy::new("a")])));
        project.add_to_modules(Box::new(ModuleGeneric::with_proxies("b", vec![Proxy::new("b")])));
        project.add_to_modules(Box::new(ModuleGeneric::with_proxies("c", vec![Proxy::new("c")])));

        let dict = project.get_project_as_dict();
        let keys: Vec<&String> = dict["modules"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["Spine", "Generic", "Generic_2", "Generic_3"]);

        let mut loaded = Project::default();
        loaded.read_data_from_dict(&Value::Object(dict.clone()));
        let kinds: Vec<ModuleKind> = loaded.modules().iter().map(|m| m.kind()).collect();
        assert_eq!(
            kinds,
            [ModuleKind::Spine, ModuleKind::Generic, ModuleKind::Generic, ModuleKind::Generic]
        );
        assert_eq!(loaded.get_project_as_dict(), dict);
    }

    #[test]
    fn test_post_build_runs_parent_modules_first() {
        let (project, _, _) = cross_module_project();
        let names: Vec<&str> = project
            .modules_in_dependency_order()
            .iter()
            .map(|m| m.base().name())
            .collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn test_strip_duplicate_suffix() {
        assert_eq!(strip_duplicate_suffix("Spine_2"), "Spine");
        assert_eq!(strip_duplicate_suffix("Generic"), "Generic");
        assert_eq!(strip_duplicate_suffix("My_Module"), "My_Module");
        assert_eq!(strip_duplicate_suffix("Generic_"), "Generic_");
    }

    #[test]
    fn test_read_resets_modules_and_metadata() {
        let (mut project, _, _) = cross_module_project();
        project.add_to_metadata("author", json!("someone"));
        project.read_data_from_dict(&json!({"name": "fresh"}));

        assert_eq!(project.name(), "fresh");
        assert!(project.modules().is_empty());
        assert!(project.metadata().is_empty());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rig.json");

        let mut project = Project::new("biped");
        project.set_prefix("char");
        project.add_to_metadata("version", json!(1));
        project.add_to_modules(Box::new(ModuleSpine::new()));
        project.save_to_file(&path).unwrap();

        let loaded = Project::load_from_file(&path).unwrap();
        assert_eq!(loaded.get_project_as_dict(), project.get_project_as_dict());
        assert_eq!(loaded.prefix(), Some("char"));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Project::load_from_file(dir.path().join("missing.json")),
            Err(RigError::Io(_))
        ));
        assert!(matches!(Project::from_json_str("{ nope"), Err(RigError::Json(_))));
        assert!(matches!(
            Project::from_json_str("[1, 2]"),
            Err(RigError::InvalidProject(_))
        ));
    }

    #[test]
    fn test_rebuild_reads_changes_and_replaces_hierarchy() {
        let (mut project, a_uuid, _) = cross_module_project();
        let mut scene = MemoryScene::new();
        project.build_proxy(&mut scene).unwrap();
        let first_root = project.proxy_root().unwrap();

        let a_guide = scene.find_by_uuid(&a_uuid, UuidNamespace::Proxy).unwrap();
        scene
            .apply_world_transform(a_guide, &rig_math::Transform::from_position(Vec3::new(0.0, 20.0, 0.0)))
            .unwrap();

        project.rebuild_proxy(&mut scene, ExistingProxy::ReadChanges).unwrap();

        assert!(!scene.exists(first_root));
        assert_ne!(project.proxy_root(), Some(first_root));
        let moved = project.find_proxy(&a_uuid).unwrap().transform().unwrap().position;
        assert!(moved.abs_diff_eq(Vec3::new(0.0, 20.0, 0.0), 1e-4));
        let rebuilt = scene.find_by_uuid(&a_uuid, UuidNamespace::Proxy).unwrap();
        let position = scene.get_world_transform(rebuilt).unwrap().position;
        assert!(position.abs_diff_eq(Vec3::new(0.0, 20.0, 0.0), 1e-4));
        let roots = scene
            .nodes_of_kind("group")
            .into_iter()
            .filter(|n| scene.short_name(*n).as_deref() == Some(PROXY_ROOT_GROUP))
            .count();
        assert_eq!(roots, 1);
    }

    #[test]
    fn test_rebuild_discard_keeps_model() {
        let (mut project, a_uuid, _) = cross_module_project();
        let mut scene = MemoryScene::new();
        project.build_proxy(&mut scene).unwrap();
        let a_guide = scene.find_by_uuid(&a_uuid, UuidNamespace::Proxy).unwrap();
        scene
            .apply_world_transform(a_guide, &rig_math::Transform::from_position(Vec3::ZERO))
            .unwrap();

        project.rebuild_proxy(&mut scene, ExistingProxy::Discard).unwrap();
        let kept = project.find_proxy(&a_uuid).unwrap().transform().unwrap().position;
        assert_eq!(kept, Vec3::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn test_spine_project_full_build() {
        let mut spine = ModuleSpine::new();
        spine.set_spine_num(6);
        let mut project = Project::default();
        project.add_to_modules(Box::new(spine));
        let mut scene = MemoryScene::new();
        project.build_proxy(&mut scene).unwrap();
        project.build_rig(&mut scene).unwrap();

        assert_eq!(scene.nodes_of_kind("joint").len(), 8);
        // 6 spine links plus the chest line
        assert_eq!(scene.nodes_of_kind("line").len(), 7);
    }

    #[test]
    fn test_spines_follow_moved_hip() {
        let mut spine = ModuleSpine::new();
        spine.base_mut().proxies_mut()[0].set_position(Vec3::new(0.0, 100.0, 0.0));
        let mut project = Project::default();
        project.add_to_modules(Box::new(spine));
        let mut scene = MemoryScene::new();
        project.build_proxy(&mut scene).unwrap();

        let module = &project.modules()[0];
        let world_y = |proxy: &Proxy| {
            let guide = scene.find_by_uuid(proxy.uuid(), UuidNamespace::Proxy).unwrap();
            scene.get_world_transform(guide).unwrap().position.y
        };
        let proxies = module.base().proxies();
        assert!((world_y(&proxies[0]) - 100.0).abs() < 1e-3);
        for (proxy, y) in proxies[1..4].iter().zip([103.625, 107.25, 110.875]) {
            assert!((world_y(proxy) - y).abs() < 1e-3, "{} at {}", proxy.name(), world_y(proxy));
        }
        assert!((world_y(&proxies[4]) - 114.5).abs() < 1e-3);
    }

    #[test]
    fn test_build_rig_twice_replaces_previous_rig() {
        let mut project = Project::default();
        project.add_to_modules(Box::new(ModuleSpine::new()));
        let mut scene = MemoryScene::new();
        project.build_proxy(&mut scene).unwrap();
        project.build_rig(&mut scene).unwrap();
        let first_root = project.rig_root().unwrap();

        project.build_rig(&mut scene).unwrap();

        assert!(!scene.exists(first_root));
        assert_eq!(scene.nodes_of_kind("joint").len(), 5);
        let rig_roots = scene
            .nodes_of_kind("group")
            .into_iter()
            .filter(|n| scene.short_name(*n).as_deref() == Some(RIG_ROOT_GROUP))
            .count();
        assert_eq!(rig_roots, 1);
        let proxy_roots = scene
            .nodes_of_kind("group")
            .into_iter()
            .filter(|n| scene.short_name(*n).as_deref() == Some(PROXY_ROOT_GROUP))
            .count();
        assert_eq!(proxy_roots, 1);
    }
}
