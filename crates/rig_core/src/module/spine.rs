//! Spine module: a hip, a chest, and a variable number of spines in between.

use rig_math::{Transform, Vec3};
use serde_json::{Map, Value};

use super::{BuildPhase, ModuleBase, ModuleKind, RigModule};
use crate::color::COLOR_FOLLOWER;
use crate::constants::PROXY_META_TYPE;
use crate::proxy::Proxy;
use crate::scene::SceneBackend;

const META_HIP: &str = "hip";
const META_CHEST: &str = "chest";
const META_SPINE: &str = "spine";

const DEFAULT_SPINE_NUM: usize = 3;

/// `spine` followed by at least one digit.
fn is_spine_meta_type(meta_type: &str) -> bool {
    meta_type
        .strip_prefix(META_SPINE)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Hip,
    Chest,
    Spine,
    Other,
}

impl Role {
    fn of(proxy: &Proxy) -> Self {
        match proxy.meta_type() {
            Some(META_HIP) => Role::Hip,
            Some(META_CHEST) => Role::Chest,
            Some(t) if is_spine_meta_type(t) => Role::Spine,
            _ => Role::Other,
        }
    }
}

/// Proxies are kept in the module list as `[hip, spine01.., chest]` and
/// identified by their meta type.
#[derive(Clone, Debug)]
pub struct ModuleSpine {
    base: ModuleBase,
}

impl Default for ModuleSpine {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleSpine {
    pub fn new() -> Self {
        let mut module = Self {
            base: ModuleBase::new(ModuleKind::Spine.short_name()),
        };
        module.base.proxies = vec![default_hip(), default_chest()];
        module.set_spine_num(DEFAULT_SPINE_NUM);
        module
    }

    pub fn hip(&self) -> Option<&Proxy> {
        self.base.proxies.iter().find(|p| Role::of(p) == Role::Hip)
    }

    pub fn chest(&self) -> Option<&Proxy> {
        self.base.proxies.iter().find(|p| Role::of(p) == Role::Chest)
    }

    /// In-between proxies, hip side first.
    pub fn spines(&self) -> impl Iterator<Item = &Proxy> {
        self.base.proxies.iter().filter(|p| Role::of(p) == Role::Spine)
    }

    pub fn spine_num(&self) -> usize {
        self.spines().count()
    }

    /// Grow or shrink the in-between proxies, keeping hip and chest.
    ///
    /// New spines chain from the last existing one (or the hip). The chest's
    /// meta parent is re-linked to the new last spine, or to the hip when
    /// none remain.
    pub fn set_spine_num(&mut self, spine_num: usize) {
        let (hip, mut spines, mut chest) = self.take_parts();
        let spines_len = spines.len();

        if spines_len < spine_num {
            let mut parent_uuid = spines.last().unwrap_or(&hip).uuid().to_string();
            for num in spines_len..spine_num {
                let name = format!("{}{:02}", META_SPINE, num + 1);
                let mut spine = Proxy::new(&name);
                spine.set_locator_scale(1.0);
                spine.add_color(COLOR_FOLLOWER);
                spine.set_meta_type(&name);
                spine.add_meta_parent(&parent_uuid);
                spine.set_parent_uuid(&parent_uuid);
                parent_uuid = spine.uuid().to_string();
                spines.push(spine);
            }
        } else if spines_len > spine_num {
            spines.truncate(spine_num);
        }

        chest.add_meta_parent_from_proxy(spines.last().unwrap_or(&hip));
        self.store_parts(hip, spines, chest);
    }

    /// Pull hip, spines and chest out of the proxy list, recreating the fixed
    /// proxies if they went missing.
    fn take_parts(&mut self) -> (Proxy, Vec<Proxy>, Proxy) {
        let mut hip = None;
        let mut chest = None;
        let mut spines = Vec::new();
        for proxy in self.base.proxies.drain(..) {
            match Role::of(&proxy) {
                Role::Hip if hip.is_none() => hip = Some(proxy),
                Role::Chest if chest.is_none() => chest = Some(proxy),
                Role::Spine => spines.push(proxy),
                _ => log::debug!("Dropping proxy \"{}\" with no spine role", proxy.name()),
            }
        }
        (
            hip.unwrap_or_else(default_hip),
            spines,
            chest.unwrap_or_else(default_chest),
        )
    }

    fn store_parts(&mut self, hip: Proxy, spines: Vec<Proxy>, chest: Proxy) {
        let mut proxies = Vec::with_capacity(spines.len() + 2);
        proxies.push(hip);
        proxies.extend(spines);
        proxies.push(chest);
        self.base.proxies = proxies;
    }
}

fn default_hip() -> Proxy {
    let mut hip = Proxy::new(META_HIP);
    hip.set_initial_position(Vec3::new(0.0, 84.5, 0.0));
    hip.set_locator_scale(1.5);
    hip.set_meta_type(META_HIP);
    hip
}

fn default_chest() -> Proxy {
    let mut chest = Proxy::new(META_CHEST);
    chest.set_initial_position(Vec3::new(0.0, 114.5, 0.0));
    chest.set_locator_scale(1.5);
    chest.set_meta_type(META_CHEST);
    chest
}

impl RigModule for ModuleSpine {
    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Spine
    }

    /// The hip takes the module parent. The chest floats free while guides
    /// are edited and hangs from the last spine (its meta parent) in the rig.
    fn parent_uuid_for(&self, index: usize, phase: BuildPhase) -> Option<&str> {
        let proxy = self.base.proxies.get(index)?;
        match Role::of(proxy) {
            Role::Hip => self.base.parent_uuid().or(proxy.parent_uuid()),
            Role::Chest if phase.is_proxy_phase() => proxy.parent_uuid(),
            Role::Chest => proxy.meta_parent_uuid().or(proxy.parent_uuid()),
            Role::Spine | Role::Other => proxy.parent_uuid(),
        }
    }

    /// Places hip and chest, spaces the spine offsets evenly between their
    /// final positions, then applies the spines' own transforms.
    ///
    /// The spine chain hangs from the hip guide, so the hip must be in its
    /// final place before the in-betweens are positioned.
    fn build_proxy_post(&self, scene: &mut dyn SceneBackend) {
        let (Some(hip), Some(chest)) = (self.hip(), self.chest()) else {
            log::warn!("Spine module \"{}\" is missing its hip or chest proxy", self.base.name());
            return;
        };
        for proxy in [hip, chest] {
            if let Err(e) = proxy.apply_offset_transform(scene) {
                log::warn!("Failed to apply offset to \"{}\": {}", proxy.name(), e);
            }
            if let Err(e) = proxy.apply_transforms(scene, false) {
                log::warn!("Failed to apply transforms to \"{}\": {}", proxy.name(), e);
            }
        }

        let endpoints = hip
            .find_guide(scene)
            .zip(chest.find_guide(scene))
            .and_then(|(h, c)| {
                let start = scene.get_world_transform(h).ok()?.position;
                let end = scene.get_world_transform(c).ok()?.position;
                Some((start, end))
            });
        if let Some((start, end)) = endpoints {
            let spines: Vec<&Proxy> = self.spines().collect();
            let count = spines.len() as f32 + 1.0;
            for (i, spine) in spines.iter().enumerate() {
                let Some(offset) = spine.find_guide(scene).and_then(|g| scene.get_parent(g)) else {
                    continue;
                };
                let position = start.lerp(end, (i as f32 + 1.0) / count);
                let placed = scene
                    .get_world_transform(offset)
                    .map(|t| t.with_position(position))
                    .unwrap_or_else(|_| Transform::from_position(position));
                if let Err(e) = scene.apply_world_transform(offset, &placed) {
                    log::warn!("Failed to place \"{}\": {}", spine.name(), e);
                }
            }
        }

        for proxy in self.spines() {
            if let Err(e) = proxy.apply_transforms(scene, false) {
                log::warn!("Failed to apply transforms to \"{}\": {}", proxy.name(), e);
            }
        }
    }

    /// Resizes to the number of `spineNN` entries, then updates proxies by
    /// meta type so hip and chest keep their place.
    fn read_proxies_from_dict(&mut self, proxy_dict: &Map<String, Value>) {
        if proxy_dict.is_empty() {
            log::debug!("Unable to read proxies from dictionary. Input is empty.");
            return;
        }
        let spine_num = proxy_dict
            .values()
            .filter_map(|description| description.get("metadata")?.get(PROXY_META_TYPE)?.as_str())
            .filter(|meta_type| is_spine_meta_type(meta_type))
            .count();
        self.set_spine_num(spine_num);
        self.base.read_type_matching_proxy_from_dict(proxy_dict);
        let (hip, spines, chest) = self.take_parts();
        self.store_parts(hip, spines, chest);
    }

    /// Spine offsets are derived at build time, so they are not saved.
    fn get_module_as_dict(&self, include_module_name: bool) -> Map<String, Value> {
        let class_name = include_module_name.then(|| self.get_module_class_name(false));
        self.base.to_dict(class_name, false)
    }
}
