//! In-memory scene backend.
//!
//! A small transform hierarchy with attributes and a UUID registry. Nodes
//! store local matrices, so moving a parent carries its children along the
//! way a host scene would. Every mutating call is appended to a journal that
//! tests use to check build ordering.

use std::fmt::Write as _;

use rig_math::{Mat4, Transform};

use super::{AttrValue, NodeHandle, SceneBackend, SceneError, SceneResult, UserAttr};
use crate::curve::Curve;
use crate::identity::{UuidNamespace, UuidRegistry};

/// What a node is.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Group,
    CurveGuide(Curve),
    Joint,
    Line { start: NodeHandle, end: NodeHandle },
    ScaleDriver { target: NodeHandle, driver_attr: String },
}

impl NodeKind {
    /// Short label used in hierarchy dumps.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Group => "group",
            NodeKind::CurveGuide(_) => "curve",
            NodeKind::Joint => "joint",
            NodeKind::Line { .. } => "line",
            NodeKind::ScaleDriver { .. } => "scaleDriver",
        }
    }
}

/// A recorded backend call.
#[derive(Clone, Debug, PartialEq)]
pub enum SceneCall {
    Create { node: NodeHandle, kind: &'static str, name: String },
    Delete(NodeHandle),
    Parent { child: NodeHandle, parent: Option<NodeHandle> },
    ApplyTransform(NodeHandle),
    SetAttr { node: NodeHandle, attr: String },
    StampUuid { node: NodeHandle, namespace: UuidNamespace },
    SuspendRedraw,
    ResumeRedraw,
    Refresh,
}

#[derive(Clone, Debug)]
struct Attr {
    name: String,
    value: AttrValue,
    locked: bool,
}

#[derive(Clone, Debug)]
struct Node {
    name: String,
    kind: NodeKind,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
    local: Mat4,
    attrs: Vec<Attr>,
}

/// In-memory [`SceneBackend`].
#[derive(Debug, Default)]
pub struct MemoryScene {
    nodes: Vec<Option<Node>>,
    registry: UuidRegistry,
    suspend_depth: u32,
    refresh_count: usize,
    journal: Vec<SceneCall>,
    rejected_names: Vec<String>,
}

impl MemoryScene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later creation of a node called `name` fail.
    ///
    /// Used to exercise error paths of callers.
    pub fn reject_name(&mut self, name: impl Into<String>) {
        self.rejected_names.push(name.into());
    }

    /// Recorded calls, oldest first.
    pub fn journal(&self) -> &[SceneCall] {
        &self.journal
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    pub fn is_redraw_suspended(&self) -> bool {
        self.suspend_depth > 0
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_count
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn kind(&self, node: NodeHandle) -> Option<&NodeKind> {
        self.node(node).map(|n| &n.kind)
    }

    pub fn children(&self, node: NodeHandle) -> &[NodeHandle] {
        self.node(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Nodes parented under the world, in creation order.
    pub fn roots(&self) -> Vec<NodeHandle> {
        self.live_nodes()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(h, _)| h)
            .collect()
    }

    /// First live node with the given short name.
    pub fn find_by_name(&self, name: &str) -> Option<NodeHandle> {
        self.live_nodes().find(|(_, n)| n.name == name).map(|(h, _)| h)
    }

    /// Live nodes of one kind label (`"joint"`, `"curve"`, ...).
    pub fn nodes_of_kind(&self, label: &str) -> Vec<NodeHandle> {
        self.live_nodes()
            .filter(|(_, n)| n.kind.label() == label)
            .map(|(h, _)| h)
            .collect()
    }

    /// True when `node` sits somewhere below `ancestor`.
    pub fn is_descendant_of(&self, node: NodeHandle, ancestor: NodeHandle) -> bool {
        let mut current = self.get_parent(node);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.get_parent(parent);
        }
        false
    }

    /// Indented outline of the whole scene.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        for root in self.roots() {
            self.write_outline(&mut out, root, 0);
        }
        out
    }

    fn write_outline(&self, out: &mut String, node: NodeHandle, depth: usize) {
        let Some(n) = self.node(node) else {
            return;
        };
        let position = self
            .get_world_transform(node)
            .map(|t| t.position)
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{}{} [{}] ({:.2}, {:.2}, {:.2})",
            "  ".repeat(depth),
            n.name,
            n.kind.label(),
            position.x,
            position.y,
            position.z
        );
        for child in &n.children {
            self.write_outline(out, *child, depth + 1);
        }
    }

    fn live_nodes(&self) -> impl Iterator<Item = (NodeHandle, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeHandle(i), n)))
    }

    fn node(&self, node: NodeHandle) -> Option<&Node> {
        self.nodes.get(node.0).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, node: NodeHandle) -> SceneResult<&mut Node> {
        self.nodes
            .get_mut(node.0)
            .and_then(|n| n.as_mut())
            .ok_or(SceneError::NodeNotFound(node))
    }

    fn world_matrix(&self, node: NodeHandle) -> Option<Mat4> {
        let n = self.node(node)?;
        match n.parent {
            Some(parent) => Some(self.world_matrix(parent)? * n.local),
            None => Some(n.local),
        }
    }

    fn insert(&mut self, name: &str, kind: NodeKind) -> SceneResult<NodeHandle> {
        if self.rejected_names.iter().any(|r| r == name) {
            return Err(SceneError::Rejected {
                operation: format!("create {}", kind.label()),
                message: format!("name \"{}\" is rejected", name),
            });
        }
        let handle = NodeHandle(self.nodes.len());
        self.journal.push(SceneCall::Create {
            node: handle,
            kind: kind.label(),
            name: name.to_string(),
        });
        self.nodes.push(Some(Node {
            name: name.to_string(),
            kind,
            parent: None,
            children: Vec::new(),
            local: Mat4::IDENTITY,
            attrs: Vec::new(),
        }));
        Ok(handle)
    }

    fn require(&self, node: NodeHandle) -> SceneResult<()> {
        if self.exists(node) {
            Ok(())
        } else {
            Err(SceneError::NodeNotFound(node))
        }
    }
}

impl SceneBackend for MemoryScene {
    fn create_group(&mut self, name: &str) -> SceneResult<NodeHandle> {
        self.insert(name, NodeKind::Group)
    }

    fn create_curve_guide(&mut self, curve: &Curve, name: &str) -> SceneResult<NodeHandle> {
        self.insert(name, NodeKind::CurveGuide(curve.clone()))
    }

    fn create_joint(&mut self, name: &str) -> SceneResult<NodeHandle> {
        self.insert(name, NodeKind::Joint)
    }

    fn create_line(
        &mut self,
        name: &str,
        start: NodeHandle,
        end: NodeHandle,
    ) -> SceneResult<NodeHandle> {
        self.require(start)?;
        self.require(end)?;
        self.insert(name, NodeKind::Line { start, end })
    }

    fn create_scale_driver(
        &mut self,
        target: NodeHandle,
        driver_attr: &str,
    ) -> SceneResult<NodeHandle> {
        let target_name = self.short_name(target).ok_or(SceneError::NodeNotFound(target))?;
        let name = format!("{}_{}", target_name, crate::constants::suffix::SCALE_DRIVER);
        self.insert(
            &name,
            NodeKind::ScaleDriver {
                target,
                driver_attr: driver_attr.to_string(),
            },
        )
    }

    fn delete(&mut self, node: NodeHandle) -> SceneResult<()> {
        self.require(node)?;
        if let Some(parent) = self.get_parent(node) {
            self.node_mut(parent)?.children.retain(|c| *c != node);
        }
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(removed) = self.nodes.get_mut(current.0).and_then(|n| n.take()) {
                stack.extend(removed.children);
                self.registry.unregister_node(current);
            }
        }
        self.journal.push(SceneCall::Delete(node));
        Ok(())
    }

    fn exists(&self, node: NodeHandle) -> bool {
        self.node(node).is_some()
    }

    fn parent(&mut self, child: NodeHandle, parent: Option<NodeHandle>) -> SceneResult<()> {
        self.require(child)?;
        if let Some(p) = parent {
            self.require(p)?;
            if p == child || self.is_descendant_of(p, child) {
                return Err(SceneError::ParentCycle { child, parent: p });
            }
        }

        let world = self.world_matrix(child).unwrap_or(Mat4::IDENTITY);
        let parent_world = match parent {
            Some(p) => self.world_matrix(p).unwrap_or(Mat4::IDENTITY),
            None => Mat4::IDENTITY,
        };

        if let Some(old) = self.get_parent(child) {
            self.node_mut(old)?.children.retain(|c| *c != child);
        }
        if let Some(p) = parent {
            self.node_mut(p)?.children.push(child);
        }
        let node = self.node_mut(child)?;
        node.parent = parent;
        node.local = parent_world.inverse() * world;

        self.journal.push(SceneCall::Parent { child, parent });
        Ok(())
    }

    fn get_parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.node(node).and_then(|n| n.parent)
    }

    fn apply_world_transform(
        &mut self,
        node: NodeHandle,
        transform: &Transform,
    ) -> SceneResult<()> {
        self.require(node)?;
        let parent_world = self
            .get_parent(node)
            .and_then(|p| self.world_matrix(p))
            .unwrap_or(Mat4::IDENTITY);
        self.node_mut(node)?.local = parent_world.inverse() * transform.to_matrix();
        self.journal.push(SceneCall::ApplyTransform(node));
        Ok(())
    }

    fn get_world_transform(&self, node: NodeHandle) -> SceneResult<Transform> {
        self.world_matrix(node)
            .map(Transform::from_matrix)
            .ok_or(SceneError::NodeNotFound(node))
    }

    fn set_scalar_attr(
        &mut self,
        node: NodeHandle,
        name: &str,
        value: AttrValue,
    ) -> SceneResult<()> {
        let n = self.node_mut(node)?;
        match n.attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) if attr.locked => {
                return Err(SceneError::LockedAttribute {
                    node,
                    attr: name.to_string(),
                })
            }
            Some(attr) => attr.value = value,
            None => n.attrs.push(Attr {
                name: name.to_string(),
                value,
                locked: false,
            }),
        }
        self.journal.push(SceneCall::SetAttr {
            node,
            attr: name.to_string(),
        });
        Ok(())
    }

    fn get_scalar_attr(&self, node: NodeHandle, name: &str) -> Option<AttrValue> {
        self.node(node)?
            .attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.clone())
    }

    fn add_separator_attr(&mut self, node: NodeHandle, name: &str) -> SceneResult<()> {
        let n = self.node_mut(node)?;
        if !n.attrs.iter().any(|a| a.name == name) {
            n.attrs.push(Attr {
                name: name.to_string(),
                value: AttrValue::Text(String::new()),
                locked: true,
            });
        }
        Ok(())
    }

    fn list_user_attrs(&self, node: NodeHandle) -> Vec<UserAttr> {
        self.node(node)
            .map(|n| {
                n.attrs
                    .iter()
                    .map(|a| UserAttr {
                        name: a.name.clone(),
                        value: a.value.clone(),
                        locked: a.locked,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn find_by_uuid(&self, uuid: &str, namespace: UuidNamespace) -> Option<NodeHandle> {
        self.registry
            .resolve(namespace, uuid)
            .filter(|node| self.exists(*node))
    }

    fn stamp_uuid(
        &mut self,
        node: NodeHandle,
        uuid: &str,
        namespace: UuidNamespace,
    ) -> SceneResult<()> {
        self.set_scalar_attr(node, namespace.attr_name(), AttrValue::Text(uuid.to_string()))?;
        self.registry.register(namespace, uuid, node);
        self.journal.push(SceneCall::StampUuid { node, namespace });
        Ok(())
    }

    fn long_name(&self, node: NodeHandle) -> Option<String> {
        let n = self.node(node)?;
        let prefix = match n.parent {
            Some(parent) => self.long_name(parent)?,
            None => String::new(),
        };
        Some(format!("{}|{}", prefix, n.name))
    }

    fn short_name(&self, node: NodeHandle) -> Option<String> {
        self.node(node).map(|n| n.name.clone())
    }

    fn suspend_redraw(&mut self) {
        self.suspend_depth += 1;
        self.journal.push(SceneCall::SuspendRedraw);
    }

    fn resume_redraw(&mut self) {
        self.suspend_depth = self.suspend_depth.saturating_sub(1);
        self.journal.push(SceneCall::ResumeRedraw);
    }

    fn refresh(&mut self) {
        self.refresh_count += 1;
        self.journal.push(SceneCall::Refresh);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_math::Vec3;

    #[test]
    fn test_long_names_follow_hierarchy() {
        let mut scene = MemoryScene::new();
        let root = scene.create_group("root").unwrap();
        let child = scene.create_group("child").unwrap();
        scene.parent(child, Some(root)).unwrap();

        assert_eq!(scene.long_name(child).as_deref(), Some("|root|child"));
        assert_eq!(scene.short_name(child).as_deref(), Some("child"));
        assert_eq!(scene.roots(), vec![root]);
        assert_eq!(scene.children(root), &[child]);
    }

    #[test]
    fn test_parent_keeps_world_transform() {
        let mut scene = MemoryScene::new();
        let parent = scene.create_group("parent").unwrap();
        let child = scene.create_group("child").unwrap();
        scene
            .apply_world_transform(parent, &Transform::from_position(Vec3::new(10.0, 0.0, 0.0)))
            .unwrap();
        scene
            .apply_world_transform(child, &Transform::from_position(Vec3::new(0.0, 5.0, 0.0)))
            .unwrap();

        scene.parent(child, Some(parent)).unwrap();
        let world = scene.get_world_transform(child).unwrap();
        assert!(world.position.abs_diff_eq(Vec3::new(0.0, 5.0, 0.0), 1e-5));

        // Moving the parent carries the child
        scene
            .apply_world_transform(parent, &Transform::from_position(Vec3::new(20.0, 0.0, 0.0)))
            .unwrap();
        let world = scene.get_world_transform(child).unwrap();
        assert!(world.position.abs_diff_eq(Vec3::new(10.0, 5.0, 0.0), 1e-5));
    }

    #[test]
    fn test_parent_cycle_rejected() {
        let mut scene = MemoryScene::new();
        let a = scene.create_group("a").unwrap();
        let b = scene.create_group("b").unwrap();
        scene.parent(b, Some(a)).unwrap();

        let result = scene.parent(a, Some(b));
        assert!(matches!(result, Err(SceneError::ParentCycle { .. })));
    }

    #[test]
    fn test_delete_removes_subtree_and_uuids() {
        let mut scene = MemoryScene::new();
        let root = scene.create_group("root").unwrap();
        let child = scene.create_joint("joint").unwrap();
        scene.parent(child, Some(root)).unwrap();
        scene.stamp_uuid(child, "abcdef12", UuidNamespace::Joint).unwrap();
        assert_eq!(scene.find_by_uuid("abcdef12", UuidNamespace::Joint), Some(child));

        scene.delete(root).unwrap();
        assert!(!scene.exists(child));
        assert_eq!(scene.node_count(), 0);
        assert_eq!(scene.find_by_uuid("abcdef12", UuidNamespace::Joint), None);
    }

    #[test]
    fn test_locked_attributes_reject_writes() {
        let mut scene = MemoryScene::new();
        let node = scene.create_group("node").unwrap();
        scene.add_separator_attr(node, "controls").unwrap();
        scene.set_scalar_attr(node, "weight", AttrValue::Float(0.5)).unwrap();

        let result = scene.set_scalar_attr(node, "controls", AttrValue::Int(1));
        assert!(matches!(result, Err(SceneError::LockedAttribute { .. })));

        let attrs = scene.list_user_attrs(node);
        assert_eq!(attrs.len(), 2);
        assert!(attrs[0].locked);
        assert_eq!(attrs[1].value, AttrValue::Float(0.5));
    }

    #[test]
    fn test_uuid_lookup_is_per_namespace() {
        let mut scene = MemoryScene::new();
        let guide = scene.create_curve_guide(&Curve::proxy_joint(), "hip").unwrap();
        scene.stamp_uuid(guide, "12345678", UuidNamespace::Proxy).unwrap();

        assert_eq!(scene.find_by_uuid("12345678", UuidNamespace::Proxy), Some(guide));
        assert_eq!(scene.find_by_uuid("12345678", UuidNamespace::Joint), None);
        assert_eq!(
            scene.get_scalar_attr(guide, UuidNamespace::Proxy.attr_name()),
            Some(AttrValue::Text("12345678".into()))
        );
    }

    #[test]
    fn test_rejected_names_fail_creation() {
        let mut scene = MemoryScene::new();
        scene.reject_name("bad");
        assert!(matches!(
            scene.create_group("bad"),
            Err(SceneError::Rejected { .. })
        ));
        assert!(scene.create_group("good").is_ok());
    }

    #[test]
    fn test_match_translate_keeps_rotation() {
        let mut scene = MemoryScene::new();
        let source = scene.create_group("source").unwrap();
        let target = scene.create_joint("target").unwrap();
        scene
            .apply_world_transform(source, &Transform::from_position(Vec3::new(1.0, 2.0, 3.0)))
            .unwrap();
        let rotated = Transform::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 45.0), Vec3::ONE);
        scene.apply_world_transform(target, &rotated).unwrap();

        scene.match_translate(source, target).unwrap();
        let world = scene.get_world_transform(target).unwrap();
        assert!(world.position.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-5));
        assert!((world.rotation.z - 45.0).abs() < 1e-3);
    }

    #[test]
    fn test_outline_lists_nested_nodes() {
        let mut scene = MemoryScene::new();
        let root = scene.create_group("root").unwrap();
        let child = scene.create_joint("hip").unwrap();
        scene.parent(child, Some(root)).unwrap();

        let outline = scene.outline();
        assert!(outline.contains("root [group]"));
        assert!(outline.contains("  hip [joint]"));
    }
}
