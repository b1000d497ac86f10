//! Naming and attribute constants shared by proxies, modules and projects.
//!
//! These are the names written onto backend objects, so changing one breaks
//! resolution of scenes built with the old value.

/// String attribute holding a proxy UUID on a built guide.
pub const PROXY_ATTR_UUID: &str = "proxyUUID";

/// String attribute holding the proxy UUID a joint was built from.
pub const JOINT_ATTR_UUID: &str = "jointUUID";

/// Numeric attribute driving the visual scale of a guide.
pub const PROXY_ATTR_SCALE: &str = "locatorScale";

/// Locked separator attribute grouping the proxy controls in attribute editors.
pub const PROXY_ATTR_SEPARATOR: &str = "proxyControls";

/// Joint radius attribute.
pub const JOINT_ATTR_RADIUS: &str = "radius";

/// String attribute marking the hidden setup group.
pub const SETUP_DATA_ATTR: &str = "setupData";

/// Display override attributes set on the setup group.
pub const ATTR_OVERRIDE_ENABLED: &str = "overrideEnabled";
pub const ATTR_OVERRIDE_DISPLAY_TYPE: &str = "overrideDisplayType";

/// Color attributes read by the side color setup.
pub const ATTR_AUTO_COLOR: &str = "autoColor";
pub const ATTR_COLOR_DEFAULT: &str = "colorDefault";

/// Recognized proxy metadata keys.
pub const PROXY_META_TYPE: &str = "metaType";
pub const PROXY_META_PARENT: &str = "metaParent";

/// Class name prefix stripped from module keys in serialized projects.
pub const MODULE_CLASS_PREFIX: &str = "Module";

/// Default project name.
pub const DEFAULT_PROJECT_NAME: &str = "Untitled";

/// Default proxy name.
pub const DEFAULT_PROXY_NAME: &str = "proxy";

/// Names of the roots created by a project build.
pub const PROXY_ROOT_GROUP: &str = "rig_proxy_grp";
pub const PROXY_ROOT_CURVE: &str = "root_proxy";
pub const RIG_ROOT_GROUP: &str = "rig_grp";
pub const RIG_ROOT_CURVE: &str = "root_ctrl";
pub const SETUP_GROUP: &str = "setup_grp";

/// Name suffixes.
pub mod suffix {
    pub const OFFSET: &str = "offset";
    pub const LINE: &str = "line";
    pub const SCALE_DRIVER: &str = "scaleDriver";
}
