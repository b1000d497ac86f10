//! Guide colors.
//!
//! Built guides are colored by side unless a proxy carries a fixed color in
//! its attribute dictionary.

use crate::constants::{ATTR_AUTO_COLOR, ATTR_COLOR_DEFAULT};
use crate::scene::{AttrValue, NodeHandle, SceneBackend, SceneResult};

/// RGB color, 0-1 per channel.
pub type Rgb = [f64; 3];

pub const COLOR_CENTER: Rgb = [1.0, 1.0, 0.0];
pub const COLOR_LEFT: Rgb = [0.0, 0.5, 1.0];
pub const COLOR_RIGHT: Rgb = [1.0, 0.0, 0.0];

/// Fixed color of proxies that follow other proxies (spine in-betweens).
pub const COLOR_FOLLOWER: Rgb = [1.0, 0.5, 0.0];

/// Side of the rig a guide belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    Center,
}

impl Side {
    /// Guess the side from a name's underscore-separated tokens.
    ///
    /// `left`/`l` and `right`/`r` tokens win; anything else is center.
    pub fn from_name(name: &str) -> Self {
        for token in name.split('_') {
            match token.to_ascii_lowercase().as_str() {
                "left" | "l" => return Side::Left,
                "right" | "r" => return Side::Right,
                _ => {}
            }
        }
        Side::Center
    }

    pub fn color(&self) -> Rgb {
        match self {
            Side::Left => COLOR_LEFT,
            Side::Right => COLOR_RIGHT,
            Side::Center => COLOR_CENTER,
        }
    }
}

/// Give `node` an automatic side color derived from its short name.
pub fn add_side_color_setup(scene: &mut dyn SceneBackend, node: NodeHandle) -> SceneResult<()> {
    let name = scene.short_name(node).unwrap_or_default();
    let side = Side::from_name(&name);
    scene.set_scalar_attr(node, ATTR_AUTO_COLOR, AttrValue::Bool(true))?;
    scene.set_scalar_attr(node, ATTR_COLOR_DEFAULT, AttrValue::Double3(side.color()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;

    #[test]
    fn test_side_from_name() {
        assert_eq!(Side::from_name("left_arm"), Side::Left);
        assert_eq!(Side::from_name("rig_R_hand"), Side::Right);
        assert_eq!(Side::from_name("hip"), Side::Center);
        assert_eq!(Side::from_name("leftover"), Side::Center);
    }

    #[test]
    fn test_side_color_setup_sets_attributes() {
        let mut scene = MemoryScene::new();
        let node = scene.create_group("right_shoulder").unwrap();
        add_side_color_setup(&mut scene, node).unwrap();

        assert_eq!(
            scene.get_scalar_attr(node, ATTR_AUTO_COLOR),
            Some(AttrValue::Bool(true))
        );
        assert_eq!(
            scene.get_scalar_attr(node, ATTR_COLOR_DEFAULT),
            Some(AttrValue::Double3(COLOR_RIGHT))
        );
    }
}
