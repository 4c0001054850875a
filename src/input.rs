use crate::channel::InboundEvent;
use crate::config::InputMode;
use crate::rover::Direction;
use glam::Vec3;
use winit::keyboard::{Key, NamedKey};

/// Turns one kind of stimulus into rover directions. Each implementation
/// answers `None` for every source it does not listen on.
pub trait InputAdapter {
    fn name(&self) -> &'static str;

    /// World-space step taken by `Direction::Forward`.
    fn heading(&self) -> Vec3;

    fn key_direction(&self, _key: &Key) -> Option<Direction> {
        None
    }

    fn remote_direction(&self, _event: &InboundEvent) -> Option<Direction> {
        None
    }
}

/// Arrow keys; "up" drives away from the camera.
pub struct KeyboardInput;

impl InputAdapter for KeyboardInput {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn heading(&self) -> Vec3 {
        Vec3::NEG_Z
    }

    fn key_direction(&self, key: &Key) -> Option<Direction> {
        match key {
            Key::Named(NamedKey::ArrowUp) => Some(Direction::Forward),
            Key::Named(NamedKey::ArrowDown) => Some(Direction::Backward),
            _ => None,
        }
    }
}

/// `move` events from the backend channel.
pub struct RemoteInput;

impl InputAdapter for RemoteInput {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn heading(&self) -> Vec3 {
        Vec3::Z
    }

    fn remote_direction(&self, event: &InboundEvent) -> Option<Direction> {
        let InboundEvent::Move(payload) = event;
        match payload.as_str() {
            "up" => Some(Direction::Forward),
            "down" => Some(Direction::Backward),
            _ => None,
        }
    }
}

impl InputMode {
    pub fn adapter(self) -> Box<dyn InputAdapter> {
        match self {
            InputMode::Keyboard => Box::new(KeyboardInput),
            InputMode::Remote => Box::new(RemoteInput),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(payload: &str) -> InboundEvent {
        InboundEvent::Move(payload.to_string())
    }

    #[test]
    fn keyboard_maps_arrows_only() {
        let input = KeyboardInput;
        assert_eq!(input.key_direction(&Key::Named(NamedKey::ArrowUp)), Some(Direction::Forward));
        assert_eq!(
            input.key_direction(&Key::Named(NamedKey::ArrowDown)),
            Some(Direction::Backward)
        );
        assert_eq!(input.key_direction(&Key::Named(NamedKey::ArrowLeft)), None);
        assert_eq!(input.key_direction(&Key::Character("w".into())), None);
        assert_eq!(input.remote_direction(&mv("up")), None);
    }

    #[test]
    fn remote_maps_up_and_down_only() {
        let input = RemoteInput;
        assert_eq!(input.remote_direction(&mv("up")), Some(Direction::Forward));
        assert_eq!(input.remote_direction(&mv("down")), Some(Direction::Backward));
        assert_eq!(input.remote_direction(&mv("sideways")), None);
        assert_eq!(input.remote_direction(&mv("UP")), None);
        assert_eq!(input.key_direction(&Key::Named(NamedKey::ArrowUp)), None);
    }

    #[test]
    fn modes_pick_their_adapter() {
        assert_eq!(InputMode::Keyboard.adapter().name(), "keyboard");
        assert_eq!(InputMode::Keyboard.adapter().heading(), Vec3::NEG_Z);
        assert_eq!(InputMode::Remote.adapter().name(), "remote");
        assert_eq!(InputMode::Remote.adapter().heading(), Vec3::Z);
    }
}
