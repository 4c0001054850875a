use crate::channel::{Channel, OutboundEvent};
use crate::config::{DRILL_DURATION, INITIAL_TARGET, SPRING_FRICTION, SPRING_TENSION};
use crate::drill::DrillController;
use crate::input::InputAdapter;
use crate::rover::{Direction, PositionStore};
use crate::spring::{Spring, SpringConfig};
use glam::Vec3;
use std::time::{Duration, Instant};
use winit::keyboard::Key;

pub const DRILL_KEY: &str = "d";

/// Everything the rover does between input and the renderer.
pub struct RoverScene {
    store: PositionStore,
    spring: Spring,
    drill: DrillController,
    input: Option<Box<dyn InputAdapter>>,
    channel: Option<Box<dyn Channel>>,
}

impl RoverScene {
    /// `channel` is owned by the scene from here on and released by `unmount`.
    pub fn mount(input: Box<dyn InputAdapter>, channel: Option<Box<dyn Channel>>) -> Self {
        log::info!(
            "mounting rover scene with {} input ({})",
            input.name(),
            if channel.is_some() { "channel connected" } else { "no channel" }
        );
        Self {
            store: PositionStore::new(INITIAL_TARGET, input.heading()),
            spring: Spring::new(
                INITIAL_TARGET,
                SpringConfig::new(SPRING_TENSION, SPRING_FRICTION),
            ),
            drill: DrillController::new(DRILL_DURATION),
            input: Some(input),
            channel,
        }
    }

    pub fn target_position(&self) -> Vec3 {
        self.store.target()
    }

    pub fn displayed_position(&self) -> Vec3 {
        self.spring.position()
    }

    pub fn is_drilling(&self, now: Instant) -> bool {
        self.drill.is_drilling(now)
    }

    pub fn is_mounted(&self) -> bool {
        self.input.is_some()
    }

    /// Returns true when the key was consumed.
    pub fn handle_key(&mut self, key: &Key, now: Instant) -> bool {
        let Some(input) = self.input.as_ref() else {
            return false;
        };

        if let Some(direction) = input.key_direction(key) {
            self.apply(direction);
            return true;
        }

        if matches!(key, Key::Character(c) if c.as_str() == DRILL_KEY) {
            if let Err(e) = self.drill.start(now) {
                log::info!("drill key ignored: {e}");
            }
            return true;
        }
        false
    }

    /// Starts a drill session and tells the backend about it. Returns true
    /// when a `drill` event went out.
    pub fn handle_rover_click(&mut self, now: Instant) -> bool {
        if !self.is_mounted() {
            return false;
        }
        if let Err(e) = self.drill.start(now) {
            log::info!("rover click ignored: {e}");
            return false;
        }

        let Some(channel) = self.channel.as_mut() else {
            log::warn!("drilling without a channel, backend not notified");
            return false;
        };
        match channel.emit(OutboundEvent::Drill) {
            Ok(()) => {
                log::info!("drill started");
                true
            }
            Err(e) => {
                log::warn!("could not send drill event: {e}");
                false
            }
        }
    }

    /// Per-frame step: inbound events, drill timer, spring.
    pub fn update(&mut self, dt: Duration, now: Instant) -> Vec3 {
        let directions = self.drain_remote();
        for direction in directions {
            self.apply(direction);
        }

        self.drill.tick(now);
        self.spring.advance(dt)
    }

    /// Releases the input listener and the channel. Later stimuli are ignored.
    pub fn unmount(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.disconnect();
        }
        if self.input.take().is_some() {
            log::info!("rover scene unmounted");
        }
    }

    fn drain_remote(&mut self) -> Vec<Direction> {
        let (Some(input), Some(channel)) = (self.input.as_ref(), self.channel.as_mut()) else {
            return Vec::new();
        };
        channel
            .drain()
            .iter()
            .filter_map(|event| {
                let direction = input.remote_direction(event);
                if direction.is_none() {
                    log::debug!("ignoring channel event {event:?}");
                }
                direction
            })
            .collect()
    }

    fn apply(&mut self, direction: Direction) {
        let target = self.store.apply_direction(direction);
        self.spring.retarget(target);
        log::info!("rover heading {direction:?} to {target}");
    }
}

impl Drop for RoverScene {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LoopbackChannel;
    use crate::input::{KeyboardInput, RemoteInput};
    use winit::keyboard::NamedKey;

    const FRAME: Duration = Duration::from_millis(16);

    fn remote_scene() -> (RoverScene, crate::channel::LoopbackPeer) {
        let (channel, peer) = LoopbackChannel::pair();
        (RoverScene::mount(Box::new(RemoteInput), Some(Box::new(channel))), peer)
    }

    #[test]
    fn remote_moves_follow_the_documented_scenario() {
        let (mut scene, peer) = remote_scene();
        let now = Instant::now();
        assert_eq!(scene.target_position(), Vec3::new(0.0, 0.5, 0.0));

        peer.send_move("up");
        scene.update(FRAME, now);
        assert_eq!(scene.target_position(), Vec3::new(0.0, 0.5, 1.0));

        peer.send_move("down");
        scene.update(FRAME, now);
        assert_eq!(scene.target_position(), Vec3::new(0.0, 0.5, 0.0));

        peer.send_move("sideways");
        scene.update(FRAME, now);
        assert_eq!(scene.target_position(), Vec3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn displayed_position_eases_toward_target() {
        let (mut scene, peer) = remote_scene();
        let now = Instant::now();
        peer.send_move("up");

        let first = scene.update(FRAME, now);
        assert!(first.z > 0.0 && first.z < 1.0);
        for _ in 0..240 {
            scene.update(FRAME, now);
        }
        assert_eq!(scene.displayed_position(), Vec3::new(0.0, 0.5, 1.0));
    }

    #[test]
    fn keyboard_arrows_move_the_rover() {
        let mut scene = RoverScene::mount(Box::new(KeyboardInput), None);
        let now = Instant::now();
        assert!(scene.handle_key(&Key::Named(NamedKey::ArrowUp), now));
        assert_eq!(scene.target_position(), Vec3::new(0.0, 0.5, -1.0));
        assert!(scene.handle_key(&Key::Named(NamedKey::ArrowDown), now));
        assert!(scene.handle_key(&Key::Named(NamedKey::ArrowDown), now));
        assert_eq!(scene.target_position(), Vec3::new(0.0, 0.5, 1.0));
        assert!(!scene.handle_key(&Key::Named(NamedKey::Space), now));
    }

    #[test]
    fn remote_mode_ignores_arrow_keys() {
        let (mut scene, _peer) = remote_scene();
        assert!(!scene.handle_key(&Key::Named(NamedKey::ArrowUp), Instant::now()));
        assert_eq!(scene.target_position(), INITIAL_TARGET);
    }

    #[test]
    fn keyboard_mode_ignores_remote_moves() {
        let (channel, peer) = LoopbackChannel::pair();
        let mut scene = RoverScene::mount(Box::new(KeyboardInput), Some(Box::new(channel)));
        peer.send_move("up");
        scene.update(FRAME, Instant::now());
        assert_eq!(scene.target_position(), INITIAL_TARGET);
    }

    #[test]
    fn drill_key_runs_a_fixed_session() {
        let mut scene = RoverScene::mount(Box::new(KeyboardInput), None);
        let t0 = Instant::now();
        assert!(scene.handle_key(&Key::Character("d".into()), t0));
        assert!(scene.is_drilling(t0 + Duration::from_millis(1999)));
        assert!(!scene.is_drilling(t0 + DRILL_DURATION));
    }

    #[test]
    fn rover_click_emits_drill_once_per_session() {
        let (mut scene, peer) = remote_scene();
        let t0 = Instant::now();

        assert!(scene.handle_rover_click(t0));
        assert!(!scene.handle_rover_click(t0 + Duration::from_millis(10)));
        assert_eq!(peer.received(), vec![OutboundEvent::Drill]);

        scene.update(FRAME, t0 + DRILL_DURATION);
        assert!(scene.handle_rover_click(t0 + DRILL_DURATION));
        assert_eq!(peer.received(), vec![OutboundEvent::Drill]);
    }

    #[test]
    fn click_while_drill_key_session_runs_sends_nothing() {
        let (channel, peer) = LoopbackChannel::pair();
        let mut scene = RoverScene::mount(Box::new(KeyboardInput), Some(Box::new(channel)));
        let t0 = Instant::now();
        scene.handle_key(&Key::Character("d".into()), t0);
        assert!(!scene.handle_rover_click(t0 + Duration::from_millis(500)));
        assert!(peer.received().is_empty());
    }

    #[test]
    fn drill_key_and_click_work_in_remote_mode() {
        let (mut scene, peer) = remote_scene();
        let t0 = Instant::now();
        assert!(scene.handle_key(&Key::Character("d".into()), t0));
        assert!(scene.is_drilling(t0));
        assert!(peer.received().is_empty());

        scene.update(FRAME, t0 + DRILL_DURATION);
        assert!(scene.handle_rover_click(t0 + DRILL_DURATION));
        assert_eq!(peer.received(), vec![OutboundEvent::Drill]);
    }

    #[test]
    fn unmounted_scene_ignores_everything() {
        let (mut scene, peer) = remote_scene();
        let now = Instant::now();
        scene.unmount();
        assert!(!scene.is_mounted());

        peer.send_move("up");
        scene.update(FRAME, now);
        assert!(!scene.handle_key(&Key::Character("d".into()), now));
        assert!(!scene.handle_rover_click(now));
        assert_eq!(scene.target_position(), INITIAL_TARGET);
        assert!(peer.received().is_empty());
    }
}
