mod camera;
mod camera_controller;
mod channel;
mod config;
mod drill;
mod input;
mod model;
mod picking;
mod renderer;
mod rover;
mod scene;
mod spring;
mod world;

use channel::{Channel, ChannelError, LoopbackChannel, LoopbackPeer, SocketChannel, SocketIoChannel};
use clap::Parser;
use config::{Args, Transport};
use renderer::State;
use scene::RoverScene;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

struct App {
    args: Args,
    window: Option<Arc<Window>>,
    state: Option<State>,
    scene: Option<RoverScene>,
    offline_backend: Option<LoopbackPeer>,
    last_frame: Instant,
}

impl App {
    fn new(args: Args) -> Self {
        Self {
            args,
            window: None,
            state: None,
            scene: None,
            offline_backend: None,
            last_frame: Instant::now(),
        }
    }

    fn open_channel(&mut self) -> Option<Box<dyn Channel>> {
        if self.args.offline {
            let (channel, backend) = LoopbackChannel::pair();
            self.offline_backend = Some(backend);
            return Some(Box::new(channel));
        }
        let connected: Result<Box<dyn Channel>, ChannelError> = match self.args.transport {
            Transport::SocketIo => SocketIoChannel::connect(&self.args.endpoint)
                .map(|channel| Box::new(channel) as Box<dyn Channel>),
            Transport::Lines => SocketChannel::connect(&self.args.endpoint)
                .map(|channel| Box::new(channel) as Box<dyn Channel>),
        };
        match connected {
            Ok(channel) => Some(channel),
            Err(e) => {
                log::error!("rover channel unavailable at {}: {e}", self.args.endpoint);
                None
            }
        }
    }

    fn mount_scene(&mut self) {
        let channel = self.open_channel();
        self.scene = Some(RoverScene::mount(self.args.input.adapter(), channel));
        self.last_frame = Instant::now();
    }

    fn teardown(&mut self) {
        if let Some(mut scene) = self.scene.take() {
            scene.unmount();
        }
        self.offline_backend = None;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let window_attributes = Window::default_attributes().with_title("Mars Rover");
            let window = match event_loop.create_window(window_attributes) {
                Ok(window) => Arc::new(window),
                Err(e) => {
                    log::error!("Failed to create window: {e}");
                    event_loop.exit();
                    return;
                }
            };
            self.window = Some(window.clone());

            match pollster::block_on(State::new(window, &self.args)) {
                Ok(state) => self.state = Some(state),
                Err(e) => {
                    log::error!("Failed to create state: {e:?}");
                    event_loop.exit();
                    return;
                }
            }
            self.mount_scene();
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let Some(state) = self.state.as_mut() {
            if let DeviceEvent::MouseMotion { delta } = event {
                state.mouse_motion(delta);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let window = match self.window.as_ref() {
            Some(w) => w,
            None => return,
        };
        let state = match self.state.as_mut() {
            Some(s) => s,
            None => return,
        };

        if id != window.id() {
            return;
        }

        if !state.input(&event) {
            match event {
                WindowEvent::CloseRequested
                | WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            state: ElementState::Pressed,
                            logical_key: Key::Named(NamedKey::Escape),
                            ..
                        },
                    ..
                } => {
                    self.teardown();
                    event_loop.exit();
                }
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            state: ElementState::Pressed,
                            logical_key,
                            ..
                        },
                    ..
                } => {
                    if let Some(scene) = self.scene.as_mut() {
                        scene.handle_key(&logical_key, Instant::now());
                    }
                }
                WindowEvent::Resized(physical_size) => {
                    state.resize(physical_size);
                    window.request_redraw();
                }
                WindowEvent::RedrawRequested => {
                    match state.render() {
                        Ok(_) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            state.resize(state.size())
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            log::error!("GPU out of memory");
                            self.teardown();
                            event_loop.exit();
                        }
                        Err(e) => log::warn!("{e:?}"),
                    }
                }
                _ => {}
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let dt = now - self.last_frame;
        self.last_frame = now;

        if let (Some(state), Some(scene)) = (self.state.as_mut(), self.scene.as_mut()) {
            let rover_position = scene.update(dt, now);
            if let Some(cursor) = state.take_click() {
                if state.hits_rover(cursor) {
                    scene.handle_rover_click(now);
                }
            }
            state.update(rover_position, scene.is_drilling(now));
        }
        if let Some(backend) = self.offline_backend.as_ref() {
            for event in backend.received() {
                log::info!("offline backend received {event:?}");
            }
        }
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.teardown();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    log::info!("starting with {:?} input over {:?}", args.input, args.transport);

    let event_loop = EventLoop::new()?;
    let mut app = App::new(args);
    event_loop.run_app(&mut app)?;
    Ok(())
}
