use std::sync::Arc;
use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;

use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod camera;
pub mod config;
pub mod geometry;
pub mod input;
pub mod physics;
pub mod renderer;
pub mod scene;
pub mod simulation;

use crate::camera::{CameraRig, CaptureGrant};
use crate::config::DemoConfig;
use crate::input::key_code_name;
use crate::renderer::Renderer;
use crate::simulation::{FrameClock, Simulation};

#[cfg(not(target_arch = "wasm32"))]
const CAPTURE_GRANT: CaptureGrant = CaptureGrant::Immediate;
#[cfg(target_arch = "wasm32")]
const CAPTURE_GRANT: CaptureGrant = CaptureGrant::Deferred;

/// Application context: built once at startup and owns everything the frame
/// loop and the event handlers touch.
pub struct State {
    renderer: Renderer,
    simulation: Simulation,
    rig: CameraRig,
    clock: FrameClock,
    pub window: Arc<Window>,
}

impl State {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let config = DemoConfig::default();

        let mut rng = StdRng::from_entropy();
        let simulation = Simulation::new(&config, &mut rng)?;

        let ground = simulation.ground().context("Ground plane missing from the physics world")?;
        let renderer = Renderer::new(window.clone(), &config, ground).await?;

        let mut rig = CameraRig::new(&config);
        let viewport = renderer.viewport();
        rig.camera.update_aspect(viewport.width, viewport.height);

        Ok(Self {
            renderer,
            simulation,
            rig,
            clock: FrameClock::new(),
            window,
        })
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode, is_pressed: bool) {
        self.rig.on_key(&key_code_name(code), is_pressed);

        if let (KeyCode::Escape, true) = (code, is_pressed) {
            if self.rig.look.is_locked() {
                self.release_capture();
            } else if cfg!(not(target_arch = "wasm32")) {
                event_loop.exit();
            }
        }
    }

    /// Ask the host for exclusive pointer capture. A refusal just leaves the
    /// look controls unlocked.
    fn request_capture(&mut self) {
        let grabbed = self
            .window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined))
            .map(|()| CAPTURE_GRANT);

        if self.rig.on_capture_result(grabbed) {
            self.window.set_cursor_visible(false);
        }
    }

    /// The browser can refuse or end pointer lock without telling winit, so
    /// the document is the source of truth for the capture state.
    #[cfg(target_arch = "wasm32")]
    fn sync_pointer_lock(&mut self) {
        let host_locked = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.pointer_lock_element())
            .is_some();
        if self.rig.sync_capture(host_locked) && !host_locked {
            self.window.set_cursor_visible(true);
        }
    }

    fn release_capture(&mut self) {
        if let Err(e) = self.window.set_cursor_grab(CursorGrabMode::None) {
            log::debug!("Pointer release failed: {}", e);
        }
        self.window.set_cursor_visible(true);
        self.rig.look.unlock();
        log::debug!("Pointer released");
    }

    fn focus_lost(&mut self) {
        if self.rig.on_focus_lost() {
            self.release_capture();
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.renderer.resize(width, height);
        let viewport = self.renderer.viewport();
        self.rig.camera.update_aspect(viewport.width, viewport.height);
    }

    pub fn update(&mut self) {
        let delta = self.clock.tick();
        #[cfg(target_arch = "wasm32")]
        self.sync_pointer_lock();
        self.simulation.advance(delta);
        self.rig.update(delta);
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let rendered = self.renderer.render(&self.rig.camera, self.simulation.objects());
        self.window.request_redraw();
        rendered
    }
}

pub struct App {
    #[cfg(target_arch = "wasm32")]
    proxy: Option<winit::event_loop::EventLoopProxy<State>>,
    state: Option<State>,
}

impl App {
    pub fn new(#[cfg(target_arch = "wasm32")] event_loop: &EventLoop<State>) -> Self {
        #[cfg(target_arch = "wasm32")]
        let proxy = Some(event_loop.create_proxy());
        Self {
            state: None,
            #[cfg(target_arch = "wasm32")]
            proxy,
        }
    }
}

impl ApplicationHandler<State> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("shapefall");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Unable to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            // Off the web we can block on the async setup with pollster
            match pollster::block_on(State::new(window)) {
                Ok(state) => self.state = Some(state),
                Err(e) => {
                    log::error!("Setup failed: {:#}", e);
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            // Run the future asynchronously and use the
            // proxy to send the results to the event loop
            if let Some(proxy) = self.proxy.take() {
                wasm_bindgen_futures::spawn_local(async move {
                    let state = State::new(window).await.unwrap_throw();
                    assert!(proxy.send_event(state).is_ok())
                });
            }
        }
    }

    #[allow(unused_mut)]
    fn user_event(&mut self, _event_loop: &ActiveEventLoop, mut event: State) {
        // This is where proxy.send_event() ends up
        #[cfg(target_arch = "wasm32")]
        {
            event.window.request_redraw();
            event.resize(
                event.window.inner_size().width,
                event.window.inner_size().height,
            );
        }
        self.state = Some(event);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                state.update();
                match state.render() {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e)
                    }
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                if !state.rig.look.is_locked() {
                    state.request_capture();
                }
            }
            WindowEvent::Focused(false) => state.focus_lost(),
            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state: key_state,
                    ..
                },
                ..
            } => state.handle_key(event_loop, code, key_state.is_pressed()),
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let (Some(state), DeviceEvent::MouseMotion { delta: (dx, dy) }) = (&mut self.state, event) {
            state.rig.look.on_mouse_move(dx as f32, dy as f32);
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        env_logger::init();
    }
    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop = EventLoop::with_user_event().build()?;
    let mut app = App::new(
        #[cfg(target_arch = "wasm32")]
        &event_loop,
    );
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), wasm_bindgen::JsValue> {
    console_error_panic_hook::set_once();
    run().unwrap_throw();

    Ok(())
}
