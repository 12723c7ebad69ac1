use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId};

use crate::error::FatalError;
use crate::renderer::Renderer;

#[derive(Default)]
pub enum AppState {
    #[default]
    Running,
    FatalError(FatalError),
}

#[derive(Default)]
pub struct App {
    window: Option<Window>,
    renderer: Option<Renderer>,
    pub app_state: AppState,
}

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: FatalError) {
        self.renderer = None;
        self.app_state = AppState::FatalError(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let window = match event_loop.create_window(
            Window::default_attributes()
                .with_title("Billboard")
                .with_inner_size(PhysicalSize::new(WIDTH, HEIGHT)),
        ) {
            Ok(w) => w,
            Err(e) => {
                self.fail(event_loop, FatalError::setup(e.into()));
                return;
            }
        };

        let renderer = match Renderer::new(&window) {
            Ok(r) => r,
            Err(e) => {
                self.fail(event_loop, e);
                return;
            }
        };

        window.request_redraw();
        self.window = Some(window);
        self.renderer = Some(renderer);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::debug!("The close button was pressed; stopping");
                // Drop the renderer before the window; its Drop waits
                // for the device to go idle.
                self.renderer = None;
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let result = self.renderer.as_mut().map(Renderer::draw_frame);
                if let Some(Err(e)) = result {
                    self.fail(event_loop, e);
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => (),
        }
    }
}
