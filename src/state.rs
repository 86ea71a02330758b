use crate::camera::ViewState;
use crate::controls::ParameterPanel;
use crate::gesture::{GestureRouter, Pointer, PointerEvent, MOUSE_POINTER_ID};
use crate::integrator::render_image;
use crate::render::Render;
use crate::{PanelDefaults, ParamsError};
use cgmath::Vector2;
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use winit::keyboard::*;
use winit::{
  dpi::PhysicalPosition,
  event::{ElementState, Event, KeyEvent, MouseButton, MouseScrollDelta, Touch, TouchPhase, WindowEvent},
  event_loop::{EventLoop, EventLoopWindowTarget},
  window::Window,
};

#[derive(Debug, thiserror::Error)]
pub enum InitError {
  #[error("failed to create event loop: {0}")]
  EventLoop(#[from] winit::error::EventLoopError),
  #[error("failed to create window: {0}")]
  Window(#[from] winit::error::OsError),
  #[error("failed to create surface: {0}")]
  Surface(#[from] wgpu::CreateSurfaceError),
  #[error("no compatible graphics adapter")]
  NoAdapter,
  #[error("failed to open device: {0}")]
  Device(#[from] wgpu::RequestDeviceError),
  #[error("surface is not supported by the adapter")]
  UnsupportedSurface,
  #[error(transparent)]
  Params(#[from] ParamsError),
}

#[derive(Debug, thiserror::Error)]
pub enum HeadlessError {
  #[error(transparent)]
  Params(#[from] ParamsError),
  #[error("failed to write image: {0}")]
  Image(#[from] image::ImageError),
}

struct EventLoopWrapper {
  event_loop: EventLoop<()>,
  window: Arc<Window>,
}

impl EventLoopWrapper {
  pub fn new(title: &str) -> Result<Self, InitError> {
    let event_loop = EventLoop::new()?;
    let mut builder = winit::window::WindowBuilder::new();
    builder = builder.with_title(title);
    let window = Arc::new(builder.build(&event_loop)?);

    Ok(Self { event_loop, window })
  }
}

struct SurfaceWrapper {
  surface: wgpu::Surface<'static>,
  config: wgpu::SurfaceConfiguration,
}

impl SurfaceWrapper {
  fn new(context: &State, surface: wgpu::Surface<'static>, window: &Window) -> Result<Self, InitError> {
    let window_size = window.inner_size();
    let width = window_size.width.max(1);
    let height = window_size.height.max(1);
    let mut config = surface
      .get_default_config(&context.adapter, width, height)
      .ok_or(InitError::UnsupportedSurface)?;
    // colors are written as computed, without sRGB encoding
    let view_format = config.format.remove_srgb_suffix();
    config.view_formats.push(view_format);
    surface.configure(&context.device, &config);
    Ok(Self { surface, config })
  }

  fn resize(&mut self, context: &State, width: u32, height: u32) {
    self.config.width = width.max(1);
    self.config.height = height.max(1);
    self.surface.configure(&context.device, &self.config);
  }

  fn acquire(&mut self, context: &State) -> Option<wgpu::SurfaceTexture> {
    match self.surface.get_current_texture() {
      Ok(frame) => Some(frame),
      Err(wgpu::SurfaceError::Timeout) => self.surface.get_current_texture().ok(),
      Err(err @ (wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost | wgpu::SurfaceError::OutOfMemory)) => {
        warn!("surface {err}, reconfiguring");
        self.surface.configure(&context.device, &self.config);
        self.surface.get_current_texture().ok()
      }
    }
  }

  fn size(&self) -> (u32, u32) {
    (self.config.width, self.config.height)
  }

  fn config(&self) -> &wgpu::SurfaceConfiguration {
    &self.config
  }
}

struct State {
  adapter: wgpu::Adapter,
  device: wgpu::Device,
  queue: wgpu::Queue,
}

impl State {
  async fn init(window: Arc<Window>) -> Result<(Self, SurfaceWrapper), InitError> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
      #[cfg(not(target_arch = "wasm32"))]
      backends: wgpu::Backends::PRIMARY,
      ..Default::default()
    });
    let surface = instance.create_surface(window.clone())?;

    let adapter = instance
      .request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: Some(&surface),
        force_fallback_adapter: false,
      })
      .await
      .ok_or(InitError::NoAdapter)?;
    info!("using adapter {:?}", adapter.get_info().name);

    let (device, queue) = adapter
      .request_device(
        &wgpu::DeviceDescriptor {
          label: None,
          required_features: wgpu::Features::empty(),
          required_limits: wgpu::Limits::default(),
          memory_hints: Default::default(),
        },
        None,
      )
      .await?;

    let context = Self {
      adapter,
      device,
      queue,
    };
    let surface = SurfaceWrapper::new(&context, surface, &window)?;
    Ok((context, surface))
  }
}

/// Everything the event handlers touch. Handlers run one at a time on the
/// event loop thread.
struct App {
  window: Arc<Window>,
  context: State,
  surface: SurfaceWrapper,
  render: Render,
  view: ViewState,
  router: GestureRouter,
  panel: ParameterPanel,
  cursor: Vector2<f32>,
}

impl App {
  fn handle(&mut self, event: WindowEvent, target: &EventLoopWindowTarget<()>) {
    let now = Instant::now();
    if self.panel.process_events(&event) {
      self.apply_params(now);
      return;
    }

    let redraw = match event {
      WindowEvent::CloseRequested
      | WindowEvent::KeyboardInput {
        event:
          KeyEvent {
            state: ElementState::Pressed,
            physical_key: PhysicalKey::Code(KeyCode::Escape),
            ..
          },
        ..
      } => {
        target.exit();
        false
      }
      WindowEvent::Resized(size) => {
        self.surface.resize(&self.context, size.width, size.height);
        let (width, height) = self.surface.size();
        self.panel.set_canvas(width, height);
        self.router.on_resize(width, height, now)
      }
      WindowEvent::CursorMoved { position, .. } => {
        self.cursor = to_vector(position);
        let event = PointerEvent::Move(self.mouse());
        self.router.on_pointer(&mut self.view, event, now)
      }
      WindowEvent::MouseInput {
        state,
        button: MouseButton::Left,
        ..
      } => {
        let event = match state {
          ElementState::Pressed => PointerEvent::Down(self.mouse()),
          ElementState::Released => PointerEvent::Up(self.mouse()),
        };
        self.router.on_pointer(&mut self.view, event, now)
      }
      WindowEvent::MouseWheel { delta, .. } => {
        let y = match delta {
          MouseScrollDelta::LineDelta(_, y) => y,
          MouseScrollDelta::PixelDelta(position) => position.y as f32,
        };
        if y == 0.0 {
          false
        } else {
          self.router.on_wheel(&mut self.view, self.cursor, y > 0.0, now)
        }
      }
      WindowEvent::Touch(Touch {
        phase, location, id, ..
      }) => {
        let pointer = Pointer {
          id,
          position: to_vector(location),
        };
        let event = match phase {
          TouchPhase::Started => PointerEvent::Down(pointer),
          TouchPhase::Moved => PointerEvent::Move(pointer),
          TouchPhase::Ended => PointerEvent::Up(pointer),
          TouchPhase::Cancelled => PointerEvent::Cancel(pointer),
        };
        self.router.on_pointer(&mut self.view, event, now)
      }
      WindowEvent::RedrawRequested => {
        self.draw();
        false
      }
      _ => false,
    };

    if redraw {
      self.window.request_redraw();
    }
  }

  fn apply_params(&mut self, now: Instant) {
    match self.panel.params() {
      Ok(params) => {
        self.render.update_params(&self.context.device, params);
        if self.router.request_redraw(now) {
          self.window.request_redraw();
        }
      }
      Err(err) => error!("keeping previous parameters: {err}"),
    }
  }

  fn draw(&mut self) {
    let Some(frame) = self.surface.acquire(&self.context) else {
      warn!("no surface texture, skipping frame");
      return;
    };
    let view = frame.texture.create_view(&wgpu::TextureViewDescriptor {
      format: Some(self.surface.config().view_formats[0]),
      ..wgpu::TextureViewDescriptor::default()
    });
    self.render.render(
      &view,
      &self.context.device,
      &self.context.queue,
      self.surface.size(),
      &self.view,
    );
    frame.present();
  }

  fn mouse(&self) -> Pointer {
    Pointer {
      id: MOUSE_POINTER_ID,
      position: self.cursor,
    }
  }
}

fn to_vector(position: PhysicalPosition<f64>) -> Vector2<f32> {
  Vector2::new(position.x as f32, position.y as f32)
}

async fn start(defaults: PanelDefaults, seed: u64) -> Result<(), InitError> {
  let window_loop = EventLoopWrapper::new("Planet Paths")?;
  let (context, surface) = State::init(window_loop.window.clone()).await?;
  let (width, height) = surface.size();

  let mut panel = ParameterPanel::init(defaults, width, height, seed);
  let params = panel.params()?;
  info!(
    "starting with {} planets, {} iterations, dt {}",
    params.planet_count(),
    params.max_iterations,
    params.time_step
  );
  let render = Render::init(surface.config(), &context.device, params);

  let mut app = App {
    window: window_loop.window.clone(),
    context,
    surface,
    render,
    view: ViewState::default(),
    router: GestureRouter::new(width, height),
    panel,
    cursor: Vector2::new(0.0, 0.0),
  };
  app.window.request_redraw();

  let window_id = window_loop.window.id();
  window_loop.event_loop.run(move |event, target| {
    if let Event::WindowEvent { event, window_id: id } = event {
      if id == window_id {
        app.handle(event, target);
      }
    }
  })?;
  Ok(())
}

pub fn run(defaults: PanelDefaults, seed: u64) -> Result<(), InitError> {
  pollster::block_on(start(defaults, seed))
}

/// Renders a single frame without a window and writes it as PNG.
pub fn run_headless(
  defaults: PanelDefaults,
  seed: u64,
  width: u32,
  height: u32,
  view: ViewState,
  output: &Path,
) -> Result<(), HeadlessError> {
  let (width, height) = (width.max(1), height.max(1));
  let params = ParameterPanel::init(defaults, width, height, seed).params()?;
  let started = Instant::now();
  let image = render_image(width, height, &view, &params);
  info!(
    "rendered {width}x{height} with {} planets in {:?}",
    params.planet_count(),
    started.elapsed()
  );
  image.save(output)?;
  info!("saved {}", output.display());
  Ok(())
}
