use crate::camera::ViewState;
use crate::shader::{program_source, ProgramKey};
use crate::{Parameters, Planet};
use log::{debug, error, info, warn};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Display;
use wgpu::{util::DeviceExt, PipelineCompilationOptions};

#[rustfmt::skip]
const FULL_SCREEN_QUAD: [f32; 12] = [
  -1.0, -1.0,
   1.0, -1.0,
  -1.0,  1.0,
  -1.0,  1.0,
   1.0, -1.0,
   1.0,  1.0,
];

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
  #[error("program for {key:?} failed to compile: {message}")]
  Compile { key: ProgramKey, message: String },
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniform {
  resolution: [f32; 2],
  center: [f32; 2],
  zoom: f32,
  color_shift: f32,
  brightness_factor: f32,
  _padding: f32,
}

impl FrameUniform {
  pub fn new(width: u32, height: u32, view: &ViewState, params: &Parameters) -> Self {
    Self {
      resolution: [width as f32, height as f32],
      center: view.offset.into(),
      zoom: view.scale(),
      color_shift: params.color_shift,
      brightness_factor: params.brightness_factor,
      _padding: 0.0,
    }
  }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanetArrays {
  pub positions: Vec<[f32; 2]>,
  pub radii: Vec<f32>,
  pub masses: Vec<f32>,
  /// rgb plus padding, matching the 16 byte stride of `vec4<f32>`.
  pub colors: Vec<[f32; 4]>,
}

impl PlanetArrays {
  pub fn pack(planets: &[Planet]) -> Self {
    let mut arrays = Self::default();
    for planet in planets {
      let color = planet.color();
      arrays.positions.push(planet.position().into());
      arrays.radii.push(planet.radius());
      arrays.masses.push(planet.mass());
      arrays.colors.push([color.r, color.g, color.b, 1.0]);
    }
    arrays
  }
}

#[derive(Debug)]
pub struct ProgramCache<P> {
  programs: HashMap<ProgramKey, P>,
  current: Option<ProgramKey>,
}

impl<P> Default for ProgramCache<P> {
  fn default() -> Self {
    Self {
      programs: HashMap::new(),
      current: None,
    }
  }
}

impl<P> ProgramCache<P> {
  pub fn current_key(&self) -> Option<ProgramKey> {
    self.current
  }

  pub fn current(&self) -> Option<&P> {
    self.current.and_then(|key| self.programs.get(&key))
  }

  pub fn cached(&self) -> usize {
    self.programs.len()
  }

  /// Planet count baked into the bound program, which is the array length
  /// every planet buffer must match.
  pub fn bound_planet_count(&self) -> Option<usize> {
    self.current.map(|key| key.planet_count as usize)
  }

  /// On failure the previously current program stays bound.
  pub fn select<E>(&mut self, key: ProgramKey, compile: impl FnOnce(&ProgramKey) -> Result<P, E>) -> Result<bool, E> {
    if self.current == Some(key) {
      return Ok(false);
    }
    if !self.programs.contains_key(&key) {
      let program = compile(&key)?;
      self.programs.insert(key, program);
    }
    self.current = Some(key);
    Ok(true)
  }
}

/// Binds the program for `next` and returns the record to draw with. When the
/// program fails to build, `current` is kept so the uploaded arrays keep
/// matching the program that is still bound.
fn settle<P, E: Display>(
  programs: &mut ProgramCache<P>,
  current: Parameters,
  next: Parameters,
  compile: impl FnOnce(&ProgramKey) -> Result<P, E>,
) -> Parameters {
  let key = ProgramKey::from(&next);
  match programs.select(key, compile) {
    Ok(true) => info!("bound program {key:?} ({} cached)", programs.cached()),
    Ok(false) => debug!("program {key:?} unchanged"),
    Err(err) => {
      error!("{err}, keeping previous parameters");
      return current;
    }
  }
  next
}

struct PlanetBuffers {
  positions: wgpu::Buffer,
  radii: wgpu::Buffer,
  masses: wgpu::Buffer,
  colors: wgpu::Buffer,
  bind_group: wgpu::BindGroup,
  count: usize,
}

pub struct Render {
  frame_buffer: wgpu::Buffer,
  quad_buffer: wgpu::Buffer,
  bind_group_layout: wgpu::BindGroupLayout,
  pipeline_layout: wgpu::PipelineLayout,
  target_format: wgpu::TextureFormat,
  programs: ProgramCache<wgpu::RenderPipeline>,
  planet_buffers: Option<PlanetBuffers>,
  params: Parameters,
}

impl Render {
  pub fn init(config: &wgpu::SurfaceConfiguration, device: &wgpu::Device, params: Parameters) -> Self {
    let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
      label: Some("Frame Uniform Buffer"),
      size: std::mem::size_of::<FrameUniform>() as u64,
      usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
      mapped_at_creation: false,
    });
    let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Full Screen Quad"),
      contents: bytemuck::cast_slice(&FULL_SCREEN_QUAD),
      usage: wgpu::BufferUsages::VERTEX,
    });

    let storage_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
      binding,
      visibility: wgpu::ShaderStages::FRAGMENT,
      ty: wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Storage { read_only: true },
        has_dynamic_offset: false,
        min_binding_size: None,
      },
      count: None,
    };
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      entries: &[
        wgpu::BindGroupLayoutEntry {
          binding: 0,
          visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
          ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<FrameUniform>() as _),
          },
          count: None,
        },
        storage_entry(1),
        storage_entry(2),
        storage_entry(3),
        storage_entry(4),
      ],
      label: Some("planet_bind_group_layout"),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
      label: Some("trajectory"),
      bind_group_layouts: &[&bind_group_layout],
      push_constant_ranges: &[],
    });

    let mut render = Render {
      frame_buffer,
      quad_buffer,
      bind_group_layout,
      pipeline_layout,
      target_format: config.view_formats.first().copied().unwrap_or(config.format),
      programs: ProgramCache::default(),
      planet_buffers: None,
      params: params.clone(),
    };
    render.update_params(device, params);
    render
  }

  /// Validation errors are returned instead of reaching the device's
  /// uncaptured error handler.
  pub fn compile(&self, device: &wgpu::Device, key: &ProgramKey) -> Result<wgpu::RenderPipeline, PipelineError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
      label: Some("trajectory program"),
      source: wgpu::ShaderSource::Wgsl(Cow::Owned(program_source(key))),
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
      label: Some("Trajectory Pipeline"),
      layout: Some(&self.pipeline_layout),
      vertex: wgpu::VertexState {
        module: &module,
        entry_point: "vs_main",
        compilation_options: PipelineCompilationOptions::default(),
        buffers: &[wgpu::VertexBufferLayout {
          array_stride: 2 * 4,
          step_mode: wgpu::VertexStepMode::Vertex,
          attributes: &wgpu::vertex_attr_array![0 => Float32x2],
        }],
      },
      fragment: Some(wgpu::FragmentState {
        module: &module,
        entry_point: "fs_main",
        compilation_options: PipelineCompilationOptions::default(),
        targets: &[Some(self.target_format.into())],
      }),
      primitive: wgpu::PrimitiveState::default(),
      depth_stencil: None,
      multisample: wgpu::MultisampleState::default(),
      multiview: None,
      cache: None,
    });
    match pollster::block_on(device.pop_error_scope()) {
      Some(err) => Err(PipelineError::Compile {
        key: *key,
        message: err.to_string(),
      }),
      None => Ok(pipeline),
    }
  }

  /// The program is only rebuilt when one of the baked constants changed.
  pub fn update_params(&mut self, device: &wgpu::Device, params: Parameters) {
    let mut programs = std::mem::take(&mut self.programs);
    let params = settle(&mut programs, self.params.clone(), params, |key| {
      self.compile(device, key)
    });
    self.programs = programs;

    let Some(count) = self.programs.bound_planet_count() else {
      return;
    };
    if self.planet_buffers.as_ref().map(|b| b.count) != Some(count) {
      self.planet_buffers = Some(self.create_planet_buffers(device, count));
    }
    self.params = params;
  }

  fn create_planet_buffers(&self, device: &wgpu::Device, count: usize) -> PlanetBuffers {
    let storage = |label: &str, stride: usize| {
      device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (count * stride) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
      })
    };
    let positions = storage("Planet Positions", 8);
    let radii = storage("Planet Radii", 4);
    let masses = storage("Planet Masses", 4);
    let colors = storage("Planet Colors", 16);
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      layout: &self.bind_group_layout,
      entries: &[
        wgpu::BindGroupEntry {
          binding: 0,
          resource: self.frame_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
          binding: 1,
          resource: positions.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
          binding: 2,
          resource: radii.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
          binding: 3,
          resource: masses.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
          binding: 4,
          resource: colors.as_entire_binding(),
        },
      ],
      label: Some("planet_bind_group"),
    });
    PlanetBuffers {
      positions,
      radii,
      masses,
      colors,
      bind_group,
      count,
    }
  }

  pub fn render(
    &mut self,
    view: &wgpu::TextureView,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    size: (u32, u32),
    view_state: &ViewState,
  ) {
    let (Some(pipeline), Some(buffers)) = (self.programs.current(), self.planet_buffers.as_ref()) else {
      return;
    };
    if self.programs.bound_planet_count() != Some(buffers.count) || self.params.planet_count() != buffers.count {
      warn!("planet buffers do not match the bound program, skipping frame");
      return;
    }

    let frame = FrameUniform::new(size.0, size.1, view_state, &self.params);
    queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame));
    let arrays = PlanetArrays::pack(self.params.planets());
    queue.write_buffer(&buffers.positions, 0, bytemuck::cast_slice(&arrays.positions));
    queue.write_buffer(&buffers.radii, 0, bytemuck::cast_slice(&arrays.radii));
    queue.write_buffer(&buffers.masses, 0, bytemuck::cast_slice(&arrays.masses));
    queue.write_buffer(&buffers.colors, 0, bytemuck::cast_slice(&arrays.colors));

    let color_attachments = [Some(wgpu::RenderPassColorAttachment {
      view,
      resolve_target: None,
      ops: wgpu::Operations {
        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
        store: wgpu::StoreOp::Store,
      },
    })];
    let render_pass_descriptor = wgpu::RenderPassDescriptor {
      label: None,
      color_attachments: &color_attachments,
      depth_stencil_attachment: None,
      timestamp_writes: None,
      occlusion_query_set: None,
    };
    let mut command_encoder =
      device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    {
      let mut rpass = command_encoder.begin_render_pass(&render_pass_descriptor);
      rpass.set_pipeline(pipeline);
      rpass.set_bind_group(0, &buffers.bind_group, &[]);
      rpass.set_vertex_buffer(0, self.quad_buffer.slice(..));
      rpass.draw(0..6, 0..1);
    }
    queue.submit(Some(command_encoder.finish()));
  }
}
