use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use egui::FontDefinitions;
use egui_wgpu_backend::{RenderPass, ScreenDescriptor};
use egui_winit_platform::{Platform, PlatformDescriptor};
use log::{debug, error, info};
use winit::dpi::{LogicalSize, Size};
use winit::event::{ElementState, Event, KeyboardInput, MouseButton, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{CursorIcon, Window, WindowBuilder};

use crate::bloom::Compositor;
use crate::camera::{Camera, CameraBuffer, OrbitController};
use crate::config::ViewerConfig;
use crate::dataset::Dataset;
use crate::instances::InstanceRaw;
use crate::interaction::CursorStyle;
use crate::loader::{LoadStage, LoadingManager};
use crate::model::{DrawModel, Model, Vertex};
use crate::scene::SceneState;
use crate::scheduler::{Clock, FixedStep};
use crate::shadow::ShadowMap;
use crate::skybox::{DrawSkybox, Skybox};

mod bloom;
mod camera;
mod config;
mod dataset;
mod gui;
mod instances;
mod interaction;
mod loader;
mod model;
mod panel;
mod picking;
mod scene;
mod scheduler;
mod shadow;
mod skybox;
mod texture;
mod tooltip;
mod tween;

fn create_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_targets: &[wgpu::ColorTargetState],
    depth_format: Option<wgpu::TextureFormat>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    shader: wgpu::ShaderModuleDescriptor,
    cull_mode: Option<wgpu::Face>,
    label: &str,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(&shader);

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: vertex_layouts,
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: color_targets,
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            // Setting this to anything other than Fill requires Features::NON_FILL_POLYGON_MODE
            polygon_mode: wgpu::PolygonMode::Fill,
            // Requires Features::DEPTH_CLIP_CONTROL
            unclipped_depth: false,
            // Requires Features::CONSERVATIVE_RASTERIZATION
            conservative: false,
        },
        depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

/// Colour and bloom-selection targets written by every scene pipeline.
fn scene_targets() -> [wgpu::ColorTargetState; 2] {
    let target = wgpu::ColorTargetState {
        format: bloom::SCENE_FORMAT,
        blend: Some(wgpu::BlendState::REPLACE),
        write_mask: wgpu::ColorWrites::ALL,
    };
    [target.clone(), target]
}

struct State {
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    size: winit::dpi::PhysicalSize<u32>,
    surface_config: wgpu::SurfaceConfiguration,
    window: Window,
    platform: Platform,
    egui_rpass: RenderPass,
    start_time: Instant,
    config: ViewerConfig,
    res_dir: PathBuf,
    camera: Camera,
    camera_buffer: CameraBuffer,
    material_layout: wgpu::BindGroupLayout,
    sky_texture_layout: wgpu::BindGroupLayout,
    sky_uniform_layout: wgpu::BindGroupLayout,
    part_pipeline: wgpu::RenderPipeline,
    sky_pipeline: wgpu::RenderPipeline,
    compositor: Compositor,
    shadow: ShadowMap,
    stage: LoadStage,
    dataset: Option<Dataset>,
    model: Option<Model>,
    skybox: Option<Skybox>,
    scene: Option<SceneState>,
    clock: Clock,
    fixed_step: FixedStep,
}

impl State {
    async fn new(window: Window, config: ViewerConfig, res_dir: PathBuf, dataset: Dataset) -> Result<State> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::Backends::all());
        let surface = unsafe { instance.create_surface(&window) };
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable graphics adapter")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default(),
                    label: None,
                },
                None,
            )
            .await
            .context("Couldn't open graphics device")?;

        let surface_format = surface
            .get_preferred_format(&adapter)
            .context("Surface is incompatible with the adapter")?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
        };
        surface.configure(&device, &surface_config);

        //------- EGUI

        let egui_rpass = RenderPass::new(&device, surface_format, 1);

        let platform = Platform::new(PlatformDescriptor {
            physical_width: size.width as u32,
            physical_height: size.height as u32,
            scale_factor: window.scale_factor(),
            font_definitions: FontDefinitions::default(),
            style: Default::default(),
        });
        //--------

        let camera_layout = CameraBuffer::create_bind_group_layout(&device);
        let camera = Camera::new(&config.camera, size.width as f32, size.height as f32);
        let camera_buffer = CameraBuffer::new(&device, &camera_layout, &camera);

        let material_layout = Model::create_material_layout(&device);
        let sky_texture_layout = Skybox::create_texture_layout(&device);
        let sky_uniform_layout = Skybox::create_uniform_layout(&device);
        let shadow_layout = ShadowMap::create_sample_layout(&device);

        let part_pipeline = {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Part Pipeline Layout"),
                bind_group_layouts: &[&material_layout, &camera_layout, &shadow_layout],
                push_constant_ranges: &[],
            });
            let shader = wgpu::ShaderModuleDescriptor {
                label: Some("Part Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
            };
            create_render_pipeline(
                &device,
                &layout,
                &scene_targets(),
                Some(texture::Texture::DEPTH_FORMAT),
                &[model::ModelVertex::desc(), InstanceRaw::desc()],
                shader,
                Some(wgpu::Face::Back),
                "Part Pipeline",
            )
        };
        let sky_pipeline = {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Sky Pipeline Layout"),
                bind_group_layouts: &[&sky_texture_layout, &camera_layout, &sky_uniform_layout],
                push_constant_ranges: &[],
            });
            let shader = wgpu::ShaderModuleDescriptor {
                label: Some("Sky Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("sky.wgsl").into()),
            };
            create_render_pipeline(
                &device,
                &layout,
                &scene_targets(),
                Some(texture::Texture::DEPTH_FORMAT),
                &[model::ModelVertex::desc()],
                shader,
                Some(wgpu::Face::Back),
                "Sky Pipeline",
            )
        };

        let compositor = Compositor::new(&device, &surface_config, &config.bloom);
        let shadow = ShadowMap::new(&device, &shadow_layout, &config.shadows);
        let fixed_step = FixedStep::new(config.frame_interval());

        Ok(Self {
            surface,
            device,
            queue,
            size,
            surface_config,
            window,
            platform,
            egui_rpass,
            start_time: Instant::now(),
            config,
            res_dir,
            camera,
            camera_buffer,
            material_layout,
            sky_texture_layout,
            sky_uniform_layout,
            part_pipeline,
            sky_pipeline,
            compositor,
            shadow,
            stage: LoadStage::Pending,
            dataset: Some(dataset),
            model: None,
            skybox: None,
            scene: None,
            clock: Clock::new(),
            fixed_step,
        })
    }

    fn logical_size(&self) -> [f32; 2] {
        let logical: LogicalSize<f32> = self.size.to_logical(self.window.scale_factor());
        [logical.width, logical.height]
    }

    /// Loads the model and the sky texture and builds the scene. Failures leave a partial
    /// scene behind and are only logged.
    fn load_assets(&mut self) -> Result<()> {
        let dataset = match self.dataset.take() {
            Some(dataset) => dataset,
            None => return Ok(()),
        };
        let mut manager = LoadingManager::start(2);

        let asset = loader::load_model(&self.res_dir.join(&self.config.model_file), &mut manager);
        let parts = asset
            .as_ref()
            .map(|a| a.parts(self.config.part_rotation, self.config.part_scale))
            .unwrap_or_default();

        let background = loader::load_background(
            &self.device,
            &self.queue,
            &self.res_dir.join(&self.config.background_file),
            &mut manager,
        )?;

        let controls = OrbitController::new(&self.config.camera, self.size.height as f32);
        let scene = SceneState::new(
            dataset,
            parts,
            &self.camera,
            self.logical_size(),
            controls,
            self.fixed_step.interval(),
        );

        if let Some(asset) = asset {
            match Model::upload(
                &self.device,
                &self.queue,
                &self.material_layout,
                &asset,
                &scene.registry,
            ) {
                Ok(model) => self.model = Some(model),
                Err(e) => error!("Couldn't upload model: {:?}", e),
            }
        }
        self.skybox = Some(Skybox::new(
            &self.device,
            &self.sky_texture_layout,
            &self.sky_uniform_layout,
            background,
            scene.rig.skybox_rotation,
        ));
        info!(
            "Scene ready: {} drones, {} parts, {} failed loads",
            scene.registry.drone_count(),
            scene.registry.part_count(),
            manager.failed()
        );
        self.scene = Some(scene);
        Ok(())
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.surface_config.width = new_size.width;
            self.surface_config.height = new_size.height;
            self.surface.configure(&self.device, &self.surface_config);
            self.compositor.resize(&self.device, &self.surface_config);
            self.camera
                .update_aspect(new_size.width as f32, new_size.height as f32);
            if let Some(scene) = self.scene.as_mut() {
                scene.controls.set_viewport_height(new_size.height as f32);
            }
        }
    }

    fn input(&mut self, event: &WindowEvent) -> bool {
        let over_gui = self.platform.context().wants_pointer_input();
        let scene = match self.scene.as_mut() {
            Some(scene) => scene,
            None => return false,
        };
        if scene.controls.process_events(event) {
            return true;
        }

        match event {
            WindowEvent::CursorMoved { position, .. } => {
                if over_gui {
                    scene.pointer_moved(None);
                } else {
                    let ray = self.camera.screen_ray(
                        position.x as f32,
                        position.y as f32,
                        self.size.width as f32,
                        self.size.height as f32,
                    );
                    scene.hover_at(ray);
                }
                self.window.set_cursor_icon(match scene.cursor {
                    CursorStyle::Default => CursorIcon::Default,
                    CursorStyle::Pointer => CursorIcon::Hand,
                });
                false
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } if !over_gui => {
                if scene.click() {
                    self.window.set_cursor_icon(CursorIcon::Default);
                }
                true
            }
            _ => false,
        }
    }

    /// Runs the logic ticks due since the last frame. Returns how many ran.
    fn update(&mut self) -> u32 {
        let elapsed = self.clock.delta();
        let scene = match self.scene.as_mut() {
            Some(scene) => scene,
            None => return 0,
        };
        let ticks = self.fixed_step.run(elapsed, |time| scene.tick(time));
        if ticks == 0 {
            return 0;
        }

        self.camera.follow(&scene.rig);
        self.camera_buffer.write(&self.queue, &self.camera);
        if let Some(skybox) = &self.skybox {
            skybox.set_rotation(&self.queue, scene.rig.skybox_rotation);
        }
        if let Some(model) = &self.model {
            model.write_instances(&self.queue, &scene.registry);
        }
        ticks
    }

    /// Advances the loading stages, then renders once per frame in which a tick ran.
    fn frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        match self.stage {
            LoadStage::Pending => {
                self.stage = LoadStage::Loading;
                self.render()
            }
            LoadStage::Loading => {
                if let Err(e) = self.load_assets() {
                    error!("{:?}", e);
                }
                self.stage = LoadStage::Ready;
                // loading time isn't simulation time
                self.clock.reset();
                self.render()
            }
            LoadStage::Ready => {
                if self.update() > 0 {
                    self.render()
                } else {
                    Ok(())
                }
            }
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        {
            let view = output
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Render Encoder"),
                });

            self.shadow.render(&mut encoder, self.model.as_ref());

            {
                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Scene Pass"),
                    color_attachments: &[
                        wgpu::RenderPassColorAttachment {
                            view: &self.compositor.color.view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(bloom::linear_color(bloom::BACKGROUND_COLOR)),
                                store: true,
                            },
                        },
                        wgpu::RenderPassColorAttachment {
                            view: &self.compositor.selection.view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                store: true,
                            },
                        },
                    ],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &self.compositor.depth.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: true,
                        }),
                        stencil_ops: None,
                    }),
                });

                if let Some(skybox) = &self.skybox {
                    render_pass.set_pipeline(&self.sky_pipeline);
                    render_pass.draw_skybox(skybox, &self.camera_buffer.bind_group);
                }
                if let Some(model) = &self.model {
                    render_pass.set_pipeline(&self.part_pipeline);
                    render_pass.set_bind_group(2, &self.shadow.bind_group, &[]);
                    render_pass.draw_model_instanced(model, &self.camera_buffer.bind_group);
                }
            }

            self.compositor.composite(&mut encoder, &view);
            self.queue.submit(std::iter::once(encoder.finish()));

            self.platform
                .update_time(self.start_time.elapsed().as_secs_f64());
            self.platform.begin_frame();

            let response = gui::draw(&self.platform.context(), self.scene.as_ref());

            let (_output, paint_commands) = self.platform.end_frame(Some(&self.window));
            let paint_jobs = self.platform.context().tessellate(paint_commands);

            if response.back_clicked {
                if let Some(scene) = self.scene.as_mut() {
                    scene.back();
                }
            }

            let mut egui_encoder =
                self.device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("egui encoder"),
                    });

            let screen_descriptor = ScreenDescriptor {
                physical_width: self.surface_config.width,
                physical_height: self.surface_config.height,
                scale_factor: self.window.scale_factor() as f32,
            };
            self.egui_rpass.update_texture(
                &self.device,
                &self.queue,
                &self.platform.context().font_image(),
            );
            self.egui_rpass
                .update_user_textures(&self.device, &self.queue);
            self.egui_rpass.update_buffers(
                &self.device,
                &self.queue,
                &paint_jobs,
                &screen_descriptor,
            );
            if let Err(e) = self.egui_rpass.execute(
                &mut egui_encoder,
                &view,
                &paint_jobs,
                &screen_descriptor,
                None,
            ) {
                error!("egui render failed: {:?}", e);
            }

            self.queue.submit(std::iter::once(egui_encoder.finish()));
        }
        output.present();

        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let res_dir = config::res_dir();
    let config = ViewerConfig::load(&res_dir)?;
    let dataset = Dataset::load(res_dir.join(&config.dataset_file))?;
    info!("Loaded telemetry for {} drones", dataset.count());

    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title(&config.title)
        .with_inner_size(Size::from(LogicalSize {
            width: config.width,
            height: config.height,
        }))
        .build(&event_loop)
        .context("Can't open window")?;

    let mut state = pollster::block_on(State::new(window, config, res_dir, dataset))?;
    event_loop.run(move |event, _, control_flow| {
        state.platform.handle_event(&event);
        *control_flow = ControlFlow::Poll;
        match event {
            Event::WindowEvent {
                ref event,
                window_id,
            } if window_id == state.window.id() => {
                if !state.input(event) {
                    match event {
                        WindowEvent::CloseRequested
                        | WindowEvent::KeyboardInput {
                            input:
                                KeyboardInput {
                                    state: ElementState::Pressed,
                                    virtual_keycode: Some(VirtualKeyCode::Escape),
                                    ..
                                },
                            ..
                        } => *control_flow = ControlFlow::Exit,
                        WindowEvent::Resized(physical_size) => {
                            debug!(
                                "Resized window! New size: {} {}",
                                physical_size.width, physical_size.height
                            );
                            state.resize(*physical_size);
                        }
                        WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                            state.resize(**new_inner_size);
                        }
                        _ => {}
                    }
                }
            }
            Event::RedrawRequested(window_id) if window_id == state.window.id() => {
                match state.frame() {
                    Ok(_) => {}
                    // Reconfigure the surface if lost
                    Err(wgpu::SurfaceError::Lost) => state.resize(state.size),
                    // The system is out of memory, we should probably quit
                    Err(wgpu::SurfaceError::OutOfMemory) => *control_flow = ControlFlow::Exit,
                    // All other errors (Outdated, Timeout) should be resolved by the next frame
                    Err(e) => error!("{:?}", e),
                }
            }
            Event::MainEventsCleared => {
                // RedrawRequested will only trigger once, unless we manually
                // request it.
                state.window.request_redraw();
            }
            _ => {}
        }
    });
}
