//! mokhatt-widget: desktop host for the mokhatt chat widget.
//!
//! Opens a window standing in for the embedding page and renders the widget
//! (launcher and chat panel) into it with vello. Visitor messages are POSTed
//! to the configured webhook; replies are revealed character by character.

mod text_layout;
mod widget_view;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};
use vello::util::{RenderContext, RenderSurface};
use vello::{AaConfig, Renderer, RendererOptions, Scene};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalPosition;
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, ModifiersState, NamedKey};
use winit::window::Window;

use vello::wgpu;

use mokhatt::config::{self, ConfigError, RawConfig, WidgetConfig};
use mokhatt::paths::MokhattPaths;
use mokhatt::transport::HttpTransport;
use mokhatt::visitor::{self, FileVisitorStore, MemoryVisitorStore, VisitorStore};
use mokhatt::{Widget, WidgetHandle, logging, spawn_widget};

use widget_view::{Hit, WidgetView};

/// Floating chat widget backed by a webhook
#[derive(Parser, Debug)]
#[command(name = "mokhatt-widget", version, about = "Floating chat widget backed by a webhook")]
struct Args {
    /// Configuration file (defaults to ~/.config/mokhatt/widget.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Webhook URL that receives visitor messages
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Panel title
    #[arg(long)]
    title: Option<String>,

    /// Text revealed the first time the panel opens
    #[arg(long)]
    welcome: Option<String>,

    /// Anchor side: "left" or "right"
    #[arg(long)]
    position: Option<String>,

    /// Accent color as hex, e.g. "#0f5b3e"
    #[arg(long)]
    color: Option<String>,

    /// Value reported as meta.page
    #[arg(long)]
    page_url: Option<String>,

    /// Open the panel at startup
    #[arg(long)]
    open: bool,
}

impl Args {
    /// The command-line configuration layer.
    fn overrides(&self) -> RawConfig {
        RawConfig {
            endpoint: self.endpoint.clone(),
            title: self.title.clone(),
            primary_color: self.color.clone(),
            position: self.position.clone(),
            welcome_message: self.welcome.clone(),
            page_url: self.page_url.clone(),
            ..RawConfig::default()
        }
    }
}

#[derive(Debug)]
enum RenderState {
    Active {
        surface: Box<RenderSurface<'static>>,
        valid_surface: bool,
        window: Arc<Window>,
    },
    Suspended(Option<Arc<Window>>),
}

struct App {
    context: RenderContext,
    renderers: Vec<Option<Renderer>>,
    state: RenderState,
    scene: Scene,
    start_time: Instant,
    widget: Arc<Widget>,
    handle: WidgetHandle,
    view: WidgetView,
    cursor: PhysicalPosition<f64>,
    modifiers: ModifiersState,
    clipboard: Option<arboard::Clipboard>,
}

impl App {
    /// Whether keystrokes should reach the text field.
    fn typing_enabled(&self) -> bool {
        let controls = self.widget.controls();
        self.widget.is_open() && controls.is_focused() && !controls.is_locked()
    }

    fn paste(&mut self) {
        let Some(clipboard) = self.clipboard.as_mut() else {
            return;
        };
        match clipboard.get_text() {
            // Single-line field.
            Ok(text) => {
                let line = text.replace(['\r', '\n'], " ");
                self.widget.controls().insert_str(&line);
            }
            Err(e) => debug!(target: "host", "clipboard read failed: {e}"),
        }
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        if event.state != ElementState::Pressed {
            return;
        }
        match &event.logical_key {
            Key::Named(NamedKey::Escape) => self.handle.escape(),
            Key::Named(NamedKey::Enter) if self.typing_enabled() => self.handle.submit_draft(),
            Key::Named(NamedKey::Backspace) if self.typing_enabled() => {
                self.widget.controls().backspace();
            }
            Key::Character(c)
                if (self.modifiers.control_key() || self.modifiers.super_key())
                    && c.eq_ignore_ascii_case("v") =>
            {
                if self.typing_enabled() {
                    self.paste();
                }
            }
            _ if self.typing_enabled()
                && !self.modifiers.control_key()
                && !self.modifiers.super_key() =>
            {
                if let Some(text) = &event.text {
                    let printable: String = text.chars().filter(|c| !c.is_control()).collect();
                    if !printable.is_empty() {
                        self.widget.controls().insert_str(&printable);
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_click(&mut self) {
        let open = self.widget.is_open();
        match self.view.hit(self.cursor.x, self.cursor.y, open) {
            Hit::Launcher => self.handle.toggle(),
            Hit::Close => self.handle.close(),
            Hit::Send => {
                if !self.widget.controls().is_locked() {
                    self.handle.submit_draft();
                }
            }
            Hit::Input => self.widget.controls().focus(),
            Hit::Panel => {}
            Hit::Outside => self.widget.controls().blur(),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let RenderState::Suspended(cached_window) = &mut self.state else {
            return;
        };

        let window = match cached_window.take() {
            Some(window) => window,
            None => match create_window(event_loop) {
                Ok(window) => window,
                Err(e) => {
                    error!(target: "host", "{e:#}");
                    event_loop.exit();
                    return;
                }
            },
        };

        let size = window.inner_size();
        let surface_future = self.context.create_surface(
            window.clone(),
            size.width,
            size.height,
            wgpu::PresentMode::AutoVsync,
        );
        let surface = match pollster::block_on(surface_future) {
            Ok(surface) => surface,
            Err(e) => {
                error!(target: "host", "failed to create surface: {e}");
                event_loop.exit();
                return;
            }
        };

        self.renderers
            .resize_with(self.context.devices.len(), || None);
        if self.renderers[surface.dev_id].is_none() {
            match create_renderer(&self.context, &surface) {
                Ok(renderer) => self.renderers[surface.dev_id] = Some(renderer),
                Err(e) => {
                    error!(target: "host", "{e:#}");
                    event_loop.exit();
                    return;
                }
            }
        }

        self.state = RenderState::Active {
            surface: Box::new(surface),
            valid_surface: true,
            window,
        };
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        if let RenderState::Active { window, .. } = &self.state {
            self.state = RenderState::Suspended(Some(window.clone()));
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let window = match &self.state {
            RenderState::Active { window, .. } if window.id() == window_id => window.clone(),
            _ => return,
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = modifiers.state();
            }

            WindowEvent::KeyboardInput { event, .. } => self.handle_key(&event),

            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = position;
            }

            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.handle_click(),

            WindowEvent::MouseWheel { delta, .. } => {
                if self.widget.is_open() {
                    let lines = match delta {
                        MouseScrollDelta::LineDelta(_, y) => y as f64,
                        MouseScrollDelta::PixelDelta(pos) => pos.y / 20.0,
                    };
                    self.view.scroll_lines(lines);
                }
            }

            WindowEvent::Resized(size) => {
                if let RenderState::Active {
                    surface,
                    valid_surface,
                    ..
                } = &mut self.state
                {
                    if size.width != 0 && size.height != 0 {
                        self.context
                            .resize_surface(surface, size.width, size.height);
                        *valid_surface = true;
                    } else {
                        *valid_surface = false;
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                self.redraw();
                // Reveals and typing dots animate continuously.
                window.request_redraw();
            }

            _ => {}
        }
    }
}

impl App {
    fn redraw(&mut self) {
        let RenderState::Active {
            surface,
            valid_surface,
            ..
        } = &mut self.state
        else {
            return;
        };
        if !*valid_surface {
            return;
        }

        self.scene.reset();
        let width = surface.config.width as f64;
        let height = surface.config.height as f64;
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let snapshot = self.widget.snapshot();
        self.view
            .render(&mut self.scene, width, height, &snapshot, elapsed);

        let device_handle = &self.context.devices[surface.dev_id];
        let Some(renderer) = self.renderers[surface.dev_id].as_mut() else {
            return;
        };

        if let Err(e) = renderer.render_to_texture(
            &device_handle.device,
            &device_handle.queue,
            &self.scene,
            &surface.target_view,
            &vello::RenderParams {
                base_color: widget_view::PAGE_BG,
                width: surface.config.width,
                height: surface.config.height,
                antialiasing_method: AaConfig::Msaa16,
            },
        ) {
            error!(target: "host", "failed to render: {e}");
            return;
        }

        let surface_texture = match surface.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(e) => {
                warn!(target: "host", "failed to get surface texture: {e}");
                return;
            }
        };

        let mut encoder =
            device_handle
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Surface Blit"),
                });
        surface.blitter.copy(
            &device_handle.device,
            &mut encoder,
            &surface.target_view,
            &surface_texture
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
        );
        device_handle.queue.submit([encoder.finish()]);
        surface_texture.present();
        if let Err(e) = device_handle.device.poll(wgpu::PollType::Poll) {
            debug!(target: "host", "device poll failed: {e}");
        }
    }
}

fn load_config(args: &Args, paths: Option<&MokhattPaths>) -> Result<WidgetConfig, ConfigError> {
    match (&args.config, paths) {
        (Some(path), _) => config::load_file(path)?.merge(args.overrides()).resolve(),
        (None, Some(paths)) => {
            let path = paths.config_file();
            config::ensure_default_file(&path);
            config::load_layered(&path, args.overrides())
        }
        (None, None) => args.overrides().resolve(),
    }
}

fn visitor_store(paths: Option<&MokhattPaths>) -> Box<dyn VisitorStore> {
    match paths {
        Some(paths) => Box::new(FileVisitorStore::new(paths.visitor_store())),
        None => {
            warn!(target: "visitor", "no home directory, visitor id will not persist");
            Box::new(MemoryVisitorStore::default())
        }
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let paths = MokhattPaths::resolve();
    let log_guard = logging::init(paths.as_ref().map(|p| p.logs.as_path()));
    if let Some(paths) = &paths {
        if let Err(e) = paths.ensure() {
            warn!(target: "host", "failed to create app directories: {e}");
        }
    }

    // The widget does not mount without a valid configuration.
    let config = match load_config(&args, paths.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!(target: "config", "widget not mounted: {e}");
            // Flush the file log before exiting.
            drop(log_guard);
            return Ok(ExitCode::from(2));
        }
    };
    debug!(target: "config", header = %config.header_markup(), "configuration resolved");

    let visitor_id = visitor::get_or_create(visitor_store(paths.as_ref()).as_ref());
    info!(target: "host", version = env!("CARGO_PKG_VERSION"), visitor_id = %visitor_id, "starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create Tokio runtime")?;

    let transport = HttpTransport::from_config(&config).context("failed to build HTTP client")?;
    let view = WidgetView::new(&config);
    let widget = Arc::new(Widget::new(config, visitor_id, Arc::new(transport)));
    let handle = spawn_widget(runtime.handle(), Arc::clone(&widget));
    if args.open {
        handle.open();
    }

    let clipboard = match arboard::Clipboard::new() {
        Ok(clipboard) => Some(clipboard),
        Err(e) => {
            warn!(target: "host", "clipboard unavailable: {e}");
            None
        }
    };

    let mut app = App {
        context: RenderContext::new(),
        renderers: vec![],
        state: RenderState::Suspended(None),
        scene: Scene::new(),
        start_time: Instant::now(),
        widget,
        handle,
        view,
        cursor: PhysicalPosition::new(0.0, 0.0),
        modifiers: ModifiersState::empty(),
        clipboard,
    };

    let event_loop = EventLoop::new()?;
    event_loop.run_app(&mut app).context("event loop failed")?;

    runtime.shutdown_timeout(std::time::Duration::from_secs(1));

    drop(log_guard);
    Ok(ExitCode::SUCCESS)
}

fn create_window(event_loop: &ActiveEventLoop) -> Result<Arc<Window>> {
    let attr = Window::default_attributes()
        .with_title("mokhatt")
        .with_inner_size(winit::dpi::LogicalSize::new(1024, 760));
    let window = event_loop
        .create_window(attr)
        .context("failed to create window")?;
    Ok(Arc::new(window))
}

fn create_renderer(render_cx: &RenderContext, surface: &RenderSurface<'_>) -> Result<Renderer> {
    Renderer::new(
        &render_cx.devices[surface.dev_id].device,
        RendererOptions::default(),
    )
    .map_err(|e| anyhow::anyhow!("failed to create renderer: {e}"))
}
