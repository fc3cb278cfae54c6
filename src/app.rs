use anyhow::{anyhow, bail, Context, Result};
use pixels::{Pixels, SurfaceTexture};
use rdk_core::{Frame, FrameError, FrameSink};
use rdk_experiment::{
    session_seed, InputSource, Key, KeyPress, MonitorConfig, Session, SessionConfig, SessionError,
    SessionState,
};
use rdk_render::{SkiaRenderer, TextCache, Viewport};
use rdk_timing::{HighPrecisionTimer, Timer};
use std::sync::Arc;
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key as WinitKey, NamedKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Fullscreen, Window, WindowId},
};

/// Blank frames presented to measure the refresh rate.
const CALIBRATION_FRAMES: usize = 120;
/// Leading frames left out of the measurement while the compositor settles.
const WARMUP_FRAMES: usize = 10;
/// Longest a key wait blocks on the event loop before checking again.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Window state owned by the event loop callbacks.
struct Host {
    monitor: MonitorConfig,
    quit_keys: Vec<Key>,
    clock: HighPrecisionTimer,
    text: Option<TextCache>,

    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    refresh_rate: Option<f64>,

    pending: Vec<KeyPress>,
    abort: bool,
    failure: Option<anyhow::Error>,
}

impl Host {
    fn new(config: &SessionConfig, text: Option<TextCache>) -> Self {
        Self {
            monitor: config.monitor.clone(),
            quit_keys: config.keys.quit.clone(),
            clock: HighPrecisionTimer::new(),
            text,
            window: None,
            pixels: None,
            renderer: None,
            refresh_rate: None,
            pending: Vec::new(),
            abort: false,
            failure: None,
        }
    }

    /// Hands over a backend failure raised by the last events, then any abort.
    fn status(&mut self) -> Result<(), FrameError> {
        if let Some(e) = self.failure.take() {
            return Err(FrameError::Backend(e));
        }
        if self.abort {
            return Err(FrameError::Aborted);
        }
        Ok(())
    }

    fn take_keys(&mut self, filter: &[Key]) -> Vec<KeyPress> {
        self.pending
            .drain(..)
            .filter(|press| press.key.matches(filter))
            .collect()
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("no monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let [width, height] = self.monitor.resolution;
        let mut attributes = Window::default_attributes()
            .with_title("Random dot motion")
            .with_resizable(false);
        attributes = if self.monitor.fullscreen {
            attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor))))
        } else {
            attributes.with_inner_size(PhysicalSize::new(width, height))
        };

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        let ppd = self.monitor.pixels_per_degree(size.width);
        log::info!(
            "display {}x{} px, scale factor {:.2}, {:.1} px/deg",
            size.width,
            size.height,
            window.scale_factor(),
            ppd
        );
        if let Some(rate) = self.refresh_rate {
            log::info!("monitor reports {rate:.1} Hz");
        }

        let surface_texture = SurfaceTexture::new(size.width, size.height, Arc::clone(&window));
        self.pixels = Some(
            Pixels::new(size.width, size.height, surface_texture)
                .context("creating the pixel buffer")?,
        );
        self.renderer = Some(SkiaRenderer::new(
            Viewport::new(size.width, size.height, ppd),
            self.text.take(),
        )?);

        window.set_cursor_visible(false);
        self.window = Some(window);
        Ok(())
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) -> Result<()> {
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }
        if let Some(pixels) = &mut self.pixels {
            pixels.resize_surface(size.width, size.height)?;
            pixels.resize_buffer(size.width, size.height)?;
        }
        if let Some(renderer) = &mut self.renderer {
            let ppd = self.monitor.pixels_per_degree(size.width);
            renderer.resize(Viewport::new(size.width, size.height, ppd))?;
        }
        log::info!("display resized to {}x{}", size.width, size.height);
        Ok(())
    }

    fn press(&mut self, key: Key) {
        if self.quit_keys.contains(&key) {
            log::info!("quit key `{key}` pressed");
            self.abort = true;
        }
        self.pending.push(KeyPress {
            key,
            timestamp: self.clock.seconds(),
        });
    }
}

fn map_key(key: &WinitKey) -> Option<Key> {
    match key {
        WinitKey::Named(NamedKey::Space) => Some(Key::Space),
        WinitKey::Named(NamedKey::Escape) => Some(Key::Escape),
        WinitKey::Named(NamedKey::Enter) => Some(Key::Enter),
        WinitKey::Character(s) => {
            let mut chars = s.chars().flat_map(char::to_lowercase);
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Key::Char(c)),
                _ => None,
            }
        }
        _ => None,
    }
}

impl ApplicationHandler for Host {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                self.failure = Some(e.context("opening the stimulus window"));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("window closed");
                self.abort = true;
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                if let Some(key) = map_key(&event.logical_key) {
                    self.press(key);
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button,
                ..
            } => match button {
                MouseButton::Left => self.press(Key::MouseLeft),
                MouseButton::Right => self.press(Key::MouseRight),
                _ => {}
            },
            WindowEvent::Resized(size) => {
                if let Err(e) = self.handle_resize(size) {
                    self.failure = Some(e);
                }
            }
            _ => {}
        }
    }
}

/// The stimulus window as the session sees it: every `present_frame`
/// drains pending window events, then rasterises and presents.
pub struct Display {
    event_loop: EventLoop<()>,
    host: Host,
    frame_rate: f64,
    frame_timer: HighPrecisionTimer,
    last_present: Option<u64>,
}

impl Display {
    pub fn open(config: &SessionConfig) -> Result<Self> {
        let text = match &config.font_path {
            Some(path) => match TextCache::from_file(path) {
                Ok(cache) => Some(cache),
                Err(e) => {
                    log::warn!("{e:#}; text screens will be blank");
                    None
                }
            },
            None => {
                log::warn!("no font_path configured; text screens will be blank");
                None
            }
        };

        let mut event_loop = EventLoop::new()?;
        let mut host = Host::new(config, text);

        while host.renderer.is_none() {
            let status = event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut host);
            if let Some(e) = host.failure.take() {
                return Err(e);
            }
            if let PumpStatus::Exit(code) = status {
                bail!("event loop exited with code {code} before the window opened");
            }
        }

        let frame_rate = host.refresh_rate.unwrap_or(60.0);
        Ok(Self {
            event_loop,
            host,
            frame_rate,
            frame_timer: HighPrecisionTimer::with_capacity(CALIBRATION_FRAMES),
            last_present: None,
        })
    }

    /// Dispatches window events, blocking up to `timeout` for the first one.
    fn pump_events(&mut self, timeout: Duration) {
        if let PumpStatus::Exit(_) = self.event_loop.pump_app_events(Some(timeout), &mut self.host)
        {
            self.host.abort = true;
        }
    }

    fn pump(&mut self, timeout: Duration) -> Result<(), FrameError> {
        self.pump_events(timeout);
        self.host.status()
    }

    /// Presents blank frames and returns the measured refresh rate, falling
    /// back to the monitor's reported rate.
    pub fn calibrate(&mut self, frames: usize) -> Result<f64, FrameError> {
        log::info!("measuring the frame rate over {frames} frames");
        let blank = Frame::blank();
        for _ in 0..WARMUP_FRAMES {
            self.present_frame(&blank)?;
        }
        self.frame_timer.reset_frames();
        for _ in 0..frames {
            self.present_frame(&blank)?;
        }

        let stats = self.frame_timer.calibration_stats();
        match stats.frame_rate() {
            Some(rate) => {
                log::info!(
                    "measured {rate:.2} Hz (jitter {:.3} ms, min {:.3} ms, max {:.3} ms)",
                    stats.jitter_ns / 1e6,
                    stats.min_frame_time_ns / 1e6,
                    stats.max_frame_time_ns / 1e6
                );
                self.frame_rate = rate;
            }
            None => log::warn!(
                "frame rate measurement failed, assuming {:.2} Hz",
                self.frame_rate
            ),
        }
        Ok(self.frame_rate)
    }

    pub fn set_frame_rate(&mut self, rate: f64) {
        self.frame_rate = rate;
    }

    fn log_render_stats(&self) {
        if let Some(renderer) = &self.host.renderer {
            let stats = renderer.render_stats();
            log::debug!(
                "rasterising took {:.3} ms on average (max {:.3} ms)",
                stats.average_frame_time_ns / 1e6,
                stats.max_frame_time_ns / 1e6
            );
        }
    }
}

impl FrameSink for Display {
    fn present_frame(&mut self, frame: &Frame<'_>) -> Result<(), FrameError> {
        self.pump(Duration::ZERO)?;
        let (Some(pixels), Some(renderer)) = (&mut self.host.pixels, &mut self.host.renderer)
        else {
            return Err(FrameError::Backend(anyhow!("the stimulus window is gone")));
        };
        renderer.render_frame(frame, pixels.frame_mut())?;
        pixels
            .render()
            .map_err(|e| FrameError::Backend(anyhow::Error::from(e).context("presenting frame")))?;

        let now = self.frame_timer.now();
        if let Some(last) = self.last_present.replace(now) {
            self.frame_timer
                .record_frame(Duration::from_nanos(now.saturating_sub(last)));
        }
        Ok(())
    }

    fn actual_frame_rate(&self) -> f64 {
        self.frame_rate
    }
}

impl InputSource for Display {
    fn now(&self) -> f64 {
        self.host.clock.seconds()
    }

    fn poll_keys(&mut self, filter: &[Key]) -> Vec<KeyPress> {
        // failures and aborts stay pending for the next wait or frame
        self.pump_events(Duration::ZERO);
        self.host.take_keys(filter)
    }

    fn abort_requested(&self) -> bool {
        self.host.abort
    }

    fn wait_event(&mut self) -> Result<(), SessionError> {
        self.pump(POLL_INTERVAL)?;
        Ok(())
    }
}

impl Drop for Display {
    fn drop(&mut self) {
        if let Some(window) = &self.host.window {
            window.set_cursor_visible(true);
        }
        log::debug!("display resources released");
    }
}

fn run_session(config: &SessionConfig, display: &mut Display) -> Result<SessionState, SessionError> {
    let frame_rate = match config.stimulus.frame_rate {
        Some(rate) => {
            log::info!("using the configured frame rate of {rate} Hz");
            rate
        }
        None => display.calibrate(CALIBRATION_FRAMES)?,
    };
    display.set_frame_rate(frame_rate);
    Session::new(config, &mut *display, session_seed(config))?.run()
}

/// Opens the window, runs one full session and closes the window again. A
/// participant abort is a normal exit.
pub fn run(config: &SessionConfig) -> Result<()> {
    let mut display = Display::open(config)?;
    let result = run_session(config, &mut display);
    display.log_render_stats();
    match result {
        Ok(state) => {
            log::info!(
                "session complete: {} trials, training bonus {:.2}",
                state.trials_completed,
                state.bonus
            );
            Ok(())
        }
        Err(e) if e.is_abort() => {
            log::info!("session aborted; finished trials are saved");
            Ok(())
        }
        Err(e) => Err(e).context("session failed"),
    }
}
