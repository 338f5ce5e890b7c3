//! Libretro core loader
//!
//! Opens a libretro core with `libloading`, wires its callbacks to
//! process-global state, and runs `retro_run` on a dedicated thread while
//! emulation is started. Libretro callbacks carry no user data, so the state
//! they touch lives in statics, which matches the one-core-per-process rule
//! enforced by [`crate::CoreSlot`].

use crate::interface::{ButtonCode, CoreControls, CoreInterface, SurfaceHandle};
use crate::video::{convert_to_rgba, required_len, PixelFormat, VideoOutput};
use libloading::Library;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use se_core::NativeError;
use std::ffi::{c_char, c_uint, c_void, CString};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const RETRO_API_VERSION: c_uint = 1;
const RETRO_DEVICE_JOYPAD: c_uint = 1;

const RETRO_ENVIRONMENT_GET_CAN_DUPE: c_uint = 3;
const RETRO_ENVIRONMENT_GET_SYSTEM_DIRECTORY: c_uint = 9;
const RETRO_ENVIRONMENT_SET_PIXEL_FORMAT: c_uint = 10;

/// Size of the positional button table read by the core
pub const MAX_BUTTONS: usize = 32;

#[repr(C)]
struct RetroGameInfo {
    path: *const c_char,
    data: *const c_void,
    size: usize,
    meta: *const c_char,
}

type EnvironmentFn = unsafe extern "C" fn(cmd: c_uint, data: *mut c_void) -> bool;
type VideoRefreshFn =
    unsafe extern "C" fn(data: *const c_void, width: c_uint, height: c_uint, pitch: usize);
type AudioSampleFn = unsafe extern "C" fn(left: i16, right: i16);
type AudioSampleBatchFn = unsafe extern "C" fn(data: *const i16, frames: usize) -> usize;
type InputPollFn = unsafe extern "C" fn();
type InputStateFn =
    unsafe extern "C" fn(port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16;

/// Entry points resolved from the core library
#[derive(Clone, Copy)]
struct EntryPoints {
    set_environment: unsafe extern "C" fn(EnvironmentFn),
    set_video_refresh: unsafe extern "C" fn(VideoRefreshFn),
    set_audio_sample: unsafe extern "C" fn(AudioSampleFn),
    set_audio_sample_batch: unsafe extern "C" fn(AudioSampleBatchFn),
    set_input_poll: unsafe extern "C" fn(InputPollFn),
    set_input_state: unsafe extern "C" fn(InputStateFn),
    init: unsafe extern "C" fn(),
    deinit: unsafe extern "C" fn(),
    api_version: unsafe extern "C" fn() -> c_uint,
    load_game: unsafe extern "C" fn(*const RetroGameInfo) -> bool,
    unload_game: unsafe extern "C" fn(),
    run: unsafe extern "C" fn(),
}

/// State reachable from the C callbacks
struct CallbackState {
    system_dir: Option<CString>,
    pixel_format: PixelFormat,
    /// Set while a surface is attached; frames are dropped otherwise
    video: Option<Arc<VideoOutput>>,
}

static CALLBACKS: Lazy<Mutex<CallbackState>> = Lazy::new(|| {
    Mutex::new(CallbackState {
        system_dir: None,
        pixel_format: PixelFormat::default(),
        video: None,
    })
});

static BUTTONS: [AtomicBool; MAX_BUTTONS] = [const { AtomicBool::new(false) }; MAX_BUTTONS];

fn release_all_buttons() {
    for button in &BUTTONS {
        button.store(false, Ordering::Relaxed);
    }
}

extern "C" fn environment_cb(cmd: c_uint, data: *mut c_void) -> bool {
    if data.is_null() {
        return false;
    }

    match cmd {
        RETRO_ENVIRONMENT_GET_CAN_DUPE => {
            unsafe { *(data as *mut bool) = true };
            true
        }
        RETRO_ENVIRONMENT_GET_SYSTEM_DIRECTORY => {
            let state = CALLBACKS.lock();
            let dir = state
                .system_dir
                .as_ref()
                .map_or(std::ptr::null(), |d| d.as_ptr());
            unsafe { *(data as *mut *const c_char) = dir };
            tracing::debug!("env GET_SYSTEM_DIRECTORY -> {:?}", state.system_dir);
            true
        }
        RETRO_ENVIRONMENT_SET_PIXEL_FORMAT => {
            let raw = unsafe { *(data as *const c_uint) };
            match PixelFormat::from_raw(raw) {
                Some(format) => {
                    CALLBACKS.lock().pixel_format = format;
                    tracing::info!("env SET_PIXEL_FORMAT -> {:?}", format);
                    true
                }
                None => {
                    tracing::warn!("env SET_PIXEL_FORMAT: unknown format {}", raw);
                    false
                }
            }
        }
        _ => false,
    }
}

extern "C" fn video_refresh_cb(data: *const c_void, width: c_uint, height: c_uint, pitch: usize) {
    // NULL data means the core duplicated the previous frame
    if data.is_null() {
        return;
    }

    let (format, output) = {
        let state = CALLBACKS.lock();
        match &state.video {
            Some(output) => (state.pixel_format, Arc::clone(output)),
            None => return,
        }
    };

    let len = required_len(width, height, pitch, format);
    let bytes = unsafe { std::slice::from_raw_parts(data as *const u8, len) };
    if let Some(rgba) = convert_to_rgba(bytes, width, height, pitch, format) {
        output.publish(width, height, rgba);
    }
}

extern "C" fn audio_sample_cb(_left: i16, _right: i16) {}

extern "C" fn audio_sample_batch_cb(_data: *const i16, frames: usize) -> usize {
    frames
}

extern "C" fn input_poll_cb() {}

extern "C" fn input_state_cb(port: c_uint, device: c_uint, _index: c_uint, id: c_uint) -> i16 {
    if port != 0 || device != RETRO_DEVICE_JOYPAD {
        return 0;
    }
    BUTTONS
        .get(id as usize)
        .map_or(0, |b| b.load(Ordering::Relaxed) as i16)
}

fn resolve<T: Copy>(library: &Library, path: &Path, name: &'static str) -> Result<T, NativeError> {
    let symbol = format!("{name}\0");
    let found = unsafe { library.get::<T>(symbol.as_bytes()) };
    match found {
        Ok(sym) => {
            tracing::debug!("Resolved {}", name);
            Ok(*sym)
        }
        Err(_) => Err(NativeError::MissingSymbol {
            path: path.to_path_buf(),
            symbol: name,
        }),
    }
}

struct LoadedCore {
    path: PathBuf,
    entry: EntryPoints,
    // Dropped last: the entry points above point into it
    _library: Library,
}

impl LoadedCore {
    fn open(path: &Path) -> Result<Self, NativeError> {
        let library = unsafe { Library::new(path) }.map_err(|e| NativeError::Library {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let entry = EntryPoints {
            set_environment: resolve(&library, path, "retro_set_environment")?,
            set_video_refresh: resolve(&library, path, "retro_set_video_refresh")?,
            set_audio_sample: resolve(&library, path, "retro_set_audio_sample")?,
            set_audio_sample_batch: resolve(&library, path, "retro_set_audio_sample_batch")?,
            set_input_poll: resolve(&library, path, "retro_set_input_poll")?,
            set_input_state: resolve(&library, path, "retro_set_input_state")?,
            init: resolve(&library, path, "retro_init")?,
            deinit: resolve(&library, path, "retro_deinit")?,
            api_version: resolve(&library, path, "retro_api_version")?,
            load_game: resolve(&library, path, "retro_load_game")?,
            unload_game: resolve(&library, path, "retro_unload_game")?,
            run: resolve(&library, path, "retro_run")?,
        };

        Ok(Self {
            path: path.to_path_buf(),
            entry,
            _library: library,
        })
    }
}

/// Fire-and-forget controls backed by atomics
pub struct LibretroControls {
    fast_forward: AtomicBool,
    rewind_requested: AtomicU64,
}

impl LibretroControls {
    fn new() -> Self {
        Self {
            fast_forward: AtomicBool::new(false),
            rewind_requested: AtomicU64::new(0),
        }
    }

    pub fn fast_forward(&self) -> bool {
        self.fast_forward.load(Ordering::Relaxed)
    }

    /// Total frames of rewind requested so far
    pub fn rewind_requested(&self) -> u64 {
        self.rewind_requested.load(Ordering::Relaxed)
    }
}

impl CoreControls for LibretroControls {
    fn set_button_state(&self, code: ButtonCode, pressed: bool) {
        if let Some(button) = BUTTONS.get(code.index()) {
            button.store(pressed, Ordering::Relaxed);
        }
    }

    fn set_fast_forward(&self, enabled: bool) {
        self.fast_forward.store(enabled, Ordering::Relaxed);
        tracing::info!("Fast forward {}", if enabled { "on" } else { "off" });
    }

    fn rewind_frames(&self, frames: u32) {
        self.rewind_requested.fetch_add(frames as u64, Ordering::Relaxed);
        tracing::debug!("Rewind of {} frames requested", frames);
    }
}

struct EmulationThread {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

fn emulation_loop(
    run: unsafe extern "C" fn(),
    running: Arc<AtomicBool>,
    controls: Arc<LibretroControls>,
    frame_time: Option<Duration>,
) {
    tracing::info!("Emulation thread started");
    let mut deadline = Instant::now();

    while running.load(Ordering::Acquire) {
        unsafe { run() };

        let Some(frame_time) = frame_time else {
            continue;
        };
        if controls.fast_forward() {
            deadline = Instant::now();
            continue;
        }

        deadline += frame_time;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        } else {
            deadline = now;
        }
    }

    tracing::info!("Emulation thread stopped");
}

/// Native core backed by a libretro shared library
pub struct LibretroCore {
    loaded: Option<LoadedCore>,
    game_loaded: bool,
    surface: Option<SurfaceHandle>,
    thread: Option<EmulationThread>,
    video: Arc<VideoOutput>,
    controls: Arc<LibretroControls>,
    frame_time: Option<Duration>,
}

impl LibretroCore {
    /// Create an idle loader pacing emulation at `frame_limit` frames per
    /// second (0 disables pacing)
    pub fn new(frame_limit: u32) -> Self {
        Self {
            loaded: None,
            game_loaded: false,
            surface: None,
            thread: None,
            video: Arc::new(VideoOutput::new()),
            controls: Arc::new(LibretroControls::new()),
            frame_time: (frame_limit > 0)
                .then(|| Duration::from_secs_f64(1.0 / frame_limit as f64)),
        }
    }

    /// Frames produced by the core while a surface is attached
    pub fn video(&self) -> Arc<VideoOutput> {
        Arc::clone(&self.video)
    }

    pub fn loaded_path(&self) -> Option<&Path> {
        self.loaded.as_ref().map(|c| c.path.as_path())
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }
}

impl CoreInterface for LibretroCore {
    fn init(&mut self, data_dir: &Path) -> bool {
        tracing::info!("Libretro host initialized, data dir {}", data_dir.display());
        true
    }

    fn set_system_dir(&mut self, dir: &Path) {
        match CString::new(dir.to_string_lossy().into_owned()) {
            Ok(dir_c) => {
                tracing::info!("System directory: {}", dir.display());
                CALLBACKS.lock().system_dir = Some(dir_c);
            }
            Err(_) => tracing::warn!("System directory contains NUL: {}", dir.display()),
        }
    }

    fn load_core(&mut self, path: &Path) -> bool {
        if self.loaded.is_some() {
            self.unload_core();
        }

        tracing::info!("Opening core: {}", path.display());
        let core = match LoadedCore::open(path) {
            Ok(core) => core,
            Err(e) => {
                tracing::error!("{}", e);
                return false;
            }
        };

        let entry = core.entry;
        unsafe {
            let version = (entry.api_version)();
            if version != RETRO_API_VERSION {
                tracing::warn!("Core reports libretro API version {}", version);
            }

            (entry.set_environment)(environment_cb);
            (entry.set_video_refresh)(video_refresh_cb);
            (entry.set_audio_sample)(audio_sample_cb);
            (entry.set_audio_sample_batch)(audio_sample_batch_cb);
            (entry.set_input_poll)(input_poll_cb);
            (entry.set_input_state)(input_state_cb);
            (entry.init)();
        }

        self.loaded = Some(core);
        tracing::info!("Core initialized");
        true
    }

    fn attach_surface(&mut self, surface: SurfaceHandle) -> bool {
        CALLBACKS.lock().video = Some(Arc::clone(&self.video));
        self.surface = Some(surface);
        tracing::info!("Surface attached: {}", surface);
        true
    }

    fn load_game(&mut self, path: &Path) -> bool {
        let Some(core) = &self.loaded else {
            tracing::error!("loadGame without a core");
            return false;
        };

        let Ok(path_c) = CString::new(path.to_string_lossy().into_owned()) else {
            tracing::error!("Game path contains NUL: {}", path.display());
            return false;
        };

        if self.game_loaded {
            unsafe { (core.entry.unload_game)() };
            self.game_loaded = false;
        }

        let info = RetroGameInfo {
            path: path_c.as_ptr(),
            data: std::ptr::null(),
            size: 0,
            meta: std::ptr::null(),
        };
        let ok = unsafe { (core.entry.load_game)(&info) };
        tracing::info!("retro_load_game({}) -> {}", path.display(), ok);
        self.game_loaded = ok;
        ok
    }

    fn start_emulation(&mut self) -> bool {
        let Some(core) = &self.loaded else {
            return false;
        };
        if self.thread.is_some() {
            return true;
        }

        let running = Arc::new(AtomicBool::new(true));
        let run = core.entry.run;
        let controls = Arc::clone(&self.controls);
        let frame_time = self.frame_time;
        let flag = Arc::clone(&running);

        match thread::Builder::new()
            .name("emulation".to_string())
            .spawn(move || emulation_loop(run, flag, controls, frame_time))
        {
            Ok(handle) => {
                self.thread = Some(EmulationThread { running, handle });
                true
            }
            Err(e) => {
                tracing::error!("Failed to spawn emulation thread: {}", e);
                false
            }
        }
    }

    fn stop_emulation(&mut self) {
        if let Some(thread) = self.thread.take() {
            thread.running.store(false, Ordering::Release);
            if thread.handle.join().is_err() {
                tracing::error!("Emulation thread panicked");
            }
        }
    }

    fn detach_surface(&mut self) {
        // the core must not post frames into a surface being released
        self.stop_emulation();
        CALLBACKS.lock().video = None;
        self.video.clear();
        if let Some(surface) = self.surface.take() {
            tracing::info!("Surface detached: {}", surface);
        }
    }

    fn unload_core(&mut self) {
        self.stop_emulation();

        if let Some(core) = self.loaded.take() {
            unsafe {
                if self.game_loaded {
                    (core.entry.unload_game)();
                }
                (core.entry.deinit)();
            }
            tracing::info!("Core unloaded: {}", core.path.display());
            release_all_buttons();
        }

        self.game_loaded = false;
    }

    fn controls(&self) -> Arc<dyn CoreControls> {
        self.controls.clone()
    }
}

impl Drop for LibretroCore {
    fn drop(&mut self) {
        if self.loaded.is_some() {
            self.detach_surface();
            self.unload_core();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library_fails_load() {
        let mut core = LibretroCore::new(60);
        assert!(!core.load_core(Path::new("/nonexistent/bad_libretro.so")));
        assert!(core.loaded_path().is_none());
    }

    #[test]
    fn test_not_a_library_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake_libretro.so");
        std::fs::write(&path, b"not an elf").unwrap();

        let mut core = LibretroCore::new(60);
        assert!(!core.load_core(&path));
    }

    #[test]
    fn test_calls_without_core() {
        let mut core = LibretroCore::new(0);
        assert!(!core.load_game(Path::new("game.gb")));
        assert!(!core.start_emulation());
        assert!(!core.is_running());
        core.stop_emulation();
        core.unload_core();
    }

    #[test]
    fn test_controls_write_positional_table() {
        let core = LibretroCore::new(60);
        let controls = core.controls();

        controls.set_button_state(ButtonCode::RIGHT, true);
        assert_eq!(input_state_cb(0, RETRO_DEVICE_JOYPAD, 0, 13), 1);
        assert_eq!(input_state_cb(1, RETRO_DEVICE_JOYPAD, 0, 13), 0);

        controls.set_button_state(ButtonCode::RIGHT, false);
        assert_eq!(input_state_cb(0, RETRO_DEVICE_JOYPAD, 0, 13), 0);
        assert_eq!(input_state_cb(0, RETRO_DEVICE_JOYPAD, 0, 200), 0);
    }

    #[test]
    fn test_fast_forward_and_rewind_counters() {
        let core = LibretroCore::new(60);
        core.controls().set_fast_forward(true);
        core.controls().rewind_frames(30);
        core.controls().rewind_frames(30);
        assert!(core.controls.fast_forward());
        assert_eq!(core.controls.rewind_requested(), 60);
    }
}
