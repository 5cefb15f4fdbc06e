use std::{
    io::{self, ErrorKind},
    os::fd::{AsRawFd, RawFd},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Sender, bounded};
use evdev::{Device, InputEventKind, Key};
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::{ChordSpec, ChordState, ChordTracker, Error, KeyAction, Result};

/// A source of key transitions polled by the listener thread.
///
/// `poll` must not block for long: it returns whatever is available now,
/// possibly nothing.
pub trait KeySource: Send + 'static {
    /// Drain pending key transitions as `(normalized name, action)` pairs.
    fn poll(&mut self) -> Result<Vec<(String, KeyAction)>>;
}

/// A non-blocking evdev input device.
pub struct EvdevSource {
    /// Open device handle.
    device: Device,
}

impl EvdevSource {
    /// Open `path` and switch its descriptor to non-blocking reads.
    pub fn open(path: &Path) -> Result<Self> {
        let device = Device::open(path).map_err(|source| Error::DeviceOpen {
            path: path.to_path_buf(),
            source,
        })?;
        set_nonblocking(device.as_raw_fd()).map_err(|source| Error::DeviceOpen {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = %path.display(),
            name = device.name().unwrap_or("?"),
            "hotkey_device_open"
        );
        Ok(Self { device })
    }
}

impl KeySource for EvdevSource {
    fn poll(&mut self) -> Result<Vec<(String, KeyAction)>> {
        match self.device.fetch_events() {
            Ok(events) => Ok(events
                .filter_map(|ev| match ev.kind() {
                    InputEventKind::Key(key) => {
                        KeyAction::from_value(ev.value()).map(|a| (format!("{key:?}"), a))
                    }
                    _ => None,
                })
                .collect()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(Vec::new()),
            Err(e) => Err(Error::Read(e)),
        }
    }
}

/// Switch `fd` to `O_NONBLOCK`.
fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: `fd` belongs to a live `Device` for the duration of both calls.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above.
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Find the first input device that looks like a keyboard.
pub fn find_keyboard() -> Option<PathBuf> {
    evdev::enumerate().find_map(|(path, dev)| {
        let keys = dev.supported_keys()?;
        (keys.contains(Key::KEY_SPACE) && keys.contains(Key::KEY_A)).then_some(path)
    })
}

/// Background chord listener running on its own OS thread.
///
/// Activations are published as a monotonically increasing counter on a
/// `watch` channel: consumers see the latest value and bursts coalesce.
pub struct HotkeyListener {
    /// Set to ask the thread to exit.
    stop: Arc<AtomicBool>,
    /// Thread handle, taken on shutdown.
    handle: Option<JoinHandle<()>>,
    /// Activation counter.
    activations: watch::Receiver<u64>,
    /// Latest chord snapshot.
    state: watch::Receiver<ChordState>,
}

impl HotkeyListener {
    /// Open the evdev device at `path` and start listening for `spec`.
    pub fn spawn_device(path: PathBuf, spec: ChordSpec, poll_interval: Duration) -> Result<Self> {
        Self::spawn(move || EvdevSource::open(&path), spec, poll_interval)
    }

    /// Start the listener thread with a source built by `open`.
    ///
    /// `open` runs on the listener thread; its failure is returned from here.
    pub fn spawn<S, F>(open: F, spec: ChordSpec, poll_interval: Duration) -> Result<Self>
    where
        S: KeySource,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let (act_tx, act_rx) = watch::channel(0u64);
        let (state_tx, state_rx) = watch::channel(ChordState::default());
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let ctx = LoopCtx {
            stop: stop.clone(),
            tracker: ChordTracker::new(spec),
            poll_interval,
            activations: act_tx,
            state: state_tx,
        };
        let handle = thread::Builder::new()
            .name("evdev-hotkey".into())
            .spawn(move || run_listener(open, ctx, &ready_tx))
            .map_err(|_| Error::ThreadStart)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ignored = handle.join();
                return Err(e);
            }
            Err(_) => return Err(Error::ThreadStart),
        }

        Ok(Self {
            stop,
            handle: Some(handle),
            activations: act_rx,
            state: state_rx,
        })
    }

    /// Subscribe to the activation counter.
    pub fn activations(&self) -> watch::Receiver<u64> {
        self.activations.clone()
    }

    /// Snapshot of the current chord state.
    pub fn chord_state(&self) -> ChordState {
        self.state.borrow().clone()
    }

    /// Whether the listener thread is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for it to exit.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                warn!("hotkey_thread_panicked");
            }
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// State moved onto the listener thread.
struct LoopCtx {
    /// Exit request flag.
    stop: Arc<AtomicBool>,
    /// Chord state machine, owned by the thread.
    tracker: ChordTracker,
    /// Sleep between empty polls.
    poll_interval: Duration,
    /// Activation counter sender.
    activations: watch::Sender<u64>,
    /// Chord snapshot sender.
    state: watch::Sender<ChordState>,
}

/// Thread body: open the source, report readiness, then poll until stopped.
fn run_listener<S, F>(open: F, mut ctx: LoopCtx, ready: &Sender<Result<()>>)
where
    S: KeySource,
    F: FnOnce() -> Result<S>,
{
    let mut source = match open() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "hotkey_open_failed");
            let _ignored = ready.send(Err(e));
            return;
        }
    };
    let _ignored = ready.send(Ok(()));
    debug!(trigger = ctx.tracker.spec().trigger(), "hotkey_listening");

    while !ctx.stop.load(Ordering::SeqCst) {
        let events = match source.poll() {
            Ok(ev) => ev,
            Err(e) => {
                error!(error = %e, "hotkey_read_failed");
                break;
            }
        };
        if events.is_empty() {
            thread::sleep(ctx.poll_interval);
            continue;
        }
        for (key, action) in events {
            if ctx.tracker.on_key(&key, action) {
                ctx.activations.send_modify(|n| *n += 1);
                info!(seq = *ctx.activations.borrow(), "hotkey_activation");
            }
            trace!(key = %key, ?action, "hotkey_key");
        }
        ctx.state.send_if_modified(|s| {
            if s == ctx.tracker.state() {
                false
            } else {
                *s = ctx.tracker.state().clone();
                true
            }
        });
    }
    debug!("hotkey_stopped");
}
