//! Input state tracking and the input source abstraction.
//!
//! Device events (keys, mouse motion, pointer lock changes) are accumulated
//! into an [`InputState`] that controllers snapshot once per update. Events
//! reach the state through an [`InputSource`]: the controller registers its
//! state as a listener on initialize and unregisters it on dispose, so a
//! disposed controller can never keep consuming input.

use std::{cell::RefCell, collections::HashSet, fmt, rc::Rc};

use glam::DVec2;

use crate::error::{Error, Result};

/// Logical keys read by the controllers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyCode {
    KeyW,
    KeyA,
    KeyS,
    KeyD,
    KeyQ,
    KeyE,
    Space,
    ShiftLeft,
    ShiftRight,
    ControlLeft,
    ControlRight,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
}

/// A raw device event delivered by the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    /// A key went down.
    KeyDown(KeyCode),
    /// A key went up.
    KeyUp(KeyCode),
    /// Relative mouse motion in pixels.
    MouseMove { dx: f64, dy: f64 },
    /// Pointer lock was acquired (`true`) or released (`false`).
    PointerLockChanged(bool),
    /// The window lost focus; no key-up events will arrive for held keys.
    FocusLost,
}

/// Accumulated device state.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    mouse_delta: DVec2,
    pointer_locked: bool,
}

impl InputState {
    /// Fold a device event into the state.
    pub fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                self.keys.insert(key);
            }
            InputEvent::KeyUp(key) => {
                self.keys.remove(&key);
            }
            InputEvent::MouseMove { dx, dy } => {
                // Without pointer lock the cursor moves freely over the page;
                // only captured motion is look input.
                if self.pointer_locked {
                    self.mouse_delta += DVec2::new(dx, dy);
                }
            }
            InputEvent::PointerLockChanged(locked) => {
                self.pointer_locked = locked;
                if !locked {
                    self.mouse_delta = DVec2::ZERO;
                }
            }
            InputEvent::FocusLost => {
                self.keys.clear();
                self.mouse_delta = DVec2::ZERO;
            }
        }
    }

    /// Whether a key is currently held.
    pub fn pressed(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    /// Whether any of the keys is currently held.
    pub fn any_pressed(&self, keys: &[KeyCode]) -> bool {
        keys.iter().any(|key| self.pressed(*key))
    }

    /// A virtual axis: +1 when a positive key is held, -1 for a negative key, 0 for both or neither.
    pub fn axis(&self, positive: &[KeyCode], negative: &[KeyCode]) -> f64 {
        let pos = if self.any_pressed(positive) { 1.0 } else { 0.0 };
        let neg = if self.any_pressed(negative) { 1.0 } else { 0.0 };
        pos - neg
    }

    /// Mouse motion accumulated since the last snapshot.
    pub fn mouse_delta(&self) -> DVec2 {
        self.mouse_delta
    }

    /// Whether pointer lock is currently held.
    pub fn is_pointer_locked(&self) -> bool {
        self.pointer_locked
    }

    /// Number of keys currently held.
    pub fn held_key_count(&self) -> usize {
        self.keys.len()
    }

    /// Copy the current state and reset the accumulated mouse delta.
    pub fn take_snapshot(&mut self) -> InputState {
        let snapshot = self.clone();
        self.mouse_delta = DVec2::ZERO;
        snapshot
    }
}

/// Input state shared between a controller and the input source feeding it.
pub type SharedInputState = Rc<RefCell<InputState>>;

/// Handle identifying a registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A process-wide source of device events.
///
/// Registration and unregistration are paired: every listener a controller
/// registers in `initialize()` is unregistered in `dispose()`.
pub trait InputSource {
    /// Start delivering events to `listener`.
    fn register(&mut self, listener: SharedInputState) -> Result<ListenerId>;

    /// Stop delivering events to the listener.
    fn unregister(&mut self, id: ListenerId) -> Result<()>;

    /// Ask the host to capture the pointer. The outcome arrives later as
    /// [`InputEvent::PointerLockChanged`].
    fn request_pointer_lock(&mut self) -> Result<()>;

    /// Ask the host to release the pointer.
    fn exit_pointer_lock(&mut self) -> Result<()>;
}

/// Single-threaded fan-out input source.
///
/// The host feeds raw events with [`InputHub::dispatch`]; every registered
/// listener receives them. Pointer lock requests are queued for the host to
/// act on with [`InputHub::take_pointer_lock_request`].
#[derive(Default)]
pub struct InputHub {
    listeners: Vec<(ListenerId, SharedInputState)>,
    next_id: u64,
    pointer_locked: bool,
    pending_lock_request: Option<bool>,
}

impl InputHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every registered listener.
    pub fn dispatch(&mut self, event: InputEvent) {
        if let InputEvent::PointerLockChanged(locked) = event {
            self.pointer_locked = locked;
        }
        for (_, listener) in &self.listeners {
            listener.borrow_mut().apply(event);
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Whether the pointer is currently locked.
    pub fn is_pointer_locked(&self) -> bool {
        self.pointer_locked
    }

    /// Take the most recent pointer lock request (`true` = lock, `false` = release).
    pub fn take_pointer_lock_request(&mut self) -> Option<bool> {
        self.pending_lock_request.take()
    }
}

impl InputSource for InputHub {
    fn register(&mut self, listener: SharedInputState) -> Result<ListenerId> {
        let id = ListenerId(self.next_id);
        self.next_id += 1;

        // A listener joining mid-session starts from the current lock state.
        listener
            .borrow_mut()
            .apply(InputEvent::PointerLockChanged(self.pointer_locked));
        self.listeners.push((id, listener));
        Ok(id)
    }

    fn unregister(&mut self, id: ListenerId) -> Result<()> {
        let index = self
            .listeners
            .iter()
            .position(|(listener_id, _)| *listener_id == id)
            .ok_or(Error::UnknownListener(id))?;
        self.listeners.swap_remove(index);
        Ok(())
    }

    fn request_pointer_lock(&mut self) -> Result<()> {
        self.pending_lock_request = Some(true);
        Ok(())
    }

    fn exit_pointer_lock(&mut self) -> Result<()> {
        self.pending_lock_request = Some(false);
        Ok(())
    }
}
