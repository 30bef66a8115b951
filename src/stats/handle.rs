//! Shared, observable stats.
//!
//! A [`StatHandle`] is what stat owners hand out: an `Rc` around a [`Stat`]
//! plus its listeners and bindings. Writes go through the handle, which
//! updates the stat, releases the borrow, and only then notifies. Listeners
//! are therefore free to read or write the same stat.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::modifiers::ModifierKind;

use super::stat::{Stat, StatChange, StatUpdate};

/// Identifier returned by [`StatHandle::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Identifier returned by [`StatHandle::bind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

/// A change listener.
pub type StatListener = Rc<dyn Fn(&StatChange)>;

struct Binding {
    id: BindingId,
    property: Rc<Cell<f64>>,
    last_synced: f64,
}

struct StatCell {
    stat: RefCell<Stat>,
    listeners: RefCell<Vec<(ListenerId, StatListener)>>,
    bindings: RefCell<Vec<Binding>>,
    next_id: Cell<u64>,
}

/// Shared handle to an observable [`Stat`].
///
/// Cloning the handle shares the stat.
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use buff_engine::stats::{Stat, StatHandle};
///
/// let speed = StatHandle::new(Stat::new(10.0, 0.0, 100.0));
/// let seen = Rc::new(Cell::new(0.0));
///
/// let sink = Rc::clone(&seen);
/// speed.subscribe(move |change| sink.set(change.new_value));
///
/// speed.add_flat(5.0);
/// assert_eq!(seen.get(), 15.0);
/// ```
#[derive(Clone)]
pub struct StatHandle(Rc<StatCell>);

impl StatHandle {
    /// Wrap a stat.
    #[must_use]
    pub fn new(stat: Stat) -> Self {
        Self(Rc::new(StatCell {
            stat: RefCell::new(stat),
            listeners: RefCell::new(Vec::new()),
            bindings: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }))
    }

    /// Downgrade to a weak handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakStatHandle {
        WeakStatHandle(Rc::downgrade(&self.0))
    }

    /// Whether two handles share the same stat.
    #[must_use]
    pub fn ptr_eq(&self, other: &StatHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // === Reads ===

    /// Computed value.
    #[must_use]
    pub fn get_value(&self) -> f64 {
        self.0.stat.borrow().get_value()
    }

    /// Effective maximum.
    #[must_use]
    pub fn get_max(&self) -> f64 {
        self.0.stat.borrow().get_max()
    }

    /// Minimum bound.
    #[must_use]
    pub fn get_min(&self) -> f64 {
        self.0.stat.borrow().get_min()
    }

    /// Base value.
    #[must_use]
    pub fn base_value(&self) -> f64 {
        self.0.stat.borrow().base_value()
    }

    /// Copy of the underlying stat.
    #[must_use]
    pub fn snapshot(&self) -> Stat {
        self.0.stat.borrow().clone()
    }

    /// Read the underlying stat.
    pub fn with<R>(&self, f: impl FnOnce(&Stat) -> R) -> R {
        f(&self.0.stat.borrow())
    }

    // === Writes ===

    /// Set the base value. Returns the delta written.
    pub fn set_base_value(&self, value: f64) -> f64 {
        self.write(|stat| stat.set_base_value(value))
    }

    /// Add to the base value. Returns the delta written.
    pub fn add_value(&self, amount: f64) -> f64 {
        self.write(|stat| stat.add_value(amount))
    }

    /// Add a flat adjustment. Returns the delta written.
    pub fn add_flat(&self, amount: f64) -> f64 {
        self.write(|stat| stat.add_flat(amount))
    }

    /// Add a percent adjustment. Returns the delta written.
    pub fn add_percent(&self, amount: f64) -> f64 {
        self.write(|stat| stat.add_percent(amount))
    }

    /// Add to the maximum bound. Returns the delta written.
    pub fn add_max_value(&self, amount: f64) -> f64 {
        self.write(|stat| stat.add_max_value(amount))
    }

    /// Add a flat adjustment to the maximum. Returns the delta written.
    pub fn add_max_flat(&self, amount: f64) -> f64 {
        self.write(|stat| stat.add_max_flat(amount))
    }

    /// Add a percent adjustment to the maximum. Returns the delta written.
    pub fn add_max_percent(&self, amount: f64) -> f64 {
        self.write(|stat| stat.add_max_percent(amount))
    }

    /// Add to the minimum bound. Returns the delta written.
    pub fn add_min_value(&self, amount: f64) -> f64 {
        self.write(|stat| stat.add_min_value(amount))
    }

    /// Write `amount` to the component addressed by `kind`.
    pub fn apply(&self, kind: ModifierKind, amount: f64) -> f64 {
        self.write(|stat| stat.apply(kind, amount))
    }

    /// Enable or disable change signalling.
    pub fn set_signals_enabled(&self, enabled: bool) {
        self.0.stat.borrow_mut().set_signals_enabled(enabled);
    }

    // === Observers ===

    /// Register a change listener.
    pub fn subscribe(&self, listener: impl Fn(&StatChange) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id());
        self.0.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Remove a change listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.0.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }

    // === Bindings ===

    /// Bind an external property.
    ///
    /// The property immediately receives the current value and is updated
    /// on every change. External writes to the property are pulled back in
    /// by [`sync_bindings`](Self::sync_bindings).
    pub fn bind(&self, property: Rc<Cell<f64>>) -> BindingId {
        let id = BindingId(self.next_id());
        let value = self.get_value();
        property.set(value);
        self.0.bindings.borrow_mut().push(Binding {
            id,
            property,
            last_synced: value,
        });
        id
    }

    /// Remove a binding. Returns false if it was not registered.
    pub fn unbind(&self, id: BindingId) -> bool {
        let mut bindings = self.0.bindings.borrow_mut();
        let before = bindings.len();
        bindings.retain(|b| b.id != id);
        bindings.len() != before
    }

    /// Pull external writes from bound properties into the base value.
    ///
    /// Returns true if any property had been written externally. When
    /// several were, the last one wins.
    pub fn sync_bindings(&self) -> bool {
        let external = self
            .0
            .bindings
            .borrow()
            .iter()
            .filter(|b| b.property.get() != b.last_synced)
            .map(|b| b.property.get())
            .last();

        match external {
            Some(value) => {
                self.set_base_value(value);
                // Bring every binding in line, including ones that missed a
                // notification because the value did not change.
                let current = self.get_value();
                for binding in self.0.bindings.borrow_mut().iter_mut() {
                    binding.property.set(current);
                    binding.last_synced = current;
                }
                true
            }
            None => false,
        }
    }

    // === Internals ===

    fn next_id(&self) -> u64 {
        let id = self.0.next_id.get();
        self.0.next_id.set(id + 1);
        id
    }

    fn write(&self, f: impl FnOnce(&mut Stat) -> StatUpdate) -> f64 {
        let update = f(&mut self.0.stat.borrow_mut());
        if let Some(change) = update.change {
            self.notify(&change);
        }
        update.delta
    }

    fn notify(&self, change: &StatChange) {
        for binding in self.0.bindings.borrow_mut().iter_mut() {
            binding.property.set(change.new_value);
            binding.last_synced = change.new_value;
        }

        // Clone the list so listeners may subscribe or unsubscribe.
        let listeners: Vec<StatListener> = self
            .0
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(change);
        }
    }
}

impl fmt::Debug for StatHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatHandle")
            .field("stat", &*self.0.stat.borrow())
            .field("listeners", &self.0.listeners.borrow().len())
            .field("bindings", &self.0.bindings.borrow().len())
            .finish()
    }
}

/// Weak counterpart of [`StatHandle`], used by listeners to avoid cycles.
#[derive(Clone, Default)]
pub struct WeakStatHandle(Weak<StatCell>);

impl WeakStatHandle {
    /// Upgrade to a strong handle if the stat is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<StatHandle> {
        self.0.upgrade().map(StatHandle)
    }
}

impl fmt::Debug for WeakStatHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakStatHandle(alive: {})", self.0.strong_count() > 0)
    }
}
