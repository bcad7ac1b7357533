//! Named, typed configuration variables and their type-erased surface.

use crate::convert::{Convert, ValueKind};
use crate::validation::validate_name;
use arc_swap::ArcSwap;
use confvar_common::{ConfVarError, ListenerId, Result};
use parking_lot::{Mutex, ReentrantMutex};
use std::any::{Any, type_name};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// Callback receiving `(old, new)` when a variable changes.
pub type ChangeListener<T> = Arc<dyn Fn(&T, &T) + Send + Sync>;

/// Bounds every variable value type satisfies.
pub trait VariableValue: Convert + Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

impl<T> VariableValue for T where T: Convert + Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

/// Type-erased view of a variable, used where the value type is not
/// known statically (bulk loading, traversal).
pub trait VariableBase: Send + Sync {
    /// Variable name, immutable after creation.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Current value rendered as YAML text.
    fn serialize(&self) -> Result<String>;

    /// Parse `text` and apply it through the normal change path.
    ///
    /// Returns whether the value changed. On failure the previous value
    /// is kept.
    fn deserialize(&self, text: &str) -> Result<bool>;

    /// Name of the value type, for diagnostics only.
    fn type_name(&self) -> &'static str;

    /// Shape of the value type.
    fn kind(&self) -> ValueKind;

    /// Upcast for checked downcasting to the concrete variable.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A named, typed, described configuration value.
///
/// Listeners run before the new value is stored: during a notification,
/// [`Variable::get_value`] still returns the old value.
///
/// Writes are serialized per variable, so the `(old, new)` pairs listeners
/// see form one chain ending at the stored value. A listener that writes to
/// another variable whose listener writes back to this one, from a second
/// thread, deadlocks.
pub struct Variable<T: VariableValue> {
    name: String,
    description: String,
    value: ArcSwap<T>,
    listeners: Mutex<BTreeMap<ListenerId, ChangeListener<T>>>,
    // Held from compare to commit. Reentrant so a listener may write the
    // variable it is attached to; the outer write still commits last.
    write_gate: ReentrantMutex<()>,
}

impl<T: VariableValue> Variable<T> {
    /// Create a variable, rejecting names outside `[0-9a-z_.]+`.
    pub fn new(name: impl Into<String>, value: T, description: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            description: description.into(),
            value: ArcSwap::from_pointee(value),
            listeners: Mutex::new(BTreeMap::new()),
            write_gate: ReentrantMutex::new(()),
        })
    }

    /// Variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Clone of the current value.
    pub fn get_value(&self) -> T {
        T::clone(&self.value.load())
    }

    /// Shared pointer to the current value, without cloning it.
    pub fn load(&self) -> Arc<T> {
        self.value.load_full()
    }

    /// Replace the value, notifying listeners if it differs.
    ///
    /// Listeners are invoked in registration order with `(old, new)`
    /// before the new value is committed. Only the write gate is held
    /// while they run, so they may read the variable and call back into
    /// the registry. Concurrent writers are applied one at a time. A
    /// panicking listener is logged and skipped. Returns whether the
    /// value changed.
    pub fn set_value(&self, value: T) -> bool {
        let _gate = self.write_gate.lock();
        let old = self.value.load_full();
        if *old == value {
            return false;
        }

        let listeners: Vec<(ListenerId, ChangeListener<T>)> = self
            .listeners
            .lock()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        for (id, listener) in listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(&old, &value))) {
                let err = ConfVarError::ListenerFailure {
                    name: self.name.clone(),
                    listener: id,
                    message: panic_message(payload.as_ref()),
                };
                error!(variable = %self.name, listener = %id, error = %err, "change listener failed");
            }
        }

        debug!(variable = %self.name, old = ?old, new = ?value, "variable updated");
        self.value.store(Arc::new(value));
        true
    }

    /// Register a change listener and return its id.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        let id = ListenerId::next();
        self.listeners.lock().insert(id, Arc::new(listener));
        id
    }

    /// Remove a listener. Unknown ids are ignored; returns whether one was removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }

    /// Look up a registered listener.
    pub fn get_listener(&self, id: ListenerId) -> Option<ChangeListener<T>> {
        self.listeners.lock().get(&id).cloned()
    }

    /// Remove every listener.
    pub fn clear_listeners(&self) {
        self.listeners.lock().clear();
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<T: VariableValue> VariableBase for Variable<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn serialize(&self) -> Result<String> {
        self.value
            .load()
            .to_text()
            .map_err(|e| ConfVarError::conversion(&self.name, e))
    }

    fn deserialize(&self, text: &str) -> Result<bool> {
        let value = T::from_text(text).map_err(|e| ConfVarError::conversion(&self.name, e))?;
        Ok(self.set_value(value))
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn kind(&self) -> ValueKind {
        T::KIND
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<T: VariableValue> fmt::Debug for Variable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("value", &self.value.load_full())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
