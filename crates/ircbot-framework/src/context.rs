//! The bot's mutable state, handed to every layer.
//!
//! [`BotContext`] owns everything a command may touch: the wire [`Session`],
//! the [`OptionRegistry`], the [`FileStore`] and a type-keyed state map in
//! which each layer keeps its own data (admin set, cache, access log...).
//! Layers themselves stay immutable, so an outer layer can reach state
//! installed by an inner one and the other way round.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use ircbot_core::Session;

use crate::options::OptionRegistry;
use crate::storage::FileStore;

pub struct BotContext {
    session: Session,
    options: OptionRegistry,
    store: FileStore,
    options_file: Option<String>,
    state: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl BotContext {
    /// Creates a context with file operations disabled.
    pub fn new(session: Session) -> Self {
        Self {
            session,
            options: OptionRegistry::new(),
            store: FileStore::disabled(),
            options_file: None,
            state: HashMap::new(),
        }
    }

    pub fn with_store(mut self, store: FileStore) -> Self {
        self.store = store;
        self
    }

    /// Default target of `save-options` / `load-options`.
    pub fn with_options_file(mut self, file: Option<String>) -> Self {
        self.options_file = file;
        self
    }

    // ─── Session ─────────────────────────────────────────────────────────────

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Current nick of the bot.
    pub fn nick(&self) -> &str {
        self.session.nick()
    }

    /// Sends one message line to `channel`.
    pub fn say_to(&self, channel: &str, text: impl AsRef<str>) {
        self.session.say_to(channel, text);
    }

    // ─── Options and files ───────────────────────────────────────────────────

    pub fn options(&self) -> &OptionRegistry {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut OptionRegistry {
        &mut self.options
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn options_file(&self) -> Option<&str> {
        self.options_file.as_deref()
    }

    // ─── Layer state ─────────────────────────────────────────────────────────

    /// Stores a value in the state map. One value per type; later calls
    /// overwrite.
    pub fn set_state<T: Send + Sync + 'static>(&mut self, value: T) {
        self.state.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn state<T: 'static>(&self) -> Option<&T> {
        self.state
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Mutable access to the `T` slot, creating it from `T::default()` first
    /// if needed.
    pub fn state_mut<T: Default + Send + Sync + 'static>(&mut self) -> &mut T {
        let slot = self
            .state
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()));
        match slot.downcast_mut::<T>() {
            Some(value) => value,
            None => unreachable!("state slot keyed by TypeId holds a foreign type"),
        }
    }

    /// Mutable access to the `T` slot if it was installed.
    pub fn get_state_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.state
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut::<T>())
    }

    pub fn has_state<T: 'static>(&self) -> bool {
        self.state.contains_key(&TypeId::of::<T>())
    }

    pub fn take_state<T: 'static>(&mut self) -> Option<T> {
        self.state
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }
}

impl fmt::Debug for BotContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotContext")
            .field("session", &self.session)
            .field("options", &self.options.len())
            .field("store", &self.store)
            .field("options_file", &self.options_file)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Counter(u32);

    #[test]
    fn test_state_slots() {
        let mut ctx = BotContext::new(Session::new("s", 6667, "bot"));
        assert!(ctx.state::<Counter>().is_none());

        assert!(ctx.get_state_mut::<Counter>().is_none());
        ctx.state_mut::<Counter>().0 += 2;
        assert_eq!(ctx.state::<Counter>(), Some(&Counter(2)));
        if let Some(counter) = ctx.get_state_mut::<Counter>() {
            counter.0 += 1;
        }
        assert_eq!(ctx.state::<Counter>(), Some(&Counter(3)));
        assert!(ctx.has_state::<Counter>());

        ctx.set_state(Counter(7));
        assert_eq!(ctx.take_state::<Counter>(), Some(Counter(7)));
        assert!(!ctx.has_state::<Counter>());
    }
}
