//! Catalog of palette commands with recent-use ordering.
use std::{collections::HashMap, sync::Arc};

use config::Config;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{
    Error, Result,
    command::{Command, builtin_commands},
};

/// A registered command and its ordering keys.
struct Entry {
    /// The command itself.
    command: Arc<Command>,
    /// Insertion sequence number.
    seq: u64,
    /// Logical time of the last use; 0 when never used.
    last_used: u64,
}

/// Mutable registry state behind the lock.
#[derive(Default)]
struct Inner {
    /// Commands by id.
    entries: HashMap<String, Entry>,
    /// Next insertion sequence number.
    next_seq: u64,
    /// Logical clock advanced by every `touch`.
    clock: u64,
    /// Number of non-builtin commands.
    user_count: usize,
}

/// Read-mostly registry shared by the dispatcher and the palette.
pub struct Registry {
    /// Guarded state.
    inner: RwLock<Inner>,
    /// Upper bound on user commands.
    max_user_commands: usize,
}

impl Registry {
    /// Create an empty registry.
    pub fn new(max_user_commands: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_user_commands,
        }
    }

    /// Create a registry holding the built-in commands.
    pub fn with_builtins(max_user_commands: usize) -> Self {
        let reg = Self::new(max_user_commands);
        for cmd in builtin_commands() {
            // Built-in ids are unique and exempt from the limit.
            let _ignored = reg.register(cmd);
        }
        reg
    }

    /// Create a registry with the built-ins plus the user commands in `cfg`.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let reg = Self::with_builtins(cfg.max_user_commands);
        for u in &cfg.commands {
            reg.register(Command::from(u))?;
        }
        info!(
            commands = reg.len(),
            user = cfg.commands.len(),
            "registry_loaded"
        );
        Ok(reg)
    }

    /// Add a command. Fails on a duplicate id or when the user limit is reached.
    pub fn register(&self, command: Command) -> Result<()> {
        let mut g = self.inner.write();
        if g.entries.contains_key(&command.id) {
            return Err(Error::DuplicateId(command.id));
        }
        if !command.builtin {
            if g.user_count >= self.max_user_commands {
                return Err(Error::CapacityExceeded {
                    id: command.id,
                    limit: self.max_user_commands,
                });
            }
            g.user_count += 1;
        }
        let seq = g.next_seq;
        g.next_seq += 1;
        debug!(id = %command.id, kind = %command.provider_kind(), "command_registered");
        g.entries.insert(
            command.id.clone(),
            Entry {
                command: Arc::new(command),
                seq,
                last_used: 0,
            },
        );
        Ok(())
    }

    /// Remove a user command. Built-ins cannot be removed.
    pub fn unregister(&self, id: &str) -> Result<Arc<Command>> {
        let mut g = self.inner.write();
        match g.entries.get(id) {
            Some(e) if !e.command.builtin => {}
            _ => return Err(Error::UnknownCommand(id.to_string())),
        }
        let entry = g
            .entries
            .remove(id)
            .ok_or_else(|| Error::UnknownCommand(id.to_string()))?;
        g.user_count -= 1;
        debug!(id, "command_unregistered");
        Ok(entry.command)
    }

    /// Look up the command bound to `id`.
    pub fn resolve(&self, id: &str) -> Result<Arc<Command>> {
        self.inner
            .read()
            .entries
            .get(id)
            .map(|e| e.command.clone())
            .ok_or_else(|| Error::UnknownCommand(id.to_string()))
    }

    /// Record a use of `id`, moving it to the front of [`Registry::list`].
    pub fn touch(&self, id: &str) -> Result<()> {
        let mut g = self.inner.write();
        g.clock += 1;
        let now = g.clock;
        let e = g
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::UnknownCommand(id.to_string()))?;
        e.last_used = now;
        Ok(())
    }

    /// Snapshot of all commands, most recently used first, then by insertion.
    pub fn list(&self) -> Vec<Arc<Command>> {
        let g = self.inner.read();
        let mut v: Vec<&Entry> = g.entries.values().collect();
        v.sort_by(|a, b| b.last_used.cmp(&a.last_used).then(a.seq.cmp(&b.seq)));
        v.into_iter().map(|e| e.command.clone()).collect()
    }

    /// Total number of registered commands.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registered user commands.
    pub fn user_count(&self) -> usize {
        self.inner.read().user_count
    }
}
