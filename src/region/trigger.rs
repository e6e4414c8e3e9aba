//! Enter/leave handler dispatch for one region.
//!
//! Dispatch on a boundary crossing:
//! 1. every global handler of that kind fires, in registration order;
//! 2. the player's active quests are walked and the first one with a
//!    per-quest handler fires its most recently added handler, then stops.
//!
//! Handler lists are captured before any handler runs, so a handler that
//! registers or clears handlers only affects later crossings.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, trace, warn};

use super::bounds::Bounds;
use crate::host::{EnterReason, LeaveReason, PlayerId};
use crate::metrics;
use crate::quest::QuestRegistry;

/// Which way the player crossed the boundary, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    Enter(EnterReason),
    Leave(LeaveReason),
}

impl Crossing {
    pub fn is_enter(&self) -> bool {
        matches!(self, Crossing::Enter(_))
    }
}

/// What a handler is told about the crossing that fired it.
#[derive(Debug, Clone)]
pub struct RegionEvent {
    pub region: String,
    pub player: PlayerId,
    pub crossing: Crossing,
    /// Path of the quest whose handler is running; `None` for global handlers.
    pub quest: Option<String>,
}

/// Scripted reaction to a boundary crossing.
pub trait RegionHandler: Send + Sync {
    fn handle(&self, event: &RegionEvent) -> anyhow::Result<()>;
}

impl<F> RegionHandler for F
where
    F: Fn(&RegionEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, event: &RegionEvent) -> anyhow::Result<()> {
        self(event)
    }
}

type HandlerRef = Arc<dyn RegionHandler>;

#[derive(Default)]
struct HandlerLists {
    global: Vec<HandlerRef>,
    per_quest: HashMap<String, Vec<HandlerRef>>,
}

impl HandlerLists {
    fn len(&self) -> usize {
        self.global.len() + self.per_quest.values().map(Vec::len).sum::<usize>()
    }

    fn clear(&mut self) {
        self.global.clear();
        self.per_quest.clear();
    }
}

#[derive(Default)]
struct Handlers {
    enter: HandlerLists,
    leave: HandlerLists,
}

impl Handlers {
    fn is_empty(&self) -> bool {
        self.enter.len() + self.leave.len() == 0
    }

    fn lists(&self, crossing: Crossing) -> &HandlerLists {
        if crossing.is_enter() {
            &self.enter
        } else {
            &self.leave
        }
    }
}

/// Summary of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub globals_fired: usize,
    /// Quest whose handler fired, if any.
    pub quest_handler: Option<String>,
}

pub struct RegionTrigger {
    name: String,
    bounds: Bounds,
    registry: Arc<QuestRegistry>,
    handlers: RwLock<Handlers>,
    listening: AtomicBool,
}

impl RegionTrigger {
    pub fn new(name: impl Into<String>, bounds: Bounds, registry: Arc<QuestRegistry>) -> Self {
        Self {
            name: name.into(),
            bounds,
            registry,
            handlers: RwLock::new(Handlers::default()),
            listening: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// True while at least one handler is registered; the host should only
    /// report crossings for listening regions.
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    pub fn handler_count(&self) -> usize {
        let handlers = self.read();
        handlers.enter.len() + handlers.leave.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, Handlers> {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Handlers> {
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn modify(&self, f: impl FnOnce(&mut Handlers)) {
        let mut handlers = self.write();
        f(&mut handlers);
        let listening = !handlers.is_empty();
        if self.listening.swap(listening, Ordering::AcqRel) != listening {
            debug!(
                "Region {} {} listening",
                self.name,
                if listening { "started" } else { "stopped" }
            );
        }
    }

    pub fn add_global_enter<F>(&self, handler: F)
    where
        F: Fn(&RegionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: HandlerRef = Arc::new(handler);
        self.modify(|h| h.enter.global.push(handler));
    }

    pub fn add_global_leave<F>(&self, handler: F)
    where
        F: Fn(&RegionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: HandlerRef = Arc::new(handler);
        self.modify(|h| h.leave.global.push(handler));
    }

    /// Register an enter handler for players on `quest`. Returns false, without
    /// registering anything, if the quest does not exist.
    pub fn add_quest_enter<F>(&self, quest: &str, handler: F) -> bool
    where
        F: Fn(&RegionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add_quest_handler(quest, true, Arc::new(handler))
    }

    /// Register a leave handler for players on `quest`. Returns false, without
    /// registering anything, if the quest does not exist.
    pub fn add_quest_leave<F>(&self, quest: &str, handler: F) -> bool
    where
        F: Fn(&RegionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add_quest_handler(quest, false, Arc::new(handler))
    }

    fn add_quest_handler(&self, quest: &str, enter: bool, handler: HandlerRef) -> bool {
        let Some(resolved) = self.registry.get(quest) else {
            warn!(
                "Region {}: cannot add handler for unknown quest '{}'",
                self.name, quest
            );
            return false;
        };
        let path = resolved.path().to_string();
        self.modify(|h| {
            let lists = if enter { &mut h.enter } else { &mut h.leave };
            lists.per_quest.entry(path).or_default().push(handler);
        });
        true
    }

    /// Drop every handler; the trigger stops listening but stays usable.
    pub fn clear_handlers(&self) {
        self.modify(|h| {
            h.enter.clear();
            h.leave.clear();
        });
    }

    pub fn on_player_enter(
        &self,
        player: &PlayerId,
        reason: EnterReason,
    ) -> anyhow::Result<DispatchOutcome> {
        self.dispatch(player, Crossing::Enter(reason))
    }

    pub fn on_player_leave(
        &self,
        player: &PlayerId,
        reason: LeaveReason,
    ) -> anyhow::Result<DispatchOutcome> {
        self.dispatch(player, Crossing::Leave(reason))
    }

    fn dispatch(&self, player: &PlayerId, crossing: Crossing) -> anyhow::Result<DispatchOutcome> {
        if !self.is_listening() {
            trace!("Region {} ignoring {:?}: not listening", self.name, crossing);
            return Ok(DispatchOutcome::default());
        }

        // handlers registered from here on apply to the next crossing
        let (globals, per_quest): (Vec<HandlerRef>, HashMap<String, HandlerRef>) = {
            let handlers = self.read();
            let lists = handlers.lists(crossing);
            let per_quest = lists
                .per_quest
                .iter()
                .filter_map(|(path, list)| list.last().map(|h| (path.clone(), Arc::clone(h))))
                .collect();
            (lists.global.clone(), per_quest)
        };

        let mut event = RegionEvent {
            region: self.name.clone(),
            player: player.clone(),
            crossing,
            quest: None,
        };
        for handler in &globals {
            handler.handle(&event)?;
        }

        // globals may have accepted or finished quests
        let active = self.registry.active_paths(player);
        let quest_handler = active
            .iter()
            .find_map(|path| per_quest.get(path).map(|h| (path.clone(), Arc::clone(h))));

        let fired_quest = quest_handler.as_ref().map(|(path, _)| path.clone());
        if crossing.is_enter() {
            metrics::record_region_enter(&self.name, fired_quest.is_some());
        } else {
            metrics::record_region_leave(&self.name, fired_quest.is_some());
        }
        debug!(
            "Region {}: {:?} by {} ({} global, quest handler {:?})",
            self.name,
            crossing,
            player,
            globals.len(),
            fired_quest
        );

        if let Some((path, handler)) = quest_handler {
            event.quest = Some(path);
            handler.handle(&event)?;
        }

        Ok(DispatchOutcome {
            globals_fired: globals.len(),
            quest_handler: fired_quest,
        })
    }
}
