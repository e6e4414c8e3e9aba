//! The surface scripts use to drive quests, prompts, and region handlers.

pub mod regions;

use std::sync::Arc;

use log::{debug, info};

use crate::errors::QuestError;
use crate::host::{Messenger, PlayerId, ResponseRouter};
use crate::quest::{AcceptOutcome, Quest, QuestRegistry};
use crate::request::{Request, RequestQueue, ResponseType};

pub use regions::RegionsApi;

pub const ACCEPT_PROMPT: &str = "Type '/accept' to accept the quest.";
pub const YES_PROMPT: &str = "Type '/yes' or ignore.";
pub const EXPIRES_PROMPT: &str = "Expires in {0} seconds.";

/// Callback a script supplies to run when a player says yes.
pub type ScriptCallback = Arc<dyn Fn(&PlayerId) -> anyhow::Result<()> + Send + Sync>;

pub struct QuestsApi {
    registry: Arc<QuestRegistry>,
    requests: Arc<RequestQueue>,
    messenger: Arc<dyn Messenger>,
}

impl QuestsApi {
    /// Wire the API to its collaborators. When a `router` is given it is told
    /// about every request that ends unanswered so late replies go nowhere.
    pub fn new(
        registry: Arc<QuestRegistry>,
        requests: Arc<RequestQueue>,
        messenger: Arc<dyn Messenger>,
        router: Option<Arc<dyn ResponseRouter>>,
    ) -> Self {
        if let Some(router) = router {
            requests.on_end(move |request, _| router.cancel(request));
        }
        Self {
            registry,
            requests,
            messenger,
        }
    }

    pub fn registry(&self) -> &Arc<QuestRegistry> {
        &self.registry
    }

    pub fn requests(&self) -> &Arc<RequestQueue> {
        &self.requests
    }

    pub fn create(&self, name: &str, display_name: &str) -> Result<Arc<Quest>, QuestError> {
        self.registry.create(name, display_name)
    }

    /// Dispose the quest at `name` (primary or dotted sub-quest path).
    pub fn dispose(&self, name: &str) -> Result<bool, QuestError> {
        match self.registry.get(name) {
            Some(quest) => self.registry.dispose(&quest),
            None => Ok(false),
        }
    }

    pub fn is_in_quest(&self, player: &PlayerId, quest: &str) -> bool {
        self.registry
            .get(quest)
            .map(|q| q.is_in_progress(player))
            .unwrap_or(false)
    }

    pub fn has_completed(&self, player: &PlayerId, quest: &str) -> bool {
        self.registry
            .get(quest)
            .map(|q| q.has_completed(player))
            .unwrap_or(false)
    }

    /// Mark `quest` completed. False only when the quest does not exist.
    pub fn complete(&self, player: &PlayerId, quest: &str) -> bool {
        match self.registry.get(quest) {
            Some(q) => {
                q.finish(player);
                true
            }
            None => false,
        }
    }

    /// Put `player` on `quest` without asking. `None` when the quest does not exist.
    pub fn join_quest(&self, player: &PlayerId, quest: &str) -> Option<AcceptOutcome> {
        self.registry.get(quest).map(|q| q.accept(player))
    }

    /// Offer `quest` to `player`. Accepting puts them on it and then runs
    /// `on_accept`. Returns false when the quest does not exist.
    pub fn query_quest(
        &self,
        player: &PlayerId,
        quest: &str,
        on_accept: Option<ScriptCallback>,
    ) -> bool {
        let Some(resolved) = self.registry.get(quest) else {
            debug!("query_quest: unknown quest '{}'", quest);
            return false;
        };

        let registry = Arc::clone(&self.registry);
        let path = resolved.path().to_string();
        let handler = move |request: &Request, response: ResponseType| -> anyhow::Result<()> {
            if response != ResponseType::Accept {
                return Ok(());
            }
            // the quest may have been disposed while the prompt was pending
            let Some(quest) = registry.get(&path) else {
                return Ok(());
            };
            quest.accept(request.player());
            if let Some(callback) = &on_accept {
                callback(request.player())?;
            }
            Ok(())
        };

        self.requests
            .request(resolved.path(), player, &[ResponseType::Accept], handler);
        self.messenger.tell(player, ACCEPT_PROMPT, &[]);
        self.tell_expiry(player);
        true
    }

    /// Ask `player` a yes/no question; `on_yes` runs if they answer yes in time.
    pub fn query<F>(&self, player: &PlayerId, context: &str, question: &str, on_yes: F)
    where
        F: Fn(&PlayerId) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler = move |request: &Request, response: ResponseType| -> anyhow::Result<()> {
            if response == ResponseType::Yes {
                on_yes(request.player())?;
            }
            Ok(())
        };

        self.requests
            .request(context, player, &[ResponseType::Yes], handler);
        self.messenger.tell(player, question, &[]);
        self.messenger.tell(player, YES_PROMPT, &[]);
        self.tell_expiry(player);
    }

    fn tell_expiry(&self, player: &PlayerId) {
        let seconds = self.requests.ttl().as_secs().to_string();
        self.messenger.tell(player, EXPIRES_PROMPT, &[&seconds]);
    }

    /// Cancel every pending request, as when scripts are reloaded.
    pub fn reset(&self) -> usize {
        let cancelled = self.requests.cancel_all();
        info!("Script reset cancelled {} pending request(s)", cancelled);
        cancelled
    }
}
