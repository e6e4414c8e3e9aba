//! Pending "reply within N seconds" prompts.
//!
//! A [`Request`] waits for one player's reply in one context (usually a quest
//! name). The player answers through the host's command correlator, which
//! calls [`RequestQueue::respond`]; the matching request is taken out of the
//! queue before its handler runs, so a reply is delivered at most once and
//! never to a request that has already ended.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::timed::{EndReason, TimedSet};
use crate::config::RequestsConfig;
use crate::host::PlayerId;
use crate::metrics;

/// A reply a player can give to a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseType {
    Accept,
    Decline,
    Yes,
    No,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Accept => "accept",
            ResponseType::Decline => "decline",
            ResponseType::Yes => "yes",
            ResponseType::No => "no",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = String;

    /// Parses the reply word, with or without a leading `/`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.trim().trim_start_matches('/');
        match word.to_ascii_lowercase().as_str() {
            "accept" => Ok(ResponseType::Accept),
            "decline" => Ok(ResponseType::Decline),
            "yes" | "y" => Ok(ResponseType::Yes),
            "no" | "n" => Ok(ResponseType::No),
            _ => Err(format!("unknown response '{}'", s)),
        }
    }
}

/// Receives the player's reply to a request.
pub trait ResponseHandler: Send + Sync {
    fn on_response(&self, request: &Request, response: ResponseType) -> anyhow::Result<()>;
}

impl<F> ResponseHandler for F
where
    F: Fn(&Request, ResponseType) -> anyhow::Result<()> + Send + Sync,
{
    fn on_response(&self, request: &Request, response: ResponseType) -> anyhow::Result<()> {
        self(request, response)
    }
}

#[derive(Clone)]
pub struct Request {
    id: Uuid,
    context: String,
    player: PlayerId,
    accepted: Vec<ResponseType>,
    created_at: Instant,
    created_wall: DateTime<Utc>,
    ttl: Duration,
    handler: Arc<dyn ResponseHandler>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("context", &self.context)
            .field("player", &self.player)
            .field("accepted", &self.accepted)
            .field("created", &self.created_wall)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl Request {
    pub fn new(
        context: impl Into<String>,
        player: PlayerId,
        accepted: &[ResponseType],
        ttl: Duration,
        handler: impl ResponseHandler + 'static,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            context: context.into(),
            player,
            accepted: accepted.to_vec(),
            created_at: Instant::now(),
            created_wall: Utc::now(),
            ttl,
            handler: Arc::new(handler),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn player(&self) -> &PlayerId {
        &self.player
    }

    pub fn accepted(&self) -> &[ResponseType] {
        &self.accepted
    }

    pub fn accepts(&self, response: ResponseType) -> bool {
        self.accepted.contains(&response)
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn created_wall(&self) -> DateTime<Utc> {
        self.created_wall
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn expires_at(&self) -> Instant {
        self.created_at + self.ttl
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }

    /// Time left to answer, zero once expired.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.expires_at().saturating_duration_since(now)
    }

    fn key(&self) -> RequestKey {
        request_key(&self.context, &self.player)
    }
}

type RequestKey = (String, PlayerId);

/// Contexts match case-insensitively, like the quest names they usually are.
fn request_key(context: &str, player: &PlayerId) -> RequestKey {
    (context.to_ascii_lowercase(), player.clone())
}

/// Bounded, self-expiring set of pending requests keyed by (context, player).
pub struct RequestQueue {
    set: TimedSet<RequestKey, Request>,
}

impl RequestQueue {
    pub fn new(config: &RequestsConfig) -> Self {
        Self::with_limits(config.capacity, config.ttl())
    }

    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        let set = TimedSet::new(capacity, ttl);
        set.on_end(|_, request: &Request, reason| {
            match reason {
                EndReason::Expired => metrics::inc_requests_expired(),
                EndReason::Evicted | EndReason::Replaced => metrics::inc_requests_evicted(),
                EndReason::Cleared => metrics::inc_requests_cancelled(),
            }
            debug!(
                "Request {} for {} in '{}' ended: {:?}",
                request.id, request.player, request.context, reason
            );
        });
        Self { set }
    }

    pub fn capacity(&self) -> usize {
        self.set.capacity()
    }

    /// Default lifetime of requests created through [`request`](Self::request).
    pub fn ttl(&self) -> Duration {
        self.set.default_ttl()
    }

    /// Register a callback for requests that end unanswered (expiry, eviction,
    /// replacement, or [`cancel_all`](Self::cancel_all)).
    pub fn on_end(&self, listener: impl Fn(&Request, EndReason) + Send + Sync + 'static) {
        self.set
            .on_end(move |_, request: &Request, reason| listener(request, reason));
    }

    pub fn add(&self, request: Request) {
        self.add_at(request, Instant::now());
    }

    /// Insert `request`, stamping it as created at `now`. A pending request for
    /// the same (context, player) is replaced.
    pub fn add_at(&self, mut request: Request, now: Instant) {
        request.created_at = now;
        request.created_wall = Utc::now();
        let ttl = request.ttl;
        metrics::inc_requests_created();
        trace!(
            "Queued request {} for {} in '{}'",
            request.id,
            request.player,
            request.context
        );
        self.set.insert_with_ttl_at(request.key(), request, ttl, now);
    }

    /// Create and queue a request using the queue's default lifetime.
    pub fn request(
        &self,
        context: &str,
        player: &PlayerId,
        accepted: &[ResponseType],
        handler: impl ResponseHandler + 'static,
    ) -> Request {
        self.request_at(context, player, accepted, handler, Instant::now())
    }

    pub fn request_at(
        &self,
        context: &str,
        player: &PlayerId,
        accepted: &[ResponseType],
        handler: impl ResponseHandler + 'static,
        now: Instant,
    ) -> Request {
        let mut request = Request::new(context, player.clone(), accepted, self.ttl(), handler);
        request.created_at = now;
        self.add_at(request.clone(), now);
        request
    }

    /// Remove `request` without reporting it as ended. A newer request that
    /// replaced it is left alone.
    pub fn cancel(&self, request: &Request) -> bool {
        let removed = self
            .set
            .remove_if(&request.key(), |pending| pending.id == request.id)
            .is_some();
        if removed {
            metrics::inc_requests_cancelled();
        }
        removed
    }

    /// Drop every pending request, reporting each one to the end listeners.
    pub fn cancel_all(&self) -> usize {
        self.set.clear()
    }

    pub fn lookup(&self, context: &str, player: &PlayerId) -> Option<Request> {
        self.lookup_at(context, player, Instant::now())
    }

    /// The live request for (context, player), if any.
    pub fn lookup_at(&self, context: &str, player: &PlayerId, now: Instant) -> Option<Request> {
        self.set
            .get_at(&request_key(context, player), now)
    }

    pub fn respond(
        &self,
        player: &PlayerId,
        response: ResponseType,
        context: Option<&str>,
    ) -> anyhow::Result<bool> {
        self.respond_at(player, response, context, Instant::now())
    }

    /// Deliver a reply. With a context (matched ignoring ASCII case), only
    /// that request is considered; without one, the player's most recent live
    /// request accepting `response` is used. Returns whether a handler ran.
    pub fn respond_at(
        &self,
        player: &PlayerId,
        response: ResponseType,
        context: Option<&str>,
        now: Instant,
    ) -> anyhow::Result<bool> {
        let taken = match context {
            Some(context) => self
                .set
                .take_if_at(&request_key(context, player), now, |request| {
                    request.accepts(response)
                }),
            None => self
                .set
                .take_newest_at(now, |(_, owner), request| {
                    owner == player && request.accepts(response)
                })
                .map(|(_, request)| request),
        };

        let Some(request) = taken else {
            trace!("No pending request of {} accepts '{}'", player, response);
            return Ok(false);
        };
        metrics::observe_answer(request.created_at, now);
        debug!(
            "{} answered '{}' to request {} in '{}'",
            player, response, request.id, request.context
        );
        request.handler.on_response(&request, response)?;
        Ok(true)
    }

    /// Live requests, oldest first.
    pub fn pending_at(&self, now: Instant) -> Vec<Request> {
        self.set
            .entries_at(now)
            .into_iter()
            .map(|(_, request)| request)
            .collect()
    }

    pub fn pending(&self) -> Vec<Request> {
        self.pending_at(Instant::now())
    }

    /// Requests physically held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn sweep(&self) -> usize {
        self.set.sweep()
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        self.set.sweep_at(now)
    }

    /// Sweep expired requests every `interval` on the tokio runtime. The task
    /// stops once the queue is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let queue: Weak<RequestQueue> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(queue) = queue.upgrade() else {
                    debug!("Request queue dropped; sweeper exiting");
                    break;
                };
                let expired = queue.sweep();
                if expired > 0 {
                    trace!("Swept {} expired request(s)", expired);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn counting_handler(counter: &Arc<AtomicUsize>) -> impl ResponseHandler + 'static {
        let counter = Arc::clone(counter);
        move |_: &Request, _: ResponseType| -> anyhow::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn response_type_parsing() {
        assert_eq!("/accept".parse::<ResponseType>(), Ok(ResponseType::Accept));
        assert_eq!("YES".parse::<ResponseType>(), Ok(ResponseType::Yes));
        assert_eq!("n".parse::<ResponseType>(), Ok(ResponseType::No));
        assert!("/maybe".parse::<ResponseType>().is_err());
    }

    #[test]
    fn reply_in_time_runs_handler_once() {
        let queue = RequestQueue::with_limits(20, Duration::from_secs(30));
        let alice = PlayerId::from("alice");
        let calls = Arc::new(AtomicUsize::new(0));
        let t0 = Instant::now();

        queue.request_at("main", &alice, &[ResponseType::Accept], counting_handler(&calls), t0);
        let at = t0 + Duration::from_secs(29);
        assert!(queue
            .respond_at(&alice, ResponseType::Accept, Some("main"), at)
            .unwrap());
        assert!(!queue
            .respond_at(&alice, ResponseType::Accept, Some("main"), at)
            .unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(queue.lookup_at("main", &alice, at).is_none());
    }

    #[test]
    fn wrong_response_type_is_ignored() {
        let queue = RequestQueue::with_limits(20, Duration::from_secs(30));
        let alice = PlayerId::from("alice");
        let calls = Arc::new(AtomicUsize::new(0));
        let t0 = Instant::now();

        queue.request_at("main", &alice, &[ResponseType::Yes], counting_handler(&calls), t0);
        assert!(!queue
            .respond_at(&alice, ResponseType::Accept, None, t0)
            .unwrap());
        assert!(queue.lookup_at("main", &alice, t0).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn late_reply_is_a_no_op_and_on_end_fires_once() {
        let queue = RequestQueue::with_limits(20, Duration::from_secs(30));
        let alice = PlayerId::from("alice");
        let calls = Arc::new(AtomicUsize::new(0));
        let ended: Arc<Mutex<Vec<EndReason>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ended);
        queue.on_end(move |_, reason| sink.lock().unwrap().push(reason));
        let t0 = Instant::now();

        queue.request_at("main", &alice, &[ResponseType::Accept], counting_handler(&calls), t0);
        let late = t0 + Duration::from_secs(30);
        assert!(!queue
            .respond_at(&alice, ResponseType::Accept, Some("main"), late)
            .unwrap());
        assert_eq!(queue.sweep_at(late), 1);
        assert_eq!(queue.sweep_at(late), 0);
        assert_eq!(*ended.lock().unwrap(), vec![EndReason::Expired]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_ignores_superseded_request() {
        let queue = RequestQueue::with_limits(20, Duration::from_secs(30));
        let alice = PlayerId::from("alice");
        let calls = Arc::new(AtomicUsize::new(0));

        let first = queue.request("main", &alice, &[ResponseType::Yes], counting_handler(&calls));
        let second = queue.request("main", &alice, &[ResponseType::Yes], counting_handler(&calls));
        assert!(!queue.cancel(&first));
        assert_eq!(queue.lookup("main", &alice).map(|r| r.id()), Some(second.id()));
        assert!(queue.cancel(&second));
        assert!(queue.pending().is_empty());
    }

    #[test]
    fn reply_without_context_picks_newest_match() {
        let queue = RequestQueue::with_limits(20, Duration::from_secs(30));
        let alice = PlayerId::from("alice");
        let older = Arc::new(AtomicUsize::new(0));
        let newer = Arc::new(AtomicUsize::new(0));
        let t0 = Instant::now();

        queue.request_at("first", &alice, &[ResponseType::Accept], counting_handler(&older), t0);
        queue.request_at(
            "second",
            &alice,
            &[ResponseType::Accept],
            counting_handler(&newer),
            t0 + Duration::from_secs(1),
        );
        let now = t0 + Duration::from_secs(2);
        assert!(queue
            .respond_at(&alice, ResponseType::Accept, None, now)
            .unwrap());
        assert_eq!(newer.load(Ordering::SeqCst), 1);
        assert_eq!(older.load(Ordering::SeqCst), 0);
        assert!(queue
            .respond_at(&PlayerId::from("bob"), ResponseType::Accept, None, now)
            .map(|answered| !answered)
            .unwrap());
    }

    #[test]
    fn handler_error_is_returned_after_removal() {
        let queue = RequestQueue::with_limits(20, Duration::from_secs(30));
        let alice = PlayerId::from("alice");
        queue.request(
            "main",
            &alice,
            &[ResponseType::Yes],
            |_: &Request, _: ResponseType| -> anyhow::Result<()> { Err(anyhow::anyhow!("nope")) },
        );
        assert!(queue
            .respond(&alice, ResponseType::Yes, Some("main"))
            .is_err());
        assert!(queue.lookup("main", &alice).is_none());
    }
}
