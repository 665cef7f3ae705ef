//! Call record status tracking for server-placed calls.
//!
//! A realtime subscription and a polling timer watch the same record. The
//! first terminal status seen from either one ends the call; the dialer then
//! tears both down, so only one end is ever processed.
//!
//! Polling starts as soon as tracking does. The subscription is opened
//! alongside it and never holds up the caller: a connect that has not
//! finished on the first poll is driven from [`Reconciliation::next_observation`]
//! and abandoned after the subscribe timeout.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::ApiError;
use crate::models::CallRecordStatus;
use crate::phone::{CallRecordSource, RealtimeFeed, StatusStream};
use crate::state::EndSource;

/// A status read for the session's call record.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub session_id: Uuid,
    pub status: CallRecordStatus,
    pub source: EndSource,
}

type Subscribing = BoxFuture<'static, Result<StatusStream, ApiError>>;

enum RealtimeLink {
    Subscribing(Mutex<Subscribing>),
    Live(StatusStream),
    Off,
}

pub struct Reconciliation {
    session_id: Uuid,
    call_record_id: String,
    realtime: RealtimeLink,
    poll: Interval,
    torn_down: bool,
}

enum Wake {
    Subscribed(Result<StatusStream, ApiError>),
    Realtime(Option<CallRecordStatus>),
    Tick,
}

async fn next_realtime(link: &mut RealtimeLink) -> Wake {
    match link {
        RealtimeLink::Subscribing(subscribing) => Wake::Subscribed(
            subscribing.get_mut().unwrap_or_else(|e| e.into_inner()).await,
        ),
        RealtimeLink::Live(stream) => Wake::Realtime(stream.recv().await),
        RealtimeLink::Off => std::future::pending().await,
    }
}

fn subscribe(
    feed: Arc<dyn RealtimeFeed>,
    call_record_id: String,
    limit: Duration,
) -> Subscribing {
    async move {
        match tokio::time::timeout(limit, feed.subscribe(&call_record_id)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Realtime(format!(
                "subscription timed out after {}s",
                limit.as_secs()
            ))),
        }
    }
    .boxed()
}

impl RealtimeLink {
    fn settle(result: Result<StatusStream, ApiError>) -> Self {
        match result {
            Ok(stream) => RealtimeLink::Live(stream),
            Err(e) => {
                warn!("Realtime subscription failed, polling only: {}", e);
                RealtimeLink::Off
            }
        }
    }
}

impl Reconciliation {
    /// Arm the polling timer and open the subscription. Returns without
    /// waiting on the network; a feed that answers straight away is live
    /// on return.
    pub fn start(
        feed: Arc<dyn RealtimeFeed>,
        session_id: Uuid,
        call_record_id: String,
        poll_interval: Duration,
        subscribe_timeout: Duration,
    ) -> Self {
        let mut poll = interval_at(Instant::now() + poll_interval, poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut subscribing = subscribe(feed, call_record_id.clone(), subscribe_timeout);
        let realtime = match (&mut subscribing).now_or_never() {
            Some(result) => RealtimeLink::settle(result),
            None => {
                debug!("Realtime subscription for {} still connecting", call_record_id);
                RealtimeLink::Subscribing(Mutex::new(subscribing))
            }
        };

        info!("Tracking call record {} for session {}", call_record_id, session_id);

        Self {
            session_id,
            call_record_id,
            realtime,
            poll,
            torn_down: false,
        }
    }

    pub fn call_record_id(&self) -> &str {
        &self.call_record_id
    }

    pub fn has_realtime(&self) -> bool {
        matches!(self.realtime, RealtimeLink::Live(_))
    }

    pub fn is_subscribing(&self) -> bool {
        matches!(self.realtime, RealtimeLink::Subscribing(_))
    }

    pub fn is_active(&self) -> bool {
        !self.torn_down
    }

    /// Wait for the next status from either source. Polling errors are
    /// logged and retried on the next tick.
    pub async fn next_observation(&mut self, records: &dyn CallRecordSource) -> Observation {
        loop {
            if self.torn_down {
                return std::future::pending().await;
            }

            let wake = tokio::select! {
                wake = next_realtime(&mut self.realtime) => wake,
                _ = self.poll.tick() => Wake::Tick,
            };

            match wake {
                Wake::Subscribed(result) => {
                    self.realtime = RealtimeLink::settle(result);
                    if self.has_realtime() {
                        info!("Realtime subscription for {} is live", self.call_record_id);
                    }
                }
                Wake::Realtime(Some(status)) => {
                    return self.observation(status, EndSource::Realtime);
                }
                Wake::Realtime(None) => {
                    warn!("Realtime feed closed for {}, polling only", self.call_record_id);
                    self.realtime = RealtimeLink::Off;
                }
                Wake::Tick => match records.fetch_status(&self.call_record_id).await {
                    Ok(Some(status)) => return self.observation(status, EndSource::Polling),
                    Ok(None) => debug!("Call record {} not found yet", self.call_record_id),
                    Err(e) => warn!("Polling error for {}: {}", self.call_record_id, e),
                },
            }
        }
    }

    fn observation(&self, status: CallRecordStatus, source: EndSource) -> Observation {
        Observation {
            session_id: self.session_id,
            status,
            source,
        }
    }

    /// Unsubscribe and stop polling. A subscription still connecting is
    /// dropped. Returns false if already torn down.
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        if let RealtimeLink::Live(mut stream) = std::mem::replace(&mut self.realtime, RealtimeLink::Off) {
            stream.unsubscribe();
        }
        info!("Stopped tracking call record {}", self.call_record_id);
        true
    }
}

impl Drop for Reconciliation {
    fn drop(&mut self) {
        self.teardown();
    }
}
