/*
 * Created on Fri Jul 10 2026
 *
 * This file is a part of Skyconf
 * Skyconf is a free and open-source YANG-driven configuration management
 * engine written by Sayan Nandan ("the Author") with the vision to provide
 * safe, transactional network configuration without compromising on
 * correctness or performance.
 *
 * Copyright (c) 2026, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Event notification streams
//!
//! Streams are registered at startup and fan events out to subscriptions.
//! `notify` timestamps the event, wraps it in the RFC 5277 envelope and
//! delivers it to every live subscription on the stream, honoring stop-times
//! and XPath filters; replay-enabled streams append the envelope to a
//! retention-bounded replay buffer which then owns it.
//!
//! A periodic timer (see `services::stream_timer`) expires subscriptions
//! whose stop-time has passed and drops replay entries older than the
//! retention window. Replay for a new subscription with a start-time is
//! driven by a near-now one-shot that walks the buffer in order.

use crate::util::error::{ConfResult, Error};
use crate::xmltree::xmlfmt;
use crate::xpath;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::collections::VecDeque;
use tokio::sync::mpsc::UnboundedSender;

/// The RFC 5277 notification namespace
pub const NOTIFICATION_NS: &str = "urn:ietf:params:xml:ns:netconf:notification:1.0";
/// The stream every engine carries
pub const DEFAULT_STREAM: &str = "NETCONF";

#[derive(Debug, Clone, PartialEq, Eq)]
/// What a session receives over its notification channel
pub enum SessionMsg {
    /// A notification envelope to forward to the client
    Event(String),
    /// Terminal indicator: the subscription on `stream` ended
    SubscriptionDone { stream: String },
    /// The session was killed by a peer
    Kill,
}

#[derive(Debug)]
pub struct Subscription {
    pub stream: String,
    pub xpath: Option<String>,
    pub starttime: Option<DateTime<Utc>>,
    pub stoptime: Option<DateTime<Utc>>,
    pub session: u64,
    tx: UnboundedSender<SessionMsg>,
}

impl Subscription {
    fn deliver(&self, envelope: &str) {
        // a dead receiver just means the session is draining
        let _ = self.tx.send(SessionMsg::Event(envelope.to_owned()));
    }
    fn done(&self) {
        let _ = self.tx.send(SessionMsg::SubscriptionDone {
            stream: self.stream.clone(),
        });
    }
    /// Does the envelope pass this subscription's filter?
    fn matches(&self, envelope: &str) -> bool {
        match &self.xpath {
            None => true,
            Some(filter) if filter.is_empty() => true,
            Some(filter) => match xmlfmt::parse(envelope) {
                Ok(tree) => xpath::eval_expr(&tree, tree.root(), filter).unwrap_or(false),
                Err(_) => false,
            },
        }
    }
}

#[derive(Debug)]
struct ReplayEntry {
    tv: DateTime<Utc>,
    xml: String,
}

#[derive(Debug)]
pub struct EventStream {
    name: String,
    description: String,
    replay_enabled: bool,
    /// replay retention window in seconds; 0 keeps everything
    retention: u64,
    subscriptions: Vec<Subscription>,
    replay: VecDeque<ReplayEntry>,
}

impl EventStream {
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
    pub fn replay_len(&self) -> usize {
        self.replay.len()
    }
}

/// The engine's set of event streams
pub struct StreamSet {
    streams: Vec<EventStream>,
    url_prefix: String,
    publish: bool,
}

impl StreamSet {
    pub fn new(url_prefix: &str, publish: bool) -> Self {
        Self {
            streams: Vec::new(),
            url_prefix: url_prefix.to_owned(),
            publish,
        }
    }
    /// Register a stream; re-registering an existing name is a no-op
    pub fn register(&mut self, name: &str, description: &str, replay_enabled: bool, retention: u64) {
        if self.find(name).is_some() {
            return;
        }
        self.streams.push(EventStream {
            name: name.to_owned(),
            description: description.to_owned(),
            replay_enabled,
            retention,
            subscriptions: Vec::new(),
            replay: VecDeque::new(),
        });
    }
    pub fn find(&self, name: &str) -> Option<&EventStream> {
        self.streams.iter().find(|s| s.name == name)
    }
    fn find_mut(&mut self, name: &str) -> Option<&mut EventStream> {
        self.streams.iter_mut().find(|s| s.name == name)
    }

    /// Add a subscription to a stream
    #[allow(clippy::too_many_arguments)]
    pub fn subscribe(
        &mut self,
        stream: &str,
        xpath: Option<String>,
        starttime: Option<DateTime<Utc>>,
        stoptime: Option<DateTime<Utc>>,
        session: u64,
        tx: UnboundedSender<SessionMsg>,
    ) -> ConfResult<()> {
        let es = self
            .find_mut(stream)
            .ok_or_else(|| Error::operation_failed(format!("Stream {} not found", stream)))?;
        es.subscriptions.push(Subscription {
            stream: stream.to_owned(),
            xpath,
            starttime,
            stoptime,
            session,
            tx,
        });
        Ok(())
    }
    /// Drop a session's subscription on one stream
    pub fn unsubscribe(&mut self, stream: &str, session: u64) {
        if let Some(es) = self.find_mut(stream) {
            es.subscriptions.retain(|s| {
                if s.session == session {
                    s.done();
                    false
                } else {
                    true
                }
            });
        }
    }
    /// Drop every subscription a closing session holds
    pub fn remove_session(&mut self, session: u64) {
        for es in &mut self.streams {
            es.subscriptions.retain(|s| {
                if s.session == session {
                    s.done();
                    false
                } else {
                    true
                }
            });
        }
    }

    /// Wrap an event in the notification envelope
    fn envelope(tv: DateTime<Utc>, event: &str) -> String {
        format!(
            "<notification xmlns=\"{}\"><eventTime>{}</eventTime>{}</notification>",
            NOTIFICATION_NS,
            tv.to_rfc3339_opts(SecondsFormat::Secs, true),
            event
        )
    }

    /// Timestamp an event and distribute it to the stream's subscriptions.
    /// Unknown streams are ignored, matching the behavior of emitting into a
    /// stream nobody registered.
    pub fn notify(&mut self, stream: &str, event: &str, now: DateTime<Utc>) {
        let publish = self.publish;
        let es = match self.find_mut(stream) {
            Some(es) => es,
            None => return,
        };
        let envelope = Self::envelope(now, event);
        // deliver, removing subscriptions whose stop-time has passed
        let mut keep = Vec::with_capacity(es.subscriptions.len());
        for sub in es.subscriptions.drain(..) {
            if sub.stoptime.map(|stop| stop < now).unwrap_or(false) {
                sub.done();
                continue;
            }
            if sub.matches(&envelope) {
                sub.deliver(&envelope);
            }
            keep.push(sub);
        }
        es.subscriptions = keep;
        if es.replay_enabled {
            es.replay.push_back(ReplayEntry {
                tv: now,
                xml: envelope.clone(),
            });
        }
        if publish {
            // single-process stand-in for an external pubsub channel
            log::info!(target: "stream-publish", "{}: {}", stream, envelope);
        }
    }

    /// The replay backlog for a session's subscription on `stream`, filtered
    /// to [start-time, stop-time], in chronological order
    pub fn replay_for(&self, stream: &str, session: u64) -> Vec<String> {
        let es = match self.find(stream) {
            Some(es) => es,
            None => return Vec::new(),
        };
        if !es.replay_enabled {
            return Vec::new();
        }
        let sub = match es.subscriptions.iter().find(|s| s.session == session) {
            Some(sub) => sub,
            None => return Vec::new(),
        };
        // without a start-time this is not a replay subscription
        let start = match sub.starttime {
            Some(start) => start,
            None => return Vec::new(),
        };
        es.replay
            .iter()
            .filter(|r| r.tv >= start && sub.stoptime.map(|stop| r.tv <= stop).unwrap_or(true))
            .map(|r| r.xml.clone())
            .collect()
    }

    /// Deliver the replay backlog to the session's subscription
    pub fn run_replay(&self, stream: &str, session: u64) {
        let backlog = self.replay_for(stream, session);
        if backlog.is_empty() {
            return;
        }
        if let Some(es) = self.find(stream) {
            if let Some(sub) = es.subscriptions.iter().find(|s| s.session == session) {
                for envelope in backlog {
                    sub.deliver(&envelope);
                }
            }
        }
    }

    /// The periodic sweep: expire past-stop-time subscriptions and drop
    /// replay entries older than the retention window
    pub fn timer_sweep(&mut self, now: DateTime<Utc>) {
        for es in &mut self.streams {
            es.subscriptions.retain(|s| {
                if s.stoptime.map(|stop| stop < now).unwrap_or(false) {
                    s.done();
                    false
                } else {
                    true
                }
            });
            if es.retention > 0 {
                let horizon = now - Duration::seconds(es.retention as i64);
                while es
                    .replay
                    .front()
                    .map(|r| r.tv < horizon)
                    .unwrap_or(false)
                {
                    es.replay.pop_front();
                }
            }
        }
    }

    /// Stream definition state as XML (RFC 8040 / RFC 5277 shape)
    pub fn state_xml(&self, access: bool) -> String {
        let mut out = String::from("<streams>");
        for es in &self.streams {
            out.push_str("<stream>");
            out.push_str(&format!("<name>{}</name>", es.name));
            if !es.description.is_empty() {
                out.push_str(&format!("<description>{}</description>", es.description));
            }
            out.push_str(&format!(
                "<replay-support>{}</replay-support>",
                if es.replay_enabled { "true" } else { "false" }
            ));
            if access {
                out.push_str("<access><encoding>xml</encoding>");
                out.push_str(&format!(
                    "<location>{}/{}</location>",
                    self.url_prefix, es.name
                ));
                out.push_str("</access>");
            }
            out.push_str("</stream>");
        }
        out.push_str("</streams>");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio::sync::mpsc;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 10, 12, 0, 0).unwrap() + Duration::seconds(secs as i64)
    }

    fn set() -> StreamSet {
        let mut set = StreamSet::new("https://localhost/streams", false);
        set.register(DEFAULT_STREAM, "default NETCONF event stream", true, 60);
        set
    }

    #[test]
    fn test_delivery_order_and_envelope() {
        let mut set = set();
        let (tx, mut rx) = mpsc::unbounded_channel();
        set.subscribe(DEFAULT_STREAM, None, None, None, 1, tx).unwrap();
        set.notify(DEFAULT_STREAM, "<event><n>a</n></event>", at(0));
        set.notify(DEFAULT_STREAM, "<event><n>b</n></event>", at(1));
        let first = match rx.try_recv().unwrap() {
            SessionMsg::Event(e) => e,
            other => panic!("unexpected {:?}", other),
        };
        assert!(first.starts_with(&format!("<notification xmlns=\"{}\">", NOTIFICATION_NS)));
        assert!(first.contains("<eventTime>"));
        assert!(first.contains("<n>a</n>"));
        let second = match rx.try_recv().unwrap() {
            SessionMsg::Event(e) => e,
            other => panic!("unexpected {:?}", other),
        };
        assert!(second.contains("<n>b</n>"));
    }

    #[test]
    fn test_filter_skips_non_matching() {
        let mut set = set();
        let (tx, mut rx) = mpsc::unbounded_channel();
        set.subscribe(
            DEFAULT_STREAM,
            Some("event/severity='major'".to_owned()),
            None,
            None,
            1,
            tx,
        )
        .unwrap();
        set.notify(DEFAULT_STREAM, "<event><severity>minor</severity></event>", at(0));
        assert!(rx.try_recv().is_err());
        set.notify(DEFAULT_STREAM, "<event><severity>major</severity></event>", at(1));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_stoptime_terminates() {
        let mut set = set();
        let (tx, mut rx) = mpsc::unbounded_channel();
        set.subscribe(DEFAULT_STREAM, None, None, Some(at(2)), 1, tx).unwrap();
        set.notify(DEFAULT_STREAM, "<event/>", at(1));
        assert!(matches!(rx.try_recv().unwrap(), SessionMsg::Event(_)));
        // past stop-time: terminal indicator instead of the event
        set.notify(DEFAULT_STREAM, "<event/>", at(3));
        assert!(matches!(
            rx.try_recv().unwrap(),
            SessionMsg::SubscriptionDone { .. }
        ));
        assert_eq!(set.find(DEFAULT_STREAM).unwrap().subscription_count(), 0);
    }

    #[test]
    fn test_timer_sweep_expires_and_trims() {
        let mut set = set();
        let (tx, mut rx) = mpsc::unbounded_channel();
        set.subscribe(DEFAULT_STREAM, None, None, Some(at(1)), 1, tx).unwrap();
        set.notify(DEFAULT_STREAM, "<event/>", at(0));
        let _ = rx.try_recv();
        set.timer_sweep(at(2));
        assert!(matches!(
            rx.try_recv().unwrap(),
            SessionMsg::SubscriptionDone { .. }
        ));
        // replay trimming: retention is 60s
        assert_eq!(set.find(DEFAULT_STREAM).unwrap().replay_len(), 1);
        set.timer_sweep(at(100));
        assert_eq!(set.find(DEFAULT_STREAM).unwrap().replay_len(), 0);
    }

    #[test]
    fn test_replay_range_and_order() {
        let mut set = set();
        set.notify(DEFAULT_STREAM, "<event><n>a</n></event>", at(10));
        set.notify(DEFAULT_STREAM, "<event><n>b</n></event>", at(11));
        set.notify(DEFAULT_STREAM, "<event><n>c</n></event>", at(20));
        let (tx, mut rx) = mpsc::unbounded_channel();
        set.subscribe(DEFAULT_STREAM, None, Some(at(9)), Some(at(12)), 7, tx)
            .unwrap();
        set.run_replay(DEFAULT_STREAM, 7);
        let events: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|m| match m {
                SessionMsg::Event(e) => e,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(events.len(), 2);
        assert!(events[0].contains("<n>a</n>"));
        assert!(events[1].contains("<n>b</n>"));
    }

    #[test]
    fn test_replay_needs_start_time() {
        let mut set = set();
        set.notify(DEFAULT_STREAM, "<event/>", at(0));
        let (tx, _rx) = mpsc::unbounded_channel();
        set.subscribe(DEFAULT_STREAM, None, None, None, 3, tx).unwrap();
        assert!(set.replay_for(DEFAULT_STREAM, 3).is_empty());
    }

    #[test]
    fn test_state_xml() {
        let set = set();
        let xml = set.state_xml(true);
        assert!(xml.contains("<name>NETCONF</name>"));
        assert!(xml.contains("<replay-support>true</replay-support>"));
        assert!(xml.contains("<location>https://localhost/streams/NETCONF</location>"));
        let bare = set.state_xml(false);
        assert!(!bare.contains("<access>"));
    }

    #[test]
    fn test_publish_does_not_disturb_delivery() {
        let mut set = StreamSet::new("https://localhost/streams", true);
        set.register(DEFAULT_STREAM, "default NETCONF event stream", false, 0);
        let (tx, mut rx) = mpsc::unbounded_channel();
        set.subscribe(DEFAULT_STREAM, None, None, None, 1, tx).unwrap();
        set.notify(DEFAULT_STREAM, "<event/>", at(0));
        assert!(matches!(rx.try_recv().unwrap(), SessionMsg::Event(_)));
        // replay is off for this stream, so nothing is buffered
        assert_eq!(set.find(DEFAULT_STREAM).unwrap().replay_len(), 0);
    }

    #[test]
    fn test_unknown_stream_subscribe_fails() {
        let mut set = set();
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(set.subscribe("BOGUS", None, None, None, 1, tx).is_err());
    }
}
