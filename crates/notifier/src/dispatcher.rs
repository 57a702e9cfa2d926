//! Dispatcher: delivers a batch of newly-free promotions to every subscriber.
//!
//! Delivery is strictly sequential: one recipient at a time, one message at a
//! time, with a fixed pause between promotion messages and between recipients.
//! That pacing is what keeps us under the delivery channel's rate limits, so
//! recipients must not be fanned out in parallel.
//!
//! A failure for one recipient stops that recipient's remaining messages and is
//! recorded in their outcome; the next recipient proceeds normally. There is no
//! retry within a cycle.

use std::sync::Arc;
use std::time::Duration;

use lootwatch_common::error::AppError;
use lootwatch_common::types::{FreePromotion, Subscriber};

use crate::channel::DeliveryChannel;
use crate::message;

/// Pauses inserted between outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPacing {
    /// Between successive promotion messages to the same recipient
    pub message_delay: Duration,
    /// Between successive recipients
    pub recipient_delay: Duration,
}

impl DispatchPacing {
    pub fn new(message_delay: Duration, recipient_delay: Duration) -> Self {
        Self {
            message_delay,
            recipient_delay,
        }
    }

    /// No pauses at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

impl Default for DispatchPacing {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_millis(1000))
    }
}

/// Result of delivering one broadcast to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientOutcome {
    pub subscriber_id: i64,
    pub display_name: String,
    /// Messages successfully sent before completion or failure
    pub messages_sent: usize,
    /// `None` when every message went through
    pub error: Option<String>,
}

impl RecipientOutcome {
    pub fn is_delivered(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-recipient outcomes of one broadcast, in recipient order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub outcomes: Vec<RecipientOutcome>,
}

impl BroadcastReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_delivered()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }
}

pub struct Dispatcher {
    channel: Arc<dyn DeliveryChannel>,
    pacing: DispatchPacing,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn DeliveryChannel>, pacing: DispatchPacing) -> Self {
        Self { channel, pacing }
    }

    /// Deliver the announcement for `promotions` to every recipient, sequentially.
    pub async fn broadcast(
        &self,
        promotions: &[FreePromotion],
        recipients: &[Subscriber],
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        if promotions.is_empty() {
            tracing::warn!("Broadcast requested with no promotions, nothing to send");
            return report;
        }

        for (index, recipient) in recipients.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.pacing.recipient_delay).await;
            }

            let mut messages_sent = 0;
            let error = match self
                .deliver_to(recipient, promotions, &mut messages_sent)
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        subscriber_id = recipient.id,
                        display_name = %recipient.display_name,
                        messages_sent,
                        "Announcement delivered"
                    );
                    None
                }
                Err(e) => {
                    tracing::warn!(
                        subscriber_id = recipient.id,
                        display_name = %recipient.display_name,
                        channel = self.channel.name(),
                        messages_sent,
                        error = %e,
                        "Announcement delivery failed"
                    );
                    Some(e.to_string())
                }
            };

            report.outcomes.push(RecipientOutcome {
                subscriber_id: recipient.id,
                display_name: recipient.display_name.clone(),
                messages_sent,
                error,
            });
        }

        tracing::info!(
            promotions = promotions.len(),
            recipients = recipients.len(),
            delivered = report.delivered(),
            failed = report.failed(),
            "Broadcast finished"
        );

        report
    }

    /// Intro, one message per promotion, closing advisory.
    async fn deliver_to(
        &self,
        recipient: &Subscriber,
        promotions: &[FreePromotion],
        messages_sent: &mut usize,
    ) -> Result<(), AppError> {
        let address = recipient.delivery_address.as_str();

        self.channel
            .send(address, &message::intro(promotions.len()))
            .await?;
        *messages_sent += 1;

        for (index, promo) in promotions.iter().enumerate() {
            self.channel.send(address, &message::promotion(promo)).await?;
            *messages_sent += 1;

            if index + 1 < promotions.len() {
                tokio::time::sleep(self.pacing.message_delay).await;
            }
        }

        self.channel.send(address, message::CLOSING_MESSAGE).await?;
        *messages_sent += 1;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Records every successful send; fails every send to the given addresses.
    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<(String, String)>>,
        failing: HashSet<String>,
        /// Fail the Nth send (0-based) to any address, counting all attempts.
        fail_on_attempt: Option<usize>,
        attempts: Mutex<usize>,
    }

    impl RecordingChannel {
        fn failing_for(addresses: &[&str]) -> Self {
            Self {
                failing: addresses.iter().map(|a| a.to_string()).collect(),
                ..Default::default()
            }
        }

        fn sent_to(&self, address: &str) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(a, _)| a == address)
                .map(|(_, t)| t.clone())
                .collect()
        }
    }

    #[async_trait]
    impl DeliveryChannel for RecordingChannel {
        async fn send(&self, address: &str, text: &str) -> Result<(), AppError> {
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                let current = *attempts;
                *attempts += 1;
                current
            };

            if self.failing.contains(address) || self.fail_on_attempt == Some(attempt) {
                return Err(AppError::Delivery(format!("chat {} unreachable", address)));
            }
            self.sent
                .lock()
                .unwrap()
                .push((address.to_string(), text.to_string()));
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn subscriber(id: i64) -> Subscriber {
        Subscriber {
            id,
            display_name: format!("user{}", id),
            delivery_address: format!("chat-{}", id),
            subscribed: true,
        }
    }

    fn promo(id: &str) -> FreePromotion {
        FreePromotion {
            id: id.to_string(),
            title: format!("Game {}", id),
            url: format!("https://store.epicgames.com/it/p/{}", id),
            end_date: None,
        }
    }

    #[tokio::test]
    async fn test_each_recipient_gets_intro_promotions_and_closing() {
        let channel = Arc::new(RecordingChannel::default());
        let dispatcher = Dispatcher::new(channel.clone(), DispatchPacing::none());

        let report = dispatcher
            .broadcast(&[promo("a"), promo("b")], &[subscriber(1), subscriber(2)])
            .await;

        assert_eq!(report.delivered(), 2);
        assert_eq!(report.failed(), 0);

        for address in ["chat-1", "chat-2"] {
            let msgs = channel.sent_to(address);
            assert_eq!(msgs.len(), 4);
            assert!(msgs[0].contains("There are 2 free games"));
            assert!(msgs[1].contains("Game a"));
            assert!(msgs[2].contains("Game b"));
            assert_eq!(msgs[3], message::CLOSING_MESSAGE);
        }
    }

    #[tokio::test]
    async fn test_failing_recipient_is_isolated() {
        let channel = Arc::new(RecordingChannel::failing_for(&["chat-2"]));
        let dispatcher = Dispatcher::new(channel.clone(), DispatchPacing::none());

        let report = dispatcher
            .broadcast(
                &[promo("a")],
                &[subscriber(1), subscriber(2), subscriber(3)],
            )
            .await;

        assert_eq!(report.outcomes.len(), 3);
        assert!(report.outcomes[0].is_delivered());
        assert!(!report.outcomes[1].is_delivered());
        assert!(report.outcomes[2].is_delivered());
        assert_eq!(report.outcomes[1].messages_sent, 0);

        assert_eq!(channel.sent_to("chat-1").len(), 3);
        assert!(channel.sent_to("chat-2").is_empty());
        assert_eq!(channel.sent_to("chat-3").len(), 3);
    }

    #[tokio::test]
    async fn test_mid_sequence_failure_stops_that_recipient_only() {
        // Attempt 0 = intro, 1 = first promo, 2 = second promo → fail there.
        let channel = Arc::new(RecordingChannel {
            fail_on_attempt: Some(2),
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(channel.clone(), DispatchPacing::none());

        let report = dispatcher
            .broadcast(&[promo("a"), promo("b")], &[subscriber(1), subscriber(2)])
            .await;

        assert_eq!(report.outcomes[0].messages_sent, 2);
        assert!(report.outcomes[0].error.is_some());
        assert!(report.outcomes[1].is_delivered());
        assert_eq!(channel.sent_to("chat-1").len(), 2);
        assert_eq!(channel.sent_to("chat-2").len(), 4);
    }

    #[tokio::test]
    async fn test_empty_promotions_sends_nothing() {
        let channel = Arc::new(RecordingChannel::default());
        let dispatcher = Dispatcher::new(channel.clone(), DispatchPacing::none());

        let report = dispatcher.broadcast(&[], &[subscriber(1)]).await;

        assert!(report.outcomes.is_empty());
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_recipients_is_empty_report() {
        let channel = Arc::new(RecordingChannel::default());
        let dispatcher = Dispatcher::new(channel, DispatchPacing::none());

        let report = dispatcher.broadcast(&[promo("a")], &[]).await;
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_pacing_is_applied_between_messages_and_recipients() {
        let channel = Arc::new(RecordingChannel::default());
        let pacing = DispatchPacing::new(Duration::from_millis(20), Duration::from_millis(30));
        let dispatcher = Dispatcher::new(channel, pacing);

        let started = std::time::Instant::now();
        dispatcher
            .broadcast(&[promo("a"), promo("b")], &[subscriber(1), subscriber(2)])
            .await;

        // 2 recipients × 1 inter-promotion pause + 1 inter-recipient pause.
        assert!(started.elapsed() >= Duration::from_millis(2 * 20 + 30));
    }
}
