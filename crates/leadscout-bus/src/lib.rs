use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use leadscout_schema::BusMessage;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum Topic {
    ScrapeStarted,
    ScrapeResumed,
    ScrapeStopped,
    ScrapeCompleted,
    HandleProcessed,
    HandleSkipped,
    LeadUpserted,
    LogLine,
}

impl Topic {
    pub fn from_message(msg: &BusMessage) -> Self {
        match msg {
            BusMessage::ScrapeStarted { .. } => Topic::ScrapeStarted,
            BusMessage::ScrapeResumed { .. } => Topic::ScrapeResumed,
            BusMessage::ScrapeStopped { .. } => Topic::ScrapeStopped,
            BusMessage::ScrapeCompleted { .. } => Topic::ScrapeCompleted,
            BusMessage::HandleProcessed { .. } => Topic::HandleProcessed,
            BusMessage::HandleSkipped { .. } => Topic::HandleSkipped,
            BusMessage::LeadUpserted { .. } => Topic::LeadUpserted,
            BusMessage::LogLine { .. } => Topic::LogLine,
        }
    }

    pub fn all() -> [Topic; 8] {
        [
            Topic::ScrapeStarted,
            Topic::ScrapeResumed,
            Topic::ScrapeStopped,
            Topic::ScrapeCompleted,
            Topic::HandleProcessed,
            Topic::HandleSkipped,
            Topic::LeadUpserted,
            Topic::LogLine,
        ]
    }
}

type Subscriber = mpsc::Sender<BusMessage>;

/// In-process topic bus. Publishing never blocks: slow subscribers drop
/// messages rather than stalling the scrape loop.
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<Topic, Vec<Subscriber>>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    pub async fn subscribe(&self, topic: Topic) -> mpsc::Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subscribers.write().await;
        subs.entry(topic).or_default().push(tx);
        rx
    }

    pub async fn publish(&self, msg: BusMessage) -> Result<()> {
        publish_to(&self.subscribers, msg).await
    }

    pub fn publisher(&self) -> BusPublisher {
        BusPublisher {
            subscribers: self.subscribers.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BusPublisher {
    subscribers: Arc<RwLock<HashMap<Topic, Vec<Subscriber>>>>,
}

impl BusPublisher {
    pub async fn publish(&self, msg: BusMessage) -> Result<()> {
        publish_to(&self.subscribers, msg).await
    }
}

async fn publish_to(
    subscribers: &RwLock<HashMap<Topic, Vec<Subscriber>>>,
    msg: BusMessage,
) -> Result<()> {
    let topic = Topic::from_message(&msg);
    let subs = subscribers.read().await;
    if let Some(subscribers) = subs.get(&topic) {
        for tx in subscribers {
            let _ = tx.try_send(msg.clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadscout_schema::ScrapeMode;
    use tokio::time::{timeout, Duration};
    use uuid::Uuid;

    fn started_message() -> BusMessage {
        BusMessage::ScrapeStarted {
            trace_id: Uuid::new_v4(),
            mode: ScrapeMode::Leads,
            rescan: false,
        }
    }

    #[tokio::test]
    async fn publish_to_no_subscribers_succeeds() {
        let bus = EventBus::new(8);
        assert!(bus.publish(started_message()).await.is_ok());
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe(Topic::ScrapeStarted).await;

        bus.publish(started_message()).await.unwrap();

        let received = timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(received, BusMessage::ScrapeStarted { .. }));
    }

    #[tokio::test]
    async fn topic_routing_is_exclusive() {
        let bus = EventBus::new(8);
        let mut rx_log = bus.subscribe(Topic::LogLine).await;
        let mut rx_started = bus.subscribe(Topic::ScrapeStarted).await;

        bus.publish(BusMessage::log("scanning 4 threads")).await.unwrap();

        let received = timeout(Duration::from_millis(100), rx_log.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(received, BusMessage::LogLine { .. }));
        assert!(rx_started.try_recv().is_err());
    }

    #[tokio::test]
    async fn publisher_clone_reaches_subscribers() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe(Topic::LeadUpserted).await;
        let publisher = bus.publisher();

        publisher
            .publish(BusMessage::LeadUpserted {
                counterparty_id: "acct-1".into(),
                positive_message_count: 2,
            })
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match received {
            BusMessage::LeadUpserted {
                positive_message_count,
                ..
            } => assert_eq!(positive_message_count, 2),
            _ => panic!("expected LeadUpserted"),
        }
    }

    #[tokio::test]
    async fn full_subscriber_does_not_block_publish() {
        let bus = EventBus::new(1);
        let _rx = bus.subscribe(Topic::LogLine).await;

        // Second publish overflows the capacity-1 channel; must not error.
        bus.publish(BusMessage::log("first")).await.unwrap();
        bus.publish(BusMessage::log("second")).await.unwrap();
    }
}
