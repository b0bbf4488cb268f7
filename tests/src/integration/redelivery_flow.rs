//! Redelivery with eventual success, end to end.

#[cfg(test)]
mod tests {
    use om_01_redelivery::{RedeliveryConfig, RedeliveryService};
    use shared_bus::{
        message::topics, MemoryBroker, Message, MessageBus, QueueDeclaration, SubscribeOptions,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{timeout, Instant};

    fn scenario_config() -> RedeliveryConfig {
        RedeliveryConfig {
            max_attempts: 5,
            initial_interval: Duration::from_millis(50),
            multiplier: 2.0,
            max_interval: Duration::from_millis(400),
        }
    }

    #[tokio::test]
    async fn test_nack_twice_then_ack_within_deadline() {
        let bus = MemoryBroker::new();
        bus.declare_queue(QueueDeclaration::named("inbox").dead_letter_to(topics::REDELIVERY))
            .await
            .unwrap();
        let service = RedeliveryService::new(Arc::new(bus.clone()), scenario_config());
        service.start().await.unwrap();

        let mut inbox = bus
            .subscribe("inbox", SubscribeOptions::default())
            .await
            .unwrap();

        bus.publish("inbox", vec![Message::new(b"M".to_vec())])
            .await
            .unwrap();

        // First delivery: nack.
        let first = timeout(Duration::from_millis(500), inbox.recv())
            .await
            .unwrap()
            .unwrap();
        let t0 = Instant::now();
        assert_eq!(first.message.redelivery_count(), 0);
        first.ack.nack();

        // Immediate redelivery: nack again.
        let second = timeout(Duration::from_millis(100), inbox.recv())
            .await
            .expect("first redelivery should be immediate")
            .unwrap();
        assert_eq!(second.message.redelivery_count(), 1);
        let second_at = t0.elapsed();
        second.ack.nack();

        // Third delivery arrives only after the 50 ms wait interval.
        let third = timeout(Duration::from_millis(500), inbox.recv())
            .await
            .unwrap()
            .unwrap();
        let third_at = t0.elapsed();
        assert_eq!(third.message.redelivery_count(), 2);
        assert!(
            third_at - second_at >= Duration::from_millis(45),
            "wait interval was {:?}",
            third_at - second_at
        );
        assert!(
            third_at <= Duration::from_millis(250),
            "final delivery took {third_at:?}"
        );
        third.ack.ack();

        // Acked: no further deliveries.
        assert!(timeout(Duration::from_millis(150), inbox.recv()).await.is_err());

        service.stop();
    }

    #[tokio::test]
    async fn test_wait_intervals_grow_with_attempts() {
        let bus = MemoryBroker::new();
        bus.declare_queue(QueueDeclaration::named("inbox").dead_letter_to(topics::REDELIVERY))
            .await
            .unwrap();
        let service = RedeliveryService::new(Arc::new(bus.clone()), scenario_config());
        service.start().await.unwrap();

        let mut inbox = bus
            .subscribe("inbox", SubscribeOptions::default())
            .await
            .unwrap();
        bus.publish("inbox", vec![Message::new(b"M".to_vec())])
            .await
            .unwrap();

        // Nack through: original, immediate redelivery, 50 ms wait,
        // 100 ms wait. Collect inter-delivery gaps.
        let mut at = Vec::new();
        let t0 = Instant::now();
        for _ in 0..4 {
            let delivery = timeout(Duration::from_millis(800), inbox.recv())
                .await
                .unwrap()
                .unwrap();
            at.push(t0.elapsed());
            delivery.ack.nack();
        }

        let second_wait = at[3] - at[2];
        let first_wait = at[2] - at[1];
        assert!(first_wait >= Duration::from_millis(45), "{first_wait:?}");
        assert!(second_wait >= Duration::from_millis(90), "{second_wait:?}");

        service.stop();
    }
}
