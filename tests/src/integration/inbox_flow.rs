//! HTTP ingest through the pipeline to storage.

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use node_runtime::{Node, NodeConfig};
    use om_03_activity_store::{collect_all, ActivityStore, Criteria};
    use shared_crypto::StaticKeyResolver;
    use shared_types::{Activity, ActivityKind, Iri, ReferenceType};
    use std::time::Duration;
    use tower::ServiceExt;

    fn iri(s: &str) -> Iri {
        Iri::parse(s).unwrap()
    }

    fn config() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.auth_tokens = vec!["test-token".to_string()];
        config
    }

    fn create_activity() -> Activity {
        Activity::new(
            iri("https://peer1/a1"),
            ActivityKind::Create,
            iri("https://peer1"),
        )
        .published(Utc::now())
        .object(serde_json::json!({"id": "https://peer1/obj1", "type": "AnchorEvent"}))
    }

    fn post(activity: &Activity, path: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("authorization", "Bearer test-token")
            .body(Body::from(serde_json::to_vec(activity).unwrap()))
            .unwrap()
    }

    async fn wait_until_stored(node: &Node, id: &Iri) {
        for _ in 0..100 {
            if node.store.get_activity(id).await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("activity {id} not stored within 500ms");
    }

    async fn inbox_members(node: &Node, service: &Iri) -> Vec<Iri> {
        let iterator = node
            .store
            .query_references(ReferenceType::Inbox, &Criteria::for_object(service.clone()))
            .await
            .unwrap();
        collect_all(iterator).unwrap()
    }

    #[tokio::test]
    async fn test_happy_inbox_delivery() {
        let config = config();
        let service = config.service_iri.clone();
        let path = config.inbox_path.clone();
        let node = Node::build(config, Box::new(StaticKeyResolver::new()))
            .await
            .unwrap();
        node.start().await.unwrap();

        let activity = create_activity();
        let response = node
            .router()
            .oneshot(post(&activity, &path))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        wait_until_stored(&node, &activity.id).await;
        assert_eq!(inbox_members(&node, &service).await, vec![activity.id]);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_duplicate_ingestion_adds_nothing() {
        let config = config();
        let service = config.service_iri.clone();
        let path = config.inbox_path.clone();
        let node = Node::build(config, Box::new(StaticKeyResolver::new()))
            .await
            .unwrap();
        node.start().await.unwrap();

        let activity = create_activity();

        // Pre-insert: the activity was already handled and referenced.
        node.store.put_activity(&activity).await.unwrap();
        node.store
            .add_reference(ReferenceType::Inbox, &service, &activity.id)
            .await
            .unwrap();

        let response = node
            .router()
            .oneshot(post(&activity, &path))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Give the router time to observe and ack the duplicate.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(
            inbox_members(&node, &service).await,
            vec![activity.id],
            "no new reference row for a duplicate"
        );

        node.stop().await;
    }

    #[tokio::test]
    async fn test_unauthenticated_post_is_rejected() {
        let config = config();
        let path = config.inbox_path.clone();
        let node = Node::build(config, Box::new(StaticKeyResolver::new()))
            .await
            .unwrap();
        node.start().await.unwrap();

        let request = Request::builder()
            .method("POST")
            .uri(path.as_str())
            .body(Body::from(
                serde_json::to_vec(&create_activity()).unwrap(),
            ))
            .unwrap();
        let response = node.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_maintenance_mode_gates_ingest() {
        let config = config();
        let path = config.inbox_path.clone();
        let node = Node::build(config, Box::new(StaticKeyResolver::new()))
            .await
            .unwrap();
        node.start().await.unwrap();
        node.maintenance().set(true);

        let response = node
            .router()
            .oneshot(post(&create_activity(), &path))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        node.maintenance().set(false);
        let response = node
            .router()
            .oneshot(post(&create_activity(), &path))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        node.stop().await;
    }
}
