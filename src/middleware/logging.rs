use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

/// Request logging middleware that adds structured logging for all HTTP requests
pub async fn request_logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let uri = req.uri().clone();
    let matched_path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_owned())
        .unwrap_or_else(|| "unknown".to_owned());
    let remote_addr = req
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    // path only, the query string may carry credentials
    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %matched_path,
        uri = %uri.path(),
        remote_addr = %remote_addr,
        "incoming request"
    );

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status();

    match status.as_u16() {
        400..=499 => {
            tracing::warn!(
                request_id = %request_id,
                method = %method,
                path = %matched_path,
                status = %status.as_u16(),
                duration_ms = %duration.as_millis(),
                "request completed (client error)"
            );
        }
        500..=599 => {
            tracing::error!(
                request_id = %request_id,
                method = %method,
                path = %matched_path,
                status = %status.as_u16(),
                duration_ms = %duration.as_millis(),
                "request completed (server error)"
            );
        }
        _ => {
            tracing::info!(
                request_id = %request_id,
                method = %method,
                path = %matched_path,
                status = %status.as_u16(),
                duration_ms = %duration.as_millis(),
                "request completed"
            );
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use crate::config::RelayConfig;
    use crate::{app, AppState};
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Collects the `path` field of every event this crate emits.
    #[derive(Clone, Default)]
    struct LoggedPaths(Arc<Mutex<Vec<String>>>);

    struct PathVisitor(Option<String>);

    impl Visit for PathVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "path" {
                self.0 = Some(format!("{:?}", value));
            }
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for LoggedPaths {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if !event.metadata().target().starts_with("vidscript") {
                return;
            }
            let mut visitor = PathVisitor(None);
            event.record(&mut visitor);
            if let Some(path) = visitor.0 {
                self.0.lock().unwrap().push(path);
            }
        }
    }

    #[tokio::test]
    async fn test_logs_carry_the_matched_route() {
        let logged = LoggedPaths::default();
        // current-thread runtime, so the server task logs through this default too
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(logged.clone()));

        let config = RelayConfig::from_lookup(|name| match name {
            "GOOGLE_API_KEY" => Some("k".to_string()),
            _ => None,
        })
        .unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = app(Arc::new(AppState::new(&config)));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let client = reqwest::Client::new();
        let status = client.get(format!("http://{}/api/status", addr)).send().await.unwrap();
        assert_eq!(status.status(), 200);
        let rejected = client
            .post(format!("http://{}/api/generateScript", addr))
            .json(&serde_json::json!({ "prompt": "" }))
            .send()
            .await
            .unwrap();
        assert_eq!(rejected.status(), 400);

        let paths = logged.0.lock().unwrap().clone();
        assert!(!paths.contains(&"unknown".to_string()), "{:?}", paths);
        assert_eq!(paths.iter().filter(|p| *p == "/api/status").count(), 2);
        assert_eq!(paths.iter().filter(|p| *p == "/api/generateScript").count(), 2);
    }
}
