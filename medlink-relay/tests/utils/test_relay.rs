use anyhow::{Context, Result};
use medlink_relay::{RelayConfig, RelayService};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// A relay bound to an ephemeral localhost port plus a raw JSON client for it.
pub struct TestRelay {
    pub base_url: String,
    pub service: RelayService,
    http: reqwest::Client,
    _server: tokio::task::JoinHandle<()>,
}

impl TestRelay {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind relay listener")?;
        let addr = listener.local_addr()?;
        let service = RelayService::new(RelayConfig::default());

        let server = tokio::spawn({
            let service = service.clone();
            async move {
                let _ = medlink_relay::serve(listener, service).await;
            }
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            service,
            http: reqwest::Client::new(),
            _server: server,
        })
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<(StatusCode, Value)> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {path} failed"))?;
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }

    pub async fn get(&self, path: &str) -> Result<(StatusCode, Value)> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .with_context(|| format!("GET {path} failed"))?;
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }

    pub async fn register(&self, peer_id: &str, peer_type: &str, room: Option<&str>) -> Result<()> {
        let mut body = json!({ "peer_id": peer_id, "peer_type": peer_type });
        if let Some(room) = room {
            body["room"] = json!(room);
        }
        let (status, _) = self.post("/webrtc/register", body).await?;
        anyhow::ensure!(status.is_success(), "register returned {status}");
        Ok(())
    }

    pub async fn messages(&self, peer_id: &str) -> Result<Vec<Value>> {
        let (_, body) = self.get(&format!("/webrtc/messages/{peer_id}")).await?;
        Ok(body["messages"].as_array().cloned().unwrap_or_default())
    }
}
