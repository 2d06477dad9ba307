//! HTTP探测器实现
//!
//! 对单个检查执行一次带超时的网络请求，并把所有错误收敛到探测结果中

use crate::check::CheckDefinition;
use crate::health::result::{ProbeFailure, ProbeOutcome};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{redirect, Client};
use std::time::Instant;
use tokio::time::timeout;
use tracing::debug;

/// 探测器trait，定义探测接口
///
/// 实现不得返回错误或panic到调用方，所有失败都要记录在 [`ProbeOutcome`] 中。
#[async_trait]
pub trait Prober: Send + Sync {
    /// 执行一次探测
    ///
    /// # 参数
    /// * `definition` - 检查定义
    ///
    /// # 返回
    /// * `ProbeOutcome` - 探测结果
    async fn probe(&self, definition: &CheckDefinition) -> ProbeOutcome;
}

/// HTTP探测器实现
pub struct HttpProber {
    /// HTTP客户端
    client: Client,
}

impl HttpProber {
    /// 创建新的HTTP探测器
    ///
    /// 客户端不跟随重定向，第一次响应的状态码就是探测结果。
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .redirect(redirect::Policy::none())
            .build()
            .context("创建HTTP客户端失败")?;

        Ok(Self { client })
    }

    /// 使用已有的客户端创建探测器
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// 把请求错误归类为探测失败原因
    fn classify_error(error: &reqwest::Error) -> ProbeFailure {
        if error.is_timeout() {
            ProbeFailure::Timeout
        } else if error.is_connect() {
            ProbeFailure::Connect(Self::describe_error(error))
        } else {
            ProbeFailure::Transport(Self::describe_error(error))
        }
    }

    /// 格式化请求错误信息，使其更加清晰易读
    fn describe_error(error: &reqwest::Error) -> String {
        let error_str = error.to_string();
        if error_str.contains("dns") || error_str.contains("DNS") {
            "DNS resolution failed".to_string()
        } else if error_str.contains("certificate")
            || error_str.contains("tls")
            || error_str.contains("ssl")
        {
            "SSL/TLS certificate error".to_string()
        } else if error.is_connect() {
            "Connection refused".to_string()
        } else if error.is_request() {
            "Invalid request".to_string()
        } else {
            error_str
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, definition: &CheckDefinition) -> ProbeOutcome {
        let endpoint = definition.endpoint();
        let started = Instant::now();

        let request = self
            .client
            .request(definition.method.to_http_method(), &endpoint)
            .timeout(definition.timeout())
            .send();

        // 客户端超时之外再加一层墙钟超时，覆盖连接建立阶段
        let outcome = match timeout(definition.timeout(), request).await {
            Ok(Ok(response)) => ProbeOutcome::responded(response.status().as_u16()),
            Ok(Err(e)) => ProbeOutcome::failed(Self::classify_error(&e)),
            Err(_) => ProbeOutcome::failed(ProbeFailure::Timeout),
        }
        .with_elapsed(started.elapsed());

        debug!(
            "探测完成: {} {} -> {:?} ({}ms)",
            definition.method,
            endpoint,
            outcome.response_code,
            outcome.elapsed_ms()
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckMethod, CheckState, Protocol};
    use std::time::Duration;

    fn create_test_check(host: &str, path: &str, method: CheckMethod) -> CheckDefinition {
        CheckDefinition {
            id: "abcdefghij0123456789".to_string(),
            owner_id: "5551234567".to_string(),
            protocol: Protocol::Http,
            url: format!("{host}{path}"),
            host: host.to_string(),
            path: path.to_string(),
            method,
            success_codes: vec![200],
            timeout_seconds: 1,
            state: CheckState::Unknown,
            last_checked_at: None,
        }
    }

    #[tokio::test]
    async fn test_probe_reports_status_code_without_judgement() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(503)
            .create_async()
            .await;

        let prober = HttpProber::new().unwrap();
        let check = create_test_check(&server.host_with_port(), "/health", CheckMethod::Get);
        let outcome = prober.probe(&check).await;

        mock.assert_async().await;
        assert_eq!(outcome.response_code, Some(503));
        assert!(outcome.failure.is_none());
    }

    #[tokio::test]
    async fn test_probe_uses_configured_method_and_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/items?id=7")
            .with_status(204)
            .create_async()
            .await;

        let prober = HttpProber::new().unwrap();
        let check = create_test_check(&server.host_with_port(), "/items?id=7", CheckMethod::Delete);
        let outcome = prober.probe(&check).await;

        mock.assert_async().await;
        assert_eq!(outcome.response_code, Some(204));
    }

    #[tokio::test]
    async fn test_probe_does_not_follow_redirects() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/old")
            .with_status(301)
            .with_header("location", "/new")
            .create_async()
            .await;

        let prober = HttpProber::new().unwrap();
        let check = create_test_check(&server.host_with_port(), "/old", CheckMethod::Get);

        assert_eq!(prober.probe(&check).await.response_code, Some(301));
    }

    #[tokio::test]
    async fn test_connection_refused_becomes_failure() {
        // 绑定后立即释放端口，保证没有服务在监听
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let prober = HttpProber::new().unwrap();
        let check = create_test_check(&format!("127.0.0.1:{port}"), "/", CheckMethod::Get);
        let outcome = prober.probe(&check).await;

        assert!(outcome.response_code.is_none());
        assert!(matches!(
            outcome.failure,
            Some(ProbeFailure::Connect(_)) | Some(ProbeFailure::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        // 接受连接但从不响应
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let prober = HttpProber::new().unwrap();
        let check = create_test_check(&addr.to_string(), "/", CheckMethod::Get);
        let outcome = prober.probe(&check).await;

        assert_eq!(outcome.failure, Some(ProbeFailure::Timeout));
        assert!(outcome.elapsed >= Duration::from_millis(900));
        assert!(outcome.elapsed < Duration::from_secs(3));

        server.abort();
    }
}
