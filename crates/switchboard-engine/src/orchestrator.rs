//! Fan-out of one request across several services.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::info;

use switchboard_core::services::display_name;
use switchboard_core::types::{Classification, ServiceResult};
use switchboard_services::ServiceContext;

use crate::dispatch::Dispatcher;
use crate::progress::Progress;

/// Every per-service result of a fan-out, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct MultiServiceOutcome {
    /// True when at least one service succeeded.
    pub success: bool,
    pub results: Vec<ServiceResult>,
    pub summary: String,
}

pub struct Orchestrator {
    dispatcher: Arc<Dispatcher>,
}

impl Orchestrator {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Primary first, then every secondary concurrently. Each call yields
    /// exactly one result whatever happens inside it.
    pub async fn orchestrate(
        &self,
        raw: &str,
        c: &Classification,
        ctx: &ServiceContext,
        progress: &Progress,
    ) -> MultiServiceOutcome {
        progress.step(&format!("Querying {}", display_name(&c.primary_service)));
        let primary = c.derive_for(&c.primary_service);
        let mut results = vec![self.dispatcher.dispatch(raw, &primary, ctx).await];

        if !c.secondary_services.is_empty() {
            let names: Vec<&str> = c
                .secondary_services
                .iter()
                .map(|s| display_name(s))
                .collect();
            progress.step(&format!("Querying {}", names.join(", ")));

            let derived: Vec<Classification> = c
                .secondary_services
                .iter()
                .map(|s| c.derive_for(s))
                .collect();
            let calls = derived
                .iter()
                .map(|d| self.dispatcher.dispatch(raw, d, ctx));
            // join_all keeps input order regardless of completion order.
            results.extend(join_all(calls).await);
        }

        let success = results.iter().any(|r| r.success);
        let summary = summarize(&results);
        info!(
            services = results.len(),
            succeeded = results.iter().filter(|r| r.success).count(),
            "multi-service command finished"
        );
        MultiServiceOutcome {
            success,
            results,
            summary,
        }
    }
}

/// One ✅/❌ line per service under a count header.
pub fn summarize(results: &[ServiceResult]) -> String {
    let ok = results.iter().filter(|r| r.success).count();
    let mut out = format!("Queried {} services ({} succeeded):", results.len(), ok);
    for r in results {
        let name = display_name(&r.service);
        if r.success {
            out.push_str(&format!("\n✅ {name}"));
        } else {
            let err = r.error.as_deref().unwrap_or("unknown error");
            out.push_str(&format!("\n❌ {name}: {err}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use switchboard_services::{ClientError, ClientResponse, ServiceClient, ServiceRequest};

    use crate::dispatch::ClientSlot;

    /// Answers after `delay`, or fails the way its mode says.
    struct Svc {
        delay: Duration,
        mode: &'static str,
    }

    #[async_trait]
    impl ServiceClient for Svc {
        fn name(&self) -> &str {
            "svc"
        }
        async fn execute(&self, r: &ServiceRequest, _c: &ServiceContext) -> Result<ClientResponse, ClientError> {
            tokio::time::sleep(self.delay).await;
            match self.mode {
                "panic" => panic!("{} exploded", r.service),
                "err" => Err(ClientError::Protocol("bad gateway".into())),
                _ => Ok(ClientResponse::ok("ok", Some(json!({ "service": r.service })))),
            }
        }
    }

    fn slot(delay_ms: u64, mode: &'static str) -> Vec<ClientSlot> {
        vec![ClientSlot::new(
            Arc::new(Svc {
                delay: Duration::from_millis(delay_ms),
                mode,
            }),
            0,
        )]
    }

    fn orchestrator(setup: &[(&str, u64, &'static str)]) -> Orchestrator {
        let mut d = Dispatcher::new(Arc::new(Svc {
            delay: Duration::ZERO,
            mode: "ok",
        }));
        for (name, delay, mode) in setup {
            d.register(name, slot(*delay, mode));
        }
        Orchestrator::new(Arc::new(d))
    }

    fn classification(primary: &str, secondaries: &[&str]) -> Classification {
        let mut c = Classification::new("get_summary", primary, 0.9);
        c.secondary_services = secondaries.iter().map(|s| s.to_string()).collect();
        c
    }

    #[tokio::test]
    async fn primary_panic_keeps_secondaries() {
        let o = orchestrator(&[("shopify", 0, "panic"), ("klaviyo", 0, "ok"), ("slack", 0, "err")]);
        let out = o
            .orchestrate("x", &classification("shopify", &["klaviyo", "slack"]), &ServiceContext::new(), &Progress::silent())
            .await;
        assert_eq!(out.results.len(), 3);
        assert!(!out.results[0].success);
        assert!(out.results[1].success);
        assert!(!out.results[2].success);
        assert!(out.success);
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let o = orchestrator(&[("shopify", 0, "ok"), ("notion", 80, "ok"), ("asana", 5, "ok")]);
        let out = o
            .orchestrate("x", &classification("shopify", &["notion", "asana"]), &ServiceContext::new(), &Progress::silent())
            .await;
        let order: Vec<&str> = out.results.iter().map(|r| r.service.as_str()).collect();
        assert_eq!(order, vec!["shopify", "notion", "asana"]);
    }

    #[tokio::test]
    async fn all_failed_is_failure() {
        let o = orchestrator(&[("shopify", 0, "err"), ("klaviyo", 0, "err")]);
        let out = o
            .orchestrate("x", &classification("shopify", &["klaviyo"]), &ServiceContext::new(), &Progress::silent())
            .await;
        assert!(!out.success);
    }

    #[test]
    fn summary_marks_each_service() {
        let results = vec![
            ServiceResult::ok("shopify", json!({})),
            ServiceResult::failed("triplewhale", "timeout"),
        ];
        assert_eq!(
            summarize(&results),
            "Queried 2 services (1 succeeded):\n✅ Shopify\n❌ Triple Whale: timeout"
        );
    }
}
