// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 提供商瀑布的降级与冷却行为

use crate::helpers::{valid_annotation_json, waterfall_with, ScriptedReasoner};
use huntrs::providers::health::HealthState;
use huntrs::providers::traits::{Capability, ProviderError, ReasoningProvider};
use std::sync::Arc;

#[tokio::test]
async fn rate_limited_provider_fails_over_and_cools_down() {
    let p1 = ScriptedReasoner::new("p1", vec![Err(ProviderError::RateLimited)]);
    let p2 = ScriptedReasoner::constant("p2", &valid_annotation_json(6));

    let waterfall = waterfall_with(
        vec![p1.clone() as Arc<dyn ReasoningProvider>, p2.clone()],
        vec![],
        vec![],
    );

    // P1返回429时，必须先尝试P2才返回结果
    let output = waterfall.enrich("Title", "Body").await.unwrap();
    assert_eq!(output.provider, "p2");
    assert_eq!(p1.call_count(), 1);
    assert_eq!(p2.call_count(), 1);

    // P1进入冷却：后续调用跳过P1，不产生任何网络往返
    let output = waterfall.enrich("Title", "Body").await.unwrap();
    assert_eq!(output.provider, "p2");
    assert_eq!(p1.call_count(), 1);
    assert_eq!(p2.call_count(), 2);

    let snapshot = waterfall.health().snapshot();
    let p1_state = snapshot.iter().find(|s| s.provider == "p1").unwrap();
    assert_eq!(p1_state.state, HealthState::Degraded);
    assert!(p1_state.cooldown_until.is_some());
}

#[tokio::test]
async fn timeout_then_malformed_then_success_chain() {
    // 链[A, B, C]：A超时，B返回畸形JSON，C成功
    let a = ScriptedReasoner::new("a", vec![Err(ProviderError::Timeout)]);
    let b = ScriptedReasoner::constant("b", "this is not json at all");
    let c = ScriptedReasoner::constant("c", &valid_annotation_json(9));

    let waterfall = waterfall_with(
        vec![
            a.clone() as Arc<dyn ReasoningProvider>,
            b.clone(),
            c.clone(),
        ],
        vec![],
        vec![],
    );

    let output = waterfall.enrich("Title", "Body").await.unwrap();
    assert_eq!(output.provider, "c");
    assert_eq!(output.annotations.urgency, 9);
    assert_eq!(output.annotations.category, "Technology");
    assert_eq!(output.annotations.tags, vec!["alpha", "beta"]);

    // A与B都进入冷却
    let snapshot = waterfall.health().snapshot();
    for name in ["a", "b"] {
        let state = snapshot.iter().find(|s| s.provider == name).unwrap();
        assert_eq!(state.state, HealthState::Degraded, "provider {}", name);
        assert!(state.cooldown_until.is_some());
    }
    let c_state = snapshot.iter().find(|s| s.provider == "c").unwrap();
    assert_eq!(c_state.state, HealthState::Healthy);
}

#[tokio::test]
async fn exhausted_waterfall_is_a_hard_failure() {
    let p1 = ScriptedReasoner::new("p1", vec![Err(ProviderError::ServerError(503))]);
    let p2 = ScriptedReasoner::new("p2", vec![Err(ProviderError::Timeout)]);

    let waterfall = waterfall_with(
        vec![p1 as Arc<dyn ReasoningProvider>, p2],
        vec![],
        vec![],
    );

    let err = waterfall.enrich("Title", "Body").await.unwrap_err();
    assert!(matches!(err, ProviderError::Exhausted(Capability::Reasoning)));
}

#[tokio::test]
async fn non_recoverable_error_marks_unavailable_until_reset() {
    let p1 = ScriptedReasoner::new("p1", vec![Err(ProviderError::AuthFailed)]);
    let p2 = ScriptedReasoner::constant("p2", &valid_annotation_json(4));

    let waterfall = waterfall_with(
        vec![p1.clone() as Arc<dyn ReasoningProvider>, p2.clone()],
        vec![],
        vec![],
    );

    // 认证失败的当次调用仍然继续降级
    let output = waterfall.enrich("Title", "Body").await.unwrap();
    assert_eq!(output.provider, "p2");

    let health = waterfall.health();
    let snapshot = health.snapshot();
    let p1_state = snapshot.iter().find(|s| s.provider == "p1").unwrap();
    assert_eq!(p1_state.state, HealthState::Unavailable);
    assert!(!health.is_available("p1"));

    // 不可用状态只能由操作员重置
    health.reset("p1");
    assert!(health.is_available("p1"));
}

#[tokio::test]
async fn missing_capability_is_fatal_configuration() {
    let waterfall = waterfall_with(vec![], vec![], vec![]);
    let err = waterfall
        .verify_capabilities(&[Capability::Reasoning])
        .unwrap_err();
    assert!(matches!(err, ProviderError::MissingCredentials(_)));
}
