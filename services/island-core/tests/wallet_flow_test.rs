//! Two-phase wallet flow and health check integration tests.

mod common;

use common::build_service;

use island_core_service::services::FlowStatus;
use serde_json::json;

#[tokio::test]
async fn wallet_flow_round_trip() {
    let ctx = build_service();

    let token = ctx.service.wallet_flow_initiate("connect");
    assert_eq!(ctx.service.wallet_flow_status(&token), FlowStatus::Pending);

    assert!(ctx
        .service
        .wallet_flow_complete(&token, json!({"walletAddress": "0xabc"})));
    assert_eq!(
        ctx.service.wallet_flow_status(&token),
        FlowStatus::Completed {
            result: json!({"walletAddress": "0xabc"})
        }
    );

    assert_eq!(ctx.service.wallet_flow_status("bogus"), FlowStatus::Unknown);
}

#[tokio::test]
async fn health_reports_catalog_and_pending_flows() {
    let ctx = build_service();

    let before = ctx.service.health_check();
    assert_eq!(before.status, "healthy");
    assert_eq!(before.missions, 9);
    assert_eq!(before.pending_wallet_flows, 0);
    assert!(before.current_period.starts_with("weekly-"));

    ctx.service.wallet_flow_initiate("sign");
    assert_eq!(ctx.service.health_check().pending_wallet_flows, 1);
}
