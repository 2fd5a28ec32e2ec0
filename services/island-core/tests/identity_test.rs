//! Login-payload and wallet-connect integration tests.

mod common;

use common::{auth_for, build_service, connect, sign_login, BOT_SECRET};

use island_core_service::error::ServiceError;

#[tokio::test]
async fn valid_login_payload_verifies() {
    let ctx = build_service();
    let payload = auth_for(42, "islander");

    let verification = ctx.service.verify_platform_login(&payload);
    assert!(verification.verified);
    let user = verification.user.expect("payload carries a user");
    assert_eq!(user.id, 42);
    assert_eq!(user.username, "islander");
}

#[tokio::test]
async fn url_encoded_payload_verifies_against_decoded_fields() {
    let ctx = build_service();

    // The hash covers the decoded fields, the payload carries them encoded.
    let signed = sign_login(
        BOT_SECRET,
        &[("auth_date", "1700000000"), ("user", r#"{"id":42}"#)],
    );
    let hash = signed.rsplit_once("hash=").unwrap().1;
    let encoded = format!(
        "user=%7B%22id%22%3A42%7D&auth_date=1700000000&hash={}",
        hash
    );

    let verification = ctx.service.verify_platform_login(&encoded);
    assert!(verification.verified);
    assert_eq!(verification.user.unwrap().id, 42);

    // Flipping one hash character must fail verification.
    let flipped = {
        let mut chars: Vec<char> = encoded.chars().collect();
        let last = chars.last_mut().unwrap();
        *last = if *last == '0' { '1' } else { '0' };
        chars.into_iter().collect::<String>()
    };
    assert!(!ctx.service.verify_platform_login(&flipped).verified);
}

#[tokio::test]
async fn tampered_payload_is_rejected() {
    let ctx = build_service();
    let payload = auth_for(42, "islander");

    // Flip the embedded user id without re-signing.
    let tampered = payload.replace(r#""id":42"#, r#""id":43"#);
    assert!(!ctx.service.verify_platform_login(&tampered).verified);

    // Signing with the wrong secret fails too.
    let wrong_secret = sign_login("not-the-secret", &[("auth_date", "1"), ("user", "{\"id\":1}")]);
    assert!(!ctx.service.verify_platform_login(&wrong_secret).verified);

    // As do payloads with no hash at all.
    assert!(!ctx.service.verify_platform_login("auth_date=1").verified);
    assert!(!ctx.service.verify_platform_login("").verified);
}

#[tokio::test]
async fn connect_wallet_creates_user_once() {
    let ctx = build_service();
    let (_, user) = connect(&ctx, 7, "0xAbCd000000000000000000000000000000000004").await;

    // Wallet is lower-cased into the key.
    assert_eq!(
        user.user_key.as_str(),
        "tg7:0xabcd000000000000000000000000000000000004"
    );
    assert_eq!(user.platform_id, 7);
    assert_eq!(user.points, 0);

    // A repeat handshake returns the same record instead of resetting it.
    let (_, again) = connect(&ctx, 7, "0xabcd000000000000000000000000000000000004").await;
    assert_eq!(again.user_key, user.user_key);
    assert_eq!(again.created_at, user.created_at);
}

#[tokio::test]
async fn connect_wallet_rejects_foreign_signature() {
    let ctx = build_service();
    let auth = auth_for(7, "islander");
    let wallet = "0xabcd000000000000000000000000000000000004";

    // The recovered signer is a different wallet.
    ctx.chain.set_signer("link", "0xsig", "0xother00000000000000000000000000000000005");

    let err = ctx
        .service
        .connect_wallet(&auth, wallet, "link", "0xsig")
        .await
        .expect_err("ownership proof must be rejected");
    assert!(matches!(err, ServiceError::Unauthenticated { .. }));

    // An unknown signature (recovery fails) reads the same way.
    let err = ctx
        .service
        .connect_wallet(&auth, wallet, "link", "0xgarbage")
        .await
        .expect_err("unrecoverable signature must be rejected");
    assert!(matches!(err, ServiceError::Unauthenticated { .. }));
}

#[tokio::test]
async fn user_key_must_belong_to_caller() {
    let ctx = build_service();
    let (_, user) = connect(&ctx, 7, "0xabcd000000000000000000000000000000000004").await;

    // A different platform identity may not act on this user key.
    let stranger = auth_for(8, "stranger");
    let err = ctx
        .service
        .mission_progress(&stranger, user.user_key.as_str())
        .expect_err("foreign user key must be rejected");
    assert!(matches!(err, ServiceError::Unauthenticated { .. }));
}
