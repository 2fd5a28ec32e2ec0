//! Shared fixtures for the integration tests.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use island_chain::{ContentStore, MemoryContentStore, MockChain};
use island_core_types::{MissionCatalog, UserRecord};
use island_storage::MemoryStore;

use island_core_service::config::Config;
use island_core_service::service::IslandService;

pub const BOT_SECRET: &str = "test-bot-secret";
pub const CUSTODIAL: &str = "0xc0ffee0000000000000000000000000000000001";
pub const NFT_CONTRACT: &str = "0xbadge000000000000000000000000000000000002";

const CATALOG: &str = r#"{
  "missions": [
    {
      "id": "connect-wallet",
      "title": "Arrive on the island",
      "order": 1,
      "requirement": { "type": "INSTALL" },
      "reward": { "kind": "POINTS", "amount": 50 }
    },
    {
      "id": "first-transfer",
      "title": "Send your first coins",
      "order": 2,
      "requirement": {
        "type": "TRANSFER",
        "receiver": "0xreceiver00000000000000000000000000000003",
        "min_amount": 0.5
      },
      "prerequisites": ["connect-wallet"],
      "reward": { "kind": "NATIVE_TOKEN", "amount": 0.1 }
    },
    {
      "id": "deploy-contract",
      "title": "Raise a building",
      "order": 3,
      "requirement": { "type": "SMART_CONTRACT" },
      "reward": { "kind": "NFT", "nft_id": "pioneer" }
    },
    {
      "id": "stake",
      "order": 4,
      "requirement": { "type": "STAKING", "min_amount": 10.0 }
    },
    {
      "id": "trace",
      "order": 5,
      "requirement": { "type": "KYT", "expected_code": "SAFE-7" }
    },
    {
      "id": "quiz",
      "order": 6,
      "requirement": {
        "type": "QUIZ",
        "correct_answers": ["a", "c", "b"],
        "pass_threshold": 2
      },
      "reward": { "kind": "POINTS", "amount": 100 }
    },
    {
      "id": "freebie",
      "order": 7,
      "requirement": { "type": "INSTALL" }
    },
    {
      "id": "bridge",
      "title": "Cross the strait",
      "order": 8,
      "requirement": { "type": "CROSS_CHAIN" },
      "reward": { "kind": "POINTS", "amount": 75 }
    },
    {
      "id": "mystery",
      "order": 9,
      "requirement": { "type": "TELEPORT" }
    }
  ],
  "nfts": [
    {
      "id": "pioneer",
      "name": "Pioneer Badge",
      "image": "ipfs://pioneer.png"
    }
  ]
}"#;

pub struct TestContext {
    pub service: IslandService,
    pub chain: Arc<MockChain>,
}

pub fn build_service() -> TestContext {
    let mut config = Config::default();
    config.platform.bot_secret = BOT_SECRET.to_string();
    config.chain.custodial_address = CUSTODIAL.to_string();
    config.chain.nft_contract_address = NFT_CONTRACT.to_string();

    let store = Arc::new(MemoryStore::new());
    let chain = Arc::new(MockChain::new());
    let content: Arc<dyn ContentStore> =
        Arc::new(MemoryContentStore::new("https://gateway.test/ipfs"));
    let catalog =
        Arc::new(MissionCatalog::from_json_str(CATALOG).expect("test catalog must be valid"));

    let service = IslandService::new(store, chain.clone(), content, catalog, config);

    TestContext { service, chain }
}

/// Sign a login payload the way the platform client does: HMAC-SHA-256 over
/// the sorted `key=value` fields keyed by SHA-256 of the bot secret.
pub fn sign_login(bot_secret: &str, fields: &[(&str, &str)]) -> String {
    let mut sorted: Vec<_> = fields.to_vec();
    sorted.sort_by_key(|(k, _)| *k);
    let data_check_string = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n");

    let secret = Sha256::digest(bot_secret.as_bytes());
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&secret).expect("hmac accepts any key length");
    mac.update(data_check_string.as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    let mut payload = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    payload.push_str(&format!("&hash={}", hash));
    payload
}

/// A valid auth payload for a platform user.
pub fn auth_for(id: i64, username: &str) -> String {
    let user_json = format!(
        r#"{{"id":{},"first_name":"Test","username":"{}"}}"#,
        id, username
    );
    sign_login(
        BOT_SECRET,
        &[("auth_date", "1735689600"), ("user", user_json.as_str())],
    )
}

/// Connect a wallet for a platform user, creating the user record.
pub async fn connect(ctx: &TestContext, id: i64, wallet: &str) -> (String, UserRecord) {
    let auth = auth_for(id, &format!("user{}", id));
    let message = format!("link wallet {}", wallet);
    let signature = format!("0xsig{}", id);
    ctx.chain.set_signer(&message, &signature, wallet);

    let user = ctx
        .service
        .connect_wallet(&auth, wallet, &message, &signature)
        .await
        .expect("wallet connect must succeed");
    (auth, user)
}
