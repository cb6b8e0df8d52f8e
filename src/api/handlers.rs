use actix_web::{web, HttpResponse, Responder};
use log::error;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::peers::parse_peer_address;
use crate::blockchain::transaction::TransactionError;
use crate::blockchain::{Block, BlockchainError, ConsensusResolver, HttpChainFetcher, Ledger, Transaction};
use crate::config::NodeConfig;

/// Shared ledger handle
pub type LedgerData = web::Data<Ledger>;

/// Shared node configuration
pub type ConfigData = web::Data<NodeConfig>;

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// The length of the chain
    pub length: usize,
}

/// Request for the transaction endpoint
///
/// Every field is optional at the wire level so that a missing field is
/// reported by name instead of as a generic decoding failure.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's identifier
    pub sender: Option<String>,

    /// The recipient's identifier
    pub recipient: Option<String>,

    /// The amount to transfer
    pub amount: Option<f64>,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    /// The message
    pub message: String,

    /// The index of the block that will include this transaction
    pub block_index: u64,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    /// The message
    pub message: String,

    /// Index of the new block
    pub index: u64,

    /// Transactions sealed into the new block
    pub transactions: Vec<Transaction>,

    /// Proof of the new block
    pub proof: u64,

    /// Digest of the previous block
    pub previous_hash: String,
}

/// Response for the validate endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ValidateResponse {
    /// Whether the local chain is valid
    pub valid: bool,

    /// The length of the chain
    pub length: usize,
}

/// Request for the register nodes endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterNodesRequest {
    /// Peer addresses, e.g. `http://192.168.0.5:5000`
    pub nodes: Option<Vec<String>>,
}

/// Response for the register nodes endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterNodesResponse {
    /// The message
    pub message: String,

    /// All known peers after registration
    pub total_nodes: Vec<String>,
}

/// Response for the resolve endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ResolveResponse {
    /// The message
    pub message: String,

    /// Whether the local chain was replaced
    pub replaced: bool,

    /// The chain after resolution
    pub chain: Vec<Block>,
}

fn error_body(message: impl std::fmt::Display) -> serde_json::Value {
    serde_json::json!({ "error": message.to_string() })
}

/// Maps a ledger error onto an HTTP response
fn error_response(err: &BlockchainError) -> HttpResponse {
    match err {
        BlockchainError::InvalidTransaction(_) | BlockchainError::InvalidAddress(_) => {
            HttpResponse::BadRequest().json(error_body(err))
        }
        BlockchainError::EmptyChain | BlockchainError::Serialization(_) => {
            error!("Internal ledger error: {}", err);
            HttpResponse::InternalServerError().json(error_body(err))
        }
    }
}

/// Get the full blockchain
///
/// Returns the entire chain and its length
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(ledger: LedgerData) -> impl Responder {
    let chain = ledger.chain();

    let response = ChainResponse {
        length: chain.len(),
        chain,
    };

    HttpResponse::Ok().json(response)
}

/// Mine a new block
///
/// Searches a proof for the current tip, pays this node the mining reward and
/// seals all pending transactions into a new block
#[utoipa::path(
    get,
    path = "/api/v1/mine",
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine_block(ledger: LedgerData) -> impl Responder {
    // The proof search is CPU bound, keep it off the async workers
    let worker_ledger = ledger.clone();
    let result = web::block(move || worker_ledger.mint_next_block()).await;

    match result {
        Ok(Ok(block)) => {
            let response = MineResponse {
                message: "New Block Forged".to_string(),
                index: block.index,
                transactions: block.transactions,
                proof: block.proof,
                previous_hash: block.previous_hash,
            };

            HttpResponse::Ok().json(response)
        }
        Ok(Err(err)) => error_response(&err),
        Err(err) => {
            error!("Mining task failed: {}", err);
            HttpResponse::InternalServerError().json(error_body("Failed to mine block"))
        }
    }
}

/// Create a new transaction
///
/// Adds a new transaction to the pending pool
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction created successfully", body = TransactionResponse),
        (status = 400, description = "Missing or invalid transaction fields")
    )
)]
pub async fn new_transaction(
    ledger: LedgerData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    let TransactionRequest {
        sender,
        recipient,
        amount,
    } = transaction_req.into_inner();

    let fields = match (sender, recipient, amount) {
        (None, _, _) => Err(TransactionError::MissingField("sender")),
        (_, None, _) => Err(TransactionError::MissingField("recipient")),
        (_, _, None) => Err(TransactionError::MissingField("amount")),
        (Some(sender), Some(recipient), Some(amount)) => Ok((sender, recipient, amount)),
    };

    let result = fields
        .map_err(BlockchainError::from)
        .and_then(|(sender, recipient, amount)| {
            ledger.submit_transaction(&sender, &recipient, amount)
        });

    match result {
        Ok(block_index) => {
            let response = TransactionResponse {
                message: format!("Transaction will be added to Block {}", block_index),
                block_index,
            };

            HttpResponse::Created().json(response)
        }
        Err(err) => error_response(&err),
    }
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(ledger: LedgerData) -> impl Responder {
    HttpResponse::Ok().json(ledger.pending_transactions())
}

/// Check if the blockchain is valid
///
/// Validates the local chain's hash and proof-of-work linkage
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = ValidateResponse)
    )
)]
pub async fn validate_chain(ledger: LedgerData) -> impl Responder {
    let response = ValidateResponse {
        valid: ledger.is_valid(),
        length: ledger.len(),
    };

    HttpResponse::Ok().json(response)
}

/// Register peer nodes
///
/// Adds every address to the set of known peers. Nothing is registered if
/// any address is invalid.
#[utoipa::path(
    post,
    path = "/api/v1/nodes/register",
    request_body = RegisterNodesRequest,
    responses(
        (status = 201, description = "Nodes registered successfully", body = RegisterNodesResponse),
        (status = 400, description = "Missing or invalid node addresses")
    )
)]
pub async fn register_nodes(
    ledger: LedgerData,
    register_req: web::Json<RegisterNodesRequest>,
) -> impl Responder {
    let nodes = match register_req.into_inner().nodes {
        Some(nodes) if !nodes.is_empty() => nodes,
        _ => {
            return HttpResponse::BadRequest()
                .json(error_body("Please supply a valid list of nodes"));
        }
    };

    if let Some(err) = nodes.iter().find_map(|node| parse_peer_address(node).err()) {
        return error_response(&BlockchainError::from(err));
    }

    for node in &nodes {
        if let Err(err) = ledger.register_peer(node) {
            return error_response(&err);
        }
    }

    let response = RegisterNodesResponse {
        message: "New nodes have been added".to_string(),
        total_nodes: ledger.peers(),
    };

    HttpResponse::Created().json(response)
}

/// Resolve conflicts
///
/// Pulls every known peer's chain and adopts the longest valid one if it is
/// longer than the local chain
#[utoipa::path(
    get,
    path = "/api/v1/nodes/resolve",
    responses(
        (status = 200, description = "Conflict resolution finished", body = ResolveResponse)
    )
)]
pub async fn resolve_conflicts(ledger: LedgerData, config: ConfigData) -> impl Responder {
    let fetcher = HttpChainFetcher::new(config.peer_timeout);
    let resolver = ConsensusResolver::for_ledger(&ledger);

    let replaced = resolver.resolve_conflicts(&ledger, &fetcher).await;

    let message = if replaced {
        "Our chain was replaced"
    } else {
        "Our chain is authoritative"
    };

    let response = ResolveResponse {
        message: message.to_string(),
        replaced,
        chain: ledger.chain(),
    };

    HttpResponse::Ok().json(response)
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    use super::*;
    use crate::api::configure_routes;
    use crate::blockchain::transaction::SYSTEM_SENDER;
    use crate::blockchain::ProofEngine;

    fn test_state() -> (LedgerData, ConfigData) {
        let config = NodeConfig {
            difficulty: 2,
            node_id: "node-a".to_string(),
            ..NodeConfig::default()
        };
        let ledger = Ledger::new(ProofEngine::new(config.difficulty), &config.node_id).unwrap();
        (web::Data::new(ledger), web::Data::new(config))
    }

    macro_rules! test_app {
        ($ledger:expr, $config:expr) => {
            test::init_service(
                App::new()
                    .app_data($ledger.clone())
                    .app_data($config.clone())
                    .configure(configure_routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_get_chain() {
        let (ledger, config) = test_state();
        let app = test_app!(ledger, config);

        let req = test::TestRequest::get().uri("/api/v1/chain").to_request();
        let body: ChainResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.length, 1);
        assert_eq!(body.chain[0].proof, 100);
    }

    #[actix_web::test]
    async fn test_submit_then_mine() {
        let (ledger, config) = test_state();
        let app = test_app!(ledger, config);

        for (sender, recipient, amount) in [("A", "B", 5.0), ("C", "D", 10.0)] {
            let req = test::TestRequest::post()
                .uri("/api/v1/transactions/new")
                .set_json(serde_json::json!({
                    "sender": sender,
                    "recipient": recipient,
                    "amount": amount,
                }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::CREATED);

            let body: TransactionResponse = test::read_body_json(resp).await;
            assert_eq!(body.block_index, 2);
            assert_eq!(body.message, "Transaction will be added to Block 2");
        }

        let req = test::TestRequest::get().uri("/api/v1/mine").to_request();
        let body: MineResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.message, "New Block Forged");
        assert_eq!(body.index, 2);
        assert_eq!(body.transactions.len(), 3);
        assert_eq!(body.transactions[0].sender, "A");
        assert_eq!(body.transactions[1].sender, "C");
        assert_eq!(body.transactions[2].sender, SYSTEM_SENDER);
        assert_eq!(body.transactions[2].recipient, "node-a");
        assert!(ledger.pending_transactions().is_empty());
        assert!(ledger.is_valid());
    }

    #[actix_web::test]
    async fn test_missing_transaction_field_is_rejected() {
        let (ledger, config) = test_state();
        let app = test_app!(ledger, config);

        let req = test::TestRequest::post()
            .uri("/api/v1/transactions/new")
            .set_json(serde_json::json!({ "sender": "A", "recipient": "B" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("amount"));
        assert!(ledger.pending_transactions().is_empty());
    }

    #[actix_web::test]
    async fn test_malformed_amount_is_rejected() {
        let (ledger, config) = test_state();
        let app = test_app!(ledger, config);

        let req = test::TestRequest::post()
            .uri("/api/v1/transactions/new")
            .set_json(serde_json::json!({ "sender": "A", "recipient": "B", "amount": "five" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn test_register_nodes() {
        let (ledger, config) = test_state();
        let app = test_app!(ledger, config);

        let req = test::TestRequest::post()
            .uri("/api/v1/nodes/register")
            .set_json(serde_json::json!({
                "nodes": ["http://127.0.0.1:5001", "127.0.0.1:5001/chain", "node-b:5002"]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: RegisterNodesResponse = test::read_body_json(resp).await;
        assert_eq!(body.total_nodes, vec!["127.0.0.1:5001", "node-b:5002"]);
    }

    #[actix_web::test]
    async fn test_register_invalid_node_registers_nothing() {
        let (ledger, config) = test_state();
        let app = test_app!(ledger, config);

        let req = test::TestRequest::post()
            .uri("/api/v1/nodes/register")
            .set_json(serde_json::json!({ "nodes": ["node-b:5002", "http://"] }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(ledger.peers().is_empty());
    }

    #[actix_web::test]
    async fn test_register_requires_nodes() {
        let (ledger, config) = test_state();
        let app = test_app!(ledger, config);

        let req = test::TestRequest::post()
            .uri("/api/v1/nodes/register")
            .set_json(serde_json::json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_resolve_without_peers_keeps_chain() {
        let (ledger, config) = test_state();
        let app = test_app!(ledger, config);

        let req = test::TestRequest::get().uri("/api/v1/nodes/resolve").to_request();
        let body: ResolveResponse = test::call_and_read_body_json(&app, req).await;

        assert!(!body.replaced);
        assert_eq!(body.message, "Our chain is authoritative");
        assert_eq!(body.chain.len(), 1);
    }

    #[actix_web::test]
    async fn test_resolve_skips_unreachable_peer() {
        let (ledger, config) = test_state();
        ledger.register_peer("127.0.0.1:1").unwrap();
        let app = test_app!(ledger, config);

        let req = test::TestRequest::get().uri("/api/v1/nodes/resolve").to_request();
        let body: ResolveResponse = test::call_and_read_body_json(&app, req).await;

        assert!(!body.replaced);
        assert_eq!(body.chain, ledger.chain());
    }

    #[actix_web::test]
    async fn test_validate_chain() {
        let (ledger, config) = test_state();
        ledger.mint_next_block().unwrap();
        let app = test_app!(ledger, config);

        let req = test::TestRequest::get().uri("/api/v1/validate").to_request();
        let body: ValidateResponse = test::call_and_read_body_json(&app, req).await;

        assert!(body.valid);
        assert_eq!(body.length, 2);
    }
}
