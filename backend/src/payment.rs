//! On-chain verification of entry-fee payments.
//!
//! An entry fee is a BEP-20 `Transfer` of [PAYMENT_TOKEN] from the player's
//! wallet to the treasury. The verifier only reports what the chain says; the
//! engine records the verdict.

use commonware_utils::from_hex;
use dond_types::{
    game::{
        normalize_tx_hash, GameSettings, PendingGamePayment, BSC_CHAIN_ID, PAYMENT_TOKEN,
        PAYMENT_TOKEN_DECIMALS, TRANSFER_TOPIC,
    },
    Address,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::{collections::HashSet, future::Future};
use thiserror::Error;
use tracing::debug;

use crate::config::PaymentConfig;

/// What the chain says about a payment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verification {
    Confirmed,
    /// Not mined yet. Ask again later.
    Pending,
    Failed(String),
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("rpc request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("unexpected rpc response: {0}")]
    UnexpectedResponse(String),
}

pub trait PaymentVerifier: Send + Sync + 'static {
    fn verify(
        &self,
        payment: &PendingGamePayment,
        settings: &GameSettings,
    ) -> impl Future<Output = Result<Verification, PaymentError>> + Send;
}

/// Smallest token amount (18 decimals) matching `cents`.
pub fn required_amount(cents: u64) -> u128 {
    cents as u128 * 10u128.pow(PAYMENT_TOKEN_DECIMALS - 2)
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorDto>,
}

#[derive(Deserialize)]
struct RpcErrorDto {
    code: i64,
    message: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReceiptDto {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<LogDto>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LogDto {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
}

fn parse_quantity(value: &str) -> Option<u64> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16).ok()
}

/// Decode a 32-byte big-endian word, saturating at `u128::MAX`.
fn parse_word(value: &str) -> Option<u128> {
    let bytes = from_hex(value.trim_start_matches("0x"))?;
    if bytes.len() != 32 {
        return None;
    }
    if bytes[..16].iter().any(|b| *b != 0) {
        return Some(u128::MAX);
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&bytes[16..]);
    Some(u128::from_be_bytes(low))
}

fn topic_address(topic: &str) -> Option<Address> {
    let bytes = from_hex(topic.trim_start_matches("0x"))?;
    Address::from_word(&bytes)
}

/// Judge a mined receipt: it must have succeeded and carry a transfer of at
/// least the entry fee from the payer to the treasury.
pub fn check_receipt(
    receipt: &ReceiptDto,
    payment: &PendingGamePayment,
    settings: &GameSettings,
) -> Verification {
    if receipt.status.as_deref().and_then(parse_quantity) != Some(1) {
        return Verification::Failed("transaction reverted".to_string());
    }
    let required = required_amount(payment.amount.max(settings.entry_fee));
    let mut transferred = 0u128;
    for log in &receipt.logs {
        if Address::parse(&log.address).ok() != Some(PAYMENT_TOKEN) {
            continue;
        }
        let [topic, from, to] = log.topics.as_slice() else {
            continue;
        };
        if !topic.eq_ignore_ascii_case(TRANSFER_TOPIC) {
            continue;
        }
        if topic_address(from) != Some(payment.wallet) || topic_address(to) != Some(settings.treasury)
        {
            continue;
        }
        if let Some(value) = parse_word(&log.data) {
            transferred = transferred.saturating_add(value);
        }
    }
    if transferred == 0 {
        return Verification::Failed("no transfer to the treasury".to_string());
    }
    if transferred < required {
        return Verification::Failed(format!(
            "transfer of {transferred} is below the entry fee of {required}"
        ));
    }
    Verification::Confirmed
}

/// Verifies payments against a BSC JSON-RPC endpoint.
pub struct Bep20Verifier {
    http: reqwest::Client,
    rpc_url: String,
}

impl Bep20Verifier {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            rpc_url: rpc_url.into(),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, PaymentError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        let response: RpcResponse<T> = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if let Some(error) = response.error {
            return Err(PaymentError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result)
    }
}

impl PaymentVerifier for Bep20Verifier {
    async fn verify(
        &self,
        payment: &PendingGamePayment,
        settings: &GameSettings,
    ) -> Result<Verification, PaymentError> {
        let chain_id: Option<String> = self.call("eth_chainId", json!([])).await?;
        let chain_id = chain_id
            .as_deref()
            .and_then(parse_quantity)
            .ok_or_else(|| PaymentError::UnexpectedResponse("missing chain id".to_string()))?;
        if chain_id != BSC_CHAIN_ID {
            return Ok(Verification::Failed(format!(
                "endpoint is on chain {chain_id}, expected {BSC_CHAIN_ID}"
            )));
        }

        let receipt: Option<ReceiptDto> = self
            .call("eth_getTransactionReceipt", json!([payment.tx_hash]))
            .await?;
        let Some(receipt) = receipt else {
            debug!(tx_hash = %payment.tx_hash, "receipt not available yet");
            return Ok(Verification::Pending);
        };
        Ok(check_receipt(&receipt, payment, settings))
    }
}

/// Answers from a fixed set of confirmed hashes. Everything else stays pending.
#[derive(Default)]
pub struct StaticVerifier {
    confirmed: HashSet<String>,
    accept_all: bool,
}

impl StaticVerifier {
    pub fn new(confirmed: impl IntoIterator<Item = String>, accept_all: bool) -> Self {
        Self {
            confirmed: confirmed
                .into_iter()
                .filter_map(|hash| normalize_tx_hash(&hash))
                .collect(),
            accept_all,
        }
    }

    pub fn accept_all() -> Self {
        Self::new(Vec::new(), true)
    }
}

impl PaymentVerifier for StaticVerifier {
    async fn verify(
        &self,
        payment: &PendingGamePayment,
        _: &GameSettings,
    ) -> Result<Verification, PaymentError> {
        if self.accept_all || self.confirmed.contains(&payment.tx_hash) {
            return Ok(Verification::Confirmed);
        }
        Ok(Verification::Pending)
    }
}

/// Verifier selected by configuration.
pub enum Verifier {
    Bep20(Bep20Verifier),
    Static(StaticVerifier),
}

impl From<&PaymentConfig> for Verifier {
    fn from(config: &PaymentConfig) -> Self {
        match config {
            PaymentConfig::Bep20 { rpc_url } => Self::Bep20(Bep20Verifier::new(rpc_url.clone())),
            PaymentConfig::Static {
                confirmed,
                accept_all,
            } => Self::Static(StaticVerifier::new(confirmed.clone(), *accept_all)),
        }
    }
}

impl PaymentVerifier for Verifier {
    async fn verify(
        &self,
        payment: &PendingGamePayment,
        settings: &GameSettings,
    ) -> Result<Verification, PaymentError> {
        match self {
            Self::Bep20(verifier) => verifier.verify(payment, settings).await,
            Self::Static(verifier) => verifier.verify(payment, settings).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_utils::hex;
    use dond_types::game::PaymentStatus;

    fn wallet(n: u8) -> Address {
        Address::new([n; 20])
    }

    fn word(address: &Address) -> String {
        format!("0x{}{}", "00".repeat(12), hex(address.as_bytes()))
    }

    fn amount(value: u128) -> String {
        format!("0x{value:064x}")
    }

    fn payment() -> PendingGamePayment {
        PendingGamePayment {
            tx_hash: format!("0x{}", "11".repeat(32)),
            wallet: wallet(1),
            amount: 1_000,
            status: PaymentStatus::Pending,
            reason: String::new(),
            game_id: None,
            created_at_ms: 0,
            settled_at_ms: None,
        }
    }

    fn settings() -> GameSettings {
        GameSettings {
            treasury: wallet(9),
            ..GameSettings::default()
        }
    }

    fn transfer(from: &Address, to: &Address, value: u128) -> LogDto {
        LogDto {
            address: PAYMENT_TOKEN.to_string(),
            topics: vec![TRANSFER_TOPIC.to_string(), word(from), word(to)],
            data: amount(value),
        }
    }

    fn receipt(logs: Vec<LogDto>) -> ReceiptDto {
        ReceiptDto {
            status: Some("0x1".to_string()),
            logs,
        }
    }

    #[test]
    fn test_required_amount() {
        // $10.00 with 18 decimals
        assert_eq!(required_amount(1_000), 10 * 10u128.pow(18));
    }

    #[test]
    fn test_confirmed_transfer() {
        let receipt = receipt(vec![transfer(&wallet(1), &wallet(9), required_amount(1_000))]);
        assert_eq!(
            check_receipt(&receipt, &payment(), &settings()),
            Verification::Confirmed
        );
    }

    #[test]
    fn test_rejects_short_or_misdirected_transfers() {
        let short = receipt(vec![transfer(
            &wallet(1),
            &wallet(9),
            required_amount(1_000) - 1,
        )]);
        assert!(matches!(
            check_receipt(&short, &payment(), &settings()),
            Verification::Failed(_)
        ));

        let elsewhere = receipt(vec![transfer(&wallet(1), &wallet(8), required_amount(1_000))]);
        assert!(matches!(
            check_receipt(&elsewhere, &payment(), &settings()),
            Verification::Failed(_)
        ));

        let stranger = receipt(vec![transfer(&wallet(2), &wallet(9), required_amount(1_000))]);
        assert!(matches!(
            check_receipt(&stranger, &payment(), &settings()),
            Verification::Failed(_)
        ));

        let mut other_token = transfer(&wallet(1), &wallet(9), required_amount(1_000));
        other_token.address = wallet(7).to_string();
        assert!(matches!(
            check_receipt(&receipt(vec![other_token]), &payment(), &settings()),
            Verification::Failed(_)
        ));
    }

    #[test]
    fn test_reverted_receipt() {
        let mut reverted = receipt(vec![transfer(&wallet(1), &wallet(9), u128::MAX)]);
        reverted.status = Some("0x0".to_string());
        assert_eq!(
            check_receipt(&reverted, &payment(), &settings()),
            Verification::Failed("transaction reverted".to_string())
        );
    }

    #[test]
    fn test_split_transfers_add_up() {
        let half = required_amount(500);
        let receipt = receipt(vec![
            transfer(&wallet(1), &wallet(9), half),
            transfer(&wallet(1), &wallet(9), half),
        ]);
        assert_eq!(
            check_receipt(&receipt, &payment(), &settings()),
            Verification::Confirmed
        );
    }

    #[test]
    fn test_parse_word_saturates() {
        assert_eq!(parse_word(&format!("0x{}", "ff".repeat(32))), Some(u128::MAX));
        assert_eq!(parse_word("0x01"), None);
    }

    #[tokio::test]
    async fn test_static_verifier() {
        let verifier = StaticVerifier::new(vec![format!("0x{}", "11".repeat(32))], false);
        assert_eq!(
            verifier.verify(&payment(), &settings()).await.unwrap(),
            Verification::Confirmed
        );

        let mut other = payment();
        other.tx_hash = format!("0x{}", "22".repeat(32));
        assert_eq!(
            verifier.verify(&other, &settings()).await.unwrap(),
            Verification::Pending
        );
        assert_eq!(
            StaticVerifier::accept_all()
                .verify(&other, &settings())
                .await
                .unwrap(),
            Verification::Confirmed
        );
    }
}
