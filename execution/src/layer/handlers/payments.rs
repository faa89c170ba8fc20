use super::super::*;
use dond_types::game::{
    normalize_tx_hash, PaymentStatus, PendingGamePayment, ERROR_PAYMENT_EXISTS,
    ERROR_PAYMENT_NOT_FOUND,
};
use tracing::debug;

impl<'a, S: State> Layer<'a, S> {
    // === Payment Handler Methods ===

    async fn payment(&self, tx_hash: &str) -> Option<PendingGamePayment> {
        match self.get(&Key::Payment(tx_hash.to_string())).await {
            Some(Value::Payment(payment)) => Some(payment),
            _ => None,
        }
    }

    /// Record an entry-fee transfer awaiting on-chain confirmation.
    /// Registering the same hash twice from the same wallet is a no-op.
    pub(in crate::layer) async fn handle_register_payment(
        &mut self,
        wallet: &Address,
        tx_hash: &str,
    ) -> Vec<Event> {
        let Some(tx_hash) = normalize_tx_hash(tx_hash) else {
            return vec![error_event(
                Some(*wallet),
                None,
                ERROR_PAYMENT_NOT_FOUND,
                "Invalid transaction hash",
            )];
        };

        if let Some(existing) = self.payment(&tx_hash).await {
            if &existing.wallet != wallet {
                return vec![error_event(
                    Some(*wallet),
                    None,
                    ERROR_PAYMENT_EXISTS,
                    "Transaction already registered by another wallet",
                )];
            }
            return vec![Event::PaymentRecorded {
                wallet: *wallet,
                tx_hash,
                status: existing.status,
            }];
        }

        let settings = self.settings().await;
        let payment = PendingGamePayment {
            tx_hash: tx_hash.clone(),
            wallet: *wallet,
            amount: settings.entry_fee,
            status: PaymentStatus::Pending,
            reason: String::new(),
            game_id: None,
            created_at_ms: self.now_ms,
            settled_at_ms: None,
        };
        self.insert(Key::Payment(tx_hash.clone()), Value::Payment(payment));
        debug!(%wallet, tx_hash = %tx_hash, "registered payment");

        vec![Event::PaymentRecorded {
            wallet: *wallet,
            tx_hash,
            status: PaymentStatus::Pending,
        }]
    }

    /// Apply the verifier's verdict. Settled payments never change again.
    pub(in crate::layer) async fn handle_settle_payment(
        &mut self,
        tx_hash: &str,
        confirmed: bool,
        reason: &str,
    ) -> Vec<Event> {
        let tx_hash = normalize_tx_hash(tx_hash).unwrap_or_else(|| tx_hash.to_string());
        let Some(mut payment) = self.payment(&tx_hash).await else {
            return vec![error_event(
                None,
                None,
                ERROR_PAYMENT_NOT_FOUND,
                "Payment not registered",
            )];
        };
        if payment.status != PaymentStatus::Pending {
            return vec![Event::PaymentRecorded {
                wallet: payment.wallet,
                tx_hash,
                status: payment.status,
            }];
        }

        payment.status = if confirmed {
            PaymentStatus::Confirmed
        } else {
            PaymentStatus::Failed
        };
        payment.reason = clip(reason);
        payment.settled_at_ms = Some(self.now_ms);
        let event = Event::PaymentRecorded {
            wallet: payment.wallet,
            tx_hash: tx_hash.clone(),
            status: payment.status,
        };
        self.insert(Key::Payment(tx_hash), Value::Payment(payment));

        vec![event]
    }
}
