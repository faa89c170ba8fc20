use super::super::*;
use dond_types::game::{
    tier_by_number, ManualPayout, NftSaleRequest, PayoutStatus, ScatterWin, Trophy,
    ERROR_INVALID_AMOUNT, ERROR_INVALID_LEVEL, ERROR_INVALID_SETTINGS, ERROR_LIMIT_REACHED,
    ERROR_PAYOUT_NOT_FOUND, ERROR_PAYOUT_RESOLVED, ERROR_SALE_PENDING, ERROR_TROPHY_NOT_OWNED,
    MAX_INDEX_LENGTH,
};
use tracing::info;

/// A payout record of any kind, loaded for resolution.
enum Record {
    Scatter(ScatterWin),
    NftSale(NftSaleRequest),
    Manual(ManualPayout),
}

impl Record {
    fn wallet(&self) -> Address {
        match self {
            Self::Scatter(win) => win.wallet,
            Self::NftSale(request) => request.wallet,
            Self::Manual(payout) => payout.wallet,
        }
    }

    fn status(&self) -> PayoutStatus {
        match self {
            Self::Scatter(win) => win.status,
            Self::NftSale(request) => request.status,
            Self::Manual(payout) => payout.status,
        }
    }

    fn resolve(&mut self, status: PayoutStatus, now_ms: u64) {
        let (current, resolved_at) = match self {
            Self::Scatter(win) => (&mut win.status, &mut win.resolved_at_ms),
            Self::NftSale(request) => (&mut request.status, &mut request.resolved_at_ms),
            Self::Manual(payout) => (&mut payout.status, &mut payout.resolved_at_ms),
        };
        *current = status;
        *resolved_at = Some(now_ms);
    }

    fn into_value(self) -> (Key, Value) {
        match self {
            Self::Scatter(win) => (Key::ScatterWin(win.id), Value::ScatterWin(win)),
            Self::NftSale(request) => (
                Key::NftSaleRequest(request.id),
                Value::NftSaleRequest(request),
            ),
            Self::Manual(payout) => (Key::ManualPayout(payout.id), Value::ManualPayout(payout)),
        }
    }
}

impl<'a, S: State> Layer<'a, S> {
    // === Payout Handler Methods ===

    pub(in crate::layer) async fn scatter_ids(&self, wallet: &Address) -> Vec<Uuid> {
        match self.get(&Key::WalletScatterWins(*wallet)).await {
            Some(Value::ScatterWinIds(ids)) => ids,
            _ => Vec::new(),
        }
    }

    async fn record(&self, kind: PayoutKind, id: &Uuid) -> Option<Record> {
        match (kind, self.get(&Self::record_key(kind, id)).await?) {
            (PayoutKind::Scatter, Value::ScatterWin(win)) => Some(Record::Scatter(win)),
            (PayoutKind::NftSale, Value::NftSaleRequest(request)) => {
                Some(Record::NftSale(request))
            }
            (PayoutKind::Manual, Value::ManualPayout(payout)) => Some(Record::Manual(payout)),
            _ => None,
        }
    }

    fn record_key(kind: PayoutKind, id: &Uuid) -> Key {
        match kind {
            PayoutKind::Scatter => Key::ScatterWin(*id),
            PayoutKind::NftSale => Key::NftSaleRequest(*id),
            PayoutKind::Manual => Key::ManualPayout(*id),
        }
    }

    /// Check that a scatter win for `wallet` fits both the payout queue and
    /// the wallet's scatter index.
    pub(in crate::layer) async fn ensure_scatter_room(
        &self,
        wallet: &Address,
        game_id: &Uuid,
    ) -> Result<(), Event> {
        self.ensure_payout_room(Some(*wallet), Some(*game_id), 1).await?;
        let held = self.scatter_ids(wallet).await.len();
        if held >= MAX_INDEX_LENGTH {
            return Err(error_event(
                Some(*wallet),
                Some(*game_id),
                ERROR_LIMIT_REACHED,
                format!("Wallet already holds {held} scatter wins"),
            ));
        }
        Ok(())
    }

    /// Record a scatter bonus owed to `wallet` and queue it for review.
    pub(in crate::layer) async fn create_scatter_win(
        &mut self,
        wallet: &Address,
        streak: u8,
        game_id: Uuid,
        amount: u64,
    ) -> Vec<Event> {
        let id = self.next_id();
        let win = ScatterWin {
            id,
            wallet: *wallet,
            amount,
            streak,
            game_id,
            status: PayoutStatus::Pending,
            created_at_ms: self.now_ms,
            resolved_at_ms: None,
        };
        self.insert(Key::ScatterWin(id), Value::ScatterWin(win));

        let mut ids = self.scatter_ids(wallet).await;
        ids.push(id);
        self.insert(Key::WalletScatterWins(*wallet), Value::ScatterWinIds(ids));
        self.enqueue_payout(PayoutKind::Scatter, id).await;
        self.notify(
            wallet,
            NotificationKind::ScatterWon,
            format!(
                "Scatter bonus: {streak} top prizes in a row won {}",
                format_cents(amount)
            ),
        )
        .await;

        vec![
            Event::ScatterTriggered {
                wallet: *wallet,
                scatter_id: id,
                amount,
                streak,
            },
            Event::PayoutCreated {
                kind: PayoutKind::Scatter,
                id,
                wallet: *wallet,
                amount,
            },
        ]
    }

    pub(in crate::layer) async fn create_manual_payout(
        &mut self,
        wallet: &Address,
        amount: u64,
        reason: &str,
    ) -> (Uuid, Event) {
        let id = self.next_id();
        let payout = ManualPayout {
            id,
            wallet: *wallet,
            amount,
            reason: clip(reason),
            status: PayoutStatus::Pending,
            created_at_ms: self.now_ms,
            resolved_at_ms: None,
        };
        self.insert(Key::ManualPayout(id), Value::ManualPayout(payout));
        self.enqueue_payout(PayoutKind::Manual, id).await;

        (
            id,
            Event::PayoutCreated {
                kind: PayoutKind::Manual,
                id,
                wallet: *wallet,
                amount,
            },
        )
    }

    pub(in crate::layer) async fn handle_create_manual_payout(
        &mut self,
        wallet: &Address,
        amount: u64,
        reason: &str,
    ) -> Vec<Event> {
        if amount == 0 {
            return vec![error_event(
                Some(*wallet),
                None,
                ERROR_INVALID_AMOUNT,
                "Payout amount must be positive",
            )];
        }
        if let Err(event) = self.ensure_payout_room(Some(*wallet), None, 1).await {
            return vec![event];
        }
        let (_, event) = self.create_manual_payout(wallet, amount, reason).await;
        vec![event]
    }

    /// Offer a trophy back for its catalog BTC price.
    pub(in crate::layer) async fn handle_request_nft_sale(
        &mut self,
        wallet: &Address,
        level: u8,
    ) -> Vec<Event> {
        if let Err(event) = self.ensure_payout_room(Some(*wallet), None, 1).await {
            return vec![event];
        }
        let mut trophies = self.trophies(wallet).await;
        let Some(trophy) = trophies
            .iter_mut()
            .find(|trophy| trophy.level == level && !trophy.sold)
        else {
            return vec![error_event(
                Some(*wallet),
                None,
                ERROR_TROPHY_NOT_OWNED,
                format!("No unsold level {level} trophy"),
            )];
        };
        if trophy.sale_pending {
            return vec![error_event(
                Some(*wallet),
                None,
                ERROR_SALE_PENDING,
                format!("Level {level} trophy already has a pending sale"),
            )];
        }
        trophy.sale_pending = true;

        let btc_price_sats = match self.get(&Key::Trophy(level)).await {
            Some(Value::Trophy(entry)) => entry.btc_price_sats,
            _ => Trophy::placeholder(level).map_or(0, |entry| entry.btc_price_sats),
        };
        let id = self.next_id();
        let request = NftSaleRequest {
            id,
            wallet: *wallet,
            level,
            btc_price_sats,
            status: PayoutStatus::Pending,
            created_at_ms: self.now_ms,
            resolved_at_ms: None,
        };
        self.insert(Key::NftSaleRequest(id), Value::NftSaleRequest(request));
        self.insert(Key::PlayerTrophies(*wallet), Value::PlayerTrophies(trophies));
        self.enqueue_payout(PayoutKind::NftSale, id).await;

        vec![Event::PayoutCreated {
            kind: PayoutKind::NftSale,
            id,
            wallet: *wallet,
            amount: btc_price_sats,
        }]
    }

    /// Approve or reject a pending payout of any kind.
    pub(in crate::layer) async fn handle_resolve_payout(
        &mut self,
        kind: PayoutKind,
        id: &Uuid,
        approve: bool,
    ) -> Vec<Event> {
        let Some(mut record) = self.record(kind, id).await else {
            return vec![error_event(
                None,
                None,
                ERROR_PAYOUT_NOT_FOUND,
                "Payout not found",
            )];
        };
        let wallet = record.wallet();
        if record.status() != PayoutStatus::Pending {
            return vec![error_event(
                Some(wallet),
                None,
                ERROR_PAYOUT_RESOLVED,
                "Payout already resolved",
            )];
        }

        let status = if approve {
            PayoutStatus::Paid
        } else {
            PayoutStatus::Rejected
        };
        record.resolve(status, self.now_ms);

        // A sold trophy stays with the wallet but can't be offered again
        if let Record::NftSale(request) = &record {
            let mut trophies = self.trophies(&wallet).await;
            if let Some(trophy) = trophies.iter_mut().find(|t| t.level == request.level) {
                trophy.sale_pending = false;
                trophy.sold = approve;
                self.insert(Key::PlayerTrophies(wallet), Value::PlayerTrophies(trophies));
            }
        }

        let (key, value) = record.into_value();
        self.insert(key, value);
        self.dequeue_payout(kind, *id).await;
        info!(?kind, %id, %wallet, ?status, "resolved payout");

        let verdict = if approve { "approved" } else { "rejected" };
        self.notify(
            &wallet,
            NotificationKind::PayoutResolved,
            format!("Your payout request was {verdict}"),
        )
        .await;

        vec![Event::PayoutResolved {
            kind,
            id: *id,
            wallet,
            status,
        }]
    }

    pub(in crate::layer) async fn handle_upsert_trophy(&mut self, trophy: &Trophy) -> Vec<Event> {
        if tier_by_number(trophy.level).is_none() {
            return vec![error_event(
                None,
                None,
                ERROR_INVALID_LEVEL,
                format!("Level {} does not exist", trophy.level),
            )];
        }

        let entry = Trophy {
            level: trophy.level,
            god: clip(&trophy.god),
            image_url: clip(&trophy.image_url),
            btc_price_sats: trophy.btc_price_sats,
        };
        self.insert(Key::Trophy(trophy.level), Value::Trophy(entry));

        vec![Event::TrophyUpdated {
            level: trophy.level,
        }]
    }

    pub(in crate::layer) async fn handle_update_settings(
        &mut self,
        settings: &GameSettings,
    ) -> Vec<Event> {
        if settings.entry_fee == 0 {
            return vec![error_event(
                None,
                None,
                ERROR_INVALID_SETTINGS,
                "Entry fee must be positive",
            )];
        }

        self.insert(Key::Settings, Value::Settings(*settings));
        info!(
            entry_fee = settings.entry_fee,
            treasury = %settings.treasury,
            "updated settings"
        );

        vec![Event::SettingsUpdated {
            settings: *settings,
        }]
    }
}
