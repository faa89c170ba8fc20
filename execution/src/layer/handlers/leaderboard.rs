use super::super::*;
use dond_types::game::{
    LeaderboardPeriod, ERROR_PERIOD_NOT_FOUND, ERROR_PERIOD_STATE, LEADERBOARD_PERIOD_MS,
};
use tracing::{info, warn};

impl<'a, S: State> Layer<'a, S> {
    // === Leaderboard Handler Methods ===

    async fn current_period(&self) -> Option<LeaderboardPeriod> {
        let Some(Value::LeaderboardCursor(id)) = self.get(&Key::LeaderboardCursor).await else {
            return None;
        };
        match self.get(&Key::LeaderboardPeriod(id)).await {
            Some(Value::LeaderboardPeriod(period)) => Some(period),
            _ => None,
        }
    }

    fn open_period(&mut self, id: u64, prize_pool: u64) -> Event {
        let period = LeaderboardPeriod::new(id, self.now_ms, LEADERBOARD_PERIOD_MS, prize_pool);
        let event = Event::PeriodOpened {
            period_id: id,
            start_ms: period.start_ms,
            end_ms: period.end_ms,
        };
        self.insert(Key::LeaderboardCursor, Value::LeaderboardCursor(id));
        self.insert(Key::LeaderboardPeriod(id), Value::LeaderboardPeriod(period));
        event
    }

    /// Credit finished-game winnings to the running period.
    ///
    /// Winnings are dropped while the period is paused, frozen, or past its end.
    pub(in crate::layer) async fn record_period_winnings(&mut self, wallet: &Address, amount: u64) {
        if amount == 0 {
            return;
        }
        let Some(mut period) = self.current_period().await else {
            return;
        };
        if !period.is_open() || self.now_ms >= period.end_ms {
            return;
        }

        let key = Key::PeriodWinnings(period.id, *wallet);
        let total = match self.get(&key).await {
            Some(Value::PeriodWinnings(total)) => total,
            _ => 0,
        }
        .saturating_add(amount);
        self.insert(key, Value::PeriodWinnings(total));

        period.standings.update(*wallet, total);
        self.insert(
            Key::LeaderboardPeriod(period.id),
            Value::LeaderboardPeriod(period),
        );
    }

    /// Move the running period's winnings of `merged` wallets onto `primary`.
    ///
    /// Closed periods keep the wallets they were frozen with.
    pub(in crate::layer) async fn merge_period_winnings(
        &mut self,
        primary: &Address,
        merged: &[Address],
    ) {
        let Some(mut period) = self.current_period().await else {
            return;
        };
        if period.frozen {
            return;
        }

        let primary_key = Key::PeriodWinnings(period.id, *primary);
        let mut total = match self.get(&primary_key).await {
            Some(Value::PeriodWinnings(total)) => total,
            _ => 0,
        };
        let mut moved = false;
        for wallet in merged {
            let key = Key::PeriodWinnings(period.id, *wallet);
            if let Some(Value::PeriodWinnings(amount)) = self.get(&key).await {
                total = total.saturating_add(amount);
                self.remove(key);
                moved = true;
            }
            period.standings.remove(wallet);
        }
        if !moved {
            return;
        }

        self.insert(primary_key, Value::PeriodWinnings(total));
        period.standings.update(*primary, total);
        self.insert(
            Key::LeaderboardPeriod(period.id),
            Value::LeaderboardPeriod(period),
        );
    }

    /// Open the first period, or close an expired one and open its successor.
    pub(in crate::layer) async fn handle_check_period(&mut self) -> Vec<Event> {
        let settings = self.settings().await;
        let Some(mut period) = self.current_period().await else {
            return vec![self.open_period(1, settings.leaderboard_pool)];
        };
        if period.is_paused() || period.frozen || self.now_ms < period.end_ms {
            return Vec::new();
        }

        // The period stays open until the queue has room for its winners
        let podium = period.podium_payouts();
        if let Err(event) = self.ensure_payout_room(None, None, podium.len()).await {
            warn!(period = period.id, "payout queue full, period close deferred");
            return vec![event];
        }

        period.frozen = true;
        period.closed_at_ms = Some(self.now_ms);
        let mut events = Vec::new();
        for (rank, (wallet, amount)) in podium.into_iter().enumerate() {
            let rank = rank + 1;
            let (id, event) = self
                .create_manual_payout(
                    &wallet,
                    amount,
                    &format!("Leaderboard period {} rank {rank}", period.id),
                )
                .await;
            period.payouts.push(id);
            events.push(event);
            self.notify(
                &wallet,
                NotificationKind::LeaderboardPayout,
                format!(
                    "You placed #{rank} in leaderboard period {}: {} payout pending",
                    period.id,
                    format_cents(amount)
                ),
            )
            .await;
        }
        info!(
            period = period.id,
            winners = period.payouts.len(),
            "closed leaderboard period"
        );

        events.push(Event::PeriodClosed {
            period_id: period.id,
            standings: period.standings.entries.clone(),
        });
        let next = period.id + 1;
        self.insert(
            Key::LeaderboardPeriod(period.id),
            Value::LeaderboardPeriod(period),
        );
        events.push(self.open_period(next, settings.leaderboard_pool));

        events
    }

    pub(in crate::layer) async fn handle_pause_period(&mut self) -> Vec<Event> {
        let Some(mut period) = self.current_period().await else {
            return vec![error_event(
                None,
                None,
                ERROR_PERIOD_NOT_FOUND,
                "No leaderboard period",
            )];
        };
        if period.is_paused() || period.frozen {
            return vec![error_event(
                None,
                None,
                ERROR_PERIOD_STATE,
                "Period is already paused or closed",
            )];
        }

        period.paused_at_ms = Some(self.now_ms);
        let event = Event::PeriodPaused {
            period_id: period.id,
            paused_at_ms: self.now_ms,
        };
        self.insert(
            Key::LeaderboardPeriod(period.id),
            Value::LeaderboardPeriod(period),
        );

        vec![event]
    }

    /// Resume a paused period, pushing its end back by the time spent paused.
    pub(in crate::layer) async fn handle_resume_period(&mut self) -> Vec<Event> {
        let Some(mut period) = self.current_period().await else {
            return vec![error_event(
                None,
                None,
                ERROR_PERIOD_NOT_FOUND,
                "No leaderboard period",
            )];
        };
        let Some(paused_at) = period.paused_at_ms else {
            return vec![error_event(
                None,
                None,
                ERROR_PERIOD_STATE,
                "Period is not paused",
            )];
        };

        let paused_for = self.now_ms.saturating_sub(paused_at);
        period.end_ms = period.end_ms.saturating_add(paused_for);
        period.total_paused_ms = period.total_paused_ms.saturating_add(paused_for);
        period.paused_at_ms = None;
        let event = Event::PeriodResumed {
            period_id: period.id,
            end_ms: period.end_ms,
        };
        self.insert(
            Key::LeaderboardPeriod(period.id),
            Value::LeaderboardPeriod(period),
        );

        vec![event]
    }
}
