use super::super::*;
use dond_types::game::{
    completed_level_numbers, level_from_xp, tier_by_number, PlayerTrophy, CONTINUE_PAST_LEVEL,
    ERROR_ACTIVE_GAME_EXISTS, ERROR_INVALID_LEVEL, ERROR_LIMIT_REACHED, ERROR_NOTHING_TO_MERGE,
    MAX_INDEX_LENGTH, MAX_MERGED_WALLETS, MAX_MERGE_WALLETS,
};
use tracing::info;

impl<'a, S: State> Layer<'a, S> {
    // === Profile Handler Methods ===

    pub(in crate::layer) async fn trophies(&self, wallet: &Address) -> Vec<PlayerTrophy> {
        match self.get(&Key::PlayerTrophies(*wallet)).await {
            Some(Value::PlayerTrophies(trophies)) => trophies,
            _ => Vec::new(),
        }
    }

    /// Add XP earned by a game. The caller stores the profile.
    pub(in crate::layer) async fn award_xp(
        &mut self,
        profile: &mut PlayerProfile,
        amount: u64,
        game_id: Uuid,
    ) -> Vec<Event> {
        profile.set_xp(profile.total_xp.saturating_add(amount));
        let mut events = vec![Event::XpAwarded {
            wallet: profile.wallet,
            game_id,
            amount,
            total_xp: profile.total_xp,
            level: level_from_xp(profile.total_xp).number,
            completed_level: profile.completed_level,
        }];
        events.extend(self.mint_trophies(profile).await);
        events
    }

    /// Mint a trophy for every completed tier the wallet does not hold yet.
    /// Trophies are never taken away.
    async fn mint_trophies(&mut self, profile: &PlayerProfile) -> Vec<Event> {
        let wallet = profile.wallet;
        let mut trophies = self.trophies(&wallet).await;
        let mut events = Vec::new();
        for level in completed_level_numbers(profile.total_xp) {
            if trophies.iter().any(|t| t.level == level) {
                continue;
            }
            let Some(tier) = tier_by_number(level) else {
                continue;
            };
            trophies.push(PlayerTrophy {
                wallet,
                level,
                earned_at_ms: self.now_ms,
                sale_pending: false,
                sold: false,
            });
            events.push(Event::TrophyUnlocked {
                wallet,
                level,
                god: tier.god.to_string(),
            });
            self.notify(
                &wallet,
                NotificationKind::TrophyUnlocked,
                format!("Level {level} complete: {} trophy unlocked", tier.god),
            )
            .await;
        }
        if !events.is_empty() {
            trophies.sort_by_key(|t| t.level);
            self.insert(
                Key::PlayerTrophies(wallet),
                Value::PlayerTrophies(trophies),
            );
        }
        events
    }

    pub(in crate::layer) async fn handle_set_continue_past_nine(
        &mut self,
        wallet: &Address,
        enabled: bool,
    ) -> Vec<Event> {
        let mut profile = self.profile_or_new(wallet).await;
        let eligible = profile
            .completed_level
            .is_some_and(|level| level >= CONTINUE_PAST_LEVEL);
        if enabled && !eligible {
            return vec![error_event(
                Some(*wallet),
                None,
                ERROR_INVALID_LEVEL,
                format!("Complete level {CONTINUE_PAST_LEVEL} before continuing"),
            )];
        }

        profile.continue_past_level_nine = enabled;
        self.insert(Key::Profile(*wallet), Value::Profile(profile));

        vec![Event::ContinuePastNineSet {
            wallet: *wallet,
            enabled,
        }]
    }

    /// Admin override: set XP to the threshold of `level`. May lower XP.
    pub(in crate::layer) async fn handle_set_player_level(
        &mut self,
        wallet: &Address,
        level: u8,
    ) -> Vec<Event> {
        let Some(tier) = tier_by_number(level) else {
            return vec![error_event(
                Some(*wallet),
                None,
                ERROR_INVALID_LEVEL,
                format!("Level {level} does not exist"),
            )];
        };

        let mut profile = self.profile_or_new(wallet).await;
        profile.set_xp(tier.min_xp);
        let mut events = vec![Event::LevelSet {
            wallet: *wallet,
            level,
            total_xp: profile.total_xp,
        }];
        events.extend(self.mint_trophies(&profile).await);
        self.notify(
            wallet,
            NotificationKind::LevelSet,
            format!("Your level was set to {level} ({})", tier.god),
        )
        .await;
        self.insert(Key::Profile(*wallet), Value::Profile(profile));

        events
    }

    /// Fold duplicate profiles into `primary`.
    pub(in crate::layer) async fn handle_merge_profiles(
        &mut self,
        primary: &Address,
        duplicates: &[Address],
    ) -> Vec<Event> {
        let mut wallets: Vec<Address> = duplicates
            .iter()
            .filter(|wallet| *wallet != primary)
            .copied()
            .collect();
        wallets.sort();
        wallets.dedup();
        if wallets.len() > MAX_MERGE_WALLETS {
            return vec![error_event(
                Some(*primary),
                None,
                ERROR_NOTHING_TO_MERGE,
                format!("At most {MAX_MERGE_WALLETS} wallets can be merged at once"),
            )];
        }

        let mut found = Vec::new();
        for wallet in wallets {
            if self.get(&Key::ActiveGame(wallet)).await.is_some() {
                return vec![error_event(
                    Some(*primary),
                    None,
                    ERROR_ACTIVE_GAME_EXISTS,
                    format!("{wallet} has an active game"),
                )];
            }
            if let Some(profile) = self.profile(&wallet).await {
                found.push(profile);
            }
        }
        if found.is_empty() {
            return vec![error_event(
                Some(*primary),
                None,
                ERROR_NOTHING_TO_MERGE,
                "No duplicate profiles found",
            )];
        }

        let mut merged = self.profile_or_new(primary).await;
        let mut trophies = self.trophies(primary).await;
        let mut scatter_ids = self.scatter_ids(primary).await;

        // Both indexes must still decode once the duplicates are folded in
        let merged_count = merged.merged_wallets.len()
            + found
                .iter()
                .map(|duplicate| 1 + duplicate.merged_wallets.len())
                .sum::<usize>();
        if merged_count > MAX_MERGED_WALLETS {
            return vec![error_event(
                Some(*primary),
                None,
                ERROR_LIMIT_REACHED,
                format!("A profile can absorb at most {MAX_MERGED_WALLETS} wallets"),
            )];
        }
        let mut scatter_count = scatter_ids.len();
        for duplicate in &found {
            scatter_count += self.scatter_ids(&duplicate.wallet).await.len();
        }
        if scatter_count > MAX_INDEX_LENGTH {
            return vec![error_event(
                Some(*primary),
                None,
                ERROR_LIMIT_REACHED,
                format!("Merged wallets would hold {scatter_count} scatter wins"),
            )];
        }

        let mut total_xp = merged.total_xp;
        let mut merged_wallets = Vec::new();
        for duplicate in found {
            let wallet = duplicate.wallet;
            total_xp = total_xp.saturating_add(duplicate.total_xp);
            merged.total_winnings = merged
                .total_winnings
                .saturating_add(duplicate.total_winnings);
            merged.best_winnings = merged.best_winnings.max(duplicate.best_winnings);
            merged.games_played = merged.games_played.saturating_add(duplicate.games_played);
            merged.continue_past_level_nine |= duplicate.continue_past_level_nine;
            merged.created_at_ms = merged.created_at_ms.min(duplicate.created_at_ms);
            merged.merged_wallets.push(wallet);
            merged.merged_wallets.extend(duplicate.merged_wallets);
            merged_wallets.push(wallet);

            // Union trophies, keeping the earliest award of each level
            for mut trophy in self.trophies(&wallet).await {
                trophy.wallet = *primary;
                match trophies.iter_mut().find(|t| t.level == trophy.level) {
                    Some(existing) if existing.earned_at_ms <= trophy.earned_at_ms => {}
                    Some(existing) => *existing = trophy,
                    None => trophies.push(trophy),
                }
            }

            // Re-point scatter wins
            for id in self.scatter_ids(&wallet).await {
                if let Some(Value::ScatterWin(mut win)) = self.get(&Key::ScatterWin(id)).await {
                    win.wallet = *primary;
                    self.insert(Key::ScatterWin(id), Value::ScatterWin(win));
                }
                scatter_ids.push(id);
            }

            self.remove(Key::Profile(wallet));
            self.remove(Key::PlayerTrophies(wallet));
            self.remove(Key::WalletScatterWins(wallet));
            self.remove(Key::Notifications(wallet));
        }
        self.merge_period_winnings(primary, &merged_wallets).await;
        merged.set_xp(total_xp);
        info!(
            %primary,
            merged = merged_wallets.len(),
            total_xp,
            "merged duplicate profiles"
        );

        if !trophies.is_empty() {
            trophies.sort_by_key(|t| t.level);
            self.insert(
                Key::PlayerTrophies(*primary),
                Value::PlayerTrophies(trophies),
            );
        }
        if !scatter_ids.is_empty() {
            self.insert(
                Key::WalletScatterWins(*primary),
                Value::ScatterWinIds(scatter_ids),
            );
        }

        let mut events = vec![Event::ProfilesMerged {
            primary: *primary,
            merged: merged_wallets.clone(),
            total_xp,
        }];
        events.extend(self.mint_trophies(&merged).await);
        self.notify(
            primary,
            NotificationKind::ProfilesMerged,
            format!("{} profile(s) merged into your wallet", merged_wallets.len()),
        )
        .await;
        self.insert(Key::Profile(*primary), Value::Profile(merged));

        events
    }
}
