use std::collections::VecDeque;
use std::time::Instant;

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::config::SimConfig;
use crate::insight::{InsightDispatcher, MarketInsight};
use crate::sim::{Currency, Simulation};
use crate::withdraw::{Receipt, WithdrawFlow, WithdrawStage};

const MAX_RECEIPTS: usize = 8;
const STARTUP_LOGS: [&str; 3] = [
    "System initialized. Quantum cores: ONLINE",
    "Connecting to mainnet nodes...",
    "Secure channel established via TLS 1.3",
];

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl LogEntry {
    pub fn render(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

pub struct App {
    pub should_quit: bool,
    pub sim: Simulation,
    pub withdraw: WithdrawFlow,
    pub insight: Option<MarketInsight>,
    pub logs: VecDeque<LogEntry>,
    pub receipts: VecDeque<Receipt>,
    insight_pending: bool,
    log_capacity: usize,
    dispatcher: InsightDispatcher,
}

impl App {
    pub fn new(
        config: SimConfig,
        rng: StdRng,
        dispatcher: InsightDispatcher,
        now: Instant,
    ) -> Self {
        let withdraw = WithdrawFlow::new(config.withdrawal_delay());
        let log_capacity = config.log_capacity;
        let mut app = Self {
            should_quit: false,
            sim: Simulation::new(config, rng, now),
            withdraw,
            insight: None,
            logs: VecDeque::new(),
            receipts: VecDeque::new(),
            insight_pending: false,
            log_capacity,
            dispatcher,
        };
        for line in STARTUP_LOGS {
            app.push_log(line);
        }
        app
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.sim.tick(now);

        if let Some(receipt) = self.withdraw.poll(now) {
            self.complete_withdrawal(receipt);
        }

        self.maybe_request_insight();
    }

    fn maybe_request_insight(&mut self) {
        if self.insight.is_some() || self.insight_pending || !self.sim.above_insight_threshold() {
            return;
        }
        self.insight_pending = true;
        let magnitude = (self.sim.hash_rate() / 1000.0).floor() as u64;
        self.dispatcher.request(magnitude);
    }

    /// Applied whenever the fetch resolves, even if mining has since stopped.
    pub fn on_insight(&mut self, insight: MarketInsight) {
        self.insight_pending = false;
        self.push_log(format!("AI Insight Received: {}", insight.advice));
        self.insight = Some(insight);
    }

    pub fn clear_insight(&mut self) {
        if self.insight.take().is_some() {
            self.push_log("Market uplink reset. Awaiting fresh analysis...");
        }
    }

    pub fn toggle_mining(&mut self) {
        if self.sim.is_mining() {
            self.stop_mining();
        } else {
            self.start_mining();
        }
    }

    pub fn start_mining(&mut self) {
        if self.sim.is_mining() {
            return;
        }
        self.sim.start_mining();
        info!("mining started");
        self.push_log("Mining sequence started. Ramping up hashrate...");
    }

    pub fn stop_mining(&mut self) {
        if !self.sim.is_mining() {
            return;
        }
        self.sim.stop_mining();
        info!("mining stopped");
        self.push_log("Mining sequence halted. Cooling down systems.");
    }

    fn complete_withdrawal(&mut self, receipt: Receipt) {
        self.sim.wallet_mut().debit(receipt.currency, receipt.amount);
        info!(id = %receipt.id, currency = %receipt.currency, amount = receipt.amount, "withdrawal complete");
        self.push_log(format!(
            "WITHDRAWAL CONFIRMED: {} {}",
            receipt.amount, receipt.currency
        ));
        self.receipts.push_front(receipt);
        while self.receipts.len() > MAX_RECEIPTS {
            self.receipts.pop_back();
        }
    }

    fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_front(LogEntry {
            timestamp: Local::now(),
            message: msg.into(),
        });
        while self.logs.len() > self.log_capacity {
            self.logs.pop_back();
        }
    }

    pub fn withdraw_balance(&self) -> Option<f64> {
        self.withdraw
            .currency()
            .map(|currency| self.sim.wallet().balance(currency))
    }

    pub fn on_key(&mut self, key: KeyEvent, now: Instant) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.withdraw.is_open() {
            self.handle_withdraw_input(key, now);
            return;
        }

        match key.code {
            KeyCode::Char('q' | 'Q') => self.should_quit = true,
            KeyCode::Char(' ' | 'm' | 'M') => self.toggle_mining(),
            KeyCode::Char('b' | 'B') => {
                self.withdraw.open(Currency::Btc);
            }
            KeyCode::Char('e' | 'E') => {
                self.withdraw.open(Currency::Eth);
            }
            KeyCode::Char('r' | 'R') => self.clear_insight(),
            _ => {}
        }
    }

    fn handle_withdraw_input(&mut self, key: KeyEvent, now: Instant) {
        if matches!(self.withdraw.stage(), WithdrawStage::Success { .. }) {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                self.withdraw.acknowledge();
            }
            return;
        }
        if !matches!(self.withdraw.stage(), WithdrawStage::Input { .. }) {
            return;
        }

        match key.code {
            KeyCode::Esc => {
                self.withdraw.cancel();
            }
            KeyCode::Tab | KeyCode::BackTab => self.withdraw.switch_field(),
            KeyCode::Backspace => self.withdraw.backspace(),
            KeyCode::Enter => {
                let balance = self.withdraw_balance().unwrap_or(0.0);
                if let Err(err) = self.withdraw.submit(balance, now) {
                    debug!("transfer disabled: {}", err);
                }
            }
            KeyCode::Char(ch) => self.withdraw.push_char(ch),
            _ => {}
        }
    }
}

pub fn format_hash_rate(hash_rate: f64) -> String {
    format!("{:.1} PH/s", hash_rate / 1000.0)
}

pub fn format_balance(amount: f64, currency: Currency) -> String {
    format!("{:.6} {}", amount, currency)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::{self, Receiver};
    use std::time::Duration;

    use crossterm::event::KeyEventKind;
    use rand::SeedableRng;

    use super::*;
    use crate::event::Event;
    use crate::insight::{InsightProvider, Trend};

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
    }

    impl InsightProvider for CountingProvider {
        fn market_analysis(&self, hash_rate: u64) -> MarketInsight {
            self.calls.fetch_add(1, Ordering::SeqCst);
            MarketInsight {
                trend: Trend::Neutral,
                advice: format!("Observed {} units.", hash_rate),
                volatility_index: 12,
            }
        }
    }

    fn app_with(config: SimConfig) -> (App, Receiver<Event>, Arc<AtomicUsize>, Instant) {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();
        let provider = Arc::new(CountingProvider {
            calls: Arc::clone(&calls),
        });
        let dispatcher = InsightDispatcher::new(provider, tx);
        let now = Instant::now();
        let app = App::new(config, StdRng::seed_from_u64(11), dispatcher, now);
        (app, rx, calls, now)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::NONE,
        }
    }

    fn type_text(app: &mut App, text: &str, now: Instant) {
        for ch in text.chars() {
            app.on_key(key(KeyCode::Char(ch)), now);
        }
    }

    fn recv_insight(rx: &Receiver<Event>) -> MarketInsight {
        match rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Event::Insight(insight)) => insight,
            _ => panic!("expected insight event"),
        }
    }

    #[test]
    fn starts_with_seed_wallet_and_startup_logs() {
        let (app, _rx, _calls, _) = app_with(SimConfig::default());
        assert_eq!(app.sim.wallet().btc, 12.4502);
        assert_eq!(app.sim.wallet().eth, 145.203);
        assert_eq!(app.logs.len(), 3);
        assert_eq!(
            app.logs.front().map(|l| l.message.as_str()),
            Some("Secure channel established via TLS 1.3")
        );
    }

    #[test]
    fn log_is_bounded_newest_first() {
        let (mut app, _rx, _calls, now) = app_with(SimConfig::default());
        for _ in 0..6 {
            app.on_key(key(KeyCode::Char(' ')), now);
        }
        assert_eq!(app.logs.len(), 5);
        assert_eq!(
            app.logs[0].message,
            "Mining sequence halted. Cooling down systems."
        );
        assert_eq!(
            app.logs[1].message,
            "Mining sequence started. Ramping up hashrate..."
        );
        assert!(app.logs[0].render().starts_with('['));
    }

    #[test]
    fn stop_zeroes_hash_rate() {
        let (mut app, _rx, _calls, start) = app_with(SimConfig::default());
        app.start_mining();
        let mut now = start;
        for _ in 0..40 {
            now += Duration::from_millis(16);
            app.on_tick(now);
        }
        assert!(app.sim.hash_rate() > 0.0);
        app.toggle_mining();
        assert_eq!(app.sim.hash_rate(), 0.0);
    }

    #[test]
    fn one_fetch_per_threshold_crossing() {
        let config = SimConfig {
            max_hash_rate: 10_000.0,
            ..SimConfig::default()
        };
        let (mut app, rx, calls, start) = app_with(config);
        app.start_mining();
        let mut now = start;
        for _ in 0..50 {
            now += Duration::from_millis(16);
            app.on_tick(now);
        }
        assert!(app.sim.above_insight_threshold());

        let insight = recv_insight(&rx);
        app.on_insight(insight);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(app.insight.as_ref().map(|i| i.volatility_index), Some(12));
        assert!(app.logs[0].message.starts_with("AI Insight Received: Observed"));

        for _ in 0..50 {
            now += Duration::from_millis(16);
            app.on_tick(now);
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        app.clear_insight();
        now += Duration::from_millis(16);
        app.on_tick(now);
        let again = recv_insight(&rx);
        app.on_insight(again);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn insight_applies_after_mining_stops() {
        let (mut app, _rx, _calls, _) = app_with(SimConfig::default());
        app.start_mining();
        app.stop_mining();
        app.on_insight(MarketInsight::fallback());
        assert_eq!(app.insight, Some(MarketInsight::fallback()));
    }

    #[test]
    fn no_fetch_below_threshold_or_idle() {
        let (mut app, rx, calls, start) = app_with(SimConfig::default());
        let mut now = start;
        for _ in 0..20 {
            now += Duration::from_millis(16);
            app.on_tick(now);
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rejected_withdrawal_leaves_balance_and_input() {
        let (mut app, _rx, _calls, now) = app_with(SimConfig::default());
        app.on_key(key(KeyCode::Char('b')), now);
        type_text(&mut app, "bc1qdest", now);
        app.on_key(key(KeyCode::Tab), now);
        type_text(&mut app, "13", now);
        app.on_key(key(KeyCode::Enter), now);
        assert!(matches!(app.withdraw.stage(), WithdrawStage::Input { .. }));
        assert_eq!(app.sim.wallet().btc, 12.4502);

        app.on_key(key(KeyCode::Esc), now);
        assert!(!app.withdraw.is_open());
    }

    #[test]
    fn accepted_withdrawal_debits_after_delay() {
        let (mut app, _rx, _calls, start) = app_with(SimConfig::default());
        app.on_key(key(KeyCode::Char('b')), start);
        type_text(&mut app, "bc1qdest", start);
        app.on_key(key(KeyCode::Tab), start);
        type_text(&mut app, "5.0", start);
        app.on_key(key(KeyCode::Enter), start);
        assert!(matches!(app.withdraw.stage(), WithdrawStage::Processing { .. }));

        // Keys are ignored while processing.
        app.on_key(key(KeyCode::Esc), start);
        app.on_tick(start + Duration::from_millis(1_000));
        assert_eq!(app.sim.wallet().btc, 12.4502);

        app.on_tick(start + Duration::from_millis(2_500));
        assert!((app.sim.wallet().btc - 7.4502).abs() < 1e-9);
        assert!(matches!(app.withdraw.stage(), WithdrawStage::Success { .. }));
        assert_eq!(app.logs[0].message, "WITHDRAWAL CONFIRMED: 5 BTC");
        assert_eq!(app.receipts.len(), 1);

        app.on_key(key(KeyCode::Enter), start);
        assert!(!app.withdraw.is_open());
    }

    #[test]
    fn keeps_most_recent_receipts() {
        let (mut app, _rx, _calls, start) = app_with(SimConfig::default());
        let mut now = start;
        for round in 1..=10 {
            app.on_key(key(KeyCode::Char('e')), now);
            type_text(&mut app, "0xdest", now);
            app.on_key(key(KeyCode::Tab), now);
            type_text(&mut app, &round.to_string(), now);
            app.on_key(key(KeyCode::Enter), now);
            now += Duration::from_millis(2_500);
            app.on_tick(now);
            app.on_key(key(KeyCode::Enter), now);
        }
        assert_eq!(app.receipts.len(), MAX_RECEIPTS);
        assert_eq!(app.receipts.front().map(|r| r.amount), Some(10.0));
        assert_eq!(app.receipts.back().map(|r| r.amount), Some(3.0));
        assert!((app.sim.wallet().eth - (145.203 - 55.0)).abs() < 1e-9);
    }

    #[test]
    fn quit_keys() {
        let (mut app, _rx, _calls, now) = app_with(SimConfig::default());
        app.on_key(key(KeyCode::Char('e')), now);
        app.on_key(key(KeyCode::Char('q')), now);
        assert!(!app.should_quit);
        app.on_key(
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            now,
        );
        assert!(app.should_quit);
    }

    #[test]
    fn formats_dashboard_values() {
        assert_eq!(format_hash_rate(250_000.0), "250.0 PH/s");
        assert_eq!(format_balance(12.4502, Currency::Btc), "12.450200 BTC");
    }
}
