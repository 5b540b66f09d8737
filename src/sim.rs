use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Local};
use rand::Rng;
use rand::rngs::StdRng;

use crate::config::SimConfig;

const SECONDS_PER_HOUR: f64 = 3600.0;
const IDLE_TEMPERATURE: f64 = 30.0;
const MINING_TEMPERATURE: f64 = 65.0;
const TEMPERATURE_JITTER: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    Btc,
    Eth,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Btc => write!(f, "BTC"),
            Currency::Eth => write!(f, "ETH"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wallet {
    pub btc: f64,
    pub eth: f64,
}

impl Wallet {
    pub fn balance(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Btc => self.btc,
            Currency::Eth => self.eth,
        }
    }

    fn balance_mut(&mut self, currency: Currency) -> &mut f64 {
        match currency {
            Currency::Btc => &mut self.btc,
            Currency::Eth => &mut self.eth,
        }
    }

    pub fn debit(&mut self, currency: Currency, amount: f64) {
        *self.balance_mut(currency) -= amount;
    }
}

#[derive(Debug, Clone)]
pub struct HistorySample {
    pub timestamp: DateTime<Local>,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSnapshot {
    pub is_mining: bool,
    pub hash_rate: f64,
    pub efficiency: f64,
    pub temperature: f64,
    pub wallet: Wallet,
}

#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    is_mining: bool,
    hash_rate: f64,
    temperature: f64,
    last_tick: Instant,
    wallet: Wallet,
    history: VecDeque<HistorySample>,
    rng: StdRng,
}

impl Simulation {
    pub fn new(config: SimConfig, rng: StdRng, now: Instant) -> Self {
        let wallet = Wallet {
            btc: config.seed_btc,
            eth: config.seed_eth,
        };
        Self {
            config,
            is_mining: false,
            hash_rate: 0.0,
            temperature: IDLE_TEMPERATURE,
            last_tick: now,
            wallet,
            history: VecDeque::new(),
            rng,
        }
    }

    pub fn tick(&mut self, now: Instant) {
        let delta = now.saturating_duration_since(self.last_tick).as_secs_f64();
        self.last_tick = now;

        if self.is_mining {
            let step = if self.config.ramp_step_max > 0.0 {
                self.rng.gen_range(0.0..self.config.ramp_step_max)
            } else {
                0.0
            };
            self.hash_rate = (self.hash_rate + step).min(self.config.max_hash_rate);

            let efficiency = self.efficiency();
            self.wallet.btc += self.config.btc_rate_per_sec * efficiency * delta;
            self.wallet.eth += self.config.eth_rate_per_sec * efficiency * delta;

            if self.rng.gen_bool(self.config.sample_probability) {
                self.record_sample();
            }
            self.temperature =
                MINING_TEMPERATURE + self.rng.gen_range(0.0..TEMPERATURE_JITTER);
        } else {
            self.hash_rate = (self.hash_rate - self.config.decay_per_tick).max(0.0);
            self.temperature = IDLE_TEMPERATURE;
        }
    }

    fn record_sample(&mut self) {
        self.history.push_back(HistorySample {
            timestamp: Local::now(),
            rate: self.hash_rate,
        });
        while self.history.len() > self.config.history_capacity {
            self.history.pop_front();
        }
    }

    pub fn start_mining(&mut self) {
        self.is_mining = true;
    }

    pub fn stop_mining(&mut self) {
        self.is_mining = false;
        self.hash_rate = 0.0;
    }

    pub fn is_mining(&self) -> bool {
        self.is_mining
    }

    pub fn hash_rate(&self) -> f64 {
        self.hash_rate
    }

    pub fn efficiency(&self) -> f64 {
        (self.hash_rate / self.config.max_hash_rate).clamp(0.0, 1.0)
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn wallet_mut(&mut self) -> &mut Wallet {
        &mut self.wallet
    }

    pub fn history(&self) -> &VecDeque<HistorySample> {
        &self.history
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// True once the hash rate has crossed the insight threshold while mining.
    pub fn above_insight_threshold(&self) -> bool {
        self.is_mining && self.hash_rate > self.config.insight_trigger()
    }

    pub fn projected_hourly(&self, currency: Currency) -> f64 {
        let rate = match currency {
            Currency::Btc => self.config.btc_rate_per_sec,
            Currency::Eth => self.config.eth_rate_per_sec,
        };
        rate * SECONDS_PER_HOUR * self.efficiency()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            is_mining: self.is_mining,
            hash_rate: self.hash_rate,
            efficiency: self.efficiency(),
            temperature: self.temperature,
            wallet: self.wallet,
        }
    }
}
