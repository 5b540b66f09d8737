use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use nanoid::nanoid;
use tracing::info;

use crate::error::WithdrawalError;
use crate::sim::Currency;

const NANO_ALPHABET: &[char] = &[
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I',
    'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Address,
    Amount,
}

impl Field {
    fn toggle(self) -> Self {
        match self {
            Field::Address => Field::Amount,
            Field::Amount => Field::Address,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalRequest {
    pub currency: Currency,
    pub amount: f64,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub id: String,
    pub currency: Currency,
    pub amount: f64,
    pub address: String,
    pub completed_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WithdrawStage {
    Closed,
    Input {
        currency: Currency,
        address: String,
        amount: String,
        field: Field,
    },
    Processing {
        request: WithdrawalRequest,
        started_at: Instant,
    },
    Success {
        receipt: Receipt,
    },
}

/// Input -> Processing -> Success. Processing cannot be cancelled and always
/// succeeds once the delay has elapsed.
#[derive(Debug)]
pub struct WithdrawFlow {
    stage: WithdrawStage,
    delay: Duration,
}

impl WithdrawFlow {
    pub fn new(delay: Duration) -> Self {
        Self {
            stage: WithdrawStage::Closed,
            delay,
        }
    }

    pub fn stage(&self) -> &WithdrawStage {
        &self.stage
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.stage, WithdrawStage::Closed)
    }

    pub fn currency(&self) -> Option<Currency> {
        match &self.stage {
            WithdrawStage::Closed => None,
            WithdrawStage::Input { currency, .. } => Some(*currency),
            WithdrawStage::Processing { request, .. } => Some(request.currency),
            WithdrawStage::Success { receipt } => Some(receipt.currency),
        }
    }

    pub fn open(&mut self, currency: Currency) -> bool {
        if self.is_open() {
            return false;
        }
        self.stage = WithdrawStage::Input {
            currency,
            address: String::new(),
            amount: String::new(),
            field: Field::Address,
        };
        true
    }

    pub fn cancel(&mut self) -> bool {
        if matches!(self.stage, WithdrawStage::Input { .. }) {
            self.stage = WithdrawStage::Closed;
            return true;
        }
        false
    }

    pub fn acknowledge(&mut self) -> bool {
        if matches!(self.stage, WithdrawStage::Success { .. }) {
            self.stage = WithdrawStage::Closed;
            return true;
        }
        false
    }

    pub fn switch_field(&mut self) {
        if let WithdrawStage::Input { field, .. } = &mut self.stage {
            *field = field.toggle();
        }
    }

    pub fn push_char(&mut self, ch: char) {
        if let WithdrawStage::Input {
            address,
            amount,
            field,
            ..
        } = &mut self.stage
        {
            match field {
                Field::Address if !ch.is_control() => address.push(ch),
                Field::Amount if ch.is_ascii_digit() || ch == '.' => amount.push(ch),
                _ => {}
            }
        }
    }

    pub fn backspace(&mut self) {
        if let WithdrawStage::Input {
            address,
            amount,
            field,
            ..
        } = &mut self.stage
        {
            match field {
                Field::Address => address.pop(),
                Field::Amount => amount.pop(),
            };
        }
    }

    pub fn validate(&self, balance: f64) -> Result<WithdrawalRequest, WithdrawalError> {
        let WithdrawStage::Input {
            currency,
            address,
            amount,
            ..
        } = &self.stage
        else {
            return Err(WithdrawalError::NotAccepting);
        };

        if address.trim().is_empty() {
            return Err(WithdrawalError::MissingAddress);
        }
        let value: f64 = amount
            .trim()
            .parse()
            .map_err(|_| WithdrawalError::InvalidAmount(amount.clone()))?;
        if !value.is_finite() || value <= 0.0 {
            return Err(WithdrawalError::InvalidAmount(amount.clone()));
        }
        if value > balance {
            return Err(WithdrawalError::InsufficientFunds {
                currency: *currency,
                requested: value,
                available: balance,
            });
        }
        Ok(WithdrawalRequest {
            currency: *currency,
            amount: value,
            address: address.trim().to_string(),
        })
    }

    pub fn can_submit(&self, balance: f64) -> bool {
        self.validate(balance).is_ok()
    }

    /// On success the flow enters Processing; on error it stays in Input untouched.
    pub fn submit(&mut self, balance: f64, now: Instant) -> Result<(), WithdrawalError> {
        let request = self.validate(balance)?;
        info!(
            currency = %request.currency,
            amount = request.amount,
            "withdrawal processing"
        );
        self.stage = WithdrawStage::Processing {
            request,
            started_at: now,
        };
        Ok(())
    }

    /// Completes processing once the delay has passed, handing back the
    /// receipt so the caller can debit the wallet.
    pub fn poll(&mut self, now: Instant) -> Option<Receipt> {
        let WithdrawStage::Processing {
            request,
            started_at,
        } = &self.stage
        else {
            return None;
        };
        if now.saturating_duration_since(*started_at) < self.delay {
            return None;
        }
        let receipt = Receipt {
            id: generate_receipt_id(request.currency, request.amount),
            currency: request.currency,
            amount: request.amount,
            address: request.address.clone(),
            completed_at: Local::now(),
        };
        self.stage = WithdrawStage::Success {
            receipt: receipt.clone(),
        };
        Some(receipt)
    }
}

fn generate_receipt_id(currency: Currency, amount: f64) -> String {
    let tag = match currency {
        Currency::Btc => 'B',
        Currency::Eth => 'E',
    };
    let magnitude = (amount.max(1.0).log10().floor() as u8).min(15);
    let body = nanoid!(8, NANO_ALPHABET);
    let id_core = format!("TX{}{:X}-{}", tag, magnitude, body);
    format!("{}-{}", id_core, checksum_char(&id_core))
}

fn checksum_char(id_core: &str) -> char {
    let hash = blake3::hash(id_core.as_bytes());
    let nibble = (hash.as_bytes()[0] >> 4) as u32;
    std::char::from_digit(nibble, 16)
        .unwrap_or('0')
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(2_500);

    fn verify_receipt_id(id: &str) -> bool {
        match id.rsplit_once('-') {
            Some((core, check)) => {
                let mut chars = check.chars();
                matches!((chars.next(), chars.next()), (Some(c), None) if c == checksum_char(core))
            }
            None => false,
        }
    }

    fn filled(currency: Currency, address: &str, amount: &str) -> WithdrawFlow {
        let mut flow = WithdrawFlow::new(DELAY);
        assert!(flow.open(currency));
        address.chars().for_each(|c| flow.push_char(c));
        flow.switch_field();
        amount.chars().for_each(|c| flow.push_char(c));
        flow
    }

    #[test]
    fn opens_into_empty_input() {
        let mut flow = WithdrawFlow::new(DELAY);
        assert!(!flow.is_open());
        assert!(flow.open(Currency::Eth));
        assert_eq!(
            flow.stage(),
            &WithdrawStage::Input {
                currency: Currency::Eth,
                address: String::new(),
                amount: String::new(),
                field: Field::Address,
            }
        );
        assert!(!flow.open(Currency::Btc));
        assert_eq!(flow.currency(), Some(Currency::Eth));
    }

    #[test]
    fn amount_field_only_takes_numbers() {
        let flow = filled(Currency::Btc, "bc1qxyz", "1a.5x");
        match flow.stage() {
            WithdrawStage::Input {
                address, amount, ..
            } => {
                assert_eq!(address, "bc1qxyz");
                assert_eq!(amount, "1.5");
            }
            other => panic!("unexpected stage {other:?}"),
        }
    }

    #[test]
    fn invalid_input_keeps_flow_in_input() {
        let now = Instant::now();
        let mut over = filled(Currency::Btc, "bc1qxyz", "20");
        let before = over.stage().clone();
        assert!(matches!(
            over.submit(12.4502, now),
            Err(WithdrawalError::InsufficientFunds { .. })
        ));
        assert_eq!(over.stage(), &before);

        let mut no_address = filled(Currency::Btc, "", "1");
        assert_eq!(
            no_address.submit(12.4502, now),
            Err(WithdrawalError::MissingAddress)
        );

        let mut zero = filled(Currency::Btc, "bc1qxyz", "0");
        assert!(matches!(
            zero.submit(12.4502, now),
            Err(WithdrawalError::InvalidAmount(_))
        ));
        let mut empty = filled(Currency::Btc, "bc1qxyz", "");
        assert!(!empty.can_submit(12.4502));
        let mut dots = filled(Currency::Btc, "bc1qxyz", "1..2");
        assert!(dots.submit(12.4502, now).is_err());
        assert!(matches!(empty.stage(), WithdrawStage::Input { .. }));
        empty.backspace();
    }

    #[test]
    fn processing_completes_after_delay() {
        let start = Instant::now();
        let mut flow = filled(Currency::Btc, "bc1qxyz", "5.0");
        assert!(flow.can_submit(12.4502));
        flow.submit(12.4502, start).expect("valid request");
        assert!(!flow.cancel());
        assert!(flow.poll(start + Duration::from_millis(2_499)).is_none());
        assert!(matches!(flow.stage(), WithdrawStage::Processing { .. }));

        let receipt = flow
            .poll(start + DELAY)
            .expect("processing finished");
        assert_eq!(receipt.amount, 5.0);
        assert_eq!(receipt.currency, Currency::Btc);
        assert_eq!(receipt.address, "bc1qxyz");
        assert!(verify_receipt_id(&receipt.id));
        assert!(receipt.id.starts_with("TXB0-"));
        assert!(matches!(flow.stage(), WithdrawStage::Success { .. }));
        assert!(flow.poll(start + DELAY * 2).is_none());

        assert!(flow.acknowledge());
        assert!(!flow.is_open());
    }

    #[test]
    fn cancel_only_from_input() {
        let mut flow = filled(Currency::Eth, "0xabc", "1");
        flow.backspace();
        assert!(flow.cancel());
        assert_eq!(flow.stage(), &WithdrawStage::Closed);
        assert!(!flow.cancel());
        assert!(!flow.acknowledge());
    }

    #[test]
    fn receipt_checksum_detects_tampering() {
        let id = generate_receipt_id(Currency::Eth, 250.0);
        assert!(id.starts_with("TXE2-"));
        assert!(verify_receipt_id(&id));
        let (core, check) = id.rsplit_once('-').expect("checksum suffix");
        let wrong = if check == "0" { "1" } else { "0" };
        assert!(!verify_receipt_id(&format!("{}-{}", core, wrong)));
        assert!(!verify_receipt_id("TXE2"));
    }
}
