//! A small ledger aggregate shared by the executor integration tests.

#![allow(dead_code)]

use eventguard::{Aggregate, CommandLogic, Event, NewEvents, Rejection, StreamRequirement};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum LedgerEvent {
    LedgerOpened { ledger_id: String },
    Credited { amount: u64 },
    Debited { amount: u64 },
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::LedgerOpened { .. } => "ledger-opened",
            Self::Credited { .. } => "credited",
            Self::Debited { .. } => "debited",
        }
    }

    fn all_event_types() -> &'static [&'static str] {
        &["ledger-opened", "credited", "debited"]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    pub id: String,
    pub balance: u64,
}

#[derive(Debug, Default)]
pub struct LedgerDraft {
    id: Option<String>,
    balance: u64,
}

impl Aggregate for Ledger {
    const KIND: &'static str = "ledger";
    type Event = LedgerEvent;
    type State = LedgerDraft;

    fn when(state: LedgerDraft, event: &LedgerEvent) -> LedgerDraft {
        match event {
            LedgerEvent::LedgerOpened { ledger_id } => LedgerDraft {
                id: Some(ledger_id.clone()),
                balance: 0,
            },
            LedgerEvent::Credited { amount } => LedgerDraft {
                balance: state.balance.saturating_add(*amount),
                ..state
            },
            LedgerEvent::Debited { amount } => LedgerDraft {
                balance: state.balance.saturating_sub(*amount),
                ..state
            },
        }
    }

    fn complete(state: LedgerDraft) -> Option<Self> {
        let id = state.id.filter(|id| !id.is_empty())?;
        Some(Self {
            id,
            balance: state.balance,
        })
    }
}

#[derive(Debug, Error)]
pub enum LedgerRejection {
    #[error("ledger already open")]
    AlreadyOpen,
    #[error("balance {balance} does not cover {amount}")]
    InsufficientFunds { balance: u64, amount: u64 },
    #[error("ledger does not exist")]
    NotOpen,
}

impl Rejection for LedgerRejection {
    fn code(&self) -> &'static str {
        match self {
            Self::AlreadyOpen => "LEDGER_ALREADY_OPEN",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::NotOpen => "LEDGER_NOT_OPEN",
        }
    }
}

pub struct OpenLedger {
    pub ledger_id: String,
}

impl CommandLogic for OpenLedger {
    type Aggregate = Ledger;
    type Rejection = LedgerRejection;

    fn aggregate_id(&self) -> &str {
        &self.ledger_id
    }

    fn requirement(&self) -> StreamRequirement {
        StreamRequirement::MayBeNew
    }

    fn decide(&self, current: Option<&Ledger>) -> Result<NewEvents<LedgerEvent>, LedgerRejection> {
        if current.is_some() {
            return Err(LedgerRejection::AlreadyOpen);
        }
        Ok(NewEvents::one(LedgerEvent::LedgerOpened {
            ledger_id: self.ledger_id.clone(),
        }))
    }
}

pub struct Credit {
    pub ledger_id: String,
    pub amount: u64,
}

impl CommandLogic for Credit {
    type Aggregate = Ledger;
    type Rejection = LedgerRejection;

    fn aggregate_id(&self) -> &str {
        &self.ledger_id
    }

    fn decide(&self, current: Option<&Ledger>) -> Result<NewEvents<LedgerEvent>, LedgerRejection> {
        current.ok_or(LedgerRejection::NotOpen)?;
        Ok(NewEvents::one(LedgerEvent::Credited {
            amount: self.amount,
        }))
    }
}

pub struct Debit {
    pub ledger_id: String,
    pub amount: u64,
}

impl CommandLogic for Debit {
    type Aggregate = Ledger;
    type Rejection = LedgerRejection;

    fn aggregate_id(&self) -> &str {
        &self.ledger_id
    }

    fn decide(&self, current: Option<&Ledger>) -> Result<NewEvents<LedgerEvent>, LedgerRejection> {
        let ledger = current.ok_or(LedgerRejection::NotOpen)?;
        if ledger.balance < self.amount {
            return Err(LedgerRejection::InsufficientFunds {
                balance: ledger.balance,
                amount: self.amount,
            });
        }
        Ok(NewEvents::one(LedgerEvent::Debited {
            amount: self.amount,
        }))
    }
}

/// Opens a ledger and credits it twice: the resulting revision is 3.
pub struct OpenAndCredit {
    pub ledger_id: String,
}

impl CommandLogic for OpenAndCredit {
    type Aggregate = Ledger;
    type Rejection = LedgerRejection;

    fn aggregate_id(&self) -> &str {
        &self.ledger_id
    }

    fn requirement(&self) -> StreamRequirement {
        StreamRequirement::MayBeNew
    }

    fn decide(&self, current: Option<&Ledger>) -> Result<NewEvents<LedgerEvent>, LedgerRejection> {
        if current.is_some() {
            return Err(LedgerRejection::AlreadyOpen);
        }
        Ok(NewEvents::one(LedgerEvent::LedgerOpened {
            ledger_id: self.ledger_id.clone(),
        })
        .with(LedgerEvent::Credited { amount: 10 })
        .with(LedgerEvent::Credited { amount: 5 }))
    }
}
