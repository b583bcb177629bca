//! Cash register aggregate.
//!
//! A register is placed at a workstation with an empty float. Cashiers
//! start and end shifts on it, and every transaction during a shift moves
//! the float. A snapshot event carries the whole state and replaces whatever
//! was folded before it.

use eventguard::{Aggregate, CommandLogic, Event, NewEvents, Rejection, StreamRequirement};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Full register state as carried by a snapshot event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashRegisterSnapshot {
    /// Register id.
    pub id: String,
    /// Cash held in the register.
    pub float: Decimal,
    /// Where the register stands.
    pub workstation: String,
    /// Cashier on shift, if any.
    pub current_cashier_id: Option<String>,
}

/// Events of the cash register stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum CashRegisterEvent {
    /// The register was set up at a workstation.
    PlacedAtWorkstation {
        /// Register id.
        cash_register_id: String,
        /// Workstation name.
        workstation: String,
    },
    /// A cashier took over the register.
    ShiftStarted {
        /// The cashier.
        cashier_id: String,
    },
    /// Money went in (positive) or out (negative).
    TransactionRegistered {
        /// Signed amount.
        amount: Decimal,
    },
    /// The cashier left the register.
    ShiftEnded,
    /// Whole-state snapshot.
    CashRegisterSnapshoted {
        /// The state from this point on.
        snapshot: CashRegisterSnapshot,
    },
}

impl Event for CashRegisterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::PlacedAtWorkstation { .. } => "placed-at-workstation",
            Self::ShiftStarted { .. } => "shift-started",
            Self::TransactionRegistered { .. } => "transaction-registered",
            Self::ShiftEnded => "shift-ended",
            Self::CashRegisterSnapshoted { .. } => "cash-register-snapshoted",
        }
    }

    fn all_event_types() -> &'static [&'static str] {
        &[
            "placed-at-workstation",
            "shift-started",
            "transaction-registered",
            "shift-ended",
            "cash-register-snapshoted",
        ]
    }
}

/// A complete cash register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashRegister {
    /// Register id, never empty.
    pub id: String,
    /// Cash held, never negative.
    pub float: Decimal,
    /// Workstation, never empty.
    pub workstation: String,
    /// Cashier on shift; when present, never empty.
    pub current_cashier_id: Option<String>,
}

impl CashRegister {
    /// Whether a cashier is on shift.
    pub const fn shift_in_progress(&self) -> bool {
        self.current_cashier_id.is_some()
    }

    /// Captures the current state as a snapshot event payload.
    pub fn to_snapshot(&self) -> CashRegisterSnapshot {
        CashRegisterSnapshot {
            id: self.id.clone(),
            float: self.float,
            workstation: self.workstation.clone(),
            current_cashier_id: self.current_cashier_id.clone(),
        }
    }
}

/// Fold accumulator for [`CashRegister`]. Every field may be missing.
///
/// A transaction that overflows the float poisons the draft until the next
/// placement or snapshot replaces it.
#[derive(Debug, Clone, Default)]
pub struct CashRegisterDraft {
    id: Option<String>,
    float: Option<Decimal>,
    workstation: Option<String>,
    current_cashier_id: Option<String>,
    float_overflowed: bool,
}

impl From<&CashRegisterSnapshot> for CashRegisterDraft {
    fn from(snapshot: &CashRegisterSnapshot) -> Self {
        Self {
            id: Some(snapshot.id.clone()),
            float: Some(snapshot.float),
            workstation: Some(snapshot.workstation.clone()),
            current_cashier_id: snapshot.current_cashier_id.clone(),
            float_overflowed: false,
        }
    }
}

impl Aggregate for CashRegister {
    const KIND: &'static str = "cashregister";
    type Event = CashRegisterEvent;
    type State = CashRegisterDraft;

    fn when(state: CashRegisterDraft, event: &CashRegisterEvent) -> CashRegisterDraft {
        match event {
            CashRegisterEvent::PlacedAtWorkstation {
                cash_register_id,
                workstation,
            } => CashRegisterDraft {
                id: Some(cash_register_id.clone()),
                float: Some(Decimal::ZERO),
                workstation: Some(workstation.clone()),
                current_cashier_id: None,
                float_overflowed: false,
            },
            CashRegisterEvent::ShiftStarted { cashier_id } => CashRegisterDraft {
                current_cashier_id: Some(cashier_id.clone()),
                ..state
            },
            CashRegisterEvent::TransactionRegistered { amount } => {
                let float = state.float.unwrap_or_default().checked_add(*amount);
                CashRegisterDraft {
                    float_overflowed: state.float_overflowed || float.is_none(),
                    float,
                    ..state
                }
            }
            CashRegisterEvent::ShiftEnded => CashRegisterDraft {
                current_cashier_id: None,
                ..state
            },
            CashRegisterEvent::CashRegisterSnapshoted { snapshot } => snapshot.into(),
        }
    }

    fn complete(state: CashRegisterDraft) -> Option<Self> {
        if state.float_overflowed {
            return None;
        }
        let id = state.id.filter(|id| !id.is_empty())?;
        let float = state.float.filter(|float| !float.is_sign_negative())?;
        let workstation = state.workstation.filter(|name| !name.is_empty())?;
        if state
            .current_cashier_id
            .as_ref()
            .is_some_and(String::is_empty)
        {
            return None;
        }
        Some(Self {
            id,
            float,
            workstation,
            current_cashier_id: state.current_cashier_id,
        })
    }
}

/// Why a cash register command was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CashRegisterRejection {
    /// A register with this id was already placed.
    #[error("cash register already exists")]
    AlreadyExists,
    /// The register was never placed.
    #[error("cash register does not exist")]
    NotPlaced,
    /// Another shift is still running.
    #[error("shift already started by cashier '{0}'")]
    ShiftAlreadyStarted(String),
    /// No cashier is on shift.
    #[error("no shift in progress")]
    ShiftNotStarted,
    /// Cashier ids may not be blank.
    #[error("cashier id must not be empty")]
    MissingCashierId,
    /// The transaction would take more out than the float holds.
    #[error("transaction of {amount} would leave float {float} negative")]
    FloatWouldBeNegative {
        /// Float before the transaction.
        float: Decimal,
        /// Requested amount.
        amount: Decimal,
    },
    /// The float cannot represent the result of the transaction.
    #[error("transaction of {amount} overflows float {float}")]
    FloatOverflow {
        /// Float before the transaction.
        float: Decimal,
        /// Requested amount.
        amount: Decimal,
    },
}

impl Rejection for CashRegisterRejection {
    fn code(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "CASH_REGISTER_ALREADY_EXISTS",
            Self::NotPlaced => "CASH_REGISTER_NOT_PLACED",
            Self::ShiftAlreadyStarted(_) => "SHIFT_ALREADY_STARTED",
            Self::ShiftNotStarted => "SHIFT_NOT_STARTED",
            Self::MissingCashierId => "MISSING_CASHIER_ID",
            Self::FloatWouldBeNegative { .. } => "FLOAT_WOULD_BE_NEGATIVE",
            Self::FloatOverflow { .. } => "FLOAT_OVERFLOW",
        }
    }
}

fn on_shift(current: Option<&CashRegister>) -> Result<&CashRegister, CashRegisterRejection> {
    let register = current.ok_or(CashRegisterRejection::NotPlaced)?;
    if !register.shift_in_progress() {
        return Err(CashRegisterRejection::ShiftNotStarted);
    }
    Ok(register)
}

/// Places a new register at a workstation.
#[derive(Debug, Clone)]
pub struct PlaceAtWorkstation {
    /// Id of the new register.
    pub cash_register_id: String,
    /// Workstation name.
    pub workstation: String,
}

impl CommandLogic for PlaceAtWorkstation {
    type Aggregate = CashRegister;
    type Rejection = CashRegisterRejection;

    fn aggregate_id(&self) -> &str {
        &self.cash_register_id
    }

    fn requirement(&self) -> StreamRequirement {
        StreamRequirement::MayBeNew
    }

    fn decide(
        &self,
        current: Option<&CashRegister>,
    ) -> Result<NewEvents<CashRegisterEvent>, CashRegisterRejection> {
        if current.is_some() {
            return Err(CashRegisterRejection::AlreadyExists);
        }
        Ok(NewEvents::one(CashRegisterEvent::PlacedAtWorkstation {
            cash_register_id: self.cash_register_id.clone(),
            workstation: self.workstation.clone(),
        }))
    }
}

/// Hands the register to a cashier.
#[derive(Debug, Clone)]
pub struct StartShift {
    /// Target register.
    pub cash_register_id: String,
    /// The cashier taking over.
    pub cashier_id: String,
}

impl CommandLogic for StartShift {
    type Aggregate = CashRegister;
    type Rejection = CashRegisterRejection;

    fn aggregate_id(&self) -> &str {
        &self.cash_register_id
    }

    fn decide(
        &self,
        current: Option<&CashRegister>,
    ) -> Result<NewEvents<CashRegisterEvent>, CashRegisterRejection> {
        let register = current.ok_or(CashRegisterRejection::NotPlaced)?;
        if let Some(cashier_id) = &register.current_cashier_id {
            return Err(CashRegisterRejection::ShiftAlreadyStarted(cashier_id.clone()));
        }
        if self.cashier_id.trim().is_empty() {
            return Err(CashRegisterRejection::MissingCashierId);
        }
        Ok(NewEvents::one(CashRegisterEvent::ShiftStarted {
            cashier_id: self.cashier_id.clone(),
        }))
    }
}

/// Books money into or out of the register.
#[derive(Debug, Clone)]
pub struct RegisterTransaction {
    /// Target register.
    pub cash_register_id: String,
    /// Signed amount.
    pub amount: Decimal,
}

impl CommandLogic for RegisterTransaction {
    type Aggregate = CashRegister;
    type Rejection = CashRegisterRejection;

    fn aggregate_id(&self) -> &str {
        &self.cash_register_id
    }

    fn decide(
        &self,
        current: Option<&CashRegister>,
    ) -> Result<NewEvents<CashRegisterEvent>, CashRegisterRejection> {
        let register = on_shift(current)?;
        let float = register.float.checked_add(self.amount).ok_or(
            CashRegisterRejection::FloatOverflow {
                float: register.float,
                amount: self.amount,
            },
        )?;
        if float.is_sign_negative() {
            return Err(CashRegisterRejection::FloatWouldBeNegative {
                float: register.float,
                amount: self.amount,
            });
        }
        Ok(NewEvents::one(CashRegisterEvent::TransactionRegistered {
            amount: self.amount,
        }))
    }
}

/// Ends the running shift.
#[derive(Debug, Clone)]
pub struct EndShift {
    /// Target register.
    pub cash_register_id: String,
}

impl CommandLogic for EndShift {
    type Aggregate = CashRegister;
    type Rejection = CashRegisterRejection;

    fn aggregate_id(&self) -> &str {
        &self.cash_register_id
    }

    fn decide(
        &self,
        current: Option<&CashRegister>,
    ) -> Result<NewEvents<CashRegisterEvent>, CashRegisterRejection> {
        on_shift(current)?;
        Ok(NewEvents::one(CashRegisterEvent::ShiftEnded))
    }
}
