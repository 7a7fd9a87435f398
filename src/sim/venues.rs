use crate::hedging::{PerpVenue, SwapVenue};
use crate::utils::Fixed;
use parking_lot::Mutex;

/// Spot venue filling at a single price with an optional fee
pub struct PaperSwapVenue {
    price: Mutex<Fixed>,
    fee_bps: u32,
}

impl PaperSwapVenue {
    pub fn new(price: Fixed) -> Self {
        Self::with_fee(price, 0)
    }

    pub fn with_fee(price: Fixed, fee_bps: u32) -> Self {
        Self {
            price: Mutex::new(price),
            fee_bps,
        }
    }

    pub fn set_price(&self, price: Fixed) {
        *self.price.lock() = price;
    }
}

impl SwapVenue for PaperSwapVenue {
    fn price(&self) -> crate::Result<Fixed> {
        Ok(*self.price.lock())
    }

    fn buy_underlying(&self, amount: Fixed, max_spend: Fixed) -> crate::Result<Fixed> {
        let notional = amount.mul(*self.price.lock());
        let cost = notional + notional.bps_ceil(self.fee_bps);
        if cost > max_spend {
            return Err(crate::Error::Venue(format!(
                "buying {} costs {}, limit {}",
                amount, cost, max_spend
            )));
        }
        Ok(cost)
    }

    fn sell_underlying(&self, amount: Fixed) -> crate::Result<Fixed> {
        let notional = amount.mul(*self.price.lock());
        Ok(notional - notional.bps_ceil(self.fee_bps))
    }
}

struct PerpAccount {
    mark: Fixed,
    position: Fixed,
    entry_price: Fixed,
    deposited: Fixed,
    max_position: Option<Fixed>,
}

impl PerpAccount {
    fn unrealised(&self) -> Fixed {
        self.position.mul(self.mark - self.entry_price)
    }
}

/// Perpetual-futures venue with a single cross-margined account
pub struct PaperPerpVenue {
    account: Mutex<PerpAccount>,
}

impl PaperPerpVenue {
    pub fn new(mark: Fixed) -> Self {
        Self {
            account: Mutex::new(PerpAccount {
                mark,
                position: Fixed::ZERO,
                entry_price: mark,
                deposited: Fixed::ZERO,
                max_position: None,
            }),
        }
    }

    pub fn set_price(&self, mark: Fixed) {
        self.account.lock().mark = mark;
    }

    /// Cap on |position| the venue will fill up to
    pub fn set_max_position(&self, max: Option<Fixed>) {
        self.account.lock().max_position = max;
    }

    pub fn position(&self) -> Fixed {
        self.account.lock().position
    }
}

impl PerpVenue for PaperPerpVenue {
    fn mark_price(&self) -> crate::Result<Fixed> {
        Ok(self.account.lock().mark)
    }

    fn trade(&self, size: Fixed) -> crate::Result<Fixed> {
        let mut account = self.account.lock();
        let mut target = account.position + size;
        if let Some(max) = account.max_position {
            if target.abs() > max && target.abs() > account.position.abs() {
                let cap = max.max(account.position.abs());
                target = if target.is_negative() { -cap } else { cap };
            }
        }
        let filled = target - account.position;
        if filled.is_zero() {
            return Ok(Fixed::ZERO);
        }

        // Realise PnL on the part that closes, re-base entry on the part that opens
        let pnl = account.unrealised();
        let same_direction = account.position.is_zero() || account.position.signum() == filled.signum();
        if same_direction {
            let old_notional = account.position.abs().mul(account.entry_price);
            let new_notional = filled.abs().mul(account.mark);
            account.entry_price = (old_notional + new_notional).div(target.abs());
        } else {
            let closed = filled.abs().min(account.position.abs());
            let realised = pnl.mul_div(closed, account.position.abs());
            account.deposited += realised;
            if target.signum() != account.position.signum() {
                account.entry_price = account.mark;
            }
        }
        account.position = target;
        Ok(filled)
    }

    fn deposit_margin(&self, amount: Fixed) -> crate::Result<()> {
        self.account.lock().deposited += amount;
        Ok(())
    }

    fn withdraw_margin(&self, amount: Fixed) -> crate::Result<()> {
        let mut account = self.account.lock();
        let equity = account.deposited + account.unrealised();
        if amount > equity {
            return Err(crate::Error::Venue(format!(
                "withdraw {} exceeds equity {}",
                amount, equity
            )));
        }
        account.deposited -= amount;
        Ok(())
    }

    fn margin(&self) -> crate::Result<Fixed> {
        let account = self.account.lock();
        Ok(account.deposited + account.unrealised())
    }
}
