use crate::domain::account::Account;
use crate::domain::ports::LedgerStoreRef;
use crate::error::Result;
use std::io::Write;

/// Writes final account balances as CSV (`account,balance`), one row per
/// account in id order.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub async fn write_balances(
        &mut self,
        accounts: &[Account],
        ledger: &LedgerStoreRef,
    ) -> Result<()> {
        self.writer.write_record(["account", "balance"])?;
        for account in accounts {
            let balance = ledger.balance_of(&account.id).await?.to_string();
            self.writer
                .write_record([account.id.as_str(), balance.as_str()])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
