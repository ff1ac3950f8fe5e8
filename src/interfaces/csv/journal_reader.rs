use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum JournalAction {
    Submit,
    Assign,
    Release,
    Approve,
    Reject,
    RechargeRequest,
    RechargeApprove,
    RechargeReject,
}

/// One journal row: `action, actor, reference, type, amount`.
///
/// `type` is only meaningful for `submit` (the operation type code);
/// `amount` for `submit`, `recharge_request` and `recharge_approve`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct JournalRecord {
    pub action: JournalAction,
    pub actor: String,
    pub reference: String,
    pub r#type: Option<String>,
    pub amount: Option<Decimal>,
}

/// Streams journal records from a CSV source, trimming whitespace and
/// tolerating short rows. Malformed rows surface as per-row errors so a
/// replay can keep going.
pub struct JournalReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> JournalReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn records(self) -> impl Iterator<Item = Result<JournalRecord>> {
        self.reader
            .into_deserialize()
            .map(|record| record.map_err(EngineError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "action, actor, reference, type, amount\n\
                    submit, A1, OP-1, transfer, 1500\n\
                    assign, C1, OP-1, ,\n\
                    approve, C1, OP-1, ,";
        let records: Vec<_> = JournalReader::new(data.as_bytes()).records().collect();
        assert_eq!(records.len(), 3);

        let submit = records[0].as_ref().unwrap();
        assert_eq!(submit.action, JournalAction::Submit);
        assert_eq!(submit.actor, "A1");
        assert_eq!(submit.amount, Some(dec!(1500)));

        let assign = records[1].as_ref().unwrap();
        assert_eq!(assign.action, JournalAction::Assign);
        assert_eq!(assign.amount, None);
    }

    #[test]
    fn test_reader_malformed_action() {
        let data = "action, actor, reference, type, amount\nteleport, A1, OP-1, ,";
        let records: Vec<_> = JournalReader::new(data.as_bytes()).records().collect();
        assert!(records[0].is_err());
    }
}
