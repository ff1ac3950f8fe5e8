pub mod balance_writer;
pub mod journal_reader;
