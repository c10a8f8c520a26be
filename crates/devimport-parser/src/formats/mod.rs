mod common;
mod csv_table;
mod ttn_json;

pub use csv_table::CsvTableFormat;
pub use ttn_json::TtnJsonFormat;
