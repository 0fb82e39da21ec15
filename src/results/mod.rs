mod result_set;
mod row;

pub use result_set::{ColumnInfo, ExecResult};
pub use row::DbRow;
