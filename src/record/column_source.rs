use mockall::automock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColumnSourceError {
    #[error("[Internal error] {0}")]
    Internal(String),
    #[error("[Invalid call error] {0}")]
    InvalidCall(String),
}

/**
 * 統計情報の対象となるカラムの情報
 * min / max はカラムの値の取りうる範囲 (inclusive) を表す
 */
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnSpec {
    pub table_name: String,
    pub field_name: String,
    pub min: i32,
    pub max: i32,
}

/**
 * 統計情報の元になるカラムの値を読み出すための trait
 * テーブルのデータを実際に保持しているコンポーネントが実装することを想定している
 */
#[automock]
pub trait ColumnSource {
    /// 統計情報の対象となるカラムの一覧を返す
    fn columns(&self) -> Result<Vec<ColumnSpec>, ColumnSourceError>;
    /// 指定されたカラムの値をすべて読み出す
    fn scan_values(
        &self,
        table_name: &str,
        field_name: &str,
    ) -> Result<Vec<i32>, ColumnSourceError>;
}
