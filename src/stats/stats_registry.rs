use std::sync::Mutex;

use anyhow::{anyhow, Result as AnyhowResult};
use dashmap::DashMap;
use thiserror::Error;

use crate::record::column_source::{ColumnSource, ColumnSpec};

use super::{
    constants::{DEFAULT_BUCKET_COUNT, STATS_REFRESH_PERIOD},
    histogram::Histogram,
    predicate_op::PredicateOp,
};

pub trait StatsRegistry {
    /// 指定されたカラムの predicate `field op v` を満たす行数を見積もる
    fn estimate_cardinality(
        &self,
        table_name: &str,
        field_name: &str,
        op: PredicateOp,
        v: i32,
    ) -> AnyhowResult<u64>;
    /// 指定されたカラムのヒストグラムのコピーを取得する
    fn get_histogram(&self, table_name: &str, field_name: &str) -> AnyhowResult<Histogram>;
}

#[derive(Error, Debug)]
pub enum StatsRegistryError {
    #[error("[Internal error] {0}")]
    Internal(String),
    #[error("[Invalid call error] {0}")]
    InvalidCall(String),
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct FieldId {
    table_name: String,
    field_name: String,
}

/**
 * カラムごとのヒストグラムを管理するための構造体
 *
 * イベントを受け取って統計情報を更新するなどの実装方針も考えられるが、今回の実装では一定の回数問い合わせがあるたびに
 * カラムを読み直してヒストグラムを作り直すような方針をとる
 */
pub struct StatsRegistryImpl {
    column_source: Box<dyn ColumnSource>,
    histograms: DashMap<FieldId, Histogram>,
    num_calls: Mutex<u64>,
}

impl StatsRegistry for StatsRegistryImpl {
    fn estimate_cardinality(
        &self,
        table_name: &str,
        field_name: &str,
        op: PredicateOp,
        v: i32,
    ) -> AnyhowResult<u64> {
        self.count_call()?;
        let field_id = FieldId {
            table_name: table_name.to_string(),
            field_name: field_name.to_string(),
        };
        self.ensure_histogram(&field_id)?;
        let histogram = self.histograms.get(&field_id).ok_or(anyhow!(
            StatsRegistryError::Internal(format!(
                "histogram for field ({}, {}) disappeared after build",
                table_name, field_name
            ))
        ))?;
        Ok(histogram.value().estimate_cardinality(op, v))
    }

    fn get_histogram(&self, table_name: &str, field_name: &str) -> AnyhowResult<Histogram> {
        self.count_call()?;
        let field_id = FieldId {
            table_name: table_name.to_string(),
            field_name: field_name.to_string(),
        };
        self.ensure_histogram(&field_id)?;
        Ok(self
            .histograms
            .get(&field_id)
            .ok_or(anyhow!(StatsRegistryError::Internal(format!(
                "histogram for field ({}, {}) disappeared after build",
                table_name, field_name
            ))))?
            .value()
            .clone())
    }
}

impl StatsRegistryImpl {
    pub fn new(column_source: Box<dyn ColumnSource>) -> Self {
        Self {
            column_source,
            histograms: DashMap::new(),
            num_calls: Mutex::new(0),
        }
    }

    /// 問い合わせの回数を数えて、一定の回数を超えたら統計情報を作り直す
    fn count_call(&self) -> AnyhowResult<()> {
        let mut num_calls = self
            .num_calls
            .lock()
            .map_err(|_| StatsRegistryError::Internal("Failed to lock mutex".to_string()))?;
        *num_calls += 1;
        if *num_calls > STATS_REFRESH_PERIOD {
            *num_calls = 0;
            self.refresh_statistics()?;
        }
        Ok(())
    }

    /// ヒストグラムがまだ作られていない場合は column source から作る
    fn ensure_histogram(&self, field_id: &FieldId) -> AnyhowResult<()> {
        if self.histograms.contains_key(field_id) {
            return Ok(());
        }
        let spec = self
            .column_source
            .columns()?
            .into_iter()
            .find(|spec| {
                spec.table_name == field_id.table_name && spec.field_name == field_id.field_name
            })
            .ok_or(anyhow!(StatsRegistryError::InvalidCall(format!(
                "Failed to get histogram for field ({}, {}). Probably the field does not exist",
                field_id.table_name, field_id.field_name
            ))))?;
        let histogram = self.calc_histogram(&spec)?;
        self.histograms.insert(field_id.clone(), histogram);
        Ok(())
    }

    /// すべてのカラムのヒストグラムを作り直す
    fn refresh_statistics(&self) -> AnyhowResult<()> {
        self.histograms.clear();
        for spec in self.column_source.columns()? {
            let histogram = self.calc_histogram(&spec)?;
            let field_id = FieldId {
                table_name: spec.table_name,
                field_name: spec.field_name,
            };
            self.histograms.insert(field_id, histogram);
        }
        Ok(())
    }

    /// カラムの値を読み出してヒストグラムを作る
    fn calc_histogram(&self, spec: &ColumnSpec) -> AnyhowResult<Histogram> {
        let mut histogram = Histogram::new(DEFAULT_BUCKET_COUNT, spec.min, spec.max)?;
        for v in self
            .column_source
            .scan_values(&spec.table_name, &spec.field_name)?
        {
            histogram.add_value(v);
        }
        Ok(histogram)
    }
}

pub struct StatsRegistryFactory {}

impl StatsRegistryFactory {
    pub fn create(column_source: Box<dyn ColumnSource>) -> Box<dyn StatsRegistry> {
        let stats_registry = StatsRegistryImpl::new(column_source);
        Box::new(stats_registry)
    }
}

#[cfg(test)]
mod stats_registry_test {
    use super::*;
    use crate::record::column_source::MockColumnSource;
    use mockall::predicate::eq;

    fn column_spec(table_name: &str, field_name: &str, min: i32, max: i32) -> ColumnSpec {
        ColumnSpec {
            table_name: table_name.to_string(),
            field_name: field_name.to_string(),
            min,
            max,
        }
    }

    #[test]
    fn test_estimate_builds_histogram_on_first_call() {
        let column_source = {
            let mut column_source = MockColumnSource::new();
            column_source
                .expect_columns()
                .returning(|| Ok(vec![column_spec("tbl", "A", 0, 99)]));
            column_source
                .expect_scan_values()
                .with(eq("tbl"), eq("A"))
                .once()
                .returning(|_, _| Ok(vec![5, 5, 5, 55, 55]));
            column_source
        };
        let stats_registry = StatsRegistryImpl::new(Box::new(column_source));

        let result = stats_registry.estimate_cardinality("tbl", "A", PredicateOp::Lt, 50);
        assert_eq!(result.unwrap(), 3);
        // 2 回目は作り直さずに同じヒストグラムを使う (scan_values は once で縛っている)
        let result = stats_registry.estimate_cardinality("tbl", "A", PredicateOp::Ge, 50);
        assert_eq!(result.unwrap(), 2);

        let histogram = stats_registry.get_histogram("tbl", "A").unwrap();
        assert_eq!(histogram.total_count(), 5);
        assert_eq!(histogram.min(), 0);
        assert_eq!(histogram.max(), 99);
    }

    #[test]
    fn test_estimate_for_unknown_field() {
        let column_source = {
            let mut column_source = MockColumnSource::new();
            column_source
                .expect_columns()
                .returning(|| Ok(vec![column_spec("tbl", "A", 0, 99)]));
            column_source
        };
        let stats_registry = StatsRegistryImpl::new(Box::new(column_source));

        let result = stats_registry.estimate_cardinality("tbl", "B", PredicateOp::Eq, 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_column_bounds_fail_the_build() {
        // min >= max のカラムはヒストグラムを作れないのでエラーになる
        let column_source = {
            let mut column_source = MockColumnSource::new();
            column_source
                .expect_columns()
                .returning(|| Ok(vec![column_spec("tbl", "A", 5, 5)]));
            column_source
        };
        let stats_registry = StatsRegistryImpl::new(Box::new(column_source));

        let result = stats_registry.estimate_cardinality("tbl", "A", PredicateOp::Eq, 5);
        assert!(result.is_err());
    }

    #[test]
    fn test_statistics_are_refreshed_periodically() {
        let column_source = {
            let mut column_source = MockColumnSource::new();
            column_source
                .expect_columns()
                .returning(|| Ok(vec![column_spec("tbl", "A", 0, 99)]));
            // 最初の問い合わせで作られるヒストグラムは 2 件
            column_source
                .expect_scan_values()
                .once()
                .returning(|_, _| Ok(vec![10, 20]));
            // 作り直し後は 5 件に増えている
            column_source
                .expect_scan_values()
                .once()
                .returning(|_, _| Ok(vec![10, 20, 30, 40, 50]));
            column_source
        };
        let stats_registry = StatsRegistryImpl::new(Box::new(column_source));

        for _ in 0..STATS_REFRESH_PERIOD {
            let result = stats_registry.estimate_cardinality("tbl", "A", PredicateOp::Le, 99);
            assert_eq!(result.unwrap(), 2);
        }
        // STATS_REFRESH_PERIOD を超えた問い合わせで統計情報が作り直される
        let result = stats_registry.estimate_cardinality("tbl", "A", PredicateOp::Le, 99);
        assert_eq!(result.unwrap(), 5);
    }
}
