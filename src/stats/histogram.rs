use std::cmp::min;

use thiserror::Error;

use super::predicate_op::PredicateOp;

#[derive(Error, Debug)]
pub enum HistogramError {
    #[error("[Invalid configuration error] {0}")]
    InvalidConfiguration(String),
}

/**
 * カラムの値の分布を保持する等幅ヒストグラム
 *
 * 閉区間 [min, max] を同じ幅の bucket に分割し、それぞれの bucket に含まれる値の観測数を数える
 * planner はこれをもとに、実際のデータを scan することなく predicate の cardinality を見積もる
 * 実装の都合上、必ずしも正確な値が返されるわけではないことに注意
 */
#[derive(Debug, Clone)]
pub struct Histogram {
    min: i64,
    max: i64,
    // bucket_count 個の bucket で [min, max] を覆いきれる最小の幅 (切り上げで計算する)
    bucket_width: i64,
    buckets: Vec<u64>,
    total_count: u64,
}

impl Histogram {
    pub fn new(bucket_count: usize, min: i32, max: i32) -> Result<Self, HistogramError> {
        if bucket_count == 0 || min >= max {
            return Err(HistogramError::InvalidConfiguration(format!(
                "bucket count must be positive and min must be less than max (bucket count: {}, min: {}, max: {})",
                bucket_count, min, max
            )));
        }
        let (min, max) = (min as i64, max as i64);
        // 区間は inclusive なので値の種類は max - min + 1 個ある
        let domain_size = max - min + 1;
        let bucket_width = (domain_size + bucket_count as i64 - 1) / bucket_count as i64;
        Ok(Self {
            min,
            max,
            bucket_width,
            buckets: vec![0; bucket_count],
            total_count: 0,
        })
    }

    /// 観測した値を 1 つ追加する
    /// [min, max] の外の値は無視される
    pub fn add_value(&mut self, v: i32) {
        let v = v as i64;
        if v < self.min || v > self.max {
            return;
        }
        let bucket_index = self.bucket_index(v);
        self.buckets[bucket_index] += 1;
        self.total_count += 1;
    }

    /// predicate `column op v` を満たす値の個数を見積もる
    ///
    /// bucket の内部では値が一様に分布していると仮定して、境界の bucket の寄与を
    /// 線形補間で求める。補間した端数は切り捨てて整数にする
    pub fn estimate_cardinality(&self, op: PredicateOp, v: i32) -> u64 {
        if self.total_count == 0 {
            return 0;
        }

        // 区間の外の値は bucket を見るまでもなく決まる
        let v = v as i64;
        if v < self.min {
            return match op {
                PredicateOp::Gt | PredicateOp::Ge => self.total_count,
                _ => 0,
            };
        }
        if v > self.max {
            return match op {
                PredicateOp::Lt | PredicateOp::Le => self.total_count,
                _ => 0,
            };
        }

        let bucket_index = self.bucket_index(v);
        let bucket_start = self.min + bucket_index as i64 * self.bucket_width;
        let bucket_end = bucket_start + self.bucket_width - 1;
        let bucket_height = self.buckets[bucket_index];

        match op {
            // bucket の中では 1 つの値あたり bucket_height / bucket_width 個あるとみなす
            PredicateOp::Eq => {
                if bucket_height == 0 {
                    return 0;
                }
                bucket_height / self.bucket_width as u64
            }
            PredicateOp::Ne => {
                if bucket_height == 0 {
                    return self.total_count;
                }
                self.total_count - bucket_height / self.bucket_width as u64
            }
            PredicateOp::Lt => {
                let fraction = if v > bucket_start {
                    self.fraction_of_bucket(v - bucket_start)
                } else {
                    0.0
                };
                (fraction * bucket_height as f64) as u64 + self.sum_before(bucket_index)
            }
            PredicateOp::Le => {
                let fraction = if v >= bucket_start {
                    self.fraction_of_bucket(v - bucket_start + 1)
                } else {
                    0.0
                };
                (fraction * bucket_height as f64) as u64 + self.sum_before(bucket_index)
            }
            PredicateOp::Gt => {
                let fraction = if v < bucket_end {
                    self.fraction_of_bucket(bucket_end - v)
                } else {
                    0.0
                };
                (fraction * bucket_height as f64) as u64 + self.sum_after(bucket_index)
            }
            PredicateOp::Ge => {
                // 空の bucket は端数の計算をせずに bucket ごと含める
                // (寄与は 0 なので LT の結果と合わせると total_count になる)
                if bucket_height == 0 {
                    return self.sum_from(bucket_index);
                }
                let fraction = if v <= bucket_end {
                    self.fraction_of_bucket(bucket_end - v + 1)
                } else {
                    0.0
                };
                (fraction * bucket_height as f64) as u64 + self.sum_after(bucket_index)
            }
        }
    }

    /// ヒストグラムに記録されている観測数の合計を返す
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket_width(&self) -> u64 {
        self.bucket_width as u64
    }

    pub fn min(&self) -> i32 {
        self.min as i32
    }

    pub fn max(&self) -> i32 {
        self.max as i32
    }

    /// v が属する bucket の index を返す
    /// 呼び出す前に v が [min, max] に入っていることを確認しておくこと
    fn bucket_index(&self, v: i64) -> usize {
        let bucket_index = ((v - self.min) / self.bucket_width) as usize;
        // bucket_width を切り上げで計算しているため、区間の上端が最後の bucket を
        // 1 つはみ出すことがあるので clamp する
        min(bucket_index, self.buckets.len() - 1)
    }

    /// bucket の中で補間に使う割合を返す
    /// LT/LE と GT/GE で境界の扱いがずれないように、割合の計算はここに集約している
    fn fraction_of_bucket(&self, numerator: i64) -> f64 {
        (numerator as f64 / self.bucket_width as f64).clamp(0.0, 1.0)
    }

    fn sum_before(&self, bucket_index: usize) -> u64 {
        self.buckets[..bucket_index].iter().sum()
    }

    fn sum_after(&self, bucket_index: usize) -> u64 {
        self.buckets[bucket_index + 1..].iter().sum()
    }

    fn sum_from(&self, bucket_index: usize) -> u64 {
        self.buckets[bucket_index..].iter().sum()
    }
}
