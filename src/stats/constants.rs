pub(crate) const DEFAULT_BUCKET_COUNT: usize = 32;

// この回数だけ見積もりの問い合わせを受けるたびに統計情報を作り直す
pub(crate) const STATS_REFRESH_PERIOD: u64 = 100;
