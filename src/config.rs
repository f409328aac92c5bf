//! 実行時設定。
//!
//! CLI フラグは持たない。既定値に環境変数による上書きを重ねるだけの薄い層。

use std::env;

/// ログフィルタを読み取る環境変数名。
pub const LOG_ENV: &str = "SMALLSH_LOG";

/// ジョブテーブル容量を上書きする環境変数名。
pub const JOB_CAPACITY_ENV: &str = "SMALLSH_JOB_CAPACITY";

/// シェル全体の設定値。
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// 各イテレーションで表示するプロンプト。
    pub prompt: String,
    /// 同時に追跡できるバックグラウンドプロセス数の上限。
    pub job_capacity: usize,
    /// 1 行あたりの引数数の上限（argv[0] を含む）。
    pub max_args: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: ": ".to_string(),
            job_capacity: 10,
            max_args: 512,
        }
    }
}

impl Config {
    /// 既定値に環境変数の上書きを適用する。
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = env::var(JOB_CAPACITY_ENV) {
            config.apply_job_capacity(&raw);
        }
        config
    }

    /// 正の整数なら容量として採用する。不正値は警告して無視。
    fn apply_job_capacity(&mut self, raw: &str) {
        match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => self.job_capacity = n,
            _ => tracing::warn!(value = raw, "ignoring invalid {}", JOB_CAPACITY_ENV),
        }
    }
}
