//! シェルのインタプリタ状態を保持するモジュール。
//!
//! 直前のフォアグラウンド終了状態、バックグラウンドジョブテーブル、終了要求フラグ、設定を持つ。
//! foreground-only モードだけはシグナルハンドラから書き換えられるため
//! ここには置かず [`signal`](crate::signal) が保持する。

use crate::config::Config;
use crate::job::{JobTable, Termination};

/// シェルの実行状態。REPLループ全体で共有される。
pub struct Shell {
    /// 直前に完了したフォアグラウンド外部コマンドの終了状態。`status` ビルトインが読む。
    /// バックグラウンドの完了やビルトインでは変化しない。
    pub last_status: Termination,
    /// `exit` ビルトイン（または入力終端）で true にセットされ、REPLループを終了させる。
    pub should_exit: bool,
    /// バックグラウンドジョブテーブル。
    pub jobs: JobTable,
    pub config: Config,
}

impl Shell {
    pub fn new(config: Config) -> Self {
        Self {
            last_status: Termination::default(),
            should_exit: false,
            jobs: JobTable::new(config.job_capacity),
            config,
        }
    }
}
