//! smallsh ライブラリ — テスト・ベンチマーク用にモジュールを公開する。
//!
//! バイナリ本体は `main.rs` の REPL ループ。
//!
//! ## モジュール構成
//!
//! | モジュール | 役割 |
//! |-----------|------|
//! | [`parser`] | トークナイザ（空白区切り、`<` / `>` リダイレクト、行末 `&`、コメント行） |
//! | [`executor`] | コマンド振り分け（ビルトイン / フォアグラウンド / バックグラウンド） |
//! | [`builtins`] | ビルトイン（`exit`, `cd`, `status`） |
//! | [`spawn`] | `fork` + `execvp` ラッパー（子側のシグナル設定・リダイレクト適用） |
//! | [`redirect`] | stdin / stdout の付け替え（バックグラウンドは `/dev/null` を既定にする） |
//! | [`signal`] | SIGINT / SIGTSTP の処理方法と foreground-only モード |
//! | [`job`] | 有界ジョブテーブル、非ブロッキング reap、フォアグラウンド待機 |
//! | [`shell`] | インタプリタ状態（直前の終了状態、ジョブテーブル、終了フラグ） |
//! | [`input`] | プロンプト表示と 1 バイトずつの行読み取り |
//! | [`config`] | 実行時設定（既定値 + 環境変数） |

pub mod builtins;
pub mod config;
pub mod executor;
pub mod input;
pub mod job;
pub mod parser;
pub mod redirect;
pub mod shell;
pub mod signal;
pub mod spawn;
