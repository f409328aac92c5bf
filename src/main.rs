//! smallsh — fork/exec とシグナル処理だけに絞った小さな対話シェル
//!
//! REPLループ: バックグラウンド reap → プロンプト表示 → 1 行読み取り → パース → 実行 → ループ
//!
//! 終了コードは `exit` ビルトイン（または入力終端）で常に 0。

use std::io;

use tracing_subscriber::EnvFilter;

use smallsh::config::{self, Config};
use smallsh::input::{self, ReadOutcome};
use smallsh::shell::Shell;
use smallsh::{builtins, executor, job, signal};

/// `SMALLSH_LOG` からフィルタを読み、stderr に出力する subscriber を設定する。既定は無効。
fn init_tracing() {
    let filter = EnvFilter::try_from_env(config::LOG_ENV).unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn main() {
    init_tracing();

    // シェル本体: SIGINT は無視、SIGTSTP は foreground-only モードのトグル
    if let Err(e) = signal::install_interpreter() {
        eprintln!("smallsh: sigaction: {}", e);
        std::process::exit(1);
    }

    let mut shell = Shell::new(Config::from_env());
    let mut stdout = io::stdout();

    loop {
        // プロンプト前にバックグラウンドジョブを reap し、完了通知を出力
        let finished = shell.jobs.reap();
        job::notify(&finished);

        input::prompt(&shell.config.prompt);

        match input::read_line(libc::STDIN_FILENO) {
            ReadOutcome::Line(line) => {
                if let Err(e) = executor::run_line(&mut shell, &line, &mut stdout) {
                    eprintln!("smallsh: {}", e);
                }
            }
            // SIGTSTP の通知は改行で終わっているので、そのままプロンプトを出し直す
            ReadOutcome::Interrupted => continue,
            ReadOutcome::Eof => {
                tracing::debug!("end of input, exiting");
                builtins::builtin_exit(&mut shell);
            }
        }

        if shell.should_exit {
            break;
        }
    }

    std::process::exit(0);
}
