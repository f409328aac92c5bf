//! ビルトインコマンドの実装。
//!
//! ビルトインは fork/exec を経由せずプロセス内で直接実行される。
//! [`Builtin::lookup`] が `Some` を返せばビルトインとして処理し、
//! `None` なら外部コマンドとして executor に委ねる。
//! リダイレクトと `&` はビルトインには適用されない。

use std::env;
use std::io::{self, Write};

use crate::shell::Shell;

/// ビルトインの種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Exit,
    Cd,
    Status,
}

impl Builtin {
    /// コマンド名からビルトインを引く。
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "exit" => Some(Builtin::Exit),
            "cd" => Some(Builtin::Cd),
            "status" => Some(Builtin::Status),
            _ => None,
        }
    }

    /// ビルトインを実行する。`last_status` はどのビルトインも変更しない。
    pub fn run(self, shell: &mut Shell, args: &[String], out: &mut dyn Write) -> io::Result<()> {
        match self {
            Builtin::Exit => {
                builtin_exit(shell);
                Ok(())
            }
            Builtin::Cd => {
                builtin_cd(args);
                Ok(())
            }
            Builtin::Status => builtin_status(shell, out),
        }
    }
}

/// `exit` — 追跡中のバックグラウンドプロセスを kill してループを終了させる。
pub fn builtin_exit(shell: &mut Shell) {
    shell.jobs.kill_all();
    shell.should_exit = true;
}

/// `cd [dir]` — カレントディレクトリを変更する。引数省略時は `$HOME` に移動。
/// 失敗しても何も出力しない。
fn builtin_cd(args: &[String]) {
    let target = match args.get(1) {
        Some(dir) => dir.clone(),
        None => match env::var("HOME") {
            Ok(home) => home,
            Err(_) => return,
        },
    };
    if let Err(e) = env::set_current_dir(&target) {
        tracing::debug!(target = %target, error = %e, "cd failed");
    }
}

/// `status` — 直前のフォアグラウンドコマンドの終了状態を表示する。
fn builtin_status(shell: &Shell, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}", shell.last_status)?;
    out.flush()
}
