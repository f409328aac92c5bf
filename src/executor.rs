//! コマンド実行: 1 行を解釈し、ビルトインまたは外部コマンドに振り分ける。
//!
//! - [`run_line`]: パース → [`execute`]。パース失敗の扱い（黙って破棄 / 報告）もここで決める
//! - [`execute`]: ビルトイン判定 → フォアグラウンド / バックグラウンド起動
//!   - foreground: [`spawn::launch`] 後に [`job::wait_foreground`] で待機し、`last_status` を更新
//!   - background: 容量を確認してから起動し、PID を表示してジョブテーブルに登録

use std::io::{self, Write};

use crate::builtins::Builtin;
use crate::job;
use crate::parser::{self, CommandLine, ParseError};
use crate::shell::Shell;
use crate::signal;
use crate::spawn::{self, Role};

/// 入力 1 行を処理する。
pub fn run_line(shell: &mut Shell, line: &str, out: &mut dyn Write) -> io::Result<()> {
    match parser::parse(line, signal::foreground_only(), shell.config.max_args) {
        Ok(Some(cmd)) => execute(shell, &cmd, out),
        Ok(None) => Ok(()),
        Err(ParseError::MissingRedirectTarget) => {
            tracing::debug!(line, "discarding line with dangling redirect");
            Ok(())
        }
        Err(e) => {
            eprintln!("smallsh: {}", e);
            Ok(())
        }
    }
}

/// パース済みコマンドを実行する。
///
/// 子プロセス側の失敗（リダイレクト、exec）は子の終了ステータス 1 として観測される。
/// 親側の失敗は stderr に報告し、シェルは継続する。
pub fn execute(shell: &mut Shell, cmd: &CommandLine, out: &mut dyn Write) -> io::Result<()> {
    if let Some(builtin) = Builtin::lookup(cmd.program()) {
        return builtin.run(shell, &cmd.args, out);
    }

    match Role::of(cmd) {
        Role::Foreground => execute_foreground(shell, cmd, out),
        Role::Background => execute_background(shell, cmd, out),
    }
}

// ── フォアグラウンド ────────────────────────────────────────────────

fn execute_foreground(shell: &mut Shell, cmd: &CommandLine, out: &mut dyn Write) -> io::Result<()> {
    let pid = match spawn::launch(cmd, Role::Foreground) {
        Ok(pid) => pid,
        Err(e) => {
            eprintln!("smallsh: {}", e);
            return Ok(());
        }
    };

    let termination = match job::wait_foreground(pid) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("smallsh: waitpid {}: {}", pid, e);
            return Ok(());
        }
    };

    if let job::Termination::Signaled(_) = termination {
        writeln!(out, "{}", termination)?;
        out.flush()?;
    }
    shell.last_status = termination;
    Ok(())
}

// ── バックグラウンド ────────────────────────────────────────────────

fn execute_background(shell: &mut Shell, cmd: &CommandLine, out: &mut dyn Write) -> io::Result<()> {
    // 登録できない子を作らないよう fork 前に容量を確認する
    if let Err(e) = shell.jobs.check_capacity() {
        eprintln!("smallsh: {}: {}", cmd.program(), e);
        return Ok(());
    }

    let pid = match spawn::launch(cmd, Role::Background) {
        Ok(pid) => pid,
        Err(e) => {
            eprintln!("smallsh: {}", e);
            return Ok(());
        }
    };

    writeln!(out, "background pid is {}", pid)?;
    out.flush()?;

    if let Err(e) = shell.jobs.insert(pid) {
        eprintln!("smallsh: {}: {}", cmd.program(), e);
        unsafe {
            libc::kill(pid, libc::SIGKILL);
            libc::waitpid(pid, std::ptr::null_mut(), 0);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::job::Termination;
    use std::thread;
    use std::time::Duration;

    // foreground-only モードはプロセス共有なので、ここでは常に無効としてパースする
    fn run(shell: &mut Shell, line: &str) -> String {
        let mut out = Vec::new();
        if let Some(cmd) = parser::parse(line, false, 512).unwrap() {
            execute(shell, &cmd, &mut out).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn foreground_records_exit_code() {
        let mut shell = Shell::new(Config::default());
        assert_eq!(run(&mut shell, "sh -c exit${IFS}3"), "");
        assert_eq!(shell.last_status, Termination::Exited(3));

        run(&mut shell, "false");
        assert_eq!(shell.last_status, Termination::Exited(1));
        run(&mut shell, "true");
        assert_eq!(shell.last_status, Termination::Exited(0));
    }

    #[test]
    fn foreground_exec_failure_sets_status_1() {
        let mut shell = Shell::new(Config::default());
        run(&mut shell, "smallsh-definitely-missing-program");
        assert_eq!(shell.last_status, Termination::Exited(1));
        assert_eq!(run(&mut shell, "status"), "exit value 1\n");
    }

    #[test]
    fn foreground_signal_is_reported_and_recorded() {
        let mut shell = Shell::new(Config::default());
        let printed = run(&mut shell, "sh -c kill${IFS}-15${IFS}$$");
        assert_eq!(printed, format!("terminated by signal {}\n", libc::SIGTERM));
        assert_eq!(shell.last_status, Termination::Signaled(libc::SIGTERM));
    }

    #[test]
    fn comment_and_dangling_redirect_do_nothing() {
        let mut shell = Shell::new(Config::default());
        shell.last_status = Termination::Exited(4);
        let mut out = Vec::new();
        run_line(&mut shell, "# comment", &mut out).unwrap();
        run_line(&mut shell, "cat <", &mut out).unwrap();
        run_line(&mut shell, "", &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(shell.last_status, Termination::Exited(4));
    }

    #[test]
    fn output_redirection_then_input_redirection() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let copy = dir.path().join("copy.txt");
        let mut shell = Shell::new(Config::default());

        run(&mut shell, &format!("echo hello > {}", out.display()));
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello\n");

        run(&mut shell, &format!("cat < {} > {}", out.display(), copy.display()));
        assert_eq!(std::fs::read_to_string(&copy).unwrap(), "hello\n");
        assert_eq!(shell.last_status, Termination::Exited(0));
    }

    #[test]
    fn missing_input_file_sets_status_1() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = Shell::new(Config::default());
        run(&mut shell, &format!("cat < {}", dir.path().join("nope").display()));
        assert_eq!(shell.last_status, Termination::Exited(1));
    }

    #[test]
    fn background_reports_pid_and_is_reaped() {
        let mut shell = Shell::new(Config::default());
        shell.last_status = Termination::Exited(9);
        let printed = run(&mut shell, "true &");
        let pid: libc::pid_t = printed
            .trim()
            .strip_prefix("background pid is ")
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(shell.jobs.pids(), &[pid]);

        let mut finished = Vec::new();
        for _ in 0..500 {
            finished.extend(shell.jobs.reap());
            if !finished.is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].pid, pid);
        assert_eq!(finished[0].termination, Termination::Exited(0));
        // バックグラウンドの完了は last_status に影響しない
        assert_eq!(shell.last_status, Termination::Exited(9));
    }

    #[test]
    fn background_over_capacity_is_refused() {
        let config = Config { job_capacity: 1, ..Config::default() };
        let mut shell = Shell::new(config);
        let first = run(&mut shell, "sleep 30 &");
        assert!(first.starts_with("background pid is "));
        let second = run(&mut shell, "sleep 30 &");
        assert_eq!(second, "");
        assert_eq!(shell.jobs.len(), 1);

        let pid = shell.jobs.pids()[0];
        run(&mut shell, "exit");
        assert!(shell.should_exit);
        unsafe { libc::waitpid(pid, std::ptr::null_mut(), 0) };
    }
}
