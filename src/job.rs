//! ジョブテーブルと待機ヘルパー。
//!
//! フォアグラウンド待機 ([`wait_foreground`])、バックグラウンド reap ([`JobTable::reap`])、
//! 完了通知 ([`notify`])、終了時の一括 kill ([`JobTable::kill_all`]) を提供する。
//! executor と builtins の両方から利用する。

use std::fmt;
use std::io;

use libc::pid_t;
use thiserror::Error;

// ── 終了状態 ─────────────────────────────────────────────────────────

/// 子プロセスの終了の仕方。`status` ビルトインと完了通知の表示に使う。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// 正常終了。引数は終了コード。
    Exited(i32),
    /// シグナルで終了。引数はシグナル番号。
    Signaled(i32),
}

impl Termination {
    /// `waitpid` が返した raw status を解釈する。
    pub fn from_raw(raw_status: i32) -> Self {
        if libc::WIFSIGNALED(raw_status) {
            Termination::Signaled(libc::WTERMSIG(raw_status))
        } else if libc::WIFEXITED(raw_status) {
            Termination::Exited(libc::WEXITSTATUS(raw_status))
        } else {
            Termination::Exited(1)
        }
    }
}

impl Default for Termination {
    fn default() -> Self {
        Termination::Exited(0)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exited(code) => write!(f, "exit value {code}"),
            Termination::Signaled(sig) => write!(f, "terminated by signal {sig}"),
        }
    }
}

// ── エラー型 ──────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq, Error)]
pub enum JobError {
    /// テーブルが満杯で新しいバックグラウンドプロセスを登録できない。
    #[error("background job table full ({0} jobs)")]
    Full(usize),
}

// ── JobTable ─────────────────────────────────────────────────────────

/// reap で回収されたバックグラウンドプロセス。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finished {
    pub pid: pid_t,
    pub termination: Termination,
}

impl fmt::Display for Finished {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "background pid {} is done: {}", self.pid, self.termination)
    }
}

/// 実行中のバックグラウンドプロセスを起動順に保持する有界テーブル。
///
/// [`Shell`](crate::shell::Shell) が所有する。容量を超える登録は [`JobError::Full`]。
pub struct JobTable {
    pids: Vec<pid_t>,
    capacity: usize,
}

impl JobTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            pids: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pids.len() >= self.capacity
    }

    /// 起動順に PID を返す。
    pub fn pids(&self) -> &[pid_t] {
        &self.pids
    }

    /// もう 1 件登録できるか確認する。
    pub fn check_capacity(&self) -> Result<(), JobError> {
        if self.is_full() {
            return Err(JobError::Full(self.capacity));
        }
        Ok(())
    }

    /// 末尾に登録する。満杯なら何も変えずにエラーを返す。
    pub fn insert(&mut self, pid: pid_t) -> Result<(), JobError> {
        self.check_capacity()?;
        self.pids.push(pid);
        tracing::debug!(pid, tracked = self.pids.len(), "background job registered");
        Ok(())
    }

    /// 非ブロッキングで各エントリを起動順に確認し、終了したものを取り除いて返す。
    ///
    /// 実行中のエントリは順序を保ったまま残る。
    pub fn reap(&mut self) -> Vec<Finished> {
        let mut finished = Vec::new();
        self.pids.retain(|&pid| {
            let mut raw_status: i32 = 0;
            let ret = unsafe { libc::waitpid(pid, &mut raw_status, libc::WNOHANG) };
            if ret > 0 {
                let termination = Termination::from_raw(raw_status);
                tracing::debug!(pid, %termination, "background job reaped");
                finished.push(Finished { pid, termination });
                return false;
            }
            if ret < 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::ECHILD) {
                    tracing::warn!(pid, "tracked pid is no longer a child, dropping");
                    return false;
                }
            }
            true
        });
        finished
    }

    /// 追跡中の全プロセスに SIGKILL を送る。終了の確認は待たない。
    pub fn kill_all(&mut self) {
        for &pid in &self.pids {
            tracing::debug!(pid, "killing background job");
            unsafe {
                libc::kill(pid, libc::SIGKILL);
            }
        }
        self.pids.clear();
    }
}

/// 回収結果を stdout に出力する。プロンプト表示前に呼ばれる。
pub fn notify(finished: &[Finished]) {
    for f in finished {
        println!("{f}");
    }
}

// ── 待機ヘルパー ─────────────────────────────────────────────────────

/// フォアグラウンドの子プロセスが終了するまでブロックする。
///
/// SIGTSTP ハンドラによる `EINTR` では待機を再開する。
pub fn wait_foreground(pid: pid_t) -> io::Result<Termination> {
    loop {
        let mut raw_status: i32 = 0;
        let ret = unsafe { libc::waitpid(pid, &mut raw_status, 0) };
        if ret == pid {
            return Ok(Termination::from_raw(raw_status));
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}
