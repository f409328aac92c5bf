//! 外部コマンドの起動: `fork(2)` と `execvp(3)` の安全な Rust ラッパー。
//!
//! 起動は 2 段階に分かれる。
//!
//! | 関数 | 役割 |
//! |-----|------|
//! | [`fork_child`] | 子プロセスを作り、子側でシグナル処理方法とリダイレクトを適用する |
//! | [`exec_program`] | 子プロセスのプログラムイメージを置き換える（戻らない） |
//! | [`launch`] | 上記を組み合わせ、親側に子 PID を返す |
//!
//! fork 後の子プロセスではヒープ確保もバッファ付き I/O も行わない。
//! argv やリダイレクト先パスの `CString` は fork 前に親側で用意する。

use std::ffi::CString;
use std::io::{self, Write};

use libc::pid_t;
use thiserror::Error;

use crate::parser::CommandLine;
use crate::redirect::RedirectPlan;
use crate::signal;

// ── 役割 ─────────────────────────────────────────────────────────────

/// 子プロセスの役割。シグナル処理方法とリダイレクトの既定値が変わる。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Foreground,
    Background,
}

impl Role {
    pub fn of(cmd: &CommandLine) -> Self {
        if cmd.background {
            Role::Background
        } else {
            Role::Foreground
        }
    }
}

// ── エラー型 ──────────────────────────────────────────────────────

/// 親プロセス側で検出できる起動失敗。
#[derive(Debug, Error)]
pub enum SpawnError {
    /// `fork(2)` が失敗した。子プロセスは存在しない。
    #[error("{program}: fork() failed: {source}")]
    Fork {
        program: String,
        #[source]
        source: io::Error,
    },
    /// 引数またはリダイレクト先に NUL バイトが含まれている。
    #[error("{0}: contains a NUL byte")]
    NulByte(String),
}

// ── CStringVec ────────────────────────────────────────────────────

/// argv 用の CString ベクタ。NULL 終端のポインタ配列を構築する。
pub struct CStringVec {
    strings: Vec<CString>,
    ptrs: Vec<*const libc::c_char>,
}

impl CStringVec {
    /// 引数リストから構築する。NUL を含む引数があればエラー。
    pub fn from_args(args: &[String]) -> Result<Self, SpawnError> {
        let strings = args
            .iter()
            .map(|s| CString::new(s.as_str()).map_err(|_| SpawnError::NulByte(s.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        let mut ptrs: Vec<*const libc::c_char> = strings.iter().map(|s| s.as_ptr()).collect();
        ptrs.push(std::ptr::null()); // NULL 終端
        Ok(Self { strings, ptrs })
    }

    /// プログラム名（argv[0]）。
    fn program(&self) -> &CString {
        &self.strings[0]
    }

    /// NULL 終端ポインタ配列を返す。
    fn as_ptr(&self) -> *const *const libc::c_char {
        self.ptrs.as_ptr()
    }
}

// ── fork / exec ───────────────────────────────────────────────────

/// [`fork_child`] の結果。
#[derive(Debug, PartialEq, Eq)]
pub enum Forked {
    /// 子プロセス側。シグナル処理方法とリダイレクトは適用済み。
    Child,
    /// 親プロセス側。子の PID を持つ。
    Parent(pid_t),
}

/// 子プロセスを作成する。
///
/// 子側では [`signal::apply_child`] → [`RedirectPlan::apply`] の順に適用してから
/// [`Forked::Child`] を返す。リダイレクトに失敗した子は報告後ステータス 1 で終了する。
/// 親側の処理方法には一切触れない。`fork(2)` 自体の失敗は errno をそのまま返す。
pub fn fork_child(role: Role, plan: &RedirectPlan) -> io::Result<Forked> {
    // 未出力のバッファが子に複製されないよう fork 前に flush する
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();

    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(io::Error::last_os_error());
    }
    if pid > 0 {
        return Ok(Forked::Parent(pid));
    }

    signal::apply_child(role);
    if let Err(failure) = plan.apply() {
        child_report(failure.path.to_bytes(), failure.errno);
        unsafe { libc::_exit(1) };
    }
    Ok(Forked::Child)
}

/// 現在のプロセスを `argv[0]` のプログラムで置き換える（`PATH` 検索付き）。
///
/// 置き換えに失敗した場合はプログラム名付きで報告し、ステータス 1 で終了する。
/// 呼び出し元に戻ることはない。
pub fn exec_program(argv: &CStringVec) -> ! {
    unsafe {
        libc::execvp(argv.program().as_ptr(), argv.as_ptr());
    }
    let errno = unsafe { *signal::errno_location() };
    child_report(argv.program().to_bytes(), errno);
    unsafe { libc::_exit(1) }
}

/// コマンドを起動し、親側で子 PID を返す。
pub fn launch(cmd: &CommandLine, role: Role) -> Result<pid_t, SpawnError> {
    let argv = CStringVec::from_args(&cmd.args)?;
    let plan = RedirectPlan::new(cmd, role)?;

    let forked = fork_child(role, &plan).map_err(|source| SpawnError::Fork {
        program: cmd.program().to_string(),
        source,
    })?;
    match forked {
        Forked::Child => exec_program(&argv),
        Forked::Parent(pid) => {
            tracing::debug!(pid, program = cmd.program(), ?role, "forked child");
            Ok(pid)
        }
    }
}

// ── 子プロセス側のエラー報告 ──────────────────────────────────────

/// `<name>: <reason>` を stderr に `write(2)` で直接書く。fork 後でも安全。
pub(crate) fn child_report(name: &[u8], errno: i32) {
    signal::write_raw(libc::STDERR_FILENO, name);
    signal::write_raw(libc::STDERR_FILENO, b": ");
    signal::write_raw(libc::STDERR_FILENO, errno_reason(errno));
    signal::write_raw(libc::STDERR_FILENO, b"\n");
}

/// errno に対応する固定メッセージ。
fn errno_reason(errno: i32) -> &'static [u8] {
    match errno {
        libc::ENOENT => b"No such file or directory",
        libc::EACCES => b"Permission denied",
        libc::EISDIR => b"Is a directory",
        libc::ENOTDIR => b"Not a directory",
        libc::ENOEXEC => b"Exec format error",
        libc::ENAMETOOLONG => b"File name too long",
        libc::ELOOP => b"Too many levels of symbolic links",
        libc::EROFS => b"Read-only file system",
        libc::ENOSPC => b"No space left on device",
        libc::E2BIG => b"Argument list too long",
        libc::ENOMEM => b"Cannot allocate memory",
        _ => b"Unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn wait_raw(pid: pid_t) -> i32 {
        let mut status = 0;
        unsafe { libc::waitpid(pid, &mut status, 0) };
        status
    }

    #[test]
    fn role_follows_background_flag() {
        let fg = parser::parse("ls", false, 512).unwrap().unwrap();
        let bg = parser::parse("ls &", false, 512).unwrap().unwrap();
        assert_eq!(Role::of(&fg), Role::Foreground);
        assert_eq!(Role::of(&bg), Role::Background);
    }

    #[test]
    fn argv_rejects_nul() {
        let args = vec!["echo".to_string(), "a\0b".to_string()];
        assert!(matches!(CStringVec::from_args(&args), Err(SpawnError::NulByte(_))));
    }

    #[test]
    fn fork_error_names_the_program() {
        let err = SpawnError::Fork {
            program: "sleep".to_string(),
            source: io::Error::from_raw_os_error(libc::EAGAIN),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("sleep: fork() failed: "), "{msg}");
        assert!(std::error::Error::source(&err).is_some());
    }

    /// 処理方法を 0 = デフォルト、1 = 無視、2 = それ以外 に符号化する。
    fn disposition_code(sig: libc::c_int) -> i32 {
        match signal::current_disposition(sig) {
            Ok(h) if h == libc::SIG_DFL => 0,
            Ok(h) if h == libc::SIG_IGN => 1,
            _ => 2,
        }
    }

    /// 子側で SIGINT / SIGTSTP / SIGPIPE の処理方法を読み取り、
    /// 終了コードに詰めて返させる。exec はしない。
    fn child_dispositions(role: Role) -> (i32, i32, i32) {
        let cmd = parser::parse("ignored", false, 512).unwrap().unwrap();
        // バックグラウンドの /dev/null 接続を避けるため、計画は常にフォアグラウンドで作る
        let plan = RedirectPlan::new(&cmd, Role::Foreground).unwrap();

        match fork_child(role, &plan).unwrap() {
            Forked::Child => {
                let code = disposition_code(libc::SIGINT)
                    + 3 * disposition_code(libc::SIGTSTP)
                    + 9 * disposition_code(libc::SIGPIPE);
                unsafe { libc::_exit(code) };
            }
            Forked::Parent(pid) => {
                let status = wait_raw(pid);
                assert!(libc::WIFEXITED(status));
                let code = libc::WEXITSTATUS(status);
                (code % 3, code / 3 % 3, code / 9)
            }
        }
    }

    #[test]
    fn foreground_child_dispositions() {
        // SIGINT デフォルト、SIGTSTP 無視、SIGPIPE デフォルト
        assert_eq!(child_dispositions(Role::Foreground), (0, 1, 0));
    }

    #[test]
    fn background_child_dispositions() {
        // SIGINT 無視、SIGTSTP 無視、SIGPIPE デフォルト
        assert_eq!(child_dispositions(Role::Background), (1, 1, 0));
    }

    #[test]
    fn child_dies_by_sigpipe_on_closed_pipe() {
        let mut fds = [0i32; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        unsafe { libc::close(fds[0]) };
        let cmd = parser::parse("ignored", false, 512).unwrap().unwrap();
        let plan = RedirectPlan::new(&cmd, Role::Foreground).unwrap();

        match fork_child(Role::Foreground, &plan).unwrap() {
            Forked::Child => {
                let byte = [b'x'];
                unsafe { libc::write(fds[1], byte.as_ptr() as *const libc::c_void, 1) };
                unsafe { libc::_exit(0) };
            }
            Forked::Parent(pid) => {
                unsafe { libc::close(fds[1]) };
                let status = wait_raw(pid);
                assert!(libc::WIFSIGNALED(status));
                assert_eq!(libc::WTERMSIG(status), libc::SIGPIPE);
            }
        }
    }

    #[test]
    fn errno_reason_known_and_unknown() {
        assert_eq!(errno_reason(libc::ENOENT), b"No such file or directory");
        assert_eq!(errno_reason(-1), b"Unknown error");
    }

    /// exec せずに、子側のリダイレクトだけを検証する。
    #[test]
    fn fork_child_applies_output_redirect_without_exec() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let line = format!("ignored > {}", out.display());
        let cmd = parser::parse(&line, false, 512).unwrap().unwrap();
        let plan = RedirectPlan::new(&cmd, Role::Foreground).unwrap();

        match fork_child(Role::Foreground, &plan).unwrap() {
            Forked::Child => {
                signal::write_raw(libc::STDOUT_FILENO, b"redirected\n");
                unsafe { libc::_exit(0) };
            }
            Forked::Parent(pid) => {
                let status = wait_raw(pid);
                assert!(libc::WIFEXITED(status));
                assert_eq!(libc::WEXITSTATUS(status), 0);
                assert_eq!(std::fs::read_to_string(&out).unwrap(), "redirected\n");
            }
        }
    }

    #[test]
    fn fork_child_exits_1_on_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let line = format!("cat < {}", missing.display());
        let cmd = parser::parse(&line, false, 512).unwrap().unwrap();
        let plan = RedirectPlan::new(&cmd, Role::Foreground).unwrap();

        match fork_child(Role::Foreground, &plan).unwrap() {
            Forked::Child => unsafe { libc::_exit(0) },
            Forked::Parent(pid) => {
                let status = wait_raw(pid);
                assert!(libc::WIFEXITED(status));
                assert_eq!(libc::WEXITSTATUS(status), 1);
            }
        }
    }

    #[test]
    fn output_redirect_creates_with_mode_0644() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let line = format!("x > {}", out.display());
        let cmd = parser::parse(&line, false, 512).unwrap().unwrap();
        let plan = RedirectPlan::new(&cmd, Role::Foreground).unwrap();

        match fork_child(Role::Foreground, &plan).unwrap() {
            Forked::Child => {
                signal::write_raw(libc::STDOUT_FILENO, b"x\n");
                unsafe { libc::_exit(0) };
            }
            Forked::Parent(pid) => {
                wait_raw(pid);
                assert_eq!(std::fs::read_to_string(&out).unwrap(), "x\n");
                let mode = std::fs::metadata(&out).unwrap().permissions().mode() & 0o777;
                // umask が外側から絞ることはあるが、0644 を超えることはない
                assert_eq!(mode & !0o644, 0);
            }
        }
    }

    #[test]
    fn output_redirect_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        std::fs::write(&out, "a much longer previous content\n").unwrap();
        let line = format!("x > {}", out.display());
        let cmd = parser::parse(&line, false, 512).unwrap().unwrap();
        let plan = RedirectPlan::new(&cmd, Role::Foreground).unwrap();

        match fork_child(Role::Foreground, &plan).unwrap() {
            Forked::Child => {
                signal::write_raw(libc::STDOUT_FILENO, b"new\n");
                unsafe { libc::_exit(0) };
            }
            Forked::Parent(pid) => {
                wait_raw(pid);
                assert_eq!(std::fs::read_to_string(&out).unwrap(), "new\n");
            }
        }
    }

    #[test]
    fn launch_reports_exec_failure_as_status_1() {
        let cmd = parser::parse("smallsh-no-such-program-xyz", false, 512)
            .unwrap()
            .unwrap();
        let pid = launch(&cmd, Role::Foreground).unwrap();
        let status = wait_raw(pid);
        assert!(libc::WIFEXITED(status));
        assert_eq!(libc::WEXITSTATUS(status), 1);
    }
}
