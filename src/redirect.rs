//! リダイレクト解決: 子プロセスの stdin / stdout をファイルに付け替える。
//!
//! [`RedirectPlan`] は fork 前に親プロセスで組み立て（パスの `CString` 化などヒープ確保はここで済ませる）、
//! fork 後の子プロセスでは [`RedirectPlan::apply`] が `open(2)` / `dup2(2)` / `close(2)` だけを呼ぶ。
//!
//! - 入力 → 出力の順に解決する
//! - 出力ファイルは `O_WRONLY | O_CREAT | O_TRUNC`、モード `0644`
//! - バックグラウンドで明示指定がない側は `/dev/null` に接続する

use std::ffi::{CStr, CString};

use crate::parser::CommandLine;
use crate::spawn::{Role, SpawnError};

const DEV_NULL: &CStr = c"/dev/null";

/// 片側（stdin / stdout）の接続先。
#[derive(Debug, PartialEq, Eq)]
enum Target {
    /// 親から継承したまま。
    Inherit,
    /// 明示されたファイル。
    File(CString),
    /// `/dev/null`。
    Null,
}

impl Target {
    fn path(&self) -> Option<&CStr> {
        match self {
            Target::Inherit => None,
            Target::File(p) => Some(p.as_c_str()),
            Target::Null => Some(DEV_NULL),
        }
    }
}

/// 子プロセスで適用するリダイレクトの計画。
#[derive(Debug, PartialEq, Eq)]
pub struct RedirectPlan {
    stdin: Target,
    stdout: Target,
}

/// 子プロセス側でファイルを開けなかったことを表す。
#[derive(Debug, PartialEq, Eq)]
pub struct RedirectFailure<'a> {
    /// 開けなかったパス。
    pub path: &'a CStr,
    /// `open(2)` / `dup2(2)` の errno。
    pub errno: i32,
}

impl RedirectPlan {
    /// コマンドと役割から計画を組み立てる。パスに NUL を含む場合はエラー。
    pub fn new(cmd: &CommandLine, role: Role) -> Result<Self, SpawnError> {
        let background = role == Role::Background;
        Ok(Self {
            stdin: Self::target(cmd.input.as_deref(), background)?,
            stdout: Self::target(cmd.output.as_deref(), background)?,
        })
    }

    fn target(path: Option<&str>, background: bool) -> Result<Target, SpawnError> {
        match path {
            Some(p) => CString::new(p)
                .map(Target::File)
                .map_err(|_| SpawnError::NulByte(p.to_string())),
            None if background => Ok(Target::Null),
            None => Ok(Target::Inherit),
        }
    }

    /// 計画を現在のプロセスに適用する。fork 後の子プロセスから呼ぶ。
    ///
    /// 最初に失敗した側で止まり、そのパスと errno を返す。
    pub fn apply(&self) -> Result<(), RedirectFailure<'_>> {
        if let Some(path) = self.stdin.path() {
            rebind(path, libc::O_RDONLY, libc::STDIN_FILENO)?;
        }
        if let Some(path) = self.stdout.path() {
            rebind(
                path,
                libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
                libc::STDOUT_FILENO,
            )?;
        }
        Ok(())
    }
}

/// `path` を開いて `target_fd` に複製し、元の fd を閉じる。
fn rebind(path: &CStr, flags: libc::c_int, target_fd: i32) -> Result<(), RedirectFailure<'_>> {
    let fail = || RedirectFailure {
        path,
        errno: std::io::Error::last_os_error().raw_os_error().unwrap_or(0),
    };

    let fd = unsafe { libc::open(path.as_ptr(), flags, 0o644 as libc::c_uint) };
    if fd < 0 {
        return Err(fail());
    }
    if fd != target_fd {
        if unsafe { libc::dup2(fd, target_fd) } < 0 {
            let err = fail();
            unsafe { libc::close(fd) };
            return Err(err);
        }
        unsafe { libc::close(fd) };
    }
    Ok(())
}
