//! シグナル方針: SIGINT / SIGTSTP の処理方法を実行文脈ごとに切り替える。
//!
//! | 文脈 | SIGINT | SIGTSTP | SIGPIPE |
//! |------|--------|---------|---------|
//! | シェル本体 | 無視 | [`handle_sigtstp`]（foreground-only モードをトグル） | 無視（Rust ランタイム既定） |
//! | フォアグラウンド子 | デフォルト（終了） | 無視 | デフォルト |
//! | バックグラウンド子 | 無視 | 無視 | デフォルト |
//!
//! foreground-only モードはシグナルハンドラから書き換えられる唯一の状態で、
//! [`AtomicBool`] で保持する。他のモジュールは [`foreground_only`] で読むだけ。
//!
//! ハンドラ内では `write(2)` とアトミック操作以外を行わない
//! （バッファ付き I/O もヒープ確保もしない）。

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::spawn::Role;

static FOREGROUND_ONLY: AtomicBool = AtomicBool::new(false);

/// false → true で出力する通知。プロンプト行（`: ^Z`）を閉じる改行から始まる。
pub const ENTER_NOTICE: &[u8] = b"\nEntering foreground-only mode (& is now ignored)\n";
/// true → false で出力する通知。
pub const EXIT_NOTICE: &[u8] = b"\nExiting foreground-only mode\n";

/// 現在 foreground-only モードかどうか。
pub fn foreground_only() -> bool {
    FOREGROUND_ONLY.load(Ordering::SeqCst)
}

/// モードを反転し、対応する通知を stdout に直接書き込む。反転後の値を返す。
fn toggle_foreground_only() -> bool {
    let was = FOREGROUND_ONLY.fetch_xor(true, Ordering::SeqCst);
    let notice = if was { EXIT_NOTICE } else { ENTER_NOTICE };
    write_raw(libc::STDOUT_FILENO, notice);
    !was
}

/// SIGTSTP ハンドラ。errno を退避・復元する。
extern "C" fn handle_sigtstp(_sig: libc::c_int) {
    let saved = unsafe { *errno_location() };
    toggle_foreground_only();
    unsafe { *errno_location() = saved };
}

/// バッファを経由せず `write(2)` で書き込む。短い書き込みは続きを書く。
pub(crate) fn write_raw(fd: i32, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        let n = unsafe { libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len()) };
        if n <= 0 {
            if n < 0 && unsafe { *errno_location() } == libc::EINTR {
                continue;
            }
            return;
        }
        bytes = &bytes[n as usize..];
    }
}

#[cfg(target_os = "linux")]
pub(crate) unsafe fn errno_location() -> *mut libc::c_int {
    libc::__errno_location()
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
pub(crate) unsafe fn errno_location() -> *mut libc::c_int {
    libc::__error()
}

// ── sigaction ヘルパー ───────────────────────────────────────────────

/// `sigaction` でハンドラを設定する。`mask_all` ならハンドラ実行中は全シグナルをブロック。
fn set_disposition(sig: libc::c_int, handler: libc::sighandler_t, mask_all: bool) -> io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler;
        if mask_all {
            libc::sigfillset(&mut action.sa_mask);
        } else {
            libc::sigemptyset(&mut action.sa_mask);
        }
        // SA_RESTART なし: 入力待ちの read(2) を EINTR で中断させ、プロンプトを出し直す
        action.sa_flags = 0;
        if libc::sigaction(sig, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// シェル本体の処理方法を設定する。起動時に 1 回だけ呼ぶ。
pub fn install_interpreter() -> io::Result<()> {
    set_disposition(libc::SIGINT, libc::SIG_IGN, false)?;
    set_disposition(
        libc::SIGTSTP,
        handle_sigtstp as extern "C" fn(libc::c_int) as libc::sighandler_t,
        true,
    )?;
    tracing::debug!("interpreter signal dispositions installed");
    Ok(())
}

/// fork 直後の子プロセスで、役割に応じた処理方法を設定する。
///
/// exec 前に呼ぶこと。`sigaction` のみを使うので fork 後でも安全。
/// 失敗しても子の実行は続ける（元の処理方法が残るだけ）。
///
/// SIGPIPE は Rust ランタイムが起動時に無視へ変えており、無視は exec 後も残るため、
/// どちらの役割でもデフォルトに戻す。
pub fn apply_child(role: Role) {
    let int_handler = match role {
        Role::Foreground => libc::SIG_DFL,
        Role::Background => libc::SIG_IGN,
    };
    let _ = set_disposition(libc::SIGINT, int_handler, false);
    let _ = set_disposition(libc::SIGTSTP, libc::SIG_IGN, false);
    let _ = set_disposition(libc::SIGPIPE, libc::SIG_DFL, false);
}

/// 現在の処理方法（`sa_sigaction`）を変更せずに読み取る。
pub(crate) fn current_disposition(sig: libc::c_int) -> io::Result<libc::sighandler_t> {
    unsafe {
        let mut old: libc::sigaction = std::mem::zeroed();
        if libc::sigaction(sig, std::ptr::null(), &mut old) != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(old.sa_sigaction)
    }
}
