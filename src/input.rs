//! プロンプト表示と 1 行入力。
//!
//! stdin は子プロセスと共有されるため、先読みせず `read(2)` で 1 バイトずつ読む
//! （バッファに取り込んだ分を子が読めなくなるのを防ぐ）。
//! SIGTSTP ハンドラで `read(2)` が `EINTR` になった場合、まだ 1 バイトも読んでいなければ
//! [`ReadOutcome::Interrupted`] を返し、呼び出し側でプロンプトを出し直す。
//! 読みかけの行があればそのまま続きを読む。

use std::io::{self, Write};

/// [`read_line`] の結果。
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// 改行を除いた 1 行。
    Line(String),
    /// 行の先頭を読む前にシグナルで中断された。
    Interrupted,
    /// 入力終端（または読み取りエラー）。
    Eof,
}

/// プロンプトを出力して flush する。
pub fn prompt(text: &str) {
    let mut out = io::stdout();
    let _ = out.write_all(text.as_bytes());
    let _ = out.flush();
}

/// `fd` から改行まで読み取る。最終行が改行なしで終端に達した場合はその行を返す。
pub fn read_line(fd: i32) -> ReadOutcome {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = unsafe { libc::read(fd, byte.as_mut_ptr() as *mut libc::c_void, 1) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                if line.is_empty() {
                    return ReadOutcome::Interrupted;
                }
                continue;
            }
            tracing::warn!(error = %err, "read from stdin failed");
            return ReadOutcome::Eof;
        }
        if n == 0 {
            if line.is_empty() {
                return ReadOutcome::Eof;
            }
            break;
        }
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
    }
    ReadOutcome::Line(String::from_utf8_lossy(&line).into_owned())
}
